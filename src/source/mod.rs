//! CSV sources
//!
//! A source hands back the raw text of a named CSV file. Sources must tell a
//! missing file apart from a transient failure so a caller can layer a retry
//! policy on top without guessing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

mod directory;
#[cfg(feature = "http")]
mod http;

pub use directory::DirectorySource;
#[cfg(feature = "http")]
pub use http::HttpSource;

/// Base path the CSV files are served from
pub const DEFAULT_BASE_PATH: &str = "/csv/";

/// Error type for fetch operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The file does not exist at the source
    #[error("File not found: {0}")]
    NotFound(String),

    /// Network or IO failure; the file may exist
    #[error("Transient failure fetching {file}: {message}")]
    Transient { file: String, message: String },
}

impl FetchError {
    pub fn transient(file: impl Into<String>, message: impl std::fmt::Display) -> Self {
        FetchError::Transient {
            file: file.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Source of raw CSV text, addressed by file name
#[async_trait]
pub trait CsvSource: Send + Sync {
    /// Fetch the full UTF-8 text of `file_name`
    async fn fetch(&self, file_name: &str) -> Result<String, FetchError>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// In-process source backed by a map of file name to contents
#[derive(Debug, Default)]
pub struct MemorySource {
    files: RwLock<HashMap<String, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_file(self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&self, name: impl Into<String>, content: impl Into<String>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(name.into(), content.into());
        }
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.files.write().ok().and_then(|mut files| files.remove(name))
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CsvSource for MemorySource {
    async fn fetch(&self, file_name: &str) -> Result<String, FetchError> {
        let files = self
            .files
            .read()
            .map_err(|e| FetchError::transient(file_name, format!("Lock error: {}", e)))?;
        files
            .get(file_name)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(file_name.to_string()))
    }

    fn describe(&self) -> String {
        format!("memory ({} files)", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_fetch() {
        let source = MemorySource::new().with_file("a.csv", "x\n1\n");
        assert_eq!(source.fetch("a.csv").await.unwrap(), "x\n1\n");

        let err = source.fetch("b.csv").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_memory_source_remove() {
        let source = MemorySource::new().with_file("a.csv", "x\n");
        assert_eq!(source.len(), 1);
        source.remove("a.csv");
        assert!(source.is_empty());
        assert!(source.fetch("a.csv").await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_fetch_error_kinds() {
        let err = FetchError::transient("a.csv", "connection reset");
        assert!(err.is_transient());
        assert!(err.to_string().contains("connection reset"));
    }
}
