//! Local directory source

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{CsvSource, FetchError};

/// Reads CSV files from a local directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl CsvSource for DirectorySource {
    async fn fetch(&self, file_name: &str) -> Result<String, FetchError> {
        // File names are plain names, never paths
        if file_name.contains('/') || file_name.contains('\\') || file_name.starts_with('.') {
            return Err(FetchError::NotFound(file_name.to_string()));
        }

        let path = self.root.join(file_name);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FetchError::NotFound(file_name.to_string()))
            }
            Err(e) => Err(FetchError::transient(file_name, e)),
        }
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}
