//! Virtual file registration
//!
//! DuckDB reads CSV through `read_csv(<path>)`, so fetched text is written to
//! a staging directory and handed to the engine as an addressable path. When
//! no directory is configured a private temporary directory is used and
//! removed on drop.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Error type for staging operations
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// The file name would escape the staging directory
    #[error("Invalid virtual file name: {0}")]
    InvalidName(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A registered file the engine can read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl VirtualFile {
    /// Path as a single-quoted SQL string literal
    pub fn sql_literal(&self) -> String {
        quote_literal(&self.path.to_string_lossy())
    }
}

/// Owns the directory registered files live in
#[derive(Debug)]
pub struct VirtualFileStore {
    root: PathBuf,
    _temp: Option<TempDir>,
}

impl VirtualFileStore {
    /// Stage files under an existing (or creatable) directory
    pub fn in_dir(root: impl AsRef<Path>) -> Result<Self, StagingError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, _temp: None })
    }

    /// Stage files under a private temporary directory
    pub fn temporary() -> Result<Self, StagingError> {
        let temp = tempfile::Builder::new().prefix("hoops-csv-").tempdir()?;
        Ok(Self {
            root: temp.path().to_path_buf(),
            _temp: Some(temp),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register `content` under `name`, replacing any previous registration
    pub fn register(&self, name: &str, content: &str) -> Result<VirtualFile, StagingError> {
        let path = self.path_for(name)?;
        std::fs::write(&path, content)?;
        tracing::debug!("Registered virtual file {} ({} bytes)", name, content.len());
        Ok(VirtualFile {
            name: name.to_string(),
            path,
            size: content.len() as u64,
        })
    }

    /// Drop a registration; unknown names are ignored
    pub fn unregister(&self, name: &str) -> Result<(), StagingError> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StagingError> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\', '\0'])
        {
            return Err(StagingError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

/// Quote a value as a SQL string literal
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let store = VirtualFileStore::temporary().unwrap();
        let file = store.register("Player Per Game.csv", "a,b\n1,2\n").unwrap();
        assert_eq!(file.size, 8);
        assert!(store.is_registered("Player Per Game.csv"));
        assert_eq!(std::fs::read_to_string(&file.path).unwrap(), "a,b\n1,2\n");

        store.unregister("Player Per Game.csv").unwrap();
        assert!(!store.is_registered("Player Per Game.csv"));
        store.unregister("Player Per Game.csv").unwrap();
    }

    #[test]
    fn test_rejects_traversal() {
        let store = VirtualFileStore::temporary().unwrap();
        assert!(matches!(
            store.register("../x.csv", ""),
            Err(StagingError::InvalidName(_))
        ));
    }

    #[test]
    fn test_temporary_dir_removed_on_drop() {
        let store = VirtualFileStore::temporary().unwrap();
        let root = store.root().to_path_buf();
        store.register("a.csv", "x\n").unwrap();
        drop(store);
        assert!(!root.exists());
    }

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(quote_literal("O'Neal.csv"), "'O''Neal.csv'");
    }
}
