//! Configuration file support
//!
//! Handles parsing of `.hoops.toml` configuration files. Relative paths are
//! resolved against the workspace directory the file was loaded from.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::{Engine, EngineError};
use crate::gate::StatsDatabase;
use crate::ingest::{DEFAULT_NULL_TOKENS, IngestPipeline, LoadOptions};
use crate::registry::{RegistryError, SchemaRegistry};
use crate::source::{CsvSource, DEFAULT_BASE_PATH, DirectorySource};
use crate::staging::{StagingError, VirtualFileStore};

/// Default database filename
pub const DEFAULT_DATABASE_FILENAME: &str = "stats.duckdb";

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".hoops.toml";

/// Default directory CSV files are read from
pub const DEFAULT_CSV_DIRECTORY: &str = "csv";

/// Error type for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Staging(#[from] StagingError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Path to the DuckDB file (relative to workspace, or absolute)
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Keep everything in memory; nothing persists across runs
    #[serde(default)]
    pub in_memory: bool,
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_FILENAME.to_string()
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            in_memory: false,
        }
    }
}

/// Where CSV files come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Directory,
    Http,
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "directory" | "dir" => Ok(SourceKind::Directory),
            "http" | "https" => Ok(SourceKind::Http),
            _ => Err(format!(
                "Unknown source kind: {}. Use 'directory' or 'http'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Directory => write!(f, "directory"),
            SourceKind::Http => write!(f, "http"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    #[serde(default)]
    pub kind: SourceKind,

    /// CSV directory for `kind = "directory"`
    #[serde(default = "default_csv_directory")]
    pub directory: String,

    /// Base URL for `kind = "http"`
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_csv_directory() -> String {
    DEFAULT_CSV_DIRECTORY.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_PATH.to_string()
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            directory: default_csv_directory(),
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StagingSection {
    /// Staging directory; a temporary directory when unset
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSection {
    /// Re-ingest even when consolidated tables already exist
    #[serde(default)]
    pub force: bool,

    /// Values read as NULL
    #[serde(default = "default_null_tokens")]
    pub null_tokens: Vec<String>,

    /// Registry TOML replacing the built-in datasets
    #[serde(default)]
    pub registry: Option<String>,
}

fn default_null_tokens() -> Vec<String> {
    DEFAULT_NULL_TOKENS.iter().map(|s| s.to_string()).collect()
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            force: false,
            null_tokens: default_null_tokens(),
            registry: None,
        }
    }
}

/// Main configuration structure
///
/// Represents the `.hoops.toml` configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatsConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub source: SourceSection,

    #[serde(default)]
    pub staging: StagingSection,

    #[serde(default)]
    pub ingest: IngestSection,
}

impl StatsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory database reading CSVs from `directory`
    pub fn in_memory(directory: impl Into<String>) -> Self {
        Self {
            database: DatabaseSection {
                path: String::new(),
                in_memory: true,
            },
            source: SourceSection {
                directory: directory.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load `.hoops.toml` from a workspace directory, or defaults if absent
    pub fn load(workspace_path: &Path) -> ConfigResult<Self> {
        let config_path = workspace_path.join(CONFIG_FILENAME);
        if config_path.exists() {
            Self::load_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a workspace directory
    pub fn save(&self, workspace_path: &Path) -> ConfigResult<()> {
        let config_path = workspace_path.join(CONFIG_FILENAME);
        let content = self.to_toml()?;

        std::fs::write(&config_path, content)
            .map_err(|e| ConfigError::Io(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialization(e.to_string()))
    }

    pub fn exists(workspace_path: &Path) -> bool {
        workspace_path.join(CONFIG_FILENAME).exists()
    }

    /// Database file path, None when in memory
    pub fn database_path(&self, workspace_path: &Path) -> Option<PathBuf> {
        if self.database.in_memory {
            None
        } else if self.database.path.is_empty() {
            Some(workspace_path.join(DEFAULT_DATABASE_FILENAME))
        } else {
            Some(resolve(workspace_path, &self.database.path))
        }
    }

    pub fn open_engine(&self, workspace_path: &Path) -> ConfigResult<Engine> {
        match self.database_path(workspace_path) {
            Some(path) => Ok(Engine::open(path)?),
            None => Ok(Engine::in_memory()?),
        }
    }

    pub fn build_source(&self, workspace_path: &Path) -> ConfigResult<Arc<dyn CsvSource>> {
        match self.source.kind {
            SourceKind::Directory => Ok(Arc::new(DirectorySource::new(resolve(
                workspace_path,
                &self.source.directory,
            )))),
            #[cfg(feature = "http")]
            SourceKind::Http => Ok(Arc::new(crate::source::HttpSource::new(
                self.source.base_url.clone(),
            ))),
            #[cfg(not(feature = "http"))]
            SourceKind::Http => Err(ConfigError::Invalid(
                "source kind \"http\" requires the `http` feature".to_string(),
            )),
        }
    }

    pub fn build_staging(&self, workspace_path: &Path) -> ConfigResult<VirtualFileStore> {
        match &self.staging.dir {
            Some(dir) => Ok(VirtualFileStore::in_dir(resolve(workspace_path, dir))?),
            None => Ok(VirtualFileStore::temporary()?),
        }
    }

    pub fn build_registry(&self, workspace_path: &Path) -> ConfigResult<SchemaRegistry> {
        match &self.ingest.registry {
            Some(path) => Ok(SchemaRegistry::load(&resolve(workspace_path, path))?),
            None => Ok(SchemaRegistry::basketball()),
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            null_tokens: self.ingest.null_tokens.clone(),
        }
    }

    /// Assemble a database handle; nothing is fetched until it is initialized
    pub fn open_database(&self, workspace_path: &Path) -> ConfigResult<StatsDatabase> {
        let pipeline = IngestPipeline::new(
            Arc::new(self.open_engine(workspace_path)?),
            self.build_source(workspace_path)?,
            Arc::new(self.build_staging(workspace_path)?),
            Arc::new(self.build_registry(workspace_path)?),
        )
        .with_options(self.load_options());

        Ok(StatsDatabase::with_force(pipeline, self.ingest.force))
    }
}

fn resolve(workspace_path: &Path, path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        workspace_path.join(path)
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# hoops-stats configuration

[database]
# DuckDB file (relative to this directory, or absolute)
path = "stats.duckdb"
# in_memory = true

[source]
# "directory" (default) or "http"
kind = "directory"
directory = "csv"
# base_url = "http://localhost:8080/csv/"

[staging]
# Where fetched CSV text is written for loading; a temp dir when unset
# dir = ".hoops-staging"

[ingest]
# Re-ingest even when the consolidated tables already exist
force = false
null_tokens = ["NA", "N/A", ""]
# registry = "datasets.toml"
"#
}
