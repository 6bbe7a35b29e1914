//! CLI command implementations

pub mod db;
pub mod query;

use std::path::{Path, PathBuf};

use crate::cli::error::CliError;
use crate::config::StatsConfig;

/// Config from `--config`, or `.hoops.toml` in the workspace
pub(crate) fn load_config(
    workspace: &Path,
    config: Option<&PathBuf>,
) -> Result<StatsConfig, CliError> {
    match config {
        Some(path) => Ok(StatsConfig::load_file(path)?),
        None => Ok(StatsConfig::load(workspace)?),
    }
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}
