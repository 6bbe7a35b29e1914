//! CLI-specific error types

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::gate::InitError;
use crate::query::QueryError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] EngineError),

    #[error("Initialization failed: {0}")]
    Init(#[from] InitError),

    #[error(transparent)]
    Query(#[from] QueryError),
}
