//! SQL query CLI command
//!
//! Executes a parameterized query against the stats database, initializing it
//! first if needed.

use std::path::PathBuf;

use crate::cli::commands::{load_config, runtime};
use crate::cli::error::CliError;
use crate::query::{OutputFormat, format_query_result};

/// Query command arguments
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// SQL query to execute
    pub sql: String,
    /// Positional parameters, bound in order
    pub params: Vec<String>,
    /// Workspace path
    pub workspace: PathBuf,
    /// Explicit config file
    pub config: Option<PathBuf>,
    /// Output format
    pub format: String,
}

/// Interpret a `--param` value: JSON literals as-is, anything else as text
pub fn parse_param(raw: &str) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value @ (serde_json::Value::Null
        | serde_json::Value::Bool(_)
        | serde_json::Value::Number(_)
        | serde_json::Value::String(_))) => value,
        _ => serde_json::Value::String(raw.to_string()),
    }
}

/// Execute a SQL query against the stats database
pub fn handle_query(args: &QueryArgs) -> Result<(), CliError> {
    let output_format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| CliError::InvalidArgument(e))?;

    let config = load_config(&args.workspace, args.config.as_ref())?;
    let db = config.open_database(&args.workspace)?;
    let params: Vec<serde_json::Value> = args.params.iter().map(|p| parse_param(p)).collect();

    let result = runtime()?.block_on(db.execute_result(&args.sql, &params))?;

    println!("{}", format_query_result(&result, output_format));

    // Print execution time for non-JSON formats
    if output_format != OutputFormat::Json {
        eprintln!("\nExecution time: {}ms", result.execution_time_ms);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("2024"), json!(2024));
        assert_eq!(parse_param("true"), json!(true));
        assert_eq!(parse_param("null"), serde_json::Value::Null);
        assert_eq!(parse_param("jamesle01"), json!("jamesle01"));
        assert_eq!(parse_param("\"2024\""), json!("2024"));
        assert_eq!(parse_param("[1, 2]"), json!("[1, 2]"));
    }
}
