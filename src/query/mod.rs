//! Query gateway types
//!
//! Every read goes through [`crate::StatsDatabase::execute`]. Results are
//! plain records (column name to JSON primitive). Failures are typed and
//! carry the query text; an errored query never yields rows, so an empty
//! `Ok` is always genuine business data.

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod sort;

pub use sort::{Page, SortDirection, SortError, SortKey, TableRequest};

use crate::gate::InitError;

/// One result row
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A failed query execution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Query failed: {message}\n  query: {query}")]
pub struct QueryExecutionError {
    /// The SQL text as submitted
    pub query: String,
    /// Engine diagnostic
    pub message: String,
}

/// Error type for gateway reads
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// The database never reached the ready state
    #[error("Database not ready: {0}")]
    NotReady(#[from] InitError),

    /// Malformed SQL or engine-level failure
    #[error(transparent)]
    Execution(#[from] QueryExecutionError),
}

impl QueryError {
    /// The query text, for execution failures
    pub fn query(&self) -> Option<&str> {
        match self {
            QueryError::Execution(e) => Some(&e.query),
            _ => None,
        }
    }
}

/// Query result set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in select order
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<Record>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }
}

/// Output format for exported results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Render a result for display or export
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn cell_text(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut output = String::new();

    let header: Vec<String> = result.columns.iter().map(|c| csv_escape(c)).collect();
    output.push_str(&header.join(","));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .map(|col| csv_escape(&cell_text(row.get(col))))
            .collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let render = |value: Option<&serde_json::Value>| match value {
        Some(serde_json::Value::Null) | None => "null".to_string(),
        other => cell_text(other),
    };

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &result.rows {
        for (i, col) in result.columns.iter().enumerate() {
            widths[i] = widths[i].max(render(row.get(col)).len());
        }
    }

    let mut output = String::new();

    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
        .collect();
    output.push_str(&header.join(" | "));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&separator.join("-+-"));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{:width$}", render(row.get(col)), width = widths[i]))
            .collect();
        output.push_str(&values.join(" | "));
        output.push('\n');
    }

    output.push_str(&format!("({} rows)", result.row_count()));

    output
}
