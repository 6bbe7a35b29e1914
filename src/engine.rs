//! DuckDB engine handle
//!
//! Owns the single connection every other component goes through. The
//! connection sits behind a `Mutex`; callers never hold the guard across an
//! `.await`, so synchronous engine work is serialized without custom locking.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::query::{QueryResult, Record};

/// Error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Failed to open the database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Statement preparation or execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Embedded DuckDB database
pub struct Engine {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    connection: Mutex<duckdb::Connection>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Open (or create) a file-backed database
    pub fn open(db_path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::ConnectionFailed(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let connection = duckdb::Connection::open(&path).map_err(|e| {
            EngineError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        tracing::info!("Opened DuckDB database {}", path.display());

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Open an in-memory database
    pub fn in_memory() -> EngineResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            EngineError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| EngineError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Execute one or more statements that return no rows
    pub fn execute_batch(&self, sql: &str) -> EngineResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| EngineError::QueryFailed(e.to_string()))
    }

    /// Execute a single statement with bound parameters
    pub fn execute(&self, sql: &str, params: &[serde_json::Value]) -> EngineResult<usize> {
        let conn = self.lock()?;
        let values = bind_values(params);
        conn.execute(sql, duckdb::params_from_iter(values.iter()))
            .map_err(|e| EngineError::QueryFailed(e.to_string()))
    }

    /// Run a query and decode every row into a record
    ///
    /// Rows are fully decoded before returning; a failure part-way through
    /// yields an error and no rows.
    pub fn query(&self, sql: &str, params: &[serde_json::Value]) -> EngineResult<QueryResult> {
        let start = std::time::Instant::now();
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| EngineError::QueryFailed(format!("Prepare failed: {}", e)))?;

        let values = bind_values(params);

        // Columns are only known once the statement has run
        let mut result_rows = stmt
            .query(duckdb::params_from_iter(values.iter()))
            .map_err(|e| EngineError::QueryFailed(e.to_string()))?;

        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows
            .next()
            .map_err(|e| EngineError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            rows.push(row_to_record(row, &columns));
        }

        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// First column of every row as text
    pub fn query_strings(&self, sql: &str) -> EngineResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| EngineError::QueryFailed(format!("Prepare failed: {}", e)))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| EngineError::QueryFailed(e.to_string()))?;

        let mut values = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| EngineError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            let value: Option<String> = row
                .get(0)
                .map_err(|e| EngineError::QueryFailed(e.to_string()))?;
            if let Some(value) = value {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Single integer result, e.g. a COUNT(*)
    pub fn query_count(&self, sql: &str, params: &[serde_json::Value]) -> EngineResult<i64> {
        let conn = self.lock()?;
        let values = bind_values(params);
        conn.query_row(sql, duckdb::params_from_iter(values.iter()), |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| EngineError::QueryFailed(e.to_string()))
    }

    /// Whether a table exists in the main schema (case-insensitive)
    pub fn table_exists(&self, table: &str) -> EngineResult<bool> {
        let count = self.query_count(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = 'main' AND lower(table_name) = lower(?)",
            &[serde_json::Value::String(table.to_string())],
        )?;
        Ok(count > 0)
    }

    /// How many of `tables` exist
    pub fn count_existing(&self, tables: &[&str]) -> EngineResult<usize> {
        let mut present = 0;
        for table in tables {
            if self.table_exists(table)? {
                present += 1;
            }
        }
        Ok(present)
    }

    /// Row count of a table
    pub fn row_count(&self, table: &str) -> EngineResult<i64> {
        self.query_count(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)), &[])
    }

    /// Cheap liveness probe
    pub fn health_check(&self) -> EngineResult<bool> {
        Ok(self.query_count("SELECT CAST(1 AS BIGINT)", &[])? == 1)
    }
}

/// Quote an identifier for DuckDB
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn bind_values(params: &[serde_json::Value]) -> Vec<duckdb::types::Value> {
    params.iter().map(json_to_value).collect()
}

/// Map a JSON parameter onto a native DuckDB value
fn json_to_value(param: &serde_json::Value) -> duckdb::types::Value {
    use duckdb::types::Value;

    match param {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::BigInt(i)
            } else if let Some(u) = n.as_u64() {
                Value::UBigInt(u)
            } else {
                Value::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Text(s.clone()),
        // Arrays and objects bind as their JSON text
        other => Value::Text(other.to_string()),
    }
}

fn row_to_record(row: &duckdb::Row, columns: &[String]) -> Record {
    let mut map = Record::new();

    for (i, col_name) in columns.iter().enumerate() {
        let value = match row.get_ref(i) {
            Ok(value_ref) => value_ref_to_json(value_ref),
            Err(_) => serde_json::Value::Null,
        };
        map.insert(col_name.clone(), value);
    }

    map
}

/// Convert a DuckDB value into a host primitive
fn value_ref_to_json(value: duckdb::types::ValueRef) -> serde_json::Value {
    use duckdb::types::ValueRef;

    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Boolean(b) => serde_json::Value::Bool(b),
        ValueRef::TinyInt(i) => serde_json::Value::Number(i.into()),
        ValueRef::SmallInt(i) => serde_json::Value::Number(i.into()),
        ValueRef::Int(i) => serde_json::Value::Number(i.into()),
        ValueRef::BigInt(i) => serde_json::Value::Number(i.into()),
        ValueRef::HugeInt(i) => match i64::try_from(i) {
            Ok(small) => serde_json::Value::Number(small.into()),
            // Too wide for a JSON number
            Err(_) => serde_json::Value::String(i.to_string()),
        },
        ValueRef::UTinyInt(i) => serde_json::Value::Number(i.into()),
        ValueRef::USmallInt(i) => serde_json::Value::Number(i.into()),
        ValueRef::UInt(i) => serde_json::Value::Number(i.into()),
        ValueRef::UBigInt(i) => serde_json::Value::Number(i.into()),
        ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Double(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(d.to_string())),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
        ValueRef::Blob(bytes) => {
            use base64::Engine;
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
        ValueRef::Date32(days) => chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days as i64)))
            .map(|date| serde_json::Value::String(date.format("%Y-%m-%d").to_string()))
            .unwrap_or(serde_json::Value::Null),
        // Nested and temporal types other than DATE render as their debug form
        _ => serde_json::Value::String(format!("{:?}", value)),
    }
}
