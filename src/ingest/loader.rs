//! Raw table loads
//!
//! Explicit datasets are staged as all-VARCHAR and coerced column by column
//! with `TRY_CAST`, so a malformed value becomes NULL instead of failing the
//! load. Columns are matched to CSV headers by name, never by position.

use crate::engine::{Engine, quote_ident};
use crate::registry::{ColumnSpec, DatasetDescriptor, SqlType};
use crate::staging::{VirtualFile, quote_literal};

use super::IngestError;

/// Default missing-value sentinels
pub const DEFAULT_NULL_TOKENS: &[&str] = &["NA", "N/A", ""];

/// Options shared by every load in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Tokens read as NULL
    pub null_tokens: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            null_tokens: DEFAULT_NULL_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Result of loading one raw table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTable {
    pub rows: u64,
    /// Declared columns with no matching header (filled with NULL)
    pub missing_columns: Vec<String>,
}

/// `read_csv(...)` table function call for a registered file
pub(crate) fn read_csv_expr(file: &VirtualFile, options: &LoadOptions, all_varchar: bool) -> String {
    let null_tokens: Vec<String> = options
        .null_tokens
        .iter()
        .map(|t| quote_literal(t))
        .collect();

    let mut args = vec![
        file.sql_literal(),
        "header = true".to_string(),
        "ignore_errors = true".to_string(),
        "null_padding = true".to_string(),
    ];
    if all_varchar {
        args.push("all_varchar = true".to_string());
    } else {
        args.push("auto_detect = true".to_string());
    }
    if !null_tokens.is_empty() {
        args.push(format!("nullstr = [{}]", null_tokens.join(", ")));
    }

    format!("read_csv({})", args.join(", "))
}

/// Headers of a registered CSV file, as DuckDB sees them
pub fn file_headers(
    engine: &Engine,
    file: &VirtualFile,
    options: &LoadOptions,
) -> Result<Vec<String>, IngestError> {
    let sql = format!("DESCRIBE SELECT * FROM {}", read_csv_expr(file, options, true));
    engine
        .query_strings(&sql)
        .map_err(|e| IngestError::schema_load(&file.name, format!("Unreadable header: {}", e)))
}

/// `CREATE OR REPLACE TABLE` for a declared schema
pub(crate) fn create_table_sql(table: &str, columns: &[ColumnSpec]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("    {} {}", quote_ident(&c.name), c.sql_type.as_sql()))
        .collect();
    format!(
        "CREATE OR REPLACE TABLE {} (\n{}\n);",
        quote_ident(table),
        defs.join(",\n")
    )
}

/// Expression coercing a VARCHAR value to `sql_type`, NULL when unparseable
fn coerce_expr(value: &str, sql_type: SqlType) -> String {
    let v = format!("NULLIF(TRIM({}), '')", value);
    match sql_type {
        SqlType::Varchar => v,
        SqlType::Integer | SqlType::BigInt => {
            let ty = sql_type.as_sql();
            // "12.0" style integers appear in some exports
            format!(
                "COALESCE(TRY_CAST({v} AS {ty}), TRY_CAST(TRY_CAST({v} AS DOUBLE) AS {ty}))"
            )
        }
        SqlType::Double => format!("TRY_CAST({v} AS DOUBLE)"),
        SqlType::Boolean => format!(
            "CASE WHEN lower({v}) IN ('true', 't', 'yes', 'y', '1') THEN TRUE \
             WHEN lower({v}) IN ('false', 'f', 'no', 'n', '0') THEN FALSE END"
        ),
        SqlType::Date => format!(
            "COALESCE(TRY_CAST({v} AS DATE), TRY_CAST(TRY_CAST({v} AS TIMESTAMP) AS DATE))"
        ),
    }
}

/// Build the INSERT for an explicit schema against the file's actual headers
///
/// Returns the statement and the declared columns that had no header.
pub(crate) fn insert_sql(
    table: &str,
    columns: &[ColumnSpec],
    headers: &[String],
    source_expr: &str,
) -> (String, Vec<String>) {
    let mut missing = Vec::new();
    let mut targets = Vec::with_capacity(columns.len());
    let mut values = Vec::with_capacity(columns.len());

    for column in columns {
        targets.push(quote_ident(&column.name));
        let wanted = column.header().trim();
        match headers
            .iter()
            .find(|h| h.trim().eq_ignore_ascii_case(wanted))
        {
            Some(header) => values.push(format!(
                "{} AS {}",
                coerce_expr(&quote_ident(header), column.sql_type),
                quote_ident(&column.name)
            )),
            None => {
                missing.push(column.name.clone());
                values.push(format!(
                    "CAST(NULL AS {}) AS {}",
                    column.sql_type.as_sql(),
                    quote_ident(&column.name)
                ));
            }
        }
    }

    let sql = format!(
        "INSERT INTO {} ({})\nSELECT\n    {}\nFROM {};",
        quote_ident(table),
        targets.join(", "),
        values.join(",\n    "),
        source_expr
    );
    (sql, missing)
}

/// Replace `dataset.target_table` with the declared schema and load the file
pub fn load_explicit(
    engine: &Engine,
    dataset: &DatasetDescriptor,
    columns: &[ColumnSpec],
    file: &VirtualFile,
    options: &LoadOptions,
) -> Result<LoadedTable, IngestError> {
    let table = &dataset.target_table;
    let headers = file_headers(engine, file, options)?;

    let (insert, missing_columns) =
        insert_sql(table, columns, &headers, &read_csv_expr(file, options, true));

    if missing_columns.len() == columns.len() {
        return Err(IngestError::schema_load(
            table,
            format!(
                "None of the declared columns match the headers of {}",
                dataset.source_file
            ),
        ));
    }
    if !missing_columns.is_empty() {
        tracing::warn!(
            "{}: no header for column(s) {}; filling with NULL",
            dataset.source_file,
            missing_columns.join(", ")
        );
    }

    engine
        .execute_batch(&create_table_sql(table, columns))
        .map_err(|e| IngestError::schema_load(table, e))?;

    let rows = match engine.execute(&insert, &[]) {
        Ok(rows) => rows as u64,
        Err(e) => {
            // A half-built table would read as valid data downstream
            if let Err(drop_err) = drop_table(engine, table) {
                tracing::warn!("{}", drop_err);
            }
            return Err(IngestError::schema_load(table, e));
        }
    };

    Ok(LoadedTable {
        rows,
        missing_columns,
    })
}

/// Replace `dataset.target_table` with an auto-detected schema
pub fn load_auto(
    engine: &Engine,
    dataset: &DatasetDescriptor,
    file: &VirtualFile,
    options: &LoadOptions,
) -> Result<LoadedTable, IngestError> {
    let table = &dataset.target_table;
    let sql = format!(
        "CREATE OR REPLACE TABLE {} AS SELECT * FROM {};",
        quote_ident(table),
        read_csv_expr(file, options, false)
    );

    engine
        .execute_batch(&sql)
        .map_err(|e| IngestError::schema_load(table, e))?;

    let rows = engine
        .row_count(table)
        .map_err(|e| IngestError::schema_load(table, e))?;

    Ok(LoadedTable {
        rows: rows.max(0) as u64,
        missing_columns: Vec::new(),
    })
}

/// Remove a raw table if it exists
pub fn drop_table(engine: &Engine, table: &str) -> Result<(), IngestError> {
    engine
        .execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(table)))
        .map_err(|e| IngestError::schema_load(table, format!("Failed to drop: {}", e)))
}

/// Create the declared table with no rows
pub fn create_placeholder(
    engine: &Engine,
    dataset: &DatasetDescriptor,
    columns: &[ColumnSpec],
) -> Result<(), IngestError> {
    engine
        .execute_batch(&create_table_sql(&dataset.target_table, columns))
        .map_err(|e| IngestError::schema_load(&dataset.target_table, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::VirtualFileStore;
    use serde_json::json;

    fn dataset() -> DatasetDescriptor {
        DatasetDescriptor::explicit(
            "draft_history.csv",
            "raw_draft_history",
            vec![
                ColumnSpec::new("draft_year", SqlType::Integer).from_header("Draft Year"),
                ColumnSpec::new("overall_pick", SqlType::Integer).from_header("Pk"),
                ColumnSpec::new("player_id", SqlType::Varchar),
                ColumnSpec::new("college", SqlType::Varchar).from_header("College"),
            ],
        )
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql("raw_x", &[ColumnSpec::new("g", SqlType::Integer)]);
        assert_eq!(sql, "CREATE OR REPLACE TABLE \"raw_x\" (\n    \"g\" INTEGER\n);");
    }

    #[test]
    fn test_insert_maps_by_header_name() {
        let columns = dataset().columns().unwrap().to_vec();
        let headers = vec![
            "College".to_string(),
            "player_id".to_string(),
            "Pk".to_string(),
            "Draft Year".to_string(),
        ];
        let (sql, missing) = insert_sql("raw_draft_history", &columns, &headers, "src");
        assert!(missing.is_empty());
        assert!(sql.contains("\"Draft Year\""));
        assert!(sql.contains("AS \"draft_year\""));
    }

    #[test]
    fn test_insert_reports_missing_headers() {
        let columns = dataset().columns().unwrap().to_vec();
        let headers = vec!["Draft Year".to_string(), "Pk".to_string()];
        let (sql, missing) = insert_sql("raw_draft_history", &columns, &headers, "src");
        assert_eq!(missing, vec!["player_id", "college"]);
        assert!(sql.contains("CAST(NULL AS VARCHAR) AS \"college\""));
    }

    #[test]
    fn test_load_explicit_coerces_sentinels() {
        let engine = Engine::in_memory().unwrap();
        let store = VirtualFileStore::temporary().unwrap();
        let file = store
            .register(
                "draft_history.csv",
                "Draft Year,Pk,player_id,College\n\
                 2003,1,jamesle01,NA\n\
                 2003,two,wadedw01,Marquette\n\
                 NA,3,anthoca01,Syracuse\n",
            )
            .unwrap();

        let ds = dataset();
        let loaded =
            load_explicit(&engine, &ds, ds.columns().unwrap(), &file, &LoadOptions::default())
                .unwrap();
        assert_eq!(loaded.rows, 3);

        let result = engine
            .query(
                "SELECT draft_year, overall_pick, player_id, college FROM raw_draft_history ORDER BY player_id",
                &[],
            )
            .unwrap();
        // anthoca01: NA year
        assert_eq!(result.rows[0]["draft_year"], serde_json::Value::Null);
        // jamesle01: NA college
        assert_eq!(result.rows[1]["college"], serde_json::Value::Null);
        assert_eq!(result.rows[1]["overall_pick"], json!(1));
        // wadedw01: unparseable pick
        assert_eq!(result.rows[2]["overall_pick"], serde_json::Value::Null);
        assert_eq!(result.rows[2]["college"], json!("Marquette"));
    }

    #[test]
    fn test_load_explicit_rejects_unrelated_file() {
        let engine = Engine::in_memory().unwrap();
        let store = VirtualFileStore::temporary().unwrap();
        let file = store.register("draft_history.csv", "a,b\n1,2\n").unwrap();

        let ds = dataset();
        let err =
            load_explicit(&engine, &ds, ds.columns().unwrap(), &file, &LoadOptions::default())
                .unwrap_err();
        assert!(matches!(err, IngestError::SchemaLoad { .. }));
        assert!(!engine.table_exists("raw_draft_history").unwrap());
    }

    #[test]
    fn test_load_auto() {
        let engine = Engine::in_memory().unwrap();
        let store = VirtualFileStore::temporary().unwrap();
        let file = store
            .register("game.csv", "game_id,pts_home\n1,100\n2,NA\n")
            .unwrap();

        let ds = DatasetDescriptor::auto("game.csv", "raw_game");
        let loaded = load_auto(&engine, &ds, &file, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.rows, 2);

        let result = engine
            .query("SELECT pts_home FROM raw_game ORDER BY game_id", &[])
            .unwrap();
        assert_eq!(result.rows[0]["pts_home"], json!(100));
        assert_eq!(result.rows[1]["pts_home"], serde_json::Value::Null);
    }

    #[test]
    fn test_placeholder_is_empty_and_typed() {
        let engine = Engine::in_memory().unwrap();
        let ds = dataset();
        create_placeholder(&engine, &ds, ds.columns().unwrap()).unwrap();
        assert_eq!(engine.row_count("raw_draft_history").unwrap(), 0);
    }
}
