//! Ingestion pipeline
//!
//! One pass fetches every registry dataset in order, stages it and loads its
//! raw table. Per-dataset failures are recorded and never stop the pass.
//! [`IngestPipeline::run`] follows the pass with consolidation and indexing.

pub mod loader;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::consolidate::{self, ConsolidationReport};
use crate::engine::Engine;
use crate::indexes::{self, IndexReport};
use crate::registry::{DatasetDescriptor, LoadMode, SchemaRegistry};
use crate::source::{CsvSource, FetchError};
use crate::staging::VirtualFileStore;

pub use loader::{DEFAULT_NULL_TOKENS, LoadOptions, LoadedTable};

/// Table the per-dataset run log is appended to
pub const INGEST_LOG_TABLE: &str = "_ingest_log";

/// Error type for a single dataset
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The fetched text could not be registered
    #[error("Failed to stage {file}: {message}")]
    Staging { file: String, message: String },

    /// The engine rejected the load
    #[error("Failed to load {table}: {message}")]
    SchemaLoad { table: String, message: String },
}

impl IngestError {
    pub fn schema_load(table: &str, message: impl std::fmt::Display) -> Self {
        IngestError::SchemaLoad {
            table: table.to_string(),
            message: message.to_string(),
        }
    }
}

/// Outcome of one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DatasetStatus {
    Loaded {
        rows: u64,
        missing_columns: Vec<String>,
    },
    /// Optional file absent; an empty table with the declared schema exists
    Placeholder,
    /// File absent; no table was created
    Skipped,
    Failed,
}

impl DatasetStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DatasetStatus::Loaded { .. } => "loaded",
            DatasetStatus::Placeholder => "placeholder",
            DatasetStatus::Skipped => "skipped",
            DatasetStatus::Failed => "failed",
        }
    }

    pub fn rows(&self) -> u64 {
        match self {
            DatasetStatus::Loaded { rows, .. } => *rows,
            _ => 0,
        }
    }
}

/// Per-dataset entry of an [`IngestReport`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetReport {
    pub source_file: String,
    pub target_table: String,
    pub optional: bool,
    #[serde(flatten)]
    pub status: DatasetStatus,
    /// SHA-256 of the fetched text
    pub content_sha256: Option<String>,
    #[serde(skip)]
    pub error: Option<IngestError>,
}

impl DatasetReport {
    /// Error text, if any
    pub fn detail(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

/// Statistics from one Table Builder pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub datasets: Vec<DatasetReport>,
    #[serde(skip)]
    pub duration: Duration,
}

impl IngestReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            datasets: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.datasets
            .iter()
            .filter(|d| matches!(d.status, DatasetStatus::Loaded { .. }))
            .count()
    }

    pub fn total_rows(&self) -> u64 {
        self.datasets.iter().map(|d| d.status.rows()).sum()
    }

    /// Source files that produced no loaded table
    pub fn missing_files(&self) -> Vec<String> {
        self.datasets
            .iter()
            .filter(|d| !matches!(d.status, DatasetStatus::Loaded { .. }))
            .map(|d| d.source_file.clone())
            .collect()
    }

    pub fn get(&self, target_table: &str) -> Option<&DatasetReport> {
        self.datasets
            .iter()
            .find(|d| d.target_table.eq_ignore_ascii_case(target_table))
    }

    /// Errors that came from fetches reported as transient
    pub fn transient_failures(&self) -> impl Iterator<Item = &DatasetReport> {
        self.datasets.iter().filter(|d| {
            matches!(&d.error, Some(IngestError::Fetch(e)) if e.is_transient())
        })
    }
}

/// Everything one full pipeline run did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub ingest: IngestReport,
    pub consolidation: ConsolidationReport,
    pub indexes: IndexReport,
}

/// Fetch → stage → load → consolidate → index
#[derive(Clone)]
pub struct IngestPipeline {
    engine: Arc<Engine>,
    source: Arc<dyn CsvSource>,
    files: Arc<VirtualFileStore>,
    registry: Arc<SchemaRegistry>,
    options: LoadOptions,
}

impl std::fmt::Debug for IngestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestPipeline")
            .field("engine", &self.engine)
            .field("source", &self.source.describe())
            .field("staging", &self.files.root())
            .field("datasets", &self.registry.len())
            .finish()
    }
}

impl IngestPipeline {
    pub fn new(
        engine: Arc<Engine>,
        source: Arc<dyn CsvSource>,
        files: Arc<VirtualFileStore>,
        registry: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            engine,
            source,
            files,
            registry,
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn source(&self) -> &dyn CsvSource {
        self.source.as_ref()
    }

    /// Full run: load every dataset, then consolidate and index
    pub async fn run(&self) -> PipelineReport {
        let ingest = self.load_datasets().await;

        // Indexed tables are replaced below
        indexes::drop_indexes(&self.engine);
        let consolidation = consolidate::consolidate(&self.engine);
        let indexes = indexes::build_indexes(&self.engine);

        PipelineReport {
            ingest,
            consolidation,
            indexes,
        }
    }

    /// Table Builder pass over the registry, in order
    pub async fn load_datasets(&self) -> IngestReport {
        let start = Instant::now();
        let mut report = IngestReport::new();

        tracing::info!(
            "Ingest run {} started: {} dataset(s) from {}",
            report.run_id,
            self.registry.len(),
            self.source.describe()
        );

        for dataset in self.registry.iter() {
            let entry = self.load_dataset(dataset).await;
            match &entry.status {
                DatasetStatus::Loaded { rows, .. } => {
                    tracing::info!("Loaded {} rows into {}", rows, entry.target_table)
                }
                DatasetStatus::Placeholder => {
                    tracing::debug!("{} -> placeholder", entry.source_file)
                }
                status => {
                    tracing::debug!("{} -> {}", entry.source_file, status.label());
                    // A table left by an earlier run must not feed consolidation
                    if let Err(e) = loader::drop_table(&self.engine, &entry.target_table) {
                        tracing::warn!("{}", e);
                    }
                }
            }
            report.datasets.push(entry);
        }

        report.duration = start.elapsed();
        self.write_log(&report);

        tracing::info!(
            "Ingest run {} finished in {:?}: {}/{} dataset(s) loaded, {} row(s)",
            report.run_id,
            report.duration,
            report.loaded_count(),
            report.datasets.len(),
            report.total_rows()
        );

        report
    }

    async fn load_dataset(&self, dataset: &DatasetDescriptor) -> DatasetReport {
        let mut entry = DatasetReport {
            source_file: dataset.source_file.clone(),
            target_table: dataset.target_table.clone(),
            optional: dataset.optional,
            status: DatasetStatus::Failed,
            content_sha256: None,
            error: None,
        };

        let text = match self.source.fetch(&dataset.source_file).await {
            Ok(text) => text,
            Err(e) => {
                self.handle_fetch_failure(dataset, e, &mut entry);
                return entry;
            }
        };

        entry.content_sha256 = Some(format!("{:x}", Sha256::digest(text.as_bytes())));

        let file = match self.files.register(&dataset.source_file, &text) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!("Failed to stage {}: {}", dataset.source_file, e);
                entry.error = Some(IngestError::Staging {
                    file: dataset.source_file.clone(),
                    message: e.to_string(),
                });
                return entry;
            }
        };
        drop(text);

        let loaded = match &dataset.mode {
            LoadMode::Explicit { columns } => {
                loader::load_explicit(&self.engine, dataset, columns, &file, &self.options)
            }
            LoadMode::Auto => loader::load_auto(&self.engine, dataset, &file, &self.options),
        };

        if let Err(e) = self.files.unregister(&dataset.source_file) {
            tracing::warn!("Failed to unregister {}: {}", dataset.source_file, e);
        }

        match loaded {
            Ok(LoadedTable {
                rows,
                missing_columns,
            }) => {
                entry.status = DatasetStatus::Loaded {
                    rows,
                    missing_columns,
                };
            }
            Err(e) => {
                tracing::error!("{}", e);
                entry.error = Some(e);
            }
        }
        entry
    }

    fn handle_fetch_failure(
        &self,
        dataset: &DatasetDescriptor,
        error: FetchError,
        entry: &mut DatasetReport,
    ) {
        if !dataset.optional {
            tracing::error!("Required dataset {} unavailable: {}", dataset.source_file, error);
            entry.status = DatasetStatus::Skipped;
            entry.error = Some(error.into());
            return;
        }

        tracing::warn!("Optional dataset {} unavailable: {}", dataset.source_file, error);
        entry.status = DatasetStatus::Skipped;

        if let Some(columns) = dataset.columns() {
            match loader::create_placeholder(&self.engine, dataset, columns) {
                Ok(()) => entry.status = DatasetStatus::Placeholder,
                Err(e) => tracing::warn!("{}", e),
            }
        }
        entry.error = Some(error.into());
    }

    fn write_log(&self, report: &IngestReport) {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {INGEST_LOG_TABLE} (
                run_id VARCHAR,
                dataset VARCHAR,
                target_table VARCHAR,
                status VARCHAR,
                \"rows\" BIGINT,
                content_sha256 VARCHAR,
                detail VARCHAR,
                logged_at TIMESTAMP
            );"
        );
        if let Err(e) = self.engine.execute_batch(&create) {
            tracing::warn!("Failed to create {}: {}", INGEST_LOG_TABLE, e);
            return;
        }

        let insert = format!(
            "INSERT INTO {INGEST_LOG_TABLE} VALUES (?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP))"
        );
        let logged_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

        for entry in &report.datasets {
            let params = [
                serde_json::Value::from(report.run_id.to_string()),
                serde_json::Value::from(entry.source_file.clone()),
                serde_json::Value::from(entry.target_table.clone()),
                serde_json::Value::from(entry.status.label()),
                serde_json::Value::from(entry.status.rows()),
                serde_json::to_value(&entry.content_sha256).unwrap_or_default(),
                serde_json::to_value(entry.detail()).unwrap_or_default(),
                serde_json::Value::from(logged_at.clone()),
            ];
            if let Err(e) = self.engine.execute(&insert, &params) {
                tracing::warn!("Failed to log {}: {}", entry.source_file, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ColumnSpec, SqlType};
    use crate::source::MemorySource;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(vec![
            DatasetDescriptor::explicit(
                "a.csv",
                "raw_a",
                vec![ColumnSpec::new("id", SqlType::Varchar)],
            ),
            DatasetDescriptor::explicit(
                "b.csv",
                "raw_b",
                vec![ColumnSpec::new("id", SqlType::Varchar)],
            )
            .optional(),
            DatasetDescriptor::auto("c.csv", "raw_c").optional(),
        ])
        .unwrap()
    }

    fn pipeline(source: MemorySource) -> IngestPipeline {
        IngestPipeline::new(
            Arc::new(Engine::in_memory().unwrap()),
            Arc::new(source),
            Arc::new(VirtualFileStore::temporary().unwrap()),
            Arc::new(registry()),
        )
    }

    #[tokio::test]
    async fn test_load_datasets_records_each_outcome() {
        let source = MemorySource::new().with_file("a.csv", "id\nx\ny\n");
        let pipeline = pipeline(source);

        let report = pipeline.load_datasets().await;
        assert_eq!(report.datasets.len(), 3);
        assert_eq!(report.get("raw_a").unwrap().status.rows(), 2);
        assert_eq!(report.get("raw_b").unwrap().status, DatasetStatus::Placeholder);
        assert_eq!(report.get("raw_c").unwrap().status, DatasetStatus::Skipped);
        assert_eq!(report.missing_files(), vec!["b.csv", "c.csv"]);

        assert!(pipeline.engine().table_exists("raw_b").unwrap());
        assert!(!pipeline.engine().table_exists("raw_c").unwrap());
    }

    #[tokio::test]
    async fn test_required_failure_creates_no_table() {
        let pipeline = pipeline(MemorySource::new());
        let report = pipeline.load_datasets().await;

        let a = report.get("raw_a").unwrap();
        assert_eq!(a.status, DatasetStatus::Skipped);
        assert!(matches!(a.error, Some(IngestError::Fetch(FetchError::NotFound(_)))));
        assert!(!pipeline.engine().table_exists("raw_a").unwrap());
    }

    #[tokio::test]
    async fn test_ingest_log_written() {
        let pipeline = pipeline(MemorySource::new().with_file("a.csv", "id\nx\n"));
        let report = pipeline.load_datasets().await;

        let logged = pipeline
            .engine()
            .query_count(
                "SELECT COUNT(*) FROM _ingest_log WHERE run_id = ?",
                &[serde_json::Value::from(report.run_id.to_string())],
            )
            .unwrap();
        assert_eq!(logged, 3);

        let hash = report.get("raw_a").unwrap().content_sha256.clone().unwrap();
        assert_eq!(hash.len(), 64);
    }
}
