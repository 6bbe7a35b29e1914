//! Hoops Stats - embedded basketball statistics database
//!
//! Loads a fixed set of basketball CSV datasets into an embedded DuckDB
//! database, consolidates them into a small set of query-ready tables and
//! serves parameterized SQL over them:
//! - Schema registry of source files and their column types
//! - CSV sources (in-memory, directory, HTTP)
//! - Ingest pipeline with per-file failure isolation
//! - Consolidated tables and secondary indexes
//! - Initialization gatekeeper and query gateway
//! - Season/identifier helpers and canned queries

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod consolidate;
pub mod engine;
pub mod gate;
pub mod indexes;
pub mod ingest;
pub mod query;
pub mod registry;
pub mod season;
pub mod source;
pub mod staging;

pub use config::{ConfigError, StatsConfig, sample_config};
pub use consolidate::{
    BuiltTable, ConsolidationError, ConsolidationReport, DerivedTable, REQUIRED_TABLES,
    StatVariant,
};
pub use engine::{Engine, EngineError, EngineResult};
pub use gate::{Availability, InitError, InitState, ReadySummary, StatsDatabase};
pub use ingest::{
    DatasetReport, DatasetStatus, IngestError, IngestPipeline, IngestReport, LoadOptions,
    PipelineReport,
};
pub use query::catalog::{CannedQuery, LeaderStat};
pub use query::{
    OutputFormat, Page, QueryError, QueryExecutionError, QueryResult, Record, SortDirection,
    SortKey, TableRequest, format_query_result,
};
pub use registry::{
    ColumnSpec, DatasetDescriptor, LoadMode, RegistryError, SchemaRegistry, SqlType,
};
#[cfg(feature = "http")]
pub use source::HttpSource;
pub use source::{CsvSource, DirectorySource, FetchError, MemorySource};
pub use staging::{StagingError, VirtualFile, VirtualFileStore};
