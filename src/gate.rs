//! Initialization gatekeeper
//!
//! [`StatsDatabase`] is the handle every consumer shares. The first call to
//! [`StatsDatabase::initialize`] starts the pipeline; concurrent callers await
//! the same run, and the run itself is spawned on the runtime so a caller
//! dropping its future cannot cancel it. `Ready` and `Failed` are terminal for
//! the lifetime of the handle.

use std::sync::{Arc, OnceLock, RwLock};

use tokio::sync::OnceCell;

use crate::consolidate::{DerivedTable, REQUIRED_TABLES};
use crate::engine::{Engine, EngineError};
use crate::ingest::{IngestPipeline, PipelineReport};
use crate::query::catalog::CannedQuery;
use crate::query::{QueryError, QueryExecutionError, QueryResult, Record, TableRequest};

/// Error type for initialization
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Required tables missing after ingest: {}", .0.join(", "))]
    RequiredTablesMissing(Vec<String>),

    #[error("Initialization aborted: {0}")]
    Aborted(String),
}

impl From<EngineError> for InitError {
    fn from(e: EngineError) -> Self {
        InitError::Engine(e.to_string())
    }
}

/// What a successful initialization found
#[derive(Debug, Clone)]
pub struct ReadySummary {
    /// Tables were already present; nothing was fetched
    pub from_cache: bool,
    /// Optional consolidated tables that do not exist
    pub missing_tables: Vec<String>,
    /// Pipeline details, when a run happened
    pub report: Option<PipelineReport>,
}

impl ReadySummary {
    pub fn is_degraded(&self) -> bool {
        !self.missing_tables.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub enum InitState {
    #[default]
    Uninitialized,
    Initializing,
    Ready(ReadySummary),
    Failed(InitError),
}

impl InitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InitState::Ready(_) | InitState::Failed(_))
    }
}

/// Coarse state for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Initializing,
    /// Usable; `missing` lists optional tables that are absent
    Ready { missing: Vec<String> },
    Failed { reason: String },
}

struct Shared {
    pipeline: IngestPipeline,
    force: bool,
    state: RwLock<InitState>,
    outcome: OnceCell<Result<ReadySummary, InitError>>,
}

impl Shared {
    fn set_state(&self, state: InitState) {
        match self.state.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    async fn run(&self) -> Result<ReadySummary, InitError> {
        self.set_state(InitState::Initializing);

        let outcome = self.run_pipeline().await;
        match &outcome {
            Ok(summary) => {
                if summary.is_degraded() {
                    tracing::warn!(
                        "Database ready without: {}",
                        summary.missing_tables.join(", ")
                    );
                } else {
                    tracing::info!("Database ready");
                }
                self.set_state(InitState::Ready(summary.clone()));
            }
            Err(e) => {
                tracing::error!("Database initialization failed: {}", e);
                self.set_state(InitState::Failed(e.clone()));
            }
        }
        outcome
    }

    async fn run_pipeline(&self) -> Result<ReadySummary, InitError> {
        let engine = self.pipeline.engine();

        if self.force {
            tracing::info!("Forced ingest; skipping persisted-table probe");
        } else if engine.count_existing(REQUIRED_TABLES)? == REQUIRED_TABLES.len() {
            tracing::info!("Consolidated tables already present; skipping ingest");
            return Ok(ReadySummary {
                from_cache: true,
                missing_tables: missing_optional(engine)?,
                report: None,
            });
        }

        let report = self.pipeline.run().await;

        let mut missing_required = Vec::new();
        for table in REQUIRED_TABLES {
            if !engine.table_exists(table)? {
                missing_required.push(table.to_string());
            }
        }
        if !missing_required.is_empty() {
            return Err(InitError::RequiredTablesMissing(missing_required));
        }

        Ok(ReadySummary {
            from_cache: false,
            missing_tables: missing_optional(engine)?,
            report: Some(report),
        })
    }
}

fn missing_optional(engine: &Engine) -> Result<Vec<String>, EngineError> {
    let mut missing = Vec::new();
    for table in DerivedTable::ALL.iter().filter(|t| !t.is_required()) {
        if !engine.table_exists(table.name())? {
            missing.push(table.name().to_string());
        }
    }
    Ok(missing)
}

static GLOBAL: OnceLock<StatsDatabase> = OnceLock::new();

/// Shared database handle
#[derive(Clone)]
pub struct StatsDatabase {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for StatsDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsDatabase")
            .field("pipeline", &self.shared.pipeline)
            .field("force", &self.shared.force)
            .field("state", &self.state())
            .finish()
    }
}

impl StatsDatabase {
    pub fn new(pipeline: IngestPipeline) -> Self {
        Self::with_force(pipeline, false)
    }

    /// `force` re-runs the pipeline even when tables are already persisted
    pub fn with_force(pipeline: IngestPipeline, force: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                pipeline,
                force,
                state: RwLock::new(InitState::Uninitialized),
                outcome: OnceCell::new(),
            }),
        }
    }

    /// Process-wide instance, if one was installed
    pub fn global() -> Option<&'static StatsDatabase> {
        GLOBAL.get()
    }

    /// Install the process-wide instance; fails (returning `db`) if one exists
    pub fn install_global(db: StatsDatabase) -> Result<(), StatsDatabase> {
        GLOBAL.set(db)
    }

    pub fn engine(&self) -> &Engine {
        self.shared.pipeline.engine()
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.shared.pipeline
    }

    /// Bring the database to a terminal state, at most once
    pub async fn initialize(&self) -> Result<ReadySummary, InitError> {
        if let Some(outcome) = self.shared.outcome.get() {
            return outcome.clone();
        }

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            shared
                .outcome
                .get_or_init(|| shared.run())
                .await
                .clone()
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Database initialization task aborted: {}", e);
                // The cell is still empty after a panicked run; later callers see this outcome
                let aborted = InitError::Aborted(e.to_string());
                let outcome = self
                    .shared
                    .outcome
                    .get_or_init(|| async { Err(aborted) })
                    .await
                    .clone();
                if let Err(err) = &outcome {
                    self.shared.set_state(InitState::Failed(err.clone()));
                }
                outcome
            }
        }
    }

    pub fn state(&self) -> InitState {
        match self.shared.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn availability(&self) -> Availability {
        match self.state() {
            InitState::Uninitialized | InitState::Initializing => Availability::Initializing,
            InitState::Ready(summary) => Availability::Ready {
                missing: summary.missing_tables,
            },
            InitState::Failed(e) => Availability::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Run a parameterized query once the database is ready
    pub async fn execute(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<Vec<Record>, QueryError> {
        Ok(self.execute_result(sql, params).await?.into_rows())
    }

    /// Like [`execute`](Self::execute), keeping column order and timing
    pub async fn execute_result(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<QueryResult, QueryError> {
        self.initialize().await?;

        self.engine().query(sql, params).map_err(|e| {
            tracing::error!("Query failed: {}", e);
            QueryError::from(QueryExecutionError {
                query: sql.to_string(),
                message: e.to_string(),
            })
        })
    }

    /// Run `sql` with caller-chosen sorting and paging
    pub async fn execute_table(
        &self,
        sql: &str,
        params: &[serde_json::Value],
        request: &TableRequest,
    ) -> Result<QueryResult, QueryError> {
        let mut params = params.to_vec();
        let sql = request.apply(sql, &mut params);
        self.execute_result(&sql, &params).await
    }

    pub async fn run(&self, query: &CannedQuery) -> Result<Vec<Record>, QueryError> {
        self.execute(&query.sql, &query.params).await
    }

    /// Row count per consolidated table; None when the table is absent
    pub fn table_counts(&self) -> Result<Vec<(DerivedTable, Option<u64>)>, EngineError> {
        let engine = self.engine();
        let mut counts = Vec::with_capacity(DerivedTable::ALL.len());
        for table in DerivedTable::ALL {
            let count = if engine.table_exists(table.name())? {
                Some(engine.row_count(table.name())?.max(0) as u64)
            } else {
                None
            };
            counts.push((table, count));
        }
        Ok(counts)
    }
}
