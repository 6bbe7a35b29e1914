//! Initialization gatekeeper tests

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use tempfile::TempDir;
use tokio::task::JoinSet;

use common::*;
use hoops_stats::{
    Availability, CsvSource, Engine, FetchError, InitError, InitState, MemorySource,
    QueryError, SchemaRegistry, StatsDatabase,
};

const INIT_TIMEOUT: Duration = Duration::from_secs(30);

fn file_database(dir: &TempDir, source: Arc<dyn CsvSource>, force: bool) -> StatsDatabase {
    let engine = Engine::open(dir.path().join("stats.duckdb")).unwrap();
    StatsDatabase::with_force(
        pipeline_with(engine, source, SchemaRegistry::basketball()),
        force,
    )
}

/// Panics on every fetch
struct PanickingSource {
    fetches: AtomicUsize,
}

#[async_trait]
impl CsvSource for PanickingSource {
    async fn fetch(&self, file_name: &str) -> Result<String, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        panic!("fetch of {} blew up", file_name);
    }

    fn describe(&self) -> String {
        "panicking".to_string()
    }
}

#[tokio::test]
async fn test_unreachable_source_reaches_failed_state() {
    let db = in_memory_database(Arc::new(UnreachableSource));

    let err = tokio::time::timeout(INIT_TIMEOUT, db.initialize())
        .await
        .expect("initialization must terminate")
        .unwrap_err();
    assert_eq!(
        err,
        InitError::RequiredTablesMissing(vec![
            "Players".to_string(),
            "TeamSeasonRecords".to_string()
        ])
    );
    assert!(matches!(db.state(), InitState::Failed(_)));
    assert!(db.state().is_terminal());
}

#[tokio::test]
async fn test_missing_required_dataset_fails() {
    let source = MemorySource::new()
        .with_file("Player Directory.csv", PLAYER_DIRECTORY)
        .with_file("Player Per Game.csv", PLAYER_PER_GAME);
    let db = in_memory_database(Arc::new(source));

    let err = db.initialize().await.unwrap_err();
    assert_eq!(
        err,
        InitError::RequiredTablesMissing(vec!["TeamSeasonRecords".to_string()])
    );

    match db.execute("SELECT * FROM Players", &[]).await {
        Err(QueryError::NotReady(reason)) => assert_eq!(reason, err),
        other => panic!("expected NotReady, got {:?}", other),
    }
}

#[tokio::test]
async fn test_aborted_run_is_terminal() {
    let source = Arc::new(PanickingSource {
        fetches: AtomicUsize::new(0),
    });
    let db = in_memory_database(source.clone());

    let err = db.initialize().await.unwrap_err();
    assert!(matches!(err, InitError::Aborted(_)));
    assert!(matches!(db.state(), InitState::Failed(InitError::Aborted(_))));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

    // No second run
    assert_eq!(db.initialize().await.unwrap_err(), err);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_run() {
    let source = Arc::new(
        CountingSource::new(basketball_source()).with_delay(Duration::from_millis(10)),
    );
    let db = in_memory_database(source.clone());

    let mut callers = JoinSet::new();
    for _ in 0..8 {
        let db = db.clone();
        callers.spawn(async move { db.initialize().await });
    }
    while let Some(joined) = callers.join_next().await {
        assert!(joined.unwrap().is_ok());
    }

    assert_eq!(source.fetches(), SchemaRegistry::basketball().len());

    // Later calls return the recorded outcome
    db.initialize().await.unwrap();
    assert_eq!(source.fetches(), SchemaRegistry::basketball().len());
}

#[tokio::test]
async fn test_dropped_caller_does_not_cancel_run() {
    let source = Arc::new(
        CountingSource::new(basketball_source()).with_delay(Duration::from_millis(20)),
    );
    let db = in_memory_database(source.clone());

    let abandoned = tokio::time::timeout(Duration::from_millis(5), db.initialize()).await;
    assert!(abandoned.is_err());

    let summary = db.initialize().await.unwrap();
    assert!(!summary.from_cache);
    assert_eq!(source.fetches(), SchemaRegistry::basketball().len());
    assert_eq!(db.engine().row_count("Players").unwrap(), 3);
}

#[tokio::test]
async fn test_state_transitions() {
    let source = CountingSource::new(basketball_source()).with_delay(Duration::from_millis(50));
    let db = in_memory_database(Arc::new(source));
    assert!(matches!(db.state(), InitState::Uninitialized));
    assert_eq!(db.availability(), Availability::Initializing);

    let background = db.clone();
    let handle = tokio::spawn(async move { background.initialize().await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(matches!(db.state(), InitState::Initializing));
    assert_eq!(db.availability(), Availability::Initializing);

    handle.await.unwrap().unwrap();
    assert_eq!(db.availability(), Availability::Ready { missing: vec![] });
}

#[tokio::test]
async fn test_persisted_tables_skip_ingest() {
    let dir = TempDir::new().unwrap();

    {
        let db = file_database(&dir, Arc::new(basketball_source()), false);
        let summary = db.initialize().await.unwrap();
        assert!(!summary.from_cache);
    }

    let source = Arc::new(CountingSource::new(MemorySource::new()));
    let db = file_database(&dir, source.clone(), false);
    let summary = db.initialize().await.unwrap();

    assert!(summary.from_cache);
    assert!(summary.missing_tables.is_empty());
    assert_eq!(source.fetches(), 0);

    let players = db.execute("SELECT player_id FROM Players", &[]).await.unwrap();
    assert_eq!(players.len(), 3);
}

#[tokio::test]
async fn test_force_reingests_persisted_tables() {
    let dir = TempDir::new().unwrap();

    {
        let db = file_database(&dir, Arc::new(basketball_source()), false);
        db.initialize().await.unwrap();
    }

    let source = Arc::new(CountingSource::new(basketball_source()));
    let db = file_database(&dir, source.clone(), true);
    let summary = db.initialize().await.unwrap();

    assert!(!summary.from_cache);
    assert!(summary.report.is_some());
    assert_eq!(source.fetches(), SchemaRegistry::basketball().len());
    assert_eq!(db.engine().row_count("Players").unwrap(), 3);
}

#[tokio::test]
async fn test_forced_reingest_without_required_files_fails() {
    let dir = TempDir::new().unwrap();

    {
        let db = file_database(&dir, Arc::new(basketball_source()), false);
        db.initialize().await.unwrap();
    }

    let db = file_database(&dir, Arc::new(MemorySource::new()), true);
    let err = db.initialize().await.unwrap_err();
    assert_eq!(
        err,
        InitError::RequiredTablesMissing(vec![
            "Players".to_string(),
            "TeamSeasonRecords".to_string()
        ])
    );

    let engine = db.engine();
    assert!(!engine.table_exists("raw_player_directory").unwrap());
    assert!(!engine.table_exists("raw_team_summaries").unwrap());
    assert!(!engine.table_exists("raw_game").unwrap());
    assert!(!engine.table_exists("Games").unwrap());
}

#[tokio::test]
async fn test_three_file_scenario_with_missing_optional_bio() {
    let registry = SchemaRegistry::new(
        SchemaRegistry::basketball()
            .iter()
            .filter(|d| {
                matches!(
                    d.source_file.as_str(),
                    "Player Directory.csv" | "common_player_info.csv" | "Team Summaries.csv"
                )
            })
            .cloned()
            .collect(),
    )
    .unwrap();
    assert_eq!(registry.len(), 3);

    let source = MemorySource::new()
        .with_file("Player Directory.csv", PLAYER_DIRECTORY)
        .with_file("Team Summaries.csv", TEAM_SUMMARIES);
    let db = StatsDatabase::new(pipeline_with(
        Engine::in_memory().unwrap(),
        Arc::new(source),
        registry,
    ));

    let summary = db.initialize().await.unwrap();
    assert!(summary.is_degraded());
    assert_eq!(
        summary.missing_tables,
        vec!["PlayerSeasonStats", "DraftPicks", "Games"]
    );

    let bio = db.execute("SELECT * FROM raw_player_bio", &[]).await.unwrap();
    assert!(bio.is_empty());

    let players = db
        .execute("SELECT player_id FROM Players ORDER BY player_id", &[])
        .await
        .unwrap();
    assert_eq!(players.len(), 3);
}

#[tokio::test]
async fn test_global_handle_installs_once() {
    let first = in_memory_database(Arc::new(basketball_source()));
    let second = in_memory_database(Arc::new(basketball_source()));

    // Other tests in this binary never install a global
    assert!(StatsDatabase::install_global(first).is_ok());
    assert!(StatsDatabase::install_global(second).is_err());

    let global = StatsDatabase::global().unwrap();
    global.initialize().await.unwrap();
    assert!(matches!(global.availability(), Availability::Ready { .. }));
}
