//! Query gateway, canned query and config wiring tests

mod common;

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use common::*;
use hoops_stats::query::catalog;
use hoops_stats::{
    LeaderStat, Page, QueryError, SortDirection, SortKey, StatVariant, StatsConfig,
    StatsDatabase, TableRequest,
};

async fn ready_database() -> StatsDatabase {
    let db = in_memory_database(Arc::new(basketball_source()));
    db.initialize().await.unwrap();
    db
}

#[tokio::test]
async fn test_select_literal() {
    let db = ready_database().await;
    let rows = db.execute("SELECT 1 AS x", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["x"], json!(1));
}

#[tokio::test]
async fn test_malformed_sql_is_typed_error() {
    let db = ready_database().await;
    let sql = "SELEC player_id FROM Players";

    let err = db.execute(sql, &[]).await.unwrap_err();
    assert!(matches!(err, QueryError::Execution(_)));
    assert_eq!(err.query(), Some(sql));

    let err = db
        .execute("SELECT * FROM NoSuchTable", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Execution(_)));
}

#[tokio::test]
async fn test_empty_result_is_not_an_error() {
    let db = ready_database().await;
    let rows = db
        .execute(
            "SELECT * FROM Players WHERE player_id = ?",
            &[json!("nobody01")],
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_parameters_are_bound() {
    let db = ready_database().await;

    // A quote in a bound value is data, not syntax
    let rows = db
        .execute(
            "SELECT player_id FROM Players WHERE player_name = ?",
            &[json!("Tim Duncan' OR '1'='1")],
        )
        .await
        .unwrap();
    assert!(rows.is_empty());

    let rows = db
        .execute(
            "SELECT player_id FROM Players WHERE first_season = ? AND is_active = ?",
            &[json!(2004), json!(true)],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["player_id"], json!("jamesle01"));
}

#[tokio::test]
async fn test_execute_table_sorts_and_pages() {
    let db = ready_database().await;
    let base = "SELECT team_code, wins FROM TeamSeasonRecords ORDER BY team_code;";
    let wins = SortKey::parse("wins").unwrap();

    let first = TableRequest::new()
        .sorted(wins.clone(), SortDirection::Descending)
        .paged(Page::new(2, 0).unwrap());
    let result = db.execute_table(base, &[], &first).await.unwrap();
    let codes: Vec<_> = result.rows.iter().map(|r| r["team_code"].clone()).collect();
    assert_eq!(codes, vec![json!("BOS"), json!("SAS")]);

    let second = TableRequest::new()
        .sorted(wins, SortDirection::Descending)
        .paged(Page::new(2, 1).unwrap());
    let result = db.execute_table(base, &[], &second).await.unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.rows[0]["team_code"], json!("CLE"));
}

#[tokio::test]
async fn test_sort_key_rejects_unknown_columns() {
    assert!(SortKey::parse("wins DESC; DROP TABLE Players").is_err());
    assert!(Page::new(0, 0).is_err());

    let request: Result<TableRequest, _> = serde_json::from_value(json!({
        "sort": ["player_name; --", "ascending"],
        "page": null
    }));
    assert!(request.is_err());
}

#[tokio::test]
async fn test_season_leaders_skip_multi_team_rows() {
    let db = ready_database().await;

    let rows = db
        .run(&catalog::season_leaders(2025, LeaderStat::Points, 10))
        .await
        .unwrap();
    let teams: Vec<_> = rows.iter().map(|r| r["team_code"].clone()).collect();
    assert_eq!(teams, vec![json!("LAL"), json!("BOS")]);
    assert_eq!(rows[0]["player_name"], json!("Rookie Example"));

    let rows = db
        .run(&catalog::season_leaders(2004, LeaderStat::WinShares, 1))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["player_id"], json!("duncati01"));
}

#[tokio::test]
async fn test_player_seasons_keep_aggregate_last() {
    let db = ready_database().await;

    let rows = db
        .run(&catalog::player_seasons("rookiex01", StatVariant::PerGame))
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2]["team_code"], json!("2TM"));
    assert_eq!(rows[2]["is_multi_team_total"], json!(true));
}

#[tokio::test]
async fn test_team_and_season_queries() {
    let db = ready_database().await;

    let teams = db.run(&catalog::teams_index()).await.unwrap();
    assert_eq!(teams.len(), 3);

    let latest = db.run(&catalog::latest_season()).await.unwrap();
    assert_eq!(latest[0]["season"], json!(2025));

    let standings = db.run(&catalog::season_standings(2004)).await.unwrap();
    let codes: Vec<_> = standings.iter().map(|r| r["team_code"].clone()).collect();
    assert_eq!(codes, vec![json!("SAS"), json!("CLE")]);

    let roster = db.run(&catalog::team_roster("CLE", 2004)).await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["player_name"], json!("LeBron James"));
}

#[tokio::test]
async fn test_draft_and_playoff_queries() {
    let db = ready_database().await;

    let class = db.run(&catalog::draft_class(2003)).await.unwrap();
    assert_eq!(class.len(), 2);
    assert_eq!(class[0]["player_name"], json!("LeBron James"));

    let years = db.run(&catalog::draft_years()).await.unwrap();
    assert_eq!(years.len(), 2);
    assert_eq!(years[0]["season"], json!(2003));

    let games = db
        .run(&catalog::playoff_games(42004, Some("SAS")))
        .await
        .unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0]["home_team_code"], json!("SAS"));

    let none = db
        .run(&catalog::playoff_games(42004, Some("CLE")))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_config_opens_directory_backed_database() {
    let dir = TempDir::new().unwrap();
    let csv_dir = dir.path().join("csv");
    std::fs::create_dir(&csv_dir).unwrap();
    std::fs::write(csv_dir.join("Player Directory.csv"), PLAYER_DIRECTORY).unwrap();
    std::fs::write(csv_dir.join("Team Summaries.csv"), TEAM_SUMMARIES).unwrap();

    let db = StatsConfig::in_memory("csv")
        .open_database(dir.path())
        .unwrap();
    let summary = db.initialize().await.unwrap();
    assert!(!summary.from_cache);

    let rows = db.run(&catalog::team_season("CLE", 2004)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["wins"], json!(35));
    assert_eq!(rows[0]["team_name"], json!("Cleveland Cavaliers"));
}
