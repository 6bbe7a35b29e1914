//! Secondary indexes on the consolidated tables

use serde::{Deserialize, Serialize};

use crate::engine::{Engine, quote_ident};

/// One index definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

impl IndexSpec {
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({});",
            quote_ident(self.name),
            quote_ident(self.table),
            columns.join(", ")
        )
    }
}

pub const INDEXES: &[IndexSpec] = &[
    IndexSpec {
        name: "idx_players_player_id",
        table: "Players",
        columns: &["player_id"],
    },
    IndexSpec {
        name: "idx_team_season_records_team_season",
        table: "TeamSeasonRecords",
        columns: &["team_code", "season_id"],
    },
    IndexSpec {
        name: "idx_player_season_stats_player_season",
        table: "PlayerSeasonStats",
        columns: &["player_id", "season"],
    },
    IndexSpec {
        name: "idx_draft_picks_season",
        table: "DraftPicks",
        columns: &["season"],
    },
    IndexSpec {
        name: "idx_games_season",
        table: "Games",
        columns: &["season_id", "season_type"],
    },
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    pub created: Vec<String>,
    /// (index, reason)
    pub skipped: Vec<(String, String)>,
}

/// Create every index whose table exists; failures are logged and ignored
pub fn build_indexes(engine: &Engine) -> IndexReport {
    let mut report = IndexReport::default();

    for index in INDEXES {
        match engine.table_exists(index.table) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Skipping {}: {} does not exist", index.name, index.table);
                report
                    .skipped
                    .push((index.name.to_string(), format!("{} missing", index.table)));
                continue;
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", index.name, e);
                report.skipped.push((index.name.to_string(), e.to_string()));
                continue;
            }
        }

        match engine.execute_batch(&index.create_sql()) {
            Ok(()) => report.created.push(index.name.to_string()),
            Err(e) => {
                tracing::warn!("Failed to create {}: {}", index.name, e);
                report.skipped.push((index.name.to_string(), e.to_string()));
            }
        }
    }

    report
}

/// Drop every known index
pub fn drop_indexes(engine: &Engine) {
    for index in INDEXES {
        if let Err(e) =
            engine.execute_batch(&format!("DROP INDEX IF EXISTS {};", quote_ident(index.name)))
        {
            tracing::warn!("Failed to drop {}: {}", index.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sql() {
        assert_eq!(
            INDEXES[1].create_sql(),
            "CREATE INDEX IF NOT EXISTS \"idx_team_season_records_team_season\" \
             ON \"TeamSeasonRecords\" (\"team_code\", \"season_id\");"
        );
    }

    #[test]
    fn test_missing_tables_are_skipped() {
        let engine = Engine::in_memory().unwrap();
        engine
            .execute_batch("CREATE TABLE Players (player_id VARCHAR);")
            .unwrap();

        let report = build_indexes(&engine);
        assert_eq!(report.created, vec!["idx_players_player_id"]);
        assert_eq!(report.skipped.len(), INDEXES.len() - 1);

        // Idempotent
        let again = build_indexes(&engine);
        assert_eq!(again.created.len(), 1);

        drop_indexes(&engine);
        assert_eq!(build_indexes(&engine).created.len(), 1);
    }
}
