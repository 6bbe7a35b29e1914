//! Consolidated tables
//!
//! Derived tables are rebuilt from the raw per-file tables after every
//! ingest pass, in a fixed order (later builds join earlier ones). Each build
//! is a full `CREATE OR REPLACE TABLE ... AS`, so re-running is idempotent.
//! A missing optional input projects as typed NULLs; a missing driving input
//! fails that derived table only.

use serde::{Deserialize, Serialize};

use crate::engine::{Engine, quote_ident};

/// Tables that must exist for the database to be usable
pub const REQUIRED_TABLES: &[&str] = &["Players", "TeamSeasonRecords"];

/// Derived tables, in build order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerivedTable {
    Players,
    TeamSeasonRecords,
    PlayerSeasonStats,
    DraftPicks,
    Games,
}

impl DerivedTable {
    pub const ALL: [DerivedTable; 5] = [
        DerivedTable::Players,
        DerivedTable::TeamSeasonRecords,
        DerivedTable::PlayerSeasonStats,
        DerivedTable::DraftPicks,
        DerivedTable::Games,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DerivedTable::Players => "Players",
            DerivedTable::TeamSeasonRecords => "TeamSeasonRecords",
            DerivedTable::PlayerSeasonStats => "PlayerSeasonStats",
            DerivedTable::DraftPicks => "DraftPicks",
            DerivedTable::Games => "Games",
        }
    }

    pub fn is_required(&self) -> bool {
        REQUIRED_TABLES.contains(&self.name())
    }
}

impl std::fmt::Display for DerivedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for a single derived table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ConsolidationError {
    #[error("Cannot build {table}: driving table {input} is missing")]
    MissingDrivingTable { table: String, input: String },

    #[error("Failed to build {table}: {message}")]
    Build { table: String, message: String },
}

/// A derived table that was built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltTable {
    pub table: DerivedTable,
    pub rows: u64,
    /// Rows dropped by the table's first-wins key
    pub rejected_duplicates: u64,
}

/// Outcome of one consolidation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub built: Vec<BuiltTable>,
    pub failed: Vec<(DerivedTable, ConsolidationError)>,
}

impl ConsolidationReport {
    pub fn get(&self, table: DerivedTable) -> Option<&BuiltTable> {
        self.built.iter().find(|b| b.table == table)
    }

    pub fn is_built(&self, table: DerivedTable) -> bool {
        self.get(table).is_some()
    }
}

/// Build every derived table in order
pub fn consolidate(engine: &Engine) -> ConsolidationReport {
    let mut report = ConsolidationReport::default();

    for table in DerivedTable::ALL {
        match build(engine, table) {
            Ok(built) => {
                if built.rejected_duplicates > 0 {
                    tracing::warn!(
                        "{}: rejected {} duplicate row(s), first occurrence kept",
                        table,
                        built.rejected_duplicates
                    );
                }
                tracing::info!("Built {} ({} rows)", table, built.rows);
                report.built.push(built);
            }
            Err(e) => {
                if table.is_required() {
                    tracing::error!("{}", e);
                } else {
                    tracing::warn!("{}", e);
                }
                // A failed table is absent, never last run's copy
                let drop = format!("DROP TABLE IF EXISTS {};", quote_ident(table.name()));
                if let Err(drop_err) = engine.execute_batch(&drop) {
                    tracing::warn!("Failed to drop stale {}: {}", table, drop_err);
                }
                report.failed.push((table, e));
            }
        }
    }

    report
}

/// Build one derived table
pub fn build(engine: &Engine, table: DerivedTable) -> Result<BuiltTable, ConsolidationError> {
    let plan = match table {
        DerivedTable::Players => players(engine)?,
        DerivedTable::TeamSeasonRecords => team_season_records(engine)?,
        DerivedTable::PlayerSeasonStats => player_season_stats(engine)?,
        DerivedTable::DraftPicks => draft_picks(engine)?,
        DerivedTable::Games => games(engine)?,
    };

    let build_err = |e: crate::engine::EngineError| ConsolidationError::Build {
        table: table.name().to_string(),
        message: e.to_string(),
    };

    let candidates = match &plan.candidates_sql {
        Some(sql) => Some(engine.query_count(sql, &[]).map_err(build_err)?),
        None => None,
    };

    let statement = format!(
        "CREATE OR REPLACE TABLE {} AS\n{};",
        quote_ident(table.name()),
        plan.select_sql
    );
    engine.execute_batch(&statement).map_err(build_err)?;

    let rows = engine.row_count(table.name()).map_err(build_err)?.max(0) as u64;
    let rejected_duplicates = candidates
        .map(|c| (c.max(0) as u64).saturating_sub(rows))
        .unwrap_or(0);

    Ok(BuiltTable {
        table,
        rows,
        rejected_duplicates,
    })
}

struct BuildPlan {
    select_sql: String,
    /// Counts rows eligible before key dedupe
    candidates_sql: Option<String>,
}

fn exists(engine: &Engine, table: DerivedTable, input: &str) -> Result<bool, ConsolidationError> {
    engine
        .table_exists(input)
        .map_err(|e| ConsolidationError::Build {
            table: table.name().to_string(),
            message: e.to_string(),
        })
}

/// Whether an auto-detected input exists with all of `columns`
fn has_columns(
    engine: &Engine,
    table: DerivedTable,
    input: &str,
    columns: &[&str],
) -> Result<bool, ConsolidationError> {
    let mut params = vec![serde_json::Value::from(input)];
    params.extend(columns.iter().map(|c| serde_json::Value::from(*c)));
    let placeholders = vec!["lower(?)"; columns.len()].join(", ");
    let sql = format!(
        "SELECT COUNT(DISTINCT lower(column_name)) FROM information_schema.columns \
         WHERE table_schema = 'main' AND lower(table_name) = lower(?) \
         AND lower(column_name) IN ({})",
        placeholders
    );
    let found = engine
        .query_count(&sql, &params)
        .map_err(|e| ConsolidationError::Build {
            table: table.name().to_string(),
            message: e.to_string(),
        })?;
    Ok(found == columns.len() as i64)
}

fn require(engine: &Engine, table: DerivedTable, input: &str) -> Result<(), ConsolidationError> {
    if exists(engine, table, input)? {
        Ok(())
    } else {
        Err(ConsolidationError::MissingDrivingTable {
            table: table.name().to_string(),
            input: input.to_string(),
        })
    }
}

/// First row per key in source order
fn first_per_key(input: &str, key: &str, filter: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} QUALIFY row_number() OVER (PARTITION BY {} ORDER BY rowid) = 1",
        quote_ident(input),
        filter,
        key
    )
}

fn empty_relation(columns: &[(&str, &str)]) -> String {
    let projected: Vec<String> = columns
        .iter()
        .map(|(name, ty)| format!("CAST(NULL AS {}) AS {}", ty, name))
        .collect();
    format!("SELECT {} WHERE FALSE", projected.join(", "))
}

const RAW_PLAYER_DIRECTORY: &str = "raw_player_directory";
const RAW_PLAYER_BIO: &str = "raw_player_bio";
const RAW_TEAM_SUMMARIES: &str = "raw_team_summaries";
const RAW_DRAFT_HISTORY: &str = "raw_draft_history";
const RAW_GAME: &str = "raw_game";
const RAW_TEAM_ABBREV: &str = "raw_team_abbrev";

fn players(engine: &Engine) -> Result<BuildPlan, ConsolidationError> {
    let table = DerivedTable::Players;
    require(engine, table, RAW_PLAYER_DIRECTORY)?;

    let filter = "player_id IS NOT NULL";
    let bio = if exists(engine, table, RAW_PLAYER_BIO)? {
        first_per_key(RAW_PLAYER_BIO, "player_id", filter)
    } else {
        tracing::debug!("{} missing; biographical columns will be NULL", RAW_PLAYER_BIO);
        empty_relation(&[
            ("player_id", "VARCHAR"),
            ("position", "VARCHAR"),
            ("height", "VARCHAR"),
            ("weight", "INTEGER"),
            ("birth_date", "DATE"),
            ("college", "VARCHAR"),
            ("draft_year", "INTEGER"),
            ("draft_round", "INTEGER"),
            ("draft_number", "INTEGER"),
        ])
    };

    let select_sql = format!(
        "WITH directory AS ({directory}),
bio AS ({bio})
SELECT
    d.player_id,
    d.player_name,
    COALESCE(d.hof, FALSE) AS is_hall_of_famer,
    d.is_active,
    b.position,
    b.height,
    b.weight,
    b.birth_date,
    b.college,
    CASE
        WHEN b.draft_year IS NULL THEN NULL
        WHEN b.draft_round IS NULL OR b.draft_number IS NULL THEN CAST(b.draft_year AS VARCHAR)
        ELSE CAST(b.draft_year AS VARCHAR) || ' Round ' || CAST(b.draft_round AS VARCHAR)
            || ', Pick ' || CAST(b.draft_number AS VARCHAR)
    END AS draft,
    b.draft_year,
    d.first_seas AS first_season,
    d.last_seas AS last_season
FROM directory d
LEFT JOIN bio b ON b.player_id = d.player_id
ORDER BY d.player_id",
        directory = first_per_key(RAW_PLAYER_DIRECTORY, "player_id", filter),
    );

    Ok(BuildPlan {
        select_sql,
        candidates_sql: Some(format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            RAW_PLAYER_DIRECTORY, filter
        )),
    })
}

fn team_season_records(engine: &Engine) -> Result<BuildPlan, ConsolidationError> {
    require(engine, DerivedTable::TeamSeasonRecords, RAW_TEAM_SUMMARIES)?;

    let filter = "abbreviation IS NOT NULL AND season IS NOT NULL";
    let select_sql = format!(
        "SELECT
    abbreviation AS team_code,
    season AS season_id,
    team AS team_name,
    lg AS league,
    w AS wins,
    l AS losses,
    COALESCE(
        w_l_percent,
        CASE WHEN w + l > 0 THEN round(CAST(w AS DOUBLE) / (w + l), 3) END
    ) AS win_loss_percentage,
    playoffs AS made_playoffs,
    o_rtg AS offensive_rating,
    d_rtg AS defensive_rating,
    COALESCE(n_rtg, o_rtg - d_rtg) AS net_rating,
    pace,
    mov AS margin_of_victory,
    srs,
    coaches,
    top_ws AS top_player,
    pts AS points,
    trb AS rebounds,
    ast AS assists
FROM ({deduped}) AS summaries
ORDER BY season_id, team_code",
        deduped = first_per_key(RAW_TEAM_SUMMARIES, "abbreviation, season", filter)
    );

    Ok(BuildPlan {
        select_sql,
        candidates_sql: Some(format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            RAW_TEAM_SUMMARIES, filter
        )),
    })
}

/// Output columns of `PlayerSeasonStats` after `variant`, with types
const STAT_COLUMNS: &[(&str, &str)] = &[
    ("player_id", "VARCHAR"),
    ("season", "INTEGER"),
    ("team_code", "VARCHAR"),
    ("league", "VARCHAR"),
    ("position", "VARCHAR"),
    ("age", "INTEGER"),
    ("games", "INTEGER"),
    ("games_started", "INTEGER"),
    ("minutes", "DOUBLE"),
    ("fg", "DOUBLE"),
    ("fga", "DOUBLE"),
    ("fg_percent", "DOUBLE"),
    ("x3p", "DOUBLE"),
    ("x3pa", "DOUBLE"),
    ("x3p_percent", "DOUBLE"),
    ("ft", "DOUBLE"),
    ("fta", "DOUBLE"),
    ("ft_percent", "DOUBLE"),
    ("orb", "DOUBLE"),
    ("drb", "DOUBLE"),
    ("trb", "DOUBLE"),
    ("ast", "DOUBLE"),
    ("stl", "DOUBLE"),
    ("blk", "DOUBLE"),
    ("tov", "DOUBLE"),
    ("pf", "DOUBLE"),
    ("pts", "DOUBLE"),
    ("per", "DOUBLE"),
    ("ts_percent", "DOUBLE"),
    ("usg_percent", "DOUBLE"),
    ("ows", "DOUBLE"),
    ("dws", "DOUBLE"),
    ("ws", "DOUBLE"),
    ("ws_per_48", "DOUBLE"),
    ("obpm", "DOUBLE"),
    ("dbpm", "DOUBLE"),
    ("bpm", "DOUBLE"),
    ("vorp", "DOUBLE"),
];

const COUNTING_STATS: &[&str] = &[
    "fg", "fga", "x3p", "x3pa", "ft", "fta", "orb", "drb", "trb", "ast", "stl", "blk", "tov",
    "pf", "pts",
];
const SHOOTING_PERCENTAGES: &[&str] = &["fg_percent", "x3p_percent", "ft_percent"];
const ADVANCED_STATS: &[&str] = &[
    "per", "ts_percent", "usg_percent", "ows", "dws", "ws", "obpm", "dbpm", "bpm", "vorp",
];

/// Stat line variants and the raw table each comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatVariant {
    PerGame,
    Totals,
    Advanced,
    PlayoffsPerGame,
}

impl StatVariant {
    pub const ALL: [StatVariant; 4] = [
        StatVariant::PerGame,
        StatVariant::Totals,
        StatVariant::Advanced,
        StatVariant::PlayoffsPerGame,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatVariant::PerGame => "per_game",
            StatVariant::Totals => "totals",
            StatVariant::Advanced => "advanced",
            StatVariant::PlayoffsPerGame => "playoffs_per_game",
        }
    }

    pub fn raw_table(&self) -> &'static str {
        match self {
            StatVariant::PerGame => "raw_player_per_game",
            StatVariant::Totals => "raw_player_totals",
            StatVariant::Advanced => "raw_player_advanced",
            StatVariant::PlayoffsPerGame => "raw_player_playoffs_per_game",
        }
    }

    /// Raw column feeding an output column, if this variant carries it
    fn source_column(&self, output: &str) -> Option<String> {
        let per_game = matches!(self, StatVariant::PerGame | StatVariant::PlayoffsPerGame);
        match output {
            "player_id" | "season" | "age" => Some(output.to_string()),
            "team_code" => Some("tm".to_string()),
            "league" => Some("lg".to_string()),
            "position" => Some("pos".to_string()),
            "games" => Some("g".to_string()),
            "games_started" if *self != StatVariant::Advanced => Some("gs".to_string()),
            "minutes" if per_game => Some("mp_per_game".to_string()),
            "minutes" => Some("mp".to_string()),
            "ws_per_48" if *self == StatVariant::Advanced => Some("ws_48".to_string()),
            stat if COUNTING_STATS.contains(&stat) => match self {
                StatVariant::PerGame | StatVariant::PlayoffsPerGame => {
                    Some(format!("{}_per_game", stat))
                }
                StatVariant::Totals => Some(stat.to_string()),
                StatVariant::Advanced => None,
            },
            stat if SHOOTING_PERCENTAGES.contains(&stat) => {
                (*self != StatVariant::Advanced).then(|| stat.to_string())
            }
            stat if ADVANCED_STATS.contains(&stat) => {
                (*self == StatVariant::Advanced).then(|| stat.to_string())
            }
            _ => None,
        }
    }

    fn select_sql(&self) -> String {
        let columns: Vec<String> = STAT_COLUMNS
            .iter()
            .map(|(name, ty)| match self.source_column(name) {
                Some(source) => format!("CAST({} AS {}) AS {}", quote_ident(&source), ty, name),
                None => format!("CAST(NULL AS {}) AS {}", ty, name),
            })
            .collect();

        format!(
            "SELECT '{variant}' AS variant, {columns}
FROM {table}
WHERE player_id IS NOT NULL AND season IS NOT NULL AND tm IS NOT NULL
QUALIFY row_number() OVER (PARTITION BY player_id, season, tm ORDER BY rowid) = 1",
            variant = self.as_str(),
            columns = columns.join(", "),
            table = quote_ident(self.raw_table()),
        )
    }
}

fn player_season_stats(engine: &Engine) -> Result<BuildPlan, ConsolidationError> {
    let table = DerivedTable::PlayerSeasonStats;

    let mut parts = Vec::new();
    for variant in StatVariant::ALL {
        if exists(engine, table, variant.raw_table())? {
            parts.push(variant.select_sql());
        } else {
            tracing::debug!("{} missing; no {} rows", variant.raw_table(), variant.as_str());
        }
    }

    if parts.is_empty() {
        let inputs: Vec<&str> = StatVariant::ALL.iter().map(|v| v.raw_table()).collect();
        return Err(ConsolidationError::MissingDrivingTable {
            table: table.name().to_string(),
            input: inputs.join(" | "),
        });
    }

    let stat_columns: Vec<&str> = STAT_COLUMNS[8..].iter().map(|(name, _)| *name).collect();
    let select_sql = format!(
        "SELECT
    player_id, season, team_code, variant, league, position, age, games, games_started,
    (team_code = 'TOT' OR regexp_matches(team_code, '^[0-9]+TM$')) AS is_multi_team_total,
    {stats}
FROM (
{union}
) AS stats
ORDER BY player_id, season, variant, is_multi_team_total, team_code",
        stats = stat_columns.join(", "),
        union = parts.join("\nUNION ALL\n"),
    );

    Ok(BuildPlan {
        select_sql,
        candidates_sql: None,
    })
}

fn draft_picks(engine: &Engine) -> Result<BuildPlan, ConsolidationError> {
    let table = DerivedTable::DraftPicks;
    require(engine, table, RAW_DRAFT_HISTORY)?;

    let players = if exists(engine, table, "Players")? {
        "SELECT player_id, player_name FROM Players".to_string()
    } else {
        empty_relation(&[("player_id", "VARCHAR"), ("player_name", "VARCHAR")])
    };
    let teams = if exists(engine, table, "TeamSeasonRecords")? {
        "SELECT team_code, season_id, team_name FROM TeamSeasonRecords".to_string()
    } else {
        empty_relation(&[
            ("team_code", "VARCHAR"),
            ("season_id", "INTEGER"),
            ("team_name", "VARCHAR"),
        ])
    };

    // Latest franchise name per abbreviation, for picks with no next-season record
    let abbrev_columns = ["abbreviation", "team", "season"];
    let abbrevs = if has_columns(engine, table, RAW_TEAM_ABBREV, &abbrev_columns)? {
        format!(
            "SELECT CAST(abbreviation AS VARCHAR) AS team_code, \
             arg_max(CAST(team AS VARCHAR), TRY_CAST(season AS INTEGER)) AS team_name \
             FROM {} WHERE abbreviation IS NOT NULL GROUP BY 1",
            RAW_TEAM_ABBREV
        )
    } else {
        empty_relation(&[("team_code", "VARCHAR"), ("team_name", "VARCHAR")])
    };

    let filter = "draft_year IS NOT NULL AND overall_pick IS NOT NULL";
    let select_sql = format!(
        "SELECT
    dh.draft_year AS season,
    dh.overall_pick,
    dh.round_number,
    dh.round_pick,
    p.player_id,
    COALESCE(p.player_name, dh.player) AS player_name,
    dh.team_code,
    COALESCE(t.team_name, ta.team_name) AS team_name,
    dh.college
FROM ({deduped}) AS dh
LEFT JOIN ({players}) AS p ON p.player_id = dh.player_id
LEFT JOIN ({teams}) AS t ON t.team_code = dh.team_code AND t.season_id = dh.draft_year + 1
LEFT JOIN ({abbrevs}) AS ta ON ta.team_code = dh.team_code
ORDER BY season, dh.overall_pick",
        deduped = first_per_key(RAW_DRAFT_HISTORY, "draft_year, overall_pick", filter),
    );

    Ok(BuildPlan {
        select_sql,
        candidates_sql: Some(format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            RAW_DRAFT_HISTORY, filter
        )),
    })
}

fn games(engine: &Engine) -> Result<BuildPlan, ConsolidationError> {
    require(engine, DerivedTable::Games, RAW_GAME)?;

    let filter = "game_id IS NOT NULL AND season_type IS NOT NULL";
    let select_sql = format!(
        "SELECT
    CAST(game_id AS VARCHAR) AS game_id,
    TRY_CAST(game_date AS DATE) AS game_date,
    TRY_CAST(season_id AS INTEGER) AS season_id,
    CAST(season_type AS VARCHAR) AS season_type,
    CAST(team_abbreviation_home AS VARCHAR) AS home_team_code,
    CAST(team_abbreviation_away AS VARCHAR) AS away_team_code,
    TRY_CAST(pts_home AS INTEGER) AS home_points,
    TRY_CAST(pts_away AS INTEGER) AS away_points
FROM ({deduped}) AS g
ORDER BY game_date, game_id",
        deduped = first_per_key(RAW_GAME, "game_id", filter),
    );

    Ok(BuildPlan {
        select_sql,
        candidates_sql: Some(format!("SELECT COUNT(*) FROM {} WHERE {}", RAW_GAME, filter)),
    })
}
