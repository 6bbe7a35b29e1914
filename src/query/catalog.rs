//! Canned queries over the consolidated tables
//!
//! Every value is bound as a parameter. Season and leader views exclude the
//! multi-team aggregate rows (`TOT`, `2TM`, ...); career views keep them,
//! ordered after the per-team stints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consolidate::StatVariant;

/// A query ready to hand to [`crate::StatsDatabase::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct CannedQuery {
    pub name: &'static str,
    pub sql: String,
    pub params: Vec<Value>,
}

impl CannedQuery {
    fn new(name: &'static str, sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            name,
            sql: sql.into(),
            params,
        }
    }
}

/// Stats a season leaderboard can rank on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderStat {
    Points,
    Rebounds,
    Assists,
    Steals,
    Blocks,
    Minutes,
    FieldGoalPercent,
    ThreePointPercent,
    FreeThrowPercent,
    PlayerEfficiency,
    TrueShootingPercent,
    UsagePercent,
    WinShares,
    WinSharesPer48,
    BoxPlusMinus,
    ValueOverReplacement,
}

impl LeaderStat {
    pub const ALL: [LeaderStat; 16] = [
        LeaderStat::Points,
        LeaderStat::Rebounds,
        LeaderStat::Assists,
        LeaderStat::Steals,
        LeaderStat::Blocks,
        LeaderStat::Minutes,
        LeaderStat::FieldGoalPercent,
        LeaderStat::ThreePointPercent,
        LeaderStat::FreeThrowPercent,
        LeaderStat::PlayerEfficiency,
        LeaderStat::TrueShootingPercent,
        LeaderStat::UsagePercent,
        LeaderStat::WinShares,
        LeaderStat::WinSharesPer48,
        LeaderStat::BoxPlusMinus,
        LeaderStat::ValueOverReplacement,
    ];

    /// `PlayerSeasonStats` column ranked on
    pub fn column(&self) -> &'static str {
        match self {
            LeaderStat::Points => "pts",
            LeaderStat::Rebounds => "trb",
            LeaderStat::Assists => "ast",
            LeaderStat::Steals => "stl",
            LeaderStat::Blocks => "blk",
            LeaderStat::Minutes => "minutes",
            LeaderStat::FieldGoalPercent => "fg_percent",
            LeaderStat::ThreePointPercent => "x3p_percent",
            LeaderStat::FreeThrowPercent => "ft_percent",
            LeaderStat::PlayerEfficiency => "per",
            LeaderStat::TrueShootingPercent => "ts_percent",
            LeaderStat::UsagePercent => "usg_percent",
            LeaderStat::WinShares => "ws",
            LeaderStat::WinSharesPer48 => "ws_per_48",
            LeaderStat::BoxPlusMinus => "bpm",
            LeaderStat::ValueOverReplacement => "vorp",
        }
    }

    /// Stat line variant the column is read from
    pub fn variant(&self) -> StatVariant {
        match self {
            LeaderStat::PlayerEfficiency
            | LeaderStat::TrueShootingPercent
            | LeaderStat::UsagePercent
            | LeaderStat::WinShares
            | LeaderStat::WinSharesPer48
            | LeaderStat::BoxPlusMinus
            | LeaderStat::ValueOverReplacement => StatVariant::Advanced,
            _ => StatVariant::PerGame,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderStat::Points => "points",
            LeaderStat::Rebounds => "rebounds",
            LeaderStat::Assists => "assists",
            LeaderStat::Steals => "steals",
            LeaderStat::Blocks => "blocks",
            LeaderStat::Minutes => "minutes",
            LeaderStat::FieldGoalPercent => "field_goal_percent",
            LeaderStat::ThreePointPercent => "three_point_percent",
            LeaderStat::FreeThrowPercent => "free_throw_percent",
            LeaderStat::PlayerEfficiency => "player_efficiency",
            LeaderStat::TrueShootingPercent => "true_shooting_percent",
            LeaderStat::UsagePercent => "usage_percent",
            LeaderStat::WinShares => "win_shares",
            LeaderStat::WinSharesPer48 => "win_shares_per_48",
            LeaderStat::BoxPlusMinus => "box_plus_minus",
            LeaderStat::ValueOverReplacement => "value_over_replacement",
        }
    }
}

impl std::str::FromStr for LeaderStat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        LeaderStat::ALL
            .iter()
            .find(|stat| stat.as_str() == wanted || stat.column() == wanted)
            .copied()
            .ok_or_else(|| format!("Unknown leader stat: {}", s))
    }
}

impl std::fmt::Display for LeaderStat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn players_index() -> CannedQuery {
    CannedQuery::new(
        "players_index",
        "SELECT player_id, player_name, position, first_season, last_season, is_active, \
         is_hall_of_famer FROM Players ORDER BY player_name, player_id",
        vec![],
    )
}

pub fn player_profile(player_id: &str) -> CannedQuery {
    CannedQuery::new(
        "player_profile",
        "SELECT * FROM Players WHERE player_id = ?",
        vec![Value::from(player_id)],
    )
}

/// Career lines for one variant, aggregate rows after the stints
pub fn player_seasons(player_id: &str, variant: StatVariant) -> CannedQuery {
    CannedQuery::new(
        "player_seasons",
        "SELECT * FROM PlayerSeasonStats WHERE player_id = ? AND variant = ? \
         ORDER BY season, is_multi_team_total, team_code",
        vec![Value::from(player_id), Value::from(variant.as_str())],
    )
}

pub fn teams_index() -> CannedQuery {
    CannedQuery::new(
        "teams_index",
        "SELECT team_code, arg_max(team_name, season_id) AS team_name, \
         min(season_id) AS start_year, max(season_id) AS end_year, \
         sum(wins) AS wins, sum(losses) AS losses \
         FROM TeamSeasonRecords GROUP BY team_code ORDER BY team_name, team_code",
        vec![],
    )
}

pub fn team_history(team_code: &str) -> CannedQuery {
    CannedQuery::new(
        "team_history",
        "SELECT * FROM TeamSeasonRecords WHERE team_code = ? ORDER BY season_id DESC",
        vec![Value::from(team_code)],
    )
}

pub fn team_season(team_code: &str, season: i32) -> CannedQuery {
    CannedQuery::new(
        "team_season",
        "SELECT * FROM TeamSeasonRecords WHERE team_code = ? AND season_id = ?",
        vec![Value::from(team_code), Value::from(season)],
    )
}

pub fn team_roster(team_code: &str, season: i32) -> CannedQuery {
    CannedQuery::new(
        "team_roster",
        "SELECT s.player_id, p.player_name, s.position, s.age, s.games, s.games_started, \
         s.minutes, s.pts, s.trb, s.ast \
         FROM PlayerSeasonStats s LEFT JOIN Players p ON p.player_id = s.player_id \
         WHERE s.team_code = ? AND s.season = ? AND s.variant = 'per_game' \
         ORDER BY s.minutes DESC NULLS LAST, s.player_id",
        vec![Value::from(team_code), Value::from(season)],
    )
}

pub fn season_standings(season: i32) -> CannedQuery {
    CannedQuery::new(
        "season_standings",
        "SELECT team_code, team_name, league, wins, losses, win_loss_percentage, \
         made_playoffs, net_rating, srs FROM TeamSeasonRecords WHERE season_id = ? \
         ORDER BY win_loss_percentage DESC NULLS LAST, wins DESC, team_code",
        vec![Value::from(season)],
    )
}

pub fn season_leaders(season: i32, stat: LeaderStat, limit: u32) -> CannedQuery {
    let sql = format!(
        "SELECT s.player_id, p.player_name, s.team_code, s.games, s.{column} AS stat_value \
         FROM PlayerSeasonStats s LEFT JOIN Players p ON p.player_id = s.player_id \
         WHERE s.season = ? AND s.variant = ? AND NOT s.is_multi_team_total \
         AND s.{column} IS NOT NULL \
         ORDER BY stat_value DESC, s.player_id LIMIT ?",
        column = stat.column()
    );
    CannedQuery::new(
        "season_leaders",
        sql,
        vec![
            Value::from(season),
            Value::from(stat.variant().as_str()),
            Value::from(limit),
        ],
    )
}

pub fn latest_season() -> CannedQuery {
    CannedQuery::new(
        "latest_season",
        "SELECT max(season_id) AS season FROM TeamSeasonRecords",
        vec![],
    )
}

pub fn draft_years() -> CannedQuery {
    CannedQuery::new(
        "draft_years",
        "SELECT DISTINCT season FROM DraftPicks ORDER BY season DESC",
        vec![],
    )
}

pub fn draft_class(season: i32) -> CannedQuery {
    CannedQuery::new(
        "draft_class",
        "SELECT * FROM DraftPicks WHERE season = ? ORDER BY overall_pick",
        vec![Value::from(season)],
    )
}

/// Playoff games for a stored season id, optionally for one team
pub fn playoff_games(season_id: i64, team_code: Option<&str>) -> CannedQuery {
    let mut sql = String::from(
        "SELECT * FROM Games WHERE season_type = 'Playoffs' AND season_id = ?",
    );
    let mut params = vec![Value::from(season_id)];
    if let Some(team) = team_code {
        sql.push_str(" AND (home_team_code = ? OR away_team_code = ?)");
        params.push(Value::from(team));
        params.push(Value::from(team));
    }
    sql.push_str(" ORDER BY game_date, game_id");
    CannedQuery::new("playoff_games", sql, params)
}
