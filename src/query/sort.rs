//! Sorting and paging for table views
//!
//! ORDER BY identifiers cannot be bound as parameters, so sortable columns
//! come from a fixed allow-list. LIMIT/OFFSET values are bound.

use serde::{Deserialize, Serialize};

/// Columns table views may sort on
pub const ALLOWED_SORT_COLUMNS: &[&str] = &[
    // per-season stat tables
    "season", "league", "team_code", "position", "age", "games", "games_started", "minutes",
    "fg", "fga", "fg_percent", "x3p", "x3pa", "x3p_percent", "ft", "fta", "ft_percent", "orb",
    "drb", "trb", "ast", "stl", "blk", "tov", "pf", "pts", "per", "ts_percent", "usg_percent",
    "ows", "dws", "ws", "ws_per_48", "obpm", "dbpm", "bpm", "vorp", "stat_value",
    // players
    "player_id", "player_name", "height", "weight", "birth_date", "college", "first_season",
    "last_season",
    // team seasons
    "season_id", "team_name", "wins", "losses", "win_loss_percentage", "offensive_rating",
    "defensive_rating", "net_rating", "pace", "margin_of_victory", "srs", "start_year",
    "end_year",
    // drafts and games
    "draft_year", "round_number", "round_pick", "overall_pick", "game_date", "home_points",
    "away_points",
];

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Error type for rejected table requests
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SortError {
    #[error("Sorting not allowed on column: {0}")]
    ColumnNotAllowed(String),

    #[error("Page size must be between 1 and 1000, got {0}")]
    InvalidPageSize(u32),
}

/// A validated sortable column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct SortKey(&'static str);

impl SortKey {
    pub fn parse(column: &str) -> Result<Self, SortError> {
        ALLOWED_SORT_COLUMNS
            .iter()
            .find(|allowed| **allowed == column)
            .map(|allowed| SortKey(allowed))
            .ok_or_else(|| SortError::ColumnNotAllowed(column.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl TryFrom<String> for SortKey {
    type Error = SortError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SortKey::parse(&value)
    }
}

impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let column = String::deserialize(deserializer)?;
        SortKey::parse(&column).map_err(serde::de::Error::custom)
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.0.to_string()
    }
}

impl std::str::FromStr for SortKey {
    type Err = SortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// LIMIT/OFFSET window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPage")]
pub struct Page {
    pub size: u32,
    /// Zero-based page index
    pub index: u32,
}

#[derive(Deserialize)]
struct RawPage {
    size: u32,
    index: u32,
}

impl TryFrom<RawPage> for Page {
    type Error = SortError;

    fn try_from(raw: RawPage) -> Result<Self, Self::Error> {
        Page::new(raw.size, raw.index)
    }
}

impl Page {
    pub fn new(size: u32, index: u32) -> Result<Self, SortError> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(SortError::InvalidPageSize(size));
        }
        Ok(Self { size, index })
    }

    pub fn offset(&self) -> u64 {
        self.size as u64 * self.index as u64
    }
}

/// Sort and paging applied on top of a base query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRequest {
    pub sort: Option<(SortKey, SortDirection)>,
    pub page: Option<Page>,
}

impl TableRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sorted(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.sort = Some((key, direction));
        self
    }

    pub fn paged(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// Sort on `key`; asking again for the ascending key flips it to descending
    pub fn request_sort(&mut self, key: SortKey) {
        let direction = match &self.sort {
            Some((current, SortDirection::Ascending)) if *current == key => {
                SortDirection::Descending
            }
            _ => SortDirection::Ascending,
        };
        self.sort = Some((key, direction));
    }

    /// Wrap `base_sql` and append bound paging parameters to `params`
    ///
    /// The base query is wrapped as a subquery so its own ORDER BY/LIMIT
    /// clauses (and trailing semicolons) stay intact.
    pub fn apply(&self, base_sql: &str, params: &mut Vec<serde_json::Value>) -> String {
        if self.sort.is_none() && self.page.is_none() {
            return base_sql.to_string();
        }

        let base = base_sql.trim().trim_end_matches(';');
        let mut sql = format!("SELECT * FROM ({}) AS base", base);

        if let Some((key, direction)) = &self.sort {
            sql.push_str(&format!(
                " ORDER BY \"{}\" {} NULLS LAST",
                key.as_str(),
                direction.as_sql()
            ));
        }

        if let Some(page) = &self.page {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(serde_json::Value::from(page.size));
            params.push(serde_json::Value::from(page.offset()));
        }

        sql
    }
}
