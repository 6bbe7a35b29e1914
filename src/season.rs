//! Season and identifier helpers
//!
//! Seasons are identified by their ending year: the 2023-24 season is `2024`.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// First season on record (1946-47 BAA)
pub const FIRST_SEASON: i32 = 1947;

static SEASON_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("Invalid regex"));
static SEASON_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})$").expect("Invalid regex"));
static PLAYER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]+[a-z0-9]*\d{2}$").expect("Invalid regex"));
static PLAYER_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/players/([a-z]+[a-z0-9]*\d{2})").expect("Invalid regex"));
static TEAM_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("Invalid regex"));
static TEAM_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/teams/([A-Z]{3})").expect("Invalid regex"));

/// `2024` -> `"2023-24"`; `None` before [`FIRST_SEASON`]
pub fn format_season(season: i32) -> Option<String> {
    if season < FIRST_SEASON {
        return None;
    }
    Some(format!("{}-{:02}", season - 1, season.rem_euclid(100)))
}

/// Parse `"2023-24"` or `"2024"` into an ending year
pub fn parse_season(input: &str) -> Option<i32> {
    let input = input.trim();
    if let Some(caps) = SEASON_RANGE.captures(input) {
        return caps[1].parse::<i32>().ok().map(|start| start + 1);
    }
    SEASON_YEAR
        .captures(input)
        .and_then(|caps| caps[1].parse().ok())
}

/// Season in progress on `date`; a new season starts in October
pub fn current_season(date: NaiveDate) -> i32 {
    if date.month() <= 9 {
        date.year()
    } else {
        date.year() + 1
    }
}

/// Season in progress today
pub fn current_season_today() -> i32 {
    current_season(chrono::Local::now().date_naive())
}

pub fn is_valid_season(season: i32) -> bool {
    (FIRST_SEASON..=current_season_today()).contains(&season)
}

/// Player id from a bare id or a `/players/<id>` path
pub fn extract_player_id(input: &str) -> Option<&str> {
    if PLAYER_ID.is_match(input) {
        return Some(input);
    }
    PLAYER_URL
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Team code from a bare code or a `/teams/<ABC>` path
pub fn extract_team_id(input: &str) -> Option<&str> {
    if TEAM_ID.is_match(input) {
        return Some(input);
    }
    TEAM_URL
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
