//! Dataset registry
//!
//! A static, ordered list of CSV datasets and how each one becomes a raw
//! table. Every entry carries its own load policy (explicit typed schema or
//! automatic detection), so adding a dataset is a data change rather than a
//! code change. Order matters: the consolidation step reads raw tables only
//! after every entry has been attempted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Error type for registry construction
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry declares no datasets
    #[error("Registry declares no datasets")]
    Empty,

    /// Two datasets load into the same table
    #[error("Duplicate target table: {0}")]
    DuplicateTable(String),

    /// A table or column name is not a plain SQL identifier
    #[error("Invalid identifier '{name}' in dataset {dataset}")]
    InvalidIdentifier { dataset: String, name: String },

    /// An explicit schema declares the same column twice
    #[error("Duplicate column '{column}' in dataset {dataset}")]
    DuplicateColumn { dataset: String, column: String },

    /// An explicit schema without columns
    #[error("Explicit schema for {0} declares no columns")]
    NoColumns(String),

    /// Failed to read or parse a registry file
    #[error("Failed to parse registry: {0}")]
    Parse(String),
}

/// Column types the table builder knows how to coerce into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    Varchar,
    Integer,
    BigInt,
    Double,
    Boolean,
    Date,
}

impl SqlType {
    /// DuckDB type name
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Varchar => "VARCHAR",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Date => "DATE",
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One column of an explicit schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name in the target table
    pub name: String,
    /// Target type; unparseable source values become NULL
    #[serde(rename = "type")]
    pub sql_type: SqlType,
    /// CSV header the column is read from (defaults to `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            source: None,
        }
    }

    /// Read this column from a differently named CSV header
    pub fn from_header(mut self, header: impl Into<String>) -> Self {
        self.source = Some(header.into());
        self
    }

    /// The CSV header this column maps from
    pub fn header(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }
}

/// How a dataset's raw table is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum LoadMode {
    /// Declared columns and types, mapped from headers by name
    Explicit { columns: Vec<ColumnSpec> },
    /// Columns and types inferred from the file contents
    Auto,
}

/// A single registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// File name as served by the CSV source
    pub source_file: String,
    /// Raw table the file is loaded into
    pub target_table: String,
    #[serde(flatten)]
    pub mode: LoadMode,
    /// Missing optional datasets are logged and skipped
    #[serde(default)]
    pub optional: bool,
}

impl DatasetDescriptor {
    pub fn explicit(
        source_file: impl Into<String>,
        target_table: impl Into<String>,
        columns: Vec<ColumnSpec>,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            target_table: target_table.into(),
            mode: LoadMode::Explicit { columns },
            optional: false,
        }
    }

    pub fn auto(source_file: impl Into<String>, target_table: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            target_table: target_table.into(),
            mode: LoadMode::Auto,
            optional: false,
        }
    }

    /// Mark the dataset optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Declared columns, if the schema is explicit
    pub fn columns(&self) -> Option<&[ColumnSpec]> {
        match &self.mode {
            LoadMode::Explicit { columns } => Some(columns),
            LoadMode::Auto => None,
        }
    }
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(rename = "dataset", default)]
    datasets: Vec<DatasetDescriptor>,
}

#[derive(Serialize)]
struct RegistryFileRef<'a> {
    #[serde(rename = "dataset")]
    datasets: &'a [DatasetDescriptor],
}

/// Ordered, validated collection of dataset descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    datasets: Vec<DatasetDescriptor>,
}

impl SchemaRegistry {
    /// Build a registry, validating names and uniqueness
    pub fn new(datasets: Vec<DatasetDescriptor>) -> Result<Self, RegistryError> {
        if datasets.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut tables = HashSet::new();
        for dataset in &datasets {
            if !is_identifier(&dataset.target_table) {
                return Err(RegistryError::InvalidIdentifier {
                    dataset: dataset.source_file.clone(),
                    name: dataset.target_table.clone(),
                });
            }
            if !tables.insert(dataset.target_table.to_lowercase()) {
                return Err(RegistryError::DuplicateTable(dataset.target_table.clone()));
            }

            if let LoadMode::Explicit { columns } = &dataset.mode {
                if columns.is_empty() {
                    return Err(RegistryError::NoColumns(dataset.source_file.clone()));
                }
                let mut names = HashSet::new();
                for column in columns {
                    if !is_identifier(&column.name) {
                        return Err(RegistryError::InvalidIdentifier {
                            dataset: dataset.source_file.clone(),
                            name: column.name.clone(),
                        });
                    }
                    if !names.insert(column.name.to_lowercase()) {
                        return Err(RegistryError::DuplicateColumn {
                            dataset: dataset.source_file.clone(),
                            column: column.name.clone(),
                        });
                    }
                }
            }
        }

        Ok(Self { datasets })
    }

    /// Parse a registry declared as TOML `[[dataset]]` tables
    pub fn from_toml(content: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            toml::from_str(content).map_err(|e| RegistryError::Parse(e.to_string()))?;
        Self::new(file.datasets)
    }

    /// Load a registry file from disk
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Serialize the registry back to TOML
    pub fn to_toml(&self) -> Result<String, RegistryError> {
        toml::to_string_pretty(&RegistryFileRef {
            datasets: &self.datasets,
        })
        .map_err(|e| RegistryError::Parse(e.to_string()))
    }

    pub fn datasets(&self) -> &[DatasetDescriptor] {
        &self.datasets
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.datasets.iter()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Look up a dataset by target table (case-insensitive)
    pub fn get(&self, target_table: &str) -> Option<&DatasetDescriptor> {
        self.datasets
            .iter()
            .find(|d| d.target_table.eq_ignore_ascii_case(target_table))
    }

    /// The built-in basketball dataset list
    pub fn basketball() -> Self {
        Self {
            datasets: basketball_datasets(),
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::basketball()
    }
}

/// True for plain `[A-Za-z_][A-Za-z0-9_]*` identifiers
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn col(name: &str, sql_type: SqlType) -> ColumnSpec {
    ColumnSpec::new(name, sql_type)
}

fn per_game_columns() -> Vec<ColumnSpec> {
    use SqlType::*;
    vec![
        col("seas_id", Integer),
        col("season", Integer),
        col("player_id", Varchar),
        col("player", Varchar),
        col("pos", Varchar),
        col("age", Integer),
        col("experience", Integer),
        col("lg", Varchar),
        col("tm", Varchar),
        col("g", Integer),
        col("gs", Integer),
        col("mp_per_game", Double),
        col("fg_per_game", Double),
        col("fga_per_game", Double),
        col("fg_percent", Double),
        col("x3p_per_game", Double),
        col("x3pa_per_game", Double),
        col("x3p_percent", Double),
        col("x2p_per_game", Double),
        col("x2pa_per_game", Double),
        col("x2p_percent", Double),
        col("e_fg_percent", Double),
        col("ft_per_game", Double),
        col("fta_per_game", Double),
        col("ft_percent", Double),
        col("orb_per_game", Double),
        col("drb_per_game", Double),
        col("trb_per_game", Double),
        col("ast_per_game", Double),
        col("stl_per_game", Double),
        col("blk_per_game", Double),
        col("tov_per_game", Double),
        col("pf_per_game", Double),
        col("pts_per_game", Double),
    ]
}

fn basketball_datasets() -> Vec<DatasetDescriptor> {
    use SqlType::*;
    vec![
        DatasetDescriptor::explicit(
            "Player Directory.csv",
            "raw_player_directory",
            vec![
                col("player_id", Varchar),
                col("player_name", Varchar).from_header("player"),
                col("hof", Boolean),
                col("is_active", Boolean).from_header("active"),
                col("first_seas", Integer),
                col("last_seas", Integer),
            ],
        ),
        DatasetDescriptor::explicit(
            "common_player_info.csv",
            "raw_player_bio",
            vec![
                col("player_id", Varchar),
                col("position", Varchar),
                col("height", Varchar),
                col("weight", Integer),
                col("birth_date", Date).from_header("birthdate"),
                col("college", Varchar).from_header("school"),
                col("draft_year", Integer),
                col("draft_round", Integer),
                col("draft_number", Integer),
            ],
        )
        .optional(),
        DatasetDescriptor::explicit(
            "Player Per Game.csv",
            "raw_player_per_game",
            per_game_columns(),
        )
        .optional(),
        DatasetDescriptor::explicit(
            "Player Totals.csv",
            "raw_player_totals",
            vec![
                col("season", Integer),
                col("player_id", Varchar),
                col("player", Varchar),
                col("pos", Varchar),
                col("age", Integer),
                col("lg", Varchar),
                col("tm", Varchar),
                col("g", Integer),
                col("gs", Integer),
                col("mp", Double),
                col("fg", Double),
                col("fga", Double),
                col("fg_percent", Double),
                col("x3p", Double),
                col("x3pa", Double),
                col("x3p_percent", Double),
                col("ft", Double),
                col("fta", Double),
                col("ft_percent", Double),
                col("orb", Double),
                col("drb", Double),
                col("trb", Double),
                col("ast", Double),
                col("stl", Double),
                col("blk", Double),
                col("tov", Double),
                col("pf", Double),
                col("pts", Double),
            ],
        )
        .optional(),
        DatasetDescriptor::explicit(
            "Advanced.csv",
            "raw_player_advanced",
            vec![
                col("season", Integer),
                col("player_id", Varchar),
                col("player", Varchar),
                col("pos", Varchar),
                col("age", Integer),
                col("lg", Varchar),
                col("tm", Varchar),
                col("g", Integer),
                col("mp", Double),
                col("per", Double),
                col("ts_percent", Double),
                col("usg_percent", Double),
                col("ows", Double),
                col("dws", Double),
                col("ws", Double),
                col("ws_48", Double),
                col("obpm", Double),
                col("dbpm", Double),
                col("bpm", Double),
                col("vorp", Double),
            ],
        )
        .optional(),
        DatasetDescriptor::explicit(
            "Player Playoffs Per Game.csv",
            "raw_player_playoffs_per_game",
            per_game_columns(),
        )
        .optional(),
        DatasetDescriptor::explicit(
            "Team Summaries.csv",
            "raw_team_summaries",
            vec![
                col("season", Integer),
                col("lg", Varchar),
                col("team", Varchar),
                col("abbreviation", Varchar),
                col("playoffs", Boolean),
                col("w", Integer),
                col("l", Integer),
                col("w_l_percent", Double),
                col("mov", Double),
                col("srs", Double),
                col("o_rtg", Double),
                col("d_rtg", Double),
                col("n_rtg", Double),
                col("pace", Double),
                col("coaches", Varchar),
                col("top_ws", Varchar),
                col("pts", Double),
                col("trb", Double),
                col("ast", Double),
            ],
        ),
        DatasetDescriptor::auto("Team Abbrev.csv", "raw_team_abbrev").optional(),
        DatasetDescriptor::explicit(
            "draft_history.csv",
            "raw_draft_history",
            vec![
                col("draft_year", Integer).from_header("Draft Year"),
                col("round_number", Integer).from_header("Rnd"),
                col("round_pick", Integer).from_header("Rnd Pk"),
                col("overall_pick", Integer).from_header("Pk"),
                col("team_code", Varchar).from_header("Tm"),
                col("player", Varchar).from_header("Player"),
                col("player_id", Varchar),
                col("college", Varchar).from_header("College"),
            ],
        )
        .optional(),
        DatasetDescriptor::auto("game.csv", "raw_game").optional(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basketball_registry_is_valid() {
        let builtin = SchemaRegistry::basketball();
        let validated = SchemaRegistry::new(builtin.datasets().to_vec()).unwrap();
        assert_eq!(validated.len(), 10);
        assert_eq!(validated.datasets()[0].target_table, "raw_player_directory");
        assert!(!validated.datasets()[0].optional);
        assert!(validated.get("RAW_TEAM_SUMMARIES").is_some());
    }

    #[test]
    fn test_header_mapping() {
        let column = ColumnSpec::new("draft_year", SqlType::Integer).from_header("Draft Year");
        assert_eq!(column.header(), "Draft Year");
        assert_eq!(ColumnSpec::new("g", SqlType::Integer).header(), "g");
    }

    #[test]
    fn test_rejects_duplicate_tables() {
        let result = SchemaRegistry::new(vec![
            DatasetDescriptor::auto("a.csv", "raw_a"),
            DatasetDescriptor::auto("b.csv", "RAW_A"),
        ]);
        assert!(matches!(result, Err(RegistryError::DuplicateTable(_))));
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        let result = SchemaRegistry::new(vec![DatasetDescriptor::auto("a.csv", "raw a; DROP")]);
        assert!(matches!(
            result,
            Err(RegistryError::InvalidIdentifier { .. })
        ));

        let result = SchemaRegistry::new(vec![DatasetDescriptor::explicit(
            "a.csv",
            "raw_a",
            vec![ColumnSpec::new("1st", SqlType::Varchar)],
        )]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            SchemaRegistry::new(Vec::new()),
            Err(RegistryError::Empty)
        ));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
[[dataset]]
source_file = "Player Directory.csv"
target_table = "raw_player_directory"
mode = "explicit"
columns = [
    { name = "player_id", type = "varchar" },
    { name = "player_name", type = "varchar", source = "player" },
]

[[dataset]]
source_file = "game.csv"
target_table = "raw_game"
mode = "auto"
optional = true
"#;
        let registry = SchemaRegistry::from_toml(toml).unwrap();
        assert_eq!(registry.len(), 2);
        let columns = registry.datasets()[0].columns().unwrap();
        assert_eq!(columns[1].header(), "player");
        assert_eq!(registry.datasets()[1].mode, LoadMode::Auto);
        assert!(registry.datasets()[1].optional);
    }

    #[test]
    fn test_toml_round_trip_preserves_order() {
        let registry = SchemaRegistry::basketball();
        let toml = registry.to_toml().unwrap();
        let parsed = SchemaRegistry::from_toml(&toml).unwrap();
        assert_eq!(parsed, registry);
    }
}
