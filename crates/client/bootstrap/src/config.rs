//! Leveling configuration structures and loaders.
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// File name of the configuration inside the data directory.
pub const CONFIG_FILE: &str = "leveling.toml";

const DEFAULT_CONFIG: &str = r#"# =========================
# Storage
# =========================
#
# backend: "sqlite" (single file database), "file" (snapshot directory)
#          or "memory" (nothing survives the process).
# path:    relative paths resolve against the data directory.
#
[database]
backend = "sqlite"
path = "leveling.db"

# =========================
# Leveling Formula
# =========================
#
# Supported types:
#   - EXPONENTIAL: XP floor at level L is base_xp * (L - 1) ^ exponent
#   - LINEAR:      XP floor at level L is xp_per_level * (L - 1)
#   - TABLE:       XP floor at level L is defined in a CSV file
#   - CUSTOM:      XP floor at level L is defined by a math expression
#
# Changing the formula rewrites stored XP so every entity keeps its level.
# Set migrate_xp = false to leave stored XP untouched.
#
[formula]
type = "EXPONENTIAL"
migrate_xp = true

[formula.exponential]
base_xp = 100.0
exponent = 1.7

[formula.linear]
xp_per_level = 100

[formula.table]
# CSV of `level,xp` rows, relative to the data directory
file = "levels.csv"

[formula.custom]
# Expression returning the XP floor of `level` (integer >= 1).
# Constants defined below may be referenced by name.
xp_for_level = "exp(a * (level - 1)) * b / c"
# Upper bound for the level search
max_level = 100000

[formula.custom.constants]
a = 0.12
b = 100.0
c = 1.0
"#;

/// Configuration required to assemble the leveling service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelingConfig {
    pub database: DatabaseConfig,
    pub formula: FormulaConfig,
}

impl LevelingConfig {
    /// Load `leveling.toml` from `dir`, writing the commented default first
    /// when the file does not exist yet.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write default config {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote default leveling config");
        }

        Self::load(&path)
    }

    /// Parse a configuration file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config TOML {}", path.display()))
    }

    /// Apply overrides from process environment variables.
    ///
    /// Environment variables:
    /// - `LEVELING_FORMULA_TYPE` - Formula type (LINEAR, EXPONENTIAL, TABLE, CUSTOM)
    /// - `LEVELING_MIGRATE_XP` - Rewrite stored XP on formula change (true/false)
    /// - `LEVELING_DB_BACKEND` - Storage backend (sqlite, file, memory)
    /// - `LEVELING_DB_PATH` - Database file or snapshot directory
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(kind) = env::var("LEVELING_FORMULA_TYPE") {
            self.formula.kind = kind;
        }

        if let Some(migrate) = read_env::<bool>("LEVELING_MIGRATE_XP") {
            self.formula.migrate_xp = migrate;
        }

        if let Some(backend) = read_env::<StorageBackend>("LEVELING_DB_BACKEND") {
            self.database.backend = backend;
        } else if let Ok(raw) = env::var("LEVELING_DB_BACKEND") {
            tracing::warn!(value = %raw, "Ignoring unknown LEVELING_DB_BACKEND");
        }

        if let Ok(path) = env::var("LEVELING_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }

        self
    }
}

/// Where progression records live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StorageBackend {
    #[default]
    Sqlite,
    File,
    Memory,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    /// SQLite file or snapshot directory; relative to the data directory.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: PathBuf::from("leveling.db"),
        }
    }
}

impl DatabaseConfig {
    pub fn resolve_path(&self, data_dir: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            data_dir.join(&self.path)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaConfig {
    /// Formula type tag, matched case-insensitively.
    #[serde(rename = "type")]
    pub kind: String,
    pub migrate_xp: bool,
    pub linear: LinearConfig,
    pub exponential: ExponentialConfig,
    pub table: TableConfig,
    pub custom: CustomConfig,
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            kind: "EXPONENTIAL".to_string(),
            migrate_xp: true,
            linear: LinearConfig::default(),
            exponential: ExponentialConfig::default(),
            table: TableConfig::default(),
            custom: CustomConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    pub xp_per_level: i64,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self { xp_per_level: 100 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExponentialConfig {
    pub base_xp: f64,
    pub exponent: f64,
}

impl Default for ExponentialConfig {
    fn default() -> Self {
        Self {
            base_xp: 100.0,
            exponent: 1.7,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub file: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            file: "levels.csv".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomConfig {
    pub xp_for_level: String,
    pub max_level: i32,
    pub constants: BTreeMap<String, f64>,
}

/// Mirrors the `[formula.custom]` section of the generated `leveling.toml`.
impl Default for CustomConfig {
    fn default() -> Self {
        Self {
            xp_for_level: "exp(a * (level - 1)) * b / c".to_string(),
            max_level: 100_000,
            constants: BTreeMap::from([
                ("a".to_string(), 0.12),
                ("b".to_string(), 100.0),
                ("c".to_string(), 1.0),
            ]),
        }
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
