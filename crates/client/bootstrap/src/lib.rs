//! Shared bootstrap utilities for leveling front-ends.
//!
//! Provides configuration loading, formula construction and service setup
//! that can be reused by the CLI or any other host.
pub mod builder;
pub mod config;
pub mod formulas;

pub use builder::{LevelingBuilder, LevelingSetup, open_repository};
pub use config::{
    CONFIG_FILE, CustomConfig, DatabaseConfig, ExponentialConfig, FormulaConfig, LevelingConfig,
    LinearConfig, StorageBackend, TableConfig,
};
pub use formulas::{CsvTableSource, formula_from_config};
