//! Command line surface.
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use leveling_core::{EntityId, Level, Xp};

/// Entity id used by `demo`.
pub const DEMO_ENTITY: &str = "d3804858-4bb8-4026-ae21-386255ed467d";

/// Inspect and change entity progression
#[derive(Parser, Debug)]
#[command(name = "leveling")]
#[command(about = "XP and level progression tools", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Directory holding leveling.toml, the store and table files
    #[arg(long, env = "LEVELING_DATA_DIR", default_value = "./leveling")]
    pub data_dir: PathBuf,

    /// Also write logs to a file (LEVELING_LOG_DIR, or the platform cache directory)
    #[arg(long)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show XP and level of an entity
    Get { entity: EntityId },

    /// Add XP to an entity
    AddXp { entity: EntityId, amount: Xp },

    /// Remove XP from an entity (clamped at zero)
    RemoveXp { entity: EntityId, amount: Xp },

    /// Overwrite the XP of an entity
    SetXp {
        entity: EntityId,
        #[arg(allow_negative_numbers = true)]
        xp: Xp,
    },

    /// Move an entity up (or down, when negative) by a number of levels
    AddLevel {
        entity: EntityId,
        #[arg(allow_negative_numbers = true)]
        delta: Level,
    },

    /// Move an entity down by a number of levels
    RemoveLevel { entity: EntityId, delta: Level },

    /// Put an entity at the start of a level
    SetLevel {
        entity: EntityId,
        #[arg(allow_negative_numbers = true)]
        level: Level,
    },

    /// Print the XP floor of a level under the configured formula
    XpForLevel {
        #[arg(allow_negative_numbers = true)]
        level: Level,
    },

    /// Run the XP migration for the configured formula and report the outcome
    Migrate,

    /// Add 500 XP to a fixed demo entity and print the result
    Demo,
}
