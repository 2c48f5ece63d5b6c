//! Progression math shared by the leveling runtime and its tooling.
//!
//! `leveling-core` owns the pure half of the system: the [`Formula`] variants
//! that map levels to XP floors and back, the [`FormulaDescriptor`] used to
//! detect formula changes across restarts, and the [`ProgressionRecord`] that
//! storage adapters persist. Nothing in this crate performs I/O; side files
//! such as level tables reach it through [`TableSource`].
pub mod descriptor;
pub mod error;
pub mod formula;
pub mod record;

pub use descriptor::{FormulaDescriptor, FormulaKind};
pub use error::{FormulaError, Result};
pub use formula::{
    CustomFormula, ExponentialFormula, Formula, Level, LevelFormula, LevelTable, LinearFormula,
    NoTables, TableFormula, TableSource, Xp,
};
pub use record::{EntityId, ProgressionRecord};
