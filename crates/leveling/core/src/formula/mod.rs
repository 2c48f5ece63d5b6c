//! Progression formulas: level → XP floor and XP → level.
//!
//! Every variant honours the same contract:
//! - `xp_for_level(1) == 0`
//! - `xp_for_level` is non-decreasing in level
//! - `level_for_xp(xp)` is the greatest level whose floor is `<= xp`, never
//!   below 1
//! - both directions saturate at the type maximum instead of wrapping
//!
//! ## Examples
//!
//! ```
//! use leveling_core::{ExponentialFormula, Formula, LevelFormula};
//!
//! let formula = Formula::from(ExponentialFormula::new(100.0, 1.7).unwrap());
//! let floor = formula.xp_for_level(10).unwrap();
//! assert_eq!(formula.level_for_xp(floor).unwrap(), 10);
//! ```

mod custom;
mod exponential;
pub mod expr;
mod linear;
mod table;

pub use custom::CustomFormula;
pub use exponential::ExponentialFormula;
pub use linear::LinearFormula;
pub use table::{LevelTable, TableFormula};

use crate::descriptor::{FormulaDescriptor, FormulaKind, ParamMap, encode_params};
use crate::error::{FormulaError, Result};

/// Derived level. Always `>= 1` when produced by a formula.
pub type Level = i32;

/// Accumulated experience. Always `>= 0` when stored.
pub type Xp = i64;

/// Forward/inverse progression contract implemented by every variant.
pub trait LevelFormula {
    /// XP floor of `level`. Fails with `InvalidArgument` when `level < 1`.
    fn xp_for_level(&self, level: Level) -> Result<Xp>;

    /// Level reached with `xp`. Fails with `InvalidArgument` when `xp < 0`.
    fn level_for_xp(&self, xp: Xp) -> Result<Level>;
}

/// Closed set of formula variants.
#[derive(Clone, Debug, PartialEq)]
pub enum Formula {
    Linear(LinearFormula),
    Exponential(ExponentialFormula),
    Table(TableFormula),
    Custom(CustomFormula),
}

impl Formula {
    pub fn kind(&self) -> FormulaKind {
        match self {
            Formula::Linear(_) => FormulaKind::Linear,
            Formula::Exponential(_) => FormulaKind::Exponential,
            Formula::Table(_) => FormulaKind::Table,
            Formula::Custom(_) => FormulaKind::Custom,
        }
    }

    /// Canonical identity of this formula and its parameters.
    pub fn descriptor(&self) -> FormulaDescriptor {
        let params = match self {
            Formula::Linear(f) => encode_params([("xpPerLevel", f.xp_per_level().to_string())]),
            Formula::Exponential(f) => encode_params([
                ("baseXp", format!("{:?}", f.base_xp())),
                ("exponent", format!("{:?}", f.exponent())),
            ]),
            Formula::Table(f) => encode_params([
                ("file", f.file().to_string()),
                ("sha256", f.table().digest()),
            ]),
            Formula::Custom(f) => encode_params([
                ("xpForLevel", f.source().to_string()),
                ("maxLevel", f.max_level().to_string()),
                ("constants", f.encoded_constants()),
            ]),
        };
        FormulaDescriptor::new(self.kind().to_string(), params)
    }

    /// Rebuilds the formula a descriptor was produced from.
    ///
    /// TABLE descriptors are resolved through `tables`; the recorded digest
    /// must match the table that is loaded today.
    pub fn from_descriptor(descriptor: &FormulaDescriptor, tables: &dyn TableSource) -> Result<Self> {
        let params = ParamMap::decode(descriptor.params())?;

        let formula = match descriptor.formula_kind()? {
            FormulaKind::Linear => LinearFormula::new(params.parse("xpPerLevel")?)?.into(),
            FormulaKind::Exponential => {
                ExponentialFormula::new(params.parse("baseXp")?, params.parse("exponent")?)?.into()
            }
            FormulaKind::Table => {
                let file = params.require("file")?;
                let table = tables.load_table(file)?;
                if let Some(expected) = params.get("sha256") {
                    let actual = table.digest();
                    if expected != actual {
                        return Err(FormulaError::config(format!(
                            "table '{file}' changed since it was recorded (recorded digest {expected}, current {actual})"
                        )));
                    }
                }
                TableFormula::new(file, table).into()
            }
            FormulaKind::Custom => CustomFormula::new(
                params.require("xpForLevel")?,
                CustomFormula::decode_constants(params.get("constants").unwrap_or_default())?,
                params.parse("maxLevel")?,
            )?
            .into(),
        };

        Ok(formula)
    }
}

impl LevelFormula for Formula {
    fn xp_for_level(&self, level: Level) -> Result<Xp> {
        match self {
            Formula::Linear(f) => f.xp_for_level(level),
            Formula::Exponential(f) => f.xp_for_level(level),
            Formula::Table(f) => f.xp_for_level(level),
            Formula::Custom(f) => f.xp_for_level(level),
        }
    }

    fn level_for_xp(&self, xp: Xp) -> Result<Level> {
        match self {
            Formula::Linear(f) => f.level_for_xp(xp),
            Formula::Exponential(f) => f.level_for_xp(xp),
            Formula::Table(f) => f.level_for_xp(xp),
            Formula::Custom(f) => f.level_for_xp(xp),
        }
    }
}

impl From<LinearFormula> for Formula {
    fn from(value: LinearFormula) -> Self {
        Formula::Linear(value)
    }
}

impl From<ExponentialFormula> for Formula {
    fn from(value: ExponentialFormula) -> Self {
        Formula::Exponential(value)
    }
}

impl From<TableFormula> for Formula {
    fn from(value: TableFormula) -> Self {
        Formula::Table(value)
    }
}

impl From<CustomFormula> for Formula {
    fn from(value: CustomFormula) -> Self {
        Formula::Custom(value)
    }
}

/// Supplies level tables referenced by TABLE formulas.
///
/// Tables live in side files owned by the host; the core only sees the
/// parsed points.
pub trait TableSource {
    fn load_table(&self, file: &str) -> Result<LevelTable>;
}

/// Table source for hosts that never configure TABLE formulas.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTables;

impl TableSource for NoTables {
    fn load_table(&self, file: &str) -> Result<LevelTable> {
        Err(FormulaError::config(format!(
            "no table source available to load '{file}'"
        )))
    }
}

pub(crate) fn check_level(level: Level) -> Result<()> {
    if level < 1 {
        return Err(FormulaError::invalid(format!("level must be >= 1, got {level}")));
    }
    Ok(())
}

pub(crate) fn check_xp(xp: Xp) -> Result<()> {
    if xp < 0 {
        return Err(FormulaError::invalid(format!("xp must be >= 0, got {xp}")));
    }
    Ok(())
}

/// Converts a real-valued floor to XP: ceil, clamp below at 0, saturate above.
pub(crate) fn saturating_ceil(value: f64) -> Xp {
    if value.is_nan() || value >= Xp::MAX as f64 {
        return Xp::MAX;
    }
    if value <= 0.0 {
        return 0;
    }
    value.ceil() as Xp
}

/// Greatest level in `[1, max_level]` whose floor satisfies `reached`.
///
/// `reached` must be monotone (true up to some level, false after); level 1
/// is assumed reached.
pub(crate) fn greatest_level(max_level: Level, mut reached: impl FnMut(Level) -> bool) -> Level {
    let (mut lo, mut hi) = (1, max_level.max(1));
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if reached(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}
