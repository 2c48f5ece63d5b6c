//! Constant XP per level.

use super::{Level, LevelFormula, Xp, check_level, check_xp};
use crate::error::{FormulaError, Result};

/// `xp_for_level(L) = xp_per_level * (L - 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearFormula {
    xp_per_level: Xp,
}

impl LinearFormula {
    /// Fails with a configuration error unless `xp_per_level > 0`.
    pub fn new(xp_per_level: Xp) -> Result<Self> {
        if xp_per_level <= 0 {
            return Err(FormulaError::config(format!(
                "xpPerLevel must be > 0, got {xp_per_level}"
            )));
        }
        Ok(Self { xp_per_level })
    }

    pub fn xp_per_level(&self) -> Xp {
        self.xp_per_level
    }
}

impl LevelFormula for LinearFormula {
    fn xp_for_level(&self, level: Level) -> Result<Xp> {
        check_level(level)?;
        Ok(self
            .xp_per_level
            .checked_mul(Xp::from(level - 1))
            .unwrap_or(Xp::MAX))
    }

    fn level_for_xp(&self, xp: Xp) -> Result<Level> {
        check_xp(xp)?;
        let level = (xp / self.xp_per_level).saturating_add(1);
        Ok(Level::try_from(level).unwrap_or(Level::MAX))
    }
}
