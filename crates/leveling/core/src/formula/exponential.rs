//! Power-curve progression.

use super::{Level, LevelFormula, Xp, check_level, check_xp, saturating_ceil};
use crate::error::{FormulaError, Result};

/// `xp_for_level(L) = ceil(base_xp * (L - 1) ^ exponent)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExponentialFormula {
    base_xp: f64,
    exponent: f64,
}

impl ExponentialFormula {
    /// Both parameters must be finite and strictly positive.
    pub fn new(base_xp: f64, exponent: f64) -> Result<Self> {
        if !(base_xp.is_finite() && base_xp > 0.0) {
            return Err(FormulaError::config(format!("baseXp must be > 0, got {base_xp}")));
        }
        if !(exponent.is_finite() && exponent > 0.0) {
            return Err(FormulaError::config(format!(
                "exponent must be > 0, got {exponent}"
            )));
        }
        Ok(Self { base_xp, exponent })
    }

    pub fn base_xp(&self) -> f64 {
        self.base_xp
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Floor for a level already known to be `>= 1`.
    fn floor(&self, level: Level) -> Xp {
        if level == 1 {
            return 0;
        }
        saturating_ceil(self.base_xp * f64::from(level - 1).powf(self.exponent))
    }
}

impl LevelFormula for ExponentialFormula {
    fn xp_for_level(&self, level: Level) -> Result<Xp> {
        check_level(level)?;
        Ok(self.floor(level))
    }

    fn level_for_xp(&self, xp: Xp) -> Result<Level> {
        check_xp(xp)?;

        let estimate = (xp as f64 / self.base_xp).powf(1.0 / self.exponent);
        let mut level = if !estimate.is_finite() || estimate >= Level::MAX as f64 {
            Level::MAX
        } else if estimate < 1.0 {
            1
        } else {
            estimate.floor() as Level
        };

        // The estimate drifts from float rounding and the ceil in `floor`.
        while level < Level::MAX && self.floor(level + 1) <= xp {
            level += 1;
        }
        while level > 1 && self.floor(level) > xp {
            level -= 1;
        }

        Ok(level.max(1))
    }
}
