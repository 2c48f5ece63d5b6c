//! Table-driven progression.

use sha2::{Digest, Sha256};

use super::{Level, LevelFormula, Xp, check_level, check_xp, greatest_level};
use crate::error::{FormulaError, Result};

/// Ordered `(level, xp floor)` points.
///
/// Invariants checked at construction:
/// - level 1 is defined with a floor of 0
/// - levels strictly increase
/// - floors grow by at least one XP per level between consecutive points
///
/// Levels between points are interpolated linearly (rounded up); levels past
/// the last point reuse its floor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelTable {
    points: Vec<(Level, Xp)>,
}

impl LevelTable {
    pub fn new(points: impl IntoIterator<Item = (Level, Xp)>) -> Result<Self> {
        let mut points: Vec<(Level, Xp)> = points.into_iter().collect();
        points.sort_by_key(|&(level, _)| level);

        match points.first() {
            Some(&(1, 0)) => {}
            Some(&(level, xp)) => {
                return Err(FormulaError::config(format!(
                    "level table must start at level 1 with 0 xp, found level {level} with {xp} xp"
                )));
            }
            None => return Err(FormulaError::config("level table is empty")),
        }

        for pair in points.windows(2) {
            let (l0, x0) = pair[0];
            let (l1, x1) = pair[1];
            if l0 == l1 {
                return Err(FormulaError::config(format!(
                    "level table defines level {l0} more than once"
                )));
            }
            if i128::from(x1) - i128::from(x0) < i128::from(l1) - i128::from(l0) {
                return Err(FormulaError::config(format!(
                    "level table floors must grow by at least 1 xp per level between levels {l0} and {l1}"
                )));
            }
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[(Level, Xp)] {
        &self.points
    }

    /// Highest level defined by the table.
    pub fn max_level(&self) -> Level {
        self.points.last().map_or(1, |&(level, _)| level)
    }

    /// Short SHA-256 fingerprint of the points, stable across file formatting.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (level, xp) in &self.points {
            hasher.update(format!("{level},{xp}\n").as_bytes());
        }
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }

    fn floor(&self, level: Level) -> Xp {
        if level >= self.max_level() {
            return self.points.last().map_or(0, |&(_, xp)| xp);
        }

        match self.points.binary_search_by_key(&level, |&(l, _)| l) {
            Ok(index) => self.points[index].1,
            Err(index) => {
                // index >= 1 because level 1 is always present.
                let (l0, x0) = self.points[index - 1];
                let (l1, x1) = self.points[index];
                let span = i128::from(x1 - x0) * i128::from(level - l0);
                let width = i128::from(l1 - l0);
                x0 + ((span + width - 1) / width) as Xp
            }
        }
    }
}

/// Progression backed by a [`LevelTable`] loaded from a side file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableFormula {
    file: String,
    table: LevelTable,
}

impl TableFormula {
    pub fn new(file: impl Into<String>, table: LevelTable) -> Self {
        Self {
            file: file.into(),
            table,
        }
    }

    /// Side file the table was loaded from, as named in configuration.
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn table(&self) -> &LevelTable {
        &self.table
    }
}

impl LevelFormula for TableFormula {
    fn xp_for_level(&self, level: Level) -> Result<Xp> {
        check_level(level)?;
        Ok(self.table.floor(level))
    }

    fn level_for_xp(&self, xp: Xp) -> Result<Level> {
        check_xp(xp)?;
        Ok(greatest_level(self.table.max_level(), |level| {
            self.table.floor(level) <= xp
        }))
    }
}
