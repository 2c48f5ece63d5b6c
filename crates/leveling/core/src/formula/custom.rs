//! User-defined progression expressions.

use std::collections::BTreeMap;

use super::expr::{BUILTIN_CONSTANTS, Expr};
use super::{Level, LevelFormula, Xp, check_level, check_xp, greatest_level, saturating_ceil};
use crate::error::{FormulaError, Result};

const LEVEL_VAR: &str = "level";

/// XP floor given by an expression over `level` and named constants.
///
/// The expression is not assumed invertible, so `level_for_xp` binary-searches
/// `[1, max_level]`. Results are only meaningful for expressions that are
/// non-decreasing in `level` over that range.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomFormula {
    source: String,
    expr: Expr,
    constants: BTreeMap<String, f64>,
    max_level: Level,
}

impl CustomFormula {
    pub fn new(source: &str, constants: BTreeMap<String, f64>, max_level: Level) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(FormulaError::config("custom xpForLevel expression is empty"));
        }
        if max_level < 1 {
            return Err(FormulaError::config(format!(
                "custom maxLevel must be >= 1, got {max_level}"
            )));
        }
        for (name, value) in &constants {
            if name == LEVEL_VAR || !is_identifier(name) {
                return Err(FormulaError::config(format!(
                    "invalid constant name '{name}'"
                )));
            }
            if !value.is_finite() {
                return Err(FormulaError::config(format!(
                    "constant '{name}' must be finite, got {value}"
                )));
            }
        }

        let expr = Expr::parse(source)?;
        for name in expr.variables() {
            let known = name == LEVEL_VAR
                || constants.contains_key(name)
                || BUILTIN_CONSTANTS.iter().any(|(builtin, _)| *builtin == name);
            if !known {
                return Err(FormulaError::config(format!(
                    "expression references undefined variable '{name}'"
                )));
            }
        }

        Ok(Self {
            source: source.to_string(),
            expr,
            constants,
            max_level,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn constants(&self) -> &BTreeMap<String, f64> {
        &self.constants
    }

    pub fn max_level(&self) -> Level {
        self.max_level
    }

    /// `name:value` pairs joined by commas, in name order.
    pub(crate) fn encoded_constants(&self) -> String {
        self.constants
            .iter()
            .map(|(name, value)| format!("{name}:{value:?}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub(crate) fn decode_constants(encoded: &str) -> Result<BTreeMap<String, f64>> {
        encoded
            .split(',')
            .filter(|pair| !pair.trim().is_empty())
            .map(|pair| -> Result<(String, f64)> {
                let (name, value) = pair.split_once(':').ok_or_else(|| {
                    FormulaError::config(format!("malformed constant '{pair}'"))
                })?;
                let value: f64 = value.trim().parse().map_err(|_| {
                    FormulaError::config(format!("constant '{name}' is not a number: '{value}'"))
                })?;
                Ok((name.trim().to_string(), value))
            })
            .collect()
    }

    fn floor(&self, level: Level) -> Xp {
        if level == 1 {
            return 0;
        }
        let level = f64::from(level);
        let value = self.expr.eval(&|name: &str| {
            if name == LEVEL_VAR {
                Some(level)
            } else {
                self.constants.get(name).copied()
            }
        });
        saturating_ceil(value)
    }
}

impl LevelFormula for CustomFormula {
    fn xp_for_level(&self, level: Level) -> Result<Xp> {
        check_level(level)?;
        Ok(self.floor(level))
    }

    fn level_for_xp(&self, xp: Xp) -> Result<Level> {
        check_xp(xp)?;
        Ok(greatest_level(self.max_level, |level| self.floor(level) <= xp))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constants(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs
            .iter()
            .map(|&(name, value)| (name.to_string(), value))
            .collect()
    }

    #[test]
    fn evaluates_floor_with_constants() {
        let formula = CustomFormula::new(
            "exp(a * (level - 1)) * b / c",
            constants(&[("a", 0.12), ("b", 100.0), ("c", 1.0)]),
            100_000,
        )
        .unwrap();

        assert_eq!(formula.xp_for_level(1).unwrap(), 0);
        let expected = ((0.12f64 * 9.0).exp() * 100.0).ceil() as Xp;
        assert_eq!(formula.xp_for_level(10).unwrap(), expected);
        assert_eq!(formula.level_for_xp(expected).unwrap(), 10);
        assert_eq!(formula.level_for_xp(expected - 1).unwrap(), 9);
    }

    #[test]
    fn level_search_is_capped_at_max_level() {
        let formula = CustomFormula::new("50 * (level - 1)", BTreeMap::new(), 20).unwrap();
        assert_eq!(formula.level_for_xp(50 * 19).unwrap(), 20);
        assert_eq!(formula.level_for_xp(Xp::MAX).unwrap(), 20);
        assert_eq!(formula.xp_for_level(30).unwrap(), 50 * 29);
    }

    #[test]
    fn negative_values_clamp_and_overflow_saturates() {
        let negative = CustomFormula::new("-5 * level", BTreeMap::new(), 10).unwrap();
        assert_eq!(negative.xp_for_level(3).unwrap(), 0);

        let huge = CustomFormula::new("10 ^ (level * 10)", BTreeMap::new(), 10).unwrap();
        assert_eq!(huge.xp_for_level(5).unwrap(), Xp::MAX);
    }

    #[test]
    fn rejects_bad_definitions() {
        assert!(CustomFormula::new("  ", BTreeMap::new(), 10).is_err());
        assert!(CustomFormula::new("level * k", BTreeMap::new(), 10).is_err());
        assert!(CustomFormula::new("level", BTreeMap::new(), 0).is_err());
        assert!(CustomFormula::new("level", constants(&[("level", 1.0)]), 10).is_err());
        assert!(CustomFormula::new("level", constants(&[("x", f64::NAN)]), 10).is_err());
        assert!(CustomFormula::new("level +", BTreeMap::new(), 10).is_err());
    }

    #[test]
    fn constants_codec_round_trips() {
        let original = constants(&[("a", 0.12), ("b", 100.0)]);
        let formula = CustomFormula::new("a * b * level", original.clone(), 10).unwrap();
        assert_eq!(formula.encoded_constants(), "a:0.12,b:100.0");
        assert_eq!(CustomFormula::decode_constants("a:0.12,b:100.0").unwrap(), original);
        assert!(CustomFormula::decode_constants("").unwrap().is_empty());
        assert!(CustomFormula::decode_constants("a=1").is_err());
    }
}
