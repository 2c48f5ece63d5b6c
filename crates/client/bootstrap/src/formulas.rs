//! Builds formulas from configuration and resolves table side files.
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use leveling_core::{
    CustomFormula, ExponentialFormula, Formula, FormulaError, FormulaKind, Level, LevelTable,
    LinearFormula, TableFormula, TableSource, Xp,
};

use crate::config::FormulaConfig;

/// Build the configured formula. TABLE formulas read their CSV through `tables`.
pub fn formula_from_config(config: &FormulaConfig, tables: &dyn TableSource) -> Result<Formula> {
    let kind = FormulaKind::from_str(config.kind.trim())
        .map_err(|_| anyhow::anyhow!("Unknown formula type '{}'", config.kind))?;

    let formula = match kind {
        FormulaKind::Linear => LinearFormula::new(config.linear.xp_per_level)
            .context("Invalid linear formula")?
            .into(),
        FormulaKind::Exponential => {
            ExponentialFormula::new(config.exponential.base_xp, config.exponential.exponent)
                .context("Invalid exponential formula")?
                .into()
        }
        FormulaKind::Table => {
            let file = config.table.file.as_str();
            let table = tables
                .load_table(file)
                .with_context(|| format!("Failed to load level table '{file}'"))?;
            TableFormula::new(file, table).into()
        }
        FormulaKind::Custom => CustomFormula::new(
            &config.custom.xp_for_level,
            config.custom.constants.clone(),
            config.custom.max_level,
        )
        .context("Invalid custom formula")?
        .into(),
    };

    Ok(formula)
}

/// Reads `level,xp` CSV tables relative to a directory.
///
/// A leading header row, blank lines and `#` comments are skipped.
#[derive(Clone, Debug)]
pub struct CsvTableSource {
    dir: PathBuf,
}

impl CsvTableSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TableSource for CsvTableSource {
    fn load_table(&self, file: &str) -> Result<LevelTable, FormulaError> {
        let path = self.dir.join(file);
        let content = fs::read_to_string(&path).map_err(|e| {
            FormulaError::Configuration(format!("cannot read table {}: {e}", path.display()))
        })?;
        parse_table(&content)
            .map_err(|e| FormulaError::Configuration(format!("{}: {e}", path.display())))
    }
}

fn parse_table(content: &str) -> Result<LevelTable, String> {
    let mut points = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (level, xp) = line
            .split_once(',')
            .ok_or_else(|| format!("line {}: expected `level,xp`", index + 1))?;
        let (level, xp) = (level.trim(), xp.trim());

        match (level.parse::<Level>(), xp.parse::<Xp>()) {
            (Ok(level), Ok(xp)) => points.push((level, xp)),
            // Header row.
            _ if points.is_empty() && level.parse::<f64>().is_err() => continue,
            _ => {
                return Err(format!(
                    "line {}: '{line}' is not a pair of integers",
                    index + 1
                ));
            }
        }
    }

    LevelTable::new(points).map_err(|e| e.to_string())
}
