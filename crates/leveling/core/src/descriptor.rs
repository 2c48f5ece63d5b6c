//! Formula identity used to detect formula changes between runs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use strum::{Display, EnumString};

use crate::error::{FormulaError, Result};

/// Formula variant tag. Parsing ignores ASCII case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum FormulaKind {
    Linear,
    Exponential,
    Table,
    Custom,
}

/// Which formula (type tag + canonical parameters) produced stored XP.
///
/// Used purely as an equality key: tags compare case-insensitively, params
/// compare as exact strings, so reformatted but numerically equal params
/// count as a change.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormulaDescriptor {
    kind: String,
    params: String,
}

impl FormulaDescriptor {
    pub fn new(kind: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: params.into(),
        }
    }

    /// Raw type tag as recorded.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn params(&self) -> &str {
        &self.params
    }

    pub fn formula_kind(&self) -> Result<FormulaKind> {
        FormulaKind::from_str(self.kind.trim())
            .map_err(|_| FormulaError::config(format!("unknown formula type '{}'", self.kind)))
    }
}

impl PartialEq for FormulaDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.kind.eq_ignore_ascii_case(&other.kind) && self.params == other.params
    }
}

impl Eq for FormulaDescriptor {}

impl fmt::Display for FormulaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.params)
    }
}

/// Joins `key=value` pairs with `;` in the given order.
pub(crate) fn encode_params<'a>(pairs: impl IntoIterator<Item = (&'a str, String)>) -> String {
    pairs
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// Decoded `key=value;key=value` parameter string.
pub(crate) struct ParamMap {
    entries: BTreeMap<String, String>,
}

impl ParamMap {
    pub(crate) fn decode(params: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for part in params.split(';').filter(|part| !part.trim().is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                FormulaError::config(format!("malformed formula parameter '{part}'"))
            })?;
            entries.insert(key.trim().to_string(), value.to_string());
        }
        Ok(Self { entries })
    }

    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub(crate) fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| FormulaError::config(format!("missing formula parameter '{key}'")))
    }

    pub(crate) fn parse<T: FromStr>(&self, key: &str) -> Result<T> {
        let raw = self.require(key)?;
        raw.trim().parse().map_err(|_| {
            FormulaError::config(format!("formula parameter '{key}' has invalid value '{raw}'"))
        })
    }
}
