use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Identifier of one independently toggleable treatment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Factor(String);

impl Factor {
    /// Creates a factor from its catalog name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the catalog name of the factor.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Factor {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Factor {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Label used for the empty configuration.
pub const BASELINE_LABEL: &str = "baseline";

/// A set of factors applied together. The empty set is the baseline.
///
/// Factors are kept sorted and deduplicated, so two configurations built from
/// the same factors in any order compare, hash and serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(from = "Vec<Factor>", into = "Vec<Factor>")]
pub struct Configuration {
    factors: Vec<Factor>,
}

impl Configuration {
    /// Returns the empty (untreated) configuration.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Builds a configuration from any collection of factors.
    pub fn new<I, F>(factors: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Factor>,
    {
        let mut factors: Vec<Factor> = factors.into_iter().map(Into::into).collect();
        factors.sort();
        factors.dedup();
        Self { factors }
    }

    /// Builds a single-factor configuration.
    pub fn single(factor: impl Into<Factor>) -> Self {
        Self {
            factors: vec![factor.into()],
        }
    }

    /// Parses a label produced by [`Configuration::label`].
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed == BASELINE_LABEL {
            return Self::baseline();
        }
        Self::new(
            trimmed
                .split('+')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(Factor::new),
        )
    }

    /// Sorted factors in this configuration.
    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Number of factors.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// True when no factor is applied.
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// True for the untreated configuration.
    pub fn is_baseline(&self) -> bool {
        self.is_empty()
    }

    /// Returns whether the factor is part of this configuration.
    pub fn contains(&self, factor: &Factor) -> bool {
        self.factors.binary_search(factor).is_ok()
    }

    /// Human readable identity, `baseline` or `a+b+c`.
    pub fn label(&self) -> String {
        if self.factors.is_empty() {
            return BASELINE_LABEL.to_string();
        }
        self.factors
            .iter()
            .map(Factor::as_str)
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Filesystem safe variant of the label.
    pub fn file_stem(&self) -> String {
        self.label()
            .chars()
            .map(|ch| match ch {
                '+' | ' ' | '/' | '\\' => '_',
                other => other,
            })
            .collect()
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<Vec<Factor>> for Configuration {
    fn from(value: Vec<Factor>) -> Self {
        Self::new(value)
    }
}

impl From<Configuration> for Vec<Factor> {
    fn from(value: Configuration) -> Self {
        value.factors
    }
}
