//! Enumerated outcome schema shared by extraction, scoring and reporting.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, TcsError};

/// Reduction applied to one metric column to obtain a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "threshold", rename_all = "snake_case")]
pub enum Measure {
    /// Last sample of the series.
    Final,
    /// Maximum sample of the series.
    Peak,
    /// Trapezoidal integral against the time axis.
    Auc,
    /// First time at which the series reaches the threshold.
    TimeTo(f64),
}

/// Whether smaller or larger values of an outcome are preferable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Smaller values are better (severity, duration).
    LowerIsBetter,
    /// Larger values are better (closure, deposition).
    HigherIsBetter,
}

/// Closed set of scalar outcomes extracted from a simulation time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutcomeKey {
    /// Final wound closure percentage.
    #[serde(rename = "wound_closure_pct")]
    WoundClosurePct,
    /// Final mean inflammation inside the wound.
    #[serde(rename = "mean_infl_wound")]
    MeanInflWound,
    /// Final scar magnitude.
    #[serde(rename = "scar_magnitude")]
    ScarMagnitude,
    /// Peak mean inflammation inside the wound.
    #[serde(rename = "peak_inflammation")]
    PeakInflammation,
    /// Integrated inflammation burden.
    #[serde(rename = "inflammation_auc")]
    InflammationAuc,
    /// Days until closure reaches 50%.
    #[serde(rename = "time_to_50pct_days")]
    TimeTo50PctDays,
    /// Days until closure reaches 90%.
    #[serde(rename = "time_to_90pct_days")]
    TimeTo90PctDays,
    /// Peak neutrophil count.
    #[serde(rename = "peak_neutrophils")]
    PeakNeutrophils,
    /// Peak macrophage count.
    #[serde(rename = "peak_macrophages")]
    PeakMacrophages,
    /// Peak mean collagen inside the wound.
    #[serde(rename = "peak_collagen")]
    PeakCollagen,
    /// Peak myofibroblast count.
    #[serde(rename = "peak_myofibroblasts")]
    PeakMyofibroblasts,
}

impl OutcomeKey {
    /// Every key in report column order.
    pub const ALL: [OutcomeKey; 11] = [
        OutcomeKey::WoundClosurePct,
        OutcomeKey::MeanInflWound,
        OutcomeKey::ScarMagnitude,
        OutcomeKey::PeakInflammation,
        OutcomeKey::InflammationAuc,
        OutcomeKey::TimeTo50PctDays,
        OutcomeKey::TimeTo90PctDays,
        OutcomeKey::PeakNeutrophils,
        OutcomeKey::PeakMacrophages,
        OutcomeKey::PeakCollagen,
        OutcomeKey::PeakMyofibroblasts,
    ];

    /// Keys used for scoring, convergence and synergy unless overridden.
    pub const DEFAULT_TRACKED: [OutcomeKey; 3] = [
        OutcomeKey::TimeTo50PctDays,
        OutcomeKey::ScarMagnitude,
        OutcomeKey::PeakInflammation,
    ];

    /// Stable snake_case name used in files and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKey::WoundClosurePct => "wound_closure_pct",
            OutcomeKey::MeanInflWound => "mean_infl_wound",
            OutcomeKey::ScarMagnitude => "scar_magnitude",
            OutcomeKey::PeakInflammation => "peak_inflammation",
            OutcomeKey::InflammationAuc => "inflammation_auc",
            OutcomeKey::TimeTo50PctDays => "time_to_50pct_days",
            OutcomeKey::TimeTo90PctDays => "time_to_90pct_days",
            OutcomeKey::PeakNeutrophils => "peak_neutrophils",
            OutcomeKey::PeakMacrophages => "peak_macrophages",
            OutcomeKey::PeakCollagen => "peak_collagen",
            OutcomeKey::PeakMyofibroblasts => "peak_myofibroblasts",
        }
    }

    /// Metric column the outcome is computed from.
    pub fn metric(self) -> &'static str {
        match self {
            OutcomeKey::WoundClosurePct
            | OutcomeKey::TimeTo50PctDays
            | OutcomeKey::TimeTo90PctDays => "wound_closure_pct",
            OutcomeKey::MeanInflWound
            | OutcomeKey::PeakInflammation
            | OutcomeKey::InflammationAuc => "mean_infl_wound",
            OutcomeKey::ScarMagnitude => "scar_magnitude",
            OutcomeKey::PeakNeutrophils => "n_neutrophils",
            OutcomeKey::PeakMacrophages => "n_macrophages",
            OutcomeKey::PeakCollagen => "mean_collagen_wound",
            OutcomeKey::PeakMyofibroblasts => "n_myofibroblasts",
        }
    }

    /// Reduction used for this outcome.
    pub fn measure(self) -> Measure {
        match self {
            OutcomeKey::WoundClosurePct | OutcomeKey::MeanInflWound | OutcomeKey::ScarMagnitude => {
                Measure::Final
            }
            OutcomeKey::InflammationAuc => Measure::Auc,
            OutcomeKey::TimeTo50PctDays => Measure::TimeTo(50.0),
            OutcomeKey::TimeTo90PctDays => Measure::TimeTo(90.0),
            OutcomeKey::PeakInflammation
            | OutcomeKey::PeakNeutrophils
            | OutcomeKey::PeakMacrophages
            | OutcomeKey::PeakCollagen
            | OutcomeKey::PeakMyofibroblasts => Measure::Peak,
        }
    }

    /// Preference direction of the outcome.
    pub fn direction(self) -> Direction {
        match self {
            OutcomeKey::WoundClosurePct | OutcomeKey::PeakCollagen => Direction::HigherIsBetter,
            _ => Direction::LowerIsBetter,
        }
    }
}

impl Display for OutcomeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeKey {
    type Err = TcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        OutcomeKey::ALL
            .into_iter()
            .find(|key| key.as_str() == needle)
            .ok_or_else(|| {
                TcsError::Config(
                    ErrorInfo::new("outcome-key-unknown", "unknown outcome key")
                        .with_context("key", needle)
                        .with_hint(
                            OutcomeKey::ALL
                                .iter()
                                .map(|key| key.as_str())
                                .collect::<Vec<_>>()
                                .join(", "),
                        ),
                )
            })
    }
}

/// A scalar outcome, or the reason it has no number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OutcomeValue {
    /// A measured number.
    Value(f64),
    /// A threshold outcome whose threshold was never reached.
    NotReached,
    /// The metric column was absent from the series.
    NotAvailable,
}

impl OutcomeValue {
    /// Returns the number when one is present.
    pub fn value(self) -> Option<f64> {
        match self {
            OutcomeValue::Value(value) => Some(value),
            OutcomeValue::NotReached | OutcomeValue::NotAvailable => None,
        }
    }

    /// True when a number is present.
    pub fn is_value(self) -> bool {
        matches!(self, OutcomeValue::Value(_))
    }

    /// Report rendering; non-values become the `N/A` placeholder.
    pub fn render(self) -> String {
        match self {
            OutcomeValue::Value(value) => format_significant(value, 6),
            OutcomeValue::NotReached | OutcomeValue::NotAvailable => "N/A".to_string(),
        }
    }
}

impl From<f64> for OutcomeValue {
    fn from(value: f64) -> Self {
        OutcomeValue::Value(value)
    }
}

/// Mapping from outcome key to value. Missing keys read as
/// [`OutcomeValue::NotAvailable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ScalarOutcome {
    values: BTreeMap<OutcomeKey, OutcomeValue>,
}

impl ScalarOutcome {
    /// Creates an empty outcome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the value stored for a key.
    pub fn get(&self, key: OutcomeKey) -> OutcomeValue {
        self.values
            .get(&key)
            .copied()
            .unwrap_or(OutcomeValue::NotAvailable)
    }

    /// Shortcut for [`OutcomeValue::value`] of a key.
    pub fn value(&self, key: OutcomeKey) -> Option<f64> {
        self.get(key).value()
    }

    /// Stores a value for a key.
    pub fn set(&mut self, key: OutcomeKey, value: impl Into<OutcomeValue>) {
        self.values.insert(key, value.into());
    }

    /// Builder style variant of [`ScalarOutcome::set`].
    pub fn with(mut self, key: OutcomeKey, value: impl Into<OutcomeValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Iterates stored entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (OutcomeKey, OutcomeValue)> + '_ {
        self.values.iter().map(|(key, value)| (*key, *value))
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(OutcomeKey, OutcomeValue)> for ScalarOutcome {
    fn from_iter<T: IntoIterator<Item = (OutcomeKey, OutcomeValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Formats a number with at most `digits` significant digits, trimming
/// trailing zeros.
pub fn format_significant(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs().log10().floor() as i32;
    if !(-5..21).contains(&magnitude) {
        return format!("{:.*e}", digits.saturating_sub(1), value);
    }
    let decimals = (digits as i32 - 1 - magnitude).max(0) as usize;
    let text = format!("{value:.decimals$}");
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_roundtrip_through_strings_and_serde() {
        for key in OutcomeKey::ALL {
            assert_eq!(key.as_str().parse::<OutcomeKey>().expect("parse"), key);
            let json = serde_json::to_string(&key).expect("json");
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
        assert!("closure".parse::<OutcomeKey>().is_err());
    }

    #[test]
    fn missing_keys_are_not_available() {
        let outcome = ScalarOutcome::new().with(OutcomeKey::ScarMagnitude, 0.5);
        assert_eq!(outcome.value(OutcomeKey::ScarMagnitude), Some(0.5));
        assert_eq!(
            outcome.get(OutcomeKey::PeakCollagen),
            OutcomeValue::NotAvailable
        );
        assert_eq!(OutcomeValue::NotReached.render(), "N/A");
    }

    #[test]
    fn significant_formatting() {
        assert_eq!(format_significant(0.1 + 0.2, 6), "0.3");
        assert_eq!(format_significant(42.0, 6), "42");
        assert_eq!(format_significant(-1.234_567_89, 6), "-1.23457");
        assert_eq!(format_significant(0.0, 6), "0");
    }
}
