use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use tcs_core::{Direction, OutcomeKey, OutcomeValue, ScalarOutcome};

const BASELINE_EPSILON: f64 = 1e-12;

/// Verdict on how a combination compares to its additive prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynergyClass {
    /// Observed clearly better than predicted.
    Synergistic,
    /// Observed clearly worse than predicted.
    Antagonistic,
    /// Within the additive band.
    Additive,
}

impl SynergyClass {
    /// Report label.
    pub fn as_str(self) -> &'static str {
        match self {
            SynergyClass::Synergistic => "synergistic",
            SynergyClass::Antagonistic => "antagonistic",
            SynergyClass::Additive => "additive",
        }
    }
}

impl Display for SynergyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict bounds of the additive band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynergyThresholds {
    /// Mean synergy above this is synergistic.
    #[serde(default = "SynergyThresholds::default_synergistic")]
    pub synergistic: f64,
    /// Mean synergy below this is antagonistic.
    #[serde(default = "SynergyThresholds::default_antagonistic")]
    pub antagonistic: f64,
}

impl SynergyThresholds {
    fn default_synergistic() -> f64 {
        0.10
    }

    fn default_antagonistic() -> f64 {
        -0.10
    }

    /// Classifies a mean synergy value.
    pub fn classify(&self, mean: f64) -> SynergyClass {
        if mean > self.synergistic {
            SynergyClass::Synergistic
        } else if mean < self.antagonistic {
            SynergyClass::Antagonistic
        } else {
            SynergyClass::Additive
        }
    }
}

impl Default for SynergyThresholds {
    fn default() -> Self {
        Self {
            synergistic: Self::default_synergistic(),
            antagonistic: Self::default_antagonistic(),
        }
    }
}

/// Normalised deviation of observed from predicted outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyResult {
    /// Signed deviation per key; positive means better than additive.
    pub per_key: BTreeMap<OutcomeKey, f64>,
    /// Unweighted mean over the analysed keys.
    pub mean: f64,
    /// Verdict for `mean`.
    pub class: SynergyClass,
}

/// Deviation of one key, scaled by the baseline magnitude.
///
/// Zero when any side lacks a value or the baseline is numerically zero.
pub fn key_synergy(key: OutcomeKey, observed: OutcomeValue, predicted: OutcomeValue, baseline: OutcomeValue) -> f64 {
    let (OutcomeValue::Value(observed), OutcomeValue::Value(predicted), OutcomeValue::Value(baseline)) =
        (observed, predicted, baseline)
    else {
        return 0.0;
    };
    if baseline.abs() <= BASELINE_EPSILON {
        return 0.0;
    }
    match key.direction() {
        Direction::LowerIsBetter => (predicted - observed) / baseline.abs(),
        Direction::HigherIsBetter => (observed - predicted) / baseline.abs(),
    }
}

/// Compares observed combination outcomes with the surrogate prediction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SynergyAnalyzer {
    thresholds: SynergyThresholds,
}

impl SynergyAnalyzer {
    /// Analyzer with custom thresholds.
    pub fn new(thresholds: SynergyThresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds in use.
    pub fn thresholds(&self) -> SynergyThresholds {
        self.thresholds
    }

    /// Per-key deviations, their mean and the verdict.
    pub fn analyze(
        &self,
        observed: &ScalarOutcome,
        predicted: &ScalarOutcome,
        baseline: &ScalarOutcome,
        keys: &[OutcomeKey],
    ) -> SynergyResult {
        let per_key: BTreeMap<OutcomeKey, f64> = keys
            .iter()
            .map(|key| {
                (
                    *key,
                    key_synergy(*key, observed.get(*key), predicted.get(*key), baseline.get(*key)),
                )
            })
            .collect();
        let mean = if per_key.is_empty() {
            0.0
        } else {
            per_key.values().sum::<f64>() / per_key.len() as f64
        };
        SynergyResult {
            per_key,
            mean,
            class: self.thresholds.classify(mean),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges_are_additive() {
        let thresholds = SynergyThresholds::default();
        assert_eq!(thresholds.classify(0.10), SynergyClass::Additive);
        assert_eq!(thresholds.classify(-0.10), SynergyClass::Additive);
        assert_eq!(thresholds.classify(0.1000001), SynergyClass::Synergistic);
        assert_eq!(thresholds.classify(-0.1000001), SynergyClass::Antagonistic);
    }

    #[test]
    fn zero_baseline_yields_zero() {
        let value = key_synergy(
            OutcomeKey::ScarMagnitude,
            OutcomeValue::Value(0.2),
            OutcomeValue::Value(0.4),
            OutcomeValue::Value(0.0),
        );
        assert_eq!(value, 0.0);
    }

    #[test]
    fn missing_side_yields_zero() {
        let value = key_synergy(
            OutcomeKey::TimeTo50PctDays,
            OutcomeValue::NotReached,
            OutcomeValue::Value(4.0),
            OutcomeValue::Value(8.0),
        );
        assert_eq!(value, 0.0);
    }
}
