use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tcs_core::errors::{ErrorInfo, TcsError};
use tcs_core::{Configuration, Factor, OutcomeKey, OutcomeValue, ScalarOutcome};
use tracing::debug;

/// Additive effect of one factor: outcome key to delta over baseline.
pub type SurrogateEffect = BTreeMap<OutcomeKey, f64>;

/// Additive surrogate fitted from the baseline and every single-factor
/// configuration that produced data.
///
/// A combination is predicted as the baseline plus the sum of its factors'
/// deltas, one outcome key at a time. The model is immutable once fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurrogateModel {
    keys: Vec<OutcomeKey>,
    baseline: ScalarOutcome,
    effects: BTreeMap<Factor, SurrogateEffect>,
}

impl SurrogateModel {
    /// Fits per-factor deltas for `keys`.
    ///
    /// A delta is zero whenever the factor or the baseline lacks a value for
    /// that key.
    pub fn fit(
        baseline: &ScalarOutcome,
        singles: &BTreeMap<Factor, ScalarOutcome>,
        keys: &[OutcomeKey],
    ) -> Result<Self, TcsError> {
        if singles.is_empty() {
            return Err(TcsError::Surrogate(
                ErrorInfo::new("surrogate-no-effects", "no single-factor outcome to fit")
                    .with_hint("at least one single-factor configuration must produce data"),
            ));
        }
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let effects: BTreeMap<Factor, SurrogateEffect> = singles
            .iter()
            .map(|(factor, observed)| {
                let effect = keys
                    .iter()
                    .map(|key| (*key, delta(observed.get(*key), baseline.get(*key))))
                    .collect();
                (factor.clone(), effect)
            })
            .collect();
        debug!(factors = effects.len(), keys = keys.len(), "fitted surrogate");

        Ok(Self {
            keys,
            baseline: baseline.clone(),
            effects,
        })
    }

    /// Outcome keys covered by the model.
    pub fn keys(&self) -> &[OutcomeKey] {
        &self.keys
    }

    /// Baseline outcome captured at fit time.
    pub fn baseline(&self) -> &ScalarOutcome {
        &self.baseline
    }

    /// Per-factor deltas.
    pub fn effects(&self) -> &BTreeMap<Factor, SurrogateEffect> {
        &self.effects
    }

    /// Factors with a fitted effect, sorted.
    pub fn factors(&self) -> impl Iterator<Item = &Factor> + '_ {
        self.effects.keys()
    }

    /// Delta of a single factor on one key, zero when unknown.
    pub fn delta(&self, factor: &Factor, key: OutcomeKey) -> f64 {
        self.effects
            .get(factor)
            .and_then(|effect| effect.get(&key))
            .copied()
            .unwrap_or(0.0)
    }

    /// Predicts the outcome of a configuration under additivity.
    ///
    /// Keys whose baseline is not a value keep the baseline marker; they are
    /// never treated as zero.
    pub fn predict(&self, configuration: &Configuration) -> Result<ScalarOutcome, TcsError> {
        if let Some(unknown) = configuration
            .factors()
            .iter()
            .find(|factor| !self.effects.contains_key(*factor))
        {
            return Err(TcsError::Surrogate(
                ErrorInfo::new("surrogate-unknown-factor", "factor has no fitted effect")
                    .with_context("factor", unknown.as_str())
                    .with_context("configuration", configuration.label()),
            ));
        }
        Ok(self
            .keys
            .iter()
            .map(|key| {
                let value = match self.baseline.get(*key) {
                    OutcomeValue::Value(base) => OutcomeValue::Value(
                        base + configuration
                            .factors()
                            .iter()
                            .map(|factor| self.delta(factor, *key))
                            .sum::<f64>(),
                    ),
                    other => other,
                };
                (*key, value)
            })
            .collect())
    }
}

fn delta(observed: OutcomeValue, baseline: OutcomeValue) -> f64 {
    match (observed, baseline) {
        (OutcomeValue::Value(observed), OutcomeValue::Value(baseline)) => observed - baseline,
        _ => 0.0,
    }
}
