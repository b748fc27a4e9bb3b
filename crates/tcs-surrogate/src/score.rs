use serde::{Deserialize, Serialize};
use tcs_core::{Direction, OutcomeKey, ScalarOutcome};

/// One weighted term of the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTerm {
    /// Outcome the term reads.
    pub key: OutcomeKey,
    /// Relative weight.
    pub weight: f64,
    /// Lower bound applied to the normalising value.
    #[serde(default = "ScoreTerm::default_floor")]
    pub floor: f64,
    /// Substitute used when the outcome has no number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<f64>,
}

impl ScoreTerm {
    fn default_floor() -> f64 {
        1e-6
    }

    /// Term with the default floor and no fallback.
    pub fn new(key: OutcomeKey, weight: f64) -> Self {
        Self {
            key,
            weight,
            floor: Self::default_floor(),
            missing: None,
        }
    }

    /// Sets the normalisation floor.
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    /// Sets the fallback for missing values.
    pub fn with_missing(mut self, missing: f64) -> Self {
        self.missing = Some(missing);
        self
    }

    fn resolve(&self, outcome: &ScalarOutcome) -> Option<f64> {
        outcome.value(self.key).or(self.missing)
    }

    // Relative to baseline, oriented so that smaller is better.
    fn ratio(&self, value: f64, baseline: f64) -> f64 {
        match self.key.direction() {
            Direction::LowerIsBetter => value / baseline.max(self.floor),
            Direction::HigherIsBetter => baseline.max(self.floor) / value.max(self.floor),
        }
    }
}

/// Weighted terms of the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreWeights {
    terms: Vec<ScoreTerm>,
}

impl ScoreWeights {
    /// Builds weights from explicit terms.
    pub fn new(terms: Vec<ScoreTerm>) -> Self {
        Self { terms }
    }

    /// Configured terms in order.
    pub fn terms(&self) -> &[ScoreTerm] {
        &self.terms
    }

    /// Keys read by the score.
    pub fn keys(&self) -> impl Iterator<Item = OutcomeKey> + '_ {
        self.terms.iter().map(|term| term.key)
    }

    fn total_weight(&self) -> f64 {
        self.terms.iter().map(|term| term.weight).sum()
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::new(vec![
            ScoreTerm::new(OutcomeKey::TimeTo50PctDays, 0.4)
                .with_floor(0.1)
                .with_missing(30.0),
            ScoreTerm::new(OutcomeKey::ScarMagnitude, 0.3).with_missing(1.0),
            ScoreTerm::new(OutcomeKey::PeakInflammation, 0.3).with_missing(1.0),
        ])
    }
}

/// Serde adapter for scores: a non-finite score is written as `null` and a
/// `null` reads back as `+inf`, the unscorable sentinel.
pub mod unscored {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Writes finite scores as numbers and anything else as `null`.
    pub fn serialize<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if score.is_finite() {
            serializer.serialize_f64(*score)
        } else {
            serializer.serialize_none()
        }
    }

    /// Reads a number, or `+inf` for `null`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }

    /// Same mapping for optional scores; pair with `#[serde(default)]` so an
    /// absent field stays `None`.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        /// Writes `Some(score)` through [`super::serialize`].
        pub fn serialize<S: Serializer>(score: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
            match score {
                Some(score) => super::serialize(score, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// A present field is always `Some`; `null` becomes `Some(+inf)`.
        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
            Ok(Some(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY)))
        }
    }
}

/// Baseline-relative weighted score; lower is better.
///
/// A term that cannot be resolved on either side is left out and the
/// remaining terms are scaled back up to the full weight. When no term can be
/// scored the result is `+inf`, which ranks last.
pub fn composite_score(outcome: &ScalarOutcome, baseline: &ScalarOutcome, weights: &ScoreWeights) -> f64 {
    let mut score = 0.0;
    let mut scored_weight = 0.0;
    for term in weights.terms() {
        let (Some(value), Some(base)) = (term.resolve(outcome), term.resolve(baseline)) else {
            continue;
        };
        score += term.weight * term.ratio(value, base);
        scored_weight += term.weight;
    }
    if scored_weight <= 0.0 {
        return f64::INFINITY;
    }
    score * weights.total_weight() / scored_weight
}
