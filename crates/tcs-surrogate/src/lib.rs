#![deny(missing_docs)]
#![doc = "Additive surrogate model, candidate ranking and synergy analysis."]

/// Additive surrogate fitted from single-factor outcomes.
pub mod model;
/// Composite, baseline-relative scoring.
pub mod score;
/// Candidate enumeration and top-K selection.
pub mod select;
/// Observed versus predicted deviation.
pub mod synergy;

pub use model::{SurrogateEffect, SurrogateModel};
pub use score::{composite_score, ScoreTerm, ScoreWeights};
pub use select::{enumerate_candidates, select, sort_by_score, Candidate, CandidateSelector, CandidateSpace};
pub use synergy::{key_synergy, SynergyAnalyzer, SynergyClass, SynergyResult, SynergyThresholds};
