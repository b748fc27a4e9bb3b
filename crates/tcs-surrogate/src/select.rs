use std::fmt::{self, Display};
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tcs_core::errors::{ErrorInfo, TcsError};
use tcs_core::{Configuration, Factor, ScalarOutcome};
use tracing::debug;

use crate::model::SurrogateModel;
use crate::score::{composite_score, ScoreWeights};

/// Which multi-factor subsets are eligible for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSpace {
    /// Every pair.
    Pairs,
    /// Every pair and triple.
    Triples,
    /// Every subset of two or more factors.
    #[default]
    All,
    /// Every subset of two up to `n` factors.
    UpTo(usize),
}

impl CandidateSpace {
    /// Largest subset size for a catalog of `factor_count` factors.
    pub fn max_size(self, factor_count: usize) -> usize {
        let cap = match self {
            CandidateSpace::Pairs => 2,
            CandidateSpace::Triples => 3,
            CandidateSpace::All => factor_count,
            CandidateSpace::UpTo(limit) => limit,
        };
        cap.min(factor_count)
    }
}

impl Display for CandidateSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateSpace::Pairs => f.write_str("pairs"),
            CandidateSpace::Triples => f.write_str("triples"),
            CandidateSpace::All => f.write_str("all"),
            CandidateSpace::UpTo(limit) => write!(f, "{limit}"),
        }
    }
}

impl FromStr for CandidateSpace {
    type Err = TcsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pairs" => Ok(CandidateSpace::Pairs),
            "triples" => Ok(CandidateSpace::Triples),
            "all" => Ok(CandidateSpace::All),
            other => other
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit >= 2)
                .map(CandidateSpace::UpTo)
                .ok_or_else(|| {
                    TcsError::Config(
                        ErrorInfo::new("candidate-space-unknown", "unrecognised candidate space")
                            .with_context("value", value)
                            .with_hint("use pairs, triples, all or a maximum size of at least 2"),
                    )
                }),
        }
    }
}

/// Enumerates subsets of size two or more in a fixed order: by size, then
/// lexicographically over the sorted factor list.
pub fn enumerate_candidates(factors: &[Factor], space: CandidateSpace) -> Vec<Configuration> {
    let sorted: Vec<&Factor> = factors.iter().sorted().dedup().collect();
    let max_size = space.max_size(sorted.len());
    (2..=max_size)
        .flat_map(|size| {
            sorted
                .iter()
                .copied()
                .combinations(size)
                .map(|combo| Configuration::new(combo.into_iter().cloned()))
        })
        .collect()
}

/// A ranked multi-factor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Position in enumeration order; breaks score ties.
    pub index: usize,
    /// Factors applied together.
    pub configuration: Configuration,
    /// Surrogate prediction.
    pub predicted: ScalarOutcome,
    /// Composite score of the prediction, lower is better.
    #[serde(with = "crate::score::unscored")]
    pub score: f64,
}

/// Ranks the candidate space by predicted score.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandidateSelector {
    weights: ScoreWeights,
    space: CandidateSpace,
}

impl CandidateSelector {
    /// Creates a selector over the given space.
    pub fn new(weights: ScoreWeights, space: CandidateSpace) -> Self {
        Self { weights, space }
    }

    /// Score weights in use.
    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Eligible subset sizes.
    pub fn space(&self) -> CandidateSpace {
        self.space
    }

    /// Predicts and scores every candidate, best first.
    pub fn rank(&self, model: &SurrogateModel) -> Result<Vec<Candidate>, TcsError> {
        let factors: Vec<Factor> = model.factors().cloned().collect();
        let mut candidates = enumerate_candidates(&factors, self.space)
            .into_iter()
            .enumerate()
            .map(|(index, configuration)| {
                let predicted = model.predict(&configuration)?;
                let score = composite_score(&predicted, model.baseline(), &self.weights);
                Ok(Candidate {
                    index,
                    configuration,
                    predicted,
                    score,
                })
            })
            .collect::<Result<Vec<_>, TcsError>>()?;
        sort_by_score(&mut candidates);
        debug!(candidates = candidates.len(), space = %self.space, "ranked candidate space");
        Ok(candidates)
    }
}

/// Stable ascending sort by score; equal scores keep enumeration order.
pub fn sort_by_score(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.index.cmp(&b.index)));
}

/// The `top_k` best candidates, clamped to the number available.
pub fn select(candidates: &[Candidate], top_k: usize) -> Vec<Candidate> {
    let mut ranked = candidates.to_vec();
    sort_by_score(&mut ranked);
    ranked.truncate(top_k.min(ranked.len()));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(names: &[&str]) -> Vec<Factor> {
        names.iter().map(|name| Factor::new(*name)).collect()
    }

    #[test]
    fn enumeration_order_is_size_then_lexicographic() {
        let labels: Vec<String> = enumerate_candidates(&factors(&["c", "a", "b"]), CandidateSpace::All)
            .iter()
            .map(Configuration::label)
            .collect();
        assert_eq!(labels, vec!["a+b", "a+c", "b+c", "a+b+c"]);
    }

    #[test]
    fn space_sizes() {
        let five = factors(&["a", "b", "c", "d", "e"]);
        assert_eq!(enumerate_candidates(&five, CandidateSpace::Pairs).len(), 10);
        assert_eq!(enumerate_candidates(&five, CandidateSpace::Triples).len(), 20);
        assert_eq!(enumerate_candidates(&five, CandidateSpace::All).len(), 26);
        assert_eq!(enumerate_candidates(&five, CandidateSpace::UpTo(4)).len(), 25);
        assert!(enumerate_candidates(&factors(&["a"]), CandidateSpace::All).is_empty());
    }

    #[test]
    fn parses_space_names() {
        assert_eq!("Pairs".parse::<CandidateSpace>().expect("pairs"), CandidateSpace::Pairs);
        assert_eq!("4".parse::<CandidateSpace>().expect("up to"), CandidateSpace::UpTo(4));
        assert!("1".parse::<CandidateSpace>().is_err());
        assert!("quads".parse::<CandidateSpace>().is_err());
    }
}
