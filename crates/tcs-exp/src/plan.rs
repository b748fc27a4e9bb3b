use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tcs_core::errors::{ErrorInfo, TcsError};
use tcs_core::{Factor, OutcomeKey};
use tcs_series::{ConsensusOptions, TimeAxis};
use tcs_surrogate::{CandidateSpace, ScoreWeights, SynergyThresholds};

use crate::catalog::{FactorCatalog, DEFAULT_EXCLUDES};
use crate::hash::stable_hash_string;
use crate::sampler::{absolute_dir, SamplerConfig};
use crate::serde::{from_yaml_slice, to_yaml_string};
use crate::simulator::{ProcessSimulator, Simulator, SyntheticSimulator, SyntheticSpec};

/// Where the factor list comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSpec {
    /// Directory of `*.toml` treatment files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Explicit factor names, used when `dir` is absent.
    #[serde(default)]
    pub factors: Vec<Factor>,
    /// Stems ignored when scanning `dir`.
    #[serde(default = "CatalogSpec::default_exclude")]
    pub exclude: Vec<String>,
    /// `all` or a comma separated subset.
    #[serde(default = "CatalogSpec::default_select")]
    pub select: String,
}

impl CatalogSpec {
    fn default_exclude() -> Vec<String> {
        DEFAULT_EXCLUDES.iter().map(|name| name.to_string()).collect()
    }

    fn default_select() -> String {
        "all".to_string()
    }
}

impl Default for CatalogSpec {
    fn default() -> Self {
        Self {
            dir: None,
            factors: Vec::new(),
            exclude: Self::default_exclude(),
            select: Self::default_select(),
        }
    }
}

/// External command configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Program followed by its arguments; placeholders are substituted.
    pub command: Vec<String>,
    /// Artifact path relative to the replicate working directory.
    #[serde(default = "ProcessSpec::default_artifact")]
    pub artifact: PathBuf,
    /// Seconds before a replicate is killed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ProcessSpec {
    fn default_artifact() -> PathBuf {
        PathBuf::from("metrics.csv")
    }
}

/// Simulator backing a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimulatorSpec {
    /// Seeded in-process model.
    Synthetic(SyntheticSpec),
    /// External program per replicate.
    Process(ProcessSpec),
}

impl Default for SimulatorSpec {
    fn default() -> Self {
        SimulatorSpec::Synthetic(SyntheticSpec::default())
    }
}

/// Full description of an adaptive study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlan {
    /// Master seed for every replicate.
    #[serde(default)]
    pub seed: u64,
    /// Factor source.
    #[serde(default)]
    pub catalog: CatalogSpec,
    /// Replicate bounds and convergence threshold.
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// Replicate length filter.
    #[serde(default)]
    pub consensus: ConsensusOptions,
    /// Time column of simulator artifacts.
    #[serde(default)]
    pub axis: TimeAxis,
    /// Keys used for convergence, scoring output and synergy.
    #[serde(default = "StudyPlan::default_tracked")]
    pub tracked: Vec<OutcomeKey>,
    /// Composite score terms.
    #[serde(default)]
    pub weights: ScoreWeights,
    /// Synergy classification band.
    #[serde(default)]
    pub synergy: SynergyThresholds,
    /// Candidate subset sizes.
    #[serde(default)]
    pub space: CandidateSpace,
    /// Candidates run after ranking.
    #[serde(default = "StudyPlan::default_top_k")]
    pub top_k: usize,
    /// Simulator backend.
    #[serde(default)]
    pub simulator: SimulatorSpec,
    /// Directory containing the plan on disk (ignored when serializing).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl StudyPlan {
    fn default_tracked() -> Vec<OutcomeKey> {
        OutcomeKey::DEFAULT_TRACKED.to_vec()
    }

    fn default_top_k() -> usize {
        20
    }

    /// Deterministic hash of the plan contents.
    pub fn plan_hash(&self) -> Result<String, TcsError> {
        stable_hash_string(self)
    }

    /// YAML rendering of the plan.
    pub fn to_yaml_string(&self) -> Result<String, TcsError> {
        to_yaml_string(self)
    }

    /// Checks bounds that serde cannot express.
    pub fn validate(&self) -> Result<(), TcsError> {
        self.sampler.validate()?;
        if self.tracked.is_empty() {
            return Err(TcsError::Config(ErrorInfo::new(
                "plan-no-tracked-keys",
                "at least one tracked outcome key is required",
            )));
        }
        let fraction = self.consensus.min_length_fraction;
        if fraction.is_nan() || fraction < 0.0 {
            return Err(TcsError::Config(
                ErrorInfo::new("plan-consensus-fraction", "min_length_fraction must be non-negative")
                    .with_context("value", fraction.to_string()),
            ));
        }
        Ok(())
    }

    /// Resolves a path relative to the plan directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Builds the factor catalog.
    pub fn factor_catalog(&self) -> Result<FactorCatalog, TcsError> {
        match &self.catalog.dir {
            Some(dir) => FactorCatalog::from_dir(&self.resolve(dir), &self.catalog.exclude),
            None => Ok(FactorCatalog::from_names(
                self.catalog.factors.iter().map(Factor::as_str),
            )),
        }
    }

    /// Factors selected for the study.
    pub fn factors(&self) -> Result<Vec<Factor>, TcsError> {
        self.factor_catalog()?.select(&self.catalog.select)
    }

    /// Instantiates the configured simulator.
    pub fn build_simulator(&self) -> Result<Box<dyn Simulator>, TcsError> {
        match &self.simulator {
            SimulatorSpec::Synthetic(spec) => Ok(Box::new(SyntheticSimulator::new(spec.clone()))),
            SimulatorSpec::Process(spec) => {
                let timeout = spec
                    .timeout_secs
                    .filter(|secs| *secs > 0.0)
                    .map(Duration::from_secs_f64);
                let mut command = spec.command.clone();
                if let Some(program) = command.first_mut() {
                    // a path-like program is relative to the plan, not to the replicate workdir
                    if Path::new(program.as_str()).components().count() > 1 {
                        *program = self.resolve(Path::new(program.as_str())).display().to_string();
                    }
                }
                let simulator = ProcessSimulator::new(&command, spec.artifact.clone())?
                    .with_timeout(timeout)
                    .with_env(spec.env.clone())
                    .with_axis(self.axis.clone());
                Ok(Box::new(simulator))
            }
        }
    }
}

impl Default for StudyPlan {
    fn default() -> Self {
        Self {
            seed: 0,
            catalog: CatalogSpec::default(),
            sampler: SamplerConfig::default(),
            consensus: ConsensusOptions::default(),
            axis: TimeAxis::default(),
            tracked: Self::default_tracked(),
            weights: ScoreWeights::default(),
            synergy: SynergyThresholds::default(),
            space: CandidateSpace::default(),
            top_k: Self::default_top_k(),
            simulator: SimulatorSpec::default(),
            base_dir: PathBuf::new(),
        }
    }
}

/// Loads a plan from YAML.
pub fn load_plan<P: AsRef<Path>>(path: P) -> Result<StudyPlan, TcsError> {
    let plan_path = path.as_ref();
    let bytes = fs::read(plan_path).map_err(|err| TcsError::io("plan-read", plan_path, err))?;
    let mut plan: StudyPlan = from_yaml_slice(&bytes)?;
    plan.tracked.sort();
    plan.tracked.dedup();
    plan.base_dir = absolute_dir(plan_path.parent().unwrap_or_else(|| Path::new(".")))?;
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_uses_defaults() {
        let plan: StudyPlan = from_yaml_slice(b"seed: 7\n").expect("parse");
        assert_eq!(plan.seed, 7);
        assert_eq!(plan.sampler, SamplerConfig::default());
        assert_eq!(plan.top_k, 20);
        assert_eq!(plan.tracked, OutcomeKey::DEFAULT_TRACKED.to_vec());
        assert!(matches!(plan.simulator, SimulatorSpec::Synthetic(_)));
        assert_eq!(plan.catalog.exclude, vec!["combination".to_string()]);
    }

    #[test]
    fn process_simulator_section_parses() {
        let yaml = b"simulator:\n  kind: process\n  command: [./sim, --seed, '{seed}']\n  timeout_secs: 30\nspace: pairs\n";
        let plan: StudyPlan = from_yaml_slice(yaml).expect("parse");
        let SimulatorSpec::Process(spec) = &plan.simulator else {
            panic!("expected process simulator");
        };
        assert_eq!(spec.command.len(), 3);
        assert_eq!(spec.artifact, PathBuf::from("metrics.csv"));
        assert_eq!(plan.space, CandidateSpace::Pairs);
        assert!(plan.build_simulator().is_ok());
    }

    #[test]
    fn hash_ignores_base_dir() {
        let mut a = StudyPlan::default();
        let b = StudyPlan::default();
        a.base_dir = PathBuf::from("/elsewhere");
        assert_eq!(a.plan_hash().expect("hash"), b.plan_hash().expect("hash"));
    }
}
