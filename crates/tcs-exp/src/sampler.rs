use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tcs_core::errors::{ErrorInfo, TcsError};
use tcs_core::{replicate_seed, Configuration, OutcomeKey, ScalarOutcome};
use tcs_series::{aggregate, ConsensusOptions, ConsensusResult, OutcomeExtractor, TimeSeries};
use tracing::{debug, info, instrument, warn};

use crate::simulator::{ReplicateRequest, Simulator};

/// Replicate bounds and the convergence criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Successful replicates required before convergence is checked.
    #[serde(default = "SamplerConfig::default_min_runs")]
    pub min_runs: u32,
    /// Ceiling on simulator invocations, failed ones included.
    #[serde(default = "SamplerConfig::default_max_runs")]
    pub max_runs: u32,
    /// Mean coefficient of variation below which sampling stops.
    #[serde(default = "SamplerConfig::default_cv_threshold")]
    pub cv_threshold: f64,
}

impl SamplerConfig {
    fn default_min_runs() -> u32 {
        3
    }

    fn default_max_runs() -> u32 {
        10
    }

    fn default_cv_threshold() -> f64 {
        0.05
    }

    /// Checks the bounds.
    pub fn validate(&self) -> Result<(), TcsError> {
        let invalid = |code: &str, message: &str| {
            Err(TcsError::Config(
                ErrorInfo::new(code, message)
                    .with_context("min_runs", self.min_runs.to_string())
                    .with_context("max_runs", self.max_runs.to_string())
                    .with_context("cv_threshold", self.cv_threshold.to_string()),
            ))
        };
        if self.min_runs < 1 {
            return invalid("sampler-min-runs", "min_runs must be at least 1");
        }
        if self.max_runs < self.min_runs {
            return invalid("sampler-max-runs", "max_runs must not be below min_runs");
        }
        if self.cv_threshold.is_nan() || self.cv_threshold <= 0.0 {
            return invalid("sampler-cv-threshold", "cv_threshold must be positive");
        }
        Ok(())
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            min_runs: Self::default_min_runs(),
            max_runs: Self::default_max_runs(),
            cv_threshold: Self::default_cv_threshold(),
        }
    }
}

/// Lifecycle of one configuration's sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerState {
    /// Replicates are still being collected.
    Collecting,
    /// Replicate outcomes agreed within the CV threshold.
    Converged,
    /// The attempt ceiling was reached without convergence.
    Exhausted,
    /// Every attempt failed.
    NoData,
}

impl SamplerState {
    /// True once sampling has stopped.
    pub fn is_terminal(self) -> bool {
        !matches!(self, SamplerState::Collecting)
    }

    /// True when the configuration produced usable data.
    pub fn has_data(self) -> bool {
        matches!(self, SamplerState::Converged | SamplerState::Exhausted)
    }

    /// Report label.
    pub fn as_str(self) -> &'static str {
        match self {
            SamplerState::Collecting => "collecting",
            SamplerState::Converged => "converged",
            SamplerState::Exhausted => "exhausted",
            SamplerState::NoData => "no_data",
        }
    }
}

/// A failed replicate attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateFailure {
    /// Attempt index.
    pub attempt: u32,
    /// Error code reported by the simulator.
    pub code: String,
    /// Diagnostic message.
    pub reason: String,
}

/// Everything learned about one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledConfiguration {
    /// Factors applied.
    pub configuration: Configuration,
    /// Terminal state.
    pub state: SamplerState,
    /// Simulator invocations.
    pub attempts: u32,
    /// Successful replicates.
    pub successes: u32,
    /// Failed attempts, in order.
    pub failures: Vec<ReplicateFailure>,
    /// Archived replicate artifacts.
    pub artifacts: Vec<PathBuf>,
    /// Outcome of the consensus mean series.
    pub outcome: ScalarOutcome,
    /// Mean of per-replicate outcomes on the tracked keys.
    pub replicate_mean: ScalarOutcome,
    /// Population std of per-replicate outcomes on the tracked keys.
    pub replicate_std: ScalarOutcome,
    /// Last computed mean CV.
    pub cv: Option<f64>,
    /// Consensus of the successful replicates.
    #[serde(skip)]
    pub consensus: Option<ConsensusResult>,
}

impl SampledConfiguration {
    fn no_data(configuration: Configuration, attempts: u32, failures: Vec<ReplicateFailure>) -> Self {
        Self {
            configuration,
            state: SamplerState::NoData,
            attempts,
            successes: 0,
            failures,
            artifacts: Vec::new(),
            outcome: ScalarOutcome::new(),
            replicate_mean: ScalarOutcome::new(),
            replicate_std: ScalarOutcome::new(),
            cv: None,
            consensus: None,
        }
    }
}

/// Mean coefficient of variation over `keys`.
///
/// Keys with fewer than two values or a near-zero mean are skipped; when no
/// key qualifies the result is 1.0 so that sampling continues.
pub fn mean_cv(outcomes: &[ScalarOutcome], keys: &[OutcomeKey]) -> f64 {
    let cvs: Vec<f64> = keys
        .iter()
        .filter_map(|key| {
            let values: Vec<f64> = outcomes.iter().filter_map(|outcome| outcome.value(*key)).collect();
            if values.len() < 2 {
                return None;
            }
            let (mean, std) = mean_std(&values);
            if mean.abs() < 1e-12 {
                return None;
            }
            Some(std / mean.abs())
        })
        .collect();
    if cvs.is_empty() {
        1.0
    } else {
        cvs.iter().sum::<f64>() / cvs.len() as f64
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    (mean, var.sqrt())
}

fn summarize(outcomes: &[ScalarOutcome], keys: &[OutcomeKey]) -> (ScalarOutcome, ScalarOutcome) {
    let mut mean_out = ScalarOutcome::new();
    let mut std_out = ScalarOutcome::new();
    for key in keys {
        let values: Vec<f64> = outcomes.iter().filter_map(|outcome| outcome.value(*key)).collect();
        if values.is_empty() {
            // keep the marker of the last replicate, e.g. NotReached
            if let Some(last) = outcomes.last() {
                mean_out.set(*key, last.get(*key));
            }
            continue;
        }
        let (mean, std) = mean_std(&values);
        mean_out.set(*key, mean);
        std_out.set(*key, std);
    }
    (mean_out, std_out)
}

/// Anchors a relative directory at the current working directory.
///
/// Replicate workdirs double as the child's cwd and as `TCS_WORKDIR`, so they
/// must not depend on where they are resolved from.
pub(crate) fn absolute_dir(dir: &Path) -> Result<PathBuf, TcsError> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|err| TcsError::io("current-dir", dir, err))?;
    Ok(cwd.join(dir))
}

/// Runs replicates of one configuration until its outcomes stabilise.
pub struct AdaptiveSampler<'a> {
    simulator: &'a dyn Simulator,
    config: SamplerConfig,
    consensus: ConsensusOptions,
    extractor: OutcomeExtractor,
    tracked: Vec<OutcomeKey>,
    master_seed: u64,
    out_dir: PathBuf,
}

impl<'a> AdaptiveSampler<'a> {
    /// Creates a sampler writing workdirs and raw artifacts below `out_dir`.
    pub fn new(
        simulator: &'a dyn Simulator,
        config: SamplerConfig,
        master_seed: u64,
        out_dir: &Path,
    ) -> Result<Self, TcsError> {
        config.validate()?;
        let out_dir = absolute_dir(out_dir)?;
        Ok(Self {
            simulator,
            config,
            consensus: ConsensusOptions::default(),
            extractor: OutcomeExtractor::default(),
            tracked: OutcomeKey::DEFAULT_TRACKED.to_vec(),
            master_seed,
            out_dir,
        })
    }

    /// Consensus options for the length filter.
    pub fn with_consensus(mut self, consensus: ConsensusOptions) -> Self {
        self.consensus = consensus;
        self
    }

    /// Outcome keys extracted from the consensus.
    pub fn with_extractor(mut self, extractor: OutcomeExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Keys whose spread decides convergence.
    pub fn with_tracked(mut self, tracked: Vec<OutcomeKey>) -> Self {
        self.tracked = tracked;
        self
    }

    /// Replicate bounds.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Absolute directory receiving `work/` and `raw/`.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn request(&self, configuration: &Configuration, attempt: u32) -> ReplicateRequest {
        let stem = configuration.file_stem();
        ReplicateRequest {
            configuration: configuration.clone(),
            attempt,
            seed: replicate_seed(self.master_seed, configuration, attempt),
            workdir: self.out_dir.join("work").join(&stem).join(format!("run{attempt:03}")),
            archive: Some(self.out_dir.join("raw").join(format!("{stem}_run{attempt:03}.csv"))),
        }
    }

    /// Samples a configuration to a terminal state.
    ///
    /// Replicate failures are recorded and never abort the configuration;
    /// only filesystem problems around the consensus surface as errors.
    #[instrument(skip_all, fields(configuration = %configuration))]
    pub fn sample(&self, configuration: &Configuration) -> Result<SampledConfiguration, TcsError> {
        let mut state = SamplerState::Collecting;
        let mut runs: Vec<TimeSeries> = Vec::new();
        let mut replicate_outcomes: Vec<ScalarOutcome> = Vec::new();
        let mut failures = Vec::new();
        let mut artifacts = Vec::new();
        let mut consensus = None;
        let mut cv = None;
        let mut attempts = 0;

        while attempts < self.config.max_runs {
            let request = self.request(configuration, attempts);
            attempts += 1;
            let series = match self.simulator.run(&request) {
                Ok(series) if !series.is_empty() => series,
                Ok(_) => {
                    warn!(attempt = request.attempt, "replicate produced no rows");
                    failures.push(ReplicateFailure {
                        attempt: request.attempt,
                        code: "simulation-empty".to_string(),
                        reason: "artifact has no rows".to_string(),
                    });
                    continue;
                }
                Err(err) => {
                    warn!(attempt = request.attempt, error = %err, "replicate failed");
                    failures.push(ReplicateFailure {
                        attempt: request.attempt,
                        code: err.info().code.clone(),
                        reason: err.info().message.clone(),
                    });
                    continue;
                }
            };
            replicate_outcomes.push(self.extractor.extract_all(&series));
            runs.push(series);
            if let Some(archive) = request.archive {
                artifacts.push(archive);
            }

            if runs.len() as u32 >= self.config.min_runs {
                consensus = Some(aggregate(&runs, &self.consensus)?);
                let current = mean_cv(&replicate_outcomes, &self.tracked);
                debug!(successes = runs.len(), cv = current, "convergence check");
                cv = Some(current);
                if current < self.config.cv_threshold {
                    state = SamplerState::Converged;
                    break;
                }
            }
        }

        if runs.is_empty() {
            warn!(attempts, "every replicate failed");
            return Ok(SampledConfiguration::no_data(configuration.clone(), attempts, failures));
        }
        if state == SamplerState::Collecting {
            state = SamplerState::Exhausted;
        }
        let consensus = match consensus {
            Some(consensus) => consensus,
            None => aggregate(&runs, &self.consensus)?,
        };
        let outcome = self.extractor.extract_all(&consensus.mean_series());
        let (replicate_mean, replicate_std) = summarize(&replicate_outcomes, &self.tracked);
        info!(
            state = state.as_str(),
            successes = runs.len(),
            attempts,
            cv = cv.unwrap_or(f64::NAN),
            "configuration sampled"
        );

        Ok(SampledConfiguration {
            configuration: configuration.clone(),
            state,
            attempts,
            successes: runs.len() as u32,
            failures,
            artifacts,
            outcome,
            replicate_mean,
            replicate_std,
            cv,
            consensus: Some(consensus),
        })
    }
}
