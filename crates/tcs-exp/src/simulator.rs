use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tcs_core::errors::{ErrorInfo, TcsError};
use tcs_core::rng::configuration_stream;
use tcs_core::{derive_substream_seed, Configuration, Factor, RngHandle};
use tcs_series::{load_csv, write_csv, TimeAxis, TimeSeries};
use tracing::{debug, warn};

fn simulation_error(code: &str, message: impl Into<String>, request: &ReplicateRequest) -> TcsError {
    TcsError::Simulation(
        ErrorInfo::new(code, message)
            .with_context("configuration", request.configuration.label())
            .with_context("attempt", request.attempt.to_string()),
    )
}

/// One replicate invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateRequest {
    /// Factors to apply.
    pub configuration: Configuration,
    /// Zero based attempt index within the configuration.
    pub attempt: u32,
    /// Seed for this attempt.
    pub seed: u64,
    /// Fresh working directory owned by this replicate.
    pub workdir: PathBuf,
    /// Where the raw artifact should be archived, if anywhere.
    pub archive: Option<PathBuf>,
}

/// Boundary to the external stochastic simulation.
///
/// Implementations must be callable from several worker threads at once;
/// each request carries its own working directory.
pub trait Simulator: Send + Sync {
    /// Runs one replicate and returns its parsed time series.
    fn run(&self, request: &ReplicateRequest) -> Result<TimeSeries, TcsError>;
}

/// Spawns an external command per replicate.
///
/// Argument placeholders `{factors}`, `{label}`, `{seed}`, `{replicate}` and
/// `{workdir}` are substituted, and the same values are exported as
/// `TCS_FACTORS`, `TCS_SEED`, `TCS_REPLICATE` and `TCS_WORKDIR`. A replicate
/// succeeds when the artifact file exists afterwards; the exit status is only
/// logged.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSimulator {
    program: String,
    args: Vec<String>,
    artifact: PathBuf,
    timeout: Option<Duration>,
    env: BTreeMap<String, String>,
    axis: TimeAxis,
}

impl ProcessSimulator {
    /// Simulator running `command[0]` with the remaining entries as arguments.
    pub fn new(command: &[String], artifact: impl Into<PathBuf>) -> Result<Self, TcsError> {
        let Some((program, args)) = command.split_first() else {
            return Err(TcsError::Config(ErrorInfo::new(
                "simulator-command-empty",
                "process simulator needs a command",
            )));
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            artifact: artifact.into(),
            timeout: None,
            env: BTreeMap::new(),
            axis: TimeAxis::default(),
        })
    }

    /// Kills replicates running longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extra environment passed to every replicate.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Time axis used to parse the artifact.
    pub fn with_axis(mut self, axis: TimeAxis) -> Self {
        self.axis = axis;
        self
    }

    fn substitute(&self, template: &str, request: &ReplicateRequest) -> String {
        template
            .replace("{factors}", &factor_list(&request.configuration))
            .replace("{label}", &request.configuration.label())
            .replace("{seed}", &request.seed.to_string())
            .replace("{replicate}", &request.attempt.to_string())
            .replace("{workdir}", &request.workdir.display().to_string())
    }

    fn wait(&self, child: &mut std::process::Child, request: &ReplicateRequest) -> Result<(), TcsError> {
        let started = Instant::now();
        loop {
            let status = child
                .try_wait()
                .map_err(|err| simulation_error("simulation-wait", err.to_string(), request))?;
            if let Some(status) = status {
                if !status.success() {
                    warn!(
                        configuration = %request.configuration,
                        attempt = request.attempt,
                        %status,
                        "simulator exited with failure status"
                    );
                }
                return Ok(());
            }
            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(simulation_error(
                        "simulation-timeout",
                        format!("replicate exceeded {}s", limit.as_secs_f64()),
                        request,
                    ));
                }
            }
            thread::sleep(Duration::from_millis(25));
        }
    }
}

impl Simulator for ProcessSimulator {
    fn run(&self, request: &ReplicateRequest) -> Result<TimeSeries, TcsError> {
        reset_dir(&request.workdir)?;
        let stdout = File::create(request.workdir.join("stdout.log"))
            .map_err(|err| TcsError::io("simulation-log", &request.workdir, err))?;
        let stderr = File::create(request.workdir.join("stderr.log"))
            .map_err(|err| TcsError::io("simulation-log", &request.workdir, err))?;

        let mut command = Command::new(self.substitute(&self.program, request));
        command
            .args(self.args.iter().map(|arg| self.substitute(arg, request)))
            .current_dir(&request.workdir)
            .envs(&self.env)
            .env("TCS_FACTORS", factor_list(&request.configuration))
            .env("TCS_SEED", request.seed.to_string())
            .env("TCS_REPLICATE", request.attempt.to_string())
            .env("TCS_WORKDIR", &request.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        let mut child = command
            .spawn()
            .map_err(|err| simulation_error("simulation-spawn", err.to_string(), request))?;
        self.wait(&mut child, request)?;

        let artifact = request.workdir.join(&self.artifact);
        if !artifact.is_file() {
            return Err(simulation_error(
                "simulation-no-artifact",
                format!("{} was not produced", self.artifact.display()),
                request,
            ));
        }
        let series = load_csv(&artifact, &self.axis)?;
        if let Some(archive) = &request.archive {
            if let Some(parent) = archive.parent() {
                fs::create_dir_all(parent).map_err(|err| TcsError::io("archive-dir", parent, err))?;
            }
            fs::copy(&artifact, archive).map_err(|err| TcsError::io("archive-copy", archive, err))?;
        }
        debug!(rows = series.len(), artifact = %artifact.display(), "replicate finished");
        Ok(series)
    }
}

fn factor_list(configuration: &Configuration) -> String {
    configuration
        .factors()
        .iter()
        .map(Factor::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn reset_dir(dir: &Path) -> Result<(), TcsError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|err| TcsError::io("workdir-reset", dir, err))?;
    }
    fs::create_dir_all(dir).map_err(|err| TcsError::io("workdir-create", dir, err))
}

/// Relative change a factor applies to the synthetic healing response.
///
/// Positive `closure` speeds closure up; negative `scar` and `inflammation`
/// reduce those outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct FactorEffect {
    /// Fractional change of the closure rate.
    #[serde(default)]
    pub closure: f64,
    /// Fractional change of the final scar magnitude.
    #[serde(default)]
    pub scar: f64,
    /// Fractional change of the inflammation peak.
    #[serde(default)]
    pub inflammation: f64,
}

impl FactorEffect {
    fn accumulate(&mut self, other: &FactorEffect) {
        self.closure += other.closure;
        self.scar += other.scar;
        self.inflammation += other.inflammation;
    }
}

/// Extra effect applied only when every listed factor is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Factors that must all be active.
    pub factors: Configuration,
    /// Effect added on top of the individual ones.
    #[serde(flatten)]
    pub effect: FactorEffect,
}

/// Parameters of the synthetic healing model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSpec {
    /// Rows written per replicate.
    #[serde(default = "SyntheticSpec::default_steps")]
    pub steps: usize,
    /// Value of the `step` column between rows.
    #[serde(default = "SyntheticSpec::default_stride")]
    pub stride: u64,
    /// Relative replicate noise.
    #[serde(default = "SyntheticSpec::default_noise")]
    pub noise: f64,
    /// Probability that a replicate fails outright.
    #[serde(default)]
    pub failure_rate: f64,
    /// Probability that a replicate terminates early.
    #[serde(default)]
    pub truncation_rate: f64,
    /// Seed for effects of factors not listed in `effects`.
    #[serde(default)]
    pub effect_seed: u64,
    /// Explicit per-factor effects.
    #[serde(default)]
    pub effects: BTreeMap<Factor, FactorEffect>,
    /// Non-additive terms.
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl SyntheticSpec {
    fn default_steps() -> usize {
        300
    }

    // 24 steps of 0.1 h: one row every 0.1 days
    fn default_stride() -> u64 {
        24
    }

    fn default_noise() -> f64 {
        0.03
    }
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            steps: Self::default_steps(),
            stride: Self::default_stride(),
            noise: Self::default_noise(),
            failure_rate: 0.0,
            truncation_rate: 0.0,
            effect_seed: 0,
            effects: BTreeMap::new(),
            interactions: Vec::new(),
        }
    }
}

/// Deterministic stand-in for the external simulator.
///
/// Produces closure, inflammation, scar and cell-count curves whose shape
/// depends on the applied factors; the replicate seed drives noise, failures
/// and early termination.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSimulator {
    spec: SyntheticSpec,
    axis: TimeAxis,
}

impl SyntheticSimulator {
    /// Creates a simulator from its parameters.
    pub fn new(spec: SyntheticSpec) -> Self {
        Self {
            spec,
            axis: TimeAxis::default(),
        }
    }

    /// Parameters in use.
    pub fn spec(&self) -> &SyntheticSpec {
        &self.spec
    }

    /// Effect of a single factor, derived from `effect_seed` when not listed.
    pub fn effect(&self, factor: &Factor) -> FactorEffect {
        if let Some(effect) = self.spec.effects.get(factor) {
            return *effect;
        }
        let stream = configuration_stream(&Configuration::single(factor.clone()));
        let mut rng = RngHandle::from_seed(derive_substream_seed(self.spec.effect_seed, stream));
        FactorEffect {
            closure: rng.gen_range(-0.1..0.4),
            scar: rng.gen_range(-0.35..0.1),
            inflammation: rng.gen_range(-0.35..0.15),
        }
    }

    fn combined_effect(&self, configuration: &Configuration) -> FactorEffect {
        let mut total = FactorEffect::default();
        for factor in configuration.factors() {
            total.accumulate(&self.effect(factor));
        }
        for interaction in &self.spec.interactions {
            if interaction
                .factors
                .factors()
                .iter()
                .all(|factor| configuration.contains(factor))
            {
                total.accumulate(&interaction.effect);
            }
        }
        total
    }

    /// Generates the series of one replicate without touching the disk.
    pub fn generate(&self, request: &ReplicateRequest) -> Result<TimeSeries, TcsError> {
        let mut rng = RngHandle::from_seed(request.seed);
        if self.spec.failure_rate > 0.0 && rng.gen_bool(self.spec.failure_rate.min(1.0)) {
            return Err(simulation_error(
                "simulation-failed",
                "synthetic replicate crashed",
                request,
            ));
        }
        let mut rows = self.spec.steps.max(1);
        if self.spec.truncation_rate > 0.0 && rng.gen_bool(self.spec.truncation_rate.min(1.0)) {
            rows = ((rows as f64) * rng.gen_range(0.1..0.4)).ceil() as usize;
        }

        let effect = self.combined_effect(&request.configuration);
        let mut jitter = |scale: f64| 1.0 + self.spec.noise * scale * rng.gen_range(-1.0..1.0);
        let rate = 0.55 * (1.0 + effect.closure).max(0.05) * jitter(1.0);
        let midpoint = 8.0 / (1.0 + effect.closure).max(0.05) * jitter(0.5);
        let infl_peak = 0.3 * (1.0 + effect.inflammation).max(0.01) * jitter(1.0);
        let scar_final = 0.5 * (1.0 + effect.scar).max(0.01) * jitter(1.0);
        let cells = 800.0 * jitter(1.0);

        let day_per_step = self.axis.scale;
        let mut series = TimeSeries::new(Vec::with_capacity(rows));
        let mut columns: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for row in 0..rows {
            let step = row as u64 * self.spec.stride;
            let day = step as f64 * day_per_step;
            let closure = 100.0 / (1.0 + (-rate * (day - midpoint)).exp());
            let inflammation = infl_peak * (-(day - 2.0).powi(2) / 4.5).exp() + 0.02;
            let collagen = closure / 100.0 * (1.0 - 0.5 * (-day / 6.0).exp());
            series.time.push(day);
            for (name, value) in [
                ("step", step as f64),
                ("wound_closure_pct", closure),
                ("mean_infl_wound", inflammation),
                ("scar_magnitude", scar_final * closure / 100.0),
                ("n_neutrophils", cells * inflammation),
                ("n_macrophages", 0.6 * cells * (-(day - 4.0).powi(2) / 12.0).exp()),
                ("mean_collagen_wound", collagen),
                ("n_myofibroblasts", 0.3 * cells * scar_final * (-(day - 10.0).powi(2) / 30.0).exp()),
            ] {
                columns.entry(name).or_default().push(value);
            }
        }
        for (name, values) in columns {
            series.insert_metric(name, values);
        }
        Ok(series)
    }
}

impl Simulator for SyntheticSimulator {
    fn run(&self, request: &ReplicateRequest) -> Result<TimeSeries, TcsError> {
        let series = self.generate(request)?;
        if let Some(archive) = &request.archive {
            if let Some(parent) = archive.parent() {
                fs::create_dir_all(parent).map_err(|err| TcsError::io("archive-dir", parent, err))?;
            }
            write_csv(&series, archive)?;
        }
        Ok(series)
    }
}
