use std::sync::atomic::{AtomicU32, Ordering};

use proptest::prelude::*;
use tcs_core::errors::{ErrorInfo, TcsError};
use tcs_core::Configuration;
use tcs_exp::{
    AdaptiveSampler, ReplicateRequest, SamplerConfig, SamplerState, Simulator, SyntheticSimulator,
    SyntheticSpec,
};
use tcs_series::TimeSeries;
use tempfile::tempdir;

struct Counting<S> {
    inner: S,
    calls: AtomicU32,
}

impl<S> Counting<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<S: Simulator> Simulator for Counting<S> {
    fn run(&self, request: &ReplicateRequest) -> Result<TimeSeries, TcsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.run(request)
    }
}

/// Identical replicates every time.
struct Constant;

impl Simulator for Constant {
    fn run(&self, _request: &ReplicateRequest) -> Result<TimeSeries, TcsError> {
        Ok(TimeSeries::new((0..20).map(|i| i as f64).collect())
            .with_metric("wound_closure_pct", (0..20).map(|i| i as f64 * 6.0).collect())
            .with_metric("scar_magnitude", vec![0.4; 20])
            .with_metric("mean_infl_wound", (0..20).map(|i| 0.3 - i as f64 * 0.01).collect()))
    }
}

/// Fails on even attempts.
struct Flaky;

impl Simulator for Flaky {
    fn run(&self, request: &ReplicateRequest) -> Result<TimeSeries, TcsError> {
        if request.attempt % 2 == 0 {
            return Err(TcsError::Simulation(ErrorInfo::new("simulation-failed", "flaky")));
        }
        Constant.run(request)
    }
}

struct Broken;

impl Simulator for Broken {
    fn run(&self, _request: &ReplicateRequest) -> Result<TimeSeries, TcsError> {
        Err(TcsError::Simulation(ErrorInfo::new("simulation-no-artifact", "nothing written")))
    }
}

fn small_spec(failure_rate: f64, truncation_rate: f64) -> SyntheticSpec {
    SyntheticSpec {
        steps: 40,
        stride: 180,
        noise: 0.2,
        failure_rate,
        truncation_rate,
        ..SyntheticSpec::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn attempts_never_exceed_ceiling(
        min_runs in 1u32..5,
        extra in 0u32..5,
        cv_threshold in 0.001f64..0.5,
        failure_rate in 0.0f64..0.9,
        truncation_rate in 0.0f64..0.5,
        seed in any::<u64>(),
    ) {
        let dir = tempdir().expect("tempdir");
        let config = SamplerConfig { min_runs, max_runs: min_runs + extra, cv_threshold };
        let simulator = Counting::new(SyntheticSimulator::new(small_spec(failure_rate, truncation_rate)));
        let sampler = AdaptiveSampler::new(&simulator, config.clone(), seed, dir.path()).expect("sampler");
        let sampled = sampler.sample(&Configuration::new(["a", "b"])).expect("sample");

        prop_assert!(sampled.attempts <= config.max_runs);
        prop_assert_eq!(simulator.calls(), sampled.attempts);
        prop_assert_eq!(sampled.successes + sampled.failures.len() as u32, sampled.attempts);
        match sampled.state {
            SamplerState::Converged => {
                prop_assert!(sampled.successes >= config.min_runs);
                prop_assert!(sampled.cv.expect("cv") < config.cv_threshold);
            }
            SamplerState::Exhausted => prop_assert_eq!(sampled.attempts, config.max_runs),
            SamplerState::NoData => prop_assert_eq!(sampled.successes, 0),
            SamplerState::Collecting => prop_assert!(false, "sampling must end in a terminal state"),
        }
    }
}

#[test]
fn identical_replicates_converge_at_min_runs() {
    let dir = tempdir().expect("tempdir");
    let config = SamplerConfig {
        min_runs: 3,
        max_runs: 10,
        cv_threshold: 0.05,
    };
    let sampler = AdaptiveSampler::new(&Constant, config, 1, dir.path()).expect("sampler");
    let sampled = sampler.sample(&Configuration::single("a")).expect("sample");
    assert_eq!(sampled.state, SamplerState::Converged);
    assert_eq!(sampled.attempts, 3);
    assert!(sampled.cv.expect("cv") < 1e-9);
    assert!(sampled.consensus.is_some());
}

#[test]
fn failures_consume_attempts_but_not_successes() {
    let dir = tempdir().expect("tempdir");
    let config = SamplerConfig {
        min_runs: 3,
        max_runs: 4,
        cv_threshold: 0.05,
    };
    let sampler = AdaptiveSampler::new(&Flaky, config, 1, dir.path()).expect("sampler");
    let sampled = sampler.sample(&Configuration::single("a")).expect("sample");
    assert_eq!(sampled.attempts, 4);
    assert_eq!(sampled.successes, 2);
    assert_eq!(sampled.failures.len(), 2);
    assert_eq!(sampled.failures[0].attempt, 0);
    assert_eq!(sampled.state, SamplerState::Exhausted);
    assert_eq!(sampled.cv, None);
}

#[test]
fn all_failures_yield_no_data() {
    let dir = tempdir().expect("tempdir");
    let sampler = AdaptiveSampler::new(&Broken, SamplerConfig::default(), 1, dir.path()).expect("sampler");
    let sampled = sampler.sample(&Configuration::baseline()).expect("sample");
    assert_eq!(sampled.state, SamplerState::NoData);
    assert_eq!(sampled.attempts, 10);
    assert!(sampled.outcome.is_empty());
    assert!(sampled.failures.iter().all(|failure| failure.code == "simulation-no-artifact"));
}

#[test]
fn raw_artifacts_are_archived_per_attempt() {
    let dir = tempdir().expect("tempdir");
    let config = SamplerConfig {
        min_runs: 2,
        max_runs: 2,
        cv_threshold: 1e-9,
    };
    let simulator = SyntheticSimulator::new(small_spec(0.0, 0.0));
    let sampler = AdaptiveSampler::new(&simulator, config, 5, dir.path()).expect("sampler");
    let sampled = sampler.sample(&Configuration::new(["hbo", "npwt"])).expect("sample");
    assert_eq!(sampled.artifacts.len(), 2);
    assert!(dir.path().join("raw/hbo_npwt_run000.csv").is_file());
    assert!(dir.path().join("raw/hbo_npwt_run001.csv").is_file());
}

#[test]
fn invalid_bounds_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let config = SamplerConfig {
        min_runs: 4,
        max_runs: 2,
        cv_threshold: 0.05,
    };
    let err = AdaptiveSampler::new(&Constant, config, 0, dir.path())
        .err()
        .expect("invalid bounds");
    assert_eq!(err.info().code, "sampler-max-runs");
}
