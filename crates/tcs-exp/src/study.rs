use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tcs_core::errors::{ErrorInfo, TcsError};
use tcs_core::{Configuration, Factor, OutcomeKey, ScalarOutcome};
use tcs_series::write_consensus_csv;
use tcs_surrogate::{
    composite_score, select, CandidateSelector, SurrogateModel, SynergyAnalyzer,
};
use tracing::{info, instrument, warn};

use crate::plan::{load_plan, StudyPlan};
use crate::report::{
    provenance, write_predictions_csv, write_study_csv, ConfigurationKind, ConfigurationRecord,
    RankEntry, StudyReport,
};
use crate::sampler::{AdaptiveSampler, SampledConfiguration};
use crate::serde::{read_json, write_json};
use crate::simulator::Simulator;

fn study_error(code: &str, message: &str) -> TcsError {
    TcsError::Study(ErrorInfo::new(code, message))
}

/// Options governing study execution.
#[derive(Debug, Clone)]
pub struct RunOpts {
    /// Reuse configurations already sampled under the same plan.
    pub resume: bool,
    /// Number of configurations sampled in parallel.
    pub concurrency: usize,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            resume: false,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedConfiguration {
    plan_hash: String,
    sampled: SampledConfiguration,
}

/// State shared by every phase of one study run.
struct Session<'a> {
    plan_hash: String,
    sampler: AdaptiveSampler<'a>,
    pool: rayon::ThreadPool,
    out: &'a Path,
    opts: &'a RunOpts,
}

impl Session<'_> {
    fn cache_path(&self, configuration: &Configuration) -> PathBuf {
        self.out
            .join("configs")
            .join(format!("{}.json", configuration.file_stem()))
    }

    fn cached(&self, configuration: &Configuration) -> Option<SampledConfiguration> {
        let path = self.cache_path(configuration);
        if !path.is_file() {
            return None;
        }
        match read_json::<CachedConfiguration>(&path) {
            Ok(cached)
                if cached.plan_hash == self.plan_hash
                    && cached.sampled.configuration == *configuration
                    && cached.sampled.state.is_terminal() =>
            {
                Some(cached.sampled)
            }
            Ok(_) => None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable cache entry");
                None
            }
        }
    }

    fn sample_one(&self, configuration: &Configuration) -> Result<SampledConfiguration, TcsError> {
        if self.opts.resume {
            if let Some(sampled) = self.cached(configuration) {
                info!(configuration = %configuration, "resumed from cache");
                return Ok(sampled);
            }
        }
        let sampled = self.sampler.sample(configuration)?;
        if let Some(consensus) = &sampled.consensus {
            let dir = self.out.join("consensus");
            fs::create_dir_all(&dir).map_err(|err| TcsError::io("consensus-dir", &dir, err))?;
            write_consensus_csv(consensus, &dir.join(format!("{}.csv", configuration.file_stem())))?;
        }
        write_json(
            &self.cache_path(configuration),
            &CachedConfiguration {
                plan_hash: self.plan_hash.clone(),
                sampled: sampled.clone(),
            },
        )?;
        Ok(sampled)
    }

    fn sample_all(&self, configurations: &[Configuration]) -> Result<Vec<SampledConfiguration>, TcsError> {
        let results: Result<Vec<_>, TcsError> = self.pool.install(|| {
            configurations
                .par_iter()
                .enumerate()
                .map(|(index, configuration)| Ok((index, self.sample_one(configuration)?)))
                .collect()
        });
        let mut ordered = results?;
        ordered.sort_by_key(|(index, _)| *index);
        Ok(ordered.into_iter().map(|(_, sampled)| sampled).collect())
    }
}

/// Runs the whole adaptive study and writes its artifacts into `out`.
///
/// Phases: baseline, every single factor, surrogate fit, candidate ranking,
/// top-K combinations, synergy and the final ranking. Only a baseline without
/// data or a study where no single factor produced data is fatal.
#[instrument(skip_all, fields(out = %out.display()))]
pub fn run_study(
    plan: &StudyPlan,
    simulator: &dyn Simulator,
    out: &Path,
    opts: &RunOpts,
) -> Result<StudyReport, TcsError> {
    plan.validate()?;
    let factors = plan.factors()?;
    if factors.is_empty() {
        return Err(TcsError::Config(
            ErrorInfo::new("study-no-factors", "the factor selection is empty")
                .with_context("select", plan.catalog.select.clone()),
        ));
    }
    fs::create_dir_all(out).map_err(|err| TcsError::io("study-out-dir", out, err))?;

    let plan_hash = plan.plan_hash()?;
    let sampler = AdaptiveSampler::new(simulator, plan.sampler.clone(), plan.seed, out)?
        .with_consensus(plan.consensus.clone())
        .with_tracked(plan.tracked.clone());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.concurrency.max(1))
        .build()
        .map_err(|err| study_error("thread-pool", &err.to_string()))?;
    let session = Session {
        plan_hash: plan_hash.clone(),
        sampler,
        pool,
        out,
        opts,
    };
    info!(factors = factors.len(), seed = plan.seed, "starting study");

    let baseline = session.sample_one(&Configuration::baseline())?;
    if !baseline.state.has_data() {
        return Err(TcsError::Study(
            ErrorInfo::new("study-baseline-failed", "every baseline replicate failed")
                .with_context("attempts", baseline.attempts.to_string())
                .with_hint("check the simulator command and its artifact path"),
        ));
    }
    let baseline_outcome = baseline.outcome.clone();

    let single_configs: Vec<Configuration> = factors.iter().cloned().map(Configuration::single).collect();
    let singles = session.sample_all(&single_configs)?;
    let single_outcomes: BTreeMap<Factor, ScalarOutcome> = singles
        .iter()
        .filter(|sampled| sampled.state.has_data())
        .filter_map(|sampled| {
            let factor = sampled.configuration.factors().first()?.clone();
            Some((factor, sampled.outcome.clone()))
        })
        .collect();
    if single_outcomes.is_empty() {
        return Err(TcsError::Study(
            ErrorInfo::new("study-no-singles", "no single-factor configuration produced data")
                .with_context("factors", factors.len().to_string()),
        ));
    }

    let fit_keys: Vec<OutcomeKey> = plan
        .tracked
        .iter()
        .copied()
        .chain(plan.weights.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let model = SurrogateModel::fit(&baseline_outcome, &single_outcomes, &fit_keys)?;
    let selector = CandidateSelector::new(plan.weights.clone(), plan.space);
    let ranked = selector.rank(&model)?;
    write_predictions_csv(&ranked, &plan.tracked, &out.join("surrogate_predictions.csv"))?;
    let chosen = select(&ranked, plan.top_k);
    info!(candidates = ranked.len(), selected = chosen.len(), "surrogate ranking complete");

    let combo_configs: Vec<Configuration> = chosen
        .iter()
        .map(|candidate| candidate.configuration.clone())
        .collect();
    let combos = session.sample_all(&combo_configs)?;

    let analyzer = SynergyAnalyzer::new(plan.synergy);
    let mut records = Vec::new();
    let mut excluded = Vec::new();
    let mut total_attempts = 0;
    for sampled in std::iter::once(baseline).chain(singles) {
        total_attempts += sampled.attempts;
        if !sampled.state.has_data() {
            excluded.push(sampled.configuration.label());
            continue;
        }
        records.push(ConfigurationRecord {
            label: sampled.configuration.label(),
            kind: ConfigurationKind::of(&sampled.configuration),
            score: composite_score(&sampled.outcome, &baseline_outcome, &plan.weights),
            sampled,
            predicted: None,
            predicted_score: None,
            synergy: None,
        });
    }
    for (candidate, sampled) in chosen.iter().zip(combos) {
        total_attempts += sampled.attempts;
        if !sampled.state.has_data() {
            warn!(configuration = %sampled.configuration, "combination produced no data");
            excluded.push(sampled.configuration.label());
            continue;
        }
        let synergy = analyzer.analyze(
            &sampled.outcome,
            &candidate.predicted,
            &baseline_outcome,
            &plan.tracked,
        );
        info!(
            configuration = %sampled.configuration,
            synergy = synergy.mean,
            verdict = synergy.class.as_str(),
            "combination analysed"
        );
        records.push(ConfigurationRecord {
            label: sampled.configuration.label(),
            kind: ConfigurationKind::Combination,
            score: composite_score(&sampled.outcome, &baseline_outcome, &plan.weights),
            sampled,
            predicted: Some(candidate.predicted.clone()),
            predicted_score: Some(candidate.score),
            synergy: Some(synergy),
        });
    }

    let report = StudyReport {
        provenance: provenance(&plan_hash, plan.seed),
        factors,
        tracked: plan.tracked.clone(),
        ranking: rank_records(&records),
        records,
        excluded,
        candidates_evaluated: ranked.len(),
        selected: chosen
            .iter()
            .map(|candidate| candidate.configuration.label())
            .collect(),
        total_attempts,
    };
    write_study_csv(&report.records, &plan.tracked, &out.join("adaptive_study.csv"))?;
    report.write(out)?;
    info!(
        configurations = report.records.len(),
        excluded = report.excluded.len(),
        total_attempts,
        "study complete"
    );
    Ok(report)
}

/// Loads a plan from disk and runs it with the simulator it describes.
pub fn run_study_from_path(plan_path: &Path, out: &Path, opts: &RunOpts) -> Result<StudyReport, TcsError> {
    let plan = load_plan(plan_path)?;
    let simulator = plan.build_simulator()?;
    run_study(&plan, simulator.as_ref(), out, opts)
}

/// Orders records by observed score, best first; ties keep execution order.
pub fn rank_records(records: &[ConfigurationRecord]) -> Vec<RankEntry> {
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|a, b| records[*a].score.total_cmp(&records[*b].score));
    order
        .into_iter()
        .enumerate()
        .map(|(position, index)| RankEntry {
            rank: position + 1,
            label: records[index].label.clone(),
            kind: records[index].kind,
            score: records[index].score,
        })
        .collect()
}
