use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use tcs_core::errors::{ErrorInfo, TcsError};
use tcs_core::format_significant;
use tracing::debug;

use crate::series::TimeSeries;

/// Options controlling replicate filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusOptions {
    /// Runs shorter than this fraction of the median length are dropped.
    #[serde(default = "ConsensusOptions::default_min_length_fraction")]
    pub min_length_fraction: f64,
}

impl ConsensusOptions {
    const fn default_min_length_fraction() -> f64 {
        0.5
    }
}

impl Default for ConsensusOptions {
    fn default() -> Self {
        Self {
            min_length_fraction: Self::default_min_length_fraction(),
        }
    }
}

/// Per-timestep mean and population standard deviation of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricConsensus {
    /// Mean across contributing runs.
    pub mean: Vec<f64>,
    /// Population standard deviation across contributing runs.
    pub std: Vec<f64>,
}

/// Aggregated signal of several replicates of one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Mean time value of the contributing runs at each step.
    pub time: Vec<f64>,
    /// Mean/std series keyed by metric name.
    pub metrics: BTreeMap<String, MetricConsensus>,
    /// Number of runs with a sample at each step.
    pub contributors: Vec<usize>,
    /// Runs that passed the length filter.
    pub accepted: usize,
    /// Runs rejected as prematurely terminated.
    pub dropped: usize,
    /// Length below which a run was rejected.
    pub min_length: usize,
    /// True when every run was rejected and the unfiltered set was used.
    pub fallback: bool,
}

impl ConsensusResult {
    /// Number of consensus steps.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// True when the consensus has no steps.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// The mean signal as a plain series, suitable for outcome extraction.
    pub fn mean_series(&self) -> TimeSeries {
        TimeSeries {
            time: self.time.clone(),
            metrics: self
                .metrics
                .iter()
                .map(|(name, stats)| (name.clone(), stats.mean.clone()))
                .collect(),
        }
    }

    /// The standard deviation signal as a plain series.
    pub fn std_series(&self) -> TimeSeries {
        TimeSeries {
            time: self.time.clone(),
            metrics: self
                .metrics
                .iter()
                .map(|(name, stats)| (name.clone(), stats.std.clone()))
                .collect(),
        }
    }
}

/// Combines replicate series of one configuration.
///
/// Runs shorter than `max(1, median_len * min_length_fraction)` are discarded
/// unless that would discard all of them. The consensus extends to the longest
/// kept run and each step averages over however many runs still have a sample
/// there.
pub fn aggregate<'a, I>(runs: I, opts: &ConsensusOptions) -> Result<ConsensusResult, TcsError>
where
    I: IntoIterator<Item = &'a TimeSeries>,
{
    let runs: Vec<&TimeSeries> = runs.into_iter().collect();
    if runs.is_empty() {
        return Err(TcsError::Aggregation(ErrorInfo::new(
            "consensus-empty",
            "consensus requires at least one run",
        )));
    }

    let mut lengths: Vec<usize> = runs.iter().map(|run| run.len()).collect();
    lengths.sort_unstable();
    let median = lengths[lengths.len() / 2];
    let min_length = ((median as f64 * opts.min_length_fraction).floor() as usize).max(1);

    let mut kept: Vec<&TimeSeries> = runs
        .iter()
        .copied()
        .filter(|run| run.len() >= min_length)
        .collect();
    let mut dropped = runs.len() - kept.len();
    let fallback = kept.is_empty();
    if fallback {
        kept = runs.clone();
        dropped = 0;
    }
    if dropped > 0 {
        debug!(dropped, min_length, median, "dropped short runs");
    }

    let longest = kept.iter().map(|run| run.len()).max().unwrap_or(0);
    let mut time = Vec::with_capacity(longest);
    let mut contributors = Vec::with_capacity(longest);
    for step in 0..longest {
        let present: Vec<f64> = kept
            .iter()
            .filter_map(|run| run.time.get(step).copied())
            .collect();
        if present.is_empty() {
            break;
        }
        contributors.push(present.len());
        time.push(mean(&present));
    }

    let names: BTreeSet<&String> = kept
        .iter()
        .copied()
        .flat_map(|run| run.metrics.keys())
        .collect();
    let mut metrics = BTreeMap::new();
    for name in names {
        let mut stats = MetricConsensus::default();
        for step in 0..time.len() {
            let values: Vec<f64> = kept
                .iter()
                .filter_map(|run| run.metrics.get(name).and_then(|col| col.get(step)))
                .copied()
                .collect();
            if values.is_empty() {
                break;
            }
            let m = mean(&values);
            stats.mean.push(m);
            stats.std.push(population_std(&values, m));
        }
        metrics.insert(name.clone(), stats);
    }

    Ok(ConsensusResult {
        time,
        metrics,
        contributors,
        accepted: kept.len(),
        dropped,
        min_length,
        fallback,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Writes `name`, `name_std` column pairs plus the contributor count.
pub fn write_consensus_csv(result: &ConsensusResult, path: &Path) -> Result<(), TcsError> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .map_err(|err| TcsError::io("consensus-write-open", path, err))?;
    let mut header: Vec<String> = Vec::with_capacity(result.metrics.len() * 2 + 1);
    for name in result.metrics.keys() {
        header.push(name.clone());
        header.push(format!("{name}_std"));
    }
    header.push("n_contributors".to_string());
    writer
        .write_record(&header)
        .map_err(|err| TcsError::io("consensus-write-header", path, err))?;

    for step in 0..result.len() {
        let mut record = Vec::with_capacity(header.len());
        for stats in result.metrics.values() {
            record.push(cell(stats.mean.get(step)));
            record.push(cell(stats.std.get(step)));
        }
        record.push(result.contributors[step].to_string());
        writer
            .write_record(&record)
            .map_err(|err| TcsError::io("consensus-write-row", path, err))?;
    }
    writer
        .flush()
        .map_err(|err| TcsError::io("consensus-flush", path, err))?;
    Ok(())
}

fn cell(value: Option<&f64>) -> String {
    value
        .map(|value| format_significant(*value, 6))
        .unwrap_or_default()
}
