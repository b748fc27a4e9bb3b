use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use tcs_core::errors::TcsError;
use tcs_core::provenance::{RunProvenance, SchemaVersion};
use tcs_core::{format_significant, Configuration, Factor, OutcomeKey, ScalarOutcome};
use tcs_surrogate::score::unscored;
use tcs_surrogate::{Candidate, SynergyResult};

use crate::sampler::SampledConfiguration;
use crate::serde::{read_json, write_json};

/// Role a configuration plays in the study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationKind {
    /// No factor applied.
    Baseline,
    /// One factor, used to fit the surrogate.
    Single,
    /// A surrogate-selected combination.
    Combination,
}

impl ConfigurationKind {
    /// Kind implied by the number of factors.
    pub fn of(configuration: &Configuration) -> Self {
        match configuration.len() {
            0 => ConfigurationKind::Baseline,
            1 => ConfigurationKind::Single,
            _ => ConfigurationKind::Combination,
        }
    }

    /// Report label.
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigurationKind::Baseline => "baseline",
            ConfigurationKind::Single => "single",
            ConfigurationKind::Combination => "combo",
        }
    }
}

/// Reported state of one configuration with data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    /// `baseline` or `a+b`.
    pub label: String,
    /// Role in the study.
    pub kind: ConfigurationKind,
    /// Sampling result.
    pub sampled: SampledConfiguration,
    /// Observed composite score against the baseline.
    #[serde(with = "unscored")]
    pub score: f64,
    /// Surrogate prediction, for combinations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted: Option<ScalarOutcome>,
    /// Predicted composite score, for combinations.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "unscored::option")]
    pub predicted_score: Option<f64>,
    /// Observed versus predicted, for combinations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synergy: Option<SynergyResult>,
}

/// Position of a configuration in the final ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    /// One based rank, best first.
    pub rank: usize,
    /// Configuration label.
    pub label: String,
    /// Role in the study.
    pub kind: ConfigurationKind,
    /// Observed composite score.
    #[serde(with = "unscored")]
    pub score: f64,
}

/// Canonical study summary written as `study_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyReport {
    /// Schema, plan hash, seed and tool versions.
    pub provenance: RunProvenance,
    /// Factors the study drew from.
    pub factors: Vec<Factor>,
    /// Keys used for convergence and synergy.
    pub tracked: Vec<OutcomeKey>,
    /// Configurations with data, in execution order.
    pub records: Vec<ConfigurationRecord>,
    /// Configurations for which every replicate failed.
    pub excluded: Vec<String>,
    /// Size of the ranked candidate space.
    pub candidates_evaluated: usize,
    /// Labels of the combinations chosen for execution.
    pub selected: Vec<String>,
    /// Every configuration with data ordered by observed score.
    pub ranking: Vec<RankEntry>,
    /// Simulator invocations across the study.
    pub total_attempts: u32,
}

impl StudyReport {
    /// Record of a configuration, if it produced data.
    pub fn record(&self, label: &str) -> Option<&ConfigurationRecord> {
        self.records.iter().find(|record| record.label == label)
    }

    /// Writes `study_report.json` into `out`.
    pub fn write(&self, out: &Path) -> Result<(), TcsError> {
        write_json(&out.join("study_report.json"), self)
    }
}

/// Reads a previously written `study_report.json`.
pub fn load_report(path: &Path) -> Result<StudyReport, TcsError> {
    read_json(path)
}

/// Provenance block for a study run.
pub fn provenance(plan_hash: &str, seed: u64) -> RunProvenance {
    let mut versions = BTreeMap::new();
    versions.insert("tcs-exp".to_string(), env!("CARGO_PKG_VERSION").to_string());
    RunProvenance {
        schema_version: SchemaVersion::default(),
        plan_hash: plan_hash.to_string(),
        seed,
        created_at: Utc::now().to_rfc3339(),
        tool_versions: versions,
    }
}

fn render_score(score: f64) -> String {
    if score.is_finite() {
        format!("{score:.4}")
    } else {
        "N/A".to_string()
    }
}

/// Writes `adaptive_study.csv`: one row per configuration with data.
pub fn write_study_csv(
    records: &[ConfigurationRecord],
    tracked: &[OutcomeKey],
    path: &Path,
) -> Result<(), TcsError> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .map_err(|err| TcsError::io("study-csv-open", path, err))?;
    let mut header: Vec<String> = ["config", "type", "n_runs", "state", "cv"]
        .iter()
        .map(|name| name.to_string())
        .collect();
    header.extend(OutcomeKey::ALL.iter().map(|key| key.as_str().to_string()));
    header.extend(tracked.iter().map(|key| format!("predicted_{key}")));
    header.extend(tracked.iter().map(|key| format!("synergy_{key}")));
    header.extend(["score", "synergy_mean", "verdict"].iter().map(|name| name.to_string()));
    writer
        .write_record(&header)
        .map_err(|err| TcsError::io("study-csv-header", path, err))?;

    for record in records {
        let mut row = vec![
            record.label.clone(),
            record.kind.as_str().to_string(),
            record.sampled.successes.to_string(),
            record.sampled.state.as_str().to_string(),
            record
                .sampled
                .cv
                .map(|cv| format_significant(cv, 4))
                .unwrap_or_else(|| "N/A".to_string()),
        ];
        row.extend(OutcomeKey::ALL.iter().map(|key| record.sampled.outcome.get(*key).render()));
        row.extend(tracked.iter().map(|key| {
            record
                .predicted
                .as_ref()
                .map(|predicted| predicted.get(*key).render())
                .unwrap_or_default()
        }));
        row.extend(tracked.iter().map(|key| {
            record
                .synergy
                .as_ref()
                .and_then(|synergy| synergy.per_key.get(key))
                .map(|value| format!("{value:.4}"))
                .unwrap_or_default()
        }));
        row.push(render_score(record.score));
        match &record.synergy {
            Some(synergy) => {
                row.push(format!("{:.4}", synergy.mean));
                row.push(synergy.class.as_str().to_string());
            }
            None => {
                row.push(String::new());
                row.push(String::new());
            }
        }
        writer
            .write_record(&row)
            .map_err(|err| TcsError::io("study-csv-row", path, err))?;
    }
    writer
        .flush()
        .map_err(|err| TcsError::io("study-csv-flush", path, err))
}

/// Writes `surrogate_predictions.csv`: every ranked candidate, best first.
pub fn write_predictions_csv(
    candidates: &[Candidate],
    tracked: &[OutcomeKey],
    path: &Path,
) -> Result<(), TcsError> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .map_err(|err| TcsError::io("predictions-csv-open", path, err))?;
    let mut header = vec!["combo".to_string(), "predicted_score".to_string()];
    header.extend(tracked.iter().map(|key| format!("predicted_{key}")));
    writer
        .write_record(&header)
        .map_err(|err| TcsError::io("predictions-csv-header", path, err))?;
    for candidate in candidates {
        let mut row = vec![
            candidate.configuration.label(),
            render_score(candidate.score),
        ];
        row.extend(tracked.iter().map(|key| candidate.predicted.get(*key).render()));
        writer
            .write_record(&row)
            .map_err(|err| TcsError::io("predictions-csv-row", path, err))?;
    }
    writer
        .flush()
        .map_err(|err| TcsError::io("predictions-csv-flush", path, err))
}
