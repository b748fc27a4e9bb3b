use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use tcs_exp::{load_plan, run_study, ProcessSpec, RunOpts, SimulatorSpec, StudyPlan, StudyReport};
use tcs_surrogate::CandidateSpace;
use tracing::info;

#[derive(Args, Debug)]
pub struct StudyArgs {
    /// Study plan YAML; built-in defaults apply when omitted.
    #[arg(long)]
    pub plan: Option<PathBuf>,
    /// `all` or a comma separated subset of the catalog.
    #[arg(long)]
    pub treatments: Option<String>,
    /// Directory of `*.toml` treatment files.
    #[arg(long)]
    pub treatments_dir: Option<PathBuf>,
    /// Minimum successful replicates per configuration.
    #[arg(long)]
    pub min_runs: Option<u32>,
    /// Maximum replicate attempts per configuration.
    #[arg(long)]
    pub max_runs: Option<u32>,
    /// Mean coefficient of variation below which sampling stops.
    #[arg(long)]
    pub cv_threshold: Option<f64>,
    /// Combinations to execute after surrogate ranking.
    #[arg(long)]
    pub top_k: Option<usize>,
    /// Candidate space: pairs, triples, all or a maximum subset size.
    #[arg(long)]
    pub space: Option<CandidateSpace>,
    /// Master seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// External simulator command; placeholders such as `{factors}` and `{seed}` are substituted.
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    pub command: Vec<String>,
    /// Artifact written by the external simulator, relative to its working directory.
    #[arg(long, default_value = "metrics.csv")]
    pub artifact: PathBuf,
    /// Seconds before an external replicate is killed.
    #[arg(long)]
    pub timeout: Option<f64>,
    /// Configurations sampled in parallel.
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
    /// Reuse configurations already sampled under the same plan.
    #[arg(long, default_value_t = false)]
    pub resume: bool,
    /// Output directory for study artefacts.
    #[arg(long, default_value = "adaptive_results")]
    pub out: PathBuf,
}

pub fn run(args: &StudyArgs) -> Result<(), Box<dyn Error>> {
    let plan = build_plan(args)?;
    let simulator = plan.build_simulator()?;
    fs::create_dir_all(&args.out)?;
    fs::write(args.out.join("plan.yaml"), plan.to_yaml_string()?)?;
    let opts = RunOpts {
        resume: args.resume,
        concurrency: args.concurrency.max(1),
    };
    let report = run_study(&plan, simulator.as_ref(), &args.out, &opts)?;
    print_summary(&report, 10);
    info!(out = %args.out.display(), "study artefacts written");
    Ok(())
}

/// Loads the plan (or defaults) and applies command-line overrides.
pub fn build_plan(args: &StudyArgs) -> Result<StudyPlan, Box<dyn Error>> {
    let mut plan = match &args.plan {
        Some(path) => load_plan(path)?,
        None => StudyPlan {
            base_dir: std::env::current_dir()?,
            ..StudyPlan::default()
        },
    };
    if let Some(dir) = &args.treatments_dir {
        plan.catalog.dir = Some(dir.clone());
    }
    if let Some(selection) = &args.treatments {
        plan.catalog.select = selection.clone();
    }
    if let Some(min_runs) = args.min_runs {
        plan.sampler.min_runs = min_runs;
    }
    if let Some(max_runs) = args.max_runs {
        plan.sampler.max_runs = max_runs;
    }
    if let Some(cv_threshold) = args.cv_threshold {
        plan.sampler.cv_threshold = cv_threshold;
    }
    if let Some(top_k) = args.top_k {
        plan.top_k = top_k;
    }
    if let Some(space) = args.space {
        plan.space = space;
    }
    if let Some(seed) = args.seed {
        plan.seed = seed;
    }
    if !args.command.is_empty() {
        plan.simulator = SimulatorSpec::Process(ProcessSpec {
            command: args.command.clone(),
            artifact: args.artifact.clone(),
            timeout_secs: args.timeout,
            env: Default::default(),
        });
    }
    plan.validate()?;
    Ok(plan)
}

pub fn print_summary(report: &StudyReport, limit: usize) {
    println!(
        "factors: {}  candidates: {}  executed: {}  attempts: {}",
        report.factors.len(),
        report.candidates_evaluated,
        report.selected.len(),
        report.total_attempts
    );
    if !report.excluded.is_empty() {
        println!("excluded (no data): {}", report.excluded.join(", "));
    }
    println!("{:>4}  {:<40} {:<9} {:>8}", "rank", "configuration", "type", "score");
    for entry in report.ranking.iter().take(limit) {
        let verdict = report
            .record(&entry.label)
            .and_then(|record| record.synergy.as_ref())
            .map(|synergy| format!("  {} ({:+.3})", synergy.class, synergy.mean))
            .unwrap_or_default();
        println!(
            "{:>4}  {:<40} {:<9} {:>8.4}{}",
            entry.rank,
            entry.label,
            entry.kind.as_str(),
            entry.score,
            verdict
        );
    }
}
