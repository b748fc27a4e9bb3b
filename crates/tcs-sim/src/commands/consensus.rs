use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use tcs_series::{aggregate, load_csv, write_consensus_csv, write_csv, ConsensusOptions, TimeAxis};
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct ConsensusArgs {
    /// Replicate CSV files.
    #[arg(long = "input", value_name = "PATH")]
    pub inputs: Vec<PathBuf>,
    /// Directory whose `*.csv` files are all replicates of one configuration.
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Runs shorter than this fraction of the median length are dropped.
    #[arg(long, default_value_t = 0.5)]
    pub min_length_fraction: f64,
    /// Column holding the time or step counter.
    #[arg(long, default_value = "step")]
    pub time_column: String,
    /// Multiplier converting the time column to days.
    #[arg(long, default_value_t = 0.1 / 24.0)]
    pub time_scale: f64,
    /// Output directory for `consensus.csv` and `metrics.csv`.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &ConsensusArgs) -> Result<(), Box<dyn Error>> {
    let mut paths = args.inputs.clone();
    if let Some(dir) = &args.dir {
        paths.extend(csv_files(dir)?);
    }
    if paths.is_empty() {
        return Err("no replicate CSV files given; use --input or --dir".into());
    }
    let axis = TimeAxis {
        column: args.time_column.clone(),
        scale: args.time_scale,
    };
    let runs = paths
        .iter()
        .map(|path| load_csv(path, &axis))
        .collect::<Result<Vec<_>, _>>()?;
    let opts = ConsensusOptions {
        min_length_fraction: args.min_length_fraction,
    };
    let consensus = aggregate(&runs, &opts)?;

    fs::create_dir_all(&args.out)?;
    write_consensus_csv(&consensus, &args.out.join("consensus.csv"))?;
    write_csv(&consensus.mean_series(), &args.out.join("metrics.csv"))?;
    println!(
        "runs: {}  accepted: {}  dropped: {}  min_length: {}  steps: {}{}",
        runs.len(),
        consensus.accepted,
        consensus.dropped,
        consensus.min_length,
        consensus.len(),
        if consensus.fallback {
            "  (every run was short; unfiltered set used)"
        } else {
            ""
        }
    );
    Ok(())
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("csv") {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}
