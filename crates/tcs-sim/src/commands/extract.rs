use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use tcs_core::OutcomeKey;
use tcs_series::{load_csv, OutcomeExtractor, TimeAxis};

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Simulator CSV to reduce.
    #[arg(long)]
    pub input: PathBuf,
    /// Outcome keys to extract; every known key when omitted.
    #[arg(long = "key", value_name = "KEY")]
    pub keys: Vec<OutcomeKey>,
    /// Column holding the time or step counter.
    #[arg(long, default_value = "step")]
    pub time_column: String,
    /// Multiplier converting the time column to days.
    #[arg(long, default_value_t = 0.1 / 24.0)]
    pub time_scale: f64,
    /// Emit canonical JSON instead of `key,value` lines.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(args: &ExtractArgs) -> Result<(), Box<dyn Error>> {
    let axis = TimeAxis {
        column: args.time_column.clone(),
        scale: args.time_scale,
    };
    let series = load_csv(&args.input, &axis)?;
    let extractor = if args.keys.is_empty() {
        OutcomeExtractor::default()
    } else {
        OutcomeExtractor::new(args.keys.iter().copied())
    };
    let outcome = extractor.extract_all(&series);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("key,value");
        for (key, value) in outcome.iter() {
            println!("{key},{}", value.render());
        }
    }
    Ok(())
}
