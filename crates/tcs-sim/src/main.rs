use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    catalog::{self, CatalogArgs},
    consensus::{self, ConsensusArgs},
    demo::{self, DemoArgs},
    extract::{self, ExtractArgs},
    study::{self, StudyArgs},
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "tcs-sim", about = "Adaptive treatment combination search CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full adaptive study: baseline, singles, surrogate ranking and top-K combinations.
    Study(StudyArgs),
    /// Aggregate replicate CSV files into a consensus series.
    Consensus(ConsensusArgs),
    /// Extract scalar outcomes from one simulator CSV.
    Extract(ExtractArgs),
    /// List the factors a treatment directory provides.
    Catalog(CatalogArgs),
    /// Run a small synthetic study end to end.
    Demo(DemoArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Study(args) => study::run(&args),
        Command::Consensus(args) => consensus::run(&args),
        Command::Extract(args) => extract::run(&args),
        Command::Catalog(args) => catalog::run(&args),
        Command::Demo(args) => demo::run(&args),
    }
}
