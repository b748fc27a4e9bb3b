use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use tcs_core::{Configuration, Factor};
use tcs_exp::{
    run_study, CatalogSpec, FactorEffect, Interaction, RunOpts, SamplerConfig, SimulatorSpec,
    StudyPlan, SyntheticSimulator, SyntheticSpec,
};
use tcs_surrogate::CandidateSpace;

use super::study::print_summary;

const DEMO_FACTORS: [&str; 5] = ["growth_factor", "hbo", "laser", "npwt", "stem_cell"];

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Master seed.
    #[arg(long, default_value_t = 2024)]
    pub seed: u64,
    /// Combinations executed after ranking.
    #[arg(long, default_value_t = 5)]
    pub top_k: usize,
    /// Configurations sampled in parallel.
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
    /// Output directory for study artefacts.
    #[arg(long, default_value = "demo_results")]
    pub out: PathBuf,
}

pub fn run(args: &DemoArgs) -> Result<(), Box<dyn Error>> {
    let plan = demo_plan(args);
    let simulator = SyntheticSimulator::new(demo_spec(args.seed));
    let opts = RunOpts {
        resume: false,
        concurrency: args.concurrency.max(1),
    };
    let report = run_study(&plan, &simulator, &args.out, &opts)?;
    print_summary(&report, 10);
    Ok(())
}

fn demo_spec(seed: u64) -> SyntheticSpec {
    // hbo and npwt reinforce each other; laser undoes part of the growth factor benefit
    SyntheticSpec {
        effect_seed: seed,
        interactions: vec![
            Interaction {
                factors: Configuration::new(["hbo", "npwt"]),
                effect: FactorEffect {
                    closure: 0.25,
                    scar: -0.15,
                    inflammation: -0.1,
                },
            },
            Interaction {
                factors: Configuration::new(["growth_factor", "laser"]),
                effect: FactorEffect {
                    closure: -0.2,
                    scar: 0.1,
                    inflammation: 0.1,
                },
            },
        ],
        ..SyntheticSpec::default()
    }
}

fn demo_plan(args: &DemoArgs) -> StudyPlan {
    StudyPlan {
        seed: args.seed,
        catalog: CatalogSpec {
            factors: DEMO_FACTORS.iter().map(|name| Factor::new(*name)).collect(),
            ..CatalogSpec::default()
        },
        sampler: SamplerConfig {
            min_runs: 3,
            max_runs: 6,
            cv_threshold: 0.05,
        },
        space: CandidateSpace::Triples,
        top_k: args.top_k,
        simulator: SimulatorSpec::Synthetic(demo_spec(args.seed)),
        ..StudyPlan::default()
    }
}
