#![deny(missing_docs)]
#![doc = "Adaptive sampling, factor catalogs and surrogate-guided study orchestration."]

/// Factor discovery and selection.
pub mod catalog;
/// Canonical hashing helpers.
pub mod hash;
/// Study plan loading and defaults.
pub mod plan;
/// Study artifacts and provenance.
pub mod report;
/// Per-configuration adaptive replicate sampling.
pub mod sampler;
/// Canonical JSON and YAML helpers.
pub mod serde;
/// Simulator seam and its process and synthetic implementations.
pub mod simulator;
/// Phase orchestration and resume.
pub mod study;

pub use catalog::{FactorCatalog, DEFAULT_EXCLUDES};
pub use plan::{load_plan, CatalogSpec, ProcessSpec, SimulatorSpec, StudyPlan};
pub use report::{
    load_report, write_predictions_csv, write_study_csv, ConfigurationKind, ConfigurationRecord,
    RankEntry, StudyReport,
};
pub use sampler::{
    mean_cv, AdaptiveSampler, ReplicateFailure, SampledConfiguration, SamplerConfig, SamplerState,
};
pub use simulator::{
    FactorEffect, Interaction, ProcessSimulator, ReplicateRequest, Simulator, SyntheticSimulator,
    SyntheticSpec,
};
pub use study::{rank_records, run_study, run_study_from_path, RunOpts};
