#![deny(missing_docs)]
#![doc = "Core types, outcome schema and structured errors for the treatment combination search engine."]

pub mod errors;
pub mod outcome;
pub mod provenance;
pub mod rng;
mod types;

pub use errors::{ErrorInfo, TcsError};
pub use outcome::{format_significant, Direction, Measure, OutcomeKey, OutcomeValue, ScalarOutcome};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, replicate_seed, RngHandle};
pub use types::{Configuration, Factor, BASELINE_LABEL};
