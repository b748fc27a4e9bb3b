#![deny(missing_docs)]
#![doc = "Time-series ingestion, outcome extraction and replicate consensus."]

/// Replicate consensus aggregation.
pub mod consensus;
/// Scalar outcome extraction from a single series.
pub mod extract;
/// Time-series container and CSV ingestion.
pub mod series;

pub use consensus::{aggregate, write_consensus_csv, ConsensusOptions, ConsensusResult, MetricConsensus};
pub use extract::{extract, extract_measure, OutcomeExtractor};
pub use series::{load_csv, parse_csv, write_csv, TimeAxis, TimeSeries};
