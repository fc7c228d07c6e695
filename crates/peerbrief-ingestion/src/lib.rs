//! peerbrief-ingestion: peer review collection.
//! - Review platform collectors (eLife, F1000Research)
//! - Record schema and validation
//! - Run orchestration, summary statistics and run-directory output
//! - Synthesis input preparation and collected-data analysis

pub mod analysis;
pub mod extract;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod prepare;
pub mod sources;
pub mod stats;

pub use models::{Manuscript, Review, ReviewSource, Reviewer};
pub use pipeline::{CollectionOutcome, CollectionProgress, CollectionRun, RunState};
