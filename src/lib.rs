//! Affect Curator Library
//!
//! Affective rating pipeline for a curated video library: automated
//! prescreening, a bounded pending queue, consensus with a human rating, and
//! the library of accepted videos.

pub mod config;
pub mod consensus;
pub mod curation_store;
pub mod experiment;
pub mod library;
pub mod metrics;
pub mod pending_queue;
pub mod pipeline;
pub mod predictor;
pub mod quadrant;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig, PipelineSettings, StorageBackend};
pub use curation_store::{open_store, CurationStore, InMemoryCurationStore, SqliteCurationStore};
pub use experiment::{ExperimentError, ExperimentScorer};
pub use library::{LibraryError, VideoLibrary};
pub use pipeline::{AffectPipeline, PipelineError, ResolutionOutcome, SubmissionOutcome};
pub use predictor::{PredictorGateway, ProcessPredictor};
pub use quadrant::{classify, QuadrantLabel};
