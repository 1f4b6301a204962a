//! Experiment scoring, model training and cross-validation.

mod scorer;

pub use scorer::{ExperimentError, ExperimentScorer};
