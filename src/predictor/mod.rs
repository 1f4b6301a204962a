//! External predictor gateway.
//!
//! The affective model lives outside this crate. Pipeline code talks to it
//! only through [`PredictorGateway`], so the process-per-call implementation
//! can be replaced by an in-process model or a long-lived worker.

#[cfg(test)]
pub(crate) mod fake;
mod models;
mod output;
mod process;

pub use models::{
    CrossValidationReport, Prediction, PredictionError, PredictorMode, Prescreen, TrainingReport,
};
pub use output::{parse_cross_validation, parse_prediction, parse_prescreen};
pub use process::{ProcessPredictor, ProcessPredictorConfig};

use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait PredictorGateway: Send + Sync {
    /// Scores raw experiment features.
    async fn evaluate(&self, features: &str) -> Result<Prediction, PredictionError>;

    /// First-pass automated rating of a newly submitted clip.
    async fn prescreen(&self, clip_path: &Path) -> Result<Prescreen, PredictionError>;

    /// Retrains the model from a labelled data set.
    async fn train(&self, data_path: &Path) -> Result<TrainingReport, PredictionError>;

    async fn cross_validate(
        &self,
        data_path: &Path,
    ) -> Result<CrossValidationReport, PredictionError>;
}
