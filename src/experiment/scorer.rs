//! Model-side work on experiment data: scoring recorded features against a
//! library video, retraining the model, and cross-validating it.

use crate::curation_store::{CurationStore, Evaluation, NewEvaluation};
use crate::predictor::{CrossValidationReport, PredictionError, PredictorGateway, TrainingReport};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    PredictionFailed(#[from] PredictionError),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ExperimentError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExperimentError::PredictionFailed(_) => "PredictionFailed",
            ExperimentError::VideoNotFound(_) => "NotFound",
            ExperimentError::InsufficientData(_) => "InsufficientData",
            ExperimentError::ValidationFailed(_) => "ValidationFailed",
            ExperimentError::Store(_) => "StoreFailure",
        }
    }
}

fn require_path(data_path: &Path) -> Result<(), ExperimentError> {
    if data_path.as_os_str().is_empty() {
        return Err(ExperimentError::ValidationFailed(
            "data path must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub struct ExperimentScorer {
    store: Arc<dyn CurationStore>,
    gateway: Arc<dyn PredictorGateway>,
}

impl ExperimentScorer {
    pub fn new(store: Arc<dyn CurationStore>, gateway: Arc<dyn PredictorGateway>) -> Self {
        Self { store, gateway }
    }

    /// Scores experiment features and records the result against `video_id`.
    ///
    /// A predictor failure records nothing.
    pub async fn score(&self, video_id: &str, features: &str) -> Result<Evaluation, ExperimentError> {
        if features.trim().is_empty() {
            return Err(ExperimentError::ValidationFailed(
                "features must not be empty".to_string(),
            ));
        }
        if self.store.get_video(video_id)?.is_none() {
            return Err(ExperimentError::VideoNotFound(video_id.to_string()));
        }

        let prediction = self.gateway.evaluate(features).await?;

        let recorded = self.store.record_evaluation(NewEvaluation {
            video_id: video_id.to_string(),
            valence: prediction.valence,
            arousal: prediction.arousal,
            confidence: prediction.confidence,
        });
        match recorded {
            Ok(evaluation) => {
                info!(
                    "Recorded evaluation {} for video {} (valence={}, arousal={}, confidence={})",
                    evaluation.id,
                    video_id,
                    evaluation.valence,
                    evaluation.arousal,
                    evaluation.confidence
                );
                Ok(evaluation)
            }
            // The video may have been deleted while the predictor was running.
            Err(e) if self.store.get_video(video_id)?.is_none() => {
                warn!("Video {} disappeared during scoring: {}", video_id, e);
                Err(ExperimentError::VideoNotFound(video_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn evaluations(&self, video_id: &str) -> Result<Vec<Evaluation>, ExperimentError> {
        if self.store.get_video(video_id)?.is_none() {
            return Err(ExperimentError::VideoNotFound(video_id.to_string()));
        }
        Ok(self.store.list_evaluations(video_id)?)
    }

    pub async fn train(&self, data_path: &Path) -> Result<TrainingReport, ExperimentError> {
        require_path(data_path)?;
        info!("Training model from {:?}", data_path);
        let report = self.gateway.train(data_path).await?;
        info!("Training finished ({} lines of output)", report.output.len());
        Ok(report)
    }

    pub async fn cross_validate(
        &self,
        data_path: &Path,
    ) -> Result<CrossValidationReport, ExperimentError> {
        require_path(data_path)?;
        let evaluations = self.store.count_evaluations()?;
        if evaluations == 0 {
            return Err(ExperimentError::InsufficientData(
                "no evaluations have been recorded yet".to_string(),
            ));
        }
        let report = self.gateway.cross_validate(data_path).await?;
        info!(
            "Cross-validation over {} evaluations scored {}",
            evaluations, report.score
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation_store::{InMemoryCurationStore, NewVideo, SqliteCurationStore};
    use crate::predictor::fake::FakePredictor;

    fn setup() -> (ExperimentScorer, Arc<InMemoryCurationStore>, Arc<FakePredictor>) {
        let store = Arc::new(InMemoryCurationStore::new());
        let gateway = Arc::new(FakePredictor::new());
        let scorer = ExperimentScorer::new(store.clone(), gateway.clone());
        (scorer, store, gateway)
    }

    #[tokio::test]
    async fn test_score_records_evaluation() {
        let (scorer, store, gateway) = setup();
        let video = store
            .insert_video(NewVideo::new("a.mp4", "a", 6.0, 6.0))
            .unwrap();
        gateway.push_evaluation(7.5, 3.0, 0.8);

        let evaluation = scorer.score(&video.id, "0.1,0.2,0.3").await.unwrap();

        assert_eq!(evaluation.video_id, video.id);
        assert_eq!(evaluation.valence, 7.5);
        assert_eq!(evaluation.arousal, 3.0);
        assert_eq!(evaluation.confidence, 0.8);
        assert_eq!(scorer.evaluations(&video.id).unwrap(), vec![evaluation]);
    }

    #[tokio::test]
    async fn test_score_unknown_video_skips_predictor() {
        let (scorer, _store, gateway) = setup();

        let err = scorer.score("missing", "0.1").await.unwrap_err();

        assert_eq!(err.kind(), "NotFound");
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_score_predictor_failure_records_nothing() {
        let (scorer, store, gateway) = setup();
        let video = store
            .insert_video(NewVideo::new("a.mp4", "a", 6.0, 6.0))
            .unwrap();
        gateway.push_evaluation_failure();

        let err = scorer.score(&video.id, "0.1").await.unwrap_err();

        assert!(matches!(err, ExperimentError::PredictionFailed(_)));
        assert_eq!(store.count_evaluations().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_score_rejects_empty_features() {
        let (scorer, _store, _gateway) = setup();
        let err = scorer.score("any", "  ").await.unwrap_err();
        assert_eq!(err.kind(), "ValidationFailed");
    }

    #[tokio::test]
    async fn test_cross_validate_requires_evaluations() {
        let (scorer, store, gateway) = setup();
        gateway.set_cross_validation_score(0.72);

        let err = scorer
            .cross_validate(Path::new("data/eeg.csv"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InsufficientData");

        let video = store
            .insert_video(NewVideo::new("a.mp4", "a", 6.0, 6.0))
            .unwrap();
        gateway.push_evaluation(7.5, 3.0, 0.8);
        scorer.score(&video.id, "0.1").await.unwrap();

        let report = scorer
            .cross_validate(Path::new("data/eeg.csv"))
            .await
            .unwrap();
        assert_eq!(report.score, 0.72);
    }

    #[tokio::test]
    async fn test_train() {
        let (scorer, _store, _gateway) = setup();

        let report = scorer.train(Path::new("data/eeg.csv")).await.unwrap();
        assert_eq!(report.output, vec!["trained on data/eeg.csv".to_string()]);

        let err = scorer.train(Path::new("")).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationFailed");
    }

    #[tokio::test]
    async fn test_evaluations_follow_video_deletion_in_sqlite() {
        let store = Arc::new(SqliteCurationStore::in_memory().unwrap());
        let gateway = Arc::new(FakePredictor::new());
        let scorer = ExperimentScorer::new(store.clone(), gateway.clone());
        let video = store
            .insert_video(NewVideo::new("a.mp4", "a", 6.0, 6.0))
            .unwrap();
        gateway.push_evaluation(1.0, 2.0, 0.5);
        scorer.score(&video.id, "0.1").await.unwrap();

        store.delete_video(&video.id).unwrap();

        assert_eq!(scorer.evaluations(&video.id).unwrap_err().kind(), "NotFound");
        assert_eq!(store.count_evaluations().unwrap(), 0);
    }
}
