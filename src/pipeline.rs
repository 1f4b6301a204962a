//! The affective rating pipeline as seen by the surrounding application.
//!
//! `submit_candidate`, `resolve_candidate` and `classify` are the whole
//! boundary. Everything behind them is wired from one store and one predictor.

use crate::config::PipelineSettings;
use crate::consensus::ConsensusEvaluator;
use crate::curation_store::{Candidate, CurationStore};
use crate::pending_queue::PendingQueueManager;
use crate::predictor::{PredictionError, PredictorGateway};
use crate::quadrant::{self, QuadrantLabel};
use std::sync::Arc;
use thiserror::Error;

pub use crate::consensus::ResolutionOutcome;
pub use crate::pending_queue::SubmissionOutcome;

/// Faults of the pipeline. Terminal rejections are outcomes, not errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    PredictionFailed(#[from] PredictionError),

    #[error("Candidate not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::PredictionFailed(_) => "PredictionFailed",
            PipelineError::NotFound(_) => "NotFound",
            PipelineError::ValidationFailed(_) => "ValidationFailed",
            PipelineError::Store(_) => "StoreFailure",
        }
    }
}

pub struct AffectPipeline {
    queue: PendingQueueManager,
    evaluator: ConsensusEvaluator,
}

impl AffectPipeline {
    pub fn new(
        store: Arc<dyn CurationStore>,
        gateway: Arc<dyn PredictorGateway>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            queue: PendingQueueManager::new(store.clone(), gateway, &settings),
            evaluator: ConsensusEvaluator::new(store, &settings),
        }
    }

    /// Prescreens a clip and queues it for a human rating if it qualifies.
    pub async fn submit_candidate(&self, clip_path: &str) -> Result<SubmissionOutcome, PipelineError> {
        self.queue.submit(clip_path).await
    }

    /// Reconciles a pending candidate with a human rating.
    pub fn resolve_candidate(
        &self,
        candidate_id: &str,
        human_valence: f64,
        human_arousal: f64,
    ) -> Result<ResolutionOutcome, PipelineError> {
        self.evaluator
            .resolve(candidate_id, human_valence, human_arousal)
    }

    pub fn classify(&self, valence: f64, arousal: f64) -> QuadrantLabel {
        quadrant::classify(valence, arousal)
    }

    pub fn list_pending(&self, limit: usize, offset: usize) -> Result<Vec<Candidate>, PipelineError> {
        self.queue.list_pending(limit, offset)
    }

    pub fn queue(&self) -> &PendingQueueManager {
        &self.queue
    }
}
