//! Admission of newly submitted clips into the bounded pending queue.
//!
//! Gates, in order:
//! 1. Prescreen the clip with the predictor (outside any store transaction)
//! 2. Drop it if the prescreen failed or its square sum is too close to neutral
//! 3. Insert it unless the queue is already at capacity (one atomic step)

use crate::config::PipelineSettings;
use crate::curation_store::{AdmitResult, Candidate, CurationStore, NewCandidate};
use crate::metrics;
use crate::pipeline::PipelineError;
use crate::predictor::{PredictorGateway, Prescreen};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a submission. Rejections are outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Queued { candidate: Candidate },
    /// Terminal: the clip is discarded.
    PrescreenRejected { prescreen: Prescreen },
    /// The submission is dropped; the caller may resubmit later.
    CapacityExceeded { size: usize, capacity: usize },
}

impl SubmissionOutcome {
    pub fn as_metric_label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Queued { .. } => "queued",
            SubmissionOutcome::PrescreenRejected { .. } => "prescreen_rejected",
            SubmissionOutcome::CapacityExceeded { .. } => "capacity_exceeded",
        }
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            SubmissionOutcome::Queued { candidate } => Some(candidate),
            _ => None,
        }
    }
}

pub struct PendingQueueManager {
    store: Arc<dyn CurationStore>,
    gateway: Arc<dyn PredictorGateway>,
    max_pending: usize,
    square_sum_threshold: f64,
}

impl PendingQueueManager {
    pub fn new(
        store: Arc<dyn CurationStore>,
        gateway: Arc<dyn PredictorGateway>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            max_pending: settings.max_pending,
            square_sum_threshold: settings.square_sum_threshold,
        }
    }

    fn passes_prescreen(&self, prescreen: &Prescreen) -> bool {
        prescreen.passed && prescreen.square_sum > self.square_sum_threshold
    }

    pub async fn submit(&self, clip_path: &str) -> Result<SubmissionOutcome, PipelineError> {
        let clip_path = clip_path.trim();
        if clip_path.is_empty() {
            return Err(PipelineError::ValidationFailed(
                "clip path must not be empty".to_string(),
            ));
        }

        debug!("Prescreening clip {}", clip_path);
        let prescreen = match self.gateway.prescreen(Path::new(clip_path)).await {
            Ok(prescreen) => prescreen,
            Err(e) => {
                warn!("Prescreening {} failed: {}", clip_path, e);
                metrics::record_submission("prediction_failed");
                return Err(e.into());
            }
        };

        if !self.passes_prescreen(&prescreen) {
            info!(
                "Clip {} rejected by prescreen (passed={}, square_sum={} <= {} or failed)",
                clip_path, prescreen.passed, prescreen.square_sum, self.square_sum_threshold
            );
            let outcome = SubmissionOutcome::PrescreenRejected { prescreen };
            metrics::record_submission(outcome.as_metric_label());
            return Ok(outcome);
        }

        let new_candidate = NewCandidate {
            path: clip_path.to_string(),
            valence: prescreen.valence,
            arousal: prescreen.arousal,
        };
        let outcome = match self.store.admit_candidate(new_candidate, self.max_pending)? {
            AdmitResult::Admitted(candidate) => {
                info!(
                    "Queued candidate {} for {} (valence={}, arousal={})",
                    candidate.id, candidate.path, candidate.valence, candidate.arousal
                );
                SubmissionOutcome::Queued { candidate }
            }
            AdmitResult::QueueFull { size } => {
                warn!(
                    "Pending queue full ({}/{}), dropping submission of {}",
                    size, self.max_pending, clip_path
                );
                SubmissionOutcome::CapacityExceeded {
                    size,
                    capacity: self.max_pending,
                }
            }
        };

        metrics::record_submission(outcome.as_metric_label());
        self.refresh_queue_gauge();
        Ok(outcome)
    }

    /// Candidates awaiting a human rating, oldest first.
    pub fn list_pending(&self, limit: usize, offset: usize) -> Result<Vec<Candidate>, PipelineError> {
        Ok(self.store.list_candidates(limit, offset)?)
    }

    pub fn get_pending(&self, id: &str) -> Result<Candidate, PipelineError> {
        self.store
            .get_candidate(id)?
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))
    }

    pub fn pending_count(&self) -> Result<usize, PipelineError> {
        Ok(self.store.count_candidates()?)
    }

    fn refresh_queue_gauge(&self) {
        match self.store.count_candidates() {
            Ok(size) => metrics::set_pending_queue_size(size),
            Err(e) => warn!("Could not read pending queue size: {}", e),
        }
    }
}
