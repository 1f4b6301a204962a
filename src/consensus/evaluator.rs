//! Reconciles the automated rating of a pending candidate with a human rating.

use crate::config::PipelineSettings;
use crate::curation_store::{
    title_from_path, Candidate, CandidateStatus, CurationStore, NewVideo, Video,
};
use crate::metrics;
use crate::pipeline::PipelineError;
use crate::quadrant::{classify, QuadrantLabel};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of resolving a candidate. Disagreement is an outcome, not an error.
///
/// `candidate` is the final snapshot of the resolved candidate; its row is
/// already gone from the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Promoted {
        candidate: Candidate,
        video: Video,
        label: QuadrantLabel,
    },
    DisagreementRejected {
        candidate: Candidate,
        valence_variance: f64,
        arousal_variance: f64,
    },
}

impl ResolutionOutcome {
    pub fn as_metric_label(&self) -> &'static str {
        match self {
            ResolutionOutcome::Promoted { .. } => "promoted",
            ResolutionOutcome::DisagreementRejected { .. } => "disagreement_rejected",
        }
    }

    pub fn video(&self) -> Option<&Video> {
        match self {
            ResolutionOutcome::Promoted { video, .. } => Some(video),
            ResolutionOutcome::DisagreementRejected { .. } => None,
        }
    }
}

/// Squared difference between the automated and human score on one axis.
pub fn variance(automated: f64, human: f64) -> f64 {
    (automated - human).powi(2)
}

pub struct ConsensusEvaluator {
    store: Arc<dyn CurationStore>,
    variance_threshold: f64,
}

impl ConsensusEvaluator {
    pub fn new(store: Arc<dyn CurationStore>, settings: &PipelineSettings) -> Self {
        Self {
            store,
            variance_threshold: settings.variance_threshold,
        }
    }

    /// Resolves a pending candidate against a human rating.
    ///
    /// Resolving the same id twice fails with `NotFound`. A concurrent
    /// resolution of the same candidate is also reported as `NotFound`, and
    /// in that case this call writes nothing.
    pub fn resolve(
        &self,
        candidate_id: &str,
        human_valence: f64,
        human_arousal: f64,
    ) -> Result<ResolutionOutcome, PipelineError> {
        if !human_valence.is_finite() || !human_arousal.is_finite() {
            return Err(PipelineError::ValidationFailed(format!(
                "human rating must be finite, got valence={} arousal={}",
                human_valence, human_arousal
            )));
        }

        let candidate = self
            .store
            .get_candidate(candidate_id)?
            .filter(|c| c.status == CandidateStatus::Pending)
            .ok_or_else(|| PipelineError::NotFound(candidate_id.to_string()))?;

        let valence_variance = variance(candidate.valence, human_valence);
        let arousal_variance = variance(candidate.arousal, human_arousal);
        debug!(
            "Candidate {}: valence variance {}, arousal variance {}",
            candidate.id, valence_variance, arousal_variance
        );

        let outcome = if valence_variance > self.variance_threshold
            || arousal_variance > self.variance_threshold
        {
            self.reject(candidate, valence_variance, arousal_variance)?
        } else {
            self.promote(candidate, human_valence, human_arousal)?
        };

        metrics::record_resolution(outcome.as_metric_label());
        match self.store.count_candidates() {
            Ok(size) => metrics::set_pending_queue_size(size),
            Err(e) => warn!("Could not read pending queue size: {}", e),
        }
        Ok(outcome)
    }

    fn reject(
        &self,
        mut candidate: Candidate,
        valence_variance: f64,
        arousal_variance: f64,
    ) -> Result<ResolutionOutcome, PipelineError> {
        if !self
            .store
            .discard_candidate(&candidate.id, candidate.version)?
        {
            warn!("Candidate {} was resolved concurrently", candidate.id);
            return Err(PipelineError::NotFound(candidate.id));
        }
        info!(
            "Rejected candidate {} ({}): ratings disagree (valence variance {}, arousal variance {})",
            candidate.id, candidate.path, valence_variance, arousal_variance
        );
        candidate.status = CandidateStatus::Rejected;
        Ok(ResolutionOutcome::DisagreementRejected {
            candidate,
            valence_variance,
            arousal_variance,
        })
    }

    fn promote(
        &self,
        mut candidate: Candidate,
        human_valence: f64,
        human_arousal: f64,
    ) -> Result<ResolutionOutcome, PipelineError> {
        let final_valence = (candidate.valence + human_valence) / 2.0;
        let final_arousal = (candidate.arousal + human_arousal) / 2.0;
        let title =
            title_from_path(&candidate.path).unwrap_or_else(|| format!("Video {}", candidate.id));
        let new_video = NewVideo::new(candidate.path.clone(), title, final_valence, final_arousal);

        let promoted = self
            .store
            .promote_candidate(&candidate.id, candidate.version, new_video)?;
        let Some(video) = promoted else {
            warn!("Candidate {} was resolved concurrently", candidate.id);
            return Err(PipelineError::NotFound(candidate.id));
        };

        info!(
            "Promoted candidate {} to video {} ({}, valence={}, arousal={})",
            candidate.id, video.id, video.label, video.valence, video.arousal
        );
        candidate.status = CandidateStatus::Evaluated;
        let label = classify(video.valence, video.arousal);
        Ok(ResolutionOutcome::Promoted {
            candidate,
            video,
            label,
        })
    }
}
