//! Data models for pending candidates, accepted videos and experiment
//! evaluations.

use crate::quadrant::{classify, QuadrantLabel};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lifecycle state of a pending candidate.
///
/// Only `Pending` rows ever exist in storage: resolution removes the row in
/// the same transaction that decides its fate, so `Evaluated` and `Rejected`
/// are visible only on the snapshot returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStatus {
    Pending,
    Evaluated, // terminal
    Rejected,  // terminal
}

impl CandidateStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            CandidateStatus::Pending => "PENDING",
            CandidateStatus::Evaluated => "EVALUATED",
            CandidateStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(CandidateStatus::Pending),
            "EVALUATED" => Some(CandidateStatus::Evaluated),
            "REJECTED" => Some(CandidateStatus::Rejected),
            _ => None,
        }
    }
}

/// A clip awaiting a human rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub path: String,
    /// Automated valence from prescreening.
    pub valence: f64,
    /// Automated arousal from prescreening.
    pub arousal: f64,
    /// Unix timestamp (seconds).
    pub uploaded_at: i64,
    pub status: CandidateStatus,
    pub version: i64,
}

/// Input for admitting a new candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCandidate {
    pub path: String,
    pub valence: f64,
    pub arousal: f64,
}

impl NewCandidate {
    pub(crate) fn into_candidate(self, id: String, uploaded_at: i64) -> Candidate {
        Candidate {
            id,
            path: self.path,
            valence: self.valence,
            arousal: self.arousal,
            uploaded_at,
            status: CandidateStatus::Pending,
            version: 0,
        }
    }
}

/// An accepted video in the canonical library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub path: String,
    pub title: String,
    pub valence: f64,
    pub arousal: f64,
    pub label: QuadrantLabel,
    /// Unix timestamp (seconds).
    pub created_at: i64,
    pub version: i64,
}

impl Video {
    /// Replaces both scores and recomputes the label from them.
    pub fn set_scores(&mut self, valence: f64, arousal: f64) {
        self.valence = valence;
        self.arousal = arousal;
        self.label = classify(valence, arousal);
    }
}

/// Input for inserting a video. The label is always derived from the scores.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVideo {
    pub path: String,
    pub title: String,
    pub valence: f64,
    pub arousal: f64,
}

impl NewVideo {
    pub fn new(path: impl Into<String>, title: impl Into<String>, valence: f64, arousal: f64) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            valence,
            arousal,
        }
    }

    pub fn label(&self) -> QuadrantLabel {
        classify(self.valence, self.arousal)
    }

    pub(crate) fn into_video(self, id: String, created_at: i64) -> Video {
        let label = self.label();
        Video {
            id,
            path: self.path,
            title: self.title,
            valence: self.valence,
            arousal: self.arousal,
            label,
            created_at,
            version: 0,
        }
    }
}

/// Default title for a clip: the file stem of its path.
pub fn title_from_path(path: &str) -> Option<String> {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Model scoring of experiment data recorded against a library video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub video_id: String,
    pub valence: f64,
    pub arousal: f64,
    pub confidence: f64,
    /// Unix timestamp (seconds).
    pub evaluated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvaluation {
    pub video_id: String,
    pub valence: f64,
    pub arousal: f64,
    pub confidence: f64,
}

/// Result of a capacity-guarded insert into the pending queue.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmitResult {
    Admitted(Candidate),
    QueueFull { size: usize },
}

/// Result of a write guarded by an expected version.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionedWrite<T> {
    Written(T),
    NotFound,
    Stale { current_version: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_status_db_round_trip() {
        for status in [
            CandidateStatus::Pending,
            CandidateStatus::Evaluated,
            CandidateStatus::Rejected,
        ] {
            assert_eq!(CandidateStatus::from_db_str(status.as_db_str()), Some(status));
        }
        assert_eq!(CandidateStatus::from_db_str("pending"), None);
    }

    #[test]
    fn test_new_video_label_follows_scores() {
        let video = NewVideo::new("a.mp4", "a", 6.25, 4.25).into_video("v1".into(), 10);
        assert_eq!(video.label, QuadrantLabel::Halv);
        assert_eq!(video.version, 0);
    }

    #[test]
    fn test_set_scores_recomputes_label() {
        let mut video = NewVideo::new("a.mp4", "a", 2.0, 2.0).into_video("v1".into(), 10);
        assert_eq!(video.label, QuadrantLabel::Lalv);
        video.set_scores(5.0, 5.0);
        assert_eq!(video.label, QuadrantLabel::Hahv);
    }

    #[test]
    fn test_title_from_path() {
        assert_eq!(
            title_from_path("uploads/clips/sunset beach.mp4"),
            Some("sunset beach".to_string())
        );
        assert_eq!(title_from_path(""), None);
        assert_eq!(title_from_path("uploads/"), Some("uploads".to_string()));
    }
}
