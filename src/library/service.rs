//! Canonical library of accepted videos.
//!
//! Every score write goes through the classifier, and every update carries the
//! version it was read with. A conflicting write fails with `StaleVersion`;
//! nothing here retries.

use crate::curation_store::{CurationStore, NewVideo, VersionedWrite, Video};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Stale version for video {id}: expected {expected}, current is {actual}")]
    StaleVersion {
        id: String,
        expected: i64,
        actual: i64,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl LibraryError {
    pub fn kind(&self) -> &'static str {
        match self {
            LibraryError::NotFound(_) => "NotFound",
            LibraryError::StaleVersion { .. } => "StaleVersion",
            LibraryError::ValidationFailed(_) => "ValidationFailed",
            LibraryError::Store(_) => "StoreFailure",
        }
    }
}

fn validate_scores(valence: f64, arousal: f64) -> Result<(), LibraryError> {
    if !valence.is_finite() || !arousal.is_finite() {
        return Err(LibraryError::ValidationFailed(format!(
            "scores must be finite, got valence={} arousal={}",
            valence, arousal
        )));
    }
    Ok(())
}

fn validate_text(field: &str, value: &str) -> Result<(), LibraryError> {
    if value.trim().is_empty() {
        return Err(LibraryError::ValidationFailed(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

pub struct VideoLibrary {
    store: Arc<dyn CurationStore>,
}

impl VideoLibrary {
    pub fn new(store: Arc<dyn CurationStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, video: NewVideo) -> Result<Video, LibraryError> {
        validate_text("path", &video.path)?;
        validate_text("title", &video.title)?;
        validate_scores(video.valence, video.arousal)?;
        let video = self.store.insert_video(video)?;
        info!("Created video {} ({})", video.id, video.label);
        Ok(video)
    }

    pub fn get(&self, id: &str) -> Result<Video, LibraryError> {
        self.store
            .get_video(id)?
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))
    }

    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<Video>, LibraryError> {
        Ok(self.store.list_videos(limit, offset)?)
    }

    pub fn count(&self) -> Result<usize, LibraryError> {
        Ok(self.store.count_videos()?)
    }

    /// At most `count` distinct videos in random order.
    pub fn random_sample(&self, count: usize) -> Result<Vec<Video>, LibraryError> {
        Ok(self.store.random_videos(count)?)
    }

    /// Changes path and title. Scores and label are left as they are.
    pub fn update_details(
        &self,
        id: &str,
        expected_version: i64,
        path: &str,
        title: &str,
    ) -> Result<Video, LibraryError> {
        validate_text("path", path)?;
        validate_text("title", title)?;
        let mut video = self.get(id)?;
        video.path = path.to_string();
        video.title = title.to_string();
        self.write(video, expected_version)
    }

    /// Replaces both scores and recomputes the label in the same write.
    pub fn update_scores(
        &self,
        id: &str,
        expected_version: i64,
        valence: f64,
        arousal: f64,
    ) -> Result<Video, LibraryError> {
        validate_scores(valence, arousal)?;
        let mut video = self.get(id)?;
        video.set_scores(valence, arousal);
        let updated = self.write(video, expected_version)?;
        info!(
            "Updated scores of video {} to valence={}, arousal={} ({})",
            updated.id, updated.valence, updated.arousal, updated.label
        );
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> Result<(), LibraryError> {
        if !self.store.delete_video(id)? {
            return Err(LibraryError::NotFound(id.to_string()));
        }
        info!("Deleted video {}", id);
        Ok(())
    }

    fn write(&self, video: Video, expected_version: i64) -> Result<Video, LibraryError> {
        match self.store.update_video(&video, expected_version)? {
            VersionedWrite::Written(updated) => Ok(updated),
            VersionedWrite::NotFound => Err(LibraryError::NotFound(video.id)),
            VersionedWrite::Stale { current_version } => {
                warn!(
                    "Rejected stale write to video {}: expected version {}, current {}",
                    video.id, expected_version, current_version
                );
                Err(LibraryError::StaleVersion {
                    id: video.id,
                    expected: expected_version,
                    actual: current_version,
                })
            }
        }
    }
}
