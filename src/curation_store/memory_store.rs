//! In-memory curation store.
//!
//! Same contract as the SQLite store. All state sits behind one mutex, so
//! each operation is trivially atomic.

use super::models::*;
use super::store::{new_id, now, CurationStore};
use anyhow::Result;
use rand::seq::SliceRandom;
use std::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    candidates: Vec<Candidate>,
    videos: Vec<Video>,
    evaluations: Vec<Evaluation>,
}

#[derive(Default)]
pub struct InMemoryCurationStore {
    state: Mutex<MemoryState>,
}

impl InMemoryCurationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T: Clone>(items: &[T], limit: usize, offset: usize) -> Vec<T> {
    items.iter().skip(offset).take(limit).cloned().collect()
}

fn remove_pending(state: &mut MemoryState, candidate_id: &str, expected_version: i64) -> bool {
    let position = state.candidates.iter().position(|c| {
        c.id == candidate_id
            && c.version == expected_version
            && c.status == CandidateStatus::Pending
    });
    match position {
        Some(index) => {
            state.candidates.remove(index);
            true
        }
        None => false,
    }
}

impl CurationStore for InMemoryCurationStore {
    fn admit_candidate(&self, candidate: NewCandidate, capacity: usize) -> Result<AdmitResult> {
        let mut state = self.state.lock().unwrap();
        let size = state.candidates.len();
        if size >= capacity {
            return Ok(AdmitResult::QueueFull { size });
        }
        let candidate = candidate.into_candidate(new_id(), now());
        state.candidates.push(candidate.clone());
        Ok(AdmitResult::Admitted(candidate))
    }

    fn get_candidate(&self, id: &str) -> Result<Option<Candidate>> {
        let state = self.state.lock().unwrap();
        Ok(state.candidates.iter().find(|c| c.id == id).cloned())
    }

    fn list_candidates(&self, limit: usize, offset: usize) -> Result<Vec<Candidate>> {
        let state = self.state.lock().unwrap();
        Ok(page(&state.candidates, limit, offset))
    }

    fn count_candidates(&self) -> Result<usize> {
        Ok(self.state.lock().unwrap().candidates.len())
    }

    fn promote_candidate(
        &self,
        candidate_id: &str,
        expected_version: i64,
        video: NewVideo,
    ) -> Result<Option<Video>> {
        let mut state = self.state.lock().unwrap();
        if !remove_pending(&mut state, candidate_id, expected_version) {
            return Ok(None);
        }
        let video = video.into_video(new_id(), now());
        state.videos.push(video.clone());
        Ok(Some(video))
    }

    fn discard_candidate(&self, candidate_id: &str, expected_version: i64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(remove_pending(&mut state, candidate_id, expected_version))
    }

    fn insert_video(&self, video: NewVideo) -> Result<Video> {
        let video = video.into_video(new_id(), now());
        self.state.lock().unwrap().videos.push(video.clone());
        Ok(video)
    }

    fn get_video(&self, id: &str) -> Result<Option<Video>> {
        let state = self.state.lock().unwrap();
        Ok(state.videos.iter().find(|v| v.id == id).cloned())
    }

    fn list_videos(&self, limit: usize, offset: usize) -> Result<Vec<Video>> {
        let state = self.state.lock().unwrap();
        Ok(page(&state.videos, limit, offset))
    }

    fn random_videos(&self, count: usize) -> Result<Vec<Video>> {
        let mut videos = self.state.lock().unwrap().videos.clone();
        videos.shuffle(&mut rand::rng());
        videos.truncate(count);
        Ok(videos)
    }

    fn count_videos(&self) -> Result<usize> {
        Ok(self.state.lock().unwrap().videos.len())
    }

    fn update_video(&self, video: &Video, expected_version: i64) -> Result<VersionedWrite<Video>> {
        let mut state = self.state.lock().unwrap();
        let Some(stored) = state.videos.iter_mut().find(|v| v.id == video.id) else {
            return Ok(VersionedWrite::NotFound);
        };
        if stored.version != expected_version {
            return Ok(VersionedWrite::Stale {
                current_version: stored.version,
            });
        }
        stored.path = video.path.clone();
        stored.title = video.title.clone();
        stored.set_scores(video.valence, video.arousal);
        stored.version += 1;
        Ok(VersionedWrite::Written(stored.clone()))
    }

    fn delete_video(&self, id: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.videos.len();
        state.videos.retain(|v| v.id != id);
        let removed = state.videos.len() != before;
        if removed {
            state.evaluations.retain(|e| e.video_id != id);
        }
        Ok(removed)
    }

    fn record_evaluation(&self, evaluation: NewEvaluation) -> Result<Evaluation> {
        let mut state = self.state.lock().unwrap();
        if !state.videos.iter().any(|v| v.id == evaluation.video_id) {
            anyhow::bail!(
                "Could not record evaluation for video {}: no such video",
                evaluation.video_id
            );
        }
        let evaluation = Evaluation {
            id: new_id(),
            video_id: evaluation.video_id,
            valence: evaluation.valence,
            arousal: evaluation.arousal,
            confidence: evaluation.confidence,
            evaluated_at: now(),
        };
        state.evaluations.push(evaluation.clone());
        Ok(evaluation)
    }

    fn list_evaluations(&self, video_id: &str) -> Result<Vec<Evaluation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .evaluations
            .iter()
            .filter(|e| e.video_id == video_id)
            .cloned()
            .collect())
    }

    fn count_evaluations(&self) -> Result<usize> {
        Ok(self.state.lock().unwrap().evaluations.len())
    }
}
