//! Curation storage and its SQLite implementation.

use super::models::*;
use super::schema::CURATION_VERSIONED_SCHEMAS;
use crate::quadrant::QuadrantLabel;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Storage operations shared by the pending queue, the consensus evaluator
/// and the video library.
///
/// Every method that touches more than one row runs as a single
/// transaction: either all of its writes land or none do.
pub trait CurationStore: Send + Sync {
    // === Pending Candidates ===

    /// Insert a candidate unless the queue already holds `capacity` rows.
    /// The count and the insert are one atomic unit.
    fn admit_candidate(&self, candidate: NewCandidate, capacity: usize) -> Result<AdmitResult>;

    fn get_candidate(&self, id: &str) -> Result<Option<Candidate>>;

    /// List pending candidates, oldest first.
    fn list_candidates(&self, limit: usize, offset: usize) -> Result<Vec<Candidate>>;

    fn count_candidates(&self) -> Result<usize>;

    // === Resolution (atomic) ===

    /// Remove the candidate and insert the video in one transaction.
    /// Returns None and writes nothing if the candidate is gone or its
    /// version no longer matches `expected_version`.
    fn promote_candidate(
        &self,
        candidate_id: &str,
        expected_version: i64,
        video: NewVideo,
    ) -> Result<Option<Video>>;

    /// Remove the candidate if it still has `expected_version`.
    fn discard_candidate(&self, candidate_id: &str, expected_version: i64) -> Result<bool>;

    // === Videos ===

    fn insert_video(&self, video: NewVideo) -> Result<Video>;

    fn get_video(&self, id: &str) -> Result<Option<Video>>;

    /// List videos, oldest first.
    fn list_videos(&self, limit: usize, offset: usize) -> Result<Vec<Video>>;

    /// Up to `count` videos in random order.
    fn random_videos(&self, count: usize) -> Result<Vec<Video>>;

    fn count_videos(&self) -> Result<usize>;

    /// Overwrite path, title and scores of a video if its stored version is
    /// `expected_version`. The label is recomputed from the scores and the
    /// version is incremented as part of the same write.
    fn update_video(&self, video: &Video, expected_version: i64) -> Result<VersionedWrite<Video>>;

    /// Delete a video and its evaluations. Returns false if it did not exist.
    fn delete_video(&self, id: &str) -> Result<bool>;

    // === Experiment Evaluations ===

    fn record_evaluation(&self, evaluation: NewEvaluation) -> Result<Evaluation>;

    fn list_evaluations(&self, video_id: &str) -> Result<Vec<Evaluation>>;

    fn count_evaluations(&self) -> Result<usize>;
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// SQLite-backed curation store.
pub struct SqliteCurationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCurationStore {
    /// Opens an existing database or creates a new one with the current schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = if db_path.exists() {
            Connection::open(db_path)
                .with_context(|| format!("Failed to open curation database {:?}", db_path))?
        } else {
            let conn = Connection::open(db_path)?;
            CURATION_VERSIONED_SCHEMAS
                .last()
                .context("No schemas defined")?
                .create(&conn)?;
            info!("Created new curation database at {:?}", db_path);
            conn
        };

        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let db_version = conn
            .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
            .context("Failed to read database version")?
            - BASE_DB_VERSION as i64;

        if db_version < 0 {
            bail!(
                "Curation database version {} is too old, does not contain base db version {}",
                db_version,
                BASE_DB_VERSION
            );
        }
        let version = db_version as usize;
        if version >= CURATION_VERSIONED_SCHEMAS.len() {
            bail!(
                "Curation database version {} is too new (max supported: {})",
                version,
                CURATION_VERSIONED_SCHEMAS.len() - 1
            );
        }

        CURATION_VERSIONED_SCHEMAS
            .get(version)
            .context("Failed to get schema")?
            .validate(&conn)?;

        Self::migrate_if_needed(&conn, version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory SQLite database, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        CURATION_VERSIONED_SCHEMAS
            .last()
            .context("No schemas defined")?
            .create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &Connection, current_version: usize) -> Result<()> {
        let target_version = CURATION_VERSIONED_SCHEMAS.len() - 1;
        if current_version >= target_version {
            return Ok(());
        }

        info!(
            "Migrating curation database from version {} to {}",
            current_version, target_version
        );
        for schema in CURATION_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
            if let Some(migration_fn) = schema.migration {
                migration_fn(conn)?;
            }
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + target_version),
            [],
        )?;
        Ok(())
    }

    fn row_to_candidate(row: &rusqlite::Row) -> rusqlite::Result<Candidate> {
        Ok(Candidate {
            id: row.get("id")?,
            path: row.get("path")?,
            valence: row.get("valence")?,
            arousal: row.get("arousal")?,
            uploaded_at: row.get("uploaded_at")?,
            status: CandidateStatus::from_db_str(&row.get::<_, String>("status")?)
                .unwrap_or(CandidateStatus::Pending),
            version: row.get("version")?,
        })
    }

    fn row_to_video(row: &rusqlite::Row) -> rusqlite::Result<Video> {
        let valence: f64 = row.get("valence")?;
        let arousal: f64 = row.get("arousal")?;
        let stored_label = row.get::<_, String>("label")?;
        Ok(Video {
            id: row.get("id")?,
            path: row.get("path")?,
            title: row.get("title")?,
            valence,
            arousal,
            label: QuadrantLabel::parse(&stored_label)
                .unwrap_or_else(|| crate::quadrant::classify(valence, arousal)),
            created_at: row.get("created_at")?,
            version: row.get("version")?,
        })
    }

    fn row_to_evaluation(row: &rusqlite::Row) -> rusqlite::Result<Evaluation> {
        Ok(Evaluation {
            id: row.get("id")?,
            video_id: row.get("video_id")?,
            valence: row.get("valence")?,
            arousal: row.get("arousal")?,
            confidence: row.get("confidence")?,
            evaluated_at: row.get("evaluated_at")?,
        })
    }

    fn insert_video_row(conn: &Connection, video: &Video) -> Result<()> {
        conn.execute(
            "INSERT INTO videos (id, path, title, valence, arousal, label, created_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                video.id,
                video.path,
                video.title,
                video.valence,
                video.arousal,
                video.label.as_str(),
                video.created_at,
                video.version,
            ],
        )?;
        Ok(())
    }

    fn count(conn: &Connection, table: &str) -> Result<usize> {
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(count as usize)
    }
}

impl CurationStore for SqliteCurationStore {
    fn admit_candidate(&self, candidate: NewCandidate, capacity: usize) -> Result<AdmitResult> {
        let mut conn = self.conn.lock().unwrap();
        // IMMEDIATE takes the write lock up front so two processes sharing
        // the file cannot both pass the count check.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let size = Self::count(&tx, "pending_candidates")?;
        if size >= capacity {
            return Ok(AdmitResult::QueueFull { size });
        }

        let candidate = candidate.into_candidate(new_id(), now());
        tx.execute(
            "INSERT INTO pending_candidates (id, path, valence, arousal, uploaded_at, status, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                candidate.id,
                candidate.path,
                candidate.valence,
                candidate.arousal,
                candidate.uploaded_at,
                candidate.status.as_db_str(),
                candidate.version,
            ],
        )?;
        tx.commit()?;

        debug!("Inserted candidate {} ({} pending before)", candidate.id, size);
        Ok(AdmitResult::Admitted(candidate))
    }

    fn get_candidate(&self, id: &str) -> Result<Option<Candidate>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT * FROM pending_candidates WHERE id = ?1",
                params![id],
                Self::row_to_candidate,
            )
            .optional()?)
    }

    fn list_candidates(&self, limit: usize, offset: usize) -> Result<Vec<Candidate>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM pending_candidates ORDER BY uploaded_at ASC, rowid ASC LIMIT ?1 OFFSET ?2",
        )?;
        let candidates = stmt
            .query_map(params![limit as i64, offset as i64], Self::row_to_candidate)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(candidates)
    }

    fn count_candidates(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Self::count(&conn, "pending_candidates")
    }

    fn promote_candidate(
        &self,
        candidate_id: &str,
        expected_version: i64,
        video: NewVideo,
    ) -> Result<Option<Video>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let removed = tx.execute(
            "DELETE FROM pending_candidates WHERE id = ?1 AND version = ?2 AND status = ?3",
            params![
                candidate_id,
                expected_version,
                CandidateStatus::Pending.as_db_str()
            ],
        )?;
        if removed == 0 {
            // Dropping the transaction rolls it back.
            return Ok(None);
        }

        let video = video.into_video(new_id(), now());
        Self::insert_video_row(&tx, &video)?;
        tx.commit()?;
        Ok(Some(video))
    }

    fn discard_candidate(&self, candidate_id: &str, expected_version: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM pending_candidates WHERE id = ?1 AND version = ?2 AND status = ?3",
            params![
                candidate_id,
                expected_version,
                CandidateStatus::Pending.as_db_str()
            ],
        )?;
        Ok(removed > 0)
    }

    fn insert_video(&self, video: NewVideo) -> Result<Video> {
        let conn = self.conn.lock().unwrap();
        let video = video.into_video(new_id(), now());
        Self::insert_video_row(&conn, &video)?;
        Ok(video)
    }

    fn get_video(&self, id: &str) -> Result<Option<Video>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT * FROM videos WHERE id = ?1",
                params![id],
                Self::row_to_video,
            )
            .optional()?)
    }

    fn list_videos(&self, limit: usize, offset: usize) -> Result<Vec<Video>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM videos ORDER BY created_at ASC, rowid ASC LIMIT ?1 OFFSET ?2",
        )?;
        let videos = stmt
            .query_map(params![limit as i64, offset as i64], Self::row_to_video)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(videos)
    }

    fn random_videos(&self, count: usize) -> Result<Vec<Video>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM videos ORDER BY RANDOM() LIMIT ?1")?;
        let videos = stmt
            .query_map(params![count as i64], Self::row_to_video)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(videos)
    }

    fn count_videos(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Self::count(&conn, "videos")
    }

    fn update_video(&self, video: &Video, expected_version: i64) -> Result<VersionedWrite<Video>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut updated = video.clone();
        updated.set_scores(video.valence, video.arousal);

        let changed = tx.execute(
            "UPDATE videos SET path = ?1, title = ?2, valence = ?3, arousal = ?4, label = ?5,
                version = version + 1
             WHERE id = ?6 AND version = ?7",
            params![
                updated.path,
                updated.title,
                updated.valence,
                updated.arousal,
                updated.label.as_str(),
                updated.id,
                expected_version,
            ],
        )?;

        if changed == 0 {
            let current_version: Option<i64> = tx
                .query_row(
                    "SELECT version FROM videos WHERE id = ?1",
                    params![video.id],
                    |row| row.get(0),
                )
                .optional()?;
            return Ok(match current_version {
                Some(current_version) => VersionedWrite::Stale { current_version },
                None => VersionedWrite::NotFound,
            });
        }

        let stored = tx.query_row(
            "SELECT * FROM videos WHERE id = ?1",
            params![video.id],
            Self::row_to_video,
        )?;
        tx.commit()?;
        Ok(VersionedWrite::Written(stored))
    }

    fn delete_video(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute("DELETE FROM videos WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn record_evaluation(&self, evaluation: NewEvaluation) -> Result<Evaluation> {
        let conn = self.conn.lock().unwrap();
        let evaluation = Evaluation {
            id: new_id(),
            video_id: evaluation.video_id,
            valence: evaluation.valence,
            arousal: evaluation.arousal,
            confidence: evaluation.confidence,
            evaluated_at: now(),
        };
        conn.execute(
            "INSERT INTO video_evaluations (id, video_id, valence, arousal, confidence, evaluated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                evaluation.id,
                evaluation.video_id,
                evaluation.valence,
                evaluation.arousal,
                evaluation.confidence,
                evaluation.evaluated_at,
            ],
        )
        .with_context(|| format!("Could not record evaluation for video {}", evaluation.video_id))?;
        Ok(evaluation)
    }

    fn list_evaluations(&self, video_id: &str) -> Result<Vec<Evaluation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM video_evaluations WHERE video_id = ?1 ORDER BY evaluated_at ASC, rowid ASC",
        )?;
        let evaluations = stmt
            .query_map(params![video_id], Self::row_to_evaluation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(evaluations)
    }

    fn count_evaluations(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Self::count(&conn, "video_evaluations")
    }
}
