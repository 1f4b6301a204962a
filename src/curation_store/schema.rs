//! Database schema for curation.db.

use crate::sqlite_column;
use crate::sqlite_persistence::{ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema};

/// Clips awaiting a human rating
pub const PENDING_CANDIDATES_TABLE_V0: Table = Table {
    name: "pending_candidates",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("path", &SqlType::Text, non_null = true),
        sqlite_column!("valence", &SqlType::Real, non_null = true),
        sqlite_column!("arousal", &SqlType::Real, non_null = true),
        sqlite_column!("uploaded_at", &SqlType::Integer, non_null = true),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!(
            "version",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_pending_uploaded_at", "uploaded_at")],
};

/// Canonical library of accepted videos
pub const VIDEOS_TABLE_V0: Table = Table {
    name: "videos",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("path", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("valence", &SqlType::Real, non_null = true),
        sqlite_column!("arousal", &SqlType::Real, non_null = true),
        sqlite_column!("label", &SqlType::Text, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "version",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[
        ("idx_videos_label", "label"),
        ("idx_videos_created_at", "created_at"),
    ],
};

/// Model scores of experiment data, per video
pub const VIDEO_EVALUATIONS_TABLE_V0: Table = Table {
    name: "video_evaluations",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "video_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "videos",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("valence", &SqlType::Real, non_null = true),
        sqlite_column!("arousal", &SqlType::Real, non_null = true),
        sqlite_column!("confidence", &SqlType::Real, non_null = true),
        sqlite_column!("evaluated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_evaluations_video", "video_id")],
};

pub const CURATION_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        PENDING_CANDIDATES_TABLE_V0,
        VIDEOS_TABLE_V0,
        VIDEO_EVALUATIONS_TABLE_V0,
    ],
    migration: None,
}];
