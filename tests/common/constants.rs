//! Shared constants for end-to-end tests

// ============================================================================
// Clip paths
// ============================================================================

/// Prescreened far from neutral, admitted to the queue
pub const CONFIDENT_CLIP: &str = "uploads/clips/thunderstorm.mp4";

/// Prescreened too close to neutral, never queued
pub const NEUTRAL_CLIP: &str = "uploads/clips/waiting_room.mp4";

/// Prescreen reports `Passed screening: False`
pub const FAILED_SCREENING_CLIP: &str = "uploads/clips/corrupted.mp4";

// ============================================================================
// Pipeline defaults
// ============================================================================

pub const DEFAULT_MAX_PENDING: usize = 50;
