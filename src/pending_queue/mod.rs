//! Bounded staging area for clips awaiting a human rating.

mod manager;

pub use manager::{PendingQueueManager, SubmissionOutcome};
