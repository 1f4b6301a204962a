//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{Backend, TestPipeline, CONFIDENT_CLIP};
//!
//! #[tokio::test]
//! async fn test_submit() {
//!     let harness = TestPipeline::new(Backend::Memory);
//!     harness.predictor.set_prescreen(CONFIDENT_CLIP, true, 8.0, 8.0, 18.0);
//!     let outcome = harness.pipeline.submit_candidate(CONFIDENT_CLIP).await.unwrap();
//!     assert!(outcome.candidate().is_some());
//! }
//! ```

mod constants;
mod fixtures;
mod predictor;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{Backend, TestPipeline};
#[allow(unused_imports)]
pub use predictor::ScriptedPredictor;

#[cfg(unix)]
#[allow(unused_imports)]
pub use fixtures::write_predictor_script;
