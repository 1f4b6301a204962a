//! Consensus gate between automated and human ratings.

mod evaluator;

pub use evaluator::{variance, ConsensusEvaluator, ResolutionOutcome};
