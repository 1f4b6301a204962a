//! Scripted predictor for unit tests.

use super::models::*;
use super::PredictorGateway;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct FakePredictor {
    prescreens: Mutex<VecDeque<Result<Prescreen, PredictionError>>>,
    evaluations: Mutex<VecDeque<Result<Prediction, PredictionError>>>,
    cross_validation_score: Mutex<Option<f64>>,
    pub calls: AtomicUsize,
}

impl FakePredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_prescreen(&self, passed: bool, valence: f64, arousal: f64, square_sum: f64) {
        self.prescreens.lock().unwrap().push_back(Ok(Prescreen {
            passed,
            valence,
            arousal,
            square_sum,
        }));
    }

    pub fn push_evaluation(&self, valence: f64, arousal: f64, confidence: f64) {
        self.evaluations.lock().unwrap().push_back(Ok(Prediction {
            valence,
            arousal,
            confidence,
        }));
    }

    pub fn push_prescreen_timeout(&self) {
        self.prescreens
            .lock()
            .unwrap()
            .push_back(Err(PredictionError::Timeout {
                mode: PredictorMode::Predict,
                timeout: Duration::from_secs(1),
            }));
    }

    pub fn push_evaluation_failure(&self) {
        self.evaluations
            .lock()
            .unwrap()
            .push_back(Err(PredictionError::NonZeroExit {
                mode: PredictorMode::Evaluate,
                code: Some(1),
                stderr: "model missing".to_string(),
            }));
    }

    pub fn set_cross_validation_score(&self, score: f64) {
        *self.cross_validation_score.lock().unwrap() = Some(score);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn missing(mode: PredictorMode) -> PredictionError {
    PredictionError::MalformedOutput {
        mode,
        reason: "no scripted answer".to_string(),
    }
}

#[async_trait]
impl PredictorGateway for FakePredictor {
    async fn evaluate(&self, _features: &str) -> Result<Prediction, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.evaluations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(missing(PredictorMode::Evaluate)))
    }

    async fn prescreen(&self, _clip_path: &Path) -> Result<Prescreen, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prescreens
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(missing(PredictorMode::Predict)))
    }

    async fn train(&self, data_path: &Path) -> Result<TrainingReport, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TrainingReport {
            output: vec![format!("trained on {}", data_path.display())],
        })
    }

    async fn cross_validate(
        &self,
        _data_path: &Path,
    ) -> Result<CrossValidationReport, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match *self.cross_validation_score.lock().unwrap() {
            Some(score) => Ok(CrossValidationReport { score }),
            None => Err(missing(PredictorMode::CrossValidate)),
        }
    }
}
