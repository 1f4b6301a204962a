//! In-process predictor answering from a table keyed by clip path

use affect_curator::predictor::{
    CrossValidationReport, Prediction, PredictionError, PredictorGateway, PredictorMode,
    Prescreen, TrainingReport,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct ScriptedPredictor {
    prescreens: Mutex<HashMap<String, Prescreen>>,
    evaluations: Mutex<HashMap<String, Prediction>>,
    cross_validation_score: Mutex<Option<f64>>,
    prescreen_calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_prescreen(&self, clip: &str, passed: bool, valence: f64, arousal: f64, square_sum: f64) {
        self.prescreens.lock().unwrap().insert(
            clip.to_string(),
            Prescreen {
                passed,
                valence,
                arousal,
                square_sum,
            },
        );
    }

    pub fn set_evaluation(&self, features: &str, valence: f64, arousal: f64, confidence: f64) {
        self.evaluations.lock().unwrap().insert(
            features.to_string(),
            Prediction {
                valence,
                arousal,
                confidence,
            },
        );
    }

    pub fn set_cross_validation_score(&self, score: f64) {
        *self.cross_validation_score.lock().unwrap() = Some(score);
    }

    pub fn prescreen_calls(&self) -> usize {
        self.prescreen_calls.load(Ordering::SeqCst)
    }
}

fn unknown(mode: PredictorMode, what: &str) -> PredictionError {
    PredictionError::MalformedOutput {
        mode,
        reason: format!("no scripted answer for {}", what),
    }
}

#[async_trait]
impl PredictorGateway for ScriptedPredictor {
    async fn evaluate(&self, features: &str) -> Result<Prediction, PredictionError> {
        self.evaluations
            .lock()
            .unwrap()
            .get(features)
            .copied()
            .ok_or_else(|| unknown(PredictorMode::Evaluate, features))
    }

    async fn prescreen(&self, clip_path: &Path) -> Result<Prescreen, PredictionError> {
        self.prescreen_calls.fetch_add(1, Ordering::SeqCst);
        let key = clip_path.to_string_lossy().to_string();
        self.prescreens
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .ok_or_else(|| unknown(PredictorMode::Predict, &key))
    }

    async fn train(&self, data_path: &Path) -> Result<TrainingReport, PredictionError> {
        Ok(TrainingReport {
            output: vec![format!("Model trained on {}", data_path.display())],
        })
    }

    async fn cross_validate(
        &self,
        data_path: &Path,
    ) -> Result<CrossValidationReport, PredictionError> {
        match *self.cross_validation_score.lock().unwrap() {
            Some(score) => Ok(CrossValidationReport { score }),
            None => Err(unknown(
                PredictorMode::CrossValidate,
                &data_path.display().to_string(),
            )),
        }
    }
}
