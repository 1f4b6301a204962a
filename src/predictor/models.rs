//! Results produced by the external predictor.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Invocation mode of the predictor process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorMode {
    /// Feature-based scoring of experiment data.
    Evaluate,
    /// Raw-clip prescreening of a newly submitted video.
    Predict,
    Train,
    CrossValidate,
}

impl PredictorMode {
    /// Subcommand passed as the first argument to the predictor.
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictorMode::Evaluate => "evaluate",
            PredictorMode::Predict => "predict",
            PredictorMode::Train => "train",
            PredictorMode::CrossValidate => "cross_validate",
        }
    }
}

impl std::fmt::Display for PredictorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature-based rating of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub valence: f64,
    pub arousal: f64,
    pub confidence: f64,
}

/// Outcome of prescreening a raw clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prescreen {
    pub passed: bool,
    pub valence: f64,
    pub arousal: f64,
    /// Confidence magnitude used only for admission filtering.
    pub square_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub output: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrossValidationReport {
    pub score: f64,
}

/// Any failure to obtain a usable answer from the predictor.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("failed to launch predictor for {mode}: {source}")]
    Spawn {
        mode: PredictorMode,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for predictor {mode}: {source}")]
    Wait {
        mode: PredictorMode,
        #[source]
        source: std::io::Error,
    },

    #[error("predictor {mode} exited with {}: {stderr}", exit_code_text(.code))]
    NonZeroExit {
        mode: PredictorMode,
        code: Option<i32>,
        stderr: String,
    },

    #[error("predictor {mode} did not answer within {timeout:?}")]
    Timeout {
        mode: PredictorMode,
        timeout: Duration,
    },

    #[error("predictor {mode} produced malformed output: {reason}")]
    MalformedOutput { mode: PredictorMode, reason: String },

    #[error("predictor {mode} output is missing '{field}'")]
    MissingField {
        mode: PredictorMode,
        field: &'static str,
    },
}

impl PredictionError {
    /// Every predictor failure is reported to callers as the same kind.
    pub fn kind(&self) -> &'static str {
        "PredictionFailed"
    }
}

fn exit_code_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code (killed by signal)".to_string(),
    }
}
