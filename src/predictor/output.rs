//! Parsing of the predictor's line-oriented stdout.
//!
//! Key/value modes print one `Key: value` pair per line. Keys are matched
//! case-insensitively after trimming; keys we do not know are ignored.

use super::models::{
    CrossValidationReport, Prediction, PredictionError, PredictorMode, Prescreen,
};
use std::collections::HashMap;

const KEY_PASSED: &str = "passed screening";
const KEY_VALENCE: &str = "valence";
const KEY_AROUSAL: &str = "arousal";
const KEY_SQUARE_SUM: &str = "square sum";
const KEY_CONFIDENCE: &str = "confidence";

struct KeyValues {
    mode: PredictorMode,
    values: HashMap<String, String>,
}

impl KeyValues {
    fn parse(mode: PredictorMode, lines: &[String]) -> Result<Self, PredictionError> {
        let mut values = HashMap::new();
        for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            let (key, value) = line.split_once(':').ok_or_else(|| {
                PredictionError::MalformedOutput {
                    mode,
                    reason: format!("expected 'key: value', got '{}'", line),
                }
            })?;
            let key = key.trim().to_ascii_lowercase();
            if values.insert(key.clone(), value.trim().to_string()).is_some() {
                return Err(PredictionError::MalformedOutput {
                    mode,
                    reason: format!("duplicate key '{}'", key),
                });
            }
        }
        Ok(Self { mode, values })
    }

    fn raw(&self, field: &'static str) -> Result<&str, PredictionError> {
        self.values
            .get(field)
            .map(String::as_str)
            .ok_or(PredictionError::MissingField {
                mode: self.mode,
                field,
            })
    }

    fn number(&self, field: &'static str) -> Result<f64, PredictionError> {
        parse_finite(self.mode, field, self.raw(field)?)
    }

    fn flag(&self, field: &'static str) -> Result<bool, PredictionError> {
        let raw = self.raw(field)?;
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(PredictionError::MalformedOutput {
                mode: self.mode,
                reason: format!("'{}' is not a boolean: '{}'", field, raw),
            }),
        }
    }
}

fn parse_finite(mode: PredictorMode, field: &str, raw: &str) -> Result<f64, PredictionError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(PredictionError::MalformedOutput {
            mode,
            reason: format!("'{}' is not a finite number: '{}'", field, raw),
        }),
    }
}

pub fn parse_prescreen(lines: &[String]) -> Result<Prescreen, PredictionError> {
    let kv = KeyValues::parse(PredictorMode::Predict, lines)?;
    Ok(Prescreen {
        passed: kv.flag(KEY_PASSED)?,
        valence: kv.number(KEY_VALENCE)?,
        arousal: kv.number(KEY_AROUSAL)?,
        square_sum: kv.number(KEY_SQUARE_SUM)?,
    })
}

pub fn parse_prediction(lines: &[String]) -> Result<Prediction, PredictionError> {
    let kv = KeyValues::parse(PredictorMode::Evaluate, lines)?;
    Ok(Prediction {
        valence: kv.number(KEY_VALENCE)?,
        arousal: kv.number(KEY_AROUSAL)?,
        confidence: kv.number(KEY_CONFIDENCE)?,
    })
}

/// Cross-validation prints exactly one numeric line.
pub fn parse_cross_validation(lines: &[String]) -> Result<CrossValidationReport, PredictionError> {
    let mode = PredictorMode::CrossValidate;
    let mut non_empty = lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty());
    let line = non_empty.next().ok_or(PredictionError::MissingField {
        mode,
        field: "score",
    })?;
    if non_empty.next().is_some() {
        return Err(PredictionError::MalformedOutput {
            mode,
            reason: "expected a single numeric line".to_string(),
        });
    }
    Ok(CrossValidationReport {
        score: parse_finite(mode, "score", line)?,
    })
}
