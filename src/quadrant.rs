//! Valence/arousal quadrant classification.
//!
//! Both axes are split at the scale midpoint. A score sitting exactly on the
//! midpoint counts as "high".

use serde::{Deserialize, Serialize};

/// Midpoint of the 0-10 rating scale on both axes.
pub const MIDPOINT: f64 = 5.0;

/// One of the four affective quadrants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuadrantLabel {
    Hahv,
    Halv,
    Lahv,
    Lalv,
}

impl QuadrantLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuadrantLabel::Hahv => "HAHV",
            QuadrantLabel::Halv => "HALV",
            QuadrantLabel::Lahv => "LAHV",
            QuadrantLabel::Lalv => "LALV",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HAHV" => Some(QuadrantLabel::Hahv),
            "HALV" => Some(QuadrantLabel::Halv),
            "LAHV" => Some(QuadrantLabel::Lahv),
            "LALV" => Some(QuadrantLabel::Lalv),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuadrantLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a (valence, arousal) pair to its quadrant label.
///
/// The mapping follows the library's labelling convention:
/// high valence with high arousal is `HAHV`, high valence with low arousal is
/// `HALV`, low valence with high arousal is `LAHV`, and everything else is
/// `LALV`. NaN compares false against the midpoint and therefore lands on
/// the low side of that axis.
pub fn classify(valence: f64, arousal: f64) -> QuadrantLabel {
    let high_valence = valence >= MIDPOINT;
    let high_arousal = arousal >= MIDPOINT;
    match (high_valence, high_arousal) {
        (true, true) => QuadrantLabel::Hahv,
        (true, false) => QuadrantLabel::Halv,
        (false, true) => QuadrantLabel::Lahv,
        (false, false) => QuadrantLabel::Lalv,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_quadrant() {
        assert_eq!(classify(7.5, 7.5), QuadrantLabel::Hahv);
        assert_eq!(classify(7.5, 2.5), QuadrantLabel::Halv);
        assert_eq!(classify(2.5, 7.5), QuadrantLabel::Lahv);
        assert_eq!(classify(2.5, 2.5), QuadrantLabel::Lalv);
    }

    #[test]
    fn test_midpoint_ties_resolve_high() {
        assert_eq!(classify(5.0, 5.0), QuadrantLabel::Hahv);
        assert_eq!(classify(5.0, 4.99), QuadrantLabel::Halv);
        assert_eq!(classify(4.99, 5.0), QuadrantLabel::Lahv);
        assert_eq!(classify(4.99, 4.99), QuadrantLabel::Lalv);
    }

    #[test]
    fn test_out_of_range_scores_are_still_classified() {
        assert_eq!(classify(-3.0, 42.0), QuadrantLabel::Lahv);
        assert_eq!(classify(f64::INFINITY, f64::NEG_INFINITY), QuadrantLabel::Halv);
    }

    #[test]
    fn test_label_string_round_trip() {
        for label in [
            QuadrantLabel::Hahv,
            QuadrantLabel::Halv,
            QuadrantLabel::Lahv,
            QuadrantLabel::Lalv,
        ] {
            assert_eq!(QuadrantLabel::parse(label.as_str()), Some(label));
        }
        assert_eq!(QuadrantLabel::parse("hahv"), None);
    }

    #[test]
    fn test_label_serializes_uppercase() {
        let json = serde_json::to_string(&QuadrantLabel::Halv).unwrap();
        assert_eq!(json, "\"HALV\"");
    }
}
