//! Processing lanes and the confidence bands that select them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::extractor::CommandCandidate;

/// At or above this a candidate is executed unattended.
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Below this a candidate is ignored and the message escalated.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Confidence reported when no candidate was found.
pub const NO_MATCH_CONFIDENCE: f64 = 0.1;

/// How a message is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingType {
    /// Deterministic execution of the extracted command.
    Regexp,
    /// A candidate exists but is too weak for unattended execution.
    Hybrid,
    /// Escalated to the generative-language backend.
    Llm,
}

impl fmt::Display for ProcessingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regexp => write!(f, "regexp"),
            Self::Hybrid => write!(f, "hybrid"),
            Self::Llm => write!(f, "llm"),
        }
    }
}

/// Confidence cut-offs. `low <= high` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriageThresholds {
    pub high: f64,
    pub low: f64,
}

impl Default for TriageThresholds {
    fn default() -> Self {
        Self {
            high: HIGH_CONFIDENCE_THRESHOLD,
            low: LOW_CONFIDENCE_THRESHOLD,
        }
    }
}

impl TriageThresholds {
    /// Both values are clamped to `[0, 1]` and `low` is lowered to `high`
    /// when it exceeds it.
    pub fn new(high: f64, low: f64) -> Self {
        let high = clamp_unit(high, HIGH_CONFIDENCE_THRESHOLD);
        let low = clamp_unit(low, LOW_CONFIDENCE_THRESHOLD).min(high);
        Self { high, low }
    }

    pub fn lane_for(&self, confidence: f64) -> ProcessingType {
        if confidence >= self.high {
            ProcessingType::Regexp
        } else if confidence >= self.low {
            ProcessingType::Hybrid
        } else {
            ProcessingType::Llm
        }
    }
}

fn clamp_unit(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Routing verdict for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageDecision {
    pub processing_type: ProcessingType,
    pub is_candidate_match: bool,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CommandCandidate>,
}

impl TriageDecision {
    pub fn decide(candidate: Option<CommandCandidate>, thresholds: &TriageThresholds) -> Self {
        match candidate {
            Some(c) => {
                let processing_type = thresholds.lane_for(c.confidence);
                Self {
                    processing_type,
                    is_candidate_match: true,
                    confidence: c.confidence,
                    // A candidate below the low band is not acted on.
                    candidate: (processing_type != ProcessingType::Llm).then_some(c),
                }
            }
            None => Self {
                processing_type: ProcessingType::Llm,
                is_candidate_match: false,
                confidence: NO_MATCH_CONFIDENCE,
                candidate: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Action;

    fn candidate(confidence: f64) -> CommandCandidate {
        let mut c = CommandCandidate::new(Action::Add, "AAPL");
        c.confidence = confidence;
        c
    }

    #[test]
    fn test_bands() {
        let t = TriageThresholds::default();
        assert_eq!(t.lane_for(0.95), ProcessingType::Regexp);
        assert_eq!(t.lane_for(0.8), ProcessingType::Regexp);
        assert_eq!(t.lane_for(0.79), ProcessingType::Hybrid);
        assert_eq!(t.lane_for(0.5), ProcessingType::Hybrid);
        assert_eq!(t.lane_for(0.49), ProcessingType::Llm);
    }

    #[test]
    fn test_no_candidate_is_llm() {
        let d = TriageDecision::decide(None, &TriageThresholds::default());
        assert_eq!(d.processing_type, ProcessingType::Llm);
        assert!(!d.is_candidate_match);
        assert_eq!(d.confidence, NO_MATCH_CONFIDENCE);
    }

    #[test]
    fn test_weak_candidate_dropped() {
        let d = TriageDecision::decide(Some(candidate(0.45)), &TriageThresholds::default());
        assert_eq!(d.processing_type, ProcessingType::Llm);
        assert!(d.is_candidate_match);
        assert_eq!(d.confidence, 0.45);
        assert!(d.candidate.is_none());
    }

    #[test]
    fn test_hybrid_keeps_candidate() {
        let d = TriageDecision::decide(Some(candidate(0.6)), &TriageThresholds::default());
        assert_eq!(d.processing_type, ProcessingType::Hybrid);
        assert!(d.candidate.is_some());
    }

    #[test]
    fn test_thresholds_normalized() {
        let t = TriageThresholds::new(0.7, 0.9);
        assert_eq!(t.high, 0.7);
        assert_eq!(t.low, 0.7);
        let t = TriageThresholds::new(1.5, f64::NAN);
        assert_eq!(t.high, 1.0);
        assert_eq!(t.low, LOW_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_decision_serializes_camel_case() {
        let d = TriageDecision::decide(None, &TriageThresholds::default());
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["processingType"], "llm");
        assert_eq!(json["isCandidateMatch"], false);
    }
}
