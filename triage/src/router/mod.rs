//! Routing: lane selection, the triage entry point, and the secondary
//! frontend/backend tier.

pub mod complexity;
pub mod lane;
pub mod tier;
pub mod triage;

pub use complexity::{
    ComplexityAnalysis, ComplexityAnalyzer, ComplexitySignal, RouteTarget, RoutingReasoning,
    SessionContext,
};
pub use lane::{
    ProcessingType, TriageDecision, TriageThresholds, HIGH_CONFIDENCE_THRESHOLD,
    LOW_CONFIDENCE_THRESHOLD, NO_MATCH_CONFIDENCE,
};
pub use tier::{TierDecision, TierRouter};
pub use triage::{
    ProcessingMetadata, ProcessingResult, QueryContext, TriageRouter, BACKEND_RETRY_MESSAGE,
};
