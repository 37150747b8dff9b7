//! Secondary routing tier: rollout gate plus complexity analysis.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::complexity::{
    ComplexityAnalysis, ComplexityAnalyzer, ComplexitySignal, RouteTarget, SessionContext,
};
use crate::rollout::{GateVerdict, RolloutGate};

/// Where a session's message goes and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDecision {
    pub route_to: RouteTarget,
    pub gate: GateVerdict,
    /// Present only for enrolled sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ComplexityAnalysis>,
}

impl TierDecision {
    /// Backend-bound request for analysis that changes no holdings. Mixed
    /// requests ("buy 10 AAPL and then run a monte carlo") stay with the
    /// command path so the edit is not lost.
    pub fn wants_analysis(&self) -> bool {
        self.route_to == RouteTarget::Backend
            && self.analysis.as_ref().is_some_and(|a| {
                a.reasoning.has(ComplexitySignal::Calculation)
                    && !a.reasoning.has(ComplexitySignal::PortfolioMutation)
            })
    }
}

/// Sessions outside the rollout keep frontend-local handling; enrolled
/// sessions follow the analyzer's recommendation. Raising the rollout
/// percentage therefore only ever moves sessions towards the backend.
#[derive(Debug, Clone, Default)]
pub struct TierRouter {
    gate: RolloutGate,
    analyzer: ComplexityAnalyzer,
}

impl TierRouter {
    pub fn new(gate: RolloutGate) -> Self {
        Self {
            gate,
            analyzer: ComplexityAnalyzer::new(),
        }
    }

    pub fn gate(&self) -> &RolloutGate {
        &self.gate
    }

    pub fn route(
        &self,
        text: &str,
        session: &SessionContext,
        user_id: Option<&str>,
        guest_session_id: Option<&str>,
        force_flag: Option<bool>,
    ) -> TierDecision {
        let gate = self.gate.evaluate(user_id, guest_session_id, force_flag);
        if !gate.enrolled {
            return TierDecision {
                route_to: RouteTarget::Frontend,
                gate,
                analysis: None,
            };
        }

        let analysis = self.analyzer.analyze(text, session);
        debug!(summary = %analysis.summary(), "tier analysis");
        TierDecision {
            route_to: analysis.route_to,
            gate,
            analysis: Some(analysis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollout::{GateReason, RolloutConfig};

    #[test]
    fn test_not_enrolled_stays_on_frontend_without_analysis() {
        let router = TierRouter::new(RolloutGate::new(RolloutConfig::default()));
        let d = router.route(
            "calculate my Sharpe ratio",
            &SessionContext::default(),
            Some("u1"),
            None,
            None,
        );
        assert_eq!(d.route_to, RouteTarget::Frontend);
        assert_eq!(d.gate.reason, GateReason::Disabled);
        assert!(d.analysis.is_none());
    }

    #[test]
    fn test_enrolled_follows_analyzer() {
        let router = TierRouter::new(RolloutGate::new(RolloutConfig::at_percentage(100)));
        let d = router.route("hello", &SessionContext::default(), Some("u1"), None, None);
        assert_eq!(d.route_to, RouteTarget::Frontend);
        assert!(d.analysis.is_some());

        let d = router.route(
            "calculate my portfolio risk",
            &SessionContext::default(),
            Some("u1"),
            None,
            None,
        );
        assert_eq!(d.route_to, RouteTarget::Backend);
    }

    #[test]
    fn test_wants_analysis_only_for_read_only_calculations() {
        let router = TierRouter::new(RolloutGate::new(RolloutConfig::at_percentage(100)));
        let route = |text: &str| {
            router.route(text, &SessionContext::default(), Some("u1"), None, None)
        };
        assert!(route("calculate my Sharpe ratio").wants_analysis());
        assert!(!route("buy 10 AAPL").wants_analysis());
        assert!(!route("buy 10 AAPL and then run a monte carlo").wants_analysis());
        assert!(!route("hello").wants_analysis());

        let off = TierRouter::default();
        let d = off.route("calculate my Sharpe ratio", &SessionContext::default(), Some("u1"), None, None);
        assert!(!d.wants_analysis());
    }

    #[test]
    fn test_force_flag_enrolls() {
        let router = TierRouter::default();
        let d = router.route("hi", &SessionContext::default(), None, Some("g1"), Some(true));
        assert!(d.gate.enrolled);
        assert_eq!(d.route_to, RouteTarget::Frontend);
    }
}
