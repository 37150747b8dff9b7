//! Triage router: the single entry point the chat UI calls.
//!
//! One call classifies the message, picks a lane, then either executes the
//! extracted command or escalates to the language backend. Every path
//! returns a well-formed [`ProcessingResult`]; nothing here panics, retries
//! or times out on its own.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::lane::{ProcessingType, TriageDecision, TriageThresholds};
use crate::backend::SharedLanguageBackend;
use crate::error::{ErrorReport, TriageError};
use crate::executor::{resolve_owner, CommandExecutor};
use crate::extractor::PatternExtractor;
use crate::portfolio::OwnerRef;

/// Content shown when the backend fails.
pub const BACKEND_RETRY_MESSAGE: &str =
    "The assistant is temporarily unavailable. Please try again in a moment.";

/// Who is asking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryContext {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub guest_session_id: Option<String>,
    #[serde(default)]
    pub is_guest_mode: bool,
}

impl QueryContext {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            user_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn guest(session: impl Into<String>) -> Self {
        Self {
            guest_session_id: Some(session.into()),
            is_guest_mode: true,
            ..Default::default()
        }
    }

    pub fn owner(&self) -> Option<OwnerRef> {
        resolve_owner(
            self.user_id.as_deref(),
            self.guest_session_id.as_deref(),
            self.is_guest_mode,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMetadata {
    pub portfolio_modified: bool,
    pub assets_affected: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_operations: Option<u32>,
    /// Backend provider, for escalated messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Uniform envelope returned for every message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub success: bool,
    pub processing_type: ProcessingType,
    pub content: String,
    /// Triage confidence, never recomputed from the outcome.
    pub confidence: f64,
    /// End-to-end wall-clock time of the call.
    pub execution_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ProcessingMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

pub struct TriageRouter {
    extractor: PatternExtractor,
    thresholds: TriageThresholds,
    executor: CommandExecutor,
    backend: SharedLanguageBackend,
}

impl TriageRouter {
    pub fn new(executor: CommandExecutor, backend: SharedLanguageBackend) -> Self {
        Self {
            extractor: PatternExtractor::new(),
            thresholds: TriageThresholds::default(),
            executor,
            backend,
        }
    }

    pub fn with_thresholds(mut self, thresholds: TriageThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_extractor(mut self, extractor: PatternExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn thresholds(&self) -> &TriageThresholds {
        &self.thresholds
    }

    /// Classification only: no state, no backend.
    pub fn classify(&self, text: &str) -> TriageDecision {
        TriageDecision::decide(self.extractor.classify(text), &self.thresholds)
    }

    pub async fn process_query(&self, text: &str, ctx: &QueryContext) -> ProcessingResult {
        let start = Instant::now();
        let decision = self.classify(text);
        debug!(
            lane = %decision.processing_type,
            confidence = decision.confidence,
            matched = decision.is_candidate_match,
            "triage decision"
        );

        let mut result = match ctx.owner() {
            None => failure(&decision, TriageError::AuthenticationRequired, None),
            Some(owner) => match (&decision.processing_type, &decision.candidate) {
                (ProcessingType::Regexp | ProcessingType::Hybrid, Some(candidate)) => {
                    let exec = self
                        .executor
                        .execute(
                            candidate,
                            ctx.user_id.as_deref(),
                            ctx.guest_session_id.as_deref(),
                            ctx.is_guest_mode,
                        )
                        .await;
                    let portfolio_modified = exec.modified_state();
                    ProcessingResult {
                        success: exec.success,
                        processing_type: decision.processing_type,
                        content: exec.message,
                        confidence: decision.confidence,
                        execution_time_ms: 0.0,
                        metadata: Some(ProcessingMetadata {
                            portfolio_modified,
                            assets_affected: if exec.success {
                                vec![candidate.symbol.clone()]
                            } else {
                                Vec::new()
                            },
                            db_operations: Some(exec.db_operations),
                            provider: None,
                        }),
                        error: exec.error,
                    }
                }
                _ => self.escalate(text, &owner, &decision).await,
            },
        };

        result.execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            lane = %result.processing_type,
            confidence = result.confidence,
            success = result.success,
            elapsed_ms = result.execution_time_ms,
            "query processed"
        );
        result
    }

    async fn escalate(
        &self,
        text: &str,
        owner: &OwnerRef,
        decision: &TriageDecision,
    ) -> ProcessingResult {
        let (context, ops) = self.executor.portfolio_context(owner).await;
        match self.backend.respond(text, &context).await {
            Ok(response) => ProcessingResult {
                success: true,
                processing_type: ProcessingType::Llm,
                content: response.content,
                confidence: decision.confidence,
                execution_time_ms: 0.0,
                metadata: Some(ProcessingMetadata {
                    portfolio_modified: false,
                    assets_affected: Vec::new(),
                    db_operations: Some(ops),
                    provider: Some(response.provider),
                }),
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "language backend failed");
                let mut result = failure(decision, TriageError::Backend(e), Some(ops));
                result.processing_type = ProcessingType::Llm;
                result.content = BACKEND_RETRY_MESSAGE.to_string();
                result
            }
        }
    }
}

fn failure(decision: &TriageDecision, err: TriageError, ops: Option<u32>) -> ProcessingResult {
    ProcessingResult {
        success: false,
        processing_type: decision.processing_type,
        content: err.to_string(),
        confidence: decision.confidence,
        execution_time_ms: 0.0,
        metadata: Some(ProcessingMetadata {
            db_operations: ops,
            ..Default::default()
        }),
        error: Some(err.report()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineBackend;
    use crate::error::ErrorCode;
    use crate::portfolio::GuestStore;
    use std::sync::Arc;

    fn router() -> TriageRouter {
        let executor =
            CommandExecutor::new(Arc::new(GuestStore::new()), Arc::new(GuestStore::new()));
        TriageRouter::new(executor, Arc::new(OfflineBackend))
    }

    #[tokio::test]
    async fn test_missing_identity_fails_fast() {
        let r = router()
            .process_query("add 10 AAPL", &QueryContext::default())
            .await;
        assert!(!r.success);
        assert_eq!(r.error.unwrap().code, ErrorCode::AuthenticationRequired);
    }

    #[tokio::test]
    async fn test_regexp_lane_executes() {
        let r = router()
            .process_query("add 10 AAPL at $150", &QueryContext::guest("g1"))
            .await;
        assert!(r.success, "{}", r.content);
        assert_eq!(r.processing_type, ProcessingType::Regexp);
        let meta = r.metadata.unwrap();
        assert!(meta.portfolio_modified);
        assert_eq!(meta.assets_affected, vec!["AAPL".to_string()]);
    }

    #[tokio::test]
    async fn test_llm_lane_uses_backend() {
        let r = router()
            .process_query("tell me about index funds", &QueryContext::user("u1"))
            .await;
        assert!(r.success);
        assert_eq!(r.processing_type, ProcessingType::Llm);
        assert_eq!(r.metadata.unwrap().provider.as_deref(), Some("offline"));
    }

    #[test]
    fn test_query_context_owner() {
        assert_eq!(
            QueryContext::guest("g1").owner(),
            Some(OwnerRef::Guest("g1".into()))
        );
        assert_eq!(QueryContext::default().owner(), None);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let r = ProcessingResult {
            success: true,
            processing_type: ProcessingType::Hybrid,
            content: "x".into(),
            confidence: 0.6,
            execution_time_ms: 1.5,
            metadata: Some(ProcessingMetadata::default()),
            error: None,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["processingType"], "hybrid");
        assert_eq!(json["executionTimeMs"], 1.5);
        assert_eq!(json["metadata"]["portfolioModified"], false);
    }
}
