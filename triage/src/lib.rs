//! Query triage and command execution for a portfolio chat assistant.
//!
//! This library provides:
//! - A pattern extractor turning free text into structured portfolio commands
//! - Confidence-banded lane selection (regexp / hybrid / llm)
//! - A validated, at-most-one-effect command executor over pluggable stores
//! - A triage router producing one uniform result envelope per message
//! - A secondary frontend/backend tier gated by a deterministic rollout
//!
//! # Lanes
//!
//! | Lane   | When                                  | Handling                    |
//! |--------|---------------------------------------|-----------------------------|
//! | regexp | candidate confidence >= high (0.8)    | execute unattended          |
//! | hybrid | low (0.5) <= confidence < high        | execute, report what's missing |
//! | llm    | no candidate, or confidence < low     | escalate to language backend |
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use triage::{CommandExecutor, GuestStore, OfflineBackend, QueryContext, TriageRouter};
//!
//! let executor = CommandExecutor::new(file_store, Arc::new(GuestStore::new()));
//! let router = TriageRouter::new(executor, Arc::new(OfflineBackend));
//! let result = router
//!     .process_query("add 10 AAPL at $150", &QueryContext::guest("session-1"))
//!     .await;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod backend;
pub mod config;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod portfolio;
pub mod rollout;
pub mod router;

pub use backend::{
    BackendError, LanguageBackend, LlmResponse, OfflineBackend, PortfolioContext,
    PortfolioSummary, SharedLanguageBackend, TokenUsage,
};
pub use config::TriageConfig;
pub use error::{ErrorCode, ErrorReport, ExecutionError, FailureCategory, TriageError};
pub use executor::{CommandExecutor, ExecutionData, ExecutionResult, FieldChange};
pub use extractor::{Action, CommandCandidate, IntentMatcher, PatternExtractor};
pub use portfolio::{
    FileStore, GuestStore, Holding, Mutation, OwnerRef, Portfolio, PortfolioStore,
    SharedPortfolioStore, StoreError,
};
pub use rollout::{GateVerdict, RolloutConfig, RolloutGate};
pub use router::{
    ComplexityAnalysis, ComplexityAnalyzer, ProcessingMetadata, ProcessingResult,
    ProcessingType, QueryContext, RouteTarget, SessionContext, TierDecision, TierRouter,
    TriageDecision, TriageRouter, TriageThresholds,
};
