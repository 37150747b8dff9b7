//! Portfolio agent: wires the triage router to a file-backed user store, the
//! in-memory guest store and an HTTP language backend, and puts the
//! frontend/backend tier in front of it.
//!
//! Each message first goes through the tier. When an enrolled,
//! authenticated session asks for read-only analysis and an analysis
//! service is configured, the service answers. Everything else, including
//! a failed analysis call, is handled by the triage router.

pub mod analysis_client;
pub mod config;
pub mod llm_client;
pub mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use triage::{
    CommandExecutor, FileStore, GuestStore, OfflineBackend, ProcessingResult, QueryContext,
    RolloutGate, SessionContext, SharedLanguageBackend, TierDecision, TierRouter, TriageConfig,
    TriageRouter,
};

use analysis_client::{AnalysisClient, AnalysisKind, AnalysisReport};
use config::{AgentConfig, AnalysisConfig, LlmConfig};
use llm_client::HttpLanguageBackend;

/// HTTP backend when a URL is configured, otherwise the offline backend.
pub fn build_backend(config: &LlmConfig) -> Result<SharedLanguageBackend> {
    if config.url.is_none() {
        info!("No language backend configured, using offline backend");
        return Ok(Arc::new(OfflineBackend));
    }
    let backend =
        HttpLanguageBackend::from_config(config).context("Failed to build language backend")?;
    info!(format = ?backend.format(), model = %config.model, "Language backend ready");
    Ok(Arc::new(backend))
}

/// Analysis client when a URL is configured.
pub fn build_analysis(config: &AnalysisConfig) -> Result<Option<AnalysisClient>> {
    if config.url.is_none() {
        return Ok(None);
    }
    let client =
        AnalysisClient::from_config(config).context("Failed to build analysis client")?;
    info!(url = %client.base_url(), "Analysis service ready");
    Ok(Some(client))
}

pub async fn build_router(config: &AgentConfig, triage: &TriageConfig) -> Result<TriageRouter> {
    let store = FileStore::open(&config.store_dir)
        .await
        .with_context(|| format!("Failed to open store at {}", config.store_dir.display()))?;
    let executor = CommandExecutor::new(store.shared(), Arc::new(GuestStore::new()));
    let backend = build_backend(&config.llm)?;
    Ok(TriageRouter::new(executor, backend).with_thresholds(triage.thresholds))
}

/// Outcome of one `ask`: the tier decision plus whichever handler answered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskOutcome {
    pub tier: TierDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisReport>,
}

pub struct Agent {
    router: TriageRouter,
    tier: TierRouter,
    analysis: Option<AnalysisClient>,
}

impl Agent {
    pub async fn build(config: &AgentConfig, triage: &TriageConfig) -> Result<Self> {
        info!(rollout = %triage.rollout, "Building agent");
        Ok(Self {
            router: build_router(config, triage).await?,
            tier: TierRouter::new(RolloutGate::new(triage.rollout.clone())),
            analysis: build_analysis(&config.analysis)?,
        })
    }

    pub fn router(&self) -> &TriageRouter {
        &self.router
    }

    pub async fn ask(&self, text: &str, ctx: &QueryContext, message_count: u32) -> AskOutcome {
        let session = SessionContext {
            is_guest_mode: ctx.is_guest_mode,
            message_count,
        };
        let tier = self.tier.route(
            text,
            &session,
            ctx.user_id.as_deref(),
            ctx.guest_session_id.as_deref(),
            None,
        );

        if tier.wants_analysis() {
            if let (Some(client), Some(user)) = (&self.analysis, ctx.user_id.as_deref()) {
                let kind = AnalysisKind::for_text(text);
                match client.run(kind, user).await {
                    Ok(report) => {
                        info!(%kind, "Answered by analysis service");
                        return AskOutcome {
                            tier,
                            result: None,
                            analysis: Some(report),
                        };
                    }
                    Err(e) => warn!(%kind, error = %e, "Analysis service failed, using triage"),
                }
            }
        }

        let result = self.router.process_query(text, ctx).await;
        AskOutcome {
            tier,
            result: Some(result),
            analysis: None,
        }
    }
}
