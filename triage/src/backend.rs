//! Generative-language backend capability.
//!
//! The router treats the backend as a black box: one `respond` call per
//! llm-routed message, no retries, no timeout of its own. Concrete HTTP
//! clients live in the agent crate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::portfolio::{OwnerRef, Portfolio};

/// Error type for backend calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Connection, DNS, TLS or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("backend returned no content")]
    Empty,

    #[error("malformed backend response: {0}")]
    Decode(String),

    #[error("backend not configured: {0}")]
    Config(String),
}

/// Token accounting reported by the backend, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// A backend reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    /// Which provider/model produced the reply, e.g. `anthropic:claude-x`.
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// One-line view of a portfolio handed to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub name: String,
    pub holdings: Vec<String>,
}

impl From<&Portfolio> for PortfolioSummary {
    fn from(p: &Portfolio) -> Self {
        Self {
            name: p.name.clone(),
            holdings: p.holdings.iter().map(|h| h.describe()).collect(),
        }
    }
}

/// Portfolio state the backend may reason over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioContext {
    pub owner: OwnerRef,
    pub portfolios: Vec<PortfolioSummary>,
}

impl PortfolioContext {
    pub fn new(owner: OwnerRef, portfolios: &[Portfolio]) -> Self {
        Self {
            owner,
            portfolios: portfolios.iter().map(PortfolioSummary::from).collect(),
        }
    }

    pub fn empty(owner: OwnerRef) -> Self {
        Self {
            owner,
            portfolios: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.portfolios.iter().all(|p| p.holdings.is_empty())
    }

    /// Plain-text rendering suitable for a system prompt.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "The user has no holdings yet.".to_string();
        }
        let mut out = String::new();
        for p in &self.portfolios {
            out.push_str(&format!("{}:\n", p.name));
            if p.holdings.is_empty() {
                out.push_str("  (empty)\n");
            }
            for h in &p.holdings {
                out.push_str(&format!("  - {}\n", h));
            }
        }
        out
    }
}

/// Consumed capability: answer a free-text question about a portfolio.
#[async_trait]
pub trait LanguageBackend: Send + Sync {
    async fn respond(
        &self,
        text: &str,
        context: &PortfolioContext,
    ) -> Result<LlmResponse, BackendError>;
}

pub type SharedLanguageBackend = Arc<dyn LanguageBackend>;

/// Backend used when no generative service is configured. Always answers
/// with a fixed note so the llm lane still returns a well-formed result.
#[derive(Debug, Clone, Default)]
pub struct OfflineBackend;

#[async_trait]
impl LanguageBackend for OfflineBackend {
    async fn respond(
        &self,
        _text: &str,
        context: &PortfolioContext,
    ) -> Result<LlmResponse, BackendError> {
        let total: usize = context.portfolios.iter().map(|p| p.holdings.len()).sum();
        Ok(LlmResponse {
            content: format!(
                "The assistant is offline. Structured commands such as \"add 10 AAPL at $150\" still work. You have {} holding(s) on record.",
                total
            ),
            provider: "offline".to_string(),
            usage: None,
        })
    }
}
