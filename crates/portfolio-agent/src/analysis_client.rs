//! Client for the portfolio analysis service.
//!
//! The service computes risk metrics, Sharpe ratios and market-data
//! summaries from a user's persisted holdings. Backend-tier messages that ask
//! for analysis are dispatched here. Guests have no server-side holdings, so
//! only authenticated users are ever sent.
//!
//! | Kind | Endpoint |
//! |---|---|
//! | risk | `POST /portfolio/risk` |
//! | sharpe | `POST /portfolio/sharpe` |
//! | market data | `POST /portfolio/market-data` |

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;

/// Look-back window for market data when the message names none.
pub const DEFAULT_PERIOD: &str = "1mo";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("analysis service not configured: {0}")]
    Config(String),

    #[error("analysis service unreachable: {0}")]
    Transport(String),

    /// Non-success status; `detail` is the service's error detail when it
    /// sent one, the raw body otherwise.
    #[error("analysis service returned {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("unreadable analysis response: {0}")]
    Decode(String),
}

/// Which analysis a message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Risk,
    Sharpe,
    MarketData,
}

impl AnalysisKind {
    /// Pick the endpoint from the message wording; risk is the catch-all.
    pub fn for_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("sharpe") {
            Self::Sharpe
        } else if ["market data", "price", "quote", "ticker data"]
            .iter()
            .any(|t| lower.contains(t))
        {
            Self::MarketData
        } else {
            Self::Risk
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Risk => "/portfolio/risk",
            Self::Sharpe => "/portfolio/sharpe",
            Self::MarketData => "/portfolio/market-data",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Risk => write!(f, "risk"),
            Self::Sharpe => write!(f, "sharpe"),
            Self::MarketData => write!(f, "market_data"),
        }
    }
}

/// Per-portfolio entry: metrics, or the reason they could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortfolioOutcome<T> {
    Computed(T),
    Failed { error: String },
}

/// Percentages are already scaled by 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub portfolio_name: String,
    pub total_value: f64,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe_ratio: f64,
    pub var_95_daily: f64,
    pub var_95_annual: f64,
    pub max_drawdown: f64,
    pub num_assets: u32,
    pub risk_free_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub user_id: String,
    pub analysis_date: String,
    /// Keyed by portfolio id.
    pub results: BTreeMap<String, PortfolioOutcome<RiskMetrics>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpeMetrics {
    pub portfolio_name: String,
    pub sharpe_ratio: f64,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub risk_free_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpeReport {
    pub user_id: String,
    pub analysis_date: String,
    pub sharpe_analysis: BTreeMap<String, PortfolioOutcome<SharpeMetrics>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMarketData {
    pub current_price: f64,
    pub period_return: f64,
    pub volatility: f64,
    pub data_points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataReport {
    pub user_id: String,
    pub period: String,
    pub symbols_analyzed: u32,
    pub market_data: BTreeMap<String, SymbolMarketData>,
    pub analysis_date: String,
}

/// Any of the service's reports, tagged with the analysis that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "report", rename_all = "snake_case")]
pub enum AnalysisReport {
    Risk(RiskReport),
    Sharpe(SharpeReport),
    MarketData(MarketDataReport),
}

impl AnalysisReport {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            Self::Risk(_) => AnalysisKind::Risk,
            Self::Sharpe(_) => AnalysisKind::Sharpe,
            Self::MarketData(_) => AnalysisKind::MarketData,
        }
    }
}

#[derive(Serialize)]
struct UserRequest<'a> {
    user_id: &'a str,
}

#[derive(Serialize)]
struct SharpeRequest<'a> {
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    portfolio_id: Option<&'a str>,
}

#[derive(Serialize)]
struct MarketDataRequest<'a> {
    user_id: &'a str,
    period: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

pub struct AnalysisClient {
    client: Client,
    base_url: String,
}

impl AnalysisClient {
    /// Build from config. Fails when no URL is configured.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let base_url = config
            .url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .ok_or_else(|| AnalysisError::Config("no analysis URL configured".into()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::Config(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn risk(&self, user_id: &str) -> Result<RiskReport, AnalysisError> {
        self.post(AnalysisKind::Risk, &UserRequest { user_id }).await
    }

    pub async fn sharpe(
        &self,
        user_id: &str,
        portfolio_id: Option<&str>,
    ) -> Result<SharpeReport, AnalysisError> {
        self.post(
            AnalysisKind::Sharpe,
            &SharpeRequest {
                user_id,
                portfolio_id,
            },
        )
        .await
    }

    pub async fn market_data(
        &self,
        user_id: &str,
        period: &str,
    ) -> Result<MarketDataReport, AnalysisError> {
        self.post(AnalysisKind::MarketData, &MarketDataRequest { user_id, period })
            .await
    }

    /// Run the analysis of `kind` over every portfolio of `user_id`.
    pub async fn run(
        &self,
        kind: AnalysisKind,
        user_id: &str,
    ) -> Result<AnalysisReport, AnalysisError> {
        Ok(match kind {
            AnalysisKind::Risk => AnalysisReport::Risk(self.risk(user_id).await?),
            AnalysisKind::Sharpe => AnalysisReport::Sharpe(self.sharpe(user_id, None).await?),
            AnalysisKind::MarketData => {
                AnalysisReport::MarketData(self.market_data(user_id, DEFAULT_PERIOD).await?)
            }
        })
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        kind: AnalysisKind,
        body: &B,
    ) -> Result<T, AnalysisError> {
        let url = format!("{}{}", self.base_url, kind.path());
        debug!(%kind, %url, "calling analysis service");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        if !status.is_success() {
            warn!(%kind, status = status.as_u16(), "analysis service returned an error status");
            let detail = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.detail)
                .unwrap_or(text);
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                detail,
            });
        }
        serde_json::from_str(&text).map_err(|e| AnalysisError::Decode(e.to_string()))
    }
}
