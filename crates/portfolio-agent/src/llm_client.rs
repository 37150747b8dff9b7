//! HTTP language backend.
//!
//! Speaks both the Anthropic messages format and the OpenAI-compatible chat
//! completions format; which one is picked from the endpoint URL. One request
//! per call, no retries. The portfolio context goes into the system prompt.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use triage::{BackendError, LanguageBackend, LlmResponse, PortfolioContext, TokenUsage};

use crate::config::LlmConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

const SYSTEM_PREAMBLE: &str = "You are a portfolio assistant. Answer questions about the user's \
investments clearly and briefly. You cannot change holdings yourself; tell the user to phrase \
changes as commands such as \"add 10 AAPL at $150\".";

/// Wire format spoken by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    OpenAi,
}

impl ApiFormat {
    pub fn detect(url: &str) -> Self {
        if url.contains("anthropic.com") || url.trim_end_matches('/').ends_with("/messages") {
            Self::Anthropic
        } else {
            Self::OpenAi
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

pub struct HttpLanguageBackend {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    format: ApiFormat,
}

impl HttpLanguageBackend {
    /// Build from config. Fails when no URL is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Self, BackendError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| BackendError::Config("no backend URL configured".into()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;
        Ok(Self {
            client,
            format: ApiFormat::detect(&url),
            url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    pub fn format(&self) -> ApiFormat {
        self.format
    }

    fn provider(&self) -> String {
        format!("{}:{}", self.format.label(), self.model)
    }

    async fn post<T: Serialize>(&self, body: &T) -> Result<String, BackendError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(body);
        request = match (self.format, &self.api_key) {
            (ApiFormat::Anthropic, Some(key)) => request
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            (ApiFormat::Anthropic, None) => {
                request.header("anthropic-version", ANTHROPIC_VERSION)
            }
            (ApiFormat::OpenAi, Some(key)) => request.bearer_auth(key),
            (ApiFormat::OpenAi, None) => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "language backend returned an error status");
            return Err(BackendError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl LanguageBackend for HttpLanguageBackend {
    async fn respond(
        &self,
        text: &str,
        context: &PortfolioContext,
    ) -> Result<LlmResponse, BackendError> {
        let system = system_prompt(context);
        debug!(format = ?self.format, model = %self.model, "calling language backend");
        let provider = self.provider();
        match self.format {
            ApiFormat::Anthropic => {
                let body = AnthropicRequest {
                    model: &self.model,
                    max_tokens: self.max_tokens,
                    system: &system,
                    messages: vec![Message {
                        role: "user",
                        content: text,
                    }],
                };
                parse_anthropic(&self.post(&body).await?, provider)
            }
            ApiFormat::OpenAi => {
                let body = OpenAiRequest {
                    model: &self.model,
                    max_tokens: self.max_tokens,
                    messages: vec![
                        Message {
                            role: "system",
                            content: &system,
                        },
                        Message {
                            role: "user",
                            content: text,
                        },
                    ],
                };
                parse_openai(&self.post(&body).await?, provider)
            }
        }
    }
}

pub fn system_prompt(context: &PortfolioContext) -> String {
    format!(
        "{}\n\nCurrent portfolio state:\n{}",
        SYSTEM_PREAMBLE,
        context.summary()
    )
}

fn parse_anthropic(body: &str, provider: String) -> Result<LlmResponse, BackendError> {
    let parsed: AnthropicResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))?;
    let content: String = parsed
        .content
        .iter()
        .filter(|b| b.kind == "text")
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("");
    if content.trim().is_empty() {
        return Err(BackendError::Empty);
    }
    Ok(LlmResponse {
        content,
        provider,
        usage: parsed.usage.map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        }),
    })
}

fn parse_openai(body: &str, provider: String) -> Result<LlmResponse, BackendError> {
    let parsed: OpenAiResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(BackendError::Empty)?;
    Ok(LlmResponse {
        content,
        provider,
        usage: parsed.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
    })
}

// Anthropic messages format
#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// OpenAI-compatible chat completions
#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}
