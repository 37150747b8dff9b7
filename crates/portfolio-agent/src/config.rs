//! Agent configuration: optional TOML file, then environment overrides.
//!
//! | Variable | Overrides |
//! |---|---|
//! | `PORTFOLIO_LLM_URL` | `llm.url` |
//! | `PORTFOLIO_LLM_API_KEY` | `llm.api_key` |
//! | `PORTFOLIO_LLM_MODEL` | `llm.model` |
//! | `PORTFOLIO_ANALYSIS_URL` | `analysis.url` |
//! | `PORTFOLIO_STORE_DIR` | `store_dir` |
//! | `PORTFOLIO_TELEMETRY_PATH` | `telemetry_path` |
//!
//! Triage thresholds and rollout flags are read separately through
//! [`triage::TriageConfig::from_env`].

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const ENV_LLM_URL: &str = "PORTFOLIO_LLM_URL";
pub const ENV_LLM_API_KEY: &str = "PORTFOLIO_LLM_API_KEY";
pub const ENV_LLM_MODEL: &str = "PORTFOLIO_LLM_MODEL";
pub const ENV_ANALYSIS_URL: &str = "PORTFOLIO_ANALYSIS_URL";
pub const ENV_STORE_DIR: &str = "PORTFOLIO_STORE_DIR";
pub const ENV_TELEMETRY_PATH: &str = "PORTFOLIO_TELEMETRY_PATH";

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_STORE_DIR: &str = ".portfolio";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Generative backend endpoint. No URL means the offline backend is used.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Portfolio analysis service (risk, Sharpe, market data). Backend-tier
/// analysis requests are answered locally when no URL is set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Base URL, e.g. `http://localhost:8000`.
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
    /// Directory for authenticated users' portfolio documents.
    pub store_dir: PathBuf,
    /// JSONL decision log; disabled when unset.
    pub telemetry_path: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            analysis: AnalysisConfig::default(),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            telemetry_path: None,
        }
    }
}

impl AgentConfig {
    /// Load `path` (if given) and apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_LLM_URL) {
            self.llm.url = Some(url);
        }
        if let Some(key) = get(ENV_LLM_API_KEY) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = get(ENV_LLM_MODEL) {
            self.llm.model = model;
        }
        if let Some(url) = get(ENV_ANALYSIS_URL) {
            self.analysis.url = Some(url);
        }
        if let Some(dir) = get(ENV_STORE_DIR) {
            self.store_dir = PathBuf::from(dir);
        }
        if let Some(path) = get(ENV_TELEMETRY_PATH) {
            self.telemetry_path = Some(PathBuf::from(path));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let cfg = AgentConfig::load_with(None, no_env).unwrap();
        assert_eq!(cfg, AgentConfig::default());
        assert!(cfg.llm.url.is_none());
        assert_eq!(cfg.llm.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(
            &path,
            "store_dir = \"/var/lib/portfolio\"\n\n[llm]\nurl = \"https://api.anthropic.com/v1/messages\"\n",
        )
        .unwrap();

        let cfg = AgentConfig::load_with(Some(&path), no_env).unwrap();
        assert_eq!(cfg.store_dir, PathBuf::from("/var/lib/portfolio"));
        assert_eq!(
            cfg.llm.url.as_deref(),
            Some("https://api.anthropic.com/v1/messages")
        );
        assert_eq!(cfg.llm.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(cfg.telemetry_path.is_none());
        assert!(cfg.analysis.url.is_none());
    }

    #[test]
    fn test_analysis_section_and_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(
            &path,
            "[analysis]\nurl = \"http://analysis.internal:8000\"\ntimeout_secs = 5\n",
        )
        .unwrap();

        let cfg = AgentConfig::load_with(Some(&path), no_env).unwrap();
        assert_eq!(cfg.analysis.url.as_deref(), Some("http://analysis.internal:8000"));
        assert_eq!(cfg.analysis.timeout_secs, 5);

        let cfg = AgentConfig::load_with(Some(&path), |key| {
            (key == ENV_ANALYSIS_URL).then(|| "http://localhost:9000".to_string())
        })
        .unwrap();
        assert_eq!(cfg.analysis.url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(cfg.analysis.timeout_secs, 5);
    }

    #[test]
    fn test_env_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, "[llm]\nmodel = \"from-file\"\n").unwrap();

        let cfg = AgentConfig::load_with(Some(&path), |key| match key {
            ENV_LLM_MODEL => Some("from-env".into()),
            ENV_TELEMETRY_PATH => Some("/tmp/decisions.jsonl".into()),
            ENV_LLM_API_KEY => Some("   ".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.llm.model, "from-env");
        assert_eq!(
            cfg.telemetry_path,
            Some(PathBuf::from("/tmp/decisions.jsonl"))
        );
        // Blank values are ignored.
        assert!(cfg.llm.api_key.is_none());
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            AgentConfig::load_with(Some(&missing), no_env),
            Err(ConfigError::Read { .. })
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "store_dir = [").unwrap();
        assert!(matches!(
            AgentConfig::load_with(Some(&bad), no_env),
            Err(ConfigError::Parse { .. })
        ));
    }
}
