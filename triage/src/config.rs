//! Triage configuration.
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `TRIAGE_HIGH_THRESHOLD` | `0.8` | Minimum confidence for unattended execution |
//! | `TRIAGE_LOW_THRESHOLD` | `0.5` | Minimum confidence for the hybrid lane |
//!
//! Rollout variables are documented in [`crate::rollout::config`].

use serde::{Deserialize, Serialize};

use crate::rollout::RolloutConfig;
use crate::router::{TriageThresholds, HIGH_CONFIDENCE_THRESHOLD, LOW_CONFIDENCE_THRESHOLD};

pub const ENV_HIGH_THRESHOLD: &str = "TRIAGE_HIGH_THRESHOLD";
pub const ENV_LOW_THRESHOLD: &str = "TRIAGE_LOW_THRESHOLD";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageConfig {
    pub thresholds: TriageThresholds,
    pub rollout: RolloutConfig,
}

impl TriageConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |key: &str, default: f64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(default)
        };
        Self {
            thresholds: TriageThresholds::new(
                number(ENV_HIGH_THRESHOLD, HIGH_CONFIDENCE_THRESHOLD),
                number(ENV_LOW_THRESHOLD, LOW_CONFIDENCE_THRESHOLD),
            ),
            rollout: RolloutConfig::from_lookup(&lookup),
        }
    }
}
