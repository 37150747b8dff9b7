//! Rollout configuration for the secondary routing tier.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `TRIAGE_ROLLOUT_ENABLED` | `false` | Global switch for the frontend/backend tier |
//! | `TRIAGE_ROLLOUT_PERCENTAGE` | `0` | Share of identifiers enrolled, clamped to 0-100 |
//! | `TRIAGE_DEBUG` | `false` | Log every rollout verdict with its bucket |
//! | `TRIAGE_FORCE_ENABLE` | `false` | Enroll everyone regardless of switch and percentage |
//!
//! Booleans accept "1", "true" or "yes" (case-insensitive). Values are read
//! once when the config is built; there is no hot reload.

use serde::{Deserialize, Serialize};

pub const ENV_ENABLED: &str = "TRIAGE_ROLLOUT_ENABLED";
pub const ENV_PERCENTAGE: &str = "TRIAGE_ROLLOUT_PERCENTAGE";
pub const ENV_DEBUG: &str = "TRIAGE_DEBUG";
pub const ENV_FORCE_ENABLE: &str = "TRIAGE_FORCE_ENABLE";

/// Default rollout percentage.
const DEFAULT_PERCENTAGE: u8 = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutConfig {
    pub enabled: bool,
    /// 0-100.
    pub percentage: u8,
    pub debug: bool,
    pub force_enable: bool,
}

impl RolloutConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, so callers and tests need not
    /// touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| lookup(key).map(|v| parse_bool(&v)).unwrap_or(false);
        let percentage = lookup(ENV_PERCENTAGE)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|p| p.clamp(0, 100) as u8)
            .unwrap_or(DEFAULT_PERCENTAGE);
        Self {
            enabled: flag(ENV_ENABLED),
            percentage,
            debug: flag(ENV_DEBUG),
            force_enable: flag(ENV_FORCE_ENABLE),
        }
    }

    /// Enabled at the given percentage (clamped).
    pub fn at_percentage(percentage: u8) -> Self {
        Self {
            enabled: true,
            percentage: percentage.min(100),
            ..Default::default()
        }
    }
}

impl std::fmt::Display for RolloutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rollout={} percentage={} debug={} force={}",
            flag_str(self.enabled),
            self.percentage,
            flag_str(self.debug),
            flag_str(self.force_enable),
        )
    }
}

/// Accepts "1", "true" or "yes" (case-insensitive).
pub(crate) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "1" || v == "true" || v == "yes"
}

fn flag_str(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_is_off() {
        let cfg = RolloutConfig::from_lookup(|_| None);
        assert_eq!(cfg, RolloutConfig::default());
        assert_eq!(cfg.to_string(), "rollout=OFF percentage=0 debug=OFF force=OFF");
    }

    #[test]
    fn test_reads_all_keys() {
        let cfg = RolloutConfig::from_lookup(lookup(&[
            (ENV_ENABLED, "yes"),
            (ENV_PERCENTAGE, "25"),
            (ENV_DEBUG, "TRUE"),
            (ENV_FORCE_ENABLE, "0"),
        ]));
        assert!(cfg.enabled);
        assert_eq!(cfg.percentage, 25);
        assert!(cfg.debug);
        assert!(!cfg.force_enable);
    }

    #[test]
    fn test_percentage_clamped_and_garbage_ignored() {
        let cfg = RolloutConfig::from_lookup(lookup(&[(ENV_PERCENTAGE, "250")]));
        assert_eq!(cfg.percentage, 100);
        let cfg = RolloutConfig::from_lookup(lookup(&[(ENV_PERCENTAGE, "-5")]));
        assert_eq!(cfg.percentage, 0);
        let cfg = RolloutConfig::from_lookup(lookup(&[(ENV_PERCENTAGE, "lots")]));
        assert_eq!(cfg.percentage, DEFAULT_PERCENTAGE);
    }

    #[test]
    fn test_parse_bool_values() {
        assert!(parse_bool("1"));
        assert!(parse_bool(" Yes "));
        assert!(!parse_bool("on"));
        assert!(!parse_bool(""));
    }
}
