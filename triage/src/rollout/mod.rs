//! Rollout gate for the secondary routing tier.
//!
//! Membership is a pure function of the identifier and the configuration:
//! the identifier is hashed with blake3 into one of 100 buckets and is
//! enrolled when its bucket is below the rollout percentage. No session
//! storage is needed to keep a user's verdict stable, and raising the
//! percentage only ever adds identifiers.

pub mod config;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use config::RolloutConfig;

/// Number of rollout buckets.
pub const BUCKET_COUNT: u64 = 100;

/// Stable bucket in `0..100` for an identifier.
pub fn bucket_for(id: &str) -> u8 {
    let hash = blake3::hash(id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % BUCKET_COUNT) as u8
}

/// Why the gate answered the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// Caller passed an explicit force flag.
    ForcedByCaller,
    /// `force_enable` is set in configuration.
    ForcedByConfig,
    Disabled,
    NoIdentifier,
    InRollout,
    OutsideRollout,
}

/// Full gate verdict, for logging and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub enrolled: bool,
    pub reason: GateReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<u8>,
    pub percentage: u8,
}

/// Deterministic membership test.
#[derive(Debug, Clone, Default)]
pub struct RolloutGate {
    config: RolloutConfig,
}

impl RolloutGate {
    pub fn new(config: RolloutConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(RolloutConfig::from_env())
    }

    pub fn config(&self) -> &RolloutConfig {
        &self.config
    }

    /// Whether the session is routed through the secondary tier.
    pub fn should_route(
        &self,
        user_id: Option<&str>,
        guest_session_id: Option<&str>,
        force_flag: Option<bool>,
    ) -> bool {
        self.evaluate(user_id, guest_session_id, force_flag).enrolled
    }

    /// Like [`should_route`](Self::should_route) but explains the verdict.
    ///
    /// The user id is hashed when present, otherwise the guest session id.
    pub fn evaluate(
        &self,
        user_id: Option<&str>,
        guest_session_id: Option<&str>,
        force_flag: Option<bool>,
    ) -> GateVerdict {
        let percentage = self.config.percentage.min(100);
        let verdict = |enrolled, reason, bucket| GateVerdict {
            enrolled,
            reason,
            bucket,
            percentage,
        };

        let id = user_id
            .filter(|s| !s.is_empty())
            .or(guest_session_id.filter(|s| !s.is_empty()));
        let bucket = id.map(bucket_for);

        let result = if let Some(forced) = force_flag {
            verdict(forced, GateReason::ForcedByCaller, bucket)
        } else if self.config.force_enable {
            verdict(true, GateReason::ForcedByConfig, bucket)
        } else if !self.config.enabled {
            verdict(false, GateReason::Disabled, bucket)
        } else {
            match bucket {
                None => verdict(false, GateReason::NoIdentifier, None),
                Some(b) if b < percentage => verdict(true, GateReason::InRollout, bucket),
                Some(_) => verdict(false, GateReason::OutsideRollout, bucket),
            }
        };

        if self.config.debug {
            info!(
                enrolled = result.enrolled,
                reason = ?result.reason,
                bucket = ?result.bucket,
                percentage,
                "rollout verdict"
            );
        } else {
            debug!(enrolled = result.enrolled, reason = ?result.reason, "rollout verdict");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_is_stable_and_in_range() {
        for i in 0..500 {
            let id = format!("user-{}", i);
            let b = bucket_for(&id);
            assert!(b < 100);
            assert_eq!(b, bucket_for(&id));
        }
    }

    #[test]
    fn test_disabled_routes_nobody() {
        let gate = RolloutGate::new(RolloutConfig {
            percentage: 100,
            ..Default::default()
        });
        let v = gate.evaluate(Some("u1"), None, None);
        assert!(!v.enrolled);
        assert_eq!(v.reason, GateReason::Disabled);
    }

    #[test]
    fn test_full_and_zero_percentage() {
        let all = RolloutGate::new(RolloutConfig::at_percentage(100));
        let none = RolloutGate::new(RolloutConfig::at_percentage(0));
        for i in 0..200 {
            let id = format!("guest-{}", i);
            assert!(all.should_route(None, Some(&id), None));
            assert!(!none.should_route(None, Some(&id), None));
        }
    }

    #[test]
    fn test_force_flag_overrides_everything() {
        let off = RolloutGate::new(RolloutConfig::default());
        assert!(off.should_route(None, None, Some(true)));

        let all = RolloutGate::new(RolloutConfig::at_percentage(100));
        let v = all.evaluate(Some("u1"), None, Some(false));
        assert!(!v.enrolled);
        assert_eq!(v.reason, GateReason::ForcedByCaller);
    }

    #[test]
    fn test_config_force_enable() {
        let gate = RolloutGate::new(RolloutConfig {
            force_enable: true,
            ..Default::default()
        });
        let v = gate.evaluate(None, None, None);
        assert!(v.enrolled);
        assert_eq!(v.reason, GateReason::ForcedByConfig);
    }

    #[test]
    fn test_user_id_takes_precedence() {
        let gate = RolloutGate::new(RolloutConfig::at_percentage(50));
        let v = gate.evaluate(Some("u1"), Some("g1"), None);
        assert_eq!(v.bucket, Some(bucket_for("u1")));
        let v = gate.evaluate(Some(""), Some("g1"), None);
        assert_eq!(v.bucket, Some(bucket_for("g1")));
    }

    #[test]
    fn test_missing_identifier_not_enrolled() {
        let gate = RolloutGate::new(RolloutConfig::at_percentage(100));
        let v = gate.evaluate(None, None, None);
        assert!(!v.enrolled);
        assert_eq!(v.reason, GateReason::NoIdentifier);
    }
}
