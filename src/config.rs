//! Engine configuration
//!
//! Configuration is loaded from a JSON file (or built from defaults) and
//! validated before any lane enters service. Validation failures are
//! `Configuration` errors and are fatal at startup: a lane with a malformed
//! tariff or rule set refuses to enter `Idle` and reports out-of-service.
//!
//! Defaults mirror the shipped product configuration: one entry and one exit
//! lane at a single site, a 0.85 confidence threshold, and the 50cc motorbike
//! restriction as the only regulatory rule.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::policy::{BlacklistEntry, RegulatoryRule, WhitelistEntry};
use crate::types::session::{LaneId, SiteId, VehicleClass};
use crate::types::tariff::TariffTable;
use crate::types::LaneEngineError;

/// Whether a lane admits vehicles into or out of the facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneRole {
    Entry,
    Exit,
}

impl std::fmt::Display for LaneRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaneRole::Entry => f.write_str("entry"),
            LaneRole::Exit => f.write_str("exit"),
        }
    }
}

/// Configuration of one physical lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneConfig {
    pub lane_id: LaneId,
    pub site_id: SiteId,
    pub role: LaneRole,
}

/// Timer durations for the lane state machine
///
/// Stored as milliseconds for straightforward serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Capture window before falling back to a retry / manual entry
    pub capture_timeout_ms: u64,
    /// Cool-down after a rejection before the lane re-arms
    pub reject_cooldown_ms: u64,
    /// Fail-open limit while the barrier is up without a lane-cleared signal
    pub barrier_open_timeout_ms: u64,
}

impl TimingConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn reject_cooldown(&self) -> Duration {
        Duration::from_millis(self.reject_cooldown_ms)
    }

    pub fn barrier_open_timeout(&self) -> Duration {
        Duration::from_millis(self.barrier_open_timeout_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            capture_timeout_ms: 5_000,
            reject_cooldown_ms: 2_000,
            barrier_open_timeout_ms: 15_000,
        }
    }
}

/// Event dispatcher tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Bounded inbound queue depth per lane
    pub queue_depth: usize,
    /// Barrier command attempts before declaring a fault
    pub barrier_retry_attempts: u32,
    /// Base delay for exponential backoff between barrier attempts
    pub barrier_retry_base_ms: u64,
}

impl DispatcherConfig {
    pub fn barrier_retry_base(&self) -> Duration {
        Duration::from_millis(self.barrier_retry_base_ms)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            queue_depth: 50,
            barrier_retry_attempts: 3,
            barrier_retry_base_ms: 500,
        }
    }
}

/// Policy evaluator inputs: threshold, lists, and the ordered rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Minimum LPR confidence accepted without manual review (0.0..=1.0)
    pub confidence_threshold: f64,
    #[serde(default)]
    pub whitelist: Vec<WhitelistEntry>,
    #[serde(default)]
    pub blacklist: Vec<BlacklistEntry>,
    /// Ordered: the first matching rule wins
    #[serde(default = "default_regulatory_rules")]
    pub regulatory_rules: Vec<RegulatoryRule>,
}

fn default_regulatory_rules() -> Vec<RegulatoryRule> {
    vec![RegulatoryRule {
        vehicle_class: VehicleClass::Motorbike,
        min_displacement_cc: 50,
        description: "Motorbikes above 50cc are restricted at this site".to_string(),
    }]
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            confidence_threshold: 0.85,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            regulatory_rules: default_regulatory_rules(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub lanes: Vec<LaneConfig>,
    pub timing: TimingConfig,
    pub dispatcher: DispatcherConfig,
    pub policy: PolicyConfig,
    pub tariff: TariffTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lanes: vec![
                LaneConfig {
                    lane_id: "LANE-IN-01".to_string(),
                    site_id: "SITE-01".to_string(),
                    role: LaneRole::Entry,
                },
                LaneConfig {
                    lane_id: "LANE-OUT-01".to_string(),
                    site_id: "SITE-01".to_string(),
                    role: LaneRole::Exit,
                },
            ],
            timing: TimingConfig::default(),
            dispatcher: DispatcherConfig::default(),
            policy: PolicyConfig::default(),
            tariff: TariffTable::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, LaneEngineError> {
        let contents = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration; any failure here is fatal at startup
    pub fn validate(&self) -> Result<(), LaneEngineError> {
        if self.lanes.is_empty() {
            return Err(LaneEngineError::configuration("no lanes configured"));
        }

        let mut seen = std::collections::HashSet::new();
        for lane in &self.lanes {
            if !seen.insert(&lane.lane_id) {
                return Err(LaneEngineError::configuration(format!(
                    "duplicate lane id '{}'",
                    lane.lane_id
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.policy.confidence_threshold) {
            return Err(LaneEngineError::configuration(format!(
                "confidence_threshold {} outside 0.0..=1.0",
                self.policy.confidence_threshold
            )));
        }

        if self.dispatcher.queue_depth == 0 {
            return Err(LaneEngineError::configuration(
                "dispatcher queue_depth must be at least 1",
            ));
        }

        if self.dispatcher.barrier_retry_attempts == 0 {
            return Err(LaneEngineError::configuration(
                "barrier_retry_attempts must be at least 1",
            ));
        }

        for rule in &self.policy.regulatory_rules {
            if rule.description.trim().is_empty() {
                return Err(LaneEngineError::configuration(
                    "regulatory rule is missing a description",
                ));
            }
        }

        self.tariff.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_has_entry_and_exit_lane() {
        let config = EngineConfig::default();
        assert_eq!(config.lanes.len(), 2);
        assert_eq!(config.lanes[0].role, LaneRole::Entry);
        assert_eq!(config.lanes[1].role, LaneRole::Exit);
    }

    #[test]
    fn test_default_ships_the_50cc_rule() {
        let config = EngineConfig::default();
        assert_eq!(config.policy.regulatory_rules.len(), 1);
        assert_eq!(config.policy.regulatory_rules[0].min_displacement_cc, 50);
    }

    #[test]
    fn test_empty_lanes_rejected() {
        let config = EngineConfig {
            lanes: Vec::new(),
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            LaneEngineError::Configuration { .. }
        ));
    }

    #[test]
    fn test_duplicate_lane_ids_rejected() {
        let mut config = EngineConfig::default();
        config.lanes[1].lane_id = config.lanes[0].lane_id.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let mut config = EngineConfig::default();
        config.policy.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_queue_depth_rejected() {
        let mut config = EngineConfig::default();
        config.dispatcher.queue_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "policy": {{ "confidence_threshold": 0.9 }} }}"#).unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.policy.confidence_threshold, 0.9);
        assert_eq!(config.dispatcher.queue_depth, 50);
        assert_eq!(config.lanes.len(), 2);
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = EngineConfig::from_json_file(file.path());
        assert!(matches!(
            result.unwrap_err(),
            LaneEngineError::Configuration { .. }
        ));
    }
}
