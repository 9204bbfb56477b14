//! Policy-related types: verdicts, lists, and regulatory rules
//!
//! These are plain data; the evaluation logic lives in `core::policy`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::session::{Plate, VehicleClass};

/// Why a verdict came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictReason {
    /// Admitted with no findings
    Ok,
    /// Plate is on the blacklist; dominates every other check
    Blacklisted,
    /// Recognition confidence below the configured threshold
    ConfidenceTooLow,
    /// An ordered regulatory rule matched
    RegulatoryViolation,
    /// The session store already holds an unresolved session for this plate
    DuplicateActiveSession,
    /// Exit lane found no unresolved session for this plate
    NoActiveSession,
}

impl std::fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictReason::Ok => f.write_str("ok"),
            VerdictReason::Blacklisted => f.write_str("blacklisted"),
            VerdictReason::ConfidenceTooLow => f.write_str("confidence_too_low"),
            VerdictReason::RegulatoryViolation => f.write_str("regulatory_violation"),
            VerdictReason::DuplicateActiveSession => f.write_str("duplicate_active_session"),
            VerdictReason::NoActiveSession => f.write_str("no_active_session"),
        }
    }
}

/// Outcome of a policy evaluation
///
/// Ephemeral; consumed by the lane state machine to choose its next state.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyVerdict {
    pub admitted: bool,
    pub reason: VerdictReason,
    /// Signals the lane to solicit manual plate entry instead of rejecting
    /// outright
    pub requires_manual_review: bool,
    /// Display-ready explanation for the lane console and audit log
    pub detail: String,
    /// Pre-paid pass holder; affects billing class and UI badge only, never
    /// the admit/reject decision
    pub whitelisted: bool,
}

impl PolicyVerdict {
    pub fn admit(detail: impl Into<String>, whitelisted: bool) -> Self {
        PolicyVerdict {
            admitted: true,
            reason: VerdictReason::Ok,
            requires_manual_review: false,
            detail: detail.into(),
            whitelisted,
        }
    }

    pub fn reject(reason: VerdictReason, detail: impl Into<String>) -> Self {
        PolicyVerdict {
            admitted: false,
            reason,
            requires_manual_review: false,
            detail: detail.into(),
            whitelisted: false,
        }
    }

    pub fn manual_review(reason: VerdictReason, detail: impl Into<String>) -> Self {
        PolicyVerdict {
            admitted: false,
            reason,
            requires_manual_review: true,
            detail: detail.into(),
            whitelisted: false,
        }
    }
}

/// Pre-paid pass plans carried by whitelist entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassPlan {
    Monthly,
    Vip,
    Resident,
}

/// A whitelisted (pass-holder) vehicle
///
/// Whitelist membership exempts the vehicle from per-use billing but not from
/// blacklist or regulatory checks. Entries past their expiry date do not
/// count as whitelisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub plate: Plate,
    pub plan: PassPlan,
    pub expires_on: NaiveDate,
}

/// A vehicle explicitly denied passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub plate: Plate,
    pub reason: String,
    pub added_by: String,
    pub added_on: NaiveDate,
}

/// A data-driven regulatory restriction
///
/// Rules are evaluated in configuration order; the first match wins. The
/// shipped default restricts motorbikes above 50cc, mirroring the product's
/// demo rule, but nothing is hardcoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryRule {
    /// Which vehicle class the rule applies to
    pub vehicle_class: VehicleClass,
    /// Matches vehicles with displacement strictly above this value (cc)
    pub min_displacement_cc: u32,
    /// Display-ready description, also used as the rejection detail
    pub description: String,
}

impl RegulatoryRule {
    /// Whether the rule matches the given vehicle attributes
    ///
    /// A vehicle with unknown displacement never matches a displacement rule.
    pub fn matches(&self, attrs: &VehicleAttributes) -> bool {
        if attrs.vehicle_class != self.vehicle_class {
            return false;
        }
        match attrs.engine_displacement_cc {
            Some(cc) => cc > self.min_displacement_cc,
            None => false,
        }
    }
}

/// Attributes of the vehicle under evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleAttributes {
    pub vehicle_class: VehicleClass,
    pub engine_displacement_cc: Option<u32>,
}
