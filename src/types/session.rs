//! Session-related types for the Lane Transaction Engine
//!
//! This module defines parking sessions, their status lifecycle, and the
//! normalized plate representation used as the store key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LaneEngineError;
use super::event::Actor;

/// Session identifier
///
/// Allocated sequentially by the session store; immutable once assigned.
pub type SessionId = u64;

/// Site identifier (e.g. "SITE-01")
pub type SiteId = String;

/// Lane identifier (e.g. "LANE-IN-01")
pub type LaneId = String;

/// Wall-clock timestamp used throughout the engine
pub type Timestamp = DateTime<Utc>;

/// Normalized license plate
///
/// Plates are stored uppercase with all spaces and punctuation removed, so
/// that "59T1-123.45", "59t1 123 45" and "59T112345" all compare equal. The
/// normalized form is the key for the one-unresolved-session-per-plate
/// invariant and for whitelist/blacklist membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Plate(String);

impl Plate {
    /// Parse and normalize a raw plate string
    ///
    /// Keeps ASCII alphanumerics only, uppercased. Returns an error if
    /// nothing remains after normalization.
    pub fn parse(raw: &str) -> Result<Self, LaneEngineError> {
        let normalized: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.is_empty() {
            return Err(LaneEngineError::invalid_plate(raw));
        }

        Ok(Plate(normalized))
    }

    /// The normalized plate string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Plate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Plate {
    type Error = LaneEngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Plate::parse(&value)
    }
}

impl From<Plate> for String {
    fn from(plate: Plate) -> Self {
        plate.0
    }
}

/// Vehicle classification used for policy checks and tariff selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Motorbike,
    Truck,
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VehicleClass::Car => f.write_str("car"),
            VehicleClass::Motorbike => f.write_str("motorbike"),
            VehicleClass::Truck => f.write_str("truck"),
        }
    }
}

/// Parking session lifecycle states
///
/// `Pending` exists only between construction and the store's atomic insert;
/// a session visible to other lanes is `Active`, `Completed`, or `Violation`.
/// `Active` and `Violation` are the unresolved states that block a second
/// entry for the same plate at the same site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created by the entry lane, not yet committed to the store
    Pending,
    /// Vehicle is inside the facility
    Active,
    /// Vehicle has exited and the fee (if any) is settled
    Completed,
    /// Flagged for operator attention; still counts as unresolved
    Violation,
}

impl SessionStatus {
    /// Whether this status blocks a new entry for the same plate
    pub fn is_unresolved(self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Violation)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => f.write_str("pending"),
            SessionStatus::Active => f.write_str("active"),
            SessionStatus::Completed => f.write_str("completed"),
            SessionStatus::Violation => f.write_str("violation"),
        }
    }
}

/// A single status transition, retained per session for audit and dispute
/// resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTransition {
    pub at: Timestamp,
    pub from: SessionStatus,
    pub to: SessionStatus,
    /// Who drove the transition (system decision or an identified operator)
    pub actor: Actor,
    /// Optional human-readable note (violation reason, override context)
    pub note: Option<String>,
}

/// Authoritative record of one vehicle's stay
///
/// Created by the entry lane on a successful admission, mutated only through
/// the session store, never deleted. `exit_at` and `fee` are set exactly once
/// when the session completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSession {
    pub id: SessionId,
    pub plate: Plate,
    pub site_id: SiteId,
    pub entry_lane_id: LaneId,
    pub entry_at: Timestamp,
    pub exit_at: Option<Timestamp>,
    pub vehicle_class: VehicleClass,
    /// Engine displacement in cc, when known (used by regulatory rules)
    pub engine_displacement_cc: Option<u32>,
    pub status: SessionStatus,
    /// Computed once on exit; `None` while active, zero for pass holders
    pub fee: Option<Decimal>,
    pub violation_reason: Option<String>,
    /// Append-only history of status transitions
    pub transitions: Vec<SessionTransition>,
}

/// Input to `SessionStore::create_active`: everything a session needs except
/// the id and status, which the store assigns atomically.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub plate: Plate,
    pub site_id: SiteId,
    pub entry_lane_id: LaneId,
    pub entry_at: Timestamp,
    pub vehicle_class: VehicleClass,
    pub engine_displacement_cc: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::regional_format("59T1-123.45", "59T112345")]
    #[case::spaces("59t1 123 45", "59T112345")]
    #[case::already_normalized("29A99999", "29A99999")]
    #[case::lowercase("51h-456.78", "51H45678")]
    fn test_plate_normalization(#[case] raw: &str, #[case] expected: &str) {
        let plate = Plate::parse(raw).unwrap();
        assert_eq!(plate.as_str(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::punctuation_only("--..")]
    #[case::whitespace_only("   ")]
    fn test_plate_rejects_empty_after_normalization(#[case] raw: &str) {
        let result = Plate::parse(raw);
        assert!(matches!(
            result.unwrap_err(),
            LaneEngineError::InvalidPlate { .. }
        ));
    }

    #[test]
    fn test_equivalent_raw_plates_compare_equal() {
        let a = Plate::parse("59T1-123.45").unwrap();
        let b = Plate::parse("59 t1 12345").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unresolved_statuses() {
        assert!(SessionStatus::Active.is_unresolved());
        assert!(SessionStatus::Violation.is_unresolved());
        assert!(!SessionStatus::Completed.is_unresolved());
        assert!(!SessionStatus::Pending.is_unresolved());
    }
}
