//! Error types for the Lane Transaction Engine
//!
//! One taxonomy covers the whole engine:
//!
//! - **Transient device errors**: camera or barrier temporarily unreachable,
//!   retried by the dispatcher before becoming operator-visible faults.
//! - **Invariant violations**: duplicate active session; logged as a
//!   data-integrity event and surfaced to operators, never silently resolved.
//! - **Configuration errors**: malformed tariff or rule set; fatal at lane
//!   startup, the lane refuses to enter service.
//! - **I/O and parse errors**: event-log reading and report writing.
//!
//! Policy rejections are expected business outcomes and are represented as
//! verdicts, not errors.

use thiserror::Error;

use super::session::{Plate, SessionId, Timestamp};

/// Main error type for the lane transaction engine
///
/// Every variant carries enough context to produce a human-readable reason
/// string suitable for direct display on the lane console.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LaneEngineError {
    /// A device (camera, barrier) is temporarily unreachable
    ///
    /// Retried per the dispatcher's backoff policy before escalating.
    #[error("Device '{device}' on lane {lane_id} unreachable: {message}")]
    TransientDevice {
        device: String,
        lane_id: String,
        message: String,
    },

    /// The one-unresolved-session-per-plate invariant would be violated
    ///
    /// Surfaced to the operator UI; the entry is rejected, never queued.
    #[error("Plate {plate} already has an unresolved session at site {site_id}")]
    DuplicateActiveSession { site_id: String, plate: Plate },

    /// Exit lane found no unresolved session for the plate
    #[error("No active session for plate {plate} at site {site_id}")]
    NoActiveSession { site_id: String, plate: Plate },

    /// A store operation referenced a session id that does not exist
    #[error("Session {id} not found for {operation}")]
    SessionNotFound { id: SessionId, operation: String },

    /// `complete_session` was called on a session that is already closed
    #[error("Session {id} is already completed")]
    SessionAlreadyCompleted { id: SessionId },

    /// A plate string contained no alphanumeric characters
    #[error("Invalid plate '{raw}': nothing left after normalization")]
    InvalidPlate { raw: String },

    /// Exit before entry; rejected to keep fee computation total
    #[error("Invalid session duration: exit {exit} is before entry {entry}")]
    InvalidDuration { entry: Timestamp, exit: Timestamp },

    /// Fee arithmetic would overflow
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: String },

    /// Malformed configuration (tariff, rules, lanes); fatal at startup
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// An event referenced a lane the dispatcher does not route
    #[error("Unknown lane '{lane_id}'")]
    UnknownLane { lane_id: String },

    /// I/O error while reading event logs or writing reports
    #[error("I/O error: {message}")]
    IoError { message: String },

    /// Malformed event-log record
    ///
    /// Recoverable: the record is skipped and replay continues.
    #[error("Event log parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },
}

impl From<std::io::Error> for LaneEngineError {
    fn from(error: std::io::Error) -> Self {
        LaneEngineError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LaneEngineError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());
        LaneEngineError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<csv_async::Error> for LaneEngineError {
    fn from(error: csv_async::Error) -> Self {
        let line = error.position().map(|pos| pos.line());
        LaneEngineError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for LaneEngineError {
    fn from(error: serde_json::Error) -> Self {
        LaneEngineError::Configuration {
            message: error.to_string(),
        }
    }
}

// Helper constructors for common errors

impl LaneEngineError {
    pub fn transient_device(device: &str, lane_id: &str, message: impl Into<String>) -> Self {
        LaneEngineError::TransientDevice {
            device: device.to_string(),
            lane_id: lane_id.to_string(),
            message: message.into(),
        }
    }

    pub fn duplicate_active_session(site_id: &str, plate: Plate) -> Self {
        LaneEngineError::DuplicateActiveSession {
            site_id: site_id.to_string(),
            plate,
        }
    }

    pub fn no_active_session(site_id: &str, plate: Plate) -> Self {
        LaneEngineError::NoActiveSession {
            site_id: site_id.to_string(),
            plate,
        }
    }

    pub fn session_not_found(id: SessionId, operation: &str) -> Self {
        LaneEngineError::SessionNotFound {
            id,
            operation: operation.to_string(),
        }
    }

    pub fn session_already_completed(id: SessionId) -> Self {
        LaneEngineError::SessionAlreadyCompleted { id }
    }

    pub fn invalid_plate(raw: &str) -> Self {
        LaneEngineError::InvalidPlate {
            raw: raw.to_string(),
        }
    }

    pub fn arithmetic_overflow(operation: &str) -> Self {
        LaneEngineError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        LaneEngineError::Configuration {
            message: message.into(),
        }
    }

    pub fn unknown_lane(lane_id: &str) -> Self {
        LaneEngineError::UnknownLane {
            lane_id: lane_id.to_string(),
        }
    }

    pub fn parse_error(line: Option<u64>, message: impl Into<String>) -> Self {
        LaneEngineError::ParseError {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::session::Plate;
    use rstest::rstest;

    #[rstest]
    #[case::transient_device(
        LaneEngineError::transient_device("barrier", "LANE-IN-01", "timeout"),
        "Device 'barrier' on lane LANE-IN-01 unreachable: timeout"
    )]
    #[case::duplicate(
        LaneEngineError::duplicate_active_session("SITE-01", Plate::parse("59T1-123.45").unwrap()),
        "Plate 59T112345 already has an unresolved session at site SITE-01"
    )]
    #[case::no_active(
        LaneEngineError::no_active_session("SITE-01", Plate::parse("29A-999.99").unwrap()),
        "No active session for plate 29A99999 at site SITE-01"
    )]
    #[case::not_found(
        LaneEngineError::session_not_found(42, "complete_session"),
        "Session 42 not found for complete_session"
    )]
    #[case::already_completed(
        LaneEngineError::session_already_completed(7),
        "Session 7 is already completed"
    )]
    #[case::invalid_plate(
        LaneEngineError::invalid_plate("---"),
        "Invalid plate '---': nothing left after normalization"
    )]
    #[case::configuration(
        LaneEngineError::configuration("missing tariff table"),
        "Configuration error: missing tariff table"
    )]
    #[case::unknown_lane(
        LaneEngineError::unknown_lane("LANE-99"),
        "Unknown lane 'LANE-99'"
    )]
    #[case::parse_with_line(
        LaneEngineError::parse_error(Some(3), "bad kind"),
        "Event log parse error at line 3: bad kind"
    )]
    #[case::parse_without_line(
        LaneEngineError::parse_error(None, "bad kind"),
        "Event log parse error: bad kind"
    )]
    fn test_error_display(#[case] error: LaneEngineError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: LaneEngineError = io_error.into();
        assert!(matches!(error, LaneEngineError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
