//! Event and command types exchanged between the engine and its collaborators
//!
//! Inbound events arrive from sensors, cameras, and the operator UI through
//! the event dispatcher; outbound commands and notifications flow back out to
//! the barrier actuator and reporting collaborators. No wire format is
//! mandated here; these are the in-process contracts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::{LaneId, Plate, Timestamp, VehicleClass};

/// Operator account identifier (e.g. "U-02")
pub type OperatorId = String;

/// Who performed an action: the engine itself or an identified operator
///
/// Every override and manual decision must be attributable, so operator
/// actions always carry an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    System,
    Operator(OperatorId),
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::Operator(id) => write!(f, "operator:{}", id),
        }
    }
}

/// Where an LPR reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LprSource {
    /// Produced by the camera/inference collaborator
    Camera,
    /// Typed by an operator; carries confidence 1.0 and skips the
    /// confidence-threshold check
    Manual,
}

/// A license-plate recognition result from the camera collaborator
///
/// Ephemeral: consumed by the lane state machine during one vehicle cycle.
/// The plate is the raw string as produced by the inference model; the engine
/// normalizes it before any policy or store lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LprEvent {
    pub plate: String,
    /// Recognition confidence in 0.0..=1.0
    pub confidence: f64,
    pub captured_at: Timestamp,
    pub lane_id: LaneId,
    /// Reference to the captured frame in external image storage
    pub image_ref: Option<String>,
    pub vehicle_class_hint: VehicleClass,
    /// Engine displacement in cc when the registry/classifier knows it;
    /// consumed by regulatory rules
    pub engine_displacement_cc: Option<u32>,
    pub source: LprSource,
}

impl LprEvent {
    /// Build a synthetic event for an operator-typed plate
    pub fn manual(lane_id: LaneId, plate: String, class: VehicleClass, at: Timestamp) -> Self {
        LprEvent {
            plate,
            confidence: 1.0,
            captured_at: at,
            lane_id,
            image_ref: None,
            vehicle_class_hint: class,
            engine_displacement_cc: None,
            source: LprSource::Manual,
        }
    }
}

/// Timer identities used by the lane state machine
///
/// Timeouts are first-class transitions: the runtime arms a timer when asked
/// and delivers a `TimerElapsed` event when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerKind {
    /// No LPR result arrived within the capture window
    CaptureTimeout,
    /// Cool-down after a rejection, suppressing re-triggers from the same
    /// stationary vehicle
    RejectCoolDown,
    /// Fail-open limit while the barrier is up and the lane has not cleared
    BarrierOpenTimeout,
}

/// Inbound events consumed by a single lane
///
/// Routed per lane by the event dispatcher; ordering is guaranteed within a
/// lane only.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Induction-loop trigger: a vehicle is present at the lane
    VehicleDetected,
    /// LPR result from the camera collaborator
    LprResult(LprEvent),
    /// Induction-loop signal that the vehicle has passed the barrier
    LaneCleared,
    /// Operator-typed plate while the lane awaits manual confirmation
    ManualPlateEntry {
        plate: String,
        vehicle_class: VehicleClass,
        operator: OperatorId,
    },
    /// Operator override: force the barrier open, bypassing policy
    ManualOpen { operator: OperatorId },
    /// Administrative: take the lane out of service
    LanePowerDown { operator: OperatorId },
    /// Administrative: return a powered-down lane to service
    LanePowerUp { operator: OperatorId },
    /// Operator acknowledgement of a device fault
    ClearFault { operator: OperatorId },
    /// A timer armed by the state machine has fired; stale generations are
    /// ignored by the machine
    TimerElapsed { kind: TimerKind, generation: u64 },
    /// The camera collaborator reported a capture request failure
    CaptureFailed { message: String },
    /// Barrier actuation failed after all retries (injected by the dispatcher)
    DeviceFault { message: String },
}

impl InboundEvent {
    /// Whether the dispatcher may drop this event under backpressure
    ///
    /// Sensor pings and LPR results can be regenerated by the physical world;
    /// operator commands and fault signals cannot.
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            InboundEvent::VehicleDetected
                | InboundEvent::LaneCleared
                | InboundEvent::LprResult(_)
        )
    }

    /// Short name for logging and audit entries
    pub fn kind_name(&self) -> &'static str {
        match self {
            InboundEvent::VehicleDetected => "vehicle_detected",
            InboundEvent::LprResult(_) => "lpr_result",
            InboundEvent::LaneCleared => "lane_cleared",
            InboundEvent::ManualPlateEntry { .. } => "manual_plate_entry",
            InboundEvent::ManualOpen { .. } => "manual_open",
            InboundEvent::LanePowerDown { .. } => "lane_power_down",
            InboundEvent::LanePowerUp { .. } => "lane_power_up",
            InboundEvent::ClearFault { .. } => "clear_fault",
            InboundEvent::TimerElapsed { .. } => "timer_elapsed",
            InboundEvent::CaptureFailed { .. } => "capture_failed",
            InboundEvent::DeviceFault { .. } => "device_fault",
        }
    }
}

/// Outbound command to the barrier actuator collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarrierCommand {
    Open,
    Close,
}

impl std::fmt::Display for BarrierCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BarrierCommand::Open => f.write_str("open"),
            BarrierCommand::Close => f.write_str("close"),
        }
    }
}

/// Notifications emitted to UI/reporting collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    /// A session changed status (emitted on every transition)
    SessionChanged(Box<super::session::ParkingSession>),
    /// A passage was denied; `reason` is display-ready for the lane console
    Denial {
        lane_id: LaneId,
        plate: Option<Plate>,
        reason: String,
    },
    /// The lane is waiting for an operator to type the plate
    ManualReviewRequested { lane_id: LaneId, detail: String },
    /// The lane entered Fault or OutOfService and needs attention
    LaneOutOfService { lane_id: LaneId, reason: String },
    /// The lane returned to service
    LaneBackInService { lane_id: LaneId },
}

/// Categories of audit entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    /// An admission decision (admit or reject) with its reason
    Decision,
    /// An operator override bypassing the policy evaluator
    Override,
    /// A device fault or its clearance
    Fault,
    /// Lane power state change
    Power,
    /// Dispatcher dropped an event under backpressure
    Backpressure,
}

/// Append-only audit record
///
/// Every admission decision, override, fault, and power change produces one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence number assigned by the audit log
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub lane_id: LaneId,
    pub actor: Actor,
    pub kind: AuditKind,
    pub plate: Option<Plate>,
    /// Human-readable description, suitable for direct display
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_droppable_classification() {
        assert!(InboundEvent::VehicleDetected.is_droppable());
        assert!(InboundEvent::LaneCleared.is_droppable());
        assert!(!InboundEvent::ManualOpen {
            operator: "U-01".to_string()
        }
        .is_droppable());
        assert!(!InboundEvent::LanePowerDown {
            operator: "U-01".to_string()
        }
        .is_droppable());
        assert!(!InboundEvent::DeviceFault {
            message: "unreachable".to_string()
        }
        .is_droppable());
    }

    #[test]
    fn test_manual_lpr_event_has_full_confidence() {
        let at = Utc::now();
        let event = LprEvent::manual(
            "LANE-IN-01".to_string(),
            "59T1-123.45".to_string(),
            VehicleClass::Car,
            at,
        );
        assert_eq!(event.confidence, 1.0);
        assert_eq!(event.source, LprSource::Manual);
        assert_eq!(event.captured_at, at);
    }

    #[test]
    fn test_actor_display() {
        assert_eq!(Actor::System.to_string(), "system");
        assert_eq!(
            Actor::Operator("U-02".to_string()).to_string(),
            "operator:U-02"
        );
    }
}
