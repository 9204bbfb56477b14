//! Core data types for the Lane Transaction Engine
//!
//! - `session` - Parking sessions, plates, and identifiers
//! - `event` - Inbound events, outbound commands, and audit records
//! - `policy` - Verdicts, whitelist/blacklist entries, regulatory rules
//! - `tariff` - Tariff tables for the pricing calculator
//! - `error` - The engine-wide error taxonomy

pub mod error;
pub mod event;
pub mod policy;
pub mod session;
pub mod tariff;

pub use error::LaneEngineError;
pub use event::{
    Actor, AuditEntry, AuditKind, BarrierCommand, EngineNotification, InboundEvent, LprEvent,
    LprSource, OperatorId, TimerKind,
};
pub use policy::{
    BlacklistEntry, PassPlan, PolicyVerdict, RegulatoryRule, VehicleAttributes, VerdictReason,
    WhitelistEntry,
};
pub use session::{
    LaneId, NewSession, ParkingSession, Plate, SessionId, SessionStatus, SessionTransition,
    SiteId, Timestamp, VehicleClass,
};
pub use tariff::{ClassTariff, TariffTable};
