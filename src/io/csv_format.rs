//! CSV format handling for lane event logs and session reports
//!
//! This module centralizes all CSV format concerns, providing:
//! - `EventRecord` structure for deserialization of event-log rows
//! - Conversion from CSV records to timestamped inbound events
//! - Session report serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{InboundEvent, LaneEngineError, LaneId, LprEvent, LprSource, ParkingSession, Timestamp, VehicleClass};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Write;

/// One row of a lane event log
///
/// Columns: `ts,lane,event,plate,confidence,vehicle_class,displacement_cc,operator,detail`
/// Most columns are optional because each event kind uses a different subset;
/// e.g. `vehicle_detected` carries nothing beyond the timestamp and lane.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EventRecord {
    /// RFC 3339 timestamp of the event
    pub ts: String,
    pub lane: String,
    pub event: String,
    pub plate: Option<String>,
    pub confidence: Option<f64>,
    pub vehicle_class: Option<String>,
    pub displacement_cc: Option<u32>,
    pub operator: Option<String>,
    pub detail: Option<String>,
}

/// An inbound event with the lane and instant it applies to
#[derive(Debug, Clone)]
pub struct TimedEvent {
    pub at: Timestamp,
    pub lane_id: LaneId,
    pub event: InboundEvent,
}

fn parse_timestamp(raw: &str) -> Result<Timestamp, LaneEngineError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LaneEngineError::parse_error(None, format!("invalid timestamp '{}': {}", raw, e)))
}

fn parse_vehicle_class(raw: Option<&str>) -> Result<VehicleClass, LaneEngineError> {
    match raw.map(str::trim) {
        None | Some("") | Some("car") => Ok(VehicleClass::Car),
        Some("motorbike") => Ok(VehicleClass::Motorbike),
        Some("truck") => Ok(VehicleClass::Truck),
        Some(other) => Err(LaneEngineError::parse_error(
            None,
            format!("invalid vehicle class '{}'", other),
        )),
    }
}

fn require<T>(field: Option<T>, name: &str, event: &str) -> Result<T, LaneEngineError> {
    field.ok_or_else(|| {
        LaneEngineError::parse_error(None, format!("{} event requires a '{}' column", event, name))
    })
}

/// Convert an `EventRecord` into a [`TimedEvent`]
///
/// Validates that the columns each event kind requires are present; extra
/// columns are ignored so logs from richer deployments still replay.
pub fn convert_event_record(record: EventRecord) -> Result<TimedEvent, LaneEngineError> {
    let at = parse_timestamp(&record.ts)?;
    let lane_id = record.lane.trim().to_string();
    if lane_id.is_empty() {
        return Err(LaneEngineError::parse_error(None, "missing lane id"));
    }

    let event = match record.event.trim() {
        "vehicle_detected" => InboundEvent::VehicleDetected,
        "lane_cleared" => InboundEvent::LaneCleared,
        "lpr_result" => {
            let plate = require(record.plate, "plate", "lpr_result")?;
            let confidence = require(record.confidence, "confidence", "lpr_result")?;
            InboundEvent::LprResult(LprEvent {
                plate,
                confidence,
                captured_at: at,
                lane_id: lane_id.clone(),
                image_ref: record.detail,
                vehicle_class_hint: parse_vehicle_class(record.vehicle_class.as_deref())?,
                engine_displacement_cc: record.displacement_cc,
                source: LprSource::Camera,
            })
        }
        "manual_plate_entry" => InboundEvent::ManualPlateEntry {
            plate: require(record.plate, "plate", "manual_plate_entry")?,
            vehicle_class: parse_vehicle_class(record.vehicle_class.as_deref())?,
            operator: require(record.operator, "operator", "manual_plate_entry")?,
        },
        "manual_open" => InboundEvent::ManualOpen {
            operator: require(record.operator, "operator", "manual_open")?,
        },
        "lane_power_down" => InboundEvent::LanePowerDown {
            operator: require(record.operator, "operator", "lane_power_down")?,
        },
        "lane_power_up" => InboundEvent::LanePowerUp {
            operator: require(record.operator, "operator", "lane_power_up")?,
        },
        "clear_fault" => InboundEvent::ClearFault {
            operator: require(record.operator, "operator", "clear_fault")?,
        },
        "capture_failed" => InboundEvent::CaptureFailed {
            message: record.detail.unwrap_or_default(),
        },
        "device_fault" => InboundEvent::DeviceFault {
            message: record.detail.unwrap_or_default(),
        },
        other => {
            return Err(LaneEngineError::parse_error(
                None,
                format!("unknown event kind '{}'", other),
            ))
        }
    };

    Ok(TimedEvent { at, lane_id, event })
}

/// Write the session report as CSV
///
/// Columns: `session,plate,site,entry_lane,entry_at,exit_at,vehicle_class,status,fee,violation_reason`
/// Sessions are written in id order; `exit_at`, `fee`, and `violation_reason`
/// are empty for sessions that never reached those states.
pub fn write_sessions_csv(
    sessions: &[ParkingSession],
    output: &mut dyn Write,
) -> Result<(), LaneEngineError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record([
        "session",
        "plate",
        "site",
        "entry_lane",
        "entry_at",
        "exit_at",
        "vehicle_class",
        "status",
        "fee",
        "violation_reason",
    ])?;

    let mut sorted: Vec<&ParkingSession> = sessions.iter().collect();
    sorted.sort_by_key(|s| s.id);

    for session in sorted {
        writer.write_record(&[
            session.id.to_string(),
            session.plate.to_string(),
            session.site_id.clone(),
            session.entry_lane_id.clone(),
            session.entry_at.to_rfc3339(),
            session
                .exit_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
            session.vehicle_class.to_string(),
            session.status.to_string(),
            session.fee.map(|f| f.to_string()).unwrap_or_default(),
            session.violation_reason.clone().unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
