//! Device collaborator seams
//!
//! The lane state machine only emits effects; these traits are where the
//! effects meet hardware (or a simulation of it). Implementations must be
//! cheap and non-blocking: a barrier driver that needs seconds to actuate
//! should confirm the command was accepted, not wait for the arm to move.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{BarrierCommand, EngineNotification, LaneEngineError};

/// Triggers an LPR capture on the lane's camera
pub trait CameraTrigger: Send + Sync {
    /// Ask the camera to capture and recognize; the result arrives later as
    /// an `lpr_result` event (or not at all, covered by the capture timeout)
    fn request_capture(&self, lane_id: &str) -> Result<(), LaneEngineError>;
}

/// Drives the lane's barrier actuator
pub trait BarrierDriver: Send + Sync {
    fn set(&self, lane_id: &str, command: BarrierCommand) -> Result<(), LaneEngineError>;
}

/// Receives engine notifications for UI and reporting collaborators
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: EngineNotification);
}

/// Bundle of device collaborators shared by the lane tasks
#[derive(Clone)]
pub struct LaneDevices {
    pub camera: Arc<dyn CameraTrigger>,
    pub barrier: Arc<dyn BarrierDriver>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl LaneDevices {
    /// Devices that log every command instead of driving hardware
    ///
    /// Used by live mode when no real drivers are wired in, and handy in
    /// integration tests.
    pub fn logging() -> Self {
        let logging = Arc::new(LoggingDevices);
        LaneDevices {
            camera: logging.clone(),
            barrier: logging.clone(),
            notifications: logging,
        }
    }
}

/// Tracing-only device implementation
pub struct LoggingDevices;

impl CameraTrigger for LoggingDevices {
    fn request_capture(&self, lane_id: &str) -> Result<(), LaneEngineError> {
        tracing::info!(lane = %lane_id, "capture requested");
        Ok(())
    }
}

impl BarrierDriver for LoggingDevices {
    fn set(&self, lane_id: &str, command: BarrierCommand) -> Result<(), LaneEngineError> {
        tracing::info!(lane = %lane_id, %command, "barrier command");
        Ok(())
    }
}

impl NotificationSink for LoggingDevices {
    fn notify(&self, notification: EngineNotification) {
        tracing::info!(?notification, "engine notification");
    }
}

/// Records every command and notification; test collaborator
#[derive(Default)]
pub struct RecordingDevices {
    pub barrier_commands: Mutex<Vec<(String, BarrierCommand)>>,
    pub capture_requests: Mutex<Vec<String>>,
    pub notifications: Mutex<Vec<EngineNotification>>,
    /// When set, barrier commands fail this many times before succeeding
    pub barrier_failures: Mutex<u32>,
}

impl RecordingDevices {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingDevices::default())
    }

    pub fn failing_barrier(failures: u32) -> Arc<Self> {
        let devices = RecordingDevices::default();
        *devices.barrier_failures.lock() = failures;
        Arc::new(devices)
    }

    pub fn as_lane_devices(self: &Arc<Self>) -> LaneDevices {
        LaneDevices {
            camera: Arc::clone(self) as Arc<dyn CameraTrigger>,
            barrier: Arc::clone(self) as Arc<dyn BarrierDriver>,
            notifications: Arc::clone(self) as Arc<dyn NotificationSink>,
        }
    }
}

impl CameraTrigger for RecordingDevices {
    fn request_capture(&self, lane_id: &str) -> Result<(), LaneEngineError> {
        self.capture_requests.lock().push(lane_id.to_string());
        Ok(())
    }
}

impl BarrierDriver for RecordingDevices {
    fn set(&self, lane_id: &str, command: BarrierCommand) -> Result<(), LaneEngineError> {
        let mut failures = self.barrier_failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(LaneEngineError::transient_device(
                "barrier",
                lane_id,
                "actuator not responding",
            ));
        }
        self.barrier_commands
            .lock()
            .push((lane_id.to_string(), command));
        Ok(())
    }
}

impl NotificationSink for RecordingDevices {
    fn notify(&self, notification: EngineNotification) {
        self.notifications.lock().push(notification);
    }
}
