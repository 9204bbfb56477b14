//! Event dispatcher
//!
//! Routes inbound events to per-lane bounded queues and owns the lane tasks.
//! Ordering is guaranteed within a lane; lanes progress independently.
//!
//! # Overflow policy
//!
//! When a lane queue is full, the oldest queued droppable event
//! (`vehicle_detected`, `lpr_result`, `lane_cleared`) is evicted in favor of
//! the newcomer, with a backpressure audit entry; a stale sensor ping is
//! worth less than the fresh event that follows it, and the physical world
//! will re-assert anything dropped. Operator commands and faults are never
//! evicted or discarded.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::core::{AuditLog, LaneStateMachine, PolicyEvaluator, SessionStore};
use crate::runtime::devices::LaneDevices;
use crate::runtime::lane_runtime::{LaneMessage, LaneRuntime};
use crate::runtime::queue::{LaneQueue, PushOutcome};
use crate::types::{Actor, AuditKind, InboundEvent, LaneEngineError, LaneId, Timestamp};

/// Routes events to lane tasks and owns their lifecycles
pub struct EngineDispatcher {
    queues: HashMap<LaneId, Arc<LaneQueue>>,
    handles: Vec<JoinHandle<()>>,
    store: Arc<SessionStore>,
    audit: Arc<AuditLog>,
}

impl EngineDispatcher {
    /// Validate the configuration and spawn one lane task per configured lane
    ///
    /// The policy evaluator, session store, tariff table, and audit log are
    /// shared across all lanes; each lane gets its own bounded queue and
    /// state machine.
    ///
    /// # Errors
    ///
    /// A malformed configuration is fatal here: no lane enters service.
    pub fn start(
        config: &EngineConfig,
        devices: LaneDevices,
    ) -> Result<Self, LaneEngineError> {
        config.validate()?;

        let store = Arc::new(SessionStore::new());
        let audit = Arc::new(AuditLog::new());
        let policy = Arc::new(PolicyEvaluator::new(&config.policy));
        let tariff = Arc::new(config.tariff.clone());

        let mut queues = HashMap::new();
        let mut handles = Vec::new();

        for lane_config in &config.lanes {
            let machine = LaneStateMachine::new(
                lane_config,
                config.timing.clone(),
                Arc::clone(&policy),
                Arc::clone(&store),
                Arc::clone(&tariff),
                Arc::clone(&audit),
            );

            let queue = Arc::new(LaneQueue::new(config.dispatcher.queue_depth));
            let runtime = LaneRuntime::new(
                machine,
                devices.clone(),
                config.dispatcher.clone(),
                Arc::clone(&queue),
            );

            tracing::info!(lane = %lane_config.lane_id, role = %lane_config.role, "lane task started");
            queues.insert(lane_config.lane_id.clone(), queue);
            handles.push(tokio::spawn(runtime.run()));
        }

        Ok(EngineDispatcher {
            queues,
            handles,
            store,
            audit,
        })
    }

    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    pub fn audit(&self) -> Arc<AuditLog> {
        Arc::clone(&self.audit)
    }

    /// Route one event to its lane
    ///
    /// Returns `UnknownLane` for an unrecognized lane id. Applies the
    /// overflow policy when the lane's queue is full; evictions and drops
    /// are audited, never errors.
    pub fn dispatch(
        &self,
        lane_id: &str,
        event: InboundEvent,
        at: Timestamp,
    ) -> Result<(), LaneEngineError> {
        let queue = self
            .queues
            .get(lane_id)
            .ok_or_else(|| LaneEngineError::unknown_lane(lane_id))?;

        match queue.push(LaneMessage::Event { event, at }) {
            PushOutcome::Queued => {}
            PushOutcome::Evicted(kind) => {
                tracing::warn!(lane = %lane_id, evicted = kind, "lane queue full, evicted oldest droppable event");
                self.audit.record(
                    at,
                    lane_id.to_string(),
                    Actor::System,
                    AuditKind::Backpressure,
                    None,
                    format!("Evicted oldest {} event, lane queue full", kind),
                );
            }
            PushOutcome::Rejected(kind) => {
                tracing::warn!(lane = %lane_id, event = kind, "lane queue full of undroppable messages, dropping event");
                self.audit.record(
                    at,
                    lane_id.to_string(),
                    Actor::System,
                    AuditKind::Backpressure,
                    None,
                    format!("Dropped {} event, lane queue full", kind),
                );
            }
        }
        Ok(())
    }

    /// Stop all lane tasks and wait for them to drain
    pub async fn shutdown(self) {
        for queue in self.queues.values() {
            queue.push(LaneMessage::Shutdown);
        }
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::devices::RecordingDevices;
    use crate::types::{LprEvent, LprSource, SessionStatus, VehicleClass};
    use chrono::{TimeZone, Utc};

    fn lpr(lane: &str, plate: &str, at: Timestamp) -> InboundEvent {
        InboundEvent::LprResult(LprEvent {
            plate: plate.to_string(),
            confidence: 0.95,
            captured_at: at,
            lane_id: lane.to_string(),
            image_ref: None,
            vehicle_class_hint: VehicleClass::Car,
            engine_displacement_cc: None,
            source: LprSource::Camera,
        })
    }

    #[tokio::test]
    async fn test_dispatch_routes_entry_and_exit() {
        let config = EngineConfig::default();
        let devices = RecordingDevices::new();
        let dispatcher = EngineDispatcher::start(&config, devices.as_lane_devices()).unwrap();
        let store = dispatcher.store();

        let entry_at = Utc.with_ymd_and_hms(2023, 10, 27, 8, 30, 0).unwrap();
        let exit_at = Utc.with_ymd_and_hms(2023, 10, 27, 12, 45, 0).unwrap();

        dispatcher
            .dispatch("LANE-IN-01", InboundEvent::VehicleDetected, entry_at)
            .unwrap();
        dispatcher
            .dispatch("LANE-IN-01", lpr("LANE-IN-01", "59T1-123.45", entry_at), entry_at)
            .unwrap();
        dispatcher
            .dispatch("LANE-IN-01", InboundEvent::LaneCleared, entry_at)
            .unwrap();

        // The entry lane commits the session on its own task; wait for it
        // before driving the exit lane.
        for _ in 0..200 {
            if store.len() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(store.len(), 1);

        dispatcher
            .dispatch("LANE-OUT-01", InboundEvent::VehicleDetected, exit_at)
            .unwrap();
        dispatcher
            .dispatch("LANE-OUT-01", lpr("LANE-OUT-01", "59T1-123.45", exit_at), exit_at)
            .unwrap();

        dispatcher.shutdown().await;

        let sessions = store.all_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].status, SessionStatus::Completed);
        assert_eq!(sessions[0].exit_at, Some(exit_at));
    }

    #[tokio::test]
    async fn test_unknown_lane_is_an_error() {
        let config = EngineConfig::default();
        let devices = RecordingDevices::new();
        let dispatcher = EngineDispatcher::start(&config, devices.as_lane_devices()).unwrap();

        let result = dispatcher.dispatch("LANE-99", InboundEvent::VehicleDetected, Utc::now());
        assert!(matches!(result, Err(LaneEngineError::UnknownLane { .. })));

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_refuses_to_start_lanes() {
        let mut config = EngineConfig::default();
        config.tariff.car.hourly_rate = rust_decimal::Decimal::from(-10_000);
        let devices = RecordingDevices::new();

        let result = EngineDispatcher::start(&config, devices.as_lane_devices());
        assert!(matches!(
            result.err().unwrap(),
            LaneEngineError::Configuration { .. }
        ));
    }

    #[tokio::test]
    async fn test_overflow_evicts_stale_pings_not_the_fresh_result() {
        // Current-thread runtime and no awaits between dispatches, so the
        // lane task cannot drain the queue while it fills.
        let mut config = EngineConfig::default();
        config.dispatcher.queue_depth = 4;
        let devices = RecordingDevices::new();
        let dispatcher = EngineDispatcher::start(&config, devices.as_lane_devices()).unwrap();
        let at = Utc.with_ymd_and_hms(2023, 10, 27, 8, 30, 0).unwrap();

        for _ in 0..4 {
            dispatcher
                .dispatch("LANE-IN-01", InboundEvent::VehicleDetected, at)
                .unwrap();
        }
        dispatcher
            .dispatch("LANE-IN-01", lpr("LANE-IN-01", "59T1-123.45", at), at)
            .unwrap();

        // The oldest stale ping aged out; the fresh result is still queued.
        assert_eq!(dispatcher.queues.get("LANE-IN-01").unwrap().len(), 4);

        let audit = dispatcher.audit();
        let details: Vec<String> = audit.snapshot().into_iter().map(|e| e.detail).collect();
        assert_eq!(
            details,
            vec!["Evicted oldest vehicle_detected event, lane queue full".to_string()]
        );

        let store = dispatcher.store();
        dispatcher.shutdown().await;

        // Draining the queue admits the vehicle: the LPR result survived.
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_operator_command_is_never_dropped() {
        let config = EngineConfig::default();
        let devices = RecordingDevices::new();
        let dispatcher = EngineDispatcher::start(&config, devices.as_lane_devices()).unwrap();
        let audit = dispatcher.audit();

        // Flood the queue with sensor events; evictions are audited, not
        // errors.
        for _ in 0..(config.dispatcher.queue_depth * 4) {
            dispatcher
                .dispatch("LANE-IN-01", InboundEvent::VehicleDetected, Utc::now())
                .unwrap();
        }

        // The override displaces a stale ping instead of being dropped.
        dispatcher
            .dispatch(
                "LANE-IN-01",
                InboundEvent::ManualOpen {
                    operator: "U-02".to_string(),
                },
                Utc::now(),
            )
            .unwrap();

        dispatcher.shutdown().await;

        let entries = audit.snapshot();
        assert!(entries
            .iter()
            .any(|e| e.kind == AuditKind::Override));
    }
}
