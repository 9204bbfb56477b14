//! Per-lane async task
//!
//! Each lane gets one `LaneRuntime` task owning that lane's state machine,
//! which preserves the per-lane ordering guarantee: events for one lane are
//! applied strictly in queue order, while different lanes progress
//! concurrently.
//!
//! Timer effects become real `tokio::time::sleep` tasks that feed
//! `TimerElapsed` back through the lane's own queue; the machine's generation
//! counter discards firings that a later event superseded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::config::DispatcherConfig;
use crate::core::{LaneEffect, LaneStateMachine};
use crate::runtime::devices::LaneDevices;
use crate::runtime::queue::LaneQueue;
use crate::types::{BarrierCommand, InboundEvent, Timestamp};

/// Message delivered to a lane task
#[derive(Debug)]
pub enum LaneMessage {
    Event { event: InboundEvent, at: Timestamp },
    /// Drain and stop; sent by the dispatcher on shutdown
    Shutdown,
}

impl LaneMessage {
    /// Whether the overflow policy may evict or discard this message
    pub fn is_droppable(&self) -> bool {
        match self {
            LaneMessage::Event { event, .. } => event.is_droppable(),
            LaneMessage::Shutdown => false,
        }
    }

    /// Short name for logging and audit entries
    pub fn kind_name(&self) -> &'static str {
        match self {
            LaneMessage::Event { event, .. } => event.kind_name(),
            LaneMessage::Shutdown => "shutdown",
        }
    }
}

/// Owns one lane's state machine and executes its effects
pub struct LaneRuntime {
    machine: LaneStateMachine,
    devices: LaneDevices,
    dispatcher: DispatcherConfig,
    /// This lane's inbound queue; also fed by timers and device-failure
    /// feedback
    queue: Arc<LaneQueue>,
    timer: Option<JoinHandle<()>>,
}

impl LaneRuntime {
    pub fn new(
        machine: LaneStateMachine,
        devices: LaneDevices,
        dispatcher: DispatcherConfig,
        queue: Arc<LaneQueue>,
    ) -> Self {
        LaneRuntime {
            machine,
            devices,
            dispatcher,
            queue,
            timer: None,
        }
    }

    /// Run until shutdown, applying each event to completion before the next
    pub async fn run(mut self) {
        loop {
            match self.queue.recv().await {
                LaneMessage::Event { event, at } => {
                    let effects = self.machine.handle(event, at);
                    self.apply(effects).await;
                }
                LaneMessage::Shutdown => break,
            }
        }
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        tracing::debug!(lane = %self.machine.lane_id(), "lane task stopped");
    }

    async fn apply(&mut self, effects: Vec<LaneEffect>) {
        for effect in effects {
            match effect {
                LaneEffect::RequestCapture => {
                    if let Err(err) = self.devices.camera.request_capture(self.machine.lane_id()) {
                        tracing::warn!(lane = %self.machine.lane_id(), %err, "capture request failed");
                        self.feed_back(InboundEvent::CaptureFailed {
                            message: err.to_string(),
                        });
                    }
                }
                LaneEffect::Barrier(command) => self.drive_barrier(command).await,
                LaneEffect::ArmTimer {
                    kind,
                    duration,
                    generation,
                } => {
                    if let Some(old) = self.timer.take() {
                        old.abort();
                    }
                    let queue = Arc::clone(&self.queue);
                    self.timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(duration).await;
                        queue.push(LaneMessage::Event {
                            event: InboundEvent::TimerElapsed { kind, generation },
                            at: Utc::now(),
                        });
                    }));
                }
                LaneEffect::CancelTimer => {
                    if let Some(old) = self.timer.take() {
                        old.abort();
                    }
                }
                LaneEffect::Notify(notification) => {
                    self.devices.notifications.notify(notification);
                }
            }
        }
    }

    /// Actuate the barrier with bounded retries and exponential backoff
    ///
    /// Exhausted retries become a `DeviceFault` event, which takes the lane
    /// out of service until an operator clears it.
    async fn drive_barrier(&mut self, command: BarrierCommand) {
        let attempts = self.dispatcher.barrier_retry_attempts;
        let base = Duration::from_millis(self.dispatcher.barrier_retry_base_ms);

        for attempt in 0..attempts {
            match self.devices.barrier.set(self.machine.lane_id(), command) {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(
                        lane = %self.machine.lane_id(),
                        %command,
                        attempt = attempt + 1,
                        %err,
                        "barrier command failed"
                    );
                    if attempt + 1 < attempts {
                        tokio::time::sleep(base * 2u32.saturating_pow(attempt)).await;
                    } else {
                        self.feed_back(InboundEvent::DeviceFault {
                            message: format!(
                                "barrier {} failed after {} attempts: {}",
                                command, attempts, err
                            ),
                        });
                    }
                }
            }
        }
    }

    /// Enqueue a fault or failure event to ourselves
    ///
    /// These events are never droppable, so the push cannot lose them.
    fn feed_back(&self, event: InboundEvent) {
        self.queue.push(LaneMessage::Event {
            event,
            at: Utc::now(),
        });
    }
}
