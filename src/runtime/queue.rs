//! Per-lane inbound queue with an evict-oldest overflow policy
//!
//! A tokio mpsc channel can only reject the newcomer when full, which is the
//! inverse of what a lane wants: the stale `vehicle_detected` pings at the
//! front of the queue are worthless once a fresh LPR result arrives. Each
//! lane therefore gets an explicit deque guarded by a `parking_lot` mutex,
//! with a `Notify` waking the single consumer task.
//!
//! On overflow the oldest droppable event is evicted in favor of the
//! newcomer. Operator commands, faults, and timer firings are never
//! displaced: when nothing in the queue can be evicted they are queued past
//! the configured depth, and an incoming droppable event is discarded
//! instead.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::runtime::lane_runtime::LaneMessage;

/// What the overflow policy did with a pushed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued without displacing anything
    Queued,
    /// Queue was full; the named oldest droppable event was evicted to make
    /// room
    Evicted(&'static str),
    /// Queue was full of undroppable messages; the incoming droppable event
    /// was discarded
    Rejected(&'static str),
}

/// Bounded inbound queue for one lane task
pub struct LaneQueue {
    messages: Mutex<VecDeque<LaneMessage>>,
    depth: usize,
    notify: Notify,
}

impl LaneQueue {
    pub fn new(depth: usize) -> Self {
        LaneQueue {
            messages: Mutex::new(VecDeque::with_capacity(depth)),
            depth,
            notify: Notify::new(),
        }
    }

    /// Push one message, applying the overflow policy when the queue is full
    ///
    /// Never blocks. The scan runs front to back, so the oldest droppable
    /// event ages out first.
    pub fn push(&self, message: LaneMessage) -> PushOutcome {
        let mut messages = self.messages.lock();

        let outcome = if messages.len() < self.depth {
            PushOutcome::Queued
        } else {
            match messages.iter().position(LaneMessage::is_droppable) {
                Some(idx) => {
                    let evicted = messages.remove(idx).expect("scanned index in bounds");
                    PushOutcome::Evicted(evicted.kind_name())
                }
                None if message.is_droppable() => {
                    return PushOutcome::Rejected(message.kind_name());
                }
                // Undroppable messages are admitted past the depth rather
                // than lost.
                None => PushOutcome::Queued,
            }
        };

        messages.push_back(message);
        drop(messages);
        self.notify.notify_one();
        outcome
    }

    /// Receive the next message, waiting while the queue is empty
    ///
    /// Single-consumer: one lane task per queue.
    pub async fn recv(&self) -> LaneMessage {
        loop {
            if let Some(message) = self.messages.lock().pop_front() {
                return message;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InboundEvent, LprEvent, LprSource, VehicleClass};
    use chrono::Utc;

    fn ping() -> LaneMessage {
        LaneMessage::Event {
            event: InboundEvent::VehicleDetected,
            at: Utc::now(),
        }
    }

    fn lpr() -> LaneMessage {
        LaneMessage::Event {
            event: InboundEvent::LprResult(LprEvent {
                plate: "59T1-123.45".to_string(),
                confidence: 0.95,
                captured_at: Utc::now(),
                lane_id: "LANE-IN-01".to_string(),
                image_ref: None,
                vehicle_class_hint: VehicleClass::Car,
                engine_displacement_cc: None,
                source: LprSource::Camera,
            }),
            at: Utc::now(),
        }
    }

    fn command() -> LaneMessage {
        LaneMessage::Event {
            event: InboundEvent::ManualOpen {
                operator: "U-02".to_string(),
            },
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_overflow_evicts_oldest_droppable_not_the_newcomer() {
        let queue = LaneQueue::new(2);
        assert_eq!(queue.push(ping()), PushOutcome::Queued);
        assert_eq!(queue.push(ping()), PushOutcome::Queued);

        // The fresh LPR result displaces the oldest stale ping.
        assert_eq!(queue.push(lpr()), PushOutcome::Evicted("vehicle_detected"));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.recv().await.kind_name(), "vehicle_detected");
        assert_eq!(queue.recv().await.kind_name(), "lpr_result");
    }

    #[test]
    fn test_commands_are_never_displaced_or_lost() {
        let queue = LaneQueue::new(1);
        assert_eq!(queue.push(command()), PushOutcome::Queued);

        // A second command exceeds the depth rather than being dropped.
        assert_eq!(queue.push(command()), PushOutcome::Queued);
        assert_eq!(queue.len(), 2);

        // A droppable event cannot displace a command.
        assert_eq!(queue.push(ping()), PushOutcome::Rejected("vehicle_detected"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_command_evicts_a_droppable_to_stay_within_depth() {
        let queue = LaneQueue::new(1);
        assert_eq!(queue.push(ping()), PushOutcome::Queued);
        assert_eq!(queue.push(command()), PushOutcome::Evicted("vehicle_detected"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_shutdown_is_not_droppable() {
        assert!(!LaneMessage::Shutdown.is_droppable());
        let queue = LaneQueue::new(1);
        queue.push(command());
        assert_eq!(queue.push(LaneMessage::Shutdown), PushOutcome::Queued);
        assert_eq!(queue.len(), 2);
    }
}
