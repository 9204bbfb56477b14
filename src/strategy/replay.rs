//! Deterministic event-log replay
//!
//! Replays a recorded lane event log against the engine with a simulated
//! clock: every decision uses the timestamps from the log, and timer firings
//! are synthesized whenever the log's clock passes an armed deadline. Two
//! replays of the same log produce byte-identical session reports, which
//! makes recorded incidents reproducible on a desk.
//!
//! Device effects carry no weight here: the log already contains the world's
//! responses (LPR results, lane-cleared signals), so capture requests and
//! barrier commands are dropped and only timers and notifications are
//! simulated.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::core::{AuditLog, LaneEffect, LaneStateMachine, PolicyEvaluator, SessionStore};
use crate::io::csv_format::write_sessions_csv;
use crate::io::sync_reader::EventLogReader;
use crate::strategy::ProcessingStrategy;
use crate::types::{InboundEvent, LaneEngineError, LaneId, TimerKind, Timestamp};

/// A timer armed by a lane, pending on the simulated clock
#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    kind: TimerKind,
    due_at: Timestamp,
    generation: u64,
}

/// One lane under simulation: its machine plus the armed timer, if any
struct LaneSim {
    machine: LaneStateMachine,
    timer: Option<PendingTimer>,
}

impl LaneSim {
    /// Feed one event through the machine and absorb the effects
    fn step(&mut self, event: InboundEvent, now: Timestamp) {
        let effects = self.machine.handle(event, now);
        for effect in effects {
            match effect {
                LaneEffect::ArmTimer {
                    kind,
                    duration,
                    generation,
                } => {
                    let delta = chrono::Duration::from_std(duration)
                        .unwrap_or_else(|_| chrono::Duration::zero());
                    self.timer = Some(PendingTimer {
                        kind,
                        due_at: now + delta,
                        generation,
                    });
                }
                LaneEffect::CancelTimer => self.timer = None,
                LaneEffect::Notify(notification) => {
                    tracing::debug!(?notification, "replay notification");
                }
                // The log already carries the world's responses.
                LaneEffect::RequestCapture | LaneEffect::Barrier(_) => {}
            }
        }
    }
}

/// Deterministic replay strategy
///
/// Single-threaded by design; per-lane ordering is trivially the log order
/// and the output is reproducible.
pub struct ReplayStrategy {
    config: EngineConfig,
}

impl ReplayStrategy {
    pub fn new(config: EngineConfig) -> Self {
        ReplayStrategy { config }
    }

    fn build_lanes(
        &self,
        store: &Arc<SessionStore>,
        audit: &Arc<AuditLog>,
    ) -> HashMap<LaneId, LaneSim> {
        let policy = Arc::new(PolicyEvaluator::new(&self.config.policy));
        let tariff = Arc::new(self.config.tariff.clone());

        self.config
            .lanes
            .iter()
            .map(|lane_config| {
                let machine = LaneStateMachine::new(
                    lane_config,
                    self.config.timing.clone(),
                    Arc::clone(&policy),
                    Arc::clone(store),
                    Arc::clone(&tariff),
                    Arc::clone(audit),
                );
                (
                    lane_config.lane_id.clone(),
                    LaneSim {
                        machine,
                        timer: None,
                    },
                )
            })
            .collect()
    }
}

/// Fire every armed timer whose deadline is at or before `up_to`, earliest
/// first across all lanes
///
/// Firing a timer may arm a successor (a capture retry arms a second capture
/// window), so this loops until no due timer remains.
fn fire_due_timers(lanes: &mut HashMap<LaneId, LaneSim>, up_to: Timestamp) {
    loop {
        let next = lanes
            .iter()
            .filter_map(|(id, sim)| sim.timer.map(|t| (id.clone(), t)))
            .filter(|(_, t)| t.due_at <= up_to)
            .min_by_key(|(_, t)| t.due_at);

        let Some((lane_id, timer)) = next else {
            break;
        };

        if let Some(sim) = lanes.get_mut(&lane_id) {
            sim.timer = None;
            sim.step(
                InboundEvent::TimerElapsed {
                    kind: timer.kind,
                    generation: timer.generation,
                },
                timer.due_at,
            );
        }
    }
}

impl ProcessingStrategy for ReplayStrategy {
    /// Replay the log and write the session report
    ///
    /// Per-row parse failures and unknown lane ids are logged and skipped;
    /// a malformed configuration, opening the input, or writing the output
    /// can fail.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LaneEngineError> {
        self.config.validate()?;

        let store = Arc::new(SessionStore::new());
        let audit = Arc::new(AuditLog::new());
        let mut lanes = self.build_lanes(&store, &audit);

        let reader = EventLogReader::new(input_path)?;
        for item in reader {
            let timed = match item {
                Ok(timed) => timed,
                Err(err) => {
                    tracing::warn!(%err, "skipping malformed event record");
                    continue;
                }
            };

            fire_due_timers(&mut lanes, timed.at);

            match lanes.get_mut(&timed.lane_id) {
                Some(sim) => sim.step(timed.event, timed.at),
                None => {
                    tracing::warn!(lane = %timed.lane_id, "event for unconfigured lane, skipping")
                }
            }
        }

        // Settle pending timers so lanes finish their cycles (cool-downs
        // expire, open barriers fail closed).
        fire_due_timers(&mut lanes, DateTime::<Utc>::MAX_UTC);

        write_sessions_csv(&store.all_sessions(), output)
    }
}
