//! Lane state machine
//!
//! One instance per physical lane, entry or exit role. The machine is
//! deliberately synchronous and deterministic: `handle` consumes one inbound
//! event to completion (including the policy, store, and pricing calls) and
//! returns the device/timer effects for the host to execute. Timeouts are
//! first-class events delivered back as `TimerElapsed`, carrying a
//! generation counter so a timer that was superseded is ignored instead of
//! corrupting a newer cycle.
//!
//! Resting states:
//!
//! ```text
//! Idle -> Capturing -> {AwaitingManualConfirm | Rejecting | BarrierOpen}
//!      -> Idle, plus Fault and OutOfService
//! ```
//!
//! Evaluation and admission complete synchronously inside a single `handle`
//! call; the machine never rests mid-decision.
//!
//! Cancellation: `ManualOpen` and `LanePowerDown` are accepted mid-cycle and
//! always leave the lane clean; a session is only ever created at the moment
//! of a successful admission, so there is no half-created session to undo.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{LaneConfig, LaneRole, TimingConfig};
use crate::core::audit::AuditLog;
use crate::core::policy::PolicyEvaluator;
use crate::core::pricing::compute_fee;
use crate::core::session_store::SessionStore;
use crate::types::event::{
    Actor, AuditKind, BarrierCommand, EngineNotification, InboundEvent, LprEvent, LprSource,
    TimerKind,
};
use crate::types::policy::{VehicleAttributes, VerdictReason};
use crate::types::session::{LaneId, NewSession, Plate, SessionStatus, SiteId, Timestamp};
use crate::types::tariff::TariffTable;
use crate::types::LaneEngineError;

/// Resting states of a lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    /// No vehicle present
    Idle,
    /// Capture requested from the camera; `attempt` is 1 or 2
    Capturing { attempt: u8 },
    /// Waiting for an operator to type the plate
    AwaitingManualConfirm,
    /// Denial cool-down; suppresses re-triggers from the stationary vehicle
    Rejecting,
    /// Barrier is up, waiting for the lane-cleared signal or fail-open
    BarrierOpen,
    /// Barrier actuation failed after retries; operator must clear
    Fault,
    /// Powered down administratively or failed configuration at startup
    OutOfService,
}

/// Side effects for the host (runtime or replayer) to execute
///
/// The machine never touches a device directly; it asks through effects so
/// that replay and live operation share identical decision logic.
#[derive(Debug, Clone, PartialEq)]
pub enum LaneEffect {
    /// Ask the camera collaborator for an LPR capture
    RequestCapture,
    /// Command the barrier actuator
    Barrier(BarrierCommand),
    /// Arm the lane timer; supersedes any previously armed timer
    ArmTimer {
        kind: TimerKind,
        duration: Duration,
        generation: u64,
    },
    /// Drop any armed timer
    CancelTimer,
    /// Forward to UI/reporting collaborators
    Notify(EngineNotification),
}

/// One lane's state machine
///
/// Logically single-threaded: the host must deliver events one at a time.
/// Shared collaborators (store, policy, audit) are internally synchronized.
pub struct LaneStateMachine {
    lane_id: LaneId,
    site_id: SiteId,
    role: LaneRole,
    timing: TimingConfig,
    policy: Arc<PolicyEvaluator>,
    store: Arc<SessionStore>,
    tariff: Arc<TariffTable>,
    audit: Arc<AuditLog>,
    state: LaneState,
    /// Bumped on every arm/cancel; stale `TimerElapsed` events are ignored
    timer_generation: u64,
}

impl LaneStateMachine {
    pub fn new(
        config: &LaneConfig,
        timing: TimingConfig,
        policy: Arc<PolicyEvaluator>,
        store: Arc<SessionStore>,
        tariff: Arc<TariffTable>,
        audit: Arc<AuditLog>,
    ) -> Self {
        LaneStateMachine {
            lane_id: config.lane_id.clone(),
            site_id: config.site_id.clone(),
            role: config.role,
            timing,
            policy,
            store,
            tariff,
            audit,
            state: LaneState::Idle,
            timer_generation: 0,
        }
    }

    pub fn lane_id(&self) -> &str {
        &self.lane_id
    }

    pub fn role(&self) -> LaneRole {
        self.role
    }

    pub fn state(&self) -> LaneState {
        self.state
    }

    /// Process one inbound event to completion
    pub fn handle(&mut self, event: InboundEvent, now: Timestamp) -> Vec<LaneEffect> {
        tracing::debug!(
            lane = %self.lane_id,
            state = ?self.state,
            event = event.kind_name(),
            "lane event"
        );

        // Commands honored in (almost) any state.
        match event {
            InboundEvent::ManualOpen { operator } => return self.manual_open(operator, now),
            InboundEvent::LanePowerDown { operator } => return self.power_down(operator, now),
            InboundEvent::LanePowerUp { operator } => return self.power_up(operator, now),
            InboundEvent::ClearFault { operator } => return self.clear_fault(operator, now),
            InboundEvent::DeviceFault { message } => return self.device_fault(&message, now),
            _ => {}
        }

        // A faulted or powered-down lane ignores traffic until cleared.
        if matches!(self.state, LaneState::Fault | LaneState::OutOfService) {
            tracing::debug!(lane = %self.lane_id, "event ignored while out of service");
            return Vec::new();
        }

        match (self.state, event) {
            (LaneState::Idle, InboundEvent::VehicleDetected) => self.begin_capture(1),

            (LaneState::Capturing { .. }, InboundEvent::LprResult(lpr)) => {
                self.evaluate(lpr, Actor::System, now)
            }
            (
                LaneState::Capturing { attempt },
                InboundEvent::TimerElapsed {
                    kind: TimerKind::CaptureTimeout,
                    generation,
                },
            ) if self.timer_is_current(generation) => self.capture_missed(attempt),
            (LaneState::Capturing { attempt }, InboundEvent::CaptureFailed { message }) => {
                tracing::warn!(lane = %self.lane_id, %message, "capture request failed");
                self.capture_missed(attempt)
            }

            // A late camera result is still better than typing the plate.
            (LaneState::AwaitingManualConfirm, InboundEvent::LprResult(lpr)) => {
                self.evaluate(lpr, Actor::System, now)
            }
            (
                LaneState::AwaitingManualConfirm,
                InboundEvent::ManualPlateEntry {
                    plate,
                    vehicle_class,
                    operator,
                },
            ) => {
                let lpr = LprEvent::manual(self.lane_id.clone(), plate, vehicle_class, now);
                self.evaluate(lpr, Actor::Operator(operator), now)
            }

            (
                LaneState::Rejecting,
                InboundEvent::TimerElapsed {
                    kind: TimerKind::RejectCoolDown,
                    generation,
                },
            ) if self.timer_is_current(generation) => {
                self.state = LaneState::Idle;
                Vec::new()
            }

            (LaneState::BarrierOpen, InboundEvent::LaneCleared) => self.close_and_idle(),
            (
                LaneState::BarrierOpen,
                InboundEvent::TimerElapsed {
                    kind: TimerKind::BarrierOpenTimeout,
                    generation,
                },
            ) if self.timer_is_current(generation) => {
                tracing::warn!(lane = %self.lane_id, "no lane-cleared signal; closing after fail-open timeout");
                self.audit.record(
                    now,
                    self.lane_id.clone(),
                    Actor::System,
                    AuditKind::Decision,
                    None,
                    "Barrier closed after fail-open timeout without lane-cleared signal",
                );
                self.close_and_idle()
            }

            // Everything else is a no-op for the current state: duplicate
            // sensor pings, stale timers, out-of-phase operator input.
            (_, other) => {
                tracing::debug!(
                    lane = %self.lane_id,
                    state = ?self.state,
                    event = other.kind_name(),
                    "event ignored in current state"
                );
                Vec::new()
            }
        }
    }

    fn timer_is_current(&self, generation: u64) -> bool {
        generation == self.timer_generation
    }

    fn arm_timer(&mut self, kind: TimerKind, duration: Duration) -> LaneEffect {
        self.timer_generation += 1;
        LaneEffect::ArmTimer {
            kind,
            duration,
            generation: self.timer_generation,
        }
    }

    fn cancel_timer(&mut self) -> LaneEffect {
        self.timer_generation += 1;
        LaneEffect::CancelTimer
    }

    fn begin_capture(&mut self, attempt: u8) -> Vec<LaneEffect> {
        self.state = LaneState::Capturing { attempt };
        let timer = self.arm_timer(TimerKind::CaptureTimeout, self.timing.capture_timeout());
        vec![LaneEffect::RequestCapture, timer]
    }

    /// Capture window elapsed or the camera refused: retry once, then fall
    /// back to manual plate entry. The vehicle-present event is never
    /// silently dropped.
    fn capture_missed(&mut self, attempt: u8) -> Vec<LaneEffect> {
        if attempt < 2 {
            tracing::info!(lane = %self.lane_id, "capture missed; retrying once");
            self.begin_capture(attempt + 1)
        } else {
            self.state = LaneState::AwaitingManualConfirm;
            let cancel = self.cancel_timer();
            vec![
                cancel,
                LaneEffect::Notify(EngineNotification::ManualReviewRequested {
                    lane_id: self.lane_id.clone(),
                    detail: "No LPR result; operator must enter the plate".to_string(),
                }),
            ]
        }
    }

    /// The Evaluating/Admitting phases: policy verdict, then the role-specific
    /// admission path, all within this event.
    fn evaluate(&mut self, lpr: LprEvent, actor: Actor, now: Timestamp) -> Vec<LaneEffect> {
        let mut effects = vec![self.cancel_timer()];

        let attrs = VehicleAttributes {
            vehicle_class: lpr.vehicle_class_hint,
            engine_displacement_cc: lpr.engine_displacement_cc,
        };
        let verdict = self.policy.evaluate(&lpr, &attrs);
        let plate = Plate::parse(&lpr.plate).ok();

        self.audit.record(
            now,
            self.lane_id.clone(),
            actor.clone(),
            AuditKind::Decision,
            plate.clone(),
            format!(
                "{} at {} lane: {}",
                if verdict.admitted { "Admit" } else { "Reject" },
                self.role,
                verdict.detail
            ),
        );

        if verdict.admitted {
            // Policy::evaluate only admits plates it could normalize.
            let plate = match plate {
                Some(plate) => plate,
                None => {
                    return self.reject(
                        effects,
                        None,
                        VerdictReason::ConfidenceTooLow,
                        "Plate unreadable".to_string(),
                        now,
                    )
                }
            };
            match self.role {
                LaneRole::Entry => self.admit_entry(effects, plate, &lpr, now, actor),
                LaneRole::Exit => {
                    self.admit_exit(effects, plate, now, actor, verdict.whitelisted)
                }
            }
        } else if verdict.requires_manual_review && lpr.source == LprSource::Camera {
            self.state = LaneState::AwaitingManualConfirm;
            effects.push(LaneEffect::Notify(EngineNotification::ManualReviewRequested {
                lane_id: self.lane_id.clone(),
                detail: verdict.detail,
            }));
            effects
        } else {
            // An exit-side blacklist or regulatory hit flags the open session
            // so the plate stays blocked until an operator settles it.
            if self.role == LaneRole::Exit
                && matches!(
                    verdict.reason,
                    VerdictReason::Blacklisted | VerdictReason::RegulatoryViolation
                )
            {
                if let Some(plate) = plate.as_ref() {
                    if let Some(open) =
                        self.store.find_unresolved_by_plate(&self.site_id, plate)
                    {
                        if open.status == SessionStatus::Active {
                            match self.store.mark_violation(
                                open.id,
                                &verdict.detail,
                                now,
                                actor.clone(),
                            ) {
                                Ok(flagged) => effects.push(LaneEffect::Notify(
                                    EngineNotification::SessionChanged(Box::new(flagged)),
                                )),
                                Err(err) => {
                                    tracing::error!(lane = %self.lane_id, %err, "failed to flag session")
                                }
                            }
                        }
                    }
                }
            }
            self.reject(effects, plate, verdict.reason, verdict.detail, now)
        }
    }

    fn admit_entry(
        &mut self,
        mut effects: Vec<LaneEffect>,
        plate: Plate,
        lpr: &LprEvent,
        now: Timestamp,
        actor: Actor,
    ) -> Vec<LaneEffect> {
        let new = NewSession {
            plate: plate.clone(),
            site_id: self.site_id.clone(),
            entry_lane_id: self.lane_id.clone(),
            entry_at: now,
            vehicle_class: lpr.vehicle_class_hint,
            engine_displacement_cc: lpr.engine_displacement_cc,
        };

        match self.store.create_active(new) {
            Ok(id) => {
                if let Some(session) = self.store.get(id) {
                    effects.push(LaneEffect::Notify(EngineNotification::SessionChanged(
                        Box::new(session),
                    )));
                }
                self.open_barrier(&mut effects);
                effects
            }
            Err(err @ LaneEngineError::DuplicateActiveSession { .. }) => {
                // Data-integrity event: surfaced, never resolved by overwrite.
                tracing::error!(lane = %self.lane_id, %err, "duplicate active session");
                self.audit.record(
                    now,
                    self.lane_id.clone(),
                    actor,
                    AuditKind::Decision,
                    Some(plate.clone()),
                    err.to_string(),
                );
                self.reject(
                    effects,
                    Some(plate),
                    VerdictReason::DuplicateActiveSession,
                    err.to_string(),
                    now,
                )
            }
            Err(err) => {
                tracing::error!(lane = %self.lane_id, %err, "session creation failed");
                self.reject(
                    effects,
                    Some(plate),
                    VerdictReason::DuplicateActiveSession,
                    err.to_string(),
                    now,
                )
            }
        }
    }

    fn admit_exit(
        &mut self,
        mut effects: Vec<LaneEffect>,
        plate: Plate,
        now: Timestamp,
        actor: Actor,
        whitelisted: bool,
    ) -> Vec<LaneEffect> {
        let open = match self.store.find_unresolved_by_plate(&self.site_id, &plate) {
            Some(session) => session,
            None => {
                // Walk-in/ticketless: manual operator override path.
                return self.reject(
                    effects,
                    Some(plate.clone()),
                    VerdictReason::NoActiveSession,
                    LaneEngineError::no_active_session(&self.site_id, plate).to_string(),
                    now,
                );
            }
        };

        if open.status == SessionStatus::Violation {
            let detail = format!(
                "Session {} is flagged ({}); operator must settle it",
                open.id,
                open.violation_reason.as_deref().unwrap_or("no reason recorded")
            );
            return self.reject(effects, Some(plate), VerdictReason::NoActiveSession, detail, now);
        }

        let fee = match compute_fee(
            open.entry_at,
            now,
            open.vehicle_class,
            whitelisted,
            &self.tariff,
        ) {
            Ok(fee) => fee,
            Err(err) => {
                // Pricing errors never crash the lane; they degrade to an
                // operator-visible denial.
                tracing::error!(lane = %self.lane_id, %err, "fee computation failed");
                self.audit.record(
                    now,
                    self.lane_id.clone(),
                    Actor::System,
                    AuditKind::Fault,
                    Some(plate.clone()),
                    format!("Fee computation failed: {}", err),
                );
                return self.reject(
                    effects,
                    Some(plate),
                    VerdictReason::NoActiveSession,
                    "Fee computation failed; operator assistance required".to_string(),
                    now,
                );
            }
        };

        match self.store.complete_session(open.id, now, fee, actor) {
            Ok(completed) => {
                effects.push(LaneEffect::Notify(EngineNotification::SessionChanged(
                    Box::new(completed),
                )));
                self.open_barrier(&mut effects);
                effects
            }
            Err(err) => {
                tracing::error!(lane = %self.lane_id, %err, "session completion failed");
                self.reject(
                    effects,
                    Some(plate),
                    VerdictReason::NoActiveSession,
                    err.to_string(),
                    now,
                )
            }
        }
    }

    fn open_barrier(&mut self, effects: &mut Vec<LaneEffect>) {
        self.state = LaneState::BarrierOpen;
        effects.push(LaneEffect::Barrier(BarrierCommand::Open));
        let timer = self.arm_timer(
            TimerKind::BarrierOpenTimeout,
            self.timing.barrier_open_timeout(),
        );
        effects.push(timer);
    }

    fn reject(
        &mut self,
        mut effects: Vec<LaneEffect>,
        plate: Option<Plate>,
        reason: VerdictReason,
        detail: String,
        _now: Timestamp,
    ) -> Vec<LaneEffect> {
        self.state = LaneState::Rejecting;
        effects.push(LaneEffect::Barrier(BarrierCommand::Close));
        effects.push(LaneEffect::Notify(EngineNotification::Denial {
            lane_id: self.lane_id.clone(),
            plate,
            reason: detail,
        }));
        tracing::info!(lane = %self.lane_id, %reason, "passage denied");
        let timer = self.arm_timer(TimerKind::RejectCoolDown, self.timing.reject_cooldown());
        effects.push(timer);
        effects
    }

    fn close_and_idle(&mut self) -> Vec<LaneEffect> {
        self.state = LaneState::Idle;
        let cancel = self.cancel_timer();
        vec![cancel, LaneEffect::Barrier(BarrierCommand::Close)]
    }

    /// Operator override: force the barrier open from any state except
    /// `BarrierOpen`, bypassing the policy evaluator entirely. Always
    /// attributable; always audited.
    fn manual_open(&mut self, operator: String, now: Timestamp) -> Vec<LaneEffect> {
        if self.state == LaneState::BarrierOpen {
            tracing::debug!(lane = %self.lane_id, "manual open ignored; barrier already open");
            return Vec::new();
        }

        self.audit.record(
            now,
            self.lane_id.clone(),
            Actor::Operator(operator),
            AuditKind::Override,
            None,
            "Manual open override, policy evaluation bypassed",
        );

        let mut effects = vec![self.cancel_timer()];
        self.open_barrier(&mut effects);
        effects
    }

    fn power_down(&mut self, operator: String, now: Timestamp) -> Vec<LaneEffect> {
        self.audit.record(
            now,
            self.lane_id.clone(),
            Actor::Operator(operator),
            AuditKind::Power,
            None,
            "Lane powered down",
        );
        self.state = LaneState::OutOfService;
        let cancel = self.cancel_timer();
        vec![
            cancel,
            LaneEffect::Barrier(BarrierCommand::Close),
            LaneEffect::Notify(EngineNotification::LaneOutOfService {
                lane_id: self.lane_id.clone(),
                reason: "Powered down by operator".to_string(),
            }),
        ]
    }

    fn power_up(&mut self, operator: String, now: Timestamp) -> Vec<LaneEffect> {
        if self.state != LaneState::OutOfService {
            return Vec::new();
        }
        self.audit.record(
            now,
            self.lane_id.clone(),
            Actor::Operator(operator),
            AuditKind::Power,
            None,
            "Lane powered up",
        );
        self.state = LaneState::Idle;
        vec![LaneEffect::Notify(EngineNotification::LaneBackInService {
            lane_id: self.lane_id.clone(),
        })]
    }

    fn clear_fault(&mut self, operator: String, now: Timestamp) -> Vec<LaneEffect> {
        if self.state != LaneState::Fault {
            return Vec::new();
        }
        self.audit.record(
            now,
            self.lane_id.clone(),
            Actor::Operator(operator),
            AuditKind::Fault,
            None,
            "Device fault cleared by operator",
        );
        self.state = LaneState::Idle;
        vec![LaneEffect::Notify(EngineNotification::LaneBackInService {
            lane_id: self.lane_id.clone(),
        })]
    }

    /// Barrier actuation failed after all retries: the lane goes out of
    /// service until an operator intervenes.
    fn device_fault(&mut self, message: &str, now: Timestamp) -> Vec<LaneEffect> {
        self.audit.record(
            now,
            self.lane_id.clone(),
            Actor::System,
            AuditKind::Fault,
            None,
            format!("Device fault: {}", message),
        );
        self.state = LaneState::Fault;
        let cancel = self.cancel_timer();
        vec![
            cancel,
            LaneEffect::Notify(EngineNotification::LaneOutOfService {
                lane_id: self.lane_id.clone(),
                reason: format!("Device fault: {}", message),
            }),
        ]
    }
}
