//! Session store
//!
//! Authoritative record of parking sessions, shared by every lane at a site.
//! Backed by `DashMap` for fine-grained locking: operations on different
//! plates proceed concurrently, while the unresolved-plate index serializes
//! operations on the same (site, plate) key.
//!
//! # Core correctness obligation
//!
//! `create_active` must be an atomic check-and-insert: the check for an
//! existing unresolved session and the insert happen under one index entry
//! lock, leaving no race window for two entry lanes admitting the same plate
//! simultaneously.
//!
//! # Audit
//!
//! Sessions are never deleted, and every status change appends to the
//! session's transition log, so the full history of a stay is reconstructible
//! for dispute resolution.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::types::event::Actor;
use crate::types::session::{
    NewSession, ParkingSession, Plate, SessionId, SessionStatus, SessionTransition, SiteId,
    Timestamp,
};
use crate::types::LaneEngineError;
use rust_decimal::Decimal;

/// Concurrent session store
///
/// Safe to share across lane tasks behind an `Arc`. Reads clone the session
/// out to avoid holding shard locks across caller logic.
#[derive(Debug)]
pub struct SessionStore {
    /// All sessions ever created, keyed by id; append-only from an audit
    /// perspective
    sessions: DashMap<SessionId, ParkingSession>,
    /// Unresolved (Active or Violation) session per (site, plate); the
    /// invariant lives here
    unresolved: DashMap<(SiteId, Plate), SessionId>,
    /// Next session id to allocate
    next_id: AtomicU64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore {
            sessions: DashMap::new(),
            unresolved: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Atomically create an Active session for a plate
    ///
    /// The duplicate check and the insert are one indivisible operation:
    /// the index entry lock is held from check to insert. A plate with an
    /// unresolved session is rejected, never queued.
    ///
    /// # Errors
    ///
    /// `DuplicateActiveSession` if an Active or Violation session already
    /// exists for this (site, plate).
    pub fn create_active(&self, new: NewSession) -> Result<SessionId, LaneEngineError> {
        let key = (new.site_id.clone(), new.plate.clone());

        match self.unresolved.entry(key) {
            Entry::Occupied(_) => Err(LaneEngineError::duplicate_active_session(
                &new.site_id,
                new.plate,
            )),
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let session = ParkingSession {
                    id,
                    plate: new.plate,
                    site_id: new.site_id,
                    entry_lane_id: new.entry_lane_id,
                    entry_at: new.entry_at,
                    exit_at: None,
                    vehicle_class: new.vehicle_class,
                    engine_displacement_cc: new.engine_displacement_cc,
                    status: SessionStatus::Active,
                    fee: None,
                    violation_reason: None,
                    transitions: vec![SessionTransition {
                        at: new.entry_at,
                        from: SessionStatus::Pending,
                        to: SessionStatus::Active,
                        actor: Actor::System,
                        note: None,
                    }],
                };
                self.sessions.insert(id, session);
                vacant.insert(id);
                Ok(id)
            }
        }
    }

    /// Look up the unresolved session for a plate, if any
    pub fn find_unresolved_by_plate(&self, site_id: &str, plate: &Plate) -> Option<ParkingSession> {
        let id = *self
            .unresolved
            .get(&(site_id.to_string(), plate.clone()))?;
        self.sessions.get(&id).map(|s| s.clone())
    }

    /// Complete a session: set exit timestamp and fee exactly once
    ///
    /// Allowed from Active (normal exit) and from Violation (operator
    /// settlement). The plate becomes available for a new entry.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for an unknown id, `SessionAlreadyCompleted` if the
    /// session is already closed.
    pub fn complete_session(
        &self,
        id: SessionId,
        exit_at: Timestamp,
        fee: Decimal,
        actor: Actor,
    ) -> Result<ParkingSession, LaneEngineError> {
        let updated = {
            let mut session = self
                .sessions
                .get_mut(&id)
                .ok_or_else(|| LaneEngineError::session_not_found(id, "complete_session"))?;

            if session.status == SessionStatus::Completed {
                return Err(LaneEngineError::session_already_completed(id));
            }

            let from = session.status;
            session.exit_at = Some(exit_at);
            session.fee = Some(fee);
            session.status = SessionStatus::Completed;
            session.transitions.push(SessionTransition {
                at: exit_at,
                from,
                to: SessionStatus::Completed,
                actor,
                note: None,
            });
            session.clone()
        };

        self.unresolved
            .remove_if(&(updated.site_id.clone(), updated.plate.clone()), |_, v| {
                *v == id
            });

        Ok(updated)
    }

    /// Flag a session for operator attention
    ///
    /// The session stays unresolved: it keeps blocking re-entry for the
    /// plate until an operator settles it via `complete_session`.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for an unknown id, `SessionAlreadyCompleted` if the
    /// session is already closed.
    pub fn mark_violation(
        &self,
        id: SessionId,
        reason: &str,
        at: Timestamp,
        actor: Actor,
    ) -> Result<ParkingSession, LaneEngineError> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| LaneEngineError::session_not_found(id, "mark_violation"))?;

        if session.status == SessionStatus::Completed {
            return Err(LaneEngineError::session_already_completed(id));
        }

        let from = session.status;
        session.status = SessionStatus::Violation;
        session.violation_reason = Some(reason.to_string());
        session.transitions.push(SessionTransition {
            at,
            from,
            to: SessionStatus::Violation,
            actor,
            note: Some(reason.to_string()),
        });

        Ok(session.clone())
    }

    /// A session by id
    pub fn get(&self, id: SessionId) -> Option<ParkingSession> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    /// All sessions, sorted by id for deterministic reporting
    pub fn all_sessions(&self) -> Vec<ParkingSession> {
        let mut sessions: Vec<ParkingSession> =
            self.sessions.iter().map(|s| s.clone()).collect();
        sessions.sort_by_key(|s| s.id);
        sessions
    }

    /// Number of sessions ever created
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::session::VehicleClass;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn plate(raw: &str) -> Plate {
        Plate::parse(raw).unwrap()
    }

    fn new_session(raw_plate: &str) -> NewSession {
        NewSession {
            plate: plate(raw_plate),
            site_id: "SITE-01".to_string(),
            entry_lane_id: "LANE-IN-01".to_string(),
            entry_at: Utc.with_ymd_and_hms(2023, 10, 27, 8, 30, 0).unwrap(),
            vehicle_class: VehicleClass::Car,
            engine_displacement_cc: None,
        }
    }

    #[test]
    fn test_create_active_assigns_sequential_ids() {
        let store = SessionStore::new();
        let a = store.create_active(new_session("59T1-123.45")).unwrap();
        let b = store.create_active(new_session("29A-999.99")).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_create_active_records_pending_to_active_transition() {
        let store = SessionStore::new();
        let id = store.create_active(new_session("59T1-123.45")).unwrap();

        let session = store.get(id).unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.transitions.len(), 1);
        assert_eq!(session.transitions[0].from, SessionStatus::Pending);
        assert_eq!(session.transitions[0].to, SessionStatus::Active);
    }

    #[test]
    fn test_duplicate_active_session_is_rejected() {
        // Scenario E: second entry for an already-active plate.
        let store = SessionStore::new();
        store.create_active(new_session("59T1-123.45")).unwrap();

        let result = store.create_active(new_session("59T1-123.45"));
        assert!(matches!(
            result.unwrap_err(),
            LaneEngineError::DuplicateActiveSession { .. }
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_same_plate_different_sites_do_not_conflict() {
        let store = SessionStore::new();
        store.create_active(new_session("59T1-123.45")).unwrap();

        let mut other_site = new_session("59T1-123.45");
        other_site.site_id = "SITE-02".to_string();
        assert!(store.create_active(other_site).is_ok());
    }

    #[test]
    fn test_complete_session_round_trip() {
        // create_active -> complete_session -> plate no longer unresolved.
        let store = SessionStore::new();
        let id = store.create_active(new_session("59T1-123.45")).unwrap();

        let exit_at = Utc.with_ymd_and_hms(2023, 10, 27, 12, 45, 0).unwrap();
        let completed = store
            .complete_session(id, exit_at, Decimal::from(55_000), Actor::System)
            .unwrap();

        assert_eq!(completed.status, SessionStatus::Completed);
        assert_eq!(completed.fee, Some(Decimal::from(55_000)));
        assert_eq!(completed.exit_at, Some(exit_at));
        assert!(store
            .find_unresolved_by_plate("SITE-01", &plate("59T1-123.45"))
            .is_none());

        // The plate can enter again now.
        assert!(store.create_active(new_session("59T1-123.45")).is_ok());
    }

    #[test]
    fn test_complete_session_twice_fails() {
        let store = SessionStore::new();
        let id = store.create_active(new_session("59T1-123.45")).unwrap();
        let exit_at = Utc.with_ymd_and_hms(2023, 10, 27, 12, 45, 0).unwrap();

        store
            .complete_session(id, exit_at, Decimal::ZERO, Actor::System)
            .unwrap();
        let result = store.complete_session(id, exit_at, Decimal::ZERO, Actor::System);
        assert!(matches!(
            result.unwrap_err(),
            LaneEngineError::SessionAlreadyCompleted { .. }
        ));
    }

    #[test]
    fn test_complete_unknown_session_fails() {
        let store = SessionStore::new();
        let result = store.complete_session(
            999,
            Utc::now(),
            Decimal::ZERO,
            Actor::System,
        );
        assert!(matches!(
            result.unwrap_err(),
            LaneEngineError::SessionNotFound { .. }
        ));
    }

    #[test]
    fn test_violation_keeps_plate_blocked() {
        let store = SessionStore::new();
        let id = store.create_active(new_session("59T1-123.45")).unwrap();

        let at = Utc.with_ymd_and_hms(2023, 10, 27, 9, 0, 0).unwrap();
        let flagged = store
            .mark_violation(id, "Blacklisted at exit", at, Actor::System)
            .unwrap();
        assert_eq!(flagged.status, SessionStatus::Violation);
        assert_eq!(
            flagged.violation_reason.as_deref(),
            Some("Blacklisted at exit")
        );

        // Still unresolved: re-entry stays blocked.
        assert!(store.create_active(new_session("59T1-123.45")).is_err());
        assert!(store
            .find_unresolved_by_plate("SITE-01", &plate("59T1-123.45"))
            .is_some());
    }

    #[test]
    fn test_operator_settles_violation_via_complete() {
        let store = SessionStore::new();
        let id = store.create_active(new_session("59T1-123.45")).unwrap();
        let at = Utc.with_ymd_and_hms(2023, 10, 27, 9, 0, 0).unwrap();
        store
            .mark_violation(id, "flagged", at, Actor::System)
            .unwrap();

        let settled = store
            .complete_session(
                id,
                at,
                Decimal::ZERO,
                Actor::Operator("U-02".to_string()),
            )
            .unwrap();
        assert_eq!(settled.status, SessionStatus::Completed);
        // Full history is retained: Pending->Active->Violation->Completed.
        assert_eq!(settled.transitions.len(), 3);
        assert!(store
            .find_unresolved_by_plate("SITE-01", &plate("59T1-123.45"))
            .is_none());
    }

    #[test]
    fn test_mark_violation_on_completed_session_fails() {
        let store = SessionStore::new();
        let id = store.create_active(new_session("59T1-123.45")).unwrap();
        let at = Utc.with_ymd_and_hms(2023, 10, 27, 12, 0, 0).unwrap();
        store
            .complete_session(id, at, Decimal::ZERO, Actor::System)
            .unwrap();

        let result = store.mark_violation(id, "late flag", at, Actor::System);
        assert!(matches!(
            result.unwrap_err(),
            LaneEngineError::SessionAlreadyCompleted { .. }
        ));
    }

    #[test]
    fn test_all_sessions_sorted_by_id() {
        let store = SessionStore::new();
        store.create_active(new_session("59T1-123.45")).unwrap();
        store.create_active(new_session("29A-999.99")).unwrap();
        store.create_active(new_session("51H-456.78")).unwrap();

        let sessions = store.all_sessions();
        let ids: Vec<SessionId> = sessions.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_concurrent_entries_admit_exactly_one() {
        // Many threads race create_active for the same plate; the atomic
        // check-and-insert must admit exactly one.
        let store = Arc::new(SessionStore::new());
        let mut handles = Vec::new();

        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                store.create_active(new_session("59T1-123.45")).is_ok()
            }));
        }

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_randomized_concurrent_entries_hold_invariant() {
        // Randomized concurrent entries and exits across a small plate pool:
        // at most one unresolved session per (site, plate) at any time.
        let store = Arc::new(SessionStore::new());
        let plates = ["59T112345", "29A99999", "51H45678", "30X11111"];
        let mut handles = Vec::new();

        for t in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    let raw = plates[(t * 7 + i * 3) % plates.len()];
                    match store.create_active(new_session(raw)) {
                        Ok(id) => {
                            if i % 2 == 0 {
                                let _ = store.complete_session(
                                    id,
                                    Utc::now(),
                                    Decimal::ZERO,
                                    Actor::System,
                                );
                            }
                        }
                        Err(LaneEngineError::DuplicateActiveSession { .. }) => {}
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Invariant check over the final state.
        for raw in plates {
            let p = plate(raw);
            let unresolved: Vec<_> = store
                .all_sessions()
                .into_iter()
                .filter(|s| s.plate == p && s.status.is_unresolved())
                .collect();
            assert!(
                unresolved.len() <= 1,
                "plate {} has {} unresolved sessions",
                raw,
                unresolved.len()
            );
        }
    }
}
