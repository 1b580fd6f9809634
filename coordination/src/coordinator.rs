//! Door/escort coordinator: the single arbiter for shared resources.
//!
//! Owns the lease table and the escort-session registry. Everything here is
//! plain sequential check-then-set: the scheduler ticks all officers from one
//! logical thread, so a `&mut` method call is already atomic with respect to
//! every other officer.
//!
//! The cross-kind conflict rule is deliberately conservative: any two escorts
//! of differing kinds conflict during the grace window, regardless of actual
//! route geometry. An unnecessary delay is tolerable; two officers fighting
//! over one corridor is not.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::door::{DoorId, Point};
use crate::lease::DoorLease;
use crate::session::{EscortKind, EscortSession, OfficerId, SubjectId};

/// Tunables for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Default lease window when callers do not specify one.
    pub default_lease_ttl: Duration,
    /// A younger-than-this session of a different kind blocks registration.
    pub conflict_grace: Duration,
    /// Sessions older than this get swept as stale.
    pub session_stale_after: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_lease_ttl: Duration::from_secs(10),
            conflict_grace: Duration::from_secs(5),
            session_stale_after: Duration::from_secs(300),
        }
    }
}

/// Why an escort registration was rejected.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoordinationError {
    #[error("subject {subject} already has an active escort session")]
    SubjectBusy { subject: SubjectId },

    #[error("officer {officer} already has an active escort session")]
    OfficerBusy { officer: OfficerId },

    #[error(
        "conflicting {blocking_kind} escort by {blocking_officer} is {age_ms}ms old (grace {grace_ms}ms)"
    )]
    CrossKindConflict {
        blocking_officer: OfficerId,
        blocking_kind: EscortKind,
        age_ms: u64,
        grace_ms: u64,
    },
}

/// Process-wide arbiter for door leases and escort sessions.
///
/// Explicitly constructed by the scheduler and passed by reference into the
/// state machines; nothing here is global.
#[derive(Debug, Default)]
pub struct Coordinator {
    config: CoordinatorConfig,
    leases: HashMap<DoorId, DoorLease>,
    sessions: HashMap<OfficerId, EscortSession>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            leases: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Grant a lease iff no unexpired lease by another holder exists for the
    /// door. Re-reservation by the current holder refreshes the window.
    pub fn reserve_door(
        &mut self,
        door: &DoorId,
        holder: &OfficerId,
        ttl: Duration,
        now: Duration,
    ) -> bool {
        if let Some(lease) = self.leases.get(door) {
            if !lease.expired(now) && lease.holder != *holder {
                debug!(
                    door = %door,
                    holder = %holder,
                    held_by = %lease.holder,
                    remaining_ms = lease.remaining(now).as_millis() as u64,
                    "Door reservation rejected"
                );
                return false;
            }
        }
        debug!(door = %door, holder = %holder, ttl_ms = ttl.as_millis() as u64, "Door reserved");
        self.leases.insert(
            door.clone(),
            DoorLease::new(door.clone(), holder.clone(), now, ttl),
        );
        true
    }

    /// Release a lease. Idempotent; a mismatched holder is a no-op.
    pub fn release_door(&mut self, door: &DoorId, holder: &OfficerId) {
        if let Some(lease) = self.leases.get(door) {
            if lease.holder == *holder {
                self.leases.remove(door);
                debug!(door = %door, holder = %holder, "Door lease released");
            }
        }
    }

    /// The officer currently holding an unexpired lease on the door, if any.
    pub fn lease_holder(&self, door: &DoorId, now: Duration) -> Option<&OfficerId> {
        self.leases
            .get(door)
            .filter(|lease| !lease.expired(now))
            .map(|lease| &lease.holder)
    }

    /// Register a new escort session.
    ///
    /// Rejects when the subject or officer already has a session, or when a
    /// session of a *different* kind is younger than the grace period.
    pub fn register_escort(
        &mut self,
        officer: &OfficerId,
        kind: EscortKind,
        subject: &SubjectId,
        now: Duration,
    ) -> Result<(), CoordinationError> {
        if let Some(existing) = self.sessions.values().find(|s| s.subject == *subject) {
            debug!(subject = %subject, held_by = %existing.officer, "Escort registration rejected: subject busy");
            return Err(CoordinationError::SubjectBusy {
                subject: subject.clone(),
            });
        }
        if self.sessions.contains_key(officer) {
            debug!(officer = %officer, "Escort registration rejected: officer busy");
            return Err(CoordinationError::OfficerBusy {
                officer: officer.clone(),
            });
        }
        if let Some(conflict) = self
            .sessions
            .values()
            .find(|s| s.kind != kind && s.age(now) < self.config.conflict_grace)
        {
            debug!(
                officer = %officer,
                kind = %kind,
                blocking_officer = %conflict.officer,
                blocking_kind = %conflict.kind,
                "Escort registration rejected: cross-kind conflict"
            );
            return Err(CoordinationError::CrossKindConflict {
                blocking_officer: conflict.officer.clone(),
                blocking_kind: conflict.kind,
                age_ms: conflict.age(now).as_millis() as u64,
                grace_ms: self.config.conflict_grace.as_millis() as u64,
            });
        }

        info!(officer = %officer, subject = %subject, kind = %kind, "Escort session registered");
        self.sessions.insert(
            officer.clone(),
            EscortSession::new(officer.clone(), subject.clone(), kind, now),
        );
        Ok(())
    }

    /// Remove an officer's session and every lease they still hold. Idempotent.
    pub fn unregister_escort(&mut self, officer: &OfficerId) {
        if self.sessions.remove(officer).is_some() {
            info!(officer = %officer, "Escort session unregistered");
        }
        self.leases.retain(|door, lease| {
            let keep = lease.holder != *officer;
            if !keep {
                debug!(door = %door, officer = %officer, "Lease released with session");
            }
            keep
        });
    }

    /// Update the destination recorded on an officer's session.
    pub fn set_destination(&mut self, officer: &OfficerId, destination: Option<Point>) {
        if let Some(session) = self.sessions.get_mut(officer) {
            session.current_destination = destination;
        }
    }

    /// Record the waypoints an officer's escort intends to visit.
    pub fn set_route(&mut self, officer: &OfficerId, route: Vec<Point>) {
        if let Some(session) = self.sessions.get_mut(officer) {
            session.planned_route = route;
        }
    }

    pub fn session_for_officer(&self, officer: &OfficerId) -> Option<&EscortSession> {
        self.sessions.get(officer)
    }

    pub fn session_for_subject(&self, subject: &SubjectId) -> Option<&EscortSession> {
        self.sessions.values().find(|s| s.subject == *subject)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn active_leases(&self, now: Duration) -> usize {
        self.leases.values().filter(|l| !l.expired(now)).count()
    }

    /// Periodic self-healing: drop expired leases and stale sessions.
    ///
    /// Called once per scheduler tick. Silent from the caller's point of
    /// view; a swept session means something upstream died mid-escort.
    pub fn sweep(&mut self, now: Duration) {
        self.leases.retain(|door, lease| {
            let keep = !lease.expired(now);
            if !keep {
                debug!(door = %door, holder = %lease.holder, "Lease expired, swept");
            }
            keep
        });
        let stale_after = self.config.session_stale_after;
        self.sessions.retain(|officer, session| {
            let keep = !session.is_stale(now, stale_after);
            if !keep {
                warn!(
                    officer = %officer,
                    subject = %session.subject,
                    age_secs = session.age(now).as_secs(),
                    "Stale escort session swept"
                );
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_reserve_then_reject_then_expire() {
        let mut c = Coordinator::default();
        let door = DoorId::from("Gate-1");
        let alice = OfficerId::from("alice");
        let bob = OfficerId::from("bob");

        assert!(c.reserve_door(&door, &alice, secs(10), secs(0)));
        assert!(!c.reserve_door(&door, &bob, secs(10), secs(3)));
        assert!(c.reserve_door(&door, &bob, secs(10), secs(11)));
        assert_eq!(c.lease_holder(&door, secs(11)), Some(&bob));
    }

    #[test]
    fn test_holder_refreshes_own_lease() {
        let mut c = Coordinator::default();
        let door = DoorId::from("Gate-1");
        let alice = OfficerId::from("alice");

        assert!(c.reserve_door(&door, &alice, secs(10), secs(0)));
        assert!(c.reserve_door(&door, &alice, secs(10), secs(8)));
        // Refreshed at t=8, so still held at t=15.
        assert_eq!(c.lease_holder(&door, secs(15)), Some(&alice));
    }

    #[test]
    fn test_release_is_holder_checked() {
        let mut c = Coordinator::default();
        let door = DoorId::from("Gate-1");
        let alice = OfficerId::from("alice");
        let bob = OfficerId::from("bob");

        assert!(c.reserve_door(&door, &alice, secs(10), secs(0)));
        c.release_door(&door, &bob);
        assert_eq!(c.lease_holder(&door, secs(1)), Some(&alice));
        c.release_door(&door, &alice);
        assert_eq!(c.lease_holder(&door, secs(1)), None);
        // Idempotent.
        c.release_door(&door, &alice);
    }

    #[test]
    fn test_subject_uniqueness() {
        let mut c = Coordinator::default();
        let subject = SubjectId::from("p1");
        c.register_escort(&OfficerId::from("alice"), EscortKind::Release, &subject, secs(0))
            .unwrap();
        // Same kind, different officer, same subject: still rejected.
        let err = c
            .register_escort(&OfficerId::from("bob"), EscortKind::Release, &subject, secs(60))
            .unwrap_err();
        assert!(matches!(err, CoordinationError::SubjectBusy { .. }));
    }

    #[test]
    fn test_officer_uniqueness() {
        let mut c = Coordinator::default();
        let alice = OfficerId::from("alice");
        c.register_escort(&alice, EscortKind::Release, &SubjectId::from("p1"), secs(0))
            .unwrap();
        let err = c
            .register_escort(&alice, EscortKind::Release, &SubjectId::from("p2"), secs(60))
            .unwrap_err();
        assert!(matches!(err, CoordinationError::OfficerBusy { .. }));
    }

    #[test]
    fn test_cross_kind_grace_window() {
        let mut c = Coordinator::default();
        c.register_escort(
            &OfficerId::from("alice"),
            EscortKind::Release,
            &SubjectId::from("p1"),
            secs(0),
        )
        .unwrap();

        // Different kind 2s later: inside the 5s grace, rejected.
        let err = c
            .register_escort(
                &OfficerId::from("bob"),
                EscortKind::Intake,
                &SubjectId::from("p2"),
                secs(2),
            )
            .unwrap_err();
        assert!(matches!(err, CoordinationError::CrossKindConflict { .. }));

        // Retried at 6s: grace elapsed, accepted.
        c.register_escort(
            &OfficerId::from("bob"),
            EscortKind::Intake,
            &SubjectId::from("p2"),
            secs(6),
        )
        .unwrap();
        assert_eq!(c.active_sessions(), 2);
    }

    #[test]
    fn test_same_kind_never_conflicts() {
        let mut c = Coordinator::default();
        c.register_escort(
            &OfficerId::from("alice"),
            EscortKind::Release,
            &SubjectId::from("p1"),
            secs(0),
        )
        .unwrap();
        c.register_escort(
            &OfficerId::from("bob"),
            EscortKind::Release,
            &SubjectId::from("p2"),
            secs(1),
        )
        .unwrap();
        assert_eq!(c.active_sessions(), 2);
    }

    #[test]
    fn test_unregister_releases_leases() {
        let mut c = Coordinator::default();
        let alice = OfficerId::from("alice");
        let door = DoorId::from("Gate-1");
        c.register_escort(&alice, EscortKind::Release, &SubjectId::from("p1"), secs(0))
            .unwrap();
        assert!(c.reserve_door(&door, &alice, secs(10), secs(1)));

        c.unregister_escort(&alice);
        assert_eq!(c.active_sessions(), 0);
        assert_eq!(c.lease_holder(&door, secs(2)), None);
        // Idempotent.
        c.unregister_escort(&alice);
    }

    #[test]
    fn test_sweep_purges_stale_sessions_and_expired_leases() {
        let mut c = Coordinator::default();
        let alice = OfficerId::from("alice");
        let door = DoorId::from("Gate-1");
        c.register_escort(&alice, EscortKind::Generic, &SubjectId::from("p1"), secs(0))
            .unwrap();
        c.reserve_door(&door, &alice, secs(10), secs(0));

        c.sweep(secs(299));
        assert_eq!(c.active_sessions(), 1);
        assert_eq!(c.active_leases(secs(299)), 0);

        c.sweep(secs(301));
        assert_eq!(c.active_sessions(), 0);
    }
}
