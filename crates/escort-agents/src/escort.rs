//! Escort state machine: one officer walking one subject through the
//! facility.
//!
//! A single machine body serves every officer role: the differences between
//! a release escort, an intake escort, and a generic walk live entirely in
//! the [`EscortPlan`] descriptor (which doors, which stations, which wait
//! kinds). Door crossings are delegated to the owned [`DoorInteraction`].
//!
//! Two timing rules shape this machine:
//! - agent-driven phases (navigation, door mechanics) are timeout-bounded;
//! - human-paced waits (subject clearing a door, acting at a station) never
//!   time out, and station waits advance only on an explicit acknowledgment.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use coordination::{
    Coordinator, DoorId, DoorRegistry, EscortEvent, EscortKind, EventBus, OfficerId, Point,
    SubjectId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::compliance::ComplianceMonitor;
use crate::config::EscortConfig;
use crate::door_interaction::{DoorInteraction, InteractionOutcome};
use crate::world::{MoveStatus, World};

/// High-level phases of an escort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscortPhase {
    Idle,
    /// Walking to the subject's location.
    FetchingSubject,
    /// Cycling the origin door (open, dwell, secure) so the subject can exit.
    OpeningOriginDoor,
    /// Waiting for the subject to join the officer. Human-paced.
    WaitingForSubjectClear,
    /// Crossing a facility transition door (pass-through).
    CrossingTransitionDoor,
    /// Walking the subject to the current station.
    MovingToStation,
    /// Waiting for the station's acknowledgment. Human-paced.
    WaitingAtStation,
    /// Walking back to the officer's post.
    ReturningToPost,
    Completed,
    Failed,
}

impl EscortPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Completed | Self::Failed)
    }
}

impl fmt::Display for EscortPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::FetchingSubject => "FetchingSubject",
            Self::OpeningOriginDoor => "OpeningOriginDoor",
            Self::WaitingForSubjectClear => "WaitingForSubjectClear",
            Self::CrossingTransitionDoor => "CrossingTransitionDoor",
            Self::MovingToStation => "MovingToStation",
            Self::WaitingAtStation => "WaitingAtStation",
            Self::ReturningToPost => "ReturningToPost",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Legal escort phase transitions.
///
/// ```text
/// Idle → FetchingSubject
/// FetchingSubject → OpeningOriginDoor
/// OpeningOriginDoor → WaitingForSubjectClear
/// WaitingForSubjectClear → CrossingTransitionDoor | MovingToStation
/// CrossingTransitionDoor → MovingToStation
/// MovingToStation → WaitingAtStation
/// WaitingAtStation → MovingToStation (next station)
/// ReturningToPost → Completed | Failed
/// ```
/// Any active phase may short-circuit to `ReturningToPost` (subject lost) or
/// go to `Failed` (fatal error, cancellation).
fn is_legal_phase_transition(from: EscortPhase, to: EscortPhase) -> bool {
    use EscortPhase::*;

    if from.is_active() && matches!(to, Failed | ReturningToPost) {
        return true;
    }

    matches!(
        (from, to),
        (Idle, FetchingSubject)
            | (FetchingSubject, OpeningOriginDoor)
            | (OpeningOriginDoor, WaitingForSubjectClear)
            | (WaitingForSubjectClear, CrossingTransitionDoor)
            | (WaitingForSubjectClear, MovingToStation)
            | (CrossingTransitionDoor, MovingToStation)
            | (MovingToStation, WaitingAtStation)
            | (WaitingAtStation, MovingToStation)
            | (ReturningToPost, Completed)
    )
}

/// What releases the escort from a station wait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationWait {
    /// The subject explicitly confirms they are ready (a menu choice, not
    /// proximity, not elapsed time).
    Confirmation,
    /// A terminal scan completes.
    Scan,
    /// A fixed pause, for stations with no interactive step.
    Dwell(Duration),
}

/// A stop along the escort route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub point: Point,
    pub wait: StationWait,
}

/// Role descriptor: the complete data difference between officer roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscortPlan {
    pub kind: EscortKind,
    /// Where the subject starts (outside their cell, at the entry, ...).
    pub fetch_point: Point,
    /// Door the officer cycles so the subject can exit (operation-only).
    pub origin_door: DoorId,
    /// Pass-through door between facility areas, if the route crosses one.
    pub transition_door: Option<DoorId>,
    pub stations: Vec<Station>,
    /// The officer's post, returned to on completion or abort.
    pub post: Point,
}

impl EscortPlan {
    /// Typical release route: cell → belongings storage (confirmation) →
    /// exit scanner (scan) → post.
    pub fn release(
        origin_door: DoorId,
        fetch_point: Point,
        transition_door: Option<DoorId>,
        storage_point: Point,
        scanner_point: Point,
        post: Point,
    ) -> Self {
        Self {
            kind: EscortKind::Release,
            fetch_point,
            origin_door,
            transition_door,
            stations: vec![
                Station {
                    name: "storage".to_string(),
                    point: storage_point,
                    wait: StationWait::Confirmation,
                },
                Station {
                    name: "scanner".to_string(),
                    point: scanner_point,
                    wait: StationWait::Scan,
                },
            ],
            post,
        }
    }

    /// Typical intake route: entry → scanner (scan) → assigned cell
    /// (confirmation) → post.
    pub fn intake(
        origin_door: DoorId,
        fetch_point: Point,
        transition_door: Option<DoorId>,
        scanner_point: Point,
        cell_point: Point,
        post: Point,
    ) -> Self {
        Self {
            kind: EscortKind::Intake,
            fetch_point,
            origin_door,
            transition_door,
            stations: vec![
                Station {
                    name: "scanner".to_string(),
                    point: scanner_point,
                    wait: StationWait::Scan,
                },
                Station {
                    name: "cell".to_string(),
                    point: cell_point,
                    wait: StationWait::Confirmation,
                },
            ],
            post,
        }
    }
}

/// A recorded phase transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub from: EscortPhase,
    pub to: EscortPhase,
    pub at: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Errors an escort tick can surface to the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum EscortError {
    #[error("door interaction could not start for {door}")]
    InteractionRejected { door: DoorId },
}

/// Per-officer bookkeeping that survives phase changes.
#[derive(Debug, Clone, Default)]
pub struct OfficerAgentState {
    /// Escort-level navigation retries used.
    pub retries: u32,
    pub last_subject_pos: Option<Point>,
    /// Measured duration of the first completed return-to-post leg.
    pub learned_return_time: Option<Duration>,
}

enum NavProgress {
    Pending,
    Arrived,
}

/// The escort state machine.
pub struct EscortMachine {
    officer: OfficerId,
    subject: SubjectId,
    plan: EscortPlan,
    config: EscortConfig,
    phase: EscortPhase,
    phase_entered: Duration,
    station_idx: usize,
    door: DoorInteraction,
    compliance: ComplianceMonitor,
    agent_state: OfficerAgentState,
    move_requested: bool,
    confirm_pending: bool,
    scan_pending: bool,
    return_started: Option<Duration>,
    /// Set when the escort aborted and is walking back; the failure event has
    /// already been published.
    aborted: bool,
    registered: bool,
    transitions: Vec<PhaseRecord>,
}

impl EscortMachine {
    pub fn new(
        officer: OfficerId,
        subject: SubjectId,
        plan: EscortPlan,
        config: EscortConfig,
    ) -> Self {
        let door = DoorInteraction::new(officer.clone(), config.clone());
        let compliance = ComplianceMonitor::new(config.compliance.clone());
        Self {
            officer,
            subject,
            plan,
            config,
            phase: EscortPhase::Idle,
            phase_entered: Duration::ZERO,
            station_idx: 0,
            door,
            compliance,
            agent_state: OfficerAgentState::default(),
            move_requested: false,
            confirm_pending: false,
            scan_pending: false,
            return_started: None,
            aborted: false,
            registered: false,
            transitions: Vec::new(),
        }
    }

    pub fn officer(&self) -> &OfficerId {
        &self.officer
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn phase(&self) -> EscortPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn patience(&self) -> f32 {
        self.compliance.patience()
    }

    pub fn learned_return_time(&self) -> Option<Duration> {
        self.agent_state.learned_return_time
    }

    pub fn transitions(&self) -> &[PhaseRecord] {
        &self.transitions
    }

    /// Wait kind of the station the escort is currently at, if any.
    pub fn current_wait(&self) -> Option<StationWait> {
        if self.phase != EscortPhase::WaitingAtStation {
            return None;
        }
        self.plan.stations.get(self.station_idx).map(|s| s.wait)
    }

    /// Register with the coordinator and leave `Idle`. Returns `false` when
    /// the coordinator rejects the session (subject busy, cross-kind grace).
    pub fn start(&mut self, coordinator: &mut Coordinator, bus: &EventBus, now: Duration) -> bool {
        if self.phase != EscortPhase::Idle {
            return false;
        }
        match coordinator.register_escort(&self.officer, self.plan.kind, &self.subject, now) {
            Ok(()) => {
                self.registered = true;
                bus.publish(EscortEvent::EscortStarted {
                    officer: self.officer.clone(),
                    subject: self.subject.clone(),
                    kind: self.plan.kind,
                    timestamp: Utc::now(),
                });
                let mut route = vec![self.plan.fetch_point];
                route.extend(self.plan.stations.iter().map(|s| s.point));
                route.push(self.plan.post);
                coordinator.set_route(&self.officer, route);
                coordinator.set_destination(&self.officer, Some(self.plan.fetch_point));
                self.go(EscortPhase::FetchingSubject, now, "registered", bus);
                true
            }
            Err(e) => {
                info!(officer = %self.officer, subject = %self.subject, "Escort not started: {e}");
                false
            }
        }
    }

    /// Cancel the escort immediately, releasing the session and any lease.
    pub fn cancel(
        &mut self,
        world: &mut dyn World,
        coordinator: &mut Coordinator,
        bus: &EventBus,
        now: Duration,
    ) {
        if !self.phase.is_active() {
            return;
        }
        self.fail(world, coordinator, bus, now, "escort cancelled".to_string());
    }

    /// Subject-driven acknowledgment for confirmation stations.
    pub fn confirm_ready(&mut self) {
        self.confirm_pending = true;
    }

    /// Terminal-driven acknowledgment for scanner stations.
    pub fn scan_completed(&mut self) {
        self.scan_pending = true;
    }

    /// Advance the escort by one scheduler tick.
    pub fn tick(
        &mut self,
        world: &mut dyn World,
        registry: &DoorRegistry,
        coordinator: &mut Coordinator,
        bus: &EventBus,
        now: Duration,
    ) -> Result<(), EscortError> {
        if !self.phase.is_active() {
            return Ok(());
        }

        // Subject liveness gates every phase except the walk home.
        if self.phase != EscortPhase::ReturningToPost {
            let officer_pos = world.officer_position(&self.officer);
            match world.subject_position(&self.subject) {
                Some(pos) if officer_pos.distance(&pos) <= self.config.subject_lost_distance => {
                    self.agent_state.last_subject_pos = Some(pos);
                }
                Some(_) => {
                    self.abort_to_post(world, coordinator, bus, now, "subject out of range");
                    return Ok(());
                }
                None => {
                    self.abort_to_post(world, coordinator, bus, now, "subject reference lost");
                    return Ok(());
                }
            }
        }

        match self.phase {
            EscortPhase::FetchingSubject => {
                let target = self.plan.fetch_point;
                match self.tick_nav(world, target, now) {
                    Err(reason) => self.fail(world, coordinator, bus, now, reason),
                    Ok(NavProgress::Arrived) => {
                        let origin = self.plan.origin_door.clone();
                        if !self.door.begin(registry, &origin, Some(self.subject.clone()), now) {
                            return Err(EscortError::InteractionRejected { door: origin });
                        }
                        self.go(EscortPhase::OpeningOriginDoor, now, "at origin door", bus);
                    }
                    Ok(NavProgress::Pending) => {}
                }
            }
            EscortPhase::OpeningOriginDoor | EscortPhase::CrossingTransitionDoor => {
                self.tick_door_phase(world, coordinator, bus, now);
            }
            EscortPhase::WaitingForSubjectClear => {
                // Human-paced: no timeout. The subject walks out on their own.
                let officer_pos = world.officer_position(&self.officer);
                let cleared = self
                    .agent_state
                    .last_subject_pos
                    .map(|pos| officer_pos.distance(&pos) <= self.config.clear_distance)
                    .unwrap_or(false);
                if cleared {
                    if let Some(gate) = self.plan.transition_door.clone() {
                        if !self.door.begin(registry, &gate, Some(self.subject.clone()), now) {
                            return Err(EscortError::InteractionRejected { door: gate });
                        }
                        self.compliance.resume(now);
                        self.go(EscortPhase::CrossingTransitionDoor, now, "subject cleared", bus);
                    } else {
                        self.advance_to_next_station(coordinator, bus, now, "subject cleared");
                    }
                }
            }
            EscortPhase::MovingToStation => {
                self.observe_compliance(world, bus, now);
                let Some(target) = self.plan.stations.get(self.station_idx).map(|s| s.point)
                else {
                    self.begin_return(coordinator, bus, now, "no station to walk to");
                    return Ok(());
                };
                match self.tick_nav(world, target, now) {
                    Err(reason) => self.fail(world, coordinator, bus, now, reason),
                    Ok(NavProgress::Arrived) => {
                        // Stale acknowledgments from before arrival never count.
                        self.confirm_pending = false;
                        self.scan_pending = false;
                        self.go(EscortPhase::WaitingAtStation, now, "at station", bus);
                    }
                    Ok(NavProgress::Pending) => {}
                }
            }
            EscortPhase::WaitingAtStation => {
                // Human-paced: no timeout, ever. Only the matching explicit
                // signal (or the configured dwell) releases the wait.
                let Some(wait) = self.plan.stations.get(self.station_idx).map(|s| s.wait) else {
                    self.begin_return(coordinator, bus, now, "station index out of plan");
                    return Ok(());
                };
                let released = match wait {
                    StationWait::Confirmation => std::mem::take(&mut self.confirm_pending),
                    StationWait::Scan => std::mem::take(&mut self.scan_pending),
                    StationWait::Dwell(d) => now.saturating_sub(self.phase_entered) >= d,
                };
                if released {
                    self.station_idx += 1;
                    self.advance_to_next_station(coordinator, bus, now, "station done");
                }
            }
            EscortPhase::ReturningToPost => {
                let target = self.plan.post;
                match self.tick_nav(world, target, now) {
                    Err(reason) => self.fail(world, coordinator, bus, now, reason),
                    Ok(NavProgress::Arrived) => self.finish_return(coordinator, bus, now),
                    Ok(NavProgress::Pending) => {}
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Drive the owned door interaction and map its outcome onto escort phases.
    fn tick_door_phase(
        &mut self,
        world: &mut dyn World,
        coordinator: &mut Coordinator,
        bus: &EventBus,
        now: Duration,
    ) {
        if self.phase == EscortPhase::CrossingTransitionDoor {
            self.observe_compliance(world, bus, now);
        }
        match self.door.tick(world, coordinator, now) {
            Some(InteractionOutcome::Complete { door }) => {
                bus.publish(EscortEvent::InteractionComplete {
                    officer: self.officer.clone(),
                    door,
                    timestamp: Utc::now(),
                });
                match self.phase {
                    EscortPhase::OpeningOriginDoor => {
                        self.go(EscortPhase::WaitingForSubjectClear, now, "origin door cycled", bus);
                    }
                    EscortPhase::CrossingTransitionDoor => {
                        self.advance_to_next_station(coordinator, bus, now, "transition crossed");
                    }
                    _ => {}
                }
            }
            Some(InteractionOutcome::Failed { door, reason }) => {
                bus.publish(EscortEvent::InteractionFailed {
                    officer: self.officer.clone(),
                    door: door.clone(),
                    reason: reason.clone(),
                    timestamp: Utc::now(),
                });
                self.fail(
                    world,
                    coordinator,
                    bus,
                    now,
                    format!("door interaction failed at {door}: {reason}"),
                );
            }
            None => {}
        }
    }

    /// Walk toward the current station, or head home when the plan is done.
    fn advance_to_next_station(
        &mut self,
        coordinator: &mut Coordinator,
        bus: &EventBus,
        now: Duration,
        reason: &str,
    ) {
        if let Some(station) = self.plan.stations.get(self.station_idx) {
            coordinator.set_destination(&self.officer, Some(station.point));
            self.compliance.resume(now);
            self.go(EscortPhase::MovingToStation, now, reason, bus);
        } else {
            self.begin_return(coordinator, bus, now, reason);
        }
    }

    fn begin_return(
        &mut self,
        coordinator: &mut Coordinator,
        bus: &EventBus,
        now: Duration,
        reason: &str,
    ) {
        self.return_started = Some(now);
        coordinator.set_destination(&self.officer, Some(self.plan.post));
        self.go(EscortPhase::ReturningToPost, now, reason, bus);
    }

    fn finish_return(&mut self, coordinator: &mut Coordinator, bus: &EventBus, now: Duration) {
        if let Some(started) = self.return_started.take() {
            if self.agent_state.learned_return_time.is_none() {
                let elapsed = now.saturating_sub(started);
                info!(
                    officer = %self.officer,
                    secs = elapsed.as_secs_f32(),
                    "Learned return-to-post travel time"
                );
                self.agent_state.learned_return_time = Some(elapsed);
            }
        }
        if self.aborted {
            // The failure event already went out when the escort aborted.
            self.go(EscortPhase::Failed, now, "back at post after abort", bus);
            return;
        }
        if self.registered {
            coordinator.unregister_escort(&self.officer);
            self.registered = false;
        }
        bus.publish(EscortEvent::EscortCompleted {
            officer: self.officer.clone(),
            subject: self.subject.clone(),
            timestamp: Utc::now(),
        });
        self.go(EscortPhase::Completed, now, "back at post", bus);
    }

    /// Subject gone: run owed door cleanup, release the session, walk home.
    fn abort_to_post(
        &mut self,
        world: &mut dyn World,
        coordinator: &mut Coordinator,
        bus: &EventBus,
        now: Duration,
        reason: &str,
    ) {
        warn!(officer = %self.officer, subject = %self.subject, reason, "Escort aborting to post");
        self.door.stop(world, coordinator, now);
        if self.registered {
            coordinator.unregister_escort(&self.officer);
            self.registered = false;
        }
        bus.publish(EscortEvent::EscortFailed {
            officer: self.officer.clone(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        self.aborted = true;
        self.move_requested = false;
        self.begin_return(coordinator, bus, now, reason);
    }

    fn fail(
        &mut self,
        world: &mut dyn World,
        coordinator: &mut Coordinator,
        bus: &EventBus,
        now: Duration,
        reason: String,
    ) {
        warn!(officer = %self.officer, reason = %reason, "Escort failed");
        self.door.stop(world, coordinator, now);
        if self.registered {
            coordinator.unregister_escort(&self.officer);
            self.registered = false;
        }
        // An aborted escort already reported its failure when it turned for
        // home; don't report it twice.
        if !self.aborted {
            bus.publish(EscortEvent::EscortFailed {
                officer: self.officer.clone(),
                reason: reason.clone(),
                timestamp: Utc::now(),
            });
        }
        self.go(EscortPhase::Failed, now, &reason, bus);
    }

    /// One navigation leg with timeout, bounded retries, and the
    /// teleport-snap last resort for an accepted-but-stalled walk.
    fn tick_nav(
        &mut self,
        world: &mut dyn World,
        target: Point,
        now: Duration,
    ) -> Result<NavProgress, String> {
        if now.saturating_sub(self.phase_entered) >= self.config.navigation_timeout() {
            self.agent_state.retries += 1;
            if self.agent_state.retries > self.config.max_attempts {
                if world.move_status(&self.officer) == MoveStatus::Moving {
                    warn!(officer = %self.officer, "Escort navigation stalled, teleport-snapping");
                    world.teleport(&self.officer, target);
                    self.move_requested = false;
                    return Ok(NavProgress::Arrived);
                }
                return Err(format!(
                    "navigation retry budget ({}) exhausted in {}",
                    self.config.max_attempts, self.phase
                ));
            }
            warn!(
                officer = %self.officer,
                phase = %self.phase,
                retry = self.agent_state.retries,
                "Escort navigation timed out, re-requesting"
            );
            self.move_requested = false;
            self.phase_entered = now;
            return Ok(NavProgress::Pending);
        }

        if !self.move_requested && world.request_move(&self.officer, target) {
            self.move_requested = true;
        }
        if self.move_requested {
            match world.move_status(&self.officer) {
                MoveStatus::Arrived => {
                    self.move_requested = false;
                    return Ok(NavProgress::Arrived);
                }
                MoveStatus::Failed => {
                    debug!(officer = %self.officer, "Navigation reported failure, re-requesting");
                    self.move_requested = false;
                }
                _ => {}
            }
        }
        Ok(NavProgress::Pending)
    }

    fn observe_compliance(&mut self, world: &mut dyn World, bus: &EventBus, now: Duration) {
        let officer_pos = world.officer_position(&self.officer);
        let Some(subject_pos) = world.subject_position(&self.subject) else {
            return;
        };
        if let Some(warning) = self.compliance.observe(officer_pos, subject_pos, now) {
            world.say(&self.officer, warning.line);
            bus.publish(EscortEvent::ComplianceWarning {
                officer: self.officer.clone(),
                subject: self.subject.clone(),
                band: warning.band.as_str().to_string(),
                line: warning.line.to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    fn go(&mut self, to: EscortPhase, now: Duration, reason: &str, bus: &EventBus) {
        if !is_legal_phase_transition(self.phase, to) {
            tracing::error!(officer = %self.officer, from = %self.phase, to = %to, "Illegal escort transition suppressed");
            return;
        }
        debug!(officer = %self.officer, from = %self.phase, to = %to, reason, "Escort phase transition");
        bus.publish(EscortEvent::PhaseChanged {
            officer: self.officer.clone(),
            from: self.phase.to_string(),
            to: to.to_string(),
            timestamp: Utc::now(),
        });
        self.transitions.push(PhaseRecord {
            from: self.phase,
            to,
            at: now,
            reason: Some(reason.to_string()),
        });
        self.phase = to;
        self.phase_entered = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_table_rejects_shortcuts() {
        use EscortPhase::*;
        assert!(!is_legal_phase_transition(Idle, MovingToStation));
        assert!(!is_legal_phase_transition(FetchingSubject, WaitingAtStation));
        assert!(!is_legal_phase_transition(Completed, FetchingSubject));
        assert!(!is_legal_phase_transition(Idle, Failed));
    }

    #[test]
    fn test_phase_table_allows_abort_paths() {
        use EscortPhase::*;
        assert!(is_legal_phase_transition(MovingToStation, ReturningToPost));
        assert!(is_legal_phase_transition(WaitingAtStation, Failed));
        assert!(is_legal_phase_transition(OpeningOriginDoor, ReturningToPost));
        assert!(is_legal_phase_transition(ReturningToPost, Failed));
    }

    #[test]
    fn test_release_plan_shape() {
        let plan = EscortPlan::release(
            DoorId::from("Cell-A-1"),
            Point::new(1.0, 0.0, 0.0),
            Some(DoorId::from("Gate-1")),
            Point::new(20.0, 0.0, 0.0),
            Point::new(30.0, 0.0, 0.0),
            Point::ORIGIN,
        );
        assert_eq!(plan.kind, EscortKind::Release);
        assert_eq!(plan.stations.len(), 2);
        assert_eq!(plan.stations[0].wait, StationWait::Confirmation);
        assert_eq!(plan.stations[1].wait, StationWait::Scan);
    }

    #[test]
    fn test_intake_plan_scans_first() {
        let plan = EscortPlan::intake(
            DoorId::from("Entry-1"),
            Point::ORIGIN,
            None,
            Point::new(5.0, 0.0, 0.0),
            Point::new(15.0, 0.0, 0.0),
            Point::ORIGIN,
        );
        assert_eq!(plan.kind, EscortKind::Intake);
        assert_eq!(plan.stations[0].wait, StationWait::Scan);
        assert_eq!(plan.stations[1].wait, StationWait::Confirmation);
    }
}
