//! Door interaction state machine: one agent, one door, one session.
//!
//! Drives an officer through approach → operate → (wait | pass through) →
//! secure for a single door. Every transition is guarded by a legality table
//! and recorded, so a stuck interaction can be diagnosed from its log.
//!
//! The machine holds the door's lease from the moment it operates until the
//! door is secured, failed, or stopped. Timeouts restart the attempt from
//! navigation; attempt exhaustion fails the session and the machine returns
//! to idle after a short delay.

use std::fmt;
use std::time::Duration;

use coordination::{Coordinator, DoorId, DoorRegistry, DoorState, InteractionMode, OfficerId, Point, SubjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::EscortConfig;
use crate::world::{MoveStatus, World};

/// States of one door interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorInteractionState {
    /// No interaction in progress.
    Idle,
    /// Walking to the approach anchor.
    NavigatingToApproach,
    /// At the anchor, settling before turning to face the door.
    AtApproach,
    /// Holding the lease, unlocking and opening.
    Operating,
    /// Operation-only: dwelling so the subject can act.
    WaitingForSubject,
    /// Pass-through: walking to the exit anchor with blocking disabled.
    MovingThrough,
    /// Pass-through: re-enabling the blocking proxy on the far side.
    AtExit,
    /// Closing and re-locking.
    Securing,
    /// Finished successfully; resets to idle after a short delay.
    Complete,
    /// Attempt budget exhausted; resets to idle after a short delay.
    Failed,
}

impl DoorInteractionState {
    /// Whether the machine is mid-interaction (not idle, not terminal).
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Complete | Self::Failed)
    }
}

impl fmt::Display for DoorInteractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::NavigatingToApproach => "NavigatingToApproach",
            Self::AtApproach => "AtApproach",
            Self::Operating => "Operating",
            Self::WaitingForSubject => "WaitingForSubject",
            Self::MovingThrough => "MovingThrough",
            Self::AtExit => "AtExit",
            Self::Securing => "Securing",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Legal transitions for a door interaction.
///
/// ```text
/// Idle → NavigatingToApproach
/// NavigatingToApproach → AtApproach
/// AtApproach → Operating
/// Operating → WaitingForSubject | MovingThrough
/// WaitingForSubject → Securing
/// MovingThrough → AtExit
/// AtExit → Securing
/// Securing → Complete
/// ```
/// Additionally: any active state may restart from `NavigatingToApproach`
/// (timeout retry) or go to `Failed`, and any non-idle state may reset to
/// `Idle` (cancellation / terminal reset).
fn is_legal_transition(from: DoorInteractionState, to: DoorInteractionState) -> bool {
    use DoorInteractionState::*;

    if to == Idle && from != Idle {
        return true;
    }
    if from.is_active() && matches!(to, Failed | NavigatingToApproach) {
        return true;
    }

    matches!(
        (from, to),
        (Idle, NavigatingToApproach)
            | (NavigatingToApproach, AtApproach)
            | (AtApproach, Operating)
            | (Operating, WaitingForSubject)
            | (Operating, MovingThrough)
            | (WaitingForSubject, Securing)
            | (MovingThrough, AtExit)
            | (AtExit, Securing)
            | (Securing, Complete)
    )
}

/// A recorded state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: DoorInteractionState,
    pub to: DoorInteractionState,
    /// Scheduler time of the transition.
    pub at: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Terminal result of one interaction, reported exactly once.
#[derive(Debug, Clone)]
pub enum InteractionOutcome {
    Complete { door: DoorId },
    Failed { door: DoorId, reason: String },
}

/// Transient per-crossing bookkeeping.
#[derive(Debug, Clone)]
struct InteractionContext {
    door: DoorId,
    mode: InteractionMode,
    door_position: Point,
    approach: Point,
    exit: Option<Point>,
    subject: Option<SubjectId>,
    attempts: u32,
    move_requested: bool,
    open_commanded_at: Option<Duration>,
    open_reissued: bool,
    lease_held: bool,
    blocking_disabled: bool,
    last_pos: Option<Point>,
    stationary_since: Option<Duration>,
    dwell_started: Option<Duration>,
}

/// The per-officer door interaction controller.
pub struct DoorInteraction {
    officer: OfficerId,
    config: EscortConfig,
    state: DoorInteractionState,
    state_entered: Duration,
    ctx: Option<InteractionContext>,
    terminal_at: Option<Duration>,
    transitions: Vec<TransitionRecord>,
}

impl DoorInteraction {
    pub fn new(officer: OfficerId, config: EscortConfig) -> Self {
        Self {
            officer,
            config,
            state: DoorInteractionState::Idle,
            state_entered: Duration::ZERO,
            ctx: None,
            terminal_at: None,
            transitions: Vec::new(),
        }
    }

    pub fn officer(&self) -> &OfficerId {
        &self.officer
    }

    pub fn state(&self) -> DoorInteractionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DoorInteractionState::Idle
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_active()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Number of timed-out attempts so far in the current interaction.
    pub fn attempts(&self) -> u32 {
        self.ctx.as_ref().map(|c| c.attempts).unwrap_or(0)
    }

    /// Start an interaction with a door. Returns `false` when the controller
    /// is already busy or the door is not in the registry.
    pub fn begin(
        &mut self,
        registry: &DoorRegistry,
        door_id: &DoorId,
        subject: Option<SubjectId>,
        now: Duration,
    ) -> bool {
        if self.state != DoorInteractionState::Idle {
            debug!(officer = %self.officer, door = %door_id, state = %self.state, "Interaction rejected: busy");
            return false;
        }
        let door = match registry.require(door_id) {
            Ok(door) => door,
            Err(e) => {
                error!(officer = %self.officer, "Interaction rejected: {e}");
                return false;
            }
        };
        self.ctx = Some(InteractionContext {
            door: door.id.clone(),
            mode: door.mode,
            door_position: door.position,
            approach: door.approach,
            exit: door.exit,
            subject,
            attempts: 0,
            move_requested: false,
            open_commanded_at: None,
            open_reissued: false,
            lease_held: false,
            blocking_disabled: false,
            last_pos: None,
            stationary_since: None,
            dwell_started: None,
        });
        self.terminal_at = None;
        info!(officer = %self.officer, door = %door_id, mode = ?door.mode, "Door interaction started");
        self.go(DoorInteractionState::NavigatingToApproach, now, "begin");
        true
    }

    /// Cancel the interaction, undoing side effects and releasing the lease.
    /// Honored immediately; a no-op when idle.
    pub fn stop(&mut self, world: &mut dyn World, coordinator: &mut Coordinator, now: Duration) {
        if self.state == DoorInteractionState::Idle {
            return;
        }
        self.cleanup(world, coordinator);
        info!(officer = %self.officer, state = %self.state, "Door interaction stopped");
        self.go(DoorInteractionState::Idle, now, "stopped");
        self.ctx = None;
        self.terminal_at = None;
    }

    /// Advance the machine by one scheduler tick.
    ///
    /// Returns the terminal outcome on the tick it happens, `None` otherwise.
    pub fn tick(
        &mut self,
        world: &mut dyn World,
        coordinator: &mut Coordinator,
        now: Duration,
    ) -> Option<InteractionOutcome> {
        match self.state {
            DoorInteractionState::Idle => None,
            DoorInteractionState::Complete | DoorInteractionState::Failed => {
                if let Some(at) = self.terminal_at {
                    if now.saturating_sub(at) >= self.config.reset_delay() {
                        self.go(DoorInteractionState::Idle, now, "terminal reset");
                        self.ctx = None;
                        self.terminal_at = None;
                    }
                }
                None
            }
            _ => self.tick_active(world, coordinator, now),
        }
    }

    fn tick_active(
        &mut self,
        world: &mut dyn World,
        coordinator: &mut Coordinator,
        now: Duration,
    ) -> Option<InteractionOutcome> {
        if now.saturating_sub(self.state_entered) >= self.config.state_timeout() {
            return self.handle_timeout(world, coordinator, now);
        }

        match self.state {
            DoorInteractionState::NavigatingToApproach => {
                let target = self.ctx.as_ref()?.approach;
                self.tick_navigation(world, coordinator, target, now)
            }
            DoorInteractionState::AtApproach => {
                let pos = world.officer_position(&self.officer);
                let (settled, door_position) = {
                    let settle = self.config.settle();
                    let ctx = self.ctx.as_mut()?;
                    let moved = ctx.last_pos.map(|p| p.distance(&pos) > 0.01).unwrap_or(true);
                    ctx.last_pos = Some(pos);
                    if moved || ctx.stationary_since.is_none() {
                        ctx.stationary_since = Some(now);
                    }
                    let since = ctx.stationary_since.unwrap_or(now);
                    (now.saturating_sub(since) >= settle, ctx.door_position)
                };
                if settled {
                    world.face(&self.officer, door_position);
                    self.go(DoorInteractionState::Operating, now, "settled, facing door");
                }
                None
            }
            DoorInteractionState::Operating => self.tick_operating(world, coordinator, now),
            DoorInteractionState::WaitingForSubject => {
                let dwell_done = {
                    let dwell = self.config.dwell();
                    let ctx = self.ctx.as_ref()?;
                    ctx.dwell_started
                        .map(|s| now.saturating_sub(s) >= dwell)
                        .unwrap_or(false)
                };
                if dwell_done {
                    if let Some(subject) = self.ctx.as_ref().and_then(|c| c.subject.as_ref()) {
                        debug!(officer = %self.officer, %subject, "Dwell elapsed, securing behind subject");
                    }
                    self.go(DoorInteractionState::Securing, now, "dwell elapsed");
                }
                None
            }
            DoorInteractionState::MovingThrough => {
                let exit = self.ctx.as_ref()?.exit;
                match exit {
                    Some(target) => self.tick_navigation(world, coordinator, target, now),
                    // Unreachable past registry validation.
                    None => self.fail(world, coordinator, now, "missing exit anchor".to_string()),
                }
            }
            DoorInteractionState::AtExit => {
                let door = self.ctx.as_ref()?.door.clone();
                world.set_door_blocking(&door, true);
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.blocking_disabled = false;
                }
                self.go(DoorInteractionState::Securing, now, "crossed, blocking restored");
                None
            }
            DoorInteractionState::Securing => {
                let door = self.ctx.as_ref()?.door.clone();
                world.set_door_open(&door, false);
                world.set_door_locked(&door, true);
                coordinator.release_door(&door, &self.officer);
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.lease_held = false;
                }
                self.go(DoorInteractionState::Complete, now, "secured");
                self.terminal_at = Some(now);
                info!(officer = %self.officer, door = %door, "Door interaction complete");
                Some(InteractionOutcome::Complete { door })
            }
            _ => None,
        }
    }

    /// Shared walking logic for the two navigation states.
    fn tick_navigation(
        &mut self,
        world: &mut dyn World,
        coordinator: &mut Coordinator,
        target: Point,
        now: Duration,
    ) -> Option<InteractionOutcome> {
        let requested = {
            let ctx = self.ctx.as_mut()?;
            if !ctx.move_requested && world.request_move(&self.officer, target) {
                ctx.move_requested = true;
            }
            ctx.move_requested
        };
        if !requested {
            // Request rejected; the per-state timeout drives the retry.
            return None;
        }
        match world.move_status(&self.officer) {
            MoveStatus::Arrived => {
                let next_state = match self.state {
                    DoorInteractionState::NavigatingToApproach => DoorInteractionState::AtApproach,
                    _ => DoorInteractionState::AtExit,
                };
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.move_requested = false;
                    ctx.last_pos = None;
                    ctx.stationary_since = None;
                }
                self.go(next_state, now, "arrived");
                None
            }
            MoveStatus::Failed => self.handle_timeout(world, coordinator, now),
            _ => None,
        }
    }

    fn tick_operating(
        &mut self,
        world: &mut dyn World,
        coordinator: &mut Coordinator,
        now: Duration,
    ) -> Option<InteractionOutcome> {
        let door = self.ctx.as_ref()?.door.clone();

        if !self.ctx.as_ref()?.lease_held {
            if coordinator.reserve_door(&door, &self.officer, self.config.lease_ttl(), now) {
                self.ctx.as_mut()?.lease_held = true;
            } else {
                debug!(officer = %self.officer, door = %door, "Door lease contended, waiting");
                return None;
            }
        }

        let open_commanded_at = self.ctx.as_ref()?.open_commanded_at;
        let Some(commanded_at) = open_commanded_at else {
            world.set_door_locked(&door, false);
            world.set_door_open(&door, true);
            self.ctx.as_mut()?.open_commanded_at = Some(now);
            return None;
        };

        if world.door_state(&door) == Some(DoorState::Open) {
            let mode = self.ctx.as_ref()?.mode;
            match mode {
                InteractionMode::OperationOnly => {
                    self.ctx.as_mut()?.dwell_started = Some(now);
                    self.go(DoorInteractionState::WaitingForSubject, now, "door open, dwelling");
                }
                InteractionMode::PassThrough => {
                    world.set_door_blocking(&door, false);
                    self.ctx.as_mut()?.blocking_disabled = true;
                    self.go(DoorInteractionState::MovingThrough, now, "door open, crossing");
                }
            }
            return None;
        }

        // Still closed: one re-issue after the grace window, then the state
        // timeout takes over.
        let reissued = self.ctx.as_ref()?.open_reissued;
        if !reissued && now.saturating_sub(commanded_at) >= self.config.open_grace() {
            debug!(officer = %self.officer, door = %door, "Door still closed after grace, re-issuing open");
            world.set_door_open(&door, true);
            self.ctx.as_mut()?.open_reissued = true;
        }
        None
    }

    fn handle_timeout(
        &mut self,
        world: &mut dyn World,
        coordinator: &mut Coordinator,
        now: Duration,
    ) -> Option<InteractionOutcome> {
        let state = self.state;
        let attempts = {
            let ctx = self.ctx.as_mut()?;
            ctx.attempts += 1;
            ctx.attempts
        };
        let max = self.config.max_attempts;

        if attempts > max {
            // Teleport-snap is the last resort for a walk that was accepted
            // but never finishes; a rejected or failed request stays a failure.
            let is_nav = matches!(
                state,
                DoorInteractionState::NavigatingToApproach | DoorInteractionState::MovingThrough
            );
            if is_nav && world.move_status(&self.officer) == MoveStatus::Moving {
                let (target, next_state) = {
                    let ctx = self.ctx.as_ref()?;
                    match state {
                        DoorInteractionState::NavigatingToApproach => {
                            (ctx.approach, DoorInteractionState::AtApproach)
                        }
                        _ => (ctx.exit.unwrap_or(ctx.approach), DoorInteractionState::AtExit),
                    }
                };
                warn!(officer = %self.officer, state = %state, "Navigation stalled past budget, teleport-snapping");
                world.teleport(&self.officer, target);
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.move_requested = false;
                    ctx.last_pos = None;
                    ctx.stationary_since = None;
                }
                self.go(next_state, now, "teleport-snap");
                return None;
            }
            let reason = format!("Max attempts ({max}) exceeded in state {state}");
            return self.fail(world, coordinator, now, reason);
        }

        warn!(
            officer = %self.officer,
            state = %state,
            attempt = attempts,
            max,
            "Door interaction timed out, restarting from navigation"
        );
        {
            let ctx = self.ctx.as_mut()?;
            ctx.move_requested = false;
            ctx.open_reissued = false;
            ctx.dwell_started = None;
            ctx.last_pos = None;
            ctx.stationary_since = None;
            if ctx.blocking_disabled {
                world.set_door_blocking(&ctx.door, true);
                ctx.blocking_disabled = false;
            }
            if ctx.open_commanded_at.take().is_some() {
                world.set_door_open(&ctx.door, false);
                world.set_door_locked(&ctx.door, true);
            }
            // A ≥10s state timeout outlives the lease TTL, so the old lease
            // must not be trusted: drop it and re-contend on re-entry to
            // Operating like any other holder.
            if ctx.lease_held {
                coordinator.release_door(&ctx.door, &self.officer);
                ctx.lease_held = false;
            }
        }
        self.go(DoorInteractionState::NavigatingToApproach, now, "timeout restart");
        None
    }

    fn fail(
        &mut self,
        world: &mut dyn World,
        coordinator: &mut Coordinator,
        now: Duration,
        reason: String,
    ) -> Option<InteractionOutcome> {
        let door = self.ctx.as_ref()?.door.clone();
        self.cleanup(world, coordinator);
        warn!(officer = %self.officer, door = %door, reason = %reason, "Door interaction failed");
        self.go(DoorInteractionState::Failed, now, &reason);
        self.terminal_at = Some(now);
        Some(InteractionOutcome::Failed { door, reason })
    }

    /// Undo lingering side effects so a torn-down interaction never leaves a
    /// door unblockable or leased.
    fn cleanup(&mut self, world: &mut dyn World, coordinator: &mut Coordinator) {
        if let Some(ctx) = self.ctx.as_mut() {
            if ctx.blocking_disabled {
                world.set_door_blocking(&ctx.door, true);
                ctx.blocking_disabled = false;
            }
            if ctx.open_commanded_at.take().is_some() {
                world.set_door_open(&ctx.door, false);
                world.set_door_locked(&ctx.door, true);
            }
            if ctx.lease_held {
                coordinator.release_door(&ctx.door, &self.officer);
                ctx.lease_held = false;
            }
        }
    }

    fn go(&mut self, to: DoorInteractionState, now: Duration, reason: &str) {
        if !is_legal_transition(self.state, to) {
            // The tick driver never produces these; log loudly if it ever does.
            error!(officer = %self.officer, from = %self.state, to = %to, "Illegal transition suppressed");
            return;
        }
        debug!(officer = %self.officer, from = %self.state, to = %to, reason, "Door interaction transition");
        self.transitions.push(TransitionRecord {
            from: self.state,
            to,
            at: now,
            reason: Some(reason.to_string()),
        });
        self.state = to;
        self.state_entered = now;
    }
}
