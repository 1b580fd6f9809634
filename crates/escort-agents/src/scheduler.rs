//! Tick-driven scheduler for escort and patrol officers.
//!
//! The scheduler owns the shared pieces (door registry, coordinator, event
//! bus) and drives every per-officer machine once per tick. A panic-free
//! contract holds across officers: one machine erroring fails that officer's
//! escort and nothing else.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use coordination::{
    Coordinator, DoorId, DoorRegistry, EscortEvent, EventBus, OfficerId, SubjectId,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::EscortConfig;
use crate::door_interaction::{DoorInteraction, InteractionOutcome};
use crate::escort::{EscortMachine, EscortPhase, EscortPlan};
use crate::world::World;

pub struct EscortScheduler {
    config: EscortConfig,
    registry: DoorRegistry,
    coordinator: Coordinator,
    bus: EventBus,
    escorts: HashMap<OfficerId, EscortMachine>,
    /// Standalone door interactions for patrol officers answering a door
    /// trigger (no subject, no session).
    patrols: HashMap<OfficerId, DoorInteraction>,
}

impl EscortScheduler {
    pub fn new(config: EscortConfig, registry: DoorRegistry) -> Self {
        let coordinator = Coordinator::new(config.coordinator_config());
        Self {
            config,
            registry,
            coordinator,
            bus: EventBus::new(),
            escorts: HashMap::new(),
            patrols: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &DoorRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Subscribe to the escort event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EscortEvent> {
        self.bus.subscribe()
    }

    pub fn escort_phase(&self, officer: &OfficerId) -> Option<EscortPhase> {
        self.escorts.get(officer).map(|m| m.phase())
    }

    pub fn escort(&self, officer: &OfficerId) -> Option<&EscortMachine> {
        self.escorts.get(officer)
    }

    /// Begin an escort for an officer. Returns `false` when the officer is
    /// already escorting or the coordinator rejects the session.
    pub fn start_escort(
        &mut self,
        officer: OfficerId,
        subject: SubjectId,
        plan: EscortPlan,
        now: Duration,
    ) -> bool {
        if self
            .escorts
            .get(&officer)
            .map(|m| m.phase().is_active())
            .unwrap_or(false)
        {
            debug!(%officer, "Escort request rejected: officer already escorting");
            return false;
        }
        let mut machine = EscortMachine::new(officer.clone(), subject, plan, self.config.clone());
        if !machine.start(&mut self.coordinator, &self.bus, now) {
            return false;
        }
        info!(%officer, "Escort started");
        self.escorts.insert(officer, machine);
        true
    }

    /// Cancel an officer's escort, releasing its session and lease.
    pub fn cancel_escort(&mut self, world: &mut dyn World, officer: &OfficerId, now: Duration) {
        if let Some(machine) = self.escorts.get_mut(officer) {
            machine.cancel(world, &mut self.coordinator, &self.bus, now);
        }
    }

    /// A patrol officer was asked to cycle a door (operation-only visit with
    /// no subject). Returns `false` when the officer is mid-interaction.
    pub fn notify_door_trigger(
        &mut self,
        officer: OfficerId,
        door: &DoorId,
        now: Duration,
    ) -> bool {
        let interaction = self
            .patrols
            .entry(officer.clone())
            .or_insert_with(|| DoorInteraction::new(officer, self.config.clone()));
        interaction.begin(&self.registry, door, None, now)
    }

    /// Release a confirmation-station wait for an officer's escort.
    pub fn confirm_ready(&mut self, officer: &OfficerId) {
        if let Some(machine) = self.escorts.get_mut(officer) {
            machine.confirm_ready();
        }
    }

    /// Release a scanner-station wait for an officer's escort.
    pub fn scan_completed(&mut self, officer: &OfficerId) {
        if let Some(machine) = self.escorts.get_mut(officer) {
            machine.scan_completed();
        }
    }

    /// Advance the whole subsystem by one tick.
    pub fn tick(&mut self, world: &mut dyn World, now: Duration) {
        self.coordinator.sweep(now);

        for (officer, interaction) in self.patrols.iter_mut() {
            match interaction.tick(world, &mut self.coordinator, now) {
                Some(InteractionOutcome::Complete { door }) => {
                    self.bus.publish(EscortEvent::InteractionComplete {
                        officer: officer.clone(),
                        door,
                        timestamp: Utc::now(),
                    });
                }
                Some(InteractionOutcome::Failed { door, reason }) => {
                    self.bus.publish(EscortEvent::InteractionFailed {
                        officer: officer.clone(),
                        door,
                        reason,
                        timestamp: Utc::now(),
                    });
                }
                None => {}
            }
        }

        for (officer, machine) in self.escorts.iter_mut() {
            if let Err(e) =
                machine.tick(world, &self.registry, &mut self.coordinator, &self.bus, now)
            {
                warn!(%officer, "Escort tick failed: {e}");
                machine.cancel(world, &mut self.coordinator, &self.bus, now);
            }
        }
    }

    /// True when no escort is active and every patrol interaction has reset
    /// to idle.
    pub fn is_quiescent(&self) -> bool {
        self.escorts.values().all(|m| !m.phase().is_active())
            && self.patrols.values().all(|p| p.is_idle())
    }

    /// Drive ticks at a fixed cadence until the subsystem is quiescent.
    ///
    /// Simulated scheduler time starts at zero and advances by
    /// `tick_interval` per tick. Meant for hosts whose world advances
    /// itself; callers that script inputs between ticks (the demo binary,
    /// the tests) drive `tick` directly instead.
    pub async fn run(&mut self, world: &mut dyn World, tick_interval: Duration) {
        let mut timer = tokio::time::interval(tick_interval);
        let mut now = Duration::ZERO;
        loop {
            timer.tick().await;
            self.tick(world, now);
            now += tick_interval;
            if self.is_quiescent() {
                info!(at_secs = now.as_secs_f32(), "Scheduler quiescent");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimWorld;
    use coordination::{DoorKind, DoorSpec, InteractionMode, Point};

    fn registry() -> DoorRegistry {
        DoorRegistry::build(vec![DoorSpec {
            id: DoorId::from("Cell-A-1"),
            kind: DoorKind::Cell,
            mode: InteractionMode::OperationOnly,
            position: Point::new(10.0, 0.0, 0.0),
            approach: Point::new(9.0, 0.0, 0.0),
            exit: None,
        }])
        .unwrap()
    }

    #[test]
    fn test_patrol_trigger_rejected_while_busy() {
        let mut scheduler = EscortScheduler::new(EscortConfig::default(), registry());
        let officer = OfficerId::from("patrol-1");
        let door = DoorId::from("Cell-A-1");
        assert!(scheduler.notify_door_trigger(officer.clone(), &door, Duration::ZERO));
        assert!(!scheduler.notify_door_trigger(officer, &door, Duration::from_secs(1)));
    }

    /// The interval loop keeps ticking through a patrol interaction's whole
    /// lifecycle (including the terminal reset) and returns on its own.
    #[tokio::test(start_paused = true)]
    async fn test_run_returns_once_quiescent() {
        let mut scheduler = EscortScheduler::new(EscortConfig::default(), registry());
        let officer = OfficerId::from("patrol-1");
        let door = DoorId::from("Cell-A-1");
        let mut world = SimWorld::new();
        world.add_door(door.clone());
        world.add_officer(officer.clone(), Point::ORIGIN, 5.0);
        world.reject_moves(&officer, true);

        let mut events = scheduler.subscribe();
        assert!(scheduler.notify_door_trigger(officer.clone(), &door, Duration::ZERO));
        assert!(!scheduler.is_quiescent());

        scheduler.run(&mut world, Duration::from_millis(100)).await;
        assert!(scheduler.is_quiescent());

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            saw_failure |= event.event_type() == "interaction_failed";
        }
        assert!(saw_failure);
    }

    #[test]
    fn test_unknown_officer_signals_are_ignored() {
        let mut scheduler = EscortScheduler::new(EscortConfig::default(), registry());
        let officer = OfficerId::from("nobody");
        scheduler.confirm_ready(&officer);
        scheduler.scan_completed(&officer);
        assert!(scheduler.escort_phase(&officer).is_none());
    }
}
