//! End-to-end escort scenarios against the simulated world.
//!
//! Every test drives the scheduler with explicit simulated time, so the full
//! choreography (fetch, door cycles, stations, return) runs in a tight loop
//! with no wall-clock waits.

use std::time::Duration;

use coordination::{
    DoorId, DoorKind, DoorRegistry, DoorSpec, EscortEvent, InteractionMode, OfficerId, Point,
    SubjectId,
};
use escort_agents::{
    EscortConfig, EscortPhase, EscortPlan, EscortScheduler, SimWorld, StationWait, World,
};
use tokio::sync::broadcast;

const TICK: Duration = Duration::from_millis(100);

fn facility() -> DoorRegistry {
    DoorRegistry::build(vec![
        DoorSpec {
            id: DoorId::from("Cell-A-1"),
            kind: DoorKind::Cell,
            mode: InteractionMode::OperationOnly,
            position: Point::new(10.0, 0.0, 0.0),
            approach: Point::new(9.0, 0.0, 0.0),
            exit: None,
        },
        DoorSpec {
            id: DoorId::from("Gate-West"),
            kind: DoorKind::Area,
            mode: InteractionMode::PassThrough,
            position: Point::new(20.0, 0.0, 0.0),
            approach: Point::new(19.0, 0.0, 0.0),
            exit: Some(Point::new(21.0, 0.0, 0.0)),
        },
    ])
    .expect("valid door table")
}

fn release_plan() -> EscortPlan {
    EscortPlan::release(
        DoorId::from("Cell-A-1"),
        Point::new(8.5, 0.0, 0.0),
        Some(DoorId::from("Gate-West")),
        Point::new(30.0, 0.0, 0.0),
        Point::new(35.0, 0.0, 0.0),
        Point::ORIGIN,
    )
}

fn escort_world(officer: &OfficerId, subject: &SubjectId) -> SimWorld {
    let mut world = SimWorld::new();
    world.add_door(DoorId::from("Cell-A-1"));
    world.add_door(DoorId::from("Gate-West"));
    world.add_officer(officer.clone(), Point::ORIGIN, 5.0);
    world.add_subject(subject.clone(), Point::new(10.5, 0.0, 0.0));
    world.set_subject_follow(subject, officer.clone(), 1.5);
    world
}

/// Run ticks until `done` holds or the budget runs out, acknowledging station
/// waits one tick after they are observed. Returns the simulated time reached.
fn run_until(
    scheduler: &mut EscortScheduler,
    world: &mut SimWorld,
    officer: &OfficerId,
    mut now: Duration,
    max_ticks: u32,
    auto_ack: bool,
    done: impl Fn(&EscortScheduler) -> bool,
) -> Duration {
    for _ in 0..max_ticks {
        if done(scheduler) {
            return now;
        }
        if auto_ack {
            match scheduler.escort(officer).and_then(|m| m.current_wait()) {
                Some(StationWait::Confirmation) => scheduler.confirm_ready(officer),
                Some(StationWait::Scan) => scheduler.scan_completed(officer),
                _ => {}
            }
        }
        scheduler.tick(world, now);
        world.step(TICK);
        now += TICK;
    }
    now
}

fn drain(rx: &mut broadcast::Receiver<EscortEvent>) -> Vec<EscortEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Full release escort: fetch from the cell, cycle the cell door, cross the
/// gate, visit both stations, return to post. Doors end secured and the
/// coordinator ends empty.
#[test]
fn test_release_escort_completes() {
    let officer = OfficerId::from("officer-1");
    let subject = SubjectId::from("subject-1");
    let mut world = escort_world(&officer, &subject);
    let mut scheduler = EscortScheduler::new(EscortConfig::default(), facility());
    let mut events = scheduler.subscribe();

    assert!(scheduler.start_escort(
        officer.clone(),
        subject.clone(),
        release_plan(),
        Duration::ZERO
    ));

    let end = run_until(&mut scheduler, &mut world, &officer, Duration::ZERO, 2000, true, |s| {
        s.escort_phase(&officer) == Some(EscortPhase::Completed)
    });
    assert_eq!(
        scheduler.escort_phase(&officer),
        Some(EscortPhase::Completed),
        "escort did not complete within {end:?}"
    );

    // Officer is back at the post, doors are secured, shared state is clean.
    assert!(world.officer_position(&officer).distance(&Point::ORIGIN) < 0.5);
    assert!(world.door_locked(&DoorId::from("Cell-A-1")));
    assert!(world.door_blocking(&DoorId::from("Gate-West")));
    assert!(scheduler.coordinator().active_sessions() == 0);
    assert!(scheduler.coordinator().active_leases(end) == 0);

    let kinds: Vec<&str> = drain(&mut events).iter().map(|e| e.event_type()).collect();
    assert!(kinds.contains(&"escort_started"));
    assert!(kinds.contains(&"escort_completed"));
    assert_eq!(
        kinds.iter().filter(|k| **k == "interaction_complete").count(),
        2,
        "expected the cell door and the gate to each complete once"
    );
    assert!(!kinds.contains(&"escort_failed"));

    // The first completed return leg is measured and remembered.
    let machine = scheduler.escort(&officer).expect("machine retained");
    assert!(machine.learned_return_time().is_some());
}

/// A patrol officer whose every move request is rejected exhausts the retry
/// budget, reports the failure, and is available for a new trigger after the
/// reset delay.
#[test]
fn test_patrol_nav_failure_reports_and_recovers() {
    let officer = OfficerId::from("patrol-1");
    let door = DoorId::from("Cell-A-1");
    let mut world = SimWorld::new();
    world.add_door(door.clone());
    world.add_officer(officer.clone(), Point::ORIGIN, 5.0);
    world.reject_moves(&officer, true);

    let mut scheduler = EscortScheduler::new(EscortConfig::default(), facility());
    let mut events = scheduler.subscribe();
    assert!(scheduler.notify_door_trigger(officer.clone(), &door, Duration::ZERO));

    // 10s timeout per attempt, 3 restarts, failure at 40s, reset at 41s.
    let mut now = Duration::ZERO;
    for _ in 0..430 {
        scheduler.tick(&mut world, now);
        world.step(TICK);
        now += TICK;
    }

    let failures: Vec<EscortEvent> = drain(&mut events)
        .into_iter()
        .filter(|e| e.event_type() == "interaction_failed")
        .collect();
    assert_eq!(failures.len(), 1);
    if let EscortEvent::InteractionFailed { reason, .. } = &failures[0] {
        assert!(reason.contains("Max attempts"), "unexpected reason: {reason}");
    }

    // Interaction reset to idle: a fresh trigger is accepted.
    world.reject_moves(&officer, false);
    assert!(scheduler.notify_door_trigger(officer.clone(), &door, now));
}

/// Station waits are human-paced: minutes of simulated silence change
/// nothing, and the matching acknowledgment releases the wait immediately.
#[test]
fn test_station_wait_never_times_out() {
    let officer = OfficerId::from("officer-1");
    let subject = SubjectId::from("subject-1");
    let mut world = escort_world(&officer, &subject);
    let mut scheduler = EscortScheduler::new(EscortConfig::default(), facility());

    assert!(scheduler.start_escort(
        officer.clone(),
        subject.clone(),
        release_plan(),
        Duration::ZERO
    ));
    let at_station =
        run_until(&mut scheduler, &mut world, &officer, Duration::ZERO, 2000, false, |s| {
            s.escort_phase(&officer) == Some(EscortPhase::WaitingAtStation)
        });
    assert_eq!(scheduler.escort_phase(&officer), Some(EscortPhase::WaitingAtStation));

    // Two simulated minutes with no acknowledgment.
    let mut now = at_station;
    for _ in 0..1200 {
        scheduler.tick(&mut world, now);
        world.step(TICK);
        now += TICK;
    }
    assert_eq!(scheduler.escort_phase(&officer), Some(EscortPhase::WaitingAtStation));

    scheduler.confirm_ready(&officer);
    scheduler.tick(&mut world, now);
    assert_eq!(scheduler.escort_phase(&officer), Some(EscortPhase::MovingToStation));
}

/// Cancelling mid-escort releases the session and any held lease, and leaves
/// the door secured.
#[test]
fn test_cancel_releases_shared_state() {
    let officer = OfficerId::from("officer-1");
    let subject = SubjectId::from("subject-1");
    let mut world = escort_world(&officer, &subject);
    let mut scheduler = EscortScheduler::new(EscortConfig::default(), facility());

    assert!(scheduler.start_escort(
        officer.clone(),
        subject.clone(),
        release_plan(),
        Duration::ZERO
    ));
    let mid = run_until(&mut scheduler, &mut world, &officer, Duration::ZERO, 2000, false, |s| {
        s.escort_phase(&officer) == Some(EscortPhase::OpeningOriginDoor)
    });
    assert_eq!(scheduler.escort_phase(&officer), Some(EscortPhase::OpeningOriginDoor));

    // Let the door interaction get as far as holding the lease.
    let mut now = mid;
    for _ in 0..30 {
        scheduler.tick(&mut world, now);
        world.step(TICK);
        now += TICK;
    }

    scheduler.cancel_escort(&mut world, &officer, now);
    assert_eq!(scheduler.escort_phase(&officer), Some(EscortPhase::Failed));
    assert!(scheduler.coordinator().active_sessions() == 0);
    assert!(scheduler.coordinator().active_leases(now) == 0);
    assert!(world.door_locked(&DoorId::from("Cell-A-1")));
}

/// Losing the subject mid-walk aborts the escort: the failure is reported
/// immediately, shared state is released, and the officer still walks home
/// before the machine goes terminal.
#[test]
fn test_subject_lost_aborts_to_post() {
    let officer = OfficerId::from("officer-1");
    let subject = SubjectId::from("subject-1");
    let mut world = escort_world(&officer, &subject);
    let mut scheduler = EscortScheduler::new(EscortConfig::default(), facility());
    let mut events = scheduler.subscribe();

    assert!(scheduler.start_escort(
        officer.clone(),
        subject.clone(),
        release_plan(),
        Duration::ZERO
    ));
    let mid = run_until(&mut scheduler, &mut world, &officer, Duration::ZERO, 2000, true, |s| {
        s.escort_phase(&officer) == Some(EscortPhase::MovingToStation)
    });
    assert_eq!(scheduler.escort_phase(&officer), Some(EscortPhase::MovingToStation));

    world.remove_subject(&subject);
    let mut now = mid;
    scheduler.tick(&mut world, now);
    assert_eq!(scheduler.escort_phase(&officer), Some(EscortPhase::ReturningToPost));
    assert!(scheduler.coordinator().active_sessions() == 0);

    let reasons: Vec<String> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            EscortEvent::EscortFailed { reason, .. } => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(reasons, vec!["subject reference lost".to_string()]);

    // The walk home still happens, then the machine goes terminal.
    for _ in 0..300 {
        scheduler.tick(&mut world, now);
        world.step(TICK);
        now += TICK;
    }
    assert_eq!(scheduler.escort_phase(&officer), Some(EscortPhase::Failed));
    assert!(world.officer_position(&officer).distance(&Point::ORIGIN) < 0.5);
}

/// An aborted escort reports its failure exactly once, even if the walk
/// home is itself cut short by a cancellation.
#[test]
fn test_aborted_escort_fails_once() {
    let officer = OfficerId::from("officer-1");
    let subject = SubjectId::from("subject-1");
    let mut world = escort_world(&officer, &subject);
    let mut scheduler = EscortScheduler::new(EscortConfig::default(), facility());
    let mut events = scheduler.subscribe();

    assert!(scheduler.start_escort(
        officer.clone(),
        subject.clone(),
        release_plan(),
        Duration::ZERO
    ));
    let mid = run_until(&mut scheduler, &mut world, &officer, Duration::ZERO, 2000, true, |s| {
        s.escort_phase(&officer) == Some(EscortPhase::MovingToStation)
    });

    world.remove_subject(&subject);
    scheduler.tick(&mut world, mid);
    assert_eq!(scheduler.escort_phase(&officer), Some(EscortPhase::ReturningToPost));

    // Cut the walk home short.
    scheduler.cancel_escort(&mut world, &officer, mid);
    assert_eq!(scheduler.escort_phase(&officer), Some(EscortPhase::Failed));

    let failures = drain(&mut events)
        .iter()
        .filter(|e| e.event_type() == "escort_failed")
        .count();
    assert_eq!(failures, 1, "abort and cancel must not both report failure");
}

/// A subject that stops following (but stays within the lost threshold)
/// drives the compliance monitor into its outer bands: the officer speaks a
/// warning line and the warning is published, rate-limited by the cooldown.
#[test]
fn test_straggling_subject_draws_warnings() {
    let officer = OfficerId::from("officer-1");
    let subject = SubjectId::from("subject-1");
    let mut world = escort_world(&officer, &subject);
    let mut scheduler = EscortScheduler::new(EscortConfig::default(), facility());
    let mut events = scheduler.subscribe();

    assert!(scheduler.start_escort(
        officer.clone(),
        subject.clone(),
        release_plan(),
        Duration::ZERO
    ));
    let mid = run_until(&mut scheduler, &mut world, &officer, Duration::ZERO, 2000, true, |s| {
        s.escort_phase(&officer) == Some(EscortPhase::MovingToStation)
    });
    assert_eq!(scheduler.escort_phase(&officer), Some(EscortPhase::MovingToStation));

    // The subject plants their feet: a follow gap wider than the remaining
    // walk means they never move again, while staying well inside the
    // subject-lost threshold.
    world.set_subject_follow(&subject, officer.clone(), 30.0);

    run_until(&mut scheduler, &mut world, &officer, mid, 200, true, |s| {
        s.escort_phase(&officer) == Some(EscortPhase::WaitingAtStation)
    });

    assert!(
        !world.lines_said(&officer).is_empty(),
        "officer should have spoken at least one warning"
    );
    let warnings = drain(&mut events)
        .iter()
        .filter(|e| e.event_type() == "compliance_warning")
        .count();
    assert!(warnings >= 1);
    // Escort is degraded but not aborted.
    assert_ne!(scheduler.escort_phase(&officer), Some(EscortPhase::Failed));
}

/// Two officers escorting different subjects of the same kind run
/// concurrently; the shared gate serializes through its lease but both
/// escorts finish.
#[test]
fn test_two_escorts_share_the_gate() {
    let first = OfficerId::from("officer-1");
    let second = OfficerId::from("officer-2");
    let subject_a = SubjectId::from("subject-1");
    let subject_b = SubjectId::from("subject-2");

    let registry = DoorRegistry::build(vec![
        DoorSpec {
            id: DoorId::from("Cell-A-1"),
            kind: DoorKind::Cell,
            mode: InteractionMode::OperationOnly,
            position: Point::new(10.0, 0.0, 0.0),
            approach: Point::new(9.0, 0.0, 0.0),
            exit: None,
        },
        DoorSpec {
            id: DoorId::from("Cell-A-2"),
            kind: DoorKind::Cell,
            mode: InteractionMode::OperationOnly,
            position: Point::new(10.0, 4.0, 0.0),
            approach: Point::new(9.0, 4.0, 0.0),
            exit: None,
        },
        DoorSpec {
            id: DoorId::from("Gate-West"),
            kind: DoorKind::Area,
            mode: InteractionMode::PassThrough,
            position: Point::new(20.0, 0.0, 0.0),
            approach: Point::new(19.0, 0.0, 0.0),
            exit: Some(Point::new(21.0, 0.0, 0.0)),
        },
    ])
    .expect("valid door table");

    let mut world = SimWorld::new();
    for id in ["Cell-A-1", "Cell-A-2", "Gate-West"] {
        world.add_door(DoorId::from(id));
    }
    world.add_officer(first.clone(), Point::ORIGIN, 5.0);
    world.add_officer(second.clone(), Point::new(0.0, 4.0, 0.0), 5.0);
    world.add_subject(subject_a.clone(), Point::new(10.5, 0.0, 0.0));
    world.add_subject(subject_b.clone(), Point::new(10.5, 4.0, 0.0));
    world.set_subject_follow(&subject_a, first.clone(), 1.5);
    world.set_subject_follow(&subject_b, second.clone(), 1.5);

    let mut scheduler = EscortScheduler::new(EscortConfig::default(), registry);

    let plan_b = EscortPlan::release(
        DoorId::from("Cell-A-2"),
        Point::new(8.5, 4.0, 0.0),
        Some(DoorId::from("Gate-West")),
        Point::new(30.0, 0.0, 0.0),
        Point::new(35.0, 0.0, 0.0),
        Point::new(0.0, 4.0, 0.0),
    );
    assert!(scheduler.start_escort(first.clone(), subject_a, release_plan(), Duration::ZERO));
    assert!(scheduler.start_escort(second.clone(), subject_b, plan_b, Duration::ZERO));

    let mut now = Duration::ZERO;
    for _ in 0..3000 {
        for officer in [&first, &second] {
            match scheduler.escort(officer).and_then(|m| m.current_wait()) {
                Some(StationWait::Confirmation) => scheduler.confirm_ready(officer),
                Some(StationWait::Scan) => scheduler.scan_completed(officer),
                _ => {}
            }
        }
        scheduler.tick(&mut world, now);
        world.step(TICK);
        now += TICK;
        if scheduler.escort_phase(&first) == Some(EscortPhase::Completed)
            && scheduler.escort_phase(&second) == Some(EscortPhase::Completed)
        {
            break;
        }
    }

    assert_eq!(scheduler.escort_phase(&first), Some(EscortPhase::Completed));
    assert_eq!(scheduler.escort_phase(&second), Some(EscortPhase::Completed));
    assert!(scheduler.coordinator().active_sessions() == 0);
    assert!(world.door_blocking(&DoorId::from("Gate-West")));
}
