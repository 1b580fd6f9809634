//! Demo driver: runs scripted escorts through a small simulated facility and
//! logs the event stream.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use coordination::{DoorId, DoorKind, DoorRegistry, DoorSpec, InteractionMode, OfficerId, Point, SubjectId};
use escort_agents::{EscortConfig, EscortPlan, EscortScheduler, SimWorld, StationWait};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Release,
    Intake,
    Both,
}

#[derive(Parser, Debug)]
#[command(name = "escort-agents", about = "Escort choreography demo")]
struct Args {
    /// Optional TOML config for the timeout/retry matrix.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of scheduler ticks to run.
    #[arg(long, default_value_t = 2000)]
    ticks: u64,

    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Sleep for each tick's duration, so the log plays out in real time.
    #[arg(long)]
    realtime: bool,

    #[arg(long, value_enum, default_value_t = Scenario::Release)]
    scenario: Scenario,
}

fn demo_registry() -> Result<DoorRegistry> {
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
        DoorSpec {
            id: DoorId::from("Entry-1"),
            kind: DoorKind::Entry,
            mode: InteractionMode::OperationOnly,
            position: Point::new(40.0, 0.0, 0.0),
            approach: Point::new(39.0, 0.0, 0.0),
            exit: None,
        },
    ])
    .context("invalid demo door table")
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

fn intake_plan() -> EscortPlan {
    EscortPlan::intake(
        DoorId::from("Entry-1"),
        Point::new(38.5, 0.0, 0.0),
        Some(DoorId::from("Gate-West")),
        Point::new(35.0, 0.0, 0.0),
        Point::new(9.0, 0.0, 0.0),
        Point::new(45.0, 0.0, 0.0),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EscortConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EscortConfig::default(),
    };

    let mut scheduler = EscortScheduler::new(config, demo_registry()?);
    let mut events = scheduler.subscribe();

    let mut world = SimWorld::new();
    for id in ["Cell-A-1", "Gate-West", "Entry-1"] {
        world.add_door(DoorId::from(id));
    }
    let mut roster: Vec<(OfficerId, SubjectId)> = Vec::new();

    if matches!(args.scenario, Scenario::Release | Scenario::Both) {
        let officer = OfficerId::from("officer-release");
        let subject = SubjectId::from("subject-1");
        world.add_officer(officer.clone(), Point::ORIGIN, 3.0);
        world.add_subject(subject.clone(), Point::new(10.5, 0.0, 0.0));
        world.set_subject_follow(&subject, officer.clone(), 1.5);
        roster.push((officer, subject));
    }
    if matches!(args.scenario, Scenario::Intake | Scenario::Both) {
        let officer = OfficerId::from("officer-intake");
        let subject = SubjectId::from("subject-2");
        world.add_officer(officer.clone(), Point::new(45.0, 0.0, 0.0), 3.0);
        world.add_subject(subject.clone(), Point::new(40.5, 0.0, 0.0));
        world.set_subject_follow(&subject, officer.clone(), 1.5);
        roster.push((officer, subject));
    }

    let tick = Duration::from_millis(args.tick_ms);
    let plans = |officer: &OfficerId| {
        if officer.as_str() == "officer-intake" {
            intake_plan()
        } else {
            release_plan()
        }
    };

    // Stagger starts so cross-kind conflicts resolve through the grace window
    // instead of rejecting the second escort outright.
    let mut pending: Vec<(Duration, OfficerId, SubjectId)> = roster
        .iter()
        .enumerate()
        .map(|(i, (o, s))| (tick * (i as u32 * 80), o.clone(), s.clone()))
        .collect();

    // Ticks an officer has spent at their current station, for the scripted
    // confirm/scan acknowledgments.
    let mut waited: std::collections::HashMap<OfficerId, u32> = std::collections::HashMap::new();

    for n in 0..args.ticks {
        let now = tick * n as u32;

        pending.retain(|(at, officer, subject)| {
            if now < *at {
                return true;
            }
            let started =
                scheduler.start_escort(officer.clone(), subject.clone(), plans(officer), now);
            if !started {
                info!(%officer, "Escort deferred by coordinator, retrying next tick");
            }
            !started
        });

        scheduler.tick(&mut world, now);
        world.step(tick);

        for (officer, _) in &roster {
            let Some(machine) = scheduler.escort(officer) else {
                continue;
            };
            match machine.current_wait() {
                Some(wait) => {
                    let count = waited.entry(officer.clone()).or_insert(0);
                    *count += 1;
                    // A human takes a moment: acknowledge after two seconds.
                    if *count * args.tick_ms as u32 >= 2000 {
                        match wait {
                            StationWait::Confirmation => scheduler.confirm_ready(officer),
                            StationWait::Scan => scheduler.scan_completed(officer),
                            StationWait::Dwell(_) => {}
                        }
                    }
                }
                None => {
                    waited.remove(officer);
                }
            }
        }

        while let Ok(event) = events.try_recv() {
            let json = serde_json::to_string(&event).unwrap_or_else(|_| format!("{event:?}"));
            info!(
                kind = event.event_type(),
                officer = %event.officer(),
                at_secs = now.as_secs_f32(),
                "{json}"
            );
        }

        if roster
            .iter()
            .all(|(o, _)| scheduler.escort_phase(o).map(|p| p.is_terminal()).unwrap_or(false))
            && pending.is_empty()
        {
            info!(ticks = n, "All escorts finished");
            break;
        }

        if args.realtime {
            tokio::time::sleep(tick).await;
        }
    }

    for (officer, _) in &roster {
        info!(
            %officer,
            phase = ?scheduler.escort_phase(officer),
            "Final state"
        );
    }

    Ok(())
}
