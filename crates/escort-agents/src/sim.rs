//! Deterministic simulated facility for tests and the demo binary.
//!
//! Straight-line movement at fixed speeds, doors that respond to commands
//! instantly (or swallow a configurable number of open commands), and
//! subjects that either sit still or trail their officer. No randomness:
//! the same tick sequence always produces the same world.

use std::collections::HashMap;
use std::time::Duration;

use coordination::{DoorId, DoorState, OfficerId, Point, SubjectId};

use crate::world::{MoveStatus, World};

const ARRIVAL_EPSILON: f32 = 0.05;

#[derive(Debug)]
struct SimAgent {
    pos: Point,
    speed: f32,
    target: Option<Point>,
    status: MoveStatus,
    facing: Option<Point>,
    said: Vec<String>,
    reject_moves: bool,
    frozen: bool,
}

#[derive(Debug)]
struct SimDoor {
    open: bool,
    locked: bool,
    blocking: bool,
    /// Open commands to swallow before the door actually opens.
    ignore_opens: u32,
    open_commands: u32,
}

#[derive(Debug)]
struct SimSubject {
    pos: Point,
    speed: f32,
    /// Officer this subject trails, and the gap it keeps.
    follow: Option<(OfficerId, f32)>,
}

/// Scripted, deterministic [`World`] implementation.
#[derive(Debug, Default)]
pub struct SimWorld {
    officers: HashMap<OfficerId, SimAgent>,
    subjects: HashMap<SubjectId, SimSubject>,
    doors: HashMap<DoorId, SimDoor>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_officer(&mut self, id: OfficerId, pos: Point, speed: f32) {
        self.officers.insert(
            id,
            SimAgent {
                pos,
                speed,
                target: None,
                status: MoveStatus::Idle,
                facing: None,
                said: Vec::new(),
                reject_moves: false,
                frozen: false,
            },
        );
    }

    pub fn add_subject(&mut self, id: SubjectId, pos: Point) {
        self.subjects.insert(
            id,
            SimSubject {
                pos,
                speed: 9.0,
                follow: None,
            },
        );
    }

    /// Doors start closed, locked, and blocking.
    pub fn add_door(&mut self, id: DoorId) {
        self.doors.insert(
            id,
            SimDoor {
                open: false,
                locked: true,
                blocking: true,
                ignore_opens: 0,
                open_commands: 0,
            },
        );
    }

    /// Make the subject trail an officer, keeping `gap` meters behind.
    pub fn set_subject_follow(&mut self, subject: &SubjectId, officer: OfficerId, gap: f32) {
        if let Some(s) = self.subjects.get_mut(subject) {
            s.follow = Some((officer, gap));
        }
    }

    pub fn set_subject_position(&mut self, subject: &SubjectId, pos: Point) {
        if let Some(s) = self.subjects.get_mut(subject) {
            s.pos = pos;
        }
    }

    /// Invalidate the subject reference entirely.
    pub fn remove_subject(&mut self, subject: &SubjectId) {
        self.subjects.remove(subject);
    }

    /// Navigation rejects every request for this officer.
    pub fn reject_moves(&mut self, officer: &OfficerId, reject: bool) {
        if let Some(a) = self.officers.get_mut(officer) {
            a.reject_moves = reject;
        }
    }

    /// Requests are accepted but the officer never advances.
    pub fn freeze_movement(&mut self, officer: &OfficerId, frozen: bool) {
        if let Some(a) = self.officers.get_mut(officer) {
            a.frozen = frozen;
        }
    }

    /// Swallow the next `n` open commands for a door.
    pub fn ignore_open_commands(&mut self, door: &DoorId, n: u32) {
        if let Some(d) = self.doors.get_mut(door) {
            d.ignore_opens = n;
        }
    }

    pub fn open_commands(&self, door: &DoorId) -> u32 {
        self.doors.get(door).map(|d| d.open_commands).unwrap_or(0)
    }

    pub fn door_locked(&self, door: &DoorId) -> bool {
        self.doors.get(door).map(|d| d.locked).unwrap_or(false)
    }

    pub fn door_blocking(&self, door: &DoorId) -> bool {
        self.doors.get(door).map(|d| d.blocking).unwrap_or(false)
    }

    pub fn lines_said(&self, officer: &OfficerId) -> &[String] {
        self.officers
            .get(officer)
            .map(|a| a.said.as_slice())
            .unwrap_or(&[])
    }

    /// Advance physics by one tick.
    pub fn step(&mut self, dt: Duration) {
        let dt = dt.as_secs_f32();

        for agent in self.officers.values_mut() {
            let Some(target) = agent.target else { continue };
            if agent.frozen {
                continue;
            }
            let dist = agent.pos.distance(&target);
            let travel = agent.speed * dt;
            if dist <= travel.max(ARRIVAL_EPSILON) {
                agent.pos = target;
                agent.target = None;
                agent.status = MoveStatus::Arrived;
            } else {
                let f = travel / dist;
                agent.pos = Point::new(
                    agent.pos.x + (target.x - agent.pos.x) * f,
                    agent.pos.y + (target.y - agent.pos.y) * f,
                    agent.pos.z + (target.z - agent.pos.z) * f,
                );
            }
        }

        for subject in self.subjects.values_mut() {
            let Some((ref officer, gap)) = subject.follow else { continue };
            let Some(anchor) = self.officers.get(officer).map(|a| a.pos) else { continue };
            let dist = subject.pos.distance(&anchor);
            if dist <= gap {
                continue;
            }
            let travel = (subject.speed * dt).min(dist - gap);
            let f = travel / dist;
            subject.pos = Point::new(
                subject.pos.x + (anchor.x - subject.pos.x) * f,
                subject.pos.y + (anchor.y - subject.pos.y) * f,
                subject.pos.z + (anchor.z - subject.pos.z) * f,
            );
        }
    }
}

impl World for SimWorld {
    fn request_move(&mut self, officer: &OfficerId, to: Point) -> bool {
        let Some(agent) = self.officers.get_mut(officer) else {
            return false;
        };
        if agent.reject_moves {
            return false;
        }
        agent.target = Some(to);
        agent.status = MoveStatus::Moving;
        true
    }

    fn move_status(&self, officer: &OfficerId) -> MoveStatus {
        self.officers
            .get(officer)
            .map(|a| a.status)
            .unwrap_or(MoveStatus::Idle)
    }

    fn officer_position(&self, officer: &OfficerId) -> Point {
        self.officers
            .get(officer)
            .map(|a| a.pos)
            .unwrap_or(Point::ORIGIN)
    }

    fn teleport(&mut self, officer: &OfficerId, to: Point) {
        if let Some(agent) = self.officers.get_mut(officer) {
            agent.pos = to;
            agent.target = None;
            agent.status = MoveStatus::Arrived;
        }
    }

    fn face(&mut self, officer: &OfficerId, toward: Point) {
        if let Some(agent) = self.officers.get_mut(officer) {
            agent.facing = Some(toward);
        }
    }

    fn say(&mut self, officer: &OfficerId, line: &str) {
        if let Some(agent) = self.officers.get_mut(officer) {
            agent.said.push(line.to_string());
        }
    }

    fn subject_position(&self, subject: &SubjectId) -> Option<Point> {
        self.subjects.get(subject).map(|s| s.pos)
    }

    fn set_door_open(&mut self, door: &DoorId, open: bool) {
        if let Some(d) = self.doors.get_mut(door) {
            if open {
                d.open_commands += 1;
                if d.ignore_opens > 0 {
                    d.ignore_opens -= 1;
                    return;
                }
            }
            d.open = open;
        }
    }

    fn set_door_locked(&mut self, door: &DoorId, locked: bool) {
        if let Some(d) = self.doors.get_mut(door) {
            d.locked = locked;
        }
    }

    fn set_door_blocking(&mut self, door: &DoorId, blocking: bool) {
        if let Some(d) = self.doors.get_mut(door) {
            d.blocking = blocking;
        }
    }

    fn door_state(&self, door: &DoorId) -> Option<DoorState> {
        self.doors.get(door).map(|d| {
            if d.open {
                DoorState::Open
            } else {
                DoorState::Closed
            }
        })
    }
}
