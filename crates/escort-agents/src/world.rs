//! Boundary between the choreography core and the embodiment layer.
//!
//! The core never spawns agents, plans paths, renders dialogue, or animates
//! doors. It asks for those effects through this trait and observes their
//! outcomes. Implementations are injected at construction time; there is no
//! global lookup and nothing here is engine-specific.

use coordination::{DoorId, DoorState, OfficerId, Point, SubjectId};

/// Outcome of the most recent movement request for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStatus {
    /// No movement requested.
    Idle,
    /// The navigation system accepted the request and is walking the agent.
    Moving,
    /// The agent reached its target.
    Arrived,
    /// Navigation gave up (unreachable target, blocked path).
    Failed,
}

/// Narrow contract to the embodiment/navigation/dialogue collaborators.
pub trait World {
    /// Ask navigation to walk an officer to a point. Returns whether the
    /// request was accepted; progress is observed via [`World::move_status`].
    fn request_move(&mut self, officer: &OfficerId, to: Point) -> bool;

    fn move_status(&self, officer: &OfficerId) -> MoveStatus;

    fn officer_position(&self, officer: &OfficerId) -> Point;

    /// Last-resort snap when navigation stalls past its budget.
    fn teleport(&mut self, officer: &OfficerId, to: Point);

    /// Rotate an officer in place toward a point.
    fn face(&mut self, officer: &OfficerId, toward: Point);

    /// Fire-and-forget dialogue line.
    fn say(&mut self, officer: &OfficerId, line: &str);

    /// Current subject position, or `None` when the reference is no longer
    /// valid (removed from the world).
    fn subject_position(&self, subject: &SubjectId) -> Option<Point>;

    fn set_door_open(&mut self, door: &DoorId, open: bool);

    fn set_door_locked(&mut self, door: &DoorId, locked: bool);

    /// Toggle the door's movement-blocking collision proxy.
    fn set_door_blocking(&mut self, door: &DoorId, blocking: bool);

    /// Physical open/closed state as the door reports it, `None` for doors
    /// the embodiment layer does not know.
    fn door_state(&self, door: &DoorId) -> Option<DoorState>;
}
