//! Facility door model and the typed door lookup table.
//!
//! Doors are pre-existing fixtures: the registry is built once from facility
//! data and validated up front. A missing anchor is a configuration error at
//! build time, never a runtime fallback search. Only the lease table (owned
//! by the coordinator) and the physical door state (owned by the embodiment
//! layer) change after that.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A position in facility space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point {
    pub const ORIGIN: Point = Point {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// Name of a door fixture (e.g. "Cell-Block-A-3", "Gate-1").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoorId(String);

impl DoorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DoorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DoorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Category of door fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorKind {
    /// Individual cell door.
    Cell,
    /// Facility entry door.
    Entry,
    /// Guard-station door.
    Guard,
    /// Door between facility areas.
    Area,
}

/// How an officer interacts with a door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    /// The officer operates the door from the approach side and never
    /// crosses it (cell doors during release, for example).
    OperationOnly,
    /// The officer opens the door, walks through to the exit anchor, then
    /// secures it behind the escort.
    PassThrough,
}

/// Physical open/closed state as reported by the embodiment layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    Open,
    Closed,
}

/// A validated door fixture.
///
/// Runtime open/locked/blocking state lives behind the embodiment seam; this
/// record carries the static data the choreography needs: anchors, mode, kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Door {
    pub id: DoorId,
    pub kind: DoorKind,
    pub mode: InteractionMode,
    /// Where the door itself sits (used for facing).
    pub position: Point,
    /// Where an officer stands to operate the door.
    pub approach: Point,
    /// Far-side anchor. Present iff `mode` is `PassThrough`.
    pub exit: Option<Point>,
}

/// Unvalidated door row as loaded from facility data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorSpec {
    pub id: DoorId,
    pub kind: DoorKind,
    pub mode: InteractionMode,
    pub position: Point,
    pub approach: Point,
    #[serde(default)]
    pub exit: Option<Point>,
}

/// Configuration errors raised while building the door table.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FacilityError {
    #[error("pass-through door {0} has no exit anchor")]
    MissingExitAnchor(DoorId),

    #[error("operation-only door {0} declares an exit anchor")]
    UnexpectedExitAnchor(DoorId),

    #[error("door {0} declared more than once")]
    DuplicateDoor(DoorId),

    #[error("unknown door {0}")]
    UnknownDoor(DoorId),
}

/// Typed lookup table of all facility doors, built once and validated.
#[derive(Debug, Clone, Default)]
pub struct DoorRegistry {
    doors: HashMap<DoorId, Door>,
}

impl DoorRegistry {
    /// Build and validate the table. Every pass-through door must resolve an
    /// exit anchor and no operation-only door may carry one.
    pub fn build(specs: Vec<DoorSpec>) -> Result<Self, FacilityError> {
        let mut doors = HashMap::with_capacity(specs.len());
        for spec in specs {
            match (spec.mode, &spec.exit) {
                (InteractionMode::PassThrough, None) => {
                    return Err(FacilityError::MissingExitAnchor(spec.id));
                }
                (InteractionMode::OperationOnly, Some(_)) => {
                    return Err(FacilityError::UnexpectedExitAnchor(spec.id));
                }
                _ => {}
            }
            let door = Door {
                id: spec.id.clone(),
                kind: spec.kind,
                mode: spec.mode,
                position: spec.position,
                approach: spec.approach,
                exit: spec.exit,
            };
            if doors.insert(spec.id.clone(), door).is_some() {
                return Err(FacilityError::DuplicateDoor(spec.id));
            }
        }
        Ok(Self { doors })
    }

    pub fn get(&self, id: &DoorId) -> Option<&Door> {
        self.doors.get(id)
    }

    /// Lookup that treats a missing door as the configuration error it is.
    pub fn require(&self, id: &DoorId) -> Result<&Door, FacilityError> {
        self.doors
            .get(id)
            .ok_or_else(|| FacilityError::UnknownDoor(id.clone()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &DoorId> {
        self.doors.keys()
    }

    pub fn len(&self) -> usize {
        self.doors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass_through(id: &str) -> DoorSpec {
        DoorSpec {
            id: DoorId::from(id),
            kind: DoorKind::Area,
            mode: InteractionMode::PassThrough,
            position: Point::new(5.0, 0.0, 0.0),
            approach: Point::new(4.0, 0.0, 0.0),
            exit: Some(Point::new(6.0, 0.0, 0.0)),
        }
    }

    fn operation_only(id: &str) -> DoorSpec {
        DoorSpec {
            id: DoorId::from(id),
            kind: DoorKind::Cell,
            mode: InteractionMode::OperationOnly,
            position: Point::new(1.0, 0.0, 0.0),
            approach: Point::new(0.0, 0.0, 0.0),
            exit: None,
        }
    }

    #[test]
    fn test_build_valid_table() {
        let registry =
            DoorRegistry::build(vec![pass_through("Gate-1"), operation_only("Cell-A-1")]).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get(&DoorId::from("Gate-1")).is_some());
    }

    #[test]
    fn test_missing_exit_anchor_is_hard_error() {
        let mut spec = pass_through("Gate-1");
        spec.exit = None;
        let err = DoorRegistry::build(vec![spec]).unwrap_err();
        assert!(matches!(err, FacilityError::MissingExitAnchor(_)));
    }

    #[test]
    fn test_unexpected_exit_anchor_is_hard_error() {
        let mut spec = operation_only("Cell-A-1");
        spec.exit = Some(Point::ORIGIN);
        let err = DoorRegistry::build(vec![spec]).unwrap_err();
        assert!(matches!(err, FacilityError::UnexpectedExitAnchor(_)));
    }

    #[test]
    fn test_duplicate_door_rejected() {
        let err =
            DoorRegistry::build(vec![operation_only("Cell-A-1"), operation_only("Cell-A-1")])
                .unwrap_err();
        assert!(matches!(err, FacilityError::DuplicateDoor(_)));
    }

    #[test]
    fn test_require_unknown_door() {
        let registry = DoorRegistry::build(vec![]).unwrap();
        let err = registry.require(&DoorId::from("Gate-9")).unwrap_err();
        assert!(matches!(err, FacilityError::UnknownDoor(_)));
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0, 0.0);
        let b = Point::new(3.0, 4.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }
}
