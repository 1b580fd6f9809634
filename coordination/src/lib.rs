//! Coordination layer for facility escorts.
//!
//! This crate owns the shared mutable state of the escort choreography:
//! - the typed door table ([`DoorRegistry`]), validated once at load,
//! - time-boxed door leases ([`DoorLease`]),
//! - the escort-session registry and conflict arbitration ([`Coordinator`]),
//! - the observable event stream ([`EventBus`] / [`EscortEvent`]).
//!
//! The per-officer state machines live in the `escort-agents` crate and go
//! through the [`Coordinator`] for every shared resource.

pub mod coordinator;
pub mod door;
pub mod events;
pub mod lease;
pub mod session;

pub use coordinator::{CoordinationError, Coordinator, CoordinatorConfig};
pub use door::{Door, DoorId, DoorKind, DoorRegistry, DoorSpec, DoorState, FacilityError, InteractionMode, Point};
pub use events::{EscortEvent, EventBus, EventBusExt, EventFilter, FilteredReceiver};
pub use lease::DoorLease;
pub use session::{EscortKind, EscortSession, OfficerId, SubjectId};
