//! Officer escort agents: per-officer state machines that walk subjects
//! through the facility, door interactions with leased exclusivity, and a
//! tick-driven scheduler binding them to a [`World`](world::World).
//!
//! Shared facility state (door registry, leases, sessions, events) lives in
//! the `coordination` crate; this crate owns everything per-officer.

pub mod compliance;
pub mod config;
pub mod door_interaction;
pub mod escort;
pub mod scheduler;
pub mod sim;
pub mod world;

pub use compliance::{ComplianceBand, ComplianceConfig, ComplianceMonitor, ComplianceWarning};
pub use config::{ConfigError, EscortConfig};
pub use door_interaction::{DoorInteraction, DoorInteractionState, InteractionOutcome};
pub use escort::{EscortMachine, EscortPhase, EscortPlan, Station, StationWait};
pub use scheduler::EscortScheduler;
pub use sim::SimWorld;
pub use world::{MoveStatus, World};
