//! Escort event types and the broadcast bus that carries them.

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventBusExt, EventFilter, FilteredReceiver};
pub use types::EscortEvent;
