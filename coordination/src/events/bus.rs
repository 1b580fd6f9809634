//! Event bus for escort observability.
//!
//! Pub/sub messaging on a Tokio broadcast channel. Publishing never blocks
//! the scheduler tick; an event with no subscribers is simply dropped.

use tokio::sync::broadcast;
use tracing::debug;

use super::types::EscortEvent;
use crate::door::DoorId;
use crate::session::OfficerId;

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 256;

/// Broadcast bus carrying [`EscortEvent`]s to integration listeners.
pub struct EventBus {
    sender: broadcast::Sender<EscortEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event to all subscribers. Infallible: no receivers is fine.
    pub fn publish(&self, event: EscortEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "Event published"),
            Err(_) => debug!(event_type, "Event published (no receivers)"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EscortEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter for selective subscription.
#[derive(Default)]
pub struct EventFilter {
    pub officer: Option<OfficerId>,
    pub door: Option<DoorId>,
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// An empty filter matches every event.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn officer(mut self, officer: OfficerId) -> Self {
        self.officer = Some(officer);
        self
    }

    pub fn door(mut self, door: DoorId) -> Self {
        self.door = Some(door);
        self
    }

    pub fn types(mut self, event_types: Vec<&str>) -> Self {
        self.event_types = Some(event_types.into_iter().map(String::from).collect());
        self
    }

    pub fn matches(&self, event: &EscortEvent) -> bool {
        if let Some(ref officer) = self.officer {
            if event.officer() != officer {
                return false;
            }
        }
        if let Some(ref door) = self.door {
            match event.door() {
                Some(event_door) if event_door == door => {}
                _ => return false,
            }
        }
        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }
        true
    }
}

/// Receiver that only yields events matching its filter.
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<EscortEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    pub fn new(receiver: broadcast::Receiver<EscortEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    pub async fn recv(&mut self) -> Result<EscortEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

/// Extension trait for subscribing with filters.
pub trait EventBusExt {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver;
}

impl EventBusExt for EventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}
