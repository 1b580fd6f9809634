//! Time-boxed exclusive claims on doors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::door::DoorId;
use crate::session::OfficerId;

/// An exclusive claim on one door for a bounded window.
///
/// At most one unexpired lease may exist per door; the coordinator enforces
/// this. A lease past its TTL is simply unavailable; expiry is silent and
/// never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorLease {
    pub door: DoorId,
    pub holder: OfficerId,
    /// Scheduler time at acquisition.
    pub acquired_at: Duration,
    pub ttl: Duration,
}

impl DoorLease {
    pub fn new(door: DoorId, holder: OfficerId, acquired_at: Duration, ttl: Duration) -> Self {
        Self {
            door,
            holder,
            acquired_at,
            ttl,
        }
    }

    pub fn expires_at(&self) -> Duration {
        self.acquired_at + self.ttl
    }

    /// A lease is expired at exactly `acquired_at + ttl`, making the door
    /// available again at that instant.
    pub fn expired(&self, now: Duration) -> bool {
        now >= self.expires_at()
    }

    pub fn remaining(&self, now: Duration) -> Duration {
        self.expires_at().saturating_sub(now)
    }
}
