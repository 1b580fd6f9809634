//! Escort session records and the identities that key them.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::door::Point;

/// Identity of an officer agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfficerId(String);

impl OfficerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OfficerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OfficerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of an escorted subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of escort an officer is running. Any two concurrent escorts of
/// differing kinds are treated as conflicting by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscortKind {
    Intake,
    Release,
    Generic,
}

impl fmt::Display for EscortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intake => f.write_str("intake"),
            Self::Release => f.write_str("release"),
            Self::Generic => f.write_str("generic"),
        }
    }
}

/// An active escort, registered with the coordinator for its whole lifetime.
///
/// Invariants enforced by the coordinator: at most one active session per
/// subject and per officer; sessions older than the staleness window are
/// swept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscortSession {
    pub officer: OfficerId,
    pub subject: SubjectId,
    pub kind: EscortKind,
    /// Scheduler time at registration.
    pub started_at: Duration,
    /// Where the escort is currently headed, if known.
    pub current_destination: Option<Point>,
    /// Remaining route waypoints, front first.
    pub planned_route: Vec<Point>,
}

impl EscortSession {
    pub fn new(officer: OfficerId, subject: SubjectId, kind: EscortKind, now: Duration) -> Self {
        Self {
            officer,
            subject,
            kind,
            started_at: now,
            current_destination: None,
            planned_route: Vec::new(),
        }
    }

    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started_at)
    }

    pub fn is_stale(&self, now: Duration, max_age: Duration) -> bool {
        self.age(now) >= max_age
    }
}
