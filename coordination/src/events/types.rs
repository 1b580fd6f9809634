//! Observable escort events for integration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::door::DoorId;
use crate::session::{EscortKind, OfficerId, SubjectId};

/// Everything the escort subsystem reports to the outside world.
///
/// Events are best-effort notifications: dropping a receiver never stalls
/// the choreography.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EscortEvent {
    EscortStarted {
        officer: OfficerId,
        subject: SubjectId,
        kind: EscortKind,
        timestamp: DateTime<Utc>,
    },
    EscortCompleted {
        officer: OfficerId,
        subject: SubjectId,
        timestamp: DateTime<Utc>,
    },
    EscortFailed {
        officer: OfficerId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// An escort machine moved between phases.
    PhaseChanged {
        officer: OfficerId,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },
    InteractionComplete {
        officer: OfficerId,
        door: DoorId,
        timestamp: DateTime<Utc>,
    },
    InteractionFailed {
        officer: OfficerId,
        door: DoorId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// The compliance monitor fired a verbal warning.
    ComplianceWarning {
        officer: OfficerId,
        subject: SubjectId,
        band: String,
        line: String,
        timestamp: DateTime<Utc>,
    },
}

impl EscortEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::EscortStarted { .. } => "escort_started",
            Self::EscortCompleted { .. } => "escort_completed",
            Self::EscortFailed { .. } => "escort_failed",
            Self::PhaseChanged { .. } => "phase_changed",
            Self::InteractionComplete { .. } => "interaction_complete",
            Self::InteractionFailed { .. } => "interaction_failed",
            Self::ComplianceWarning { .. } => "compliance_warning",
        }
    }

    pub fn officer(&self) -> &OfficerId {
        match self {
            Self::EscortStarted { officer, .. }
            | Self::EscortCompleted { officer, .. }
            | Self::EscortFailed { officer, .. }
            | Self::PhaseChanged { officer, .. }
            | Self::InteractionComplete { officer, .. }
            | Self::InteractionFailed { officer, .. }
            | Self::ComplianceWarning { officer, .. } => officer,
        }
    }

    pub fn door(&self) -> Option<&DoorId> {
        match self {
            Self::InteractionComplete { door, .. } | Self::InteractionFailed { door, .. } => {
                Some(door)
            }
            _ => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::EscortStarted { timestamp, .. }
            | Self::EscortCompleted { timestamp, .. }
            | Self::EscortFailed { timestamp, .. }
            | Self::PhaseChanged { timestamp, .. }
            | Self::InteractionComplete { timestamp, .. }
            | Self::InteractionFailed { timestamp, .. }
            | Self::ComplianceWarning { timestamp, .. } => *timestamp,
        }
    }
}
