//! Escort subsystem configuration.
//!
//! One flat struct carries the whole timeout/retry matrix. Every field has a
//! default, so a TOML file only needs the values it wants to change.

use std::path::Path;
use std::time::Duration;

use coordination::CoordinatorConfig;
use serde::Deserialize;

use crate::compliance::ComplianceConfig;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Tunables for the escort state machines and the coordinator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EscortConfig {
    /// Per-state timeout for door interactions.
    pub state_timeout_secs: f32,
    /// Timeout for escort-level navigation legs (fetch, stations, return).
    pub navigation_timeout_secs: f32,
    /// Grace before a still-closed door gets its one open re-issue.
    pub open_grace_secs: f32,
    /// Dwell at an operation-only door to let the subject act.
    pub dwell_secs: f32,
    /// How long the officer must be stationary before turning to face a door.
    pub settle_secs: f32,
    /// Delay before a terminal door interaction resets to idle.
    pub reset_delay_secs: f32,
    /// Restarts allowed per door interaction before it fails.
    pub max_attempts: u32,
    /// Door lease window.
    pub lease_ttl_secs: f32,
    /// Cross-kind escort conflict grace window.
    pub conflict_grace_secs: f32,
    /// Escort sessions older than this are swept.
    pub session_stale_secs: f32,
    /// Subject within this distance of the officer counts as "cleared" the
    /// origin door.
    pub clear_distance: f32,
    /// Beyond this distance the subject reference is treated as lost.
    pub subject_lost_distance: f32,
    pub compliance: ComplianceConfig,
}

impl Default for EscortConfig {
    fn default() -> Self {
        Self {
            state_timeout_secs: 10.0,
            navigation_timeout_secs: 15.0,
            open_grace_secs: 0.1,
            dwell_secs: 5.0,
            settle_secs: 0.3,
            reset_delay_secs: 1.0,
            max_attempts: 3,
            lease_ttl_secs: 10.0,
            conflict_grace_secs: 5.0,
            session_stale_secs: 300.0,
            clear_distance: 3.0,
            subject_lost_distance: 50.0,
            compliance: ComplianceConfig::default(),
        }
    }
}

impl EscortConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&raw)
    }

    pub fn state_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.state_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.navigation_timeout_secs)
    }

    pub fn open_grace(&self) -> Duration {
        Duration::from_secs_f32(self.open_grace_secs)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_secs_f32(self.dwell_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs_f32(self.settle_secs)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_secs_f32(self.reset_delay_secs)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs_f32(self.lease_ttl_secs)
    }

    /// The coordinator's view of these tunables.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            default_lease_ttl: self.lease_ttl(),
            conflict_grace: Duration::from_secs_f32(self.conflict_grace_secs),
            session_stale_after: Duration::from_secs_f32(self.session_stale_secs),
        }
    }
}
