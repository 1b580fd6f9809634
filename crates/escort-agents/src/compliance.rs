//! Subject compliance monitoring during active escorts.
//!
//! Converts officer↔subject distance into patience decay/growth and
//! escalating verbal warnings. Patience is read-only output for the
//! surrounding escort logic; the monitor never aborts anything itself.

use std::time::Duration;

use coordination::Point;
use serde::Deserialize;

/// Distance band the subject currently falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComplianceBand {
    /// Within escort distance; patience regenerates.
    Compliant,
    /// Drifting; no patience change yet.
    Warning,
    /// Clearly out of line; patience decays and warnings fire.
    Violation,
    /// Effectively fleeing; strongest warning tier.
    Escape,
}

impl ComplianceBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::Warning => "warning",
            Self::Violation => "violation",
            Self::Escape => "escape",
        }
    }
}

/// Tunables for the compliance monitor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Distance (m) inside which the subject is compliant.
    pub compliant_radius: f32,
    /// Outer edge (m) of the drift band.
    pub warning_radius: f32,
    /// Outer edge (m) of the violation band; beyond is escape.
    pub violation_radius: f32,
    /// Patience regained per second while compliant.
    pub regen_per_sec: f32,
    /// Patience lost per second while in violation or escape.
    pub decay_per_sec: f32,
    /// Minimum seconds between repeated verbal warnings.
    pub warning_cooldown_secs: f32,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            compliant_radius: 2.0,
            warning_radius: 3.0,
            violation_radius: 5.0,
            regen_per_sec: 2.0,
            decay_per_sec: 5.0,
            warning_cooldown_secs: 5.0,
        }
    }
}

impl ComplianceConfig {
    pub fn warning_cooldown(&self) -> Duration {
        Duration::from_secs_f32(self.warning_cooldown_secs)
    }
}

/// A verbal warning the officer should deliver this tick.
#[derive(Debug, Clone)]
pub struct ComplianceWarning {
    pub band: ComplianceBand,
    pub line: &'static str,
}

/// Per-escort tracker of subject distance and officer patience.
pub struct ComplianceMonitor {
    config: ComplianceConfig,
    patience: f32,
    band: ComplianceBand,
    last_warning_at: Option<Duration>,
    last_observed_at: Option<Duration>,
    warnings_issued: u32,
}

impl ComplianceMonitor {
    pub fn new(config: ComplianceConfig) -> Self {
        Self {
            config,
            patience: 100.0,
            band: ComplianceBand::Compliant,
            last_warning_at: None,
            last_observed_at: None,
            warnings_issued: 0,
        }
    }

    /// Patience in [0, 100].
    pub fn patience(&self) -> f32 {
        self.patience
    }

    pub fn band(&self) -> ComplianceBand {
        self.band
    }

    /// Restart interval accounting after a stretch with no observations.
    ///
    /// Patience only moves while the escort is walking; without this, the
    /// first observation after a station wait would charge the whole pause
    /// at the current band's rate.
    pub fn resume(&mut self, now: Duration) {
        self.last_observed_at = Some(now);
    }

    /// Observe one tick of an active escort walk.
    ///
    /// Returns a warning when the subject is in violation or escape and the
    /// cooldown window has elapsed.
    pub fn observe(
        &mut self,
        officer: Point,
        subject: Point,
        now: Duration,
    ) -> Option<ComplianceWarning> {
        let dt = match self.last_observed_at {
            Some(prev) => now.saturating_sub(prev).as_secs_f32(),
            None => 0.0,
        };
        self.last_observed_at = Some(now);

        let distance = officer.distance(&subject);
        self.band = if distance <= self.config.compliant_radius {
            ComplianceBand::Compliant
        } else if distance <= self.config.warning_radius {
            ComplianceBand::Warning
        } else if distance <= self.config.violation_radius {
            ComplianceBand::Violation
        } else {
            ComplianceBand::Escape
        };

        match self.band {
            ComplianceBand::Compliant => {
                self.patience += self.config.regen_per_sec * dt;
            }
            ComplianceBand::Warning => {}
            ComplianceBand::Violation | ComplianceBand::Escape => {
                self.patience -= self.config.decay_per_sec * dt;
            }
        }
        self.patience = self.patience.clamp(0.0, 100.0);

        if self.band < ComplianceBand::Violation {
            return None;
        }
        let cooled_down = match self.last_warning_at {
            Some(last) => now.saturating_sub(last) >= self.config.warning_cooldown(),
            None => true,
        };
        if !cooled_down {
            return None;
        }
        self.last_warning_at = Some(now);
        self.warnings_issued += 1;
        Some(ComplianceWarning {
            band: self.band,
            line: self.warning_line(),
        })
    }

    fn warning_line(&self) -> &'static str {
        match self.band {
            ComplianceBand::Escape => "Stop right there! Return to your escort, now!",
            _ if self.warnings_issued <= 1 => "Stay close to me.",
            _ => "I said stay close. This is your final warning.",
        }
    }
}
