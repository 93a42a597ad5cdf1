// Alert thresholds, persisted client-side

use serde::{Deserialize, Serialize};

/// Warn/critical fill percentages. Invariant: 0 < warn < critical <= 100,
/// checked before acceptance; a stored pair is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warn: f64,
    pub critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warn: 70.0,
            critical: 85.0,
        }
    }
}

impl Thresholds {
    pub fn new(warn: f64, critical: f64) -> anyhow::Result<Self> {
        anyhow::ensure!(warn > 0.0, "warn threshold must be > 0, got {}", warn);
        anyhow::ensure!(
            warn < critical,
            "warn threshold must be below critical, got warn={} critical={}",
            warn,
            critical
        );
        anyhow::ensure!(
            critical <= 100.0,
            "critical threshold must be <= 100, got {}",
            critical
        );
        Ok(Self { warn, critical })
    }

    pub fn severity(&self, fill_percent: f64) -> Severity {
        if fill_percent >= self.critical {
            Severity::Critical
        } else if fill_percent >= self.warn {
            Severity::Warn
        } else {
            Severity::Ok
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ok,
    Warn,
    Critical,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Warn => "warn",
            Severity::Critical => "critical",
        }
    }
}
