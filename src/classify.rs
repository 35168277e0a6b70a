//! Status classification of a single measurement.

use serde::Deserialize;

use crate::log::Status;

/// Threshold configuration, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Average latency at or above which a target is `WARN_LATENCY` (default: 100.0)
    pub latency_warn_ms: f64,
    /// Packet loss at or above which a target is `WARN_LOSS` (default: 5)
    pub loss_warn_percent: u32,
    /// Packet loss at or above which a target is `CRITICAL` (default: 20)
    pub loss_critical_percent: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            latency_warn_ms: 100.0,
            loss_warn_percent: 5,
            loss_critical_percent: 20,
        }
    }
}

/// Classify a loss/latency pair. First matching rule wins.
pub fn classify(loss_percent: u32, avg_latency_ms: f64, thresholds: &Thresholds) -> Status {
    if loss_percent == 100 {
        return Status::Down;
    }
    if loss_percent >= thresholds.loss_critical_percent {
        return Status::Critical;
    }
    if loss_percent >= thresholds.loss_warn_percent {
        return Status::WarnLoss;
    }
    if avg_latency_ms >= thresholds.latency_warn_ms {
        return Status::WarnLatency;
    }
    Status::Ok
}
