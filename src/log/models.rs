//! Measurement log model types.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use crate::classify::{classify, Thresholds};

/// Field delimiter of the measurement log.
pub const DELIMITER: char = ';';

/// Header row written once at the top of every daily log file.
pub const HEADER: &str = "Timestamp;Target;Packet_Loss_%;Avg_Latency_ms;Status";

/// Timestamp format of the first column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A monitored endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    Router,
    Internet,
}

impl Target {
    /// Probing order within one cycle.
    pub const ALL: [Target; 2] = [Target::Router, Target::Internet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Router => "ROUTER",
            Target::Internet => "INTERNET",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROUTER" => Ok(Target::Router),
            "INTERNET" => Ok(Target::Internet),
            other => Err(format!("unknown target: {}", other)),
        }
    }
}

/// Classification outcome, ordered from healthy to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Ok,
    WarnLatency,
    WarnLoss,
    Critical,
    Down,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Ok,
        Status::WarnLatency,
        Status::WarnLoss,
        Status::Critical,
        Status::Down,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::WarnLatency => "WARN_LATENCY",
            Status::WarnLoss => "WARN_LOSS",
            Status::Critical => "CRITICAL",
            Status::Down => "DOWN",
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() so width specifiers work in tabular output
        f.pad(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status: {}", s))
    }
}

/// One probe outcome for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub timestamp: NaiveDateTime,
    pub target: Target,
    pub packet_loss_percent: u32,
    pub avg_latency_ms: f64,
    pub status: Status,
}

impl Measurement {
    /// Build a measurement, deriving its status from the thresholds.
    pub fn classified(
        timestamp: NaiveDateTime,
        target: Target,
        packet_loss_percent: u32,
        avg_latency_ms: f64,
        thresholds: &Thresholds,
    ) -> Self {
        Self {
            timestamp,
            target,
            packet_loss_percent,
            avg_latency_ms,
            status: classify(packet_loss_percent, avg_latency_ms, thresholds),
        }
    }

    /// Render the log row for this measurement, without the line terminator.
    pub fn to_row(&self) -> String {
        format!(
            "{ts}{d}{target}{d}{loss}{d}{latency:.2}{d}{status}",
            ts = self.timestamp.format(TIMESTAMP_FORMAT),
            target = self.target,
            loss = self.packet_loss_percent,
            latency = self.avg_latency_ms,
            status = self.status.as_str(),
            d = DELIMITER,
        )
    }
}
