//! Probe module for network monitoring.
//!
//! Round-trip probing is delegated to the external `fping` utility. Every
//! failure mode collapses into [`ProbeOutcome::FAILED`] so that a single bad
//! probe can never stop the monitoring loop.

mod fping;

pub use fping::*;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::NetworkConfig;

/// Probe error types. These never leave the prober.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("command failed: {0}")]
    Command(String),
}

/// Loss and average round-trip latency of one probe run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub loss_percent: u32,
    pub avg_latency_ms: f64,
}

impl ProbeOutcome {
    /// Result reported when the probe could not be run or understood.
    pub const FAILED: ProbeOutcome = ProbeOutcome {
        loss_percent: 100,
        avg_latency_ms: 0.0,
    };

    pub fn new(loss_percent: u32, avg_latency_ms: f64) -> Self {
        Self {
            loss_percent,
            avg_latency_ms,
        }
    }
}

/// Something that can measure loss and latency towards an address.
pub trait Prober {
    fn probe(&self, address: &str) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Executable to run, `fping` unless configured otherwise
    pub command: String,
    pub count: u32,
    pub interval_ms: u64,
    /// Upper bound on the whole process run
    pub timeout: Duration,
}

impl ProbeConfig {
    pub fn from_network(network: &NetworkConfig) -> Self {
        Self {
            command: network.probe_command.clone(),
            count: network.probe_count,
            interval_ms: network.probe_interval_ms,
            timeout: network.probe_timeout(),
        }
    }
}

/// Run one probe with the given configuration.
///
/// Never fails: execution errors and timeouts are reported as total loss.
pub async fn run_probe(config: &ProbeConfig, address: &str) -> ProbeOutcome {
    match run_fping(config, address).await {
        Ok(output) => {
            let outcome = parse_fping_output(&output);
            tracing::debug!(
                "Probe {} -> loss={}% avg={:.2}ms",
                address,
                outcome.loss_percent,
                outcome.avg_latency_ms
            );
            outcome
        }
        Err(e) => {
            tracing::warn!("Probe failed for {}: {}", address, e);
            ProbeOutcome::FAILED
        }
    }
}

/// The production prober, backed by `fping`.
#[derive(Debug, Clone)]
pub struct FpingProber {
    config: ProbeConfig,
}

impl FpingProber {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }
}

impl Prober for FpingProber {
    async fn probe(&self, address: &str) -> ProbeOutcome {
        run_probe(&self.config, address).await
    }
}
