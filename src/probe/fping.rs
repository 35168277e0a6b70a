//! `fping` invocation and summary parsing.
//!
//! In quiet mode fping prints one summary line per target on stderr:
//!
//! ```text
//! 8.8.8.8 : xmt/rcv/%loss = 5/5/0%, min/avg/max = 11.2/12.3/14.1
//! ```
//!
//! The `min/avg/max` part is omitted when no reply was received.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;

use super::{ProbeConfig, ProbeError, ProbeOutcome};

/// Run fping against `address` and return its diagnostic output.
///
/// fping exits non-zero whenever a reply is missing, so the exit status is not
/// treated as an error; only spawn failures and timeouts are.
pub async fn run_fping(config: &ProbeConfig, address: &str) -> Result<String, ProbeError> {
    let mut cmd = Command::new(&config.command);
    cmd.args([
        "-c",
        &config.count.to_string(),
        "-q",
        "-p",
        &config.interval_ms.to_string(),
        address,
    ]);
    run_with_timeout(cmd, config.timeout).await
}

/// Run `cmd` to completion within `timeout`, killing it otherwise.
///
/// Returns stderr, or stdout when stderr is empty.
async fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<String, ProbeError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(ProbeError::Command(format!(
                "failed to execute {}: {}",
                program, e
            )))
        }
        Err(_) => return Err(ProbeError::Timeout(timeout)),
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Ok(stderr.into_owned())
    }
}

/// Parse an fping summary into loss and average latency.
///
/// Loss and latency default independently: a missing or non-numeric loss
/// reads as 100, a missing or non-numeric average as 0.0.
pub fn parse_fping_output(output: &str) -> ProbeOutcome {
    static LOSS_RE: OnceLock<Regex> = OnceLock::new();
    let loss_re = LOSS_RE.get_or_init(|| {
        Regex::new(r"xmt/rcv/%loss\s*=\s*[^/\s]*/[^/\s]*/(?P<loss>[^,%\s]*)").unwrap()
    });

    static RTT_RE: OnceLock<Regex> = OnceLock::new();
    let rtt_re = RTT_RE.get_or_init(|| {
        Regex::new(r"min/avg/max\s*=\s*[^/\s]*/(?P<avg>[^/\s,]*)").unwrap()
    });

    let loss_percent = loss_re
        .captures(output)
        .and_then(|caps| caps.name("loss"))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|loss| loss.min(100))
        .unwrap_or(100);

    let avg_latency_ms = rtt_re
        .captures(output)
        .and_then(|caps| caps.name("avg"))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|avg| avg.is_finite() && *avg >= 0.0)
        .unwrap_or(0.0);

    ProbeOutcome::new(loss_percent, avg_latency_ms)
}
