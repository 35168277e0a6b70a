//! Live terminal status view.
//!
//! Every refresh re-resolves the live log, so a day rollover or a log that
//! does not exist yet is picked up without restarting the view.

use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::MonitorConfig;
use crate::log::{find_latest_log, read_history, History, Measurement, Status, Target, TIMESTAMP_FORMAT};

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_GREEN: &str = "\x1b[92m";
const COLOR_YELLOW: &str = "\x1b[93m";
const COLOR_RED: &str = "\x1b[91m";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Speedtest lines shown at the bottom of the view.
const SPEEDTEST_LINES: usize = 4;

fn status_color(status: Status) -> &'static str {
    match status {
        Status::Ok => COLOR_GREEN,
        Status::WarnLatency | Status::WarnLoss => COLOR_YELLOW,
        Status::Critical | Status::Down => COLOR_RED,
    }
}

fn boxed_label(label: &str) -> String {
    let rule = "=".repeat(label.chars().count() + 4);
    format!("{rule}\n| {label} |\n{rule}")
}

/// One rendered screen of the status view.
#[derive(Debug)]
pub struct Frame {
    pub now: NaiveDateTime,
    /// Live log file, `None` when no log exists yet.
    pub source: Option<PathBuf>,
    pub history: History,
    pub recent_entries: usize,
    pub refresh_seconds: u64,
    /// `None` when no speedtest log is configured.
    pub speedtests: Option<Vec<String>>,
}

impl Frame {
    /// Collect everything a frame shows from disk.
    pub fn capture(config: &MonitorConfig) -> Self {
        let now = Local::now().naive_local();
        let net = &config.network;
        let view = &config.view;

        let source = find_latest_log(&net.log_dir, &net.log_prefix).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            None
        });
        let history = match &source {
            Some(path) => read_history(path, view.history_entries).unwrap_or_else(|e| {
                tracing::warn!("{}", e);
                History::default()
            }),
            None => History::default(),
        };
        let speedtests = view
            .speedtest_log
            .as_deref()
            .map(|path| read_last_lines(path, SPEEDTEST_LINES));

        Self {
            now,
            source,
            history,
            recent_entries: view.recent_entries,
            refresh_seconds: view.refresh_seconds,
            speedtests,
        }
    }

    fn fmt_target(&self, f: &mut fmt::Formatter<'_>, target: Target) -> fmt::Result {
        let entries = self.history.for_target(target);
        let Some(last) = self.history.latest(target) else {
            return writeln!(f, "{}No data for {} in the log.{}", COLOR_RED, target, COLOR_RESET);
        };

        writeln!(f)?;
        let label = format!("{}: {}", target, last.status);
        writeln!(f, "{}{}{}", status_color(last.status), boxed_label(&label), COLOR_RESET)?;
        writeln!(
            f,
            "Last measurement: {}  loss={}%  avg={:.1} ms",
            last.timestamp.format(TIMESTAMP_FORMAT),
            last.packet_loss_percent,
            last.avg_latency_ms
        )?;

        let shown = entries.len().min(self.recent_entries);
        writeln!(f, "  Last {} measurements (newest first):", shown)?;
        for m in entries.iter().rev().take(self.recent_entries) {
            writeln!(
                f,
                "    {}  loss={:3}%  avg={:6.1} ms  {}",
                m.timestamp.format(TIMESTAMP_FORMAT),
                m.packet_loss_percent,
                m.avg_latency_ms,
                m.status
            )?;
        }

        let (avg_loss, avg_latency) = averages(entries);
        writeln!(
            f,
            "  Average of last {} measurements: loss={:.1}%  avg={:.1} ms",
            entries.len(),
            avg_loss,
            avg_latency
        )
    }
}

fn averages(entries: &[Measurement]) -> (f64, f64) {
    if entries.is_empty() {
        return (0.0, 0.0);
    }
    let n = entries.len() as f64;
    let loss: f64 = entries.iter().map(|m| m.packet_loss_percent as f64).sum();
    let latency: f64 = entries.iter().map(|m| m.avg_latency_ms).sum();
    (loss / n, latency / n)
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Network Probe - STATUS   ({})", self.now.format(TIMESTAMP_FORMAT))?;
        writeln!(f, "{}", "-".repeat(60))?;

        let Some(source) = &self.source else {
            writeln!(
                f,
                "{}No log files yet. Make sure `netwatch monitor` is running.{}",
                COLOR_RED, COLOR_RESET
            )?;
            return writeln!(f, "Refreshing every {} s (Ctrl+C to quit)", self.refresh_seconds);
        };

        for target in Target::ALL {
            self.fmt_target(f, target)?;
        }

        writeln!(f)?;
        writeln!(f, "Legend:")?;
        writeln!(f, "{}  OK{}                - no problems", COLOR_GREEN, COLOR_RESET)?;
        writeln!(
            f,
            "{}  WARN_LATENCY/LOSS{} - high latency or packet loss",
            COLOR_YELLOW, COLOR_RESET
        )?;
        writeln!(
            f,
            "{}  CRITICAL/DOWN{}     - severe loss or no link at all",
            COLOR_RED, COLOR_RESET
        )?;
        writeln!(f, "{}", "-".repeat(60))?;
        writeln!(f, "Ping source : {}", source.display())?;

        match &self.speedtests {
            Some(lines) if !lines.is_empty() => {
                writeln!(f, "Recent speedtests (newest first):")?;
                for line in lines {
                    writeln!(f, "  {}", line)?;
                }
            }
            Some(_) => writeln!(f, "Speedtest: no data")?,
            None => {}
        }

        writeln!(f, "Refreshing every {} s (Ctrl+C to quit)", self.refresh_seconds)
    }
}

/// Last `count` non-empty lines of `path`, newest first. Unreadable files have none.
pub fn read_last_lines(path: &Path, count: usize) -> Vec<String> {
    let Ok(bytes) = fs::read(path) else {
        return Vec::new();
    };
    let content = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines
        .iter()
        .rev()
        .take(count)
        .map(|line| line.to_string())
        .collect()
}

/// Redraw the status view until a stop is requested. With `once`, draw a
/// single frame without clearing the screen.
pub async fn run(config: &MonitorConfig, once: bool, mut stop_rx: broadcast::Receiver<()>) {
    if once {
        print!("{}", Frame::capture(config));
        return;
    }

    let refresh = Duration::from_secs(config.view.refresh_seconds);
    loop {
        print!("{}{}", CLEAR_SCREEN, Frame::capture(config));

        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = tokio::time::sleep(refresh) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogWriter, HEADER};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn measurement(minute: u32, target: Target, loss: u32, latency: f64, status: Status) -> Measurement {
        Measurement {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 9)
                .unwrap()
                .and_hms_opt(11, minute, 0)
                .unwrap(),
            target,
            packet_loss_percent: loss,
            avg_latency_ms: latency,
            status,
        }
    }

    fn frame(history: History) -> Frame {
        Frame {
            now: now(),
            source: Some(PathBuf::from("/var/log/netwatch/network_log_2024-03-09.csv")),
            history,
            recent_entries: 2,
            refresh_seconds: 5,
            speedtests: None,
        }
    }

    #[test]
    fn test_boxed_label() {
        assert_eq!(boxed_label("ROUTER: OK"), "==============\n| ROUTER: OK |\n==============");
    }

    #[test]
    fn test_status_colors() {
        assert_eq!(status_color(Status::Ok), COLOR_GREEN);
        assert_eq!(status_color(Status::WarnLoss), COLOR_YELLOW);
        assert_eq!(status_color(Status::WarnLatency), COLOR_YELLOW);
        assert_eq!(status_color(Status::Critical), COLOR_RED);
        assert_eq!(status_color(Status::Down), COLOR_RED);
    }

    #[test]
    fn test_frame_without_log_says_so() {
        let mut f = frame(History::default());
        f.source = None;
        let text = f.to_string();
        assert!(text.contains("No log files yet"));
        assert!(!text.contains("Legend"));
    }

    #[test]
    fn test_frame_renders_latest_and_recent() {
        let rows = vec![
            measurement(0, Target::Router, 0, 1.0, Status::Ok),
            measurement(1, Target::Router, 10, 3.0, Status::WarnLoss),
            measurement(2, Target::Router, 100, 0.0, Status::Down),
        ];
        let text = frame(History::from_measurements(rows, 100)).to_string();

        assert!(text.contains(&format!("{}==", COLOR_RED)));
        assert!(text.contains("| ROUTER: DOWN |"));
        assert!(text.contains("Last measurement: 2024-03-09 11:02:00  loss=100%  avg=0.0 ms"));
        assert!(text.contains("    2024-03-09 11:02:00  loss=100%  avg=   0.0 ms  DOWN"));
        assert!(text.contains("    2024-03-09 11:01:00  loss= 10%  avg=   3.0 ms  WARN_LOSS"));
        // Only `recent_entries` rows are listed.
        assert!(!text.contains("    2024-03-09 11:00:00"));
        assert!(text.contains("  Last 2 measurements (newest first):"));
        assert!(text.contains("Average of last 3 measurements: loss=36.7%  avg=1.3 ms"));
        assert!(text.contains("No data for INTERNET"));
    }

    #[test]
    fn test_recent_heading_counts_available_rows() {
        let rows = vec![measurement(0, Target::Internet, 0, 18.0, Status::Ok)];
        let text = frame(History::from_measurements(rows, 100)).to_string();

        assert!(text.contains("  Last 1 measurements (newest first):"));
        assert!(!text.contains("Last 2 measurements"));
    }

    #[test]
    fn test_frame_lists_speedtests() {
        let mut f = frame(History::default());
        f.speedtests = Some(vec!["down 95 Mbit/s".to_string()]);
        assert!(f.to_string().contains("  down 95 Mbit/s"));

        f.speedtests = Some(Vec::new());
        assert!(f.to_string().contains("Speedtest: no data"));
    }

    #[test]
    fn test_read_last_lines_newest_first() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("speed_log.txt");
        fs::write(&path, "a\n\nb\nc\n  \nd\ne\n").unwrap();

        assert_eq!(read_last_lines(&path, 4), vec!["e", "d", "c", "b"]);
        assert!(read_last_lines(&tmp.path().join("absent.txt"), 4).is_empty());
    }

    #[test]
    fn test_run_once_draws_without_waiting() {
        let tmp = TempDir::new().unwrap();
        let mut config = MonitorConfig::default();
        config.network.log_dir = tmp.path().to_path_buf();
        let (_tx, rx) = broadcast::channel(1);

        let mut task = tokio_test::task::spawn(run(&config, true, rx));
        tokio_test::assert_ready!(task.poll());
    }

    #[test]
    fn test_capture_reads_live_log() {
        let tmp = TempDir::new().unwrap();
        let mut config = MonitorConfig::default();
        config.network.log_dir = tmp.path().to_path_buf();

        let empty = Frame::capture(&config);
        assert!(empty.source.is_none());

        let writer = LogWriter::new(tmp.path(), "network_log");
        let path = writer.prepare(now().date()).unwrap();
        writer
            .append(&path, &measurement(0, Target::Internet, 0, 22.0, Status::Ok))
            .unwrap();

        let frame = Frame::capture(&config);
        assert_eq!(frame.source.as_deref(), Some(path.as_path()));
        assert_eq!(frame.history.for_target(Target::Internet).len(), 1);
        assert!(frame.history.for_target(Target::Router).is_empty());
        assert!(fs::read_to_string(&path).unwrap().starts_with(HEADER));
    }
}
