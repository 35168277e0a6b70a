//! Scheduler module: the sampling control loop.
//!
//! Each cycle probes ROUTER then INTERNET, classifies both results, appends
//! them to today's log under one shared timestamp, and sleeps for a duration
//! picked from the two statuses.

use chrono::{Local, NaiveDateTime, Timelike};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::config::{MonitorConfig, NetworkConfig};
use crate::log::{LogError, LogWriter, Measurement, Status, Target};
use crate::probe::Prober;

/// Sampling state derived from the statuses of the last cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Every target was OK: sample slowly.
    Steady,
    /// At least one target was not OK: sample quickly.
    Alert,
}

impl ControlState {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Status>,
    {
        if statuses.into_iter().all(|s| s.is_ok()) {
            ControlState::Steady
        } else {
            ControlState::Alert
        }
    }

    pub fn sleep_duration(self, network: &NetworkConfig) -> Duration {
        match self {
            ControlState::Steady => network.interval_ok(),
            ControlState::Alert => network.interval_problem(),
        }
    }
}

/// What one cycle produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: NaiveDateTime,
    pub measurements: Vec<Measurement>,
}

impl CycleReport {
    pub fn control_state(&self) -> ControlState {
        ControlState::from_statuses(self.measurements.iter().map(|m| m.status))
    }
}

/// The main scheduler that drives the probe cycles.
pub struct Scheduler<P> {
    config: MonitorConfig,
    prober: P,
    writer: LogWriter,
    last_status: HashMap<Target, Status>,
}

impl<P: Prober> Scheduler<P> {
    pub fn new(config: MonitorConfig, prober: P) -> Self {
        let writer = LogWriter::new(&config.network.log_dir, &config.network.log_prefix);
        Self {
            config,
            prober,
            writer,
            last_status: HashMap::new(),
        }
    }

    /// Run cycles until a stop is requested on `stop_rx` or its sender is dropped.
    ///
    /// The stop signal is checked before every cycle and raced against every
    /// sleep. Log failures end the loop with an error.
    pub async fn run(&mut self, mut stop_rx: broadcast::Receiver<()>) -> Result<(), LogError> {
        tracing::info!(
            "Scheduler: monitoring {} (ROUTER) and {} (INTERNET)",
            self.config.network.router_address,
            self.config.network.internet_address
        );

        loop {
            if stop_requested(&mut stop_rx) {
                break;
            }

            let report = self.run_cycle().await?;
            let state = report.control_state();
            let pause = state.sleep_duration(&self.config.network);
            tracing::debug!(
                "Cycle {} done ({:?}), sleeping {:?}",
                report.timestamp,
                state,
                pause
            );

            tokio::select! {
                _ = stop_rx.recv() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!("Scheduler: stopped");
        Ok(())
    }

    /// Run one cycle stamped with the current local time.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, LogError> {
        let now = Local::now().naive_local();
        self.run_cycle_at(now.with_nanosecond(0).unwrap_or(now)).await
    }

    async fn run_cycle_at(&mut self, timestamp: NaiveDateTime) -> Result<CycleReport, LogError> {
        let path = self.writer.prepare(timestamp.date())?;
        let mut measurements = Vec::with_capacity(Target::ALL.len());

        for target in Target::ALL {
            let address = self.config.network.address(target);
            let outcome = self.prober.probe(address).await;
            let measurement = Measurement::classified(
                timestamp,
                target,
                outcome.loss_percent,
                outcome.avg_latency_ms,
                &self.config.thresholds,
            );

            self.writer.append(&path, &measurement)?;
            self.note_transition(&measurement);
            measurements.push(measurement);
        }

        Ok(CycleReport {
            timestamp,
            measurements,
        })
    }

    fn note_transition(&mut self, m: &Measurement) {
        let previous = self.last_status.insert(m.target, m.status);
        if previous == Some(m.status) {
            return;
        }
        let was = previous.map(|s| s.as_str()).unwrap_or("-");
        if m.status.is_ok() {
            tracing::info!("{}: {} -> {}", m.target, was, m.status);
        } else {
            tracing::warn!(
                "{}: {} -> {} (loss={}% avg={:.2}ms)",
                m.target,
                was,
                m.status,
                m.packet_loss_percent,
                m.avg_latency_ms
            );
        }
    }
}

fn stop_requested(stop_rx: &mut broadcast::Receiver<()>) -> bool {
    !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Thresholds;
    use crate::log::{read_log, HEADER};
    use crate::probe::ProbeOutcome;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned outcomes and records the addresses it was asked to probe.
    struct ScriptedProber {
        outcomes: Mutex<VecDeque<ProbeOutcome>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProber {
        fn new(outcomes: &[(u32, f64)]) -> Self {
            Self {
                outcomes: Mutex::new(
                    outcomes
                        .iter()
                        .map(|&(loss, latency)| ProbeOutcome::new(loss, latency))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Prober for ScriptedProber {
        async fn probe(&self, address: &str) -> ProbeOutcome {
            self.calls.lock().unwrap().push(address.to_string());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ProbeOutcome::FAILED)
        }
    }

    fn config(dir: &TempDir) -> MonitorConfig {
        let mut cfg = MonitorConfig::default();
        cfg.network.log_dir = dir.path().join("logs");
        cfg.network.router_address = "10.0.0.1".to_string();
        cfg.network.internet_address = "9.9.9.9".to_string();
        cfg.network.interval_ok = 60;
        cfg.network.interval_problem = 5;
        cfg.thresholds = Thresholds {
            latency_warn_ms: 100.0,
            loss_warn_percent: 5,
            loss_critical_percent: 20,
        };
        cfg
    }

    fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn statuses(report: &CycleReport) -> Vec<Status> {
        report.measurements.iter().map(|m| m.status).collect()
    }

    #[test]
    fn test_control_state_selection() {
        let net = NetworkConfig {
            interval_ok: 60,
            interval_problem: 5,
            ..NetworkConfig::default()
        };
        let steady = ControlState::from_statuses([Status::Ok, Status::Ok]);
        assert_eq!(steady, ControlState::Steady);
        assert_eq!(steady.sleep_duration(&net), Duration::from_secs(60));

        for other in [Status::WarnLatency, Status::WarnLoss, Status::Critical, Status::Down] {
            for pair in [[Status::Ok, other], [other, Status::Ok], [other, other]] {
                let state = ControlState::from_statuses(pair);
                assert_eq!(state, ControlState::Alert);
                assert_eq!(state.sleep_duration(&net), Duration::from_secs(5));
            }
        }
    }

    #[tokio::test]
    async fn test_cycle_probes_router_then_internet() {
        let tmp = TempDir::new().unwrap();
        let mut scheduler = Scheduler::new(
            config(&tmp),
            ScriptedProber::new(&[(0, 1.5), (0, 12.3)]),
        );

        let report = scheduler.run_cycle_at(at(9, 10, 0, 0)).await.unwrap();

        assert_eq!(
            *scheduler.prober.calls.lock().unwrap(),
            vec!["10.0.0.1".to_string(), "9.9.9.9".to_string()]
        );
        let targets: Vec<Target> = report.measurements.iter().map(|m| m.target).collect();
        assert_eq!(targets, vec![Target::Router, Target::Internet]);
        assert!(report.measurements.iter().all(|m| m.timestamp == at(9, 10, 0, 0)));
        assert_eq!(statuses(&report), vec![Status::Ok, Status::Ok]);
        assert_eq!(report.control_state(), ControlState::Steady);
    }

    #[tokio::test]
    async fn test_cycle_scenarios() {
        // (router outcome, internet outcome, expected internet status, expected state)
        let cases = [
            ((0, 1.0), (0, 12.3), Status::Ok, ControlState::Steady),
            ((0, 1.0), (7, 10.0), Status::WarnLoss, ControlState::Alert),
            ((0, 1.0), (0, 150.0), Status::WarnLatency, ControlState::Alert),
            ((0, 1.0), (100, 0.0), Status::Down, ControlState::Alert),
        ];

        for (router, internet, expected, state) in cases {
            let tmp = TempDir::new().unwrap();
            let cfg = config(&tmp);
            let mut scheduler =
                Scheduler::new(cfg.clone(), ScriptedProber::new(&[router, internet]));

            let report = scheduler.run_cycle_at(at(9, 10, 0, 0)).await.unwrap();
            assert_eq!(report.measurements[1].status, expected);
            assert_eq!(report.control_state(), state);

            let pause = report.control_state().sleep_duration(&cfg.network);
            let want = if expected == Status::Ok { 60 } else { 5 };
            assert_eq!(pause, Duration::from_secs(want));
        }
    }

    #[tokio::test]
    async fn test_cycles_share_daily_file_and_rotate() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        let mut scheduler = Scheduler::new(
            cfg.clone(),
            ScriptedProber::new(&[(0, 1.0), (0, 20.0), (0, 1.1), (100, 0.0), (0, 1.2), (0, 19.0)]),
        );

        scheduler.run_cycle_at(at(9, 23, 59, 0)).await.unwrap();
        scheduler.run_cycle_at(at(9, 23, 59, 55)).await.unwrap();
        scheduler.run_cycle_at(at(10, 0, 0, 50)).await.unwrap();

        let day1 = cfg.network.log_dir.join("network_log_2024-03-09.csv");
        let day2 = cfg.network.log_dir.join("network_log_2024-03-10.csv");

        let content = std::fs::read_to_string(&day1).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                HEADER,
                "2024-03-09 23:59:00;ROUTER;0;1.00;OK",
                "2024-03-09 23:59:00;INTERNET;0;20.00;OK",
                "2024-03-09 23:59:55;ROUTER;0;1.10;OK",
                "2024-03-09 23:59:55;INTERNET;100;0.00;DOWN",
            ]
        );

        let scan = read_log(&day2).unwrap();
        assert_eq!(scan.measurements.len(), 2);
        assert_eq!(std::fs::read_to_string(&day2).unwrap().matches(HEADER).count(), 1);
    }

    #[tokio::test]
    async fn test_failed_probes_are_logged_as_down() {
        let tmp = TempDir::new().unwrap();
        let mut scheduler = Scheduler::new(config(&tmp), ScriptedProber::new(&[]));

        let report = scheduler.run_cycle_at(at(9, 3, 0, 0)).await.unwrap();
        assert_eq!(statuses(&report), vec![Status::Down, Status::Down]);
        assert_eq!(report.control_state(), ControlState::Alert);
    }

    #[tokio::test]
    async fn test_log_failure_stops_cycle() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp);
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        cfg.network.log_dir = blocker;

        let mut scheduler = Scheduler::new(cfg, ScriptedProber::new(&[(0, 1.0), (0, 1.0)]));
        assert!(scheduler.run_cycle_at(at(9, 3, 0, 0)).await.is_err());
    }

    #[tokio::test]
    async fn test_stop_before_first_cycle() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        let log_dir = cfg.network.log_dir.clone();
        let mut scheduler = Scheduler::new(cfg, ScriptedProber::new(&[(0, 1.0), (0, 1.0)]));

        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();
        scheduler.run(rx).await.unwrap();

        assert!(scheduler.prober.calls.lock().unwrap().is_empty());
        assert!(!log_dir.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_sleep() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp);
        cfg.network.interval_ok = 3600;
        let mut scheduler = Scheduler::new(cfg, ScriptedProber::new(&[(0, 1.0), (0, 1.0)]));

        let (tx, rx) = broadcast::channel(1);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(()).unwrap();
        });

        scheduler.run(rx).await.unwrap();
        stopper.await.unwrap();

        // One cycle ran; the hour-long sleep was cut short.
        assert_eq!(scheduler.prober.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_adapts_between_cycles() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        // Cycle 1 degraded (5 s sleep), cycle 2 healthy (60 s sleep).
        let mut scheduler = Scheduler::new(
            cfg,
            ScriptedProber::new(&[(0, 1.0), (30, 5.0), (0, 1.0), (0, 5.0)]),
        );

        let (tx, rx) = broadcast::channel(1);
        let stopper = tokio::spawn(async move {
            // After cycle 2 starts (t=5) and before cycle 3 (t=65).
            tokio::time::sleep(Duration::from_secs(30)).await;
            tx.send(()).unwrap();
        });

        scheduler.run(rx).await.unwrap();
        stopper.await.unwrap();

        assert_eq!(scheduler.prober.calls.lock().unwrap().len(), 4);
    }
}
