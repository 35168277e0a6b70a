//! Tolerant readers over the measurement logs.
//!
//! Readers never hold a file open between refreshes and never fail on a bad
//! row: malformed numeric fields are defaulted, rows that cannot be attributed
//! to a target or status are skipped and counted.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::models::{Measurement, Status, Target, DELIMITER, TIMESTAMP_FORMAT};
use super::LogError;

/// Rows read from one log file.
#[derive(Debug, Default)]
pub struct LogScan {
    pub measurements: Vec<Measurement>,
    /// Data rows that could not be parsed.
    pub skipped: usize,
}

/// Per-target tail of a log file.
#[derive(Debug, Default)]
pub struct History {
    entries: HashMap<Target, Vec<Measurement>>,
}

impl History {
    /// Keep the last `max_entries` rows of each target, oldest first.
    pub fn from_measurements(measurements: Vec<Measurement>, max_entries: usize) -> Self {
        let mut entries: HashMap<Target, Vec<Measurement>> = HashMap::new();
        for m in measurements {
            entries.entry(m.target).or_default().push(m);
        }
        for rows in entries.values_mut() {
            if rows.len() > max_entries {
                rows.drain(..rows.len() - max_entries);
            }
        }
        Self { entries }
    }

    pub fn for_target(&self, target: Target) -> &[Measurement] {
        self.entries.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn latest(&self, target: Target) -> Option<&Measurement> {
        self.for_target(target).last()
    }
}

/// Parse one data row.
///
/// Loss accepts a decimal value (comma or dot) and is truncated; unparseable
/// loss reads as 0 and unparseable latency as 0.0. Returns `None` for rows
/// without a valid timestamp, target or status.
pub fn parse_row(line: &str) -> Option<Measurement> {
    let fields: Vec<&str> = line.split(DELIMITER).map(str::trim).collect();
    if fields.len() < 5 {
        return None;
    }

    let timestamp = NaiveDateTime::parse_from_str(fields[0], TIMESTAMP_FORMAT).ok()?;
    let target = fields[1].parse::<Target>().ok()?;
    let status = fields[4].parse::<Status>().ok()?;

    let packet_loss_percent = parse_decimal(fields[2])
        .filter(|v| *v >= 0.0)
        .map(|v| v.min(100.0) as u32)
        .unwrap_or(0);
    let avg_latency_ms = parse_decimal(fields[3])
        .filter(|v| *v >= 0.0)
        .unwrap_or(0.0);

    Some(Measurement {
        timestamp,
        target,
        packet_loss_percent,
        avg_latency_ms,
        status,
    })
}

fn parse_decimal(field: &str) -> Option<f64> {
    field
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn is_header(line: &str) -> bool {
    line.trim_start().starts_with("Timestamp")
}

/// Read every row of a log file.
///
/// A file that does not exist reads as empty.
pub fn read_log(path: &Path) -> Result<LogScan, LogError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LogScan::default()),
        Err(source) => {
            return Err(LogError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let content = String::from_utf8_lossy(&bytes);
    let mut scan = LogScan::default();
    for line in content.lines() {
        if line.trim().is_empty() || is_header(line) {
            continue;
        }
        match parse_row(line) {
            Some(m) => scan.measurements.push(m),
            None => {
                tracing::debug!("Skipping malformed row in {}: {:?}", path.display(), line);
                scan.skipped += 1;
            }
        }
    }
    Ok(scan)
}

/// Read the last `max_entries` rows per target of a log file.
pub fn read_history(path: &Path, max_entries: usize) -> Result<History, LogError> {
    let scan = read_log(path)?;
    Ok(History::from_measurements(scan.measurements, max_entries))
}

/// Whether `name` follows the `{prefix}_*.csv` naming of daily logs.
pub fn is_log_file_name(name: &str, prefix: &str) -> bool {
    name.len() >= prefix.len() + 5
        && name.starts_with(prefix)
        && name[prefix.len()..].starts_with('_')
        && name.ends_with(".csv")
}

/// All daily logs in `dir`, sorted by file name. A missing directory has none.
pub fn list_log_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, LogError> {
    let mut files: Vec<PathBuf> = log_entries(dir, prefix)?
        .into_iter()
        .map(|(path, _)| path)
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// The live log: the most recently modified daily log in `dir`.
pub fn find_latest_log(dir: &Path, prefix: &str) -> Result<Option<PathBuf>, LogError> {
    let latest = log_entries(dir, prefix)?
        .into_iter()
        .max_by(|(a_path, a_time), (b_path, b_time)| {
            a_time
                .cmp(b_time)
                .then_with(|| a_path.file_name().cmp(&b_path.file_name()))
        })
        .map(|(path, _)| path);
    Ok(latest)
}

fn log_entries(dir: &Path, prefix: &str) -> Result<Vec<(PathBuf, SystemTime)>, LogError> {
    let read_err = |source| LogError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(read_err(e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(read_err)?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_log_file_name(name, prefix) {
            continue;
        }
        // The file may have rolled away between listing and stat.
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((entry.path(), modified));
    }
    Ok(files)
}
