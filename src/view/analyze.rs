//! Historical summary over every daily log.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::log::{
    list_log_files, read_log, LogError, LogScan, Measurement, Status, TIMESTAMP_FORMAT,
};

/// Status counts and problem window accumulated across log files.
#[derive(Debug, Default)]
pub struct Summary {
    pub dir: PathBuf,
    pub files_scanned: usize,
    /// Files that matched the naming but could not be read.
    pub files_skipped: usize,
    pub rows_skipped: usize,
    pub counts: BTreeMap<Status, u64>,
    /// First non-OK row in file-name order.
    pub first_problem: Option<NaiveDateTime>,
    /// Last non-OK row in file-name order.
    pub last_problem: Option<NaiveDateTime>,
}

impl Summary {
    fn record(&mut self, m: &Measurement) {
        *self.counts.entry(m.status).or_default() += 1;
        if !m.status.is_ok() {
            if self.first_problem.is_none() {
                self.first_problem = Some(m.timestamp);
            }
            self.last_problem = Some(m.timestamp);
        }
    }

    /// Fold one file's read result into the summary. An unreadable file is
    /// counted and skipped.
    fn absorb(&mut self, path: &Path, result: Result<LogScan, LogError>) {
        let scan = match result {
            Ok(scan) => scan,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                self.files_skipped += 1;
                return;
            }
        };
        tracing::debug!(
            "Scanned {}: {} rows, {} skipped",
            path.display(),
            scan.measurements.len(),
            scan.skipped
        );
        self.files_scanned += 1;
        self.rows_skipped += scan.skipped;
        for m in &scan.measurements {
            self.record(m);
        }
    }

    pub fn count(&self, status: Status) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Scan every `{prefix}_*.csv` file in `dir`, in file-name order.
pub fn summarize(dir: &Path, prefix: &str) -> Result<Summary, LogError> {
    let mut summary = Summary {
        dir: dir.to_path_buf(),
        ..Default::default()
    };

    for path in list_log_files(dir, prefix)? {
        let result = read_log(&path);
        summary.absorb(&path, result);
    }

    Ok(summary)
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.files_scanned == 0 && self.files_skipped == 0 {
            return writeln!(f, "No log files found in {}.", self.dir.display());
        }

        writeln!(
            f,
            "Status summary ({} rows in {} files):",
            self.total(),
            self.files_scanned
        )?;
        for status in Status::ALL {
            let count = self.count(status);
            if count > 0 {
                writeln!(f, "  {:13}: {}", status, count)?;
            }
        }
        if self.rows_skipped > 0 {
            writeln!(f, "  {:13}: {}", "malformed", self.rows_skipped)?;
        }
        if self.files_skipped > 0 {
            writeln!(f, "Skipped {} unreadable file(s).", self.files_skipped)?;
        }

        writeln!(f)?;
        match (self.first_problem, self.last_problem) {
            (Some(first), Some(last)) => {
                writeln!(f, "First recorded problem: {}", first.format(TIMESTAMP_FORMAT))?;
                writeln!(f, "Last recorded problem : {}", last.format(TIMESTAMP_FORMAT))
            }
            _ => writeln!(f, "No problems recorded (all OK)."),
        }
    }
}

/// Print the summary of all logs under `dir`.
pub fn run(dir: &Path, prefix: &str) -> Result<(), LogError> {
    let summary = summarize(dir, prefix)?;
    print!("{}", summary);
    Ok(())
}
