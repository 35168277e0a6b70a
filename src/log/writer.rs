//! Append-only writer for the daily measurement logs.

use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::models::{Measurement, HEADER};
use super::LogError;

/// Writer for the daily-rotated measurement logs.
#[derive(Debug, Clone)]
pub struct LogWriter {
    dir: PathBuf,
    prefix: String,
}

impl LogWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// File name of the log for the given day, e.g. `network_log_2024-03-09.csv`.
    pub fn file_name(&self, date: NaiveDate) -> String {
        log_file_name(&self.prefix, date)
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(self.file_name(date))
    }

    /// Resolve the log for `date`, creating the directory and the headered file
    /// if they do not exist yet.
    pub fn prepare(&self, date: NaiveDate) -> Result<PathBuf, LogError> {
        fs::create_dir_all(&self.dir).map_err(|source| LogError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(date);
        if ensure_header(&path)? {
            tracing::info!("Created log file {}", path.display());
        }
        Ok(path)
    }

    /// Append one measurement row to `path`.
    pub fn append(&self, path: &Path, measurement: &Measurement) -> Result<(), LogError> {
        ensure_header(path)?;

        let mut line = measurement.to_row();
        line.push('\n');

        let write_err = |source| LogError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(write_err)?;
        // One write call per row; readers never see half a line.
        file.write_all(line.as_bytes()).map_err(write_err)?;

        Ok(())
    }
}

/// File name of the log for `date` under `prefix`.
pub fn log_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", prefix, date.format("%Y-%m-%d"))
}

/// Write the header row if `path` does not exist yet.
///
/// Returns true when the file was created by this call. An existing file is
/// left untouched, whatever its first line is.
pub fn ensure_header(path: &Path) -> Result<bool, LogError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(format!("{}\n", HEADER).as_bytes())
                .map_err(|source| LogError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(source) => Err(LogError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}
