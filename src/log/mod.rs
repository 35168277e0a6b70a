//! Measurement log module.
//!
//! One semicolon-delimited file per calendar day, written by a single process
//! and read by any number of others without locking. Readers rely on each row
//! being appended with a single write, so a row is observed whole or not at all.

mod models;
mod reader;
mod writer;

pub use models::*;
pub use reader::*;
pub use writer::*;

use std::path::PathBuf;
use thiserror::Error;

/// Log error types.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("failed to create log directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write log file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
