//! Error types for the log tailer library.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for log tailer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File watching errors from the notify crate.
    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// UTF-8 decoding errors when converting a record to a string.
    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Session options that cannot be honored.
    #[error("Invalid options: {message}")]
    InvalidOptions { message: String },

    /// The followed file could not be opened when the session was created.
    #[error("Cannot open {path}: {source}")]
    OpenTarget {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The position file could not be opened or read.
    #[error("Position file {path}: {source}")]
    PositionFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The position file exists but does not hold a valid record.
    #[error("Corrupt position file {path} (delete or fix it to recover): {source}")]
    CorruptPosition {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or inspecting the followed file failed mid-stream.
    #[error("Read error on {path} at offset {offset}: {source}")]
    Read {
        path: PathBuf,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// Writing the position file failed mid-stream.
    #[error("Cannot persist position {offset} for {path}: {source}")]
    Persist {
        path: PathBuf,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// The session failed earlier and no longer produces records.
    #[error("Session for {path} failed at offset {offset}: {reason}")]
    Failed {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    /// The session has been closed.
    #[error("Session closed")]
    Closed,
}

/// A convenient Result type for log tailer operations.
pub type Result<T> = std::result::Result<T, Error>;
