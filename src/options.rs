//! Per-session configuration.

use crate::error::{Error, Result};
use std::time::Duration;

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_ROTATION_BACKOFF: Duration = Duration::from_millis(100);
const DEFAULT_MISSING_FILE_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_QUIESCENCE: Duration = Duration::from_secs(2);
const DEFAULT_ROTATION_CHECK_AFTER: u32 = 3;

/// Options controlling a single tailing session.
///
/// Every session gets its own copy; nothing here is shared between sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailOptions {
    /// When the position file is created by this session (or none is
    /// configured), start at the end of the file instead of the beginning.
    pub resume_from_end: bool,
    /// Initial scanner buffer capacity. Longer lines grow the buffer.
    pub buffer_size: usize,
    /// Record terminator.
    pub delimiter: u8,
    /// Sleep after a read that produced no new bytes.
    pub poll_interval: Duration,
    /// Consecutive empty reads before the path is checked for rotation.
    pub rotation_check_after: u32,
    /// Sleep after a rotation check found nothing new.
    pub rotation_backoff: Duration,
    /// Sleep while the followed path does not exist.
    pub missing_file_backoff: Duration,
    /// How long a trailing unterminated line may sit without new bytes
    /// before it is emitted as a record. `None` never flushes it.
    ///
    /// The flush is best effort: if the writer later finishes the line, the
    /// rest of it arrives as a separate record.
    pub quiescence: Option<Duration>,
    /// Wake up early from backoff on filesystem change notifications.
    pub watch_changes: bool,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            resume_from_end: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            delimiter: b'\n',
            poll_interval: DEFAULT_POLL_INTERVAL,
            rotation_check_after: DEFAULT_ROTATION_CHECK_AFTER,
            rotation_backoff: DEFAULT_ROTATION_BACKOFF,
            missing_file_backoff: DEFAULT_MISSING_FILE_BACKOFF,
            quiescence: Some(DEFAULT_QUIESCENCE),
            watch_changes: false,
        }
    }
}

impl TailOptions {
    pub fn with_resume_from_end(mut self, resume_from_end: bool) -> Self {
        self.resume_from_end = resume_from_end;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_rotation_check_after(mut self, empty_reads: u32) -> Self {
        self.rotation_check_after = empty_reads;
        self
    }

    pub fn with_rotation_backoff(mut self, backoff: Duration) -> Self {
        self.rotation_backoff = backoff;
        self
    }

    pub fn with_missing_file_backoff(mut self, backoff: Duration) -> Self {
        self.missing_file_backoff = backoff;
        self
    }

    pub fn with_quiescence(mut self, quiescence: Option<Duration>) -> Self {
        self.quiescence = quiescence;
        self
    }

    pub fn with_watch_changes(mut self, watch_changes: bool) -> Self {
        self.watch_changes = watch_changes;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::InvalidOptions {
                message: "buffer_size must be at least 1".to_string(),
            });
        }
        if self.rotation_check_after == 0 {
            return Err(Error::InvalidOptions {
                message: "rotation_check_after must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
