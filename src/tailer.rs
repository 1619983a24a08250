//! The tailing session: a pull-driven polling state machine over one file.
//!
//! Each call scans buffered bytes for the next record, refills from the file
//! when the buffer runs dry, and after enough empty reads re-examines the
//! path for rotation or truncation. The read position is persisted after
//! every emitted record and every rotation event, except under a
//! [`TailStream`], which persists only what its consumer has received.

use crate::error::{Error, Result};
use crate::identity::{self, FileIdentity, Rotation};
use crate::options::TailOptions;
use crate::position::{PositionStore, TailPosition};
use crate::record::Record;
use crate::scanner::{Fill, LineScanner, Scan};
use crate::stream::TailStream;
use crate::watcher::ChangeNotifier;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tracing::{debug, error, info, warn};

/// Where a session is in its poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    /// Opened, nothing read yet.
    Ready,
    Scanning,
    /// Backing off after finding no new bytes.
    Waiting,
    RotationCheck,
    Closed,
    Failed,
}

/// Outcome of a non-blocking poll.
#[derive(Debug)]
pub enum Next {
    Record(Record),
    /// No record is available yet; the engine suggests waiting this long
    /// before polling again.
    Waiting(Duration),
}

enum Step {
    Record(Record),
    Continue,
    Wait(Duration),
}

/// When the read position is written to the position file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Commit {
    /// As soon as a record is returned, and after every rotation event.
    OnEmit,
    /// Only through [`Tailer::commit`], once the consumer holds the record.
    OnDelivery,
}

/// Follows one file, resuming from and persisting to an optional position file.
///
/// A session is single-consumer: drive it from one task at a time. Running
/// two sessions against the same position file is not supported.
pub struct Tailer {
    path: PathBuf,
    options: TailOptions,
    file: Option<File>,
    store: PositionStore,
    /// Read cursor.
    position: TailPosition,
    /// What the position file holds.
    committed: TailPosition,
    commit: Commit,
    scanner: LineScanner,
    empty_reads: u32,
    state: TailState,
    failure: Option<String>,
    notifier: Option<ChangeNotifier>,
}

impl Tailer {
    /// Open a session on `path`.
    ///
    /// The stored position is reused only if it describes the same file and
    /// the file has not shrunk since; otherwise reading starts at offset 0
    /// (or at the end, with `resume_from_end` on a fresh position file).
    ///
    /// Fails if the file does not exist or the position file is unreadable
    /// or corrupt.
    pub async fn open(
        path: impl AsRef<Path>,
        position_path: Option<&Path>,
        options: TailOptions,
    ) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();

        let (store, stored, fresh) = PositionStore::open(position_path).await?;

        let open_error = |source| Error::OpenTarget {
            path: path.clone(),
            source,
        };
        let mut file = File::open(&path).await.map_err(open_error)?;
        let (identity, size) = identity::stat(&file).await.map_err(open_error)?;

        let offset = if options.resume_from_end && fresh {
            size
        } else {
            resume_offset(&stored, identity, size)
        };

        let mut scanner = LineScanner::new(options.buffer_size, options.delimiter, offset);
        scanner.seek(&mut file, offset).await.map_err(open_error)?;

        let notifier = if options.watch_changes {
            match ChangeNotifier::new(&path) {
                Ok(notifier) => Some(notifier),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "change notification unavailable; polling only");
                    None
                }
            }
        } else {
            None
        };

        let position = TailPosition {
            identity,
            offset,
            size,
        };
        let mut tailer = Self {
            path,
            options,
            file: Some(file),
            store,
            position,
            committed: position,
            commit: Commit::OnEmit,
            scanner,
            empty_reads: 0,
            state: TailState::Ready,
            failure: None,
            notifier,
        };
        tailer.persist().await?;

        info!(
            path = %tailer.path.display(),
            offset,
            size,
            fresh,
            "opened log for tailing"
        );
        Ok(tailer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The position as last persisted.
    pub fn position(&self) -> TailPosition {
        self.committed
    }

    /// Position just past the last record returned.
    pub(crate) fn read_position(&self) -> TailPosition {
        self.position
    }

    pub(crate) fn set_commit(&mut self, commit: Commit) {
        self.commit = commit;
    }

    /// Persist `delivered` as the position to resume from.
    pub(crate) async fn commit(&mut self, delivered: TailPosition) -> Result<()> {
        if self.state == TailState::Closed {
            return Err(Error::Closed);
        }
        self.committed = delivered;
        self.persist().await
    }

    pub fn state(&self) -> TailState {
        self.state
    }

    /// Poll for the next record without sleeping.
    pub async fn try_next(&mut self) -> Result<Next> {
        loop {
            match self.step().await? {
                Step::Record(record) => return Ok(Next::Record(record)),
                Step::Wait(backoff) => {
                    self.state = TailState::Waiting;
                    return Ok(Next::Waiting(backoff));
                }
                Step::Continue => {}
            }
        }
    }

    /// Wait until the next record is available.
    ///
    /// Missing files and quiet periods are retried indefinitely; only
    /// structural failures are returned.
    pub async fn next_record(&mut self) -> Result<Record> {
        loop {
            match self.try_next().await? {
                Next::Record(record) => return Ok(record),
                Next::Waiting(backoff) => self.wait(backoff).await,
            }
        }
    }

    /// Sleep for `backoff`, waking early on a change notification if enabled.
    pub async fn wait(&mut self, backoff: Duration) {
        match self.notifier.as_mut() {
            Some(notifier) => notifier.wait(backoff).await,
            None => tokio::time::sleep(backoff).await,
        }
    }

    /// Persist the final position and release both file handles.
    ///
    /// Every later call fails with [`Error::Closed`].
    pub async fn close(&mut self) -> Result<()> {
        if self.state == TailState::Closed {
            return Ok(());
        }
        let result = if self.state == TailState::Failed {
            Ok(())
        } else {
            self.persist().await
        };

        self.file = None;
        self.store.release();
        self.notifier = None;
        self.state = TailState::Closed;

        debug!(path = %self.path.display(), offset = self.committed.offset, "closed tailer");
        result
    }

    /// Move the session onto a background task that yields records as a stream.
    pub fn into_stream(self) -> TailStream {
        TailStream::new(self)
    }

    async fn step(&mut self) -> Result<Step> {
        match self.state {
            TailState::Closed => return Err(Error::Closed),
            TailState::Failed => {
                return Err(Error::Failed {
                    path: self.path.clone(),
                    offset: self.committed.offset,
                    reason: self.failure.clone().unwrap_or_default(),
                });
            }
            _ => {}
        }

        match self.advance().await {
            Ok(step) => Ok(step),
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    offset = self.position.offset,
                    error = %e,
                    "tailing failed"
                );
                self.state = TailState::Failed;
                self.failure = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn advance(&mut self) -> Result<Step> {
        self.state = TailState::Scanning;

        if let Scan::Found(record) = self.scanner.next() {
            self.empty_reads = 0;
            return self.emit(record).await;
        }

        let read_offset = self.scanner.read_offset();
        let file = self.file.as_mut().ok_or(Error::Closed)?;
        let fill = self
            .scanner
            .fill(file)
            .await
            .map_err(|source| Error::Read {
                path: self.path.clone(),
                offset: read_offset,
                source,
            })?;
        if let Fill::Loaded(_) = fill {
            self.empty_reads = 0;
            return Ok(Step::Continue);
        }

        if let Some(quiescence) = self.options.quiescence {
            if let Some(record) = self.scanner.flush_stalled(quiescence) {
                warn!(
                    path = %self.path.display(),
                    offset = record.offset(),
                    len = record.as_bytes().len(),
                    "emitting unterminated trailing line after quiescence"
                );
                return self.emit(record).await;
            }
        }

        self.empty_reads += 1;
        if self.empty_reads < self.options.rotation_check_after {
            return Ok(Step::Wait(self.options.poll_interval));
        }
        self.empty_reads = 0;
        self.check_rotation().await
    }

    async fn check_rotation(&mut self) -> Result<Step> {
        self.state = TailState::RotationCheck;

        let read_offset = self.scanner.read_offset();
        let known_size = self.position.size.max(read_offset);
        let rotation = identity::classify(&self.path, self.position.identity, known_size)
            .await
            .map_err(|source| Error::Read {
                path: self.path.clone(),
                offset: self.position.offset,
                source,
            })?;

        match rotation {
            Rotation::NotYetAvailable => {
                debug!(path = %self.path.display(), "log file missing; waiting for it to reappear");
                Ok(Step::Wait(self.options.missing_file_backoff))
            }
            Rotation::Unchanged => Ok(Step::Wait(self.options.rotation_backoff)),
            Rotation::Grew { size } => {
                debug!(path = %self.path.display(), size, "log file grew");
                self.position.size = size;
                let offset = self.position.offset;
                self.reseek(offset).await?;
                self.checkpoint().await?;
                Ok(Step::Continue)
            }
            Rotation::Truncated { size } => {
                info!(
                    path = %self.path.display(),
                    previous_size = known_size,
                    size,
                    "log file truncated; reading from the start"
                );
                self.reseek(0).await?;
                self.position.offset = 0;
                self.position.size = size;
                self.checkpoint().await?;
                Ok(Step::Continue)
            }
            Rotation::Rotated {
                identity,
                size,
                file,
            } => self.rotate(identity, size, file).await,
        }
    }

    /// Switch to the file now at the path, once the old one is drained.
    async fn rotate(&mut self, new_identity: FileIdentity, size: u64, file: File) -> Result<Step> {
        let read_offset = self.scanner.read_offset();
        let old = self.file.as_ref().ok_or(Error::Closed)?;
        let (_, old_size) = identity::stat(old).await.map_err(|source| Error::Read {
            path: self.path.clone(),
            offset: read_offset,
            source,
        })?;
        if old_size > read_offset {
            debug!(
                path = %self.path.display(),
                unread = old_size - read_offset,
                "draining rotated file before switching"
            );
            return Ok(Step::Continue);
        }

        // The old file will never finish its last line
        if let Some(record) = self.scanner.take_pending() {
            warn!(
                path = %self.path.display(),
                offset = record.offset(),
                "emitting unterminated last line of rotated file"
            );
            self.empty_reads = self.options.rotation_check_after - 1;
            return self.emit(record).await;
        }

        info!(
            path = %self.path.display(),
            consumed = self.position.offset,
            size,
            "log file rotated; following replacement"
        );
        self.file = Some(file);
        self.scanner.reset(0);
        self.position = TailPosition {
            identity: new_identity,
            offset: 0,
            size,
        };
        self.checkpoint().await?;
        Ok(Step::Continue)
    }

    async fn emit(&mut self, record: Record) -> Result<Step> {
        self.position.offset = self.scanner.consumed_offset();
        self.position.size = self.position.size.max(self.scanner.read_offset());
        self.checkpoint().await?;
        Ok(Step::Record(record))
    }

    /// Make the read cursor durable unless commits wait for delivery.
    async fn checkpoint(&mut self) -> Result<()> {
        if self.commit == Commit::OnDelivery {
            return Ok(());
        }
        self.committed = self.position;
        self.persist().await
    }

    async fn reseek(&mut self, offset: u64) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::Closed)?;
        self.scanner
            .seek(file, offset)
            .await
            .map_err(|source| Error::Read {
                path: self.path.clone(),
                offset,
                source,
            })
    }

    async fn persist(&mut self) -> Result<()> {
        self.store
            .save(&self.committed)
            .await
            .map_err(|source| Error::Persist {
                path: self.store.path().unwrap_or(&self.path).to_path_buf(),
                offset: self.committed.offset,
                source,
            })
    }
}

/// Offset to resume from given the stored position and the file found at open.
fn resume_offset(stored: &TailPosition, identity: FileIdentity, size: u64) -> u64 {
    if stored.identity == identity && size >= stored.size {
        stored.offset.min(size)
    } else {
        0
    }
}
