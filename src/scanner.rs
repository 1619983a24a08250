//! Buffered line scanning over an open file handle.

use crate::record::Record;
use std::io::{self, SeekFrom};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Result of asking the scanner for the next record.
#[derive(Debug)]
pub(crate) enum Scan {
    Found(Record),
    /// No terminator in the loaded bytes; refill and ask again.
    NeedMoreData,
}

/// Result of refilling the buffer from the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fill {
    Loaded(usize),
    /// The read returned no bytes.
    Stalled,
}

/// Splits the bytes of a growing file into delimiter-terminated records.
///
/// The buffer window `[start, filled)` holds loaded bytes not yet emitted.
/// `buf[0]` sits at file offset `load_offset`, so the handle's cursor is
/// always at `load_offset + filled`. Lines longer than the buffer grow it
/// instead of being clipped.
#[derive(Debug)]
pub(crate) struct LineScanner {
    buf: Vec<u8>,
    capacity: usize,
    delimiter: u8,
    start: usize,
    filled: usize,
    /// Bytes in `[start, scanned)` are known to hold no delimiter.
    scanned: usize,
    load_offset: u64,
    /// Offset of the last empty read and when reads at it first came up empty.
    stall: Option<(u64, Instant)>,
}

impl LineScanner {
    pub(crate) fn new(capacity: usize, delimiter: u8, offset: u64) -> Self {
        Self {
            buf: vec![0; capacity],
            capacity,
            delimiter,
            start: 0,
            filled: 0,
            scanned: 0,
            load_offset: offset,
            stall: None,
        }
    }

    /// Bytes before this offset have been emitted.
    pub(crate) fn consumed_offset(&self) -> u64 {
        self.load_offset + self.start as u64
    }

    /// Offset the next refill reads from.
    pub(crate) fn read_offset(&self) -> u64 {
        self.load_offset + self.filled as u64
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.start < self.filled
    }

    pub(crate) fn next(&mut self) -> Scan {
        let window = &self.buf[self.scanned..self.filled];
        match window.iter().position(|&b| b == self.delimiter) {
            Some(i) => {
                let end = self.scanned + i;
                let record = Record::new(
                    self.buf[self.start..end].to_vec(),
                    self.consumed_offset(),
                    true,
                );
                self.start = end + 1;
                self.scanned = self.start;
                Scan::Found(record)
            }
            None => {
                self.scanned = self.filled;
                Scan::NeedMoreData
            }
        }
    }

    /// Load more bytes from `file`, which must be positioned at `read_offset()`.
    pub(crate) async fn fill(&mut self, file: &mut File) -> io::Result<Fill> {
        self.compact();
        if self.filled == self.buf.len() {
            let grown = self.buf.len().saturating_mul(2).max(1);
            self.buf.resize(grown, 0);
        }

        let read_at = self.read_offset();
        let n = file.read(&mut self.buf[self.filled..]).await?;
        if n == 0 {
            match self.stall {
                Some((offset, _)) if offset == read_at => {}
                _ => self.stall = Some((read_at, Instant::now())),
            }
            return Ok(Fill::Stalled);
        }

        self.filled += n;
        self.stall = None;
        Ok(Fill::Loaded(n))
    }

    /// Emit the pending unterminated bytes once reads have come up empty at
    /// the same offset for at least `quiescence`.
    ///
    /// If the writer later completes the line, its remainder becomes a
    /// separate record.
    pub(crate) fn flush_stalled(&mut self, quiescence: Duration) -> Option<Record> {
        let (_, since) = self.stall?;
        if since.elapsed() < quiescence {
            return None;
        }
        self.take_pending()
    }

    /// Emit whatever unterminated bytes are buffered.
    pub(crate) fn take_pending(&mut self) -> Option<Record> {
        if !self.has_pending() {
            return None;
        }
        let record = Record::new(
            self.buf[self.start..self.filled].to_vec(),
            self.consumed_offset(),
            false,
        );
        self.start = self.filled;
        self.scanned = self.filled;
        self.stall = None;
        Some(record)
    }

    /// Reposition `file` and discard everything buffered.
    pub(crate) async fn seek(&mut self, file: &mut File, offset: u64) -> io::Result<()> {
        file.seek(SeekFrom::Start(offset)).await?;
        self.reset(offset);
        Ok(())
    }

    /// Discard everything buffered; the next refill reads at `offset`.
    pub(crate) fn reset(&mut self, offset: u64) {
        self.start = 0;
        self.filled = 0;
        self.scanned = 0;
        self.load_offset = offset;
        self.stall = None;
        self.shrink();
    }

    fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        self.buf.copy_within(self.start..self.filled, 0);
        self.filled -= self.start;
        self.scanned -= self.start;
        self.load_offset += self.start as u64;
        self.start = 0;
        if self.filled == 0 {
            self.shrink();
        }
    }

    /// Return to the configured capacity after a long line.
    fn shrink(&mut self) {
        if self.buf.len() > self.capacity {
            self.buf.truncate(self.capacity);
            self.buf.shrink_to_fit();
        }
    }
}
