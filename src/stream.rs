//! Stream adapter that drives a tailer on a background task.

use crate::error::Result;
use crate::position::TailPosition;
use crate::record::Record;
use crate::tailer::{Commit, Next, Tailer};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

/// A stream of records from a file, in the order they were appended.
///
/// Records are handed over one at a time, so the background task reads at
/// most one record ahead of the consumer. A fatal error is the last item.
///
/// The position file only advances past records this stream has yielded; a
/// record read ahead but never polled is read again by the next session.
pub struct TailStream {
    receiver: mpsc::Receiver<Result<(Record, TailPosition)>>,
    delivered: watch::Sender<Option<TailPosition>>,
    _shutdown_tx: broadcast::Sender<()>,
    _task_handle: JoinHandle<()>,
}

impl TailStream {
    pub(crate) fn new(mut tailer: Tailer) -> Self {
        tailer.set_commit(Commit::OnDelivery);
        let (tx, rx) = mpsc::channel(1);
        let (delivered_tx, delivered_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task_handle = tokio::spawn(tail_task(tailer, tx, delivered_rx, shutdown_rx));

        TailStream {
            receiver: rx,
            delivered: delivered_tx,
            _shutdown_tx: shutdown_tx,
            _task_handle: task_handle,
        }
    }

    /// Check if the stream has been closed/dropped
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}

impl Drop for TailStream {
    fn drop(&mut self) {
        // Send shutdown signal - ignore errors if the task already exited
        let _ = self._shutdown_tx.send(());
    }
}

/// Background task that pulls records and forwards them.
///
/// Shutdown is only observed while backing off, never between reading a
/// record and handing it over. Positions come back through `delivered` once
/// the consumer has taken the record and are persisted from here.
async fn tail_task(
    mut tailer: Tailer,
    tx: mpsc::Sender<Result<(Record, TailPosition)>>,
    mut delivered: watch::Receiver<Option<TailPosition>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        if let Err(e) = commit_delivered(&mut tailer, &mut delivered).await {
            let _ = tx.send(Err(e)).await;
            break;
        }
        match tailer.try_next().await {
            Ok(Next::Record(record)) => {
                let position = tailer.read_position();
                if tx.send(Ok((record, position))).await.is_err() {
                    break;
                }
            }
            Ok(Next::Waiting(backoff)) => {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    Ok(()) = delivered.changed() => {}
                    _ = tailer.wait(backoff) => {}
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }

    if let Err(e) = commit_delivered(&mut tailer, &mut delivered).await {
        warn!(path = %tailer.path().display(), error = %e, "failed to persist delivered position");
    }
    if let Err(e) = tailer.close().await {
        warn!(path = %tailer.path().display(), error = %e, "failed to close tailer");
    }
}

/// Persist the position of the last record the consumer received, if it moved.
async fn commit_delivered(
    tailer: &mut Tailer,
    delivered: &mut watch::Receiver<Option<TailPosition>>,
) -> Result<()> {
    let latest = *delivered.borrow_and_update();
    match latest {
        Some(position) if position != tailer.position() => tailer.commit(position).await,
        _ => Ok(()),
    }
}

impl Stream for TailStream {
    type Item = Result<Record>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let item = ready!(self.receiver.poll_recv(cx));
        Poll::Ready(item.map(|result| {
            result.map(|(record, position)| {
                self.delivered.send_replace(Some(position));
                record
            })
        }))
    }
}
