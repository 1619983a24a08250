//! Optional change notification used to cut backoff sleeps short.

use crate::error::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Watches the directory holding the followed file.
///
/// The directory is watched rather than the file so that a rotated-in
/// replacement still produces events.
pub(crate) struct ChangeNotifier {
    _watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
    file_name: OsString,
}

impl ChangeNotifier {
    pub(crate) fn new(path: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        let watch_path = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        watcher.watch(watch_path, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            file_name: path.file_name().map(OsStr::to_os_string).unwrap_or_default(),
        })
    }

    /// Sleep for `timeout`, or less if an event touches the followed file.
    ///
    /// Waking discards everything already queued, so a burst of writes cuts
    /// short one backoff rather than several.
    pub(crate) async fn wait(&mut self, timeout: Duration) {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return,
                event = self.receiver.recv() => match event {
                    Some(Ok(event)) if is_event_relevant_to_file(&event, &self.file_name) => {
                        while self.receiver.try_recv().is_ok() {}
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => debug!(error = %e, "ignoring watcher error"),
                    None => {
                        // Watcher is gone; plain polling from here on
                        (&mut deadline).await;
                        return;
                    }
                },
            }
        }
    }
}

/// Check if a notify event is relevant to a specific file
pub(crate) fn is_event_relevant_to_file(event: &Event, target_file_name: &OsStr) -> bool {
    event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(target_file_name))
}
