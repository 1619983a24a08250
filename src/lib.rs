//! A crash-resumable, rotation-aware log file follower.
//!
//! A [`Tailer`] reads newline-delimited records appended to a growing file and
//! persists how far it got to a small position file, so a restarted process
//! continues where the previous one stopped. Rotation (a new file at the same
//! path), truncation and a temporarily missing file are handled by polling;
//! nothing is surfaced to the caller except real I/O failures.
//!
//! Delivery is at-least-once. A trailing line that never receives its
//! terminator is emitted after the configured quiescence window; if the
//! writer resumes that line later, its remainder arrives as a second record.
//! Check [`Record::is_terminated`] when such partial records matter.
//!
//! # Example
//!
//! ```rust,no_run
//! use log_tailer::{TailOptions, Tailer};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tailer = Tailer::open(
//!         "app.log",
//!         Some(Path::new("app.log.pos")),
//!         TailOptions::default(),
//!     )
//!     .await?;
//!
//!     loop {
//!         let record = tailer.next_record().await?;
//!         println!("{}", record.to_string_lossy());
//!     }
//! }
//! ```

mod error;
mod identity;
mod options;
mod position;
mod record;
mod scanner;
mod stream;
mod tailer;
mod watcher;

#[cfg(test)]
mod test_helpers;

// Public API exports
pub use error::{Error, Result};
pub use identity::FileIdentity;
pub use options::TailOptions;
pub use position::TailPosition;
pub use record::Record;
pub use stream::TailStream;
pub use tailer::{Next, TailState, Tailer};

use std::path::Path;

/// Opens a session on `path` and streams its records.
///
/// # Arguments
///
/// * `path` - File to follow; it must exist
/// * `position_path` - Where to persist the read position, or `None` to start over every time
/// * `options` - Session options
///
/// # Example
///
/// ```rust,no_run
/// use log_tailer::{follow, TailOptions};
/// use std::path::Path;
/// use tokio_stream::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut stream = follow("app.log", Some(Path::new("app.log.pos")), TailOptions::default()).await?;
///
///     while let Some(record) = stream.next().await {
///         println!("{}", record?.to_string_lossy());
///     }
///
///     Ok(())
/// }
/// ```
pub async fn follow(
    path: impl AsRef<Path>,
    position_path: Option<&Path>,
    options: TailOptions,
) -> Result<TailStream> {
    Ok(Tailer::open(path, position_path, options).await?.into_stream())
}
