//! Persisted read position.
//!
//! The position file holds one JSON record `{"inode":..,"offset":..,"size":..}`
//! that is rewritten in place after every change.

use crate::error::{Error, Result};
use crate::identity::FileIdentity;
use serde::{Deserialize, Serialize};
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// How far a session has read into a file.
///
/// `offset` counts bytes already fully consumed and never exceeds `size`
/// except while a rotation resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TailPosition {
    #[serde(rename = "inode")]
    pub identity: FileIdentity,
    pub offset: u64,
    pub size: u64,
}

/// Owner of the position file handle for one session.
#[derive(Debug)]
pub(crate) struct PositionStore {
    path: Option<PathBuf>,
    file: Option<File>,
}

impl PositionStore {
    /// Open (or create) the position file and read the stored record.
    ///
    /// The returned flag is true when no earlier record existed: the file was
    /// just created or holds nothing but whitespace, or no path was configured.
    pub(crate) async fn open(path: Option<&Path>) -> Result<(Self, TailPosition, bool)> {
        let Some(path) = path else {
            return Ok((
                Self {
                    path: None,
                    file: None,
                },
                TailPosition::default(),
                true,
            ));
        };

        let position_error = |source| Error::PositionFile {
            path: path.to_path_buf(),
            source,
        };

        let (mut file, created) = match OpenOptions::new().read(true).write(true).open(path).await
        {
            Ok(file) => (file, false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(path)
                    .await
                    .map_err(position_error)?;
                (file, true)
            }
            Err(e) => return Err(position_error(e)),
        };

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .await
            .map_err(position_error)?;
        let position = decode(&contents).map_err(|source| Error::CorruptPosition {
            path: path.to_path_buf(),
            source,
        })?;

        Ok((
            Self {
                path: Some(path.to_path_buf()),
                file: Some(file),
            },
            position,
            created || is_blank(&contents),
        ))
    }

    /// Replace the stored record and force it to disk.
    ///
    /// Without a configured path (or after release) this does nothing.
    pub(crate) async fn save(&mut self, position: &TailPosition) -> io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };

        let encoded = encode(position)?;
        file.set_len(0).await?;
        file.seek(SeekFrom::Start(0)).await?;
        file.write_all(&encoded).await?;
        file.flush().await?;
        file.sync_all().await
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Drop the position file handle.
    pub(crate) fn release(&mut self) {
        self.file = None;
    }
}

fn is_blank(contents: &[u8]) -> bool {
    contents.iter().all(u8::is_ascii_whitespace)
}

/// An empty file decodes to the zero position.
fn decode(contents: &[u8]) -> std::result::Result<TailPosition, serde_json::Error> {
    if is_blank(contents) {
        return Ok(TailPosition::default());
    }
    serde_json::from_slice(contents)
}

fn encode(position: &TailPosition) -> io::Result<Vec<u8>> {
    let mut encoded = serde_json::to_vec(position)?;
    encoded.push(b'\n');
    Ok(encoded)
}
