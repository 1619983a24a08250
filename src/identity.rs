//! File identity and rotation detection.
//!
//! A path can be occupied by different files over time. The identity tells
//! "same file, grew" apart from "another file now lives here".

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::io;
use std::path::Path;
use tokio::fs::File;

/// Opaque identifier of the storage object behind a path.
///
/// Only ever compared for equality. On Unix this is the inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileIdentity(u64);

impl FileIdentity {
    /// Identity of the file described by `metadata`.
    #[cfg(unix)]
    pub fn of(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self(metadata.ino())
    }

    /// Identity of the file described by `metadata`.
    ///
    /// Without inodes the creation time stands in; a replacement file created
    /// by a rotation tool gets a new one.
    #[cfg(not(unix))]
    pub fn of(metadata: &Metadata) -> Self {
        let nanos = metadata
            .created()
            .ok()
            .and_then(|created| created.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default();
        Self(nanos)
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identity and current size of an open handle.
pub(crate) async fn stat(file: &File) -> io::Result<(FileIdentity, u64)> {
    let metadata = file.metadata().await?;
    Ok((FileIdentity::of(&metadata), metadata.len()))
}

/// How the file at a path relates to what a session last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Change {
    Unchanged,
    Grew { size: u64 },
    Truncated { size: u64 },
    Rotated { identity: FileIdentity, size: u64 },
}

/// Compare a fresh stat against the last known one.
///
/// Identity wins over size: a same-identity same-size file is unchanged even
/// if its bytes were rewritten in place.
pub(crate) fn compare(
    known_identity: FileIdentity,
    known_size: u64,
    identity: FileIdentity,
    size: u64,
) -> Change {
    if identity != known_identity {
        Change::Rotated { identity, size }
    } else if size < known_size {
        Change::Truncated { size }
    } else if size > known_size {
        Change::Grew { size }
    } else {
        Change::Unchanged
    }
}

/// Outcome of re-examining the followed path.
#[derive(Debug)]
pub(crate) enum Rotation {
    /// Nothing at the path right now.
    NotYetAvailable,
    Unchanged,
    Grew { size: u64 },
    Truncated { size: u64 },
    /// A different file occupies the path; `file` is already open on it.
    Rotated {
        identity: FileIdentity,
        size: u64,
        file: File,
    },
}

/// Open `path` independently of any session handle and classify it.
///
/// A path that vanished between open and stat counts as not yet available.
pub(crate) async fn classify(
    path: &Path,
    known_identity: FileIdentity,
    known_size: u64,
) -> io::Result<Rotation> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Rotation::NotYetAvailable),
        Err(e) => return Err(e),
    };
    let (identity, size) = match stat(&file).await {
        Ok(stat) => stat,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Rotation::NotYetAvailable),
        Err(e) => return Err(e),
    };

    Ok(match compare(known_identity, known_size, identity, size) {
        Change::Unchanged => Rotation::Unchanged,
        Change::Grew { size } => Rotation::Grew { size },
        Change::Truncated { size } => Rotation::Truncated { size },
        Change::Rotated { identity, size } => Rotation::Rotated {
            identity,
            size,
            file,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TempLogFile;

    #[test]
    fn test_compare_same_identity() {
        let id = FileIdentity::from_raw(7);
        assert_eq!(compare(id, 100, id, 100), Change::Unchanged);
        assert_eq!(compare(id, 100, id, 150), Change::Grew { size: 150 });
        assert_eq!(compare(id, 100, id, 40), Change::Truncated { size: 40 });
        assert_eq!(compare(id, 0, id, 0), Change::Unchanged);
    }

    #[test]
    fn test_compare_identity_takes_precedence() {
        let old = FileIdentity::from_raw(7);
        let new = FileIdentity::from_raw(8);

        // Size is irrelevant once the identity differs
        assert_eq!(
            compare(old, 100, new, 100),
            Change::Rotated {
                identity: new,
                size: 100
            }
        );
        assert_eq!(
            compare(old, 100, new, 0),
            Change::Rotated {
                identity: new,
                size: 0
            }
        );
    }

    #[test]
    fn test_identity_serializes_as_plain_integer() {
        let json = serde_json::to_string(&FileIdentity::from_raw(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[tokio::test]
    async fn test_classify_missing_path() {
        let temp = TempLogFile::new().unwrap();
        let missing = temp.dir().join("missing.log");

        let rotation = classify(&missing, FileIdentity::default(), 0).await.unwrap();
        assert!(matches!(rotation, Rotation::NotYetAvailable));
    }

    #[tokio::test]
    async fn test_classify_growth_and_truncation() {
        let temp = TempLogFile::with_content("first line").unwrap();
        let file = File::open(temp.path()).await.unwrap();
        let (identity, size) = stat(&file).await.unwrap();

        let rotation = classify(temp.path(), identity, size).await.unwrap();
        assert!(matches!(rotation, Rotation::Unchanged));

        temp.append_content("second line").unwrap();
        let rotation = classify(temp.path(), identity, size).await.unwrap();
        assert!(matches!(rotation, Rotation::Grew { size: grown } if grown > size));

        temp.truncate().unwrap();
        let rotation = classify(temp.path(), identity, size).await.unwrap();
        assert!(matches!(rotation, Rotation::Truncated { size: 0 }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_classify_rotation() {
        let temp = TempLogFile::with_content("old file").unwrap();
        let file = File::open(temp.path()).await.unwrap();
        let (identity, size) = stat(&file).await.unwrap();

        temp.rotate().unwrap();
        temp.append_content("new file").unwrap();

        match classify(temp.path(), identity, size).await.unwrap() {
            Rotation::Rotated {
                identity: new_identity,
                size: new_size,
                file,
            } => {
                assert_ne!(new_identity, identity);
                assert_eq!(new_size, "new file\n".len() as u64);
                let (opened_identity, _) = stat(&file).await.unwrap();
                assert_eq!(opened_identity, new_identity);
            }
            other => panic!("Expected rotation, got {:?}", other),
        }
    }
}
