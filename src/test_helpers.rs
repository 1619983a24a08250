//! Test utilities for creating, growing, rotating and truncating log files.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct TempLogFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TempLogFile {
    /// Create a new temporary log file for testing
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("test.log");

        File::create(&path)?;

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Create a temporary log file with one initial line
    pub fn with_content(content: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append_content(content)?;
        Ok(temp_file)
    }

    /// Append a terminated line
    pub fn append_content(&self, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;

        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(())
    }

    /// Append bytes verbatim, without adding a terminator
    pub fn append_raw(&self, content: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(content)?;
        file.flush()?;
        Ok(())
    }

    /// Truncate the file in place, keeping its identity
    pub fn truncate(&self) -> std::io::Result<()> {
        OpenOptions::new().write(true).open(&self.path)?.set_len(0)?;
        Ok(())
    }

    /// Move the file aside to `<name>.1` and create a fresh, empty file at the path
    pub fn rotate(&self) -> std::io::Result<PathBuf> {
        let rotated = self.path.with_extension("log.1");
        std::fs::rename(&self.path, &rotated)?;
        File::create(&self.path)?;
        Ok(rotated)
    }

    /// Get the path to the temporary file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the file, for sibling scratch files
    pub fn dir(&self) -> &Path {
        self._temp_dir.path()
    }

    /// A position file path next to the log that does not exist yet
    pub fn position_path(&self) -> PathBuf {
        self.dir().join("test.log.pos")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_log_file_creation() {
        let temp_file = TempLogFile::new().unwrap();
        assert!(temp_file.path().exists());
        assert!(!temp_file.position_path().exists());
    }

    #[test]
    fn test_append_content_and_raw() {
        let temp_file = TempLogFile::with_content("line 1").unwrap();
        temp_file.append_raw(b"partial").unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "line 1\npartial");
    }

    #[test]
    fn test_truncate() {
        let temp_file = TempLogFile::with_content("initial content").unwrap();
        temp_file.truncate().unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_rotate() {
        let temp_file = TempLogFile::with_content("before rotation").unwrap();
        let rotated = temp_file.rotate().unwrap();

        assert_eq!(
            std::fs::read_to_string(&rotated).unwrap(),
            "before rotation\n"
        );
        assert!(std::fs::read_to_string(temp_file.path()).unwrap().is_empty());
    }
}
