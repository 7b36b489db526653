//! The crash sentinel file.
//!
//! A forked runner that dies abruptly cannot report what it was doing, so it
//! keeps a one-line file up to date instead: the parent seeds it with
//! [`BEFORE_FIRST_TEST`], the child overwrites it with the name of every test
//! case right before the case starts, and with [`TERMINATED_SUCCESSFULLY`]
//! right before it exits on its own. Whatever the parent finds in the file
//! after the child is gone is the last known state.

use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{BEFORE_FIRST_TEST, TERMINATED_SUCCESSFULLY};
use crate::error::{ProtocolError, ProtocolResult};

/// What the parent found in the crash file after the child exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrashState {
    /// The child wrote the clean-exit sentinel.
    TerminatedSuccessfully,
    /// The last recorded progress marker: a test case name, or
    /// [`BEFORE_FIRST_TEST`] when no test ever started.
    LastTest(String),
    /// The file does not exist anymore (or never did).
    Missing,
}

impl CrashState {
    #[must_use]
    pub fn is_clean_exit(&self) -> bool {
        matches!(self, Self::TerminatedSuccessfully)
    }
}

/// Handle on a crash file shared by the parent and the child.
#[derive(Debug, Clone)]
pub struct CrashFile {
    path: PathBuf,
}

impl CrashFile {
    /// Attach to an existing path without touching its content.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Attach to `path` and seed it with [`BEFORE_FIRST_TEST`].
    pub fn create(path: impl Into<PathBuf>) -> ProtocolResult<Self> {
        let file = Self::open(path);
        file.write(BEFORE_FIRST_TEST)?;
        Ok(file)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record that `test_case` is about to start.
    pub fn register_test_case(&self, test_case: &str) -> ProtocolResult<()> {
        self.write(test_case)
    }

    /// Record a clean exit. Must be the last write before the process exits.
    pub fn register_clean_exit(&self) -> ProtocolResult<()> {
        self.write(TERMINATED_SUCCESSFULLY)
    }

    /// Read the last recorded state.
    pub fn read_state(&self) -> ProtocolResult<CrashState> {
        if !self.path.exists() {
            return Ok(CrashState::Missing);
        }
        let content =
            fs::read_to_string(&self.path).map_err(|e| ProtocolError::io(&self.path, e))?;
        let first_line = content.lines().next().unwrap_or_default().trim_end();
        if first_line == TERMINATED_SUCCESSFULLY {
            Ok(CrashState::TerminatedSuccessfully)
        } else {
            Ok(CrashState::LastTest(first_line.to_string()))
        }
    }

    /// Sibling file every write goes through before it is renamed into place
    #[must_use]
    pub fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }

    /// Remove a staging file left behind by a child killed mid-write.
    pub fn remove_staging(&self) -> ProtocolResult<()> {
        let staging = self.staging_path();
        match fs::remove_file(&staging) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProtocolError::io(&staging, e)),
        }
    }

    // Write a sibling file and rename it over the target so a reader never
    // observes a half-written line.
    fn write(&self, line: &str) -> ProtocolResult<()> {
        let staging = self.staging_path();
        fs::write(&staging, format!("{}\n", line)).map_err(|e| ProtocolError::io(&staging, e))?;
        fs::rename(&staging, &self.path).map_err(|e| ProtocolError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vmwatcher.properties");

        let parent = CrashFile::create(&path).unwrap();
        assert_eq!(
            parent.read_state().unwrap(),
            CrashState::LastTest(BEFORE_FIRST_TEST.to_string())
        );

        let child = CrashFile::open(&path);
        child.register_test_case("compiles_cleanly").unwrap();
        assert_eq!(
            parent.read_state().unwrap(),
            CrashState::LastTest("compiles_cleanly".to_string())
        );

        child.register_clean_exit().unwrap();
        assert!(parent.read_state().unwrap().is_clean_exit());
        assert!(!dir.path().join("vmwatcher.properties.tmp").exists());
    }

    #[test]
    fn test_remove_interrupted_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = CrashFile::create(dir.path().join("vmwatcher.properties")).unwrap();
        file.remove_staging().unwrap();

        fs::write(file.staging_path(), "half").unwrap();
        file.remove_staging().unwrap();
        assert!(!file.staging_path().exists());
        assert!(file.path().exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = CrashFile::open(dir.path().join("gone"));
        assert_eq!(file.read_state().unwrap(), CrashState::Missing);
    }
}
