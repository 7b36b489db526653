//! The tests file of a batched run: one `name,outputDir,outputFileBase` line per test.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ProtocolError, ProtocolResult};

/// One test of a batch together with where its formatter output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub test_name: String,
    pub output_dir: PathBuf,
    pub output_base: String,
}

impl BatchEntry {
    pub fn new(
        test_name: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        output_base: impl Into<String>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            output_dir: output_dir.into(),
            output_base: output_base.into(),
        }
    }

    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{}",
            self.test_name,
            self.output_dir.display(),
            self.output_base
        )
    }

    /// Parse one line; `line_number` is only used for the error message.
    pub fn parse_line(line: &str, line_number: usize) -> ProtocolResult<Self> {
        let malformed = || ProtocolError::MalformedBatchLine {
            line: line_number,
            content: line.to_string(),
        };
        let mut parts = line.splitn(3, ',');
        let test_name = parts.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
        let output_dir = parts.next().ok_or_else(malformed)?;
        let output_base = parts.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
        Ok(Self::new(test_name, output_dir, output_base))
    }

    /// The file a formatter with the given extension writes for this test.
    #[must_use]
    pub fn output_file(&self, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}{}", self.output_base, extension))
    }
}

pub fn write_batch_file(path: &Path, entries: &[BatchEntry]) -> ProtocolResult<()> {
    let mut content = String::new();
    for entry in entries {
        content.push_str(&entry.to_line());
        content.push('\n');
    }
    fs::write(path, content).map_err(|e| ProtocolError::io(path, e))
}

/// Read a tests file; blank lines are skipped.
pub fn read_batch_file(path: &Path) -> ProtocolResult<Vec<BatchEntry>> {
    let content = fs::read_to_string(path).map_err(|e| ProtocolError::io(path, e))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| BatchEntry::parse_line(line.trim_end(), index + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_file_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tests.txt");
        let entries = vec![
            BatchEntry::new("suites.alpha", "reports", "TEST-suites.alpha"),
            BatchEntry::new("suites.beta", "reports/beta", "TEST-suites.beta"),
        ];

        write_batch_file(&path, &entries).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "suites.alpha,reports,TEST-suites.alpha\nsuites.beta,reports/beta,TEST-suites.beta\n"
        );
        assert_eq!(read_batch_file(&path).unwrap(), entries);
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tests.txt");
        fs::write(&path, "a,dir,TEST-a\n\nb-only\n").unwrap();

        match read_batch_file(&path) {
            Err(ProtocolError::MalformedBatchLine { line, content }) => {
                assert_eq!(line, 3);
                assert_eq!(content, "b-only");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_output_file() {
        let entry = BatchEntry::new("a", "reports", "TEST-a");
        assert_eq!(entry.output_file(".xml"), PathBuf::from("reports/TEST-a.xml"));
    }
}
