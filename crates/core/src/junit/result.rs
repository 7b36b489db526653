use std::collections::BTreeMap;
use std::time::Duration;

use anthill_test_protocol::ExitCode;

/// Test counts of one suite run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestCounts {
    pub runs: u64,
    pub failures: u64,
    pub errors: u64,
}

impl TestCounts {
    /// Errors take precedence over failures.
    pub fn exit_code(&self) -> ExitCode {
        if self.errors > 0 {
            ExitCode::Errors
        } else if self.failures > 0 {
            ExitCode::Failures
        } else {
            ExitCode::Success
        }
    }
}

/// Suite information handed to result formatters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    pub name: String,
    pub properties: BTreeMap<String, String>,
    pub counts: TestCounts,
    pub run_time: Duration,
}

impl SuiteReport {
    pub fn new(name: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            properties,
            counts: TestCounts::default(),
            run_time: Duration::ZERO,
        }
    }
}

/// Outcome of one test execution as the task sees it.
///
/// Starts out as [`ExitCode::Errors`] so that a run that never reported
/// back counts as broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestResultHolder {
    pub exit_code: ExitCode,
    pub timed_out: bool,
    pub crashed: bool,
}

impl Default for TestResultHolder {
    fn default() -> Self {
        Self {
            exit_code: ExitCode::Errors,
            timed_out: false,
            crashed: false,
        }
    }
}

impl TestResultHolder {
    pub fn from_exit_code(exit_code: ExitCode) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    /// A timeout or crash; always counts as both an error and a failure
    pub fn is_fatal(&self) -> bool {
        self.timed_out || self.crashed
    }

    pub fn error_occurred(&self) -> bool {
        self.exit_code == ExitCode::Errors || self.is_fatal()
    }

    pub fn failure_occurred(&self) -> bool {
        self.exit_code != ExitCode::Success || self.is_fatal()
    }

    /// ` (timeout)` / ` (crashed)` suffixes for log and error messages
    pub fn fatal_suffix(&self) -> String {
        let mut suffix = String::new();
        if self.timed_out {
            suffix.push_str(" (timeout)");
        }
        if self.crashed {
            suffix.push_str(" (crashed)");
        }
        suffix
    }
}
