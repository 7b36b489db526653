//! Token prefixes, sentinel values and exit codes of the fork protocol.
//!
//! The prefixes are matched with `starts_with` on the child side, so their
//! spelling (including case) is part of the wire format.

/// Prefix of the first argument when a batch of tests runs in one process.
pub const TESTSFILE: &str = "testsfile=";
pub const HALT_ON_ERROR: &str = "haltOnError=";
pub const HALT_ON_FAILURE: &str = "haltOnFailure=";
pub const FILTERTRACE: &str = "filtertrace=";
pub const CRASHFILE: &str = "crashfile=";
pub const PROPSFILE: &str = "propsfile=";
pub const SHOWOUTPUT: &str = "showoutput=";
pub const OUTPUT_TO_FORMATTERS: &str = "outputtoformatters=";
pub const LOG_FAILED_TESTS: &str = "logfailedtests=";
pub const LOG_TEST_LISTENER_EVENTS: &str = "logtestlistenerevents=";
pub const FORMATTER: &str = "formatter=";

/// Written to the crash file by the parent before the child is launched, and
/// by the child as soon as it has parsed its `crashfile=` argument.
pub const BEFORE_FIRST_TEST: &str = "BEFORE_FIRST_TEST";

/// Written to the crash file by the child right before a clean exit.
pub const TERMINATED_SUCCESSFULLY: &str = "terminated successfully";

/// Placeholder file name used for formatter outputs in batch mode. The child
/// only keeps the extension that follows it and derives the real file name
/// from the batch entry.
pub const IGNORED_FILE_NAME: &str = "IGNORETHIS";

/// Lines the child prints with this prefix are test listener events; the
/// parent logs them at verbose level instead of info.
pub const TESTLISTENER_PREFIX: &str = "junit.framework.TestListener: ";

/// Process exit code of a test run.
///
/// Errors take precedence over failures when both occurred; [`ExitCode::worst`]
/// implements that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExitCode {
    Success = 0,
    Failures = 1,
    Errors = 2,
}

impl ExitCode {
    /// Classify a raw process exit code.
    ///
    /// Anything that is not 0 or 1 (including a missing code after a signal)
    /// is treated as [`ExitCode::Errors`].
    #[must_use]
    pub const fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Success,
            Some(1) => Self::Failures,
            _ => Self::Errors,
        }
    }

    /// The numeric value passed to `std::process::exit`.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// The more severe of the two codes.
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Success => "SUCCESS",
            Self::Failures => "FAILURES",
            Self::Errors => "ERRORS",
        };
        write!(f, "{}", label)
    }
}

/// Parse a protocol boolean the way the build tool does: `true`, `on` and
/// `yes` (any case) are true, everything else is false.
#[must_use]
pub fn to_boolean(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "on" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_classification() {
        assert_eq!(ExitCode::from_code(Some(0)), ExitCode::Success);
        assert_eq!(ExitCode::from_code(Some(1)), ExitCode::Failures);
        assert_eq!(ExitCode::from_code(Some(2)), ExitCode::Errors);
        assert_eq!(ExitCode::from_code(Some(137)), ExitCode::Errors);
        assert_eq!(ExitCode::from_code(None), ExitCode::Errors);
    }

    #[test]
    fn test_errors_take_precedence() {
        assert_eq!(ExitCode::Failures.worst(ExitCode::Errors), ExitCode::Errors);
        assert_eq!(ExitCode::Errors.worst(ExitCode::Failures), ExitCode::Errors);
        assert_eq!(ExitCode::Success.worst(ExitCode::Failures), ExitCode::Failures);
    }

    #[test]
    fn test_to_boolean() {
        assert!(to_boolean("true"));
        assert!(to_boolean("Yes"));
        assert!(to_boolean("ON"));
        assert!(!to_boolean("false"));
        assert!(!to_boolean("1"));
        assert!(!to_boolean(""));
    }
}
