//! Command-line encoding of a forked test run.
//!
//! The parent turns a [`ForkArgs`] into a list of tokens with
//! [`ForkArgs::to_args`]; the child rebuilds it with [`ForkArgs::parse`].
//! Every flag is a single `key=value` token so that the argument list
//! survives any shell or launcher in between unchanged.

use std::path::{Path, PathBuf};

use crate::constants::{
    to_boolean, CRASHFILE, FILTERTRACE, FORMATTER, HALT_ON_ERROR, HALT_ON_FAILURE,
    LOG_FAILED_TESTS, LOG_TEST_LISTENER_EVENTS, OUTPUT_TO_FORMATTERS, PROPSFILE, SHOWOUTPUT,
    TESTSFILE,
};
use crate::error::{ProtocolError, ProtocolResult};

/// What the child process should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestTarget {
    /// A single test suite, identified by name.
    Single(String),
    /// A file listing several suites, one [`crate::BatchEntry`] per line.
    Batch(PathBuf),
}

/// A result formatter requested on the command line: `kind[,output]`.
///
/// Without an output path the formatter writes to the child's standard output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterSpec {
    pub kind: String,
    pub output: Option<PathBuf>,
}

impl FormatterSpec {
    pub fn new(kind: impl Into<String>, output: Option<PathBuf>) -> Self {
        Self {
            kind: kind.into(),
            output,
        }
    }

    /// Parse the part of a `formatter=` token after the prefix.
    pub fn parse(spec: &str) -> ProtocolResult<Self> {
        let (kind, output) = match spec.split_once(',') {
            Some((kind, output)) => (kind, Some(PathBuf::from(output))),
            None => (spec, None),
        };
        if kind.trim().is_empty() {
            return Err(ProtocolError::MalformedFormatter(spec.to_string()));
        }
        Ok(Self::new(kind.trim(), output))
    }

    fn to_token(&self) -> String {
        match &self.output {
            Some(output) => format!("{}{},{}", FORMATTER, self.kind, output.display()),
            None => format!("{}{}", FORMATTER, self.kind),
        }
    }
}

/// Everything the child needs to know about the run it has been asked to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkArgs {
    pub target: TestTarget,
    pub halt_on_error: bool,
    pub halt_on_failure: bool,
    pub filter_trace: bool,
    pub show_output: bool,
    pub output_to_formatters: bool,
    pub log_failed_tests: bool,
    pub log_test_listener_events: bool,
    pub formatters: Vec<FormatterSpec>,
    pub crash_file: Option<PathBuf>,
    pub props_file: Option<PathBuf>,
}

impl ForkArgs {
    /// Arguments with the protocol defaults for every flag.
    pub fn new(
        target: TestTarget,
        crash_file: impl Into<PathBuf>,
        props_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            crash_file: Some(crash_file.into()),
            props_file: Some(props_file.into()),
            ..Self::for_target(target)
        }
    }

    fn for_target(target: TestTarget) -> Self {
        Self {
            target,
            halt_on_error: false,
            halt_on_failure: false,
            filter_trace: true,
            show_output: false,
            output_to_formatters: true,
            log_failed_tests: true,
            log_test_listener_events: false,
            formatters: Vec::new(),
            crash_file: None,
            props_file: None,
        }
    }

    /// Whether more than one test runs in this process.
    #[must_use]
    pub fn is_batch(&self) -> bool {
        matches!(self.target, TestTarget::Batch(_))
    }

    /// Encode as command-line tokens, test name first.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(10 + self.formatters.len());
        args.push(match &self.target {
            TestTarget::Single(name) => name.clone(),
            TestTarget::Batch(path) => format!("{}{}", TESTSFILE, path.display()),
        });
        args.push(format!("{}{}", FILTERTRACE, self.filter_trace));
        args.push(format!("{}{}", HALT_ON_ERROR, self.halt_on_error));
        args.push(format!("{}{}", HALT_ON_FAILURE, self.halt_on_failure));
        args.push(format!("{}{}", SHOWOUTPUT, self.show_output));
        args.push(format!("{}{}", OUTPUT_TO_FORMATTERS, self.output_to_formatters));
        args.push(format!("{}{}", LOG_FAILED_TESTS, self.log_failed_tests));
        args.push(format!(
            "{}{}",
            LOG_TEST_LISTENER_EVENTS, self.log_test_listener_events
        ));
        args.extend(self.formatters.iter().map(FormatterSpec::to_token));
        if let Some(crash_file) = &self.crash_file {
            args.push(format!("{}{}", CRASHFILE, crash_file.display()));
        }
        if let Some(props_file) = &self.props_file {
            args.push(format!("{}{}", PROPSFILE, props_file.display()));
        }
        args
    }

    /// Decode the tokens produced by [`ForkArgs::to_args`].
    ///
    /// Tokens with an unknown prefix are ignored so that a newer parent can
    /// talk to an older child.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> ProtocolResult<Self> {
        let first = args.first().ok_or(ProtocolError::MissingTestName)?.as_ref();
        let target = match first.strip_prefix(TESTSFILE) {
            Some(path) => TestTarget::Batch(PathBuf::from(path)),
            None if first.is_empty() => return Err(ProtocolError::MissingTestName),
            None => TestTarget::Single(first.to_string()),
        };

        let mut parsed = Self::for_target(target);
        for arg in &args[1..] {
            let arg = arg.as_ref();
            if let Some(value) = arg.strip_prefix(HALT_ON_ERROR) {
                parsed.halt_on_error = to_boolean(value);
            } else if let Some(value) = arg.strip_prefix(HALT_ON_FAILURE) {
                parsed.halt_on_failure = to_boolean(value);
            } else if let Some(value) = arg.strip_prefix(FILTERTRACE) {
                parsed.filter_trace = to_boolean(value);
            } else if let Some(value) = arg.strip_prefix(CRASHFILE) {
                parsed.crash_file = Some(PathBuf::from(value));
            } else if let Some(value) = arg.strip_prefix(PROPSFILE) {
                parsed.props_file = Some(PathBuf::from(value));
            } else if let Some(value) = arg.strip_prefix(SHOWOUTPUT) {
                parsed.show_output = to_boolean(value);
            } else if let Some(value) = arg.strip_prefix(OUTPUT_TO_FORMATTERS) {
                parsed.output_to_formatters = to_boolean(value);
            } else if let Some(value) = arg.strip_prefix(LOG_FAILED_TESTS) {
                parsed.log_failed_tests = to_boolean(value);
            } else if let Some(value) = arg.strip_prefix(LOG_TEST_LISTENER_EVENTS) {
                parsed.log_test_listener_events = to_boolean(value);
            } else if let Some(value) = arg.strip_prefix(FORMATTER) {
                parsed.formatters.push(FormatterSpec::parse(value)?);
            } else {
                tracing::debug!(argument = arg, "ignoring unknown test runner argument");
            }
        }
        Ok(parsed)
    }

    /// The batch file, when running in batch mode.
    #[must_use]
    pub fn batch_file(&self) -> Option<&Path> {
        match &self.target {
            TestTarget::Batch(path) => Some(path),
            TestTarget::Single(_) => None,
        }
    }
}
