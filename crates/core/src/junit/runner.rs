//! Runs one suite through a formatter fan-out
//!
//! Shared by the in-process mode of the junit task and by the forked test
//! runner. The caller decides where console output ends up.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Instant;

use anthill_test_protocol::constants::TESTLISTENER_PREFIX;
use anthill_test_protocol::{ExitCode, ForkArgs};

use crate::junit::formatter::FormatterFanout;
use crate::junit::result::{SuiteReport, TestCounts};
use crate::junit::suite::{CaseOutcome, TestSuite};
use crate::types::BuildResult;

/// Frames of the runner itself, dropped from failure traces
const TRACE_FILTERS: [&str; 5] = [
    "anthill_core::junit::",
    "anthill_test_protocol::",
    "std::rt::lang_start",
    "std::panicking::",
    "core::ops::function::FnOnce::call_once",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    pub halt_on_error: bool,
    pub halt_on_failure: bool,
    pub filter_trace: bool,
    pub show_output: bool,
    pub output_to_formatters: bool,
    pub log_test_listener_events: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            halt_on_error: false,
            halt_on_failure: false,
            filter_trace: true,
            show_output: false,
            output_to_formatters: true,
            log_test_listener_events: false,
        }
    }
}

impl From<&ForkArgs> for RunnerOptions {
    fn from(args: &ForkArgs) -> Self {
        Self {
            halt_on_error: args.halt_on_error,
            halt_on_failure: args.halt_on_failure,
            filter_trace: args.filter_trace,
            show_output: args.show_output,
            output_to_formatters: args.output_to_formatters,
            log_test_listener_events: args.log_test_listener_events,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteResult {
    pub exit_code: ExitCode,
    pub counts: TestCounts,
    /// Text for the console: case output when shown, listener events when logged
    pub console: String,
}

pub struct SuiteRunner<'a> {
    options: RunnerOptions,
    properties: &'a BTreeMap<String, String>,
}

impl<'a> SuiteRunner<'a> {
    pub fn new(options: RunnerOptions, properties: &'a BTreeMap<String, String>) -> Self {
        Self {
            options,
            properties,
        }
    }

    /// Run every case of `suite`.
    ///
    /// `on_test_start` is invoked before anything else hears about a case;
    /// the forked runner records crash progress there.
    pub fn run(
        &self,
        suite: &dyn TestSuite,
        fanout: &mut FormatterFanout,
        on_test_start: &mut dyn FnMut(&str) -> BuildResult<()>,
    ) -> BuildResult<SuiteResult> {
        let started = Instant::now();
        let mut report = SuiteReport::new(suite.name(), self.properties.clone());
        let mut console = String::new();
        let mut stdout = String::new();
        let mut stderr = String::new();

        fanout.start_test_suite(&report)?;

        for case in suite.case_names() {
            on_test_start(&case)?;
            self.listener_event(&mut console, &format!("startTest({})", case));
            fanout.start_test(&case)?;

            let run = suite.run_case(&case);
            report.counts.runs += 1;
            stdout.push_str(&run.stdout);
            stderr.push_str(&run.stderr);
            if self.options.show_output {
                console.push_str(&run.stdout);
                console.push_str(&run.stderr);
            }

            let halt = match &run.outcome {
                CaseOutcome::Passed => false,
                CaseOutcome::Failed(message) => {
                    report.counts.failures += 1;
                    self.listener_event(&mut console, &format!("addFailure({})", case));
                    fanout.add_failure(&case, &self.filter(message))?;
                    self.options.halt_on_failure
                }
                CaseOutcome::Error(message) => {
                    report.counts.errors += 1;
                    self.listener_event(&mut console, &format!("addError({})", case));
                    fanout.add_error(Some(&case), &self.filter(message))?;
                    self.options.halt_on_error
                }
            };

            fanout.end_test(&case, run.duration)?;
            self.listener_event(&mut console, &format!("endTest({})", case));
            if halt {
                break;
            }
        }

        report.run_time = started.elapsed();
        if self.options.output_to_formatters {
            fanout.set_system_output(&stdout)?;
            fanout.set_system_error(&stderr)?;
        }
        fanout.end_test_suite(&report)?;

        Ok(SuiteResult {
            exit_code: report.counts.exit_code(),
            counts: report.counts,
            console,
        })
    }

    /// Report a suite that could not even be loaded as one erroring run
    pub fn report_load_error(
        &self,
        name: &str,
        message: &str,
        fanout: &mut FormatterFanout,
    ) -> BuildResult<SuiteResult> {
        let mut report = SuiteReport::new(name, self.properties.clone());
        fanout.start_test_suite(&report)?;
        fanout.add_error(None, message)?;
        report.counts = TestCounts {
            runs: 1,
            failures: 0,
            errors: 1,
        };
        fanout.end_test_suite(&report)?;
        Ok(SuiteResult {
            exit_code: ExitCode::Errors,
            counts: report.counts,
            console: String::new(),
        })
    }

    fn listener_event(&self, console: &mut String, event: &str) {
        if self.options.log_test_listener_events {
            // Writing to a String cannot fail
            let _ = writeln!(console, "{}{}", TESTLISTENER_PREFIX, event);
        }
    }

    fn filter(&self, message: &str) -> String {
        if self.options.filter_trace {
            filter_stack(message)
        } else {
            message.to_string()
        }
    }
}

/// Drop trace lines that point into the test runner itself
pub fn filter_stack(trace: &str) -> String {
    let mut lines = trace.lines();
    let mut filtered: Vec<&str> = lines.next().into_iter().collect();
    filtered.extend(lines.filter(|line| !TRACE_FILTERS.iter().any(|f| line.contains(f))));
    filtered.join("\n")
}
