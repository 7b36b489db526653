//! # JUnit-style test task
//!
//! Suites are YAML files of shell commands (see [`suite`]). The task runs
//! them either in the build process or in a forked test runner that talks to
//! the build through the `anthill_test_protocol` files and exit code.
//! Results go through a fan-out of [`formatter::ResultFormatter`]s.

pub mod child;
pub mod formatter;
pub mod formatters;
pub mod forked;
pub mod result;
pub mod runner;
pub mod suite;
pub mod task;
pub mod test;
pub mod watchdog;

pub use child::run_forked;
pub use formatter::{FormatterFanout, FormatterRegistry, ResultFormatter};
pub use forked::{ForkOptions, ForkTarget, ForkedTestRunner};
pub use result::{SuiteReport, TestCounts, TestResultHolder};
pub use suite::{CaseOutcome, CaseRun, FileSuiteLoader, SuiteLoader, TestSuite};
pub use task::JUnitTask;
pub use test::{FormatterElement, JUnitTest};
