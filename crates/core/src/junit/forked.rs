//! Parent side of a forked test run
//!
//! Writes the crash, properties and batch files, launches the test runner
//! with the protocol arguments, enforces the timeout and turns whatever the
//! child left behind into a [`TestResultHolder`].

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use anthill_test_protocol::constants::TESTLISTENER_PREFIX;
use anthill_test_protocol::{
    write_batch_file, write_properties, BatchEntry, CrashFile, CrashState, ExitCode, ForkArgs,
    FormatterSpec, TestTarget,
};
use tempfile::TempPath;

use crate::events::MessageLevel;
use crate::junit::child::batch_placeholder_path;
use crate::junit::formatter::{fanout_for_test, FormatterRegistry};
use crate::junit::result::{SuiteReport, TestCounts, TestResultHolder};
use crate::junit::test::{FormatterElement, JUnitTest};
use crate::junit::watchdog::{wait_with_timeout, WaitOutcome};
use crate::task::TaskContext;
use crate::types::{BuildError, BuildResult};

pub const TIMEOUT_MESSAGE: &str = "Timeout occurred. Please note the time in the report does not reflect the time until the timeout.";
pub const CRASH_MESSAGE: &str = "Forked test process exited abnormally. Please note the time in the report does not reflect the time until the process exit.";

const PROPERTIES_COMMENT: &str = "anthill junit task generated properties file";

/// Process-level settings of the junit task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkOptions {
    /// Program and leading arguments of the test runner
    pub runner: Vec<String>,
    pub dir: PathBuf,
    pub tempdir: PathBuf,
    pub timeout: Option<Duration>,
    pub show_output: bool,
    pub output_to_formatters: bool,
    pub log_failed_tests: bool,
    pub log_test_listener_events: bool,
    pub print_summary: bool,
}

/// What one child process runs
#[derive(Debug, Clone, Copy)]
pub enum ForkTarget<'t> {
    Single(&'t JUnitTest),
    /// Tests sharing one process; they agree on every per-test flag.
    Batch(&'t [JUnitTest]),
}

pub struct ForkedTestRunner<'r> {
    options: &'r ForkOptions,
    formatters: &'r [FormatterElement],
    registry: &'r FormatterRegistry,
}

impl<'r> ForkedTestRunner<'r> {
    pub fn new(
        options: &'r ForkOptions,
        formatters: &'r [FormatterElement],
        registry: &'r FormatterRegistry,
    ) -> Self {
        Self {
            options,
            formatters,
            registry,
        }
    }

    pub fn execute(
        &self,
        target: ForkTarget<'_>,
        ctx: &mut TaskContext<'_>,
    ) -> BuildResult<TestResultHolder> {
        let (first, tests) = match target {
            ForkTarget::Single(test) => (test, std::slice::from_ref(test)),
            ForkTarget::Batch(tests) => match tests.first() {
                Some(first) => (first, tests),
                None => return Err(BuildError::Config("Empty test batch".to_string())),
            },
        };
        let is_batch = matches!(target, ForkTarget::Batch(_));
        let active: Vec<&FormatterElement> = self
            .formatters
            .iter()
            .filter(|f| f.is_active(ctx.properties()))
            .collect();
        let properties = ctx.properties().all();

        fs::create_dir_all(&self.options.tempdir)?;
        let crash_path = self.temp_path("anthillvmwatcher", ".properties")?;
        let crash_file = CrashFile::create(crash_path.to_path_buf())?;
        let props_path = self.temp_path("anthill", ".properties")?;
        write_properties(&props_path, &properties, Some(PROPERTIES_COMMENT))?;

        let mut batch_path = None;
        let test_target = if is_batch {
            let path = self.temp_path("anthill_junit", ".txt")?;
            let entries: Vec<BatchEntry> = tests
                .iter()
                .map(|t| BatchEntry::new(&t.name, &t.todir, t.output_base()))
                .collect();
            write_batch_file(&path, &entries)?;
            let target = TestTarget::Batch(path.to_path_buf());
            batch_path = Some(path);
            target
        } else {
            TestTarget::Single(first.name.clone())
        };

        let mut args = ForkArgs::new(test_target, crash_path.to_path_buf(), props_path.to_path_buf());
        args.halt_on_error = first.halt_on_error;
        args.halt_on_failure = first.halt_on_failure;
        args.filter_trace = first.filter_trace;
        args.show_output = self.options.show_output;
        args.output_to_formatters = self.options.output_to_formatters;
        args.log_failed_tests = self.options.log_failed_tests;
        args.log_test_listener_events = self.options.log_test_listener_events;
        args.formatters = active
            .iter()
            .map(|f| {
                let output = if is_batch {
                    f.use_file.then(|| batch_placeholder_path(&f.extension()))
                } else {
                    f.output_for(first)
                };
                FormatterSpec::new(&f.kind, output)
            })
            .collect();
        if self.options.print_summary {
            args.formatters.push(FormatterSpec::new("summary", None));
        }

        let outcome = self.spawn_and_wait(&args, ctx);
        let staging_removed = crash_file.remove_staging();
        let outcome = outcome?;
        staging_removed?;
        let mut result = TestResultHolder::from_exit_code(ExitCode::from_code(outcome.status.code()));

        let last_test = match crash_file.read_state()? {
            CrashState::TerminatedSuccessfully => None,
            CrashState::LastTest(name) => Some(name),
            CrashState::Missing => Some(format!(
                "Monitor file ({}) missing, location not writable, testcase not started or mixing versions?",
                crash_path.display()
            )),
        };

        if outcome.killed || last_test.is_some() {
            let message = if outcome.killed {
                result.timed_out = true;
                TIMEOUT_MESSAGE
            } else {
                result.crashed = true;
                CRASH_MESSAGE
            };
            let reported = if is_batch {
                first.batch_placeholder()
            } else {
                first.clone()
            };
            let case = last_test.unwrap_or_else(|| reported.name.clone());
            tracing::debug!(test = %reported.name, case = %case, "forked test run ended abnormally");
            self.report_abnormal_exit(ctx, &active, &reported, &case, message)?;
        }

        drop(batch_path);
        let props_display = props_path.display().to_string();
        props_path.close().map_err(|_| {
            BuildError::failure(format!(
                "Could not delete temporary properties file '{}'.",
                props_display
            ))
        })?;
        Ok(result)
    }

    fn temp_path(&self, prefix: &str, suffix: &str) -> BuildResult<TempPath> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&self.options.tempdir)?;
        Ok(file.into_temp_path())
    }

    fn spawn_and_wait(&self, args: &ForkArgs, ctx: &mut TaskContext<'_>) -> BuildResult<WaitOutcome> {
        let (program, leading) = self
            .options
            .runner
            .split_first()
            .ok_or_else(|| BuildError::Config("Empty test runner command".to_string()))?;
        let tokens = args.to_args();
        ctx.log(
            MessageLevel::Verbose,
            format!("Executing '{}' with arguments: {}", program, tokens.join(" ")),
        )?;

        let stdout = tempfile::tempfile_in(&self.options.tempdir)?;
        let stderr = tempfile::tempfile_in(&self.options.tempdir)?;
        let child = Command::new(program)
            .args(leading)
            .args(&tokens)
            .current_dir(&self.options.dir)
            .stdin(Stdio::null())
            .stdout(stdout.try_clone()?)
            .stderr(stderr.try_clone()?)
            .spawn()
            .map_err(|e| BuildError::failure(format!("Process fork failed.: {}", e)))?;

        let outcome = wait_with_timeout(child, self.options.timeout)?;
        tracing::debug!(status = ?outcome.status, killed = outcome.killed, "test runner exited");

        for line in read_back(stdout)?.lines() {
            let level = if line.starts_with(TESTLISTENER_PREFIX) {
                MessageLevel::Verbose
            } else {
                MessageLevel::Info
            };
            ctx.log(level, line)?;
        }
        for line in read_back(stderr)?.lines() {
            ctx.log(MessageLevel::Warn, line)?;
        }
        Ok(outcome)
    }

    // The child never got to report on `case`; write the report it owed us.
    fn report_abnormal_exit(
        &self,
        ctx: &mut TaskContext<'_>,
        active: &[&FormatterElement],
        test: &JUnitTest,
        case: &str,
        message: &str,
    ) -> BuildResult<()> {
        let (mut fanout, log_buffers) =
            fanout_for_test(self.registry, active, test, self.options.print_summary)?;
        let mut report = SuiteReport::new(&test.name, ctx.properties().all());

        fanout.start_test_suite(&report)?;
        fanout.start_test(case)?;
        fanout.add_error(Some(case), message)?;
        fanout.end_test(case, Duration::ZERO)?;
        report.counts = TestCounts {
            runs: 1,
            failures: 0,
            errors: 1,
        };
        fanout.end_test_suite(&report)?;
        drop(fanout);

        for buffer in log_buffers {
            for line in buffer.text().lines() {
                ctx.log(MessageLevel::Info, line)?;
            }
        }
        Ok(())
    }
}

fn read_back(mut file: File) -> BuildResult<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Default runner command: this executable's hidden `test-runner` subcommand
pub fn default_runner() -> BuildResult<Vec<String>> {
    let exe = std::env::current_exe()?;
    Ok(vec![exe.display().to_string(), "test-runner".to_string()])
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::events::EventBus;
    use crate::loggers::{EventLog, RecordingListener};
    use crate::properties::PropertyTable;

    const REPORT_CLEAN_EXIT: &str =
        "for a in \"$@\"; do case \"$a\" in crashfile=*) printf 'terminated successfully\\n' > \"${a#crashfile=}\";; esac; done";

    fn options(dir: &Path, script: &str, timeout: Option<Duration>) -> ForkOptions {
        ForkOptions {
            runner: vec![
                "sh".to_string(),
                "-c".to_string(),
                script.to_string(),
                "fake-runner".to_string(),
            ],
            dir: dir.to_path_buf(),
            tempdir: dir.join("tmp"),
            timeout,
            show_output: false,
            output_to_formatters: true,
            log_failed_tests: true,
            log_test_listener_events: false,
            print_summary: false,
        }
    }

    fn run(
        options: &ForkOptions,
        formatters: &[FormatterElement],
        target: ForkTarget<'_>,
    ) -> (BuildResult<TestResultHolder>, EventLog) {
        let registry = FormatterRegistry::with_builtins();
        let runner = ForkedTestRunner::new(options, formatters, &registry);
        let (listener, log) = RecordingListener::new();
        let mut bus = EventBus::new();
        bus.add_listener(Box::new(listener));
        let mut properties = PropertyTable::new();
        properties.set_property("suite.flavour", "fork");
        let mut ctx = TaskContext::new(
            "demo",
            &options.dir,
            "test",
            "junit",
            &mut properties,
            &mut bus,
        );
        let result = runner.execute(target, &mut ctx);
        (result, log)
    }

    #[test]
    fn test_clean_failure_keeps_child_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let script = format!("{}; echo running suite; echo oops >&2; exit 1", REPORT_CLEAN_EXIT);
        let options = options(dir.path(), &script, None);
        let test = JUnitTest::new("suites.smoke", dir.path().join("reports"));

        let (result, log) = run(&options, &[], ForkTarget::Single(&test));
        let result = result.unwrap();

        assert_eq!(result.exit_code, ExitCode::Failures);
        assert!(!result.crashed && !result.timed_out);
        let messages = log.messages();
        assert!(messages.contains(&"running suite".to_string()));
        assert!(messages.contains(&"oops".to_string()));
        // temp files are gone
        assert_eq!(fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
    }

    #[test]
    fn test_crash_synthesizes_error_report() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), "exit 3", None);
        let reports = dir.path().join("reports");
        let test = JUnitTest::new("suites.smoke", &reports);
        let formatters = [FormatterElement::new("xml", true)];

        let (result, _log) = run(&options, &formatters, ForkTarget::Single(&test));
        let result = result.unwrap();

        assert!(result.crashed);
        assert!(result.error_occurred());
        let xml = fs::read_to_string(reports.join("TEST-suites.smoke.xml")).unwrap();
        assert!(xml.contains("errors=\"1\""));
        assert!(xml.contains("BEFORE_FIRST_TEST"));
        assert!(xml.contains("exited abnormally"));
    }

    #[test]
    fn test_batch_crash_reports_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), "exit 3", None);
        let reports = dir.path().join("reports");
        let tests = [
            JUnitTest::new("suites.alpha", &reports),
            JUnitTest::new("suites.beta", &reports),
        ];
        let formatters = [FormatterElement::new("xml", true)];

        let (result, _log) = run(&options, &formatters, ForkTarget::Batch(&tests));

        assert!(result.unwrap().crashed);
        assert!(reports
            .join("TEST-suites.Batch-With-Multiple-Tests.xml")
            .exists());
    }

    #[test]
    fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), "sleep 5", Some(Duration::from_millis(200)));
        let test = JUnitTest::new("suites.slow", dir.path().join("reports"));
        let formatters = [FormatterElement::new("brief", false)];

        let (result, log) = run(&options, &formatters, ForkTarget::Single(&test));
        let result = result.unwrap();

        assert!(result.timed_out);
        assert!(!result.crashed);
        assert_eq!(result.fatal_suffix(), " (timeout)");
        assert!(log
            .messages()
            .iter()
            .any(|m| m.contains("Timeout occurred")));
    }

    #[test]
    fn test_killed_mid_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let script = "for a in \"$@\"; do case \"$a\" in crashfile=*) printf 'case\\n' > \"${a#crashfile=}.tmp\";; esac; done; sleep 5";
        let options = options(dir.path(), script, Some(Duration::from_millis(200)));
        let test = JUnitTest::new("suites.slow", dir.path().join("reports"));

        let (result, _log) = run(&options, &[], ForkTarget::Single(&test));

        assert!(result.unwrap().timed_out);
        assert_eq!(fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
    }

    #[test]
    fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options(dir.path(), "", None);
        options.runner = vec![dir.path().join("no-such-runner").display().to_string()];
        let test = JUnitTest::new("suites.smoke", dir.path().join("reports"));

        let (result, _log) = run(&options, &[], ForkTarget::Single(&test));
        let error = result.unwrap_err().to_string();
        assert!(error.starts_with("Process fork failed.: "), "{}", error);
    }
}
