//! The `junit` task
//!
//! Collects the configured suites, runs them in-process or through forked
//! test runners and turns each result into log output, error/failure
//! properties or a build failure.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anthill_test_protocol::constants::TESTLISTENER_PREFIX;
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::configs::tasks::{BatchTestConfig, ForkMode, JUnitConfig, TestConfig};
use crate::configs::Command;
use crate::events::MessageLevel;
use crate::junit::formatter::{fanout_for_test, FormatterRegistry, ResultFormatter};
use crate::junit::forked::{default_runner, ForkOptions, ForkTarget, ForkedTestRunner};
use crate::junit::result::TestResultHolder;
use crate::junit::runner::{RunnerOptions, SuiteRunner};
use crate::junit::suite::{FileSuiteLoader, SuiteLoader};
use crate::junit::test::{FormatterElement, ForkKey, JUnitTest};
use crate::properties::PropertyTable;
use crate::target::Condition;
use crate::task::{Task, TaskContext};
use crate::types::{BuildError, BuildFailure, BuildResult, Location};

/// `if`/`unless` pair of a nested element
#[derive(Debug, Clone, Default)]
struct Conditions {
    if_condition: Option<Condition>,
    unless_condition: Option<Condition>,
}

impl Conditions {
    fn parse(target: &str, if_raw: Option<&str>, unless_raw: Option<&str>) -> BuildResult<Self> {
        Ok(Self {
            if_condition: parse_condition(target, "if", if_raw)?,
            unless_condition: parse_condition(target, "unless", unless_raw)?,
        })
    }

    fn admit(&self, properties: &PropertyTable) -> bool {
        self.if_condition.as_ref().map_or(true, |c| c.holds(properties))
            && !self
                .unless_condition
                .as_ref()
                .map_or(false, |c| c.holds(properties))
    }
}

fn parse_condition(
    target: &str,
    kind: &'static str,
    raw: Option<&str>,
) -> BuildResult<Option<Condition>> {
    match raw {
        Some(raw) => Condition::parse(target, kind, raw),
        None => Ok(None),
    }
}

pub struct JUnitTask {
    config: JUnitConfig,
    tests: Vec<(TestConfig, Conditions)>,
    batches: Vec<(BatchTestConfig, Conditions)>,
    formatters: Vec<FormatterElement>,
    registry: FormatterRegistry,
    location: Option<Location>,
}

impl JUnitTask {
    pub fn new(target: &str, config: JUnitConfig, location: Option<Location>) -> BuildResult<Self> {
        let tests = config
            .tests
            .iter()
            .map(|test| {
                let conditions = Conditions::parse(
                    target,
                    test.if_property.as_deref(),
                    test.unless_property.as_deref(),
                )?;
                Ok((test.clone(), conditions))
            })
            .collect::<BuildResult<Vec<_>>>()?;
        let batches = config
            .batchtests
            .iter()
            .map(|batch| {
                let conditions = Conditions::parse(
                    target,
                    batch.if_property.as_deref(),
                    batch.unless_property.as_deref(),
                )?;
                Ok((batch.clone(), conditions))
            })
            .collect::<BuildResult<Vec<_>>>()?;
        let formatters = config
            .formatters
            .iter()
            .map(|formatter| {
                let conditions = Conditions::parse(
                    target,
                    formatter.if_property.as_deref(),
                    formatter.unless_property.as_deref(),
                )?;
                Ok(FormatterElement {
                    kind: formatter.kind.clone(),
                    use_file: formatter.use_file,
                    extension: formatter.extension.clone(),
                    if_condition: conditions.if_condition,
                    unless_condition: conditions.unless_condition,
                })
            })
            .collect::<BuildResult<Vec<_>>>()?;

        Ok(Self {
            config,
            tests,
            batches,
            formatters,
            registry: FormatterRegistry::with_builtins(),
            location,
        })
    }

    /// Make a custom formatter kind available to this task
    pub fn register_formatter<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ResultFormatter> + 'static,
    {
        self.registry.register(kind, factory);
    }

    fn suite_root(&self, ctx: &TaskContext<'_>) -> PathBuf {
        match &self.config.dir {
            Some(dir) => ctx.resolve_path(dir),
            None => ctx.basedir().to_path_buf(),
        }
    }

    fn default_todir(&self, ctx: &TaskContext<'_>) -> PathBuf {
        match &self.config.todir {
            Some(todir) => ctx.resolve_path(todir),
            None => ctx.basedir().to_path_buf(),
        }
    }

    /// Every suite to run, individual tests first, then batch tests
    fn collect_tests(&self, ctx: &TaskContext<'_>) -> BuildResult<Vec<JUnitTest>> {
        let root = self.suite_root(ctx);
        let default_todir = self.default_todir(ctx);
        let mut collected = Vec::new();

        for (test, conditions) in &self.tests {
            if !conditions.admit(ctx.properties()) {
                continue;
            }
            let todir = match &test.todir {
                Some(todir) => ctx.resolve_path(todir),
                None => default_todir.clone(),
            };
            let mut junit_test = self.task_level_test(&test.name, todir);
            junit_test.outfile = test.outfile.clone();
            if let Some(halt) = test.halt_on_error {
                junit_test.halt_on_error = halt;
            }
            if let Some(halt) = test.halt_on_failure {
                junit_test.halt_on_failure = halt;
            }
            if let Some(filter) = test.filter_trace {
                junit_test.filter_trace = filter;
            }
            if test.error_property.is_some() {
                junit_test.error_property = test.error_property.clone();
            }
            if test.failure_property.is_some() {
                junit_test.failure_property = test.failure_property.clone();
            }
            collected.push(junit_test);
        }

        for (index, (batch, conditions)) in self.batches.iter().enumerate() {
            if !conditions.admit(ctx.properties()) {
                continue;
            }
            let todir = match &batch.todir {
                Some(todir) => ctx.resolve_path(todir),
                None => default_todir.clone(),
            };
            for name in scan_suites(&root, batch)? {
                let mut junit_test = self.task_level_test(&name, todir.clone());
                junit_test.batch = Some(index);
                collected.push(junit_test);
            }
        }

        Ok(collected)
    }

    fn task_level_test(&self, name: &str, todir: PathBuf) -> JUnitTest {
        JUnitTest {
            halt_on_error: self.config.halt_on_error,
            halt_on_failure: self.config.halt_on_failure,
            filter_trace: self.config.filter_trace,
            error_property: self.config.error_property.clone(),
            failure_property: self.config.failure_property.clone(),
            ..JUnitTest::new(name, todir)
        }
    }

    fn active_formatters(&self, properties: &PropertyTable) -> Vec<&FormatterElement> {
        self.formatters
            .iter()
            .filter(|f| f.is_active(properties))
            .collect()
    }

    fn run_in_process(
        &self,
        test: &JUnitTest,
        root: &Path,
        ctx: &mut TaskContext<'_>,
    ) -> BuildResult<TestResultHolder> {
        let active = self.active_formatters(ctx.properties());
        let (mut fanout, log_buffers) =
            fanout_for_test(&self.registry, &active, test, self.config.print_summary)?;
        let properties = ctx.properties().all();
        let options = RunnerOptions {
            halt_on_error: test.halt_on_error,
            halt_on_failure: test.halt_on_failure,
            filter_trace: test.filter_trace,
            show_output: self.config.show_output,
            output_to_formatters: self.config.output_to_formatters,
            log_test_listener_events: self.config.log_test_listener_events,
        };
        let runner = SuiteRunner::new(options, &properties);

        let result = match FileSuiteLoader::new(root).load(&test.name) {
            Ok(suite) => runner.run(suite.as_ref(), &mut fanout, &mut |_| Ok(()))?,
            Err(error) => runner.report_load_error(&test.name, &error.to_string(), &mut fanout)?,
        };
        drop(fanout);

        for line in result.console.lines() {
            let level = if line.starts_with(TESTLISTENER_PREFIX) {
                MessageLevel::Verbose
            } else {
                MessageLevel::Info
            };
            ctx.log(level, line)?;
        }
        for buffer in log_buffers {
            for line in buffer.text().lines() {
                ctx.log(MessageLevel::Info, line)?;
            }
        }
        Ok(TestResultHolder::from_exit_code(result.exit_code))
    }

    fn fork_options(&self, root: &Path) -> BuildResult<ForkOptions> {
        let runner = match &self.config.runner {
            Some(Command::Single(line)) => line.split_whitespace().map(str::to_string).collect(),
            Some(Command::Multiple(parts)) => parts.clone(),
            None => default_runner()?,
        };
        let tempdir = match &self.config.tempdir {
            Some(tempdir) => root.join(tempdir),
            None => std::env::temp_dir(),
        };
        Ok(ForkOptions {
            runner,
            dir: root.to_path_buf(),
            tempdir,
            timeout: self.config.timeout.map(Duration::from_millis),
            show_output: self.config.show_output,
            output_to_formatters: self.config.output_to_formatters,
            log_failed_tests: self.config.log_failed_tests,
            log_test_listener_events: self.config.log_test_listener_events,
            print_summary: self.config.print_summary,
        })
    }

    /// Log, set properties or fail for a finished run. `name` is
    /// `Test <suite>` for a single suite and `Tests` for a batch.
    fn act_on_test_result(
        &self,
        test: &JUnitTest,
        name: &str,
        result: &TestResultHolder,
        ctx: &mut TaskContext<'_>,
    ) -> BuildResult<()> {
        let error_occurred = result.error_occurred();
        let failure_occurred = result.failure_occurred();
        if !failure_occurred {
            return Ok(());
        }
        let suffix = result.fatal_suffix();

        if (error_occurred && test.halt_on_error) || (failure_occurred && test.halt_on_failure) {
            return Err(BuildError::Failure(BuildFailure::at(
                format!("{} failed{}", name, suffix),
                self.location.clone(),
            )));
        }

        if self.config.log_failed_tests {
            ctx.log(MessageLevel::Error, format!("{} FAILED{}", name, suffix))?;
        }
        if error_occurred {
            if let Some(property) = &test.error_property {
                ctx.properties_mut().set_new_property(property, "true");
            }
        }
        if let Some(property) = &test.failure_property {
            ctx.properties_mut().set_new_property(property, "true");
        }
        Ok(())
    }
}

impl Task for JUnitTask {
    fn name(&self) -> &str {
        "junit"
    }

    fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> BuildResult<()> {
        let root = self.suite_root(ctx);
        let tests = self.collect_tests(ctx)?;
        if tests.is_empty() {
            ctx.log(MessageLevel::Verbose, "No tests to run")?;
            return Ok(());
        }

        if !self.config.fork {
            if self.config.timeout.is_some() {
                ctx.log(
                    MessageLevel::Warn,
                    "Timeout can only be used when running forked",
                )?;
            }
            for test in &tests {
                let result = self.run_in_process(test, &root, ctx)?;
                self.act_on_test_result(test, &format!("Test {}", test.name), &result, ctx)?;
            }
            return Ok(());
        }

        let options = self.fork_options(&root)?;
        let runner = ForkedTestRunner::new(&options, &self.formatters, &self.registry);
        for group in fork_groups(tests, self.config.fork_mode) {
            match group.as_slice() {
                [single] => {
                    let result = runner.execute(ForkTarget::Single(single), ctx)?;
                    self.act_on_test_result(single, &format!("Test {}", single.name), &result, ctx)?;
                }
                [first, ..] => {
                    let result = runner.execute(ForkTarget::Batch(&group), ctx)?;
                    self.act_on_test_result(first, "Tests", &result, ctx)?;
                }
                [] => {}
            }
        }
        Ok(())
    }
}

/// Split tests into the runs of one forked process each.
///
/// `PerBatch` gives every individual test its own process and every batch
/// element one process per set of shared settings; `Once` shares a process
/// between all tests with the same settings. Groups keep first-seen order.
fn fork_groups(tests: Vec<JUnitTest>, mode: ForkMode) -> Vec<Vec<JUnitTest>> {
    if mode == ForkMode::PerTest {
        return tests.into_iter().map(|test| vec![test]).collect();
    }

    let mut index_of: HashMap<(Option<usize>, ForkKey), usize> = HashMap::new();
    let mut groups: Vec<Vec<JUnitTest>> = Vec::new();
    for test in tests {
        let batch = match (mode, test.batch) {
            (ForkMode::PerBatch, None) => {
                groups.push(vec![test]);
                continue;
            }
            (ForkMode::PerBatch, batch) => batch,
            _ => None,
        };
        let key = (batch, test.fork_key());
        match index_of.get(&key) {
            Some(&index) => groups[index].push(test),
            None => {
                index_of.insert(key, groups.len());
                groups.push(vec![test]);
            }
        }
    }
    groups
}

fn build_globs(patterns: &[String]) -> BuildResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| BuildError::Config(format!("Invalid pattern '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| BuildError::Config(format!("Invalid patterns: {}", e)))
}

/// Suite names below the batch directory, sorted
fn scan_suites(root: &Path, batch: &BatchTestConfig) -> BuildResult<Vec<String>> {
    let scan_root = match &batch.dir {
        Some(dir) => root.join(dir),
        None => root.to_path_buf(),
    };
    let includes = build_globs(&batch.includes)?;
    let excludes = build_globs(&batch.excludes)?;

    let mut names = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(scan_root.clone());
    while let Some(current_dir) = queue.pop_front() {
        let Ok(entries) = std::fs::read_dir(&current_dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let relative = path.strip_prefix(&scan_root).unwrap_or(&path);
            if excludes.is_match(relative) {
                continue;
            }
            if path.is_dir() {
                queue.push_back(path);
            } else if includes.is_match(relative) {
                if let Some(name) = FileSuiteLoader::suite_name_for(root, &path) {
                    names.push(name);
                }
            }
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::events::EventBus;
    use crate::loggers::{EventLog, RecordingListener};

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn junit(yaml: &str) -> JUnitConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn execute(
        task: &JUnitTask,
        basedir: &Path,
        properties: &mut PropertyTable,
    ) -> (BuildResult<()>, EventLog) {
        let (listener, log) = RecordingListener::new();
        let mut bus = EventBus::new();
        bus.add_listener(Box::new(listener));
        let mut ctx = TaskContext::new("demo", basedir, "test", "junit", properties, &mut bus);
        let result = task.execute(&mut ctx);
        (result, log)
    }

    #[test]
    fn test_batch_scan_applies_patterns() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("suites/b.yml"), "cases: []\n");
        write(&dir.path().join("suites/a.yaml"), "cases: []\n");
        write(&dir.path().join("suites/slow/c.yml"), "cases: []\n");
        write(&dir.path().join("suites/notes.txt"), "");

        let batch: BatchTestConfig =
            serde_yaml::from_str("dir: suites\nexcludes: [\"slow/**\"]\n").unwrap();
        let names = scan_suites(dir.path(), &batch).unwrap();
        assert_eq!(names, ["suites.a", "suites.b"]);
    }

    #[test]
    fn test_fork_groups() {
        let mut a = JUnitTest::new("a", "r");
        let b = JUnitTest::new("b", "r");
        let mut c = JUnitTest::new("c", "r");
        c.batch = Some(0);
        let mut d = JUnitTest::new("d", "r");
        d.batch = Some(0);
        let tests = vec![a.clone(), b.clone(), c.clone(), d.clone()];

        let names = |groups: Vec<Vec<JUnitTest>>| -> Vec<Vec<String>> {
            groups
                .into_iter()
                .map(|g| g.into_iter().map(|t| t.name).collect())
                .collect()
        };

        assert_eq!(names(fork_groups(tests.clone(), ForkMode::PerTest)).len(), 4);
        assert_eq!(
            names(fork_groups(tests.clone(), ForkMode::PerBatch)),
            vec![vec!["a"], vec!["b"], vec!["c", "d"]]
        );
        assert_eq!(
            names(fork_groups(tests, ForkMode::Once)),
            vec![vec!["a", "b", "c", "d"]]
        );

        a.halt_on_failure = true;
        assert_eq!(
            names(fork_groups(vec![a, b, c, d], ForkMode::Once)),
            vec![vec!["a"], vec!["b", "c", "d"]]
        );

        let mut e = JUnitTest::new("e", "r");
        e.batch = Some(1);
        let mut f = JUnitTest::new("f", "r");
        f.batch = Some(0);
        let mut g = JUnitTest::new("g", "r");
        g.batch = Some(1);
        assert_eq!(
            names(fork_groups(
                vec![e, f, JUnitTest::new("h", "r"), g],
                ForkMode::PerBatch
            )),
            vec![vec!["e", "g"], vec!["f"], vec!["h"]]
        );
    }

    #[test]
    fn test_malformed_condition_is_rejected() {
        let config = junit("tests:\n  - name: a\n    if: \"${broken\"\n");
        assert!(matches!(
            JUnitTask::new("test", config, None),
            Err(BuildError::MalformedCondition { .. })
        ));
    }

    #[test]
    fn test_missing_suite_sets_properties() {
        let dir = tempfile::tempdir().unwrap();
        let task = JUnitTask::new(
            "test",
            junit(
                "tests:\n  - name: missing\n    if: run.it\nerrorProperty: tests.errored\nfailureProperty: tests.failed\n",
            ),
            None,
        )
        .unwrap();

        let mut properties = PropertyTable::new();
        let (result, log) = execute(&task, dir.path(), &mut properties);
        result.unwrap();
        assert!(!properties.contains("tests.failed"));
        assert!(log.messages().contains(&"No tests to run".to_string()));

        properties.set_property("run.it", "yes");
        let (result, log) = execute(&task, dir.path(), &mut properties);
        result.unwrap();
        assert_eq!(properties.get("tests.errored"), Some("true"));
        assert_eq!(properties.get("tests.failed"), Some("true"));
        assert!(log.messages().contains(&"Test missing FAILED".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_in_process_run_writes_reports_and_halts() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("suites/smoke.yml"),
            "cases:\n  - name: fine\n    command: \"true\"\n  - name: wrong\n    command: \"exit 1\"\n",
        );
        let task = JUnitTask::new(
            "test",
            junit(
                "tests:\n  - name: suites.smoke\ntodir: reports\ntimeout: 1000\nhaltOnFailure: true\nformatters:\n  - type: xml\n  - type: brief\n    useFile: false\n",
            ),
            Some(Location::new("build.yml", 7, 0)),
        )
        .unwrap();

        let mut properties = PropertyTable::new();
        let (result, log) = execute(&task, dir.path(), &mut properties);

        let error = result.unwrap_err();
        assert_eq!(error.to_string(), "build.yml:7: Test suites.smoke failed");
        let xml =
            fs::read_to_string(dir.path().join("reports/TEST-suites.smoke.xml")).unwrap();
        assert!(xml.contains("failures=\"1\""));
        let messages = log.messages();
        assert!(messages.contains(&"Timeout can only be used when running forked".to_string()));
        assert!(messages.iter().any(|m| m.contains("wrong")));
    }

    #[cfg(unix)]
    #[test]
    fn test_forked_run_with_fake_runner() {
        let dir = tempfile::tempdir().unwrap();
        let script = "for a in \"$@\"; do case \"$a\" in crashfile=*) printf 'terminated successfully\\n' > \"${a#crashfile=}\";; esac; done; exit 2";
        let config = JUnitConfig {
            runner: Some(Command::Multiple(vec![
                "sh".into(),
                "-c".into(),
                script.into(),
                "runner".into(),
            ])),
            ..junit("fork: true\ntests:\n  - name: a\n  - name: b\nfailureProperty: failed\n")
        };
        let task = JUnitTask::new("test", config, None).unwrap();

        let mut properties = PropertyTable::new();
        let (result, log) = execute(&task, dir.path(), &mut properties);
        result.unwrap();
        assert_eq!(properties.get("failed"), Some("true"));
        let failed: Vec<_> = log
            .messages()
            .into_iter()
            .filter(|m| m.ends_with("FAILED"))
            .collect();
        assert_eq!(failed, ["Test a FAILED", "Test b FAILED"]);
    }
}
