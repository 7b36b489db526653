//! The test runner side of a forked test run
//!
//! Entry point of the `test-runner` process: decode the protocol arguments,
//! run one suite or every suite of a batch, keep the crash file current and
//! turn the outcome into the process exit code.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anthill_test_protocol::constants::{BEFORE_FIRST_TEST, IGNORED_FILE_NAME};
use anthill_test_protocol::{
    read_batch_file, read_properties, BatchEntry, CrashFile, ExitCode, ForkArgs, FormatterSpec,
    TestTarget,
};

use crate::junit::formatter::{open_report, FormatterFanout, FormatterRegistry};
use crate::junit::runner::{RunnerOptions, SuiteRunner};
use crate::junit::suite::SuiteLoader;
use crate::types::BuildResult;

/// Run the tests described by `args` and return the process exit code.
///
/// Problems that prevent running anything at all are printed to stderr and
/// reported as [`ExitCode::Errors`]; the crash file then keeps whatever it
/// last said, so the parent also sees the run as abnormal.
pub fn run_forked<S: AsRef<str>>(
    args: &[S],
    loader: &dyn SuiteLoader,
    registry: &FormatterRegistry,
) -> i32 {
    match execute(args, loader, registry) {
        Ok(code) => code.code(),
        Err(error) => {
            eprintln!("{}", error);
            ExitCode::Errors.code()
        }
    }
}

fn execute<S: AsRef<str>>(
    args: &[S],
    loader: &dyn SuiteLoader,
    registry: &FormatterRegistry,
) -> BuildResult<ExitCode> {
    let args = ForkArgs::parse(args)?;
    let crash_file = args.crash_file.as_ref().map(CrashFile::open);
    if let Some(crash_file) = &crash_file {
        crash_file.register_test_case(BEFORE_FIRST_TEST)?;
    }
    let properties = match &args.props_file {
        Some(path) => read_properties(path)?,
        None => BTreeMap::new(),
    };

    let launcher = Launcher {
        args: &args,
        properties: &properties,
        loader,
        registry,
        crash_file: crash_file.as_ref(),
    };

    let code = match &args.target {
        TestTarget::Single(name) => launcher.launch(name, None)?,
        TestTarget::Batch(path) => {
            let mut code = ExitCode::Success;
            for entry in read_batch_file(path)? {
                let result = launcher.launch(&entry.test_name, Some(&entry))?;
                let error_occurred = result == ExitCode::Errors;
                let failure_occurred = result != ExitCode::Success;
                if !failure_occurred {
                    continue;
                }
                if (error_occurred && args.halt_on_error)
                    || (failure_occurred && args.halt_on_failure)
                {
                    if let Some(crash_file) = &crash_file {
                        crash_file.register_clean_exit()?;
                    }
                    return Ok(result);
                }
                code = code.worst(result);
                if args.log_failed_tests {
                    println!("TEST {} FAILED", entry.test_name);
                }
            }
            code
        }
    };

    io::stdout().flush()?;
    if let Some(crash_file) = &crash_file {
        crash_file.register_clean_exit()?;
    }
    Ok(code)
}

struct Launcher<'a> {
    args: &'a ForkArgs,
    properties: &'a BTreeMap<String, String>,
    loader: &'a dyn SuiteLoader,
    registry: &'a FormatterRegistry,
    crash_file: Option<&'a CrashFile>,
}

impl Launcher<'_> {
    fn launch(&self, name: &str, entry: Option<&BatchEntry>) -> BuildResult<ExitCode> {
        let mut fanout = FormatterFanout::new();
        for spec in &self.args.formatters {
            let mut formatter = self.registry.create(&spec.kind)?;
            let output: Box<dyn Write> = match report_path(spec, entry) {
                Some(path) => open_report(&path)?,
                None => Box::new(io::stdout()),
            };
            formatter.set_output(output);
            fanout.push(formatter);
        }

        let runner = SuiteRunner::new(RunnerOptions::from(self.args), self.properties);
        let mut record_progress = |case: &str| -> BuildResult<()> {
            if let Some(crash_file) = self.crash_file {
                crash_file.register_test_case(case)?;
            }
            Ok(())
        };

        let result = match self.loader.load(name) {
            Ok(suite) => runner.run(suite.as_ref(), &mut fanout, &mut record_progress)?,
            Err(error) => runner.report_load_error(name, &error.to_string(), &mut fanout)?,
        };
        print!("{}", result.console);
        Ok(result.exit_code)
    }
}

// In batch mode the formatter path is a placeholder whose suffix is the
// extension; the real file comes from the batch entry.
fn report_path(spec: &FormatterSpec, entry: Option<&BatchEntry>) -> Option<PathBuf> {
    let output = spec.output.as_ref()?;
    let Some(entry) = entry else {
        return Some(output.clone());
    };
    let file_name = output.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    match file_name.strip_prefix(IGNORED_FILE_NAME) {
        Some(extension) => Some(entry.output_file(extension)),
        None => Some(output.clone()),
    }
}

/// Where a batch formatter should write, as passed on the command line
pub fn batch_placeholder_path(extension: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", IGNORED_FILE_NAME, extension))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use anthill_test_protocol::constants::TERMINATED_SUCCESSFULLY;
    use anthill_test_protocol::{write_batch_file, write_properties, CrashState};

    use super::*;
    use crate::junit::suite::FileSuiteLoader;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_report_path_in_batch_mode() {
        let entry = BatchEntry::new("suites.smoke", "reports", "TEST-suites.smoke");
        let spec = FormatterSpec::new("xml", Some(batch_placeholder_path(".xml")));
        assert_eq!(
            report_path(&spec, Some(&entry)),
            Some(PathBuf::from("reports/TEST-suites.smoke.xml"))
        );
        let direct = FormatterSpec::new("plain", Some(PathBuf::from("out/plain.txt")));
        assert_eq!(report_path(&direct, None), Some(PathBuf::from("out/plain.txt")));
        assert_eq!(report_path(&FormatterSpec::new("brief", None), Some(&entry)), None);
    }

    #[test]
    fn test_missing_suite_is_an_error_but_exits_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let crash = dir.path().join("watcher.properties");
        let props = dir.path().join("props.properties");
        write_properties(&props, &BTreeMap::new(), None).unwrap();
        let report = dir.path().join("reports/TEST-nope.xml");

        let args = vec![
            "nope".to_string(),
            format!("crashfile={}", crash.display()),
            format!("propsfile={}", props.display()),
            format!("formatter=xml,{}", report.display()),
        ];
        let code = run_forked(
            &args,
            &FileSuiteLoader::new(dir.path()),
            &FormatterRegistry::with_builtins(),
        );

        assert_eq!(code, 2);
        assert_eq!(
            CrashFile::open(&crash).read_state().unwrap(),
            CrashState::TerminatedSuccessfully
        );
        assert!(fs::read_to_string(report).unwrap().contains("errors=\"1\""));
    }

    #[cfg(unix)]
    #[test]
    fn test_batch_run_keeps_worst_code_and_records_progress() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("suites/pass.yml"),
            "cases:\n  - name: fine\n    command: \"true\"\n",
        );
        write(
            &dir.path().join("suites/fail.yml"),
            "cases:\n  - name: wrong\n    command: \"exit 1\"\n",
        );
        let batch = dir.path().join("batch.txt");
        let reports = dir.path().join("reports");
        write_batch_file(
            &batch,
            &[
                BatchEntry::new("suites.fail", &reports, "TEST-suites.fail"),
                BatchEntry::new("suites.pass", &reports, "TEST-suites.pass"),
            ],
        )
        .unwrap();
        let crash = dir.path().join("watcher.properties");

        let args = vec![
            format!("testsfile={}", batch.display()),
            format!("crashfile={}", crash.display()),
            format!("formatter=plain,{}", batch_placeholder_path(".txt").display()),
        ];
        let code = run_forked(
            &args,
            &FileSuiteLoader::new(dir.path()),
            &FormatterRegistry::with_builtins(),
        );

        assert_eq!(code, 1);
        assert!(reports.join("TEST-suites.fail.txt").exists());
        assert!(reports.join("TEST-suites.pass.txt").exists());
        assert_eq!(
            fs::read_to_string(&crash).unwrap().trim_end(),
            TERMINATED_SUCCESSFULLY
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_batch_halts_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("a.yml"),
            "cases:\n  - name: wrong\n    command: \"exit 1\"\n",
        );
        write(
            &dir.path().join("b.yml"),
            "cases:\n  - name: fine\n    command: \"true\"\n",
        );
        let batch = dir.path().join("batch.txt");
        let reports = dir.path().join("reports");
        write_batch_file(
            &batch,
            &[
                BatchEntry::new("a", &reports, "TEST-a"),
                BatchEntry::new("b", &reports, "TEST-b"),
            ],
        )
        .unwrap();

        let args = vec![
            format!("testsfile={}", batch.display()),
            "haltOnFailure=true".to_string(),
            format!("formatter=xml,{}", batch_placeholder_path(".xml").display()),
        ];
        let code = run_forked(
            &args,
            &FileSuiteLoader::new(dir.path()),
            &FormatterRegistry::with_builtins(),
        );
        assert_eq!(code, 1);
        assert!(reports.join("TEST-a.xml").exists());
        assert!(!reports.join("TEST-b.xml").exists());
    }
}
