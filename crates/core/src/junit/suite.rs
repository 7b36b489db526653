//! Test suites and how they are found
//!
//! A suite is a named list of cases. The built-in kind is a YAML file whose
//! cases are commands: exit code 0 passes, the case's failure code fails,
//! anything else is an error. Suite `a.b.c` lives at `<root>/a/b/c.yml`
//! (or `.yaml`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use crate::configs::suite::{parse_suite_config, SuiteConfig};
use crate::configs::tasks::Command;
use crate::execution::command::{describe, CommandExecutor};
use crate::types::{BuildError, BuildResult};

const SUITE_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed,
    /// An assertion did not hold
    Failed(String),
    /// The case could not run properly
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRun {
    pub outcome: CaseOutcome,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

pub trait TestSuite {
    fn name(&self) -> &str;

    /// Case names in execution order
    fn case_names(&self) -> Vec<String>;

    fn run_case(&self, case: &str) -> CaseRun;
}

/// Finds a suite by name
pub trait SuiteLoader {
    fn load(&self, name: &str) -> BuildResult<Box<dyn TestSuite>>;
}

/// Loads command suites from YAML files below a root directory
#[derive(Debug, Clone)]
pub struct FileSuiteLoader {
    root: PathBuf,
}

impl FileSuiteLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing suite `name`
    pub fn suite_path(&self, name: &str) -> BuildResult<PathBuf> {
        if name.is_empty()
            || name
                .split('.')
                .any(|segment| segment.is_empty() || segment.contains(['/', '\\']))
        {
            return Err(BuildError::Config(format!("Invalid test suite name '{}'", name)));
        }
        let base = self.root.join(name.replace('.', "/"));
        SUITE_EXTENSIONS
            .iter()
            .map(|ext| base.with_extension(ext))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                BuildError::Config(format!(
                    "Test suite '{}' not found below {}",
                    name,
                    self.root.display()
                ))
            })
    }

    /// Suite name for a file below `root`, e.g. `suites/smoke.yml` -> `suites.smoke`
    pub fn suite_name_for(root: &Path, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(root).ok()?;
        let extension = relative.extension()?.to_str()?;
        if !SUITE_EXTENSIONS.contains(&extension) {
            return None;
        }
        let stem = relative.with_extension("");
        let segments: Option<Vec<&str>> = stem
            .components()
            .map(|component| match component {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();
        Some(segments?.join("."))
    }
}

impl SuiteLoader for FileSuiteLoader {
    fn load(&self, name: &str) -> BuildResult<Box<dyn TestSuite>> {
        let path = self.suite_path(name)?;
        let config = parse_suite_config(&fs::read_to_string(&path)?)?;
        let dir = path.parent().unwrap_or(&self.root).to_path_buf();
        Ok(Box::new(CommandSuite::new(name, config, dir)))
    }
}

/// A suite whose cases are external commands
#[derive(Debug)]
pub struct CommandSuite {
    name: String,
    config: SuiteConfig,
    dir: PathBuf,
}

impl CommandSuite {
    pub fn new(name: impl Into<String>, config: SuiteConfig, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            config,
            dir: dir.into(),
        }
    }
}

impl TestSuite for CommandSuite {
    fn name(&self) -> &str {
        &self.name
    }

    fn case_names(&self) -> Vec<String> {
        self.config.cases.iter().map(|c| c.name.clone()).collect()
    }

    fn run_case(&self, case: &str) -> CaseRun {
        let started = Instant::now();
        let Some(config) = self.config.cases.iter().find(|c| c.name == case) else {
            return CaseRun {
                outcome: CaseOutcome::Error(format!("No case named '{}' in {}", case, self.name)),
                stdout: String::new(),
                stderr: String::new(),
                duration: started.elapsed(),
            };
        };

        let mut env = BTreeMap::new();
        env.insert("ANTHILL_TEST_SUITE".to_string(), self.name.clone());
        env.insert("ANTHILL_TEST_CASE".to_string(), case.to_string());

        match CommandExecutor::new(&self.dir, &env).run_captured(&config.command) {
            Ok(output) => {
                let outcome = match output.status.code() {
                    Some(0) => CaseOutcome::Passed,
                    Some(code) if code == config.failure_code => CaseOutcome::Failed(
                        case_message(&config.command, code, &output.stderr),
                    ),
                    Some(code) => CaseOutcome::Error(case_message(&config.command, code, &output.stderr)),
                    None => CaseOutcome::Error(format!(
                        "'{}' was terminated by a signal",
                        describe(&config.command)
                    )),
                };
                CaseRun {
                    outcome,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    duration: started.elapsed(),
                }
            }
            Err(error) => CaseRun {
                outcome: CaseOutcome::Error(error.to_string()),
                stdout: String::new(),
                stderr: String::new(),
                duration: started.elapsed(),
            },
        }
    }
}

fn case_message(command: &Command, code: i32, stderr: &str) -> String {
    let mut message = format!("'{}' exited with code {}", describe(command), code);
    let detail = stderr.trim_end();
    if !detail.is_empty() {
        message.push('\n');
        message.push_str(detail);
    }
    message
}
