use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::BuildResult;

/// A command line, either run through the shell or as a program with arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Command {
    Single(String),
    Multiple(Vec<String>),
}

/// One task of a target, keyed by the task type
#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub enum TaskConfig {
    Echo(EchoConfig),
    Exec(ExecConfig),
    Property(PropertyConfig),
    Fail(FailConfig),
    Junit(JUnitConfig),
}

impl TaskConfig {
    /// Name used in log prefixes and events
    pub fn task_name(&self) -> &'static str {
        match self {
            Self::Echo(_) => "echo",
            Self::Exec(_) => "exec",
            Self::Property(_) => "property",
            Self::Fail(_) => "fail",
            Self::Junit(_) => "junit",
        }
    }
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EchoConfig {
    pub message: String,
    /// error, warning, info, verbose or debug
    pub level: Option<String>,
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExecConfig {
    pub command: Command,
    /// Working directory, relative to the project base directory
    pub dir: Option<String>,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    /// Fail the build on a non-zero exit code
    #[serde(default = "default_true")]
    pub failonerror: bool,
    /// Property receiving the exit code
    pub result_property: Option<String>,
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PropertyConfig {
    pub name: Option<String>,
    pub value: Option<String>,
    /// Properties file to load, relative to the project base directory
    pub file: Option<String>,
    /// Prefix added to every name loaded from `file`
    pub prefix: Option<String>,
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FailConfig {
    pub message: Option<String>,
    #[serde(rename = "if")]
    pub if_property: Option<String>,
    #[serde(rename = "unless")]
    pub unless_property: Option<String>,
}

/// How forked test suites are grouped into processes
#[derive(Deserialize, Serialize, JsonSchema, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ForkMode {
    /// A new process for every suite
    #[default]
    PerTest,
    /// One process per batch test element
    PerBatch,
    /// One process for all suites sharing the same settings
    Once,
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JUnitConfig {
    #[serde(default)]
    pub tests: Vec<TestConfig>,
    #[serde(default)]
    pub batchtests: Vec<BatchTestConfig>,
    #[serde(default)]
    pub formatters: Vec<FormatterConfig>,
    /// Run suites in a separate process
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub fork_mode: ForkMode,
    /// Milliseconds before a forked process is killed
    pub timeout: Option<u64>,
    #[serde(default)]
    pub halt_on_error: bool,
    #[serde(default)]
    pub halt_on_failure: bool,
    #[serde(default = "default_true")]
    pub filter_trace: bool,
    #[serde(default)]
    pub show_output: bool,
    #[serde(default = "default_true")]
    pub output_to_formatters: bool,
    #[serde(default = "default_true")]
    pub log_failed_tests: bool,
    #[serde(default)]
    pub log_test_listener_events: bool,
    /// Add a summary formatter writing to the build log
    #[serde(default)]
    pub print_summary: bool,
    pub error_property: Option<String>,
    pub failure_property: Option<String>,
    /// Directory suites are resolved from and forked processes run in
    pub dir: Option<String>,
    /// Directory for the temporary files of a forked run
    pub tempdir: Option<String>,
    /// Default report directory for tests that do not set one
    pub todir: Option<String>,
    /// Test runner command; defaults to this executable's `test-runner` subcommand
    pub runner: Option<Command>,
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TestConfig {
    pub name: String,
    pub todir: Option<String>,
    /// Report file name without extension; defaults to `TEST-<name>`
    pub outfile: Option<String>,
    pub halt_on_error: Option<bool>,
    pub halt_on_failure: Option<bool>,
    pub filter_trace: Option<bool>,
    pub error_property: Option<String>,
    pub failure_property: Option<String>,
    #[serde(rename = "if")]
    pub if_property: Option<String>,
    #[serde(rename = "unless")]
    pub unless_property: Option<String>,
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BatchTestConfig {
    /// Directory scanned for suite files, relative to the suite root
    pub dir: Option<String>,
    #[serde(default = "default_suite_includes")]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    pub todir: Option<String>,
    #[serde(rename = "if")]
    pub if_property: Option<String>,
    #[serde(rename = "unless")]
    pub unless_property: Option<String>,
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FormatterConfig {
    /// plain, brief, xml, summary or a registered custom kind
    #[serde(rename = "type")]
    pub kind: String,
    /// Write to a report file instead of the build log
    #[serde(default = "default_true")]
    pub use_file: bool,
    pub extension: Option<String>,
    #[serde(rename = "if")]
    pub if_property: Option<String>,
    #[serde(rename = "unless")]
    pub unless_property: Option<String>,
}

/// Parse one task written as a single-key map, e.g. `echo: { message: hi }`
pub fn parse_task_config(yaml_str: &str) -> BuildResult<TaskConfig> {
    let config = serde_yaml::with::singleton_map_recursive::deserialize(
        serde_yaml::Deserializer::from_str(yaml_str),
    )?;
    Ok(config)
}

fn default_true() -> bool {
    true
}

fn default_suite_includes() -> Vec<String> {
    vec!["**/*.yml".to_string(), "**/*.yaml".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_list_parses_by_key() {
        let tasks: Vec<TaskConfig> = serde_yaml::with::singleton_map_recursive::deserialize(
            serde_yaml::Deserializer::from_str(
                r#"
- echo:
    message: hello
- exec:
    command: [cargo, build]
- property:
    name: built
    value: "true"
- fail:
    message: stop
    unless: built
"#,
            ),
        )
        .unwrap();

        let names: Vec<_> = tasks.iter().map(TaskConfig::task_name).collect();
        assert_eq!(names, ["echo", "exec", "property", "fail"]);
        match &tasks[1] {
            TaskConfig::Exec(exec) => {
                assert_eq!(
                    exec.command,
                    Command::Multiple(vec!["cargo".into(), "build".into()])
                );
                assert!(exec.failonerror);
            }
            other => panic!("unexpected task {:?}", other),
        }
    }

    #[test]
    fn test_junit_defaults() {
        let task = parse_task_config(
            r#"
junit:
  tests:
    - name: suites.smoke
  formatters:
    - type: xml
"#,
        )
        .unwrap();

        let TaskConfig::Junit(junit) = task else {
            panic!("expected junit task");
        };
        assert!(!junit.fork);
        assert_eq!(junit.fork_mode, ForkMode::PerTest);
        assert!(junit.filter_trace);
        assert!(junit.output_to_formatters);
        assert!(junit.log_failed_tests);
        assert!(junit.formatters[0].use_file);
        assert_eq!(junit.tests[0].name, "suites.smoke");
    }

    #[test]
    fn test_plain_tag_syntax_is_not_required() {
        let task = parse_task_config("exec:\n  command: make\n  failonerror: false\n").unwrap();
        let TaskConfig::Exec(exec) = task else {
            panic!("expected exec task");
        };
        assert_eq!(exec.command, Command::Single("make".into()));
        assert!(!exec.failonerror);
        assert!(parse_task_config("copy:\n  file: a\n").is_err());
    }

    #[test]
    fn test_fork_mode_spelling() {
        let mode: ForkMode = serde_yaml::from_str("perBatch").unwrap();
        assert_eq!(mode, ForkMode::PerBatch);
        let mode: ForkMode = serde_yaml::from_str("once").unwrap();
        assert_eq!(mode, ForkMode::Once);
    }
}
