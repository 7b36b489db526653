//! Process spawning for tasks and test cases
//!
//! A [`Command`] is either one shell line run through `sh -c` or an argument
//! vector run directly. Output is captured so callers can route it through
//! the build log.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{self, ExitStatus};

use crate::configs::tasks::Command;
use crate::types::{BuildError, BuildResult};

/// Result of a finished command
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Runs commands in a fixed directory with extra environment variables
pub struct CommandExecutor<'a> {
    dir: &'a Path,
    env: &'a BTreeMap<String, String>,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(dir: &'a Path, env: &'a BTreeMap<String, String>) -> Self {
        Self { dir, env }
    }

    /// Build the process for `command` without starting it
    pub fn prepare(&self, command: &Command) -> BuildResult<process::Command> {
        let mut prepared = match command {
            Command::Single(line) => {
                let mut shell = process::Command::new("sh");
                shell.arg("-c").arg(line);
                shell
            }
            Command::Multiple(argv) => {
                let (program, args) = argv
                    .split_first()
                    .ok_or_else(|| BuildError::Config("Empty command".to_string()))?;
                let mut direct = process::Command::new(program);
                direct.args(args);
                direct
            }
        };
        prepared.current_dir(self.dir).envs(self.env);
        Ok(prepared)
    }

    /// Run `command` to completion, capturing both output streams
    pub fn run_captured(&self, command: &Command) -> BuildResult<CommandOutput> {
        let output = self.prepare(command)?.output().map_err(|e| {
            BuildError::failure(format!(
                "Failed to execute command '{}': {}",
                describe(command),
                e
            ))
        })?;
        Ok(CommandOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Human readable form of a command for log messages
pub fn describe(command: &Command) -> String {
    match command {
        Command::Single(line) => line.clone(),
        Command::Multiple(argv) => argv.join(" "),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_shell_and_argv_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("GREETING".to_string(), "hello".to_string());
        let executor = CommandExecutor::new(dir.path(), &env);

        let output = executor
            .run_captured(&Command::Single("echo $GREETING; echo oops >&2".into()))
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");

        let output = executor
            .run_captured(&Command::Multiple(vec!["sh".into(), "-c".into(), "exit 3".into()]))
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_empty_and_missing_programs() {
        let dir = tempfile::tempdir().unwrap();
        let env = BTreeMap::new();
        let executor = CommandExecutor::new(dir.path(), &env);

        let err = executor.run_captured(&Command::Multiple(Vec::new())).unwrap_err();
        assert!(err.is_configuration_error());

        let err = executor
            .run_captured(&Command::Multiple(vec!["/definitely/not/here".into()]))
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to execute command"));
    }
}
