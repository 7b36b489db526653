use crate::configs::tasks::ExecConfig;
use crate::events::MessageLevel;
use crate::execution::command::{describe, CommandExecutor};
use crate::task::{Task, TaskContext};
use crate::types::{BuildError, BuildFailure, BuildResult, Location};

/// Runs an external command, relaying its output into the build log
#[derive(Debug)]
pub struct ExecTask {
    config: ExecConfig,
    location: Option<Location>,
}

impl ExecTask {
    pub fn new(config: ExecConfig, location: Option<Location>) -> Self {
        Self { config, location }
    }
}

impl Task for ExecTask {
    fn name(&self) -> &str {
        "exec"
    }

    fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> BuildResult<()> {
        let dir = match &self.config.dir {
            Some(dir) => ctx.resolve_path(dir),
            None => ctx.basedir().to_path_buf(),
        };
        ctx.log(
            MessageLevel::Verbose,
            format!("Executing '{}' in {}", describe(&self.config.command), dir.display()),
        )?;

        let output = CommandExecutor::new(&dir, &self.config.env).run_captured(&self.config.command)?;
        for line in output.stdout.lines() {
            ctx.log(MessageLevel::Info, line)?;
        }
        for line in output.stderr.lines() {
            ctx.log(MessageLevel::Warn, line)?;
        }

        let code = output.status.code().unwrap_or(-1);
        if let Some(property) = &self.config.result_property {
            ctx.properties_mut().set_new_property(property, &code.to_string());
        }
        if !output.success() {
            if self.config.failonerror {
                return Err(BuildError::Failure(BuildFailure::at(
                    format!("exec returned: {}", code),
                    self.location.clone(),
                )));
            }
            ctx.log(MessageLevel::Error, format!("Result: {}", code))?;
        }
        Ok(())
    }
}
