use crate::configs::tasks::EchoConfig;
use crate::events::MessageLevel;
use crate::task::{Task, TaskContext};
use crate::types::{BuildResult, Location};

/// Logs a message at a configurable level
#[derive(Debug)]
pub struct EchoTask {
    message: String,
    level: MessageLevel,
    location: Option<Location>,
}

impl EchoTask {
    pub fn new(config: &EchoConfig, location: Option<Location>) -> BuildResult<Self> {
        let level = match &config.level {
            Some(level) => level.parse()?,
            None => MessageLevel::Warn,
        };
        Ok(Self {
            message: config.message.clone(),
            level,
            location,
        })
    }
}

impl Task for EchoTask {
    fn name(&self) -> &str {
        "echo"
    }

    fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> BuildResult<()> {
        ctx.log(self.level, self.message.clone())
    }
}
