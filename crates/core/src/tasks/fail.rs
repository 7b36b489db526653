use crate::configs::tasks::FailConfig;
use crate::target::Condition;
use crate::task::{Task, TaskContext};
use crate::types::{BuildError, BuildFailure, BuildResult, Location};

/// Fails the build, optionally only when its conditions hold
#[derive(Debug)]
pub struct FailTask {
    message: String,
    if_condition: Option<Condition>,
    unless_condition: Option<Condition>,
    location: Option<Location>,
}

impl FailTask {
    pub fn new(target: &str, config: &FailConfig, location: Option<Location>) -> BuildResult<Self> {
        let parse = |kind, raw: &Option<String>| match raw {
            Some(raw) => Condition::parse(target, kind, raw),
            None => Ok(None),
        };
        Ok(Self {
            message: config
                .message
                .clone()
                .unwrap_or_else(|| "No message".to_string()),
            if_condition: parse("if", &config.if_property)?,
            unless_condition: parse("unless", &config.unless_property)?,
            location,
        })
    }
}

impl Task for FailTask {
    fn name(&self) -> &str {
        "fail"
    }

    fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> BuildResult<()> {
        let properties = ctx.properties();
        let if_holds = self
            .if_condition
            .as_ref()
            .map_or(true, |c| c.holds(properties));
        let unless_holds = self
            .unless_condition
            .as_ref()
            .map_or(false, |c| c.holds(properties));
        if if_holds && !unless_holds {
            return Err(BuildError::Failure(BuildFailure::at(
                self.message.clone(),
                self.location.clone(),
            )));
        }
        Ok(())
    }
}
