use std::collections::BTreeMap;

use anthill_test_protocol::read_properties;

use crate::configs::tasks::PropertyConfig;
use crate::events::MessageLevel;
use crate::properties::PropertyChange;
use crate::task::{Task, TaskContext};
use crate::types::{BuildError, BuildResult, Location};

/// Defines properties, either one `name`/`value` pair or every entry of a file.
///
/// Properties are immutable: an existing definition always wins.
#[derive(Debug)]
pub struct PropertyTask {
    config: PropertyConfig,
    location: Option<Location>,
}

impl PropertyTask {
    pub fn new(config: PropertyConfig, location: Option<Location>) -> BuildResult<Self> {
        match (&config.name, &config.value, &config.file) {
            (Some(_), Some(_), None) | (None, None, Some(_)) => Ok(Self { config, location }),
            (Some(_), None, None) => Err(BuildError::Config(
                "You must specify value with the name attribute".to_string(),
            )),
            (None, None, None) => Err(BuildError::Config(
                "You must specify name or file".to_string(),
            )),
            _ => Err(BuildError::Config(
                "Use either name and value or file, not both".to_string(),
            )),
        }
    }

    fn define(ctx: &mut TaskContext<'_>, name: &str, value: &str) -> BuildResult<()> {
        match ctx.properties_mut().set_new_property(name, value) {
            PropertyChange::Set => {
                ctx.log(MessageLevel::Debug, format!("Setting property {} = {}", name, value))
            }
            PropertyChange::AlreadySet | PropertyChange::ShadowedByUser => {
                ctx.log(MessageLevel::Verbose, format!("Override ignored for property \"{}\"", name))
            }
        }
    }

    fn load_file(&self, ctx: &mut TaskContext<'_>, file: &str) -> BuildResult<BTreeMap<String, String>> {
        let path = ctx.resolve_path(file);
        if !path.exists() {
            ctx.log(
                MessageLevel::Verbose,
                format!("Unable to find property file: {}", path.display()),
            )?;
            return Ok(BTreeMap::new());
        }
        ctx.log(MessageLevel::Verbose, format!("Loading {}", path.display()))?;
        Ok(read_properties(&path)?)
    }
}

impl Task for PropertyTask {
    fn name(&self) -> &str {
        "property"
    }

    fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> BuildResult<()> {
        if let (Some(name), Some(value)) = (&self.config.name, &self.config.value) {
            return Self::define(ctx, name, value);
        }
        if let Some(file) = &self.config.file {
            let loaded = self.load_file(ctx, file)?;
            let prefix = match self.config.prefix.as_deref() {
                Some(prefix) if !prefix.ends_with('.') => format!("{}.", prefix),
                Some(prefix) => prefix.to_string(),
                None => String::new(),
            };
            for (name, value) in loaded {
                Self::define(ctx, &format!("{}{}", prefix, name), &value)?;
            }
        }
        Ok(())
    }
}
