//! The unit of work inside a target

use std::path::Path;

use crate::events::{EventBus, EventSource, MessageLevel};
use crate::properties::PropertyTable;
use crate::types::{BuildResult, Location};

/// A configured action of a target.
///
/// Returning an error fails the enclosing target. Any error other than
/// [`crate::BuildError::Listener`] is converted into a task failure
/// carrying [`Task::location`].
pub trait Task {
    /// Name shown in log prefixes, e.g. `echo`
    fn name(&self) -> &str;

    fn location(&self) -> Option<&Location> {
        None
    }

    fn execute(&self, ctx: &mut TaskContext<'_>) -> BuildResult<()>;
}

/// What a task sees of the running build
pub struct TaskContext<'a> {
    pub(crate) project_name: &'a str,
    pub(crate) basedir: &'a Path,
    pub(crate) target: &'a str,
    pub(crate) task: &'a str,
    pub(crate) properties: &'a mut PropertyTable,
    pub(crate) bus: &'a mut EventBus,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        project_name: &'a str,
        basedir: &'a Path,
        target: &'a str,
        task: &'a str,
        properties: &'a mut PropertyTable,
        bus: &'a mut EventBus,
    ) -> Self {
        Self {
            project_name,
            basedir,
            target,
            task,
            properties,
            bus,
        }
    }

    pub fn project_name(&self) -> &str {
        self.project_name
    }

    pub fn basedir(&self) -> &Path {
        self.basedir
    }

    pub fn target(&self) -> &str {
        self.target
    }

    pub fn properties(&self) -> &PropertyTable {
        self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyTable {
        self.properties
    }

    /// Resolve `path` against the project base directory
    pub fn resolve_path(&self, path: &str) -> std::path::PathBuf {
        self.basedir.join(path)
    }

    /// Log a message attributed to the running task
    pub fn log(&mut self, level: MessageLevel, message: impl Into<String>) -> BuildResult<()> {
        let source = EventSource::Task {
            target: self.target.to_string(),
            task: self.task.to_string(),
        };
        self.bus.fire_message_logged(source, message.into(), level)
    }
}
