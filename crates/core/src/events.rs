//! Build events and the synchronous listener bus
//!
//! Every lifecycle point of a build (build, target, task started and
//! finished, logged messages) is delivered to each registered
//! [`BuildListener`] in registration order, on the calling thread. A
//! listener returning an error stops delivery and the error propagates to
//! whatever fired the event.

use std::fmt;
use std::str::FromStr;

use crate::types::{BuildError, BuildFailure, BuildResult};

/// Message priority, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Verbose = 3,
    Debug = 4,
}

impl MessageLevel {
    /// Whether a message at this level passes a filter set to `threshold`
    pub fn is_visible_at(self, threshold: MessageLevel) -> bool {
        self <= threshold
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Error => "error",
            Self::Warn => "warning",
            Self::Info => "info",
            Self::Verbose => "verbose",
            Self::Debug => "debug",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for MessageLevel {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "verbose" => Ok(Self::Verbose),
            "debug" => Ok(Self::Debug),
            other => Err(BuildError::Config(format!("Unknown message level '{}'", other))),
        }
    }
}

/// Where an event originates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    Build { project: String },
    Target { target: String },
    Task { target: String, task: String },
}

impl EventSource {
    pub fn target_name(&self) -> Option<&str> {
        match self {
            Self::Build { .. } => None,
            Self::Target { target } | Self::Task { target, .. } => Some(target),
        }
    }

    pub fn task_name(&self) -> Option<&str> {
        match self {
            Self::Task { task, .. } => Some(task),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEvent {
    pub source: EventSource,
    pub message: Option<String>,
    pub level: MessageLevel,
    /// Set on a finished event when the build, target or task failed
    pub failure: Option<BuildFailure>,
}

impl BuildEvent {
    fn lifecycle(source: EventSource, failure: Option<BuildFailure>) -> Self {
        Self {
            source,
            message: None,
            level: MessageLevel::Info,
            failure,
        }
    }
}

/// Observer of build progress.
///
/// All methods default to doing nothing.
pub trait BuildListener {
    fn build_started(&mut self, _event: &BuildEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn build_finished(&mut self, _event: &BuildEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn target_started(&mut self, _event: &BuildEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn target_finished(&mut self, _event: &BuildEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn task_started(&mut self, _event: &BuildEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn task_finished(&mut self, _event: &BuildEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn message_logged(&mut self, _event: &BuildEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn BuildListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Box<dyn BuildListener>) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn fire_build_started(&mut self, project: &str) -> BuildResult<()> {
        let event = BuildEvent::lifecycle(
            EventSource::Build {
                project: project.to_string(),
            },
            None,
        );
        self.dispatch(&event, |l, e| l.build_started(e))
    }

    pub fn fire_build_finished(
        &mut self,
        project: &str,
        failure: Option<BuildFailure>,
    ) -> BuildResult<()> {
        let event = BuildEvent::lifecycle(
            EventSource::Build {
                project: project.to_string(),
            },
            failure,
        );
        self.dispatch(&event, |l, e| l.build_finished(e))
    }

    pub fn fire_target_started(&mut self, target: &str) -> BuildResult<()> {
        let event = BuildEvent::lifecycle(target_source(target), None);
        self.dispatch(&event, |l, e| l.target_started(e))
    }

    pub fn fire_target_finished(
        &mut self,
        target: &str,
        failure: Option<&BuildFailure>,
    ) -> BuildResult<()> {
        let event = BuildEvent::lifecycle(target_source(target), failure.cloned());
        self.dispatch(&event, |l, e| l.target_finished(e))
    }

    pub fn fire_task_started(&mut self, target: &str, task: &str) -> BuildResult<()> {
        let event = BuildEvent::lifecycle(task_source(target, task), None);
        self.dispatch(&event, |l, e| l.task_started(e))
    }

    pub fn fire_task_finished(
        &mut self,
        target: &str,
        task: &str,
        failure: Option<&BuildFailure>,
    ) -> BuildResult<()> {
        let event = BuildEvent::lifecycle(task_source(target, task), failure.cloned());
        self.dispatch(&event, |l, e| l.task_finished(e))
    }

    pub fn fire_message_logged(
        &mut self,
        source: EventSource,
        message: String,
        level: MessageLevel,
    ) -> BuildResult<()> {
        let event = BuildEvent {
            source,
            message: Some(message),
            level,
            failure: None,
        };
        self.dispatch(&event, |l, e| l.message_logged(e))
    }

    fn dispatch<F>(&mut self, event: &BuildEvent, mut deliver: F) -> BuildResult<()>
    where
        F: FnMut(&mut dyn BuildListener, &BuildEvent) -> anyhow::Result<()>,
    {
        for listener in &mut self.listeners {
            deliver(listener.as_mut(), event).map_err(BuildError::Listener)?;
        }
        Ok(())
    }
}

fn target_source(target: &str) -> EventSource {
    EventSource::Target {
        target: target.to_string(),
    }
}

fn task_source(target: &str, task: &str) -> EventSource {
    EventSource::Task {
        target: target.to_string(),
        task: task.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loggers::RecordingListener;

    struct FailingListener;

    impl BuildListener for FailingListener {
        fn target_started(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
            anyhow::bail!("cannot record {:?}", event.source.target_name())
        }
    }

    #[test]
    fn test_listeners_receive_events_in_registration_order() {
        let (first, first_log) = RecordingListener::new();
        let (second, second_log) = RecordingListener::new();
        let mut bus = EventBus::new();
        bus.add_listener(Box::new(first));
        bus.add_listener(Box::new(second));

        bus.fire_build_started("demo").unwrap();
        bus.fire_target_started("compile").unwrap();
        bus.fire_message_logged(
            EventSource::Task {
                target: "compile".into(),
                task: "echo".into(),
            },
            "hello".into(),
            MessageLevel::Info,
        )
        .unwrap();

        assert_eq!(
            first_log.kinds(),
            ["build_started", "target_started", "message_logged"]
        );
        assert_eq!(first_log.kinds(), second_log.kinds());
    }

    #[test]
    fn test_listener_error_propagates_and_stops_delivery() {
        let (after, after_log) = RecordingListener::new();
        let mut bus = EventBus::new();
        bus.add_listener(Box::new(FailingListener));
        bus.add_listener(Box::new(after));

        let err = bus.fire_target_started("compile").unwrap_err();
        assert!(matches!(err, BuildError::Listener(_)));
        assert!(err.to_string().contains("cannot record"));
        assert!(after_log.kinds().is_empty());
    }

    #[test]
    fn test_level_ordering_and_parsing() {
        assert!(MessageLevel::Error.is_visible_at(MessageLevel::Info));
        assert!(!MessageLevel::Verbose.is_visible_at(MessageLevel::Info));
        assert_eq!("warning".parse::<MessageLevel>().unwrap(), MessageLevel::Warn);
        assert!("loud".parse::<MessageLevel>().is_err());
    }
}
