//! Ready-made build listeners
//!
//! - [`DefaultLogger`] prints the classic console transcript
//! - [`TracingListener`] forwards events to `tracing`
//! - [`RecordingListener`] keeps every event in memory

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use colored::*;

use crate::events::{BuildEvent, BuildListener, EventSource, MessageLevel};
use crate::tasks::get_target_color;

/// Width of the `[task]` column in front of task messages
const LEFT_COLUMN_SIZE: usize = 12;

/// Console logger.
///
/// Task messages are prefixed with the right-aligned task name, error
/// messages go to the error stream, and the build ends with a
/// `BUILD SUCCESSFUL` / `BUILD FAILED` banner plus the elapsed time.
pub struct DefaultLogger {
    out: Box<dyn Write>,
    err: Box<dyn Write>,
    level: MessageLevel,
    use_color: bool,
    started: Option<Instant>,
}

impl DefaultLogger {
    /// Log to stdout / stderr
    pub fn new(level: MessageLevel) -> Self {
        Self::with_writers(level, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn with_writers(level: MessageLevel, out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            out,
            err,
            level,
            use_color: false,
            started: None,
        }
    }

    #[must_use]
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> String {
        if !self.use_color {
            return text.to_string();
        }
        let painted = text.color(color);
        if bold {
            painted.bold().to_string()
        } else {
            painted.to_string()
        }
    }
}

impl BuildListener for DefaultLogger {
    fn build_started(&mut self, _event: &BuildEvent) -> anyhow::Result<()> {
        self.started = Some(Instant::now());
        Ok(())
    }

    fn build_finished(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        match &event.failure {
            None => {
                let banner = self.paint("BUILD SUCCESSFUL", Color::Green, true);
                writeln!(self.out, "\n{}", banner)?;
            }
            Some(failure) => {
                let banner = self.paint("BUILD FAILED", Color::Red, true);
                writeln!(self.err, "\n{}\n{}", banner, failure)?;
            }
        }
        let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
        writeln!(self.out, "\nTotal time: {}", format_elapsed(elapsed))?;
        self.out.flush()?;
        self.err.flush()?;
        Ok(())
    }

    fn target_started(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        if !MessageLevel::Info.is_visible_at(self.level) {
            return Ok(());
        }
        if let Some(name) = event.source.target_name().filter(|n| !n.is_empty()) {
            let header = self.paint(&format!("{}:", name), get_target_color(name), true);
            writeln!(self.out, "\n{}", header)?;
        }
        Ok(())
    }

    fn message_logged(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        if !event.level.is_visible_at(self.level) {
            return Ok(());
        }
        let message = event.message.as_deref().unwrap_or_default();
        let text = match &event.source {
            EventSource::Task { task, .. } => {
                let label = format!("{:>width$} ", format!("[{}]", task), width = LEFT_COLUMN_SIZE);
                prefix_lines(&label, message)
            }
            _ => message.to_string(),
        };
        let text = match event.level {
            MessageLevel::Error => self.paint(&text, Color::Red, false),
            MessageLevel::Warn => self.paint(&text, Color::Yellow, false),
            _ => text,
        };
        if event.level == MessageLevel::Error {
            writeln!(self.err, "{}", text)?;
        } else {
            writeln!(self.out, "{}", text)?;
        }
        Ok(())
    }
}

fn prefix_lines(label: &str, message: &str) -> String {
    if message.is_empty() {
        return label.trim_end().to_string();
    }
    message
        .lines()
        .map(|line| format!("{}{}", label, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `1 second`, `42 seconds`, `2 minutes 5 seconds`
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    let plural = |n: u64, unit: &str| {
        if n == 1 {
            format!("{} {}", n, unit)
        } else {
            format!("{} {}s", n, unit)
        }
    };
    if minutes > 0 {
        format!("{} {}", plural(minutes, "minute"), plural(seconds, "second"))
    } else {
        plural(seconds, "second")
    }
}

/// Forwards build events to `tracing`, mapping message levels to tracing levels
#[derive(Debug, Default)]
pub struct TracingListener;

impl BuildListener for TracingListener {
    fn build_started(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        if let EventSource::Build { project } = &event.source {
            tracing::info!(project = %project, "build started");
        }
        Ok(())
    }

    fn build_finished(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        match &event.failure {
            Some(failure) => tracing::error!(error = %failure, "build failed"),
            None => tracing::info!("build finished"),
        }
        Ok(())
    }

    fn target_started(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        tracing::debug!(target_name = event.source.target_name(), "target started");
        Ok(())
    }

    fn target_finished(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        let target_name = event.source.target_name();
        match &event.failure {
            Some(failure) => tracing::warn!(target_name, error = %failure, "target failed"),
            None => tracing::debug!(target_name, "target finished"),
        }
        Ok(())
    }

    fn task_started(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        tracing::trace!(
            target_name = event.source.target_name(),
            task = event.source.task_name(),
            "task started"
        );
        Ok(())
    }

    fn task_finished(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        tracing::trace!(
            target_name = event.source.target_name(),
            task = event.source.task_name(),
            failed = event.failure.is_some(),
            "task finished"
        );
        Ok(())
    }

    fn message_logged(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        let message = event.message.as_deref().unwrap_or_default();
        let task = event.source.task_name();
        match event.level {
            MessageLevel::Error => tracing::error!(task, "{}", message),
            MessageLevel::Warn => tracing::warn!(task, "{}", message),
            MessageLevel::Info => tracing::info!(task, "{}", message),
            MessageLevel::Verbose => tracing::debug!(task, "{}", message),
            MessageLevel::Debug => tracing::trace!(task, "{}", message),
        }
        Ok(())
    }
}

/// One delivered event and the callback it arrived through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub kind: &'static str,
    pub event: BuildEvent,
}

/// Shared view of what a [`RecordingListener`] received
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<RecordedEvent>>>);

impl EventLog {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.0.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.0.borrow().iter().map(|r| r.kind).collect()
    }

    /// Logged message texts, in order
    pub fn messages(&self) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter_map(|r| r.event.message.clone())
            .collect()
    }

    /// Names of targets that fired `target_started`, in order
    pub fn started_targets(&self) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter(|r| r.kind == "target_started")
            .filter_map(|r| r.event.source.target_name().map(str::to_string))
            .collect()
    }

    fn push(&self, kind: &'static str, event: &BuildEvent) {
        self.0.borrow_mut().push(RecordedEvent {
            kind,
            event: event.clone(),
        });
    }
}

/// Keeps every event; useful for tests and for post-build reports
#[derive(Debug, Default)]
pub struct RecordingListener {
    log: EventLog,
}

impl RecordingListener {
    pub fn new() -> (Self, EventLog) {
        let log = EventLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl BuildListener for RecordingListener {
    fn build_started(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        self.log.push("build_started", event);
        Ok(())
    }

    fn build_finished(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        self.log.push("build_finished", event);
        Ok(())
    }

    fn target_started(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        self.log.push("target_started", event);
        Ok(())
    }

    fn target_finished(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        self.log.push("target_finished", event);
        Ok(())
    }

    fn task_started(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        self.log.push("task_started", event);
        Ok(())
    }

    fn task_finished(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        self.log.push("task_finished", event);
        Ok(())
    }

    fn message_logged(&mut self, event: &BuildEvent) -> anyhow::Result<()> {
        self.log.push("message_logged", event);
        Ok(())
    }
}
