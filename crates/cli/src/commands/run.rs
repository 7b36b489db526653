use anthill_core::loggers::{DefaultLogger, TracingListener};
use anthill_core::{BuildError, BuildListener, BuildManager, MessageLevel};
use anyhow::Result;

pub fn execute(
    manager: &mut BuildManager,
    targets: &[String],
    level: MessageLevel,
    trace_events: bool,
) -> Result<()> {
    let use_color = colored::control::SHOULD_COLORIZE.should_colorize();
    let mut listeners: Vec<Box<dyn BuildListener>> =
        vec![Box::new(DefaultLogger::new(level).with_color(use_color))];
    if trace_events {
        listeners.push(Box::new(TracingListener));
    }

    match manager.run(targets, listeners) {
        Ok(outcome) if outcome.is_success() => Ok(()),
        // The logger has already reported the failure.
        Ok(_) => std::process::exit(1),
        Err(BuildError::Listener(e)) => Err(anyhow::anyhow!("Build listener failed: {}", e)),
        Err(_) => std::process::exit(1),
    }
}
