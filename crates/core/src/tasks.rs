//! Built-in tasks and target color management
//!
//! [`create_task`] turns a task configuration into a runnable [`Task`].

pub mod echo;
pub mod exec;
pub mod fail;
pub mod property;

use colored::*;

use crate::configs::tasks::TaskConfig;
use crate::junit::JUnitTask;
use crate::task::Task;
use crate::types::{BuildResult, Location};

pub use echo::EchoTask;
pub use exec::ExecTask;
pub use fail::FailTask;
pub use property::PropertyTask;

/// Stable header color for a target, so the same target always reads the same
pub fn get_target_color(target_name: &str) -> Color {
    let hash = target_name
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));

    // Kept clear of the red/yellow/green used for errors, warnings and banners
    const PALETTE: [(u8, u8, u8); 6] = [
        (147, 112, 219),
        (64, 224, 208),
        (255, 140, 0),
        (199, 21, 133),
        (72, 209, 204),
        (138, 43, 226),
    ];

    let (r, g, b) = PALETTE[(hash % PALETTE.len() as u64) as usize];
    Color::TrueColor { r, g, b }
}

/// Instantiate the task described by `config`
pub fn create_task(
    target: &str,
    config: &TaskConfig,
    location: Option<Location>,
) -> BuildResult<Box<dyn Task>> {
    let task: Box<dyn Task> = match config {
        TaskConfig::Echo(echo) => Box::new(EchoTask::new(echo, location)?),
        TaskConfig::Exec(exec) => Box::new(ExecTask::new(exec.clone(), location)),
        TaskConfig::Property(property) => Box::new(PropertyTask::new(property.clone(), location)?),
        TaskConfig::Fail(fail) => Box::new(FailTask::new(target, fail, location)?),
        TaskConfig::Junit(junit) => Box::new(JUnitTask::new(target, junit.clone(), location)?),
    };
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::tasks::parse_task_config;
    use crate::events::{EventBus, MessageLevel};
    use crate::loggers::{EventLog, RecordingListener};
    use crate::properties::PropertyTable;
    use crate::task::TaskContext;

    #[test]
    fn test_target_color_is_stable() {
        assert_eq!(get_target_color("compile"), get_target_color("compile"));
    }

    #[test]
    fn test_create_task_uses_config_name() {
        let config = parse_task_config("echo:\n  message: hi\n").unwrap();
        let task = create_task("t", &config, Some(Location::new("build.yml", 3, 0))).unwrap();
        assert_eq!(task.name(), "echo");
        assert_eq!(task.location().unwrap().line, 3);
    }

    fn run(yaml: &str, properties: &mut PropertyTable) -> (BuildResult<()>, EventLog) {
        let dir = std::env::temp_dir();
        let config = parse_task_config(yaml).unwrap();
        let task = create_task("t", &config, Some(Location::new("build.yml", 5, 0))).unwrap();
        let (listener, log) = RecordingListener::new();
        let mut bus = EventBus::new();
        bus.add_listener(Box::new(listener));
        let mut ctx = TaskContext::new("demo", &dir, "t", task.name(), properties, &mut bus);
        let result = task.execute(&mut ctx);
        (result, log)
    }

    #[test]
    fn test_echo_level() {
        let mut properties = PropertyTable::new();
        let (result, log) = run("echo:\n  message: hi\n  level: info\n", &mut properties);
        result.unwrap();
        let events = log.events();
        let logged = events.last().unwrap();
        assert_eq!(logged.event.message.as_deref(), Some("hi"));
        assert_eq!(logged.event.level, MessageLevel::Info);
        assert_eq!(logged.event.source.task_name(), Some("echo"));

        let config = parse_task_config("echo:\n  message: hi\n  level: loud\n").unwrap();
        assert!(create_task("t", &config, None).is_err());
    }

    #[test]
    fn test_fail_respects_conditions() {
        let mut properties = PropertyTable::new();
        let yaml = "fail:\n  message: stop\n  unless: done\n";
        let (result, _) = run(yaml, &mut properties);
        assert_eq!(result.unwrap_err().to_string(), "build.yml:5: stop");

        properties.set_property("done", "true");
        let (result, _) = run(yaml, &mut properties);
        result.unwrap();

        let (result, _) = run("fail: {}\n", &mut properties);
        assert_eq!(result.unwrap_err().to_string(), "build.yml:5: No message");
    }

    #[test]
    fn test_property_is_immutable() {
        let mut properties = PropertyTable::new();
        let (result, _) = run("property:\n  name: v\n  value: one\n", &mut properties);
        result.unwrap();
        let (result, log) = run("property:\n  name: v\n  value: two\n", &mut properties);
        result.unwrap();
        assert_eq!(properties.get("v"), Some("one"));
        assert!(log
            .messages()
            .contains(&"Override ignored for property \"v\"".to_string()));

        let config = parse_task_config("property:\n  name: v\n").unwrap();
        assert!(create_task("t", &config, None).is_err());
    }

    #[test]
    fn test_property_file_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.properties");
        std::fs::write(&file, "version=3\n").unwrap();
        let mut properties = PropertyTable::new();
        let yaml = format!("property:\n  file: {}\n  prefix: app\n", file.display());
        let (result, _) = run(&yaml, &mut properties);
        result.unwrap();
        assert_eq!(properties.get("app.version"), Some("3"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_result_and_failonerror() {
        let mut properties = PropertyTable::new();
        let (result, log) = run(
            "exec:\n  command: \"echo out; exit 3\"\n  failonerror: false\n  resultProperty: rc\n",
            &mut properties,
        );
        result.unwrap();
        assert_eq!(properties.get("rc"), Some("3"));
        let messages = log.messages();
        assert!(messages.contains(&"out".to_string()));
        assert!(messages.contains(&"Result: 3".to_string()));

        let (result, _) = run("exec:\n  command: [\"false\"]\n", &mut properties);
        assert_eq!(result.unwrap_err().to_string(), "build.yml:5: exec returned: 1");
    }
}
