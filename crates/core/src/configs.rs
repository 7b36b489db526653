//! Configuration parsing for build files, tasks and test suites
//!
//! Everything here is plain serde data; turning it into runnable objects is
//! the job of [`crate::loader`].

pub mod project;
pub mod suite;
pub mod tasks;

pub use project::{parse_project_config, ProjectConfig, TargetConfig};
pub use suite::{parse_suite_config, SuiteConfig};
pub use tasks::{parse_task_config, Command, TaskConfig};
