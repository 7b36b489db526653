//! Anthill Core Library
//!
//! The engine of the anthill build tool: a project model of named targets,
//! dependency resolution, target execution with build events, built-in
//! tasks and a JUnit-style test task that can fork its test runs.
//!
//! ## Architecture
//!
//! - [`manager`] - High-level interface used by the command line
//! - [`loader`] - Build file loading, imports included
//! - [`project`], [`target`], [`task`], [`properties`] - The project model
//! - [`execution`] - Dependency resolution and the target runner
//! - [`events`] - Synchronous build event bus and listener trait
//! - [`loggers`] - Console, tracing and recording listeners
//! - [`graph`] - Whole-project dependency graph
//! - [`tasks`] - Built-in tasks and task instantiation
//! - [`junit`] - The `junit` task, result formatters and the forked runner
//! - [`configs`] - YAML configuration types
//! - [`results`] - Result types for manager operations
//! - [`types`] - Error types and type aliases
//!
//! ## Usage
//!
//! ```rust,no_run
//! use anthill_core::{BuildManager, BuildManagerConfig};
//!
//! # fn example() -> anthill_core::BuildResult<()> {
//! let manager = BuildManager::load(BuildManagerConfig::default())?;
//! for target in manager.list_targets(false)?.main_targets {
//!     println!("{}", target.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod configs;
pub mod events;
pub mod execution;
pub mod graph;
pub mod junit;
pub mod loader;
pub mod loggers;
pub mod manager;
pub mod project;
pub mod properties;
pub mod results;
pub mod target;
pub mod task;
pub mod tasks;
pub mod types;

pub use events::{BuildEvent, BuildListener, EventBus, EventSource, MessageLevel};
pub use manager::{BuildManager, BuildManagerConfig};
pub use project::Project;
pub use target::Target;
pub use task::{Task, TaskContext};
pub use types::{BuildError, BuildFailure, BuildResult, Location};
