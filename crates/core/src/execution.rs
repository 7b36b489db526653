//! Target execution module
//!
//! Dependency resolution, the target runner and process spawning.

pub mod command;
pub mod dependencies;
pub mod runner;

pub use command::CommandExecutor;
pub use dependencies::{resolve, validate_all};
pub use runner::{
    BuildOutcome, ExecutionState, SkippedTarget, TargetRunner, TargetRunnerConfig, TargetStatus,
};
