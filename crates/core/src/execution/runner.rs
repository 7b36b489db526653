//! Target execution
//!
//! Runs an ordered list of targets, each at most once per
//! [`ExecutionState`]. A target runs only when all of its direct
//! dependencies succeeded (a target skipped by its own condition counts as
//! succeeded). In fail-fast mode the first failure stops the build; in
//! keep-going mode independent targets continue and every failure is
//! collected.

use std::collections::HashMap;
use std::path::Path;

use crate::events::{EventBus, EventSource, MessageLevel};
use crate::execution::dependencies::resolve;
use crate::project::Project;
use crate::properties::{names, PropertyTable};
use crate::target::Target;
use crate::task::TaskContext;
use crate::types::{BuildError, BuildFailure, BuildResult, TargetFailure};

/// What happened to a target in this build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Succeeded,
    /// Its `if` / `unless` guard prevented it from running
    ConditionSkipped,
    Failed,
    /// Not run because a dependency failed or never ran
    DependencyFailed,
}

impl TargetStatus {
    /// Whether dependents of a target with this status may run
    pub fn allows_dependents(self) -> bool {
        matches!(self, Self::Succeeded | Self::ConditionSkipped)
    }
}

/// Targets already dealt with. Shared across calls so that a target runs
/// at most once per build even when requested several times.
#[derive(Debug, Default)]
pub struct ExecutionState {
    statuses: HashMap<String, TargetStatus>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, target: &str) -> Option<TargetStatus> {
        self.statuses.get(target).copied()
    }

    pub fn is_done(&self, target: &str) -> bool {
        self.statuses.contains_key(target)
    }

    fn record(&mut self, target: &str, status: TargetStatus) {
        self.statuses.insert(target.to_string(), status);
    }
}

/// A target left out because of a dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTarget {
    pub target: String,
    pub failed_dependency: String,
}

/// Everything a build did, in execution order
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub succeeded: Vec<String>,
    pub condition_skipped: Vec<String>,
    pub dependency_skipped: Vec<SkippedTarget>,
    pub failures: Vec<TargetFailure>,
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The aggregated failure, if any target failed
    pub fn error(&self) -> Option<BuildError> {
        if self.failures.is_empty() {
            None
        } else {
            Some(BuildError::BuildFailed {
                failures: self.failures.clone(),
            })
        }
    }

    pub fn into_result(self) -> BuildResult<Self> {
        match self.error() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}

/// Configuration for the target runner
#[derive(Debug, Default, Clone, Copy)]
pub struct TargetRunnerConfig {
    /// Continue with independent targets after a failure
    pub keep_going: bool,
}

enum TargetRun {
    Completed,
    Skipped,
    Failed(BuildFailure),
}

/// Executes targets of a project, reporting progress on an event bus
pub struct TargetRunner<'a> {
    bus: &'a mut EventBus,
    config: TargetRunnerConfig,
}

impl<'a> TargetRunner<'a> {
    pub fn new(bus: &'a mut EventBus) -> Self {
        Self::with_config(bus, TargetRunnerConfig::default())
    }

    pub fn with_config(bus: &'a mut EventBus, config: TargetRunnerConfig) -> Self {
        Self { bus, config }
    }

    /// Resolve `requested` and execute the result, wrapped in build
    /// started / finished events.
    ///
    /// Configuration problems (unknown targets, cycles) and listener errors
    /// come back as `Err`. Task failures are reported in the outcome.
    pub fn run_build(
        &mut self,
        project: &mut Project,
        requested: &[String],
    ) -> BuildResult<BuildOutcome> {
        let project_name = project.name().to_string();
        self.bus.fire_build_started(&project_name)?;

        let result = resolve(project, requested).and_then(|order| {
            project
                .properties_mut()
                .set_user_property(names::PROJECT_INVOKED_TARGETS, &requested.join(","));
            let mut state = ExecutionState::new();
            self.execute_targets(project, &order, &mut state)
        });

        match result {
            Ok(outcome) => {
                let failure = outcome.error().map(|e| BuildFailure::new(e.to_string()));
                self.bus.fire_build_finished(&project_name, failure)?;
                Ok(outcome)
            }
            Err(BuildError::Listener(e)) => Err(BuildError::Listener(e)),
            Err(error) => {
                let failure = BuildFailure::new(error.to_string());
                self.bus.fire_build_finished(&project_name, Some(failure))?;
                Err(error)
            }
        }
    }

    /// Execute targets in the given order, skipping any `state` already records.
    pub fn execute_targets(
        &mut self,
        project: &mut Project,
        ordered: &[String],
        state: &mut ExecutionState,
    ) -> BuildResult<BuildOutcome> {
        let mut outcome = BuildOutcome::default();
        let (project_name, basedir, targets, properties) = project.execution_parts();

        for name in ordered {
            if state.is_done(name) {
                continue;
            }
            let target = targets.get(name).ok_or_else(|| BuildError::UnknownTarget {
                name: name.clone(),
                project: project_name.to_string(),
                referenced_from: None,
            })?;

            let blocked_by = target
                .depends()
                .iter()
                .find(|dep| !state.status(dep).is_some_and(TargetStatus::allows_dependents));
            if let Some(dependency) = blocked_by {
                self.bus.fire_message_logged(
                    EventSource::Target {
                        target: name.clone(),
                    },
                    format!(
                        "Cannot execute '{}' - '{}' failed or was not executed.",
                        name, dependency
                    ),
                    MessageLevel::Error,
                )?;
                state.record(name, TargetStatus::DependencyFailed);
                outcome.dependency_skipped.push(SkippedTarget {
                    target: name.clone(),
                    failed_dependency: dependency.clone(),
                });
                continue;
            }

            let run = {
                let mut parts = ExecutionParts {
                    project_name,
                    basedir,
                    properties: &mut *properties,
                };
                self.execute_target(target, &mut parts)?
            };

            match run {
                TargetRun::Completed => {
                    state.record(name, TargetStatus::Succeeded);
                    outcome.succeeded.push(name.clone());
                }
                TargetRun::Skipped => {
                    state.record(name, TargetStatus::ConditionSkipped);
                    outcome.condition_skipped.push(name.clone());
                }
                TargetRun::Failed(failure) => {
                    state.record(name, TargetStatus::Failed);
                    outcome.failures.push(TargetFailure {
                        target: name.clone(),
                        failure: failure.clone(),
                    });
                    if !self.config.keep_going {
                        break;
                    }
                    self.bus.fire_message_logged(
                        EventSource::Target {
                            target: name.clone(),
                        },
                        format!(
                            "Target '{}' failed with message '{}'.",
                            name, failure.message
                        ),
                        MessageLevel::Error,
                    )?;
                }
            }
        }

        Ok(outcome)
    }

    fn execute_target(
        &mut self,
        target: &Target,
        parts: &mut ExecutionParts<'_>,
    ) -> BuildResult<TargetRun> {
        let name = target.name();
        self.bus.fire_target_started(name)?;

        if let Some(reason) = target.skip_reason(parts.properties) {
            self.bus.fire_message_logged(
                EventSource::Target {
                    target: name.to_string(),
                },
                reason,
                MessageLevel::Verbose,
            )?;
            self.bus.fire_target_finished(name, None)?;
            return Ok(TargetRun::Skipped);
        }

        let mut failure = None;
        for task in target.tasks() {
            self.bus.fire_task_started(name, task.name())?;
            let result = {
                let mut ctx = TaskContext::new(
                    parts.project_name,
                    parts.basedir,
                    name,
                    task.name(),
                    &mut *parts.properties,
                    &mut *self.bus,
                );
                task.execute(&mut ctx)
            };
            match result {
                Ok(()) => self.bus.fire_task_finished(name, task.name(), None)?,
                Err(BuildError::Listener(e)) => return Err(BuildError::Listener(e)),
                Err(error) => {
                    let task_failure = error.into_failure(task.location());
                    self.bus
                        .fire_task_finished(name, task.name(), Some(&task_failure))?;
                    failure = Some(task_failure);
                    break;
                }
            }
        }

        self.bus.fire_target_finished(name, failure.as_ref())?;
        Ok(match failure {
            Some(failure) => TargetRun::Failed(failure),
            None => TargetRun::Completed,
        })
    }
}

struct ExecutionParts<'p> {
    project_name: &'p str,
    basedir: &'p Path,
    properties: &'p mut PropertyTable,
}
