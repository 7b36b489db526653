//! High-level build interface
//!
//! [`BuildManager`] loads a build file once and answers everything the
//! command line asks of it: listing targets, planning and running builds,
//! the dependency graph.
//!
//! ## Example
//!
//! ```rust,no_run
//! use anthill_core::manager::{BuildManager, BuildManagerConfig};
//! use anthill_core::loggers::DefaultLogger;
//! use anthill_core::events::MessageLevel;
//!
//! # fn example() -> anthill_core::types::BuildResult<()> {
//! let mut manager = BuildManager::load(BuildManagerConfig {
//!     build_file: "build.yml".into(),
//!     ..BuildManagerConfig::default()
//! })?;
//!
//! let plan = manager.plan(&["dist".to_string()], false)?;
//! println!("{}", plan.order.join(", "));
//!
//! let outcome = manager.run(
//!     &["dist".to_string()],
//!     vec![Box::new(DefaultLogger::new(MessageLevel::Info))],
//! )?;
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anthill_test_protocol::read_properties;
use colored::Color;

use crate::configs::ProjectConfig;
use crate::events::{BuildListener, EventBus};
use crate::execution::{resolve, validate_all, BuildOutcome, TargetRunner, TargetRunnerConfig};
use crate::graph::build_target_graph;
use crate::loader::load_project;
use crate::project::Project;
use crate::results::{BuildPlanResult, DependencyGraphResult, TargetInfo, TargetListResult};
use crate::tasks::get_target_color;
use crate::types::{BuildError, BuildResult};

/// Configuration for loading a build
#[derive(Debug, Clone)]
pub struct BuildManagerConfig {
    pub build_file: PathBuf,
    /// `-D` properties; they win over property files
    pub user_properties: BTreeMap<String, String>,
    pub property_files: Vec<PathBuf>,
    pub keep_going: bool,
}

impl Default for BuildManagerConfig {
    fn default() -> Self {
        Self {
            build_file: PathBuf::from("build.yml"),
            user_properties: BTreeMap::new(),
            property_files: Vec::new(),
            keep_going: false,
        }
    }
}

pub struct BuildManager {
    project: Project,
    config: BuildManagerConfig,
}

impl BuildManager {
    pub fn load(config: BuildManagerConfig) -> BuildResult<Self> {
        let mut user_properties = config.user_properties.clone();
        for file in &config.property_files {
            let loaded = read_properties(file).map_err(|e| {
                BuildError::Config(format!("Could not load property file: {}", e))
            })?;
            for (name, value) in loaded {
                user_properties.entry(name).or_insert(value);
            }
        }

        if !config.build_file.is_file() {
            return Err(BuildError::Config(format!(
                "Buildfile: {} does not exist!",
                config.build_file.display()
            )));
        }
        let project = load_project(&config.build_file, &user_properties)?;
        tracing::debug!(
            project = project.name(),
            targets = project.targets().len(),
            "build file loaded"
        );
        Ok(Self { project, config })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Targets of the project, described ones first
    pub fn list_targets(&self, include_internal: bool) -> BuildResult<TargetListResult> {
        let default_target = self.project.default_target().map(str::to_string);
        let mut main_targets = Vec::new();
        let mut other_targets = Vec::new();

        for target in self.project.targets().iter() {
            let info = TargetInfo {
                name: target.name().to_string(),
                description: target.description().map(str::to_string),
                depends: target.depends().to_vec(),
                is_default: default_target.as_deref() == Some(target.name()),
            };
            if !target.is_internal() {
                main_targets.push(info);
            } else if include_internal {
                other_targets.push(info);
            }
        }
        main_targets.sort_by(|a, b| a.name.cmp(&b.name));
        other_targets.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(TargetListResult {
            project_name: self.project.name().to_string(),
            description: self.project.description().map(str::to_string),
            build_file: self.config.build_file.clone(),
            default_target,
            main_targets,
            other_targets,
            target_colors: self.target_colors(),
        })
    }

    /// Execution order for `targets`; `strict` also checks targets the
    /// build would not reach
    pub fn plan(&self, targets: &[String], strict: bool) -> BuildResult<BuildPlanResult> {
        if strict {
            validate_all(&self.project)?;
        }
        let order = resolve(&self.project, targets)?;
        Ok(BuildPlanResult {
            requested: targets.to_vec(),
            order,
            target_colors: self.target_colors(),
        })
    }

    pub fn dependency_graph(&self) -> BuildResult<DependencyGraphResult> {
        Ok(DependencyGraphResult {
            graph: build_target_graph(&self.project)?,
            target_colors: self.target_colors(),
        })
    }

    /// Run a build with the given listeners attached
    pub fn run(
        &mut self,
        targets: &[String],
        listeners: Vec<Box<dyn BuildListener>>,
    ) -> BuildResult<BuildOutcome> {
        let mut bus = EventBus::new();
        for listener in listeners {
            bus.add_listener(listener);
        }
        let config = TargetRunnerConfig {
            keep_going: self.config.keep_going,
        };
        TargetRunner::with_config(&mut bus, config).run_build(&mut self.project, targets)
    }

    fn target_colors(&self) -> HashMap<String, Color> {
        self.project
            .targets()
            .iter()
            .map(|t| (t.name().to_string(), get_target_color(t.name())))
            .collect()
    }
}

/// JSON schema of the build file format
pub fn build_file_schema() -> BuildResult<String> {
    let schema = schemars::schema_for!(ProjectConfig);
    serde_json::to_string_pretty(&schema)
        .map_err(|e| BuildError::Config(format!("Failed to render schema: {}", e)))
}
