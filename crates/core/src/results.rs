//! Result types for build manager operations
//!
//! Plain data handed to the command line front end for display.

use std::collections::HashMap;
use std::path::PathBuf;

use colored::Color;

use crate::graph::TargetGraph;

/// A target as shown by `anthill list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub name: String,
    pub description: Option<String>,
    pub depends: Vec<String>,
    pub is_default: bool,
}

/// Result of listing the targets of the build file
#[derive(Debug)]
pub struct TargetListResult {
    pub project_name: String,
    pub description: Option<String>,
    pub build_file: PathBuf,
    pub default_target: Option<String>,
    /// Targets with a description
    pub main_targets: Vec<TargetInfo>,
    /// Targets without one; only filled when internal targets were requested
    pub other_targets: Vec<TargetInfo>,
    pub target_colors: HashMap<String, Color>,
}

/// Result of resolving a build without running it
#[derive(Debug)]
pub struct BuildPlanResult {
    pub requested: Vec<String>,
    /// Targets in execution order
    pub order: Vec<String>,
    pub target_colors: HashMap<String, Color>,
}

/// Result of getting the dependency graph
#[derive(Debug)]
pub struct DependencyGraphResult {
    pub graph: TargetGraph,
    pub target_colors: HashMap<String, Color>,
}
