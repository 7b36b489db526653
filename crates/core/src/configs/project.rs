use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::configs::tasks::TaskConfig;
use crate::types::BuildResult;

/// A build file
#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectConfig {
    pub name: Option<String>,
    /// Target run when none is requested
    pub default: Option<String>,
    pub description: Option<String>,
    /// Base directory, relative to the build file's directory
    pub basedir: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub imports: Vec<ImportConfig>,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// Another build file whose targets become part of this project
#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImportConfig {
    pub file: String,
    /// Prefix for the imported targets; defaults to the imported project's name
    #[serde(rename = "as")]
    pub prefix: Option<String>,
    /// Skip silently when the file does not exist
    #[serde(default)]
    pub optional: bool,
}

/// Dependency list, either `"a, b"` or `[a, b]`
#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(untagged)]
pub enum DependsConfig {
    List(Vec<String>),
    Text(String),
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetConfig {
    pub name: String,
    pub description: Option<String>,
    pub depends: Option<DependsConfig>,
    /// Property that must be set for the target to run
    #[serde(rename = "if")]
    pub if_property: Option<String>,
    /// Property that must not be set for the target to run
    #[serde(rename = "unless")]
    pub unless_property: Option<String>,
    /// Written as single-key maps, `- echo: { message: hi }`
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    #[schemars(with = "Vec<TaskConfig>")]
    pub tasks: Vec<TaskConfig>,
}

pub fn parse_project_config(yaml_str: &str) -> BuildResult<ProjectConfig> {
    let config: ProjectConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}
