use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::configs::tasks::Command;
use crate::types::BuildResult;

/// A test suite file: named cases, each a command whose exit status decides the outcome
#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SuiteConfig {
    pub description: Option<String>,
    #[serde(default)]
    pub cases: Vec<CaseConfig>,
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaseConfig {
    pub name: String,
    pub command: Command,
    /// Exit code that counts as a failure rather than an error
    #[serde(default = "default_failure_code")]
    pub failure_code: i32,
}

fn default_failure_code() -> i32 {
    1
}

pub fn parse_suite_config(yaml_str: &str) -> BuildResult<SuiteConfig> {
    let config: SuiteConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}
