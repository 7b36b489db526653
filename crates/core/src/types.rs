use std::fmt;
use std::path::PathBuf;

use anthill_test_protocol::ProtocolError;
use thiserror::Error;

/// Position of a construct in a build file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:", self.file.display(), self.line)?;
        if self.column > 0 {
            write!(f, "{}:", self.column)?;
        }
        Ok(())
    }
}

/// A task failure: a message plus, when known, where the failing task is declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub message: String,
    pub location: Option<Location>,
}

impl BuildFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn at(message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }

    /// Attach a location unless one is already present
    #[must_use]
    pub fn or_location(mut self, location: Option<&Location>) -> Self {
        if self.location.is_none() {
            self.location = location.cloned();
        }
        self
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} {}", location, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A target that failed during a build, with the failure that stopped it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub target: String,
    pub failure: BuildFailure,
}

/// The main error type for build operations
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{}", unknown_target_message(.name, .project, .referenced_from))]
    UnknownTarget {
        name: String,
        project: String,
        referenced_from: Option<String>,
    },

    #[error("Duplicate target: `{0}'")]
    DuplicateTarget(String),

    #[error("Circular dependency: {}", cycle_message(.cycle))]
    CircularDependency { cycle: Vec<String> },

    #[error("Malformed {kind} condition '{condition}' on target '{target}'")]
    MalformedCondition {
        target: String,
        kind: &'static str,
        condition: String,
    },

    #[error("{0}")]
    Failure(BuildFailure),

    #[error("{}", failures_message(.failures))]
    BuildFailed { failures: Vec<TargetFailure> },

    #[error("Build listener failed: {0}")]
    Listener(#[source] anyhow::Error),

    #[error("Result formatter failed: {0}")]
    Formatter(#[source] anyhow::Error),

    #[error("Test protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl BuildError {
    /// Shorthand for a task failure without location
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(BuildFailure::new(message))
    }

    /// True for errors detected before any task runs
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnknownTarget { .. }
                | Self::DuplicateTarget(_)
                | Self::CircularDependency { .. }
                | Self::MalformedCondition { .. }
                | Self::Yaml(_)
        )
    }

    /// Convert into the failure reported for a task. Keeps the original
    /// location of a [`BuildError::Failure`], falls back to `location` otherwise.
    #[must_use]
    pub fn into_failure(self, location: Option<&Location>) -> BuildFailure {
        match self {
            Self::Failure(failure) => failure.or_location(location),
            other => BuildFailure::at(other.to_string(), location.cloned()),
        }
    }
}

impl From<BuildFailure> for BuildError {
    fn from(failure: BuildFailure) -> Self {
        Self::Failure(failure)
    }
}

fn unknown_target_message(name: &str, project: &str, referenced_from: &Option<String>) -> String {
    let mut message = format!(
        "Target \"{}\" does not exist in the project \"{}\". ",
        name, project
    );
    if let Some(parent) = referenced_from {
        message.push_str(&format!("It is used from target \"{}\".", parent));
    }
    message.trim_end().to_string()
}

// The cycle is stored in dependency order (a depends on b depends on a);
// it is reported walking back from the repeated node.
fn cycle_message(cycle: &[String]) -> String {
    cycle
        .iter()
        .rev()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" <- ")
}

fn failures_message(failures: &[TargetFailure]) -> String {
    match failures {
        [] => "Build failed".to_string(),
        [single] => single.failure.to_string(),
        many => {
            let mut message = format!("{} targets failed:", many.len());
            for failure in many {
                message.push_str(&format!("\n  {}: {}", failure.target, failure.failure));
            }
            message
        }
    }
}

/// Result type alias for build operations
pub type BuildResult<T> = Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_walks_back_from_repeated_target() {
        let error = BuildError::CircularDependency {
            cycle: vec!["a".into(), "b".into(), "c".into(), "a".into()],
        };
        assert_eq!(error.to_string(), "Circular dependency: a <- c <- b <- a");
    }

    #[test]
    fn test_unknown_target_message() {
        let error = BuildError::UnknownTarget {
            name: "dist".into(),
            project: "demo".into(),
            referenced_from: Some("release".into()),
        };
        assert_eq!(
            error.to_string(),
            "Target \"dist\" does not exist in the project \"demo\". It is used from target \"release\"."
        );

        let error = BuildError::UnknownTarget {
            name: "dist".into(),
            project: "demo".into(),
            referenced_from: None,
        };
        assert_eq!(
            error.to_string(),
            "Target \"dist\" does not exist in the project \"demo\"."
        );
    }

    #[test]
    fn test_failure_location_is_preserved() {
        let declared = Location::new("build.yml", 4, 0);
        let failure = BuildError::Failure(BuildFailure::at(
            "boom",
            Some(Location::new("other.yml", 9, 0)),
        ))
        .into_failure(Some(&declared));
        assert_eq!(failure.to_string(), "other.yml:9: boom");

        let failure = BuildError::Config("bad".into()).into_failure(Some(&declared));
        assert_eq!(failure.to_string(), "build.yml:4: Configuration error: bad");
    }

    #[test]
    fn test_aggregated_failures() {
        let error = BuildError::BuildFailed {
            failures: vec![
                TargetFailure {
                    target: "a".into(),
                    failure: BuildFailure::new("first"),
                },
                TargetFailure {
                    target: "c".into(),
                    failure: BuildFailure::new("second"),
                },
            ],
        };
        assert_eq!(error.to_string(), "2 targets failed:\n  a: first\n  c: second");
    }
}
