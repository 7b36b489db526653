//! Targets: named, dependency-ordered groups of tasks

use std::fmt;

use anthill_test_protocol::constants::to_boolean;

use crate::properties::PropertyTable;
use crate::task::Task;
use crate::types::{BuildError, BuildResult, Location};

/// An `if` / `unless` guard naming a property.
///
/// `name` tests whether the property is set. `${name}` tests the property's
/// value instead: `true`, `on` and `yes` hold, `false`, `off` and `no` do
/// not, and any other value is taken as the name of a property that must be set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    property: String,
    by_value: bool,
}

impl Condition {
    /// Parse a condition; blank input means no condition.
    pub fn parse(target: &str, kind: &'static str, raw: &str) -> BuildResult<Option<Self>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let malformed = || BuildError::MalformedCondition {
            target: target.to_string(),
            kind,
            condition: raw.to_string(),
        };

        let (property, by_value) = match raw.strip_prefix("${") {
            Some(rest) => (rest.strip_suffix('}').ok_or_else(malformed)?, true),
            None => (raw, false),
        };
        if property.is_empty()
            || property.contains(char::is_whitespace)
            || property.contains(['$', '{', '}'])
        {
            return Err(malformed());
        }
        Ok(Some(Self {
            property: property.to_string(),
            by_value,
        }))
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn holds(&self, properties: &PropertyTable) -> bool {
        if !self.by_value {
            return properties.contains(&self.property);
        }
        match properties.get(&self.property) {
            None => false,
            Some(value) if to_boolean(value) => true,
            Some(value) if matches!(value.to_ascii_lowercase().as_str(), "false" | "off" | "no") => {
                false
            }
            Some(value) => properties.contains(value),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.by_value {
            write!(f, "${{{}}}", self.property)
        } else {
            write!(f, "{}", self.property)
        }
    }
}

/// Split a comma separated dependency list.
///
/// Names are trimmed. An empty entry is a syntax error.
pub fn parse_depends(target: &str, depends: &str) -> BuildResult<Vec<String>> {
    if depends.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = depends.split(',').collect();
    let last = parts.len() - 1;
    let mut names = Vec::with_capacity(parts.len());
    for (index, part) in parts.into_iter().enumerate() {
        let name = part.trim();
        if name.is_empty() {
            let message = if index == last {
                format!(
                    "Syntax Error: depends attribute for target \"{}\" ends with a \",\" character",
                    target
                )
            } else {
                format!(
                    "Syntax Error: depends attribute of target \"{}\" contains an empty string.",
                    target
                )
            };
            return Err(BuildError::Config(message));
        }
        names.push(name.to_string());
    }
    Ok(names)
}

pub struct Target {
    name: String,
    description: Option<String>,
    depends: Vec<String>,
    if_condition: Option<Condition>,
    unless_condition: Option<Condition>,
    tasks: Vec<Box<dyn Task>>,
    location: Option<Location>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            depends: Vec::new(),
            if_condition: None,
            unless_condition: None,
            tasks: Vec::new(),
            location: None,
        }
    }

    #[must_use]
    pub fn with_depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends = depends.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_task(mut self, task: Box<dyn Task>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn set_if(&mut self, raw: &str) -> BuildResult<()> {
        self.if_condition = Condition::parse(&self.name, "if", raw)?;
        Ok(())
    }

    pub fn set_unless(&mut self, raw: &str) -> BuildResult<()> {
        self.unless_condition = Condition::parse(&self.name, "unless", raw)?;
        Ok(())
    }

    pub fn add_task(&mut self, task: Box<dyn Task>) {
        self.tasks.push(task);
    }

    pub fn add_dependency(&mut self, name: impl Into<String>) {
        self.depends.push(name.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Direct dependencies in declaration order
    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    pub fn tasks(&self) -> &[Box<dyn Task>] {
        &self.tasks
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn if_condition(&self) -> Option<&Condition> {
        self.if_condition.as_ref()
    }

    pub fn unless_condition(&self) -> Option<&Condition> {
        self.unless_condition.as_ref()
    }

    /// Targets without a description, or whose name starts with `-`, are
    /// not meant to be invoked directly.
    pub fn is_internal(&self) -> bool {
        self.description.is_none() || self.name.starts_with('-')
    }

    /// Why the target's guards prevent it from running, if they do.
    pub fn skip_reason(&self, properties: &PropertyTable) -> Option<String> {
        if let Some(condition) = &self.if_condition {
            if !condition.holds(properties) {
                return Some(format!("Skipped because property '{}' not set.", condition));
            }
        }
        if let Some(condition) = &self.unless_condition {
            if condition.holds(properties) {
                return Some(format!("Skipped because property '{}' set.", condition));
            }
        }
        None
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("depends", &self.depends)
            .field("if", &self.if_condition)
            .field("unless", &self.unless_condition)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_depends() {
        assert_eq!(
            parse_depends("dist", " compile ,test").unwrap(),
            vec!["compile".to_string(), "test".to_string()]
        );
        assert!(parse_depends("dist", "  ").unwrap().is_empty());

        let err = parse_depends("dist", "compile,,test").unwrap_err();
        assert!(err.to_string().contains("contains an empty string"));
        let err = parse_depends("dist", "compile,").unwrap_err();
        assert!(err.to_string().contains("ends with a \",\" character"));
    }

    #[test]
    fn test_malformed_conditions() {
        for raw in ["two words", "${open", "a}b", "${}"] {
            let err = Condition::parse("t", "if", raw).unwrap_err();
            assert!(
                matches!(err, BuildError::MalformedCondition { kind: "if", .. }),
                "{} accepted",
                raw
            );
        }
        assert!(Condition::parse("t", "if", "  ").unwrap().is_none());
    }

    #[test]
    fn test_condition_by_presence_and_value() {
        let mut properties = PropertyTable::new();
        properties.set_property("enabled", "false");
        properties.set_property("flag", "yes");
        properties.set_property("indirect", "flag");

        let present = Condition::parse("t", "if", "enabled").unwrap().unwrap();
        assert!(present.holds(&properties));

        let by_value = Condition::parse("t", "if", "${enabled}").unwrap().unwrap();
        assert!(!by_value.holds(&properties));
        let by_value = Condition::parse("t", "if", "${flag}").unwrap().unwrap();
        assert!(by_value.holds(&properties));
        let by_value = Condition::parse("t", "if", "${indirect}").unwrap().unwrap();
        assert!(by_value.holds(&properties));
        let by_value = Condition::parse("t", "if", "${missing}").unwrap().unwrap();
        assert!(!by_value.holds(&properties));
    }

    #[test]
    fn test_skip_reason() {
        let mut target = Target::new("deploy");
        target.set_if("release").unwrap();
        target.set_unless("dry.run").unwrap();

        let mut properties = PropertyTable::new();
        assert_eq!(
            target.skip_reason(&properties).as_deref(),
            Some("Skipped because property 'release' not set.")
        );

        properties.set_property("release", "1");
        assert!(target.skip_reason(&properties).is_none());

        properties.set_property("dry.run", "1");
        assert_eq!(
            target.skip_reason(&properties).as_deref(),
            Some("Skipped because property 'dry.run' set.")
        );
    }

    #[test]
    fn test_internal_targets() {
        assert!(Target::new("helper").is_internal());
        assert!(Target::new("-init").with_description("x").is_internal());
        assert!(!Target::new("dist").with_description("Build it").is_internal());
    }
}
