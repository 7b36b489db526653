//! The in-memory project: targets, properties and imported sub-projects

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::properties::PropertyTable;
use crate::target::Target;
use crate::types::{BuildError, BuildResult};

/// Targets by name, iterated in insertion order
#[derive(Debug, Default)]
pub struct TargetTable {
    targets: Vec<Target>,
    index: HashMap<String, usize>,
}

impl TargetTable {
    pub fn get(&self, name: &str) -> Option<&Target> {
        self.index.get(name).map(|&i| &self.targets[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn insert(&mut self, target: Target) -> Option<Target> {
        match self.index.get(target.name()) {
            Some(&i) => Some(std::mem::replace(&mut self.targets[i], target)),
            None => {
                self.index.insert(target.name().to_string(), self.targets.len());
                self.targets.push(target);
                None
            }
        }
    }
}

#[derive(Debug)]
pub struct Project {
    name: String,
    description: Option<String>,
    basedir: PathBuf,
    build_file: Option<PathBuf>,
    default_target: Option<String>,
    targets: TargetTable,
    properties: PropertyTable,
    sub_projects: BTreeMap<String, Project>,
}

impl Project {
    pub fn new(name: impl Into<String>, basedir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            description: None,
            basedir: basedir.into(),
            build_file: None,
            default_target: None,
            targets: TargetTable::default(),
            properties: PropertyTable::new(),
            sub_projects: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    pub fn build_file(&self) -> Option<&Path> {
        self.build_file.as_deref()
    }

    pub fn set_build_file(&mut self, path: impl Into<PathBuf>) {
        self.build_file = Some(path.into());
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default_target.as_deref()
    }

    pub fn set_default_target(&mut self, name: Option<String>) {
        self.default_target = name;
    }

    /// Add a target; a second target with the same name is an error.
    pub fn add_target(&mut self, target: Target) -> BuildResult<()> {
        if self.targets.contains(target.name()) {
            return Err(BuildError::DuplicateTarget(target.name().to_string()));
        }
        self.targets.insert(target);
        Ok(())
    }

    /// Add a target, replacing an existing one of the same name in place.
    pub fn add_or_replace_target(&mut self, target: Target) -> Option<Target> {
        let replaced = self.targets.insert(target);
        if let Some(old) = &replaced {
            tracing::debug!(target_name = old.name(), "replaced existing target");
        }
        replaced
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn targets(&self) -> &TargetTable {
        &self.targets
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(Target::name).collect()
    }

    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.properties
    }

    pub fn add_sub_project(&mut self, prefix: impl Into<String>, project: Project) {
        self.sub_projects.insert(prefix.into(), project);
    }

    pub fn sub_projects(&self) -> &BTreeMap<String, Project> {
        &self.sub_projects
    }

    /// Borrow what the executor needs at once: targets read-only, properties mutably.
    pub(crate) fn execution_parts(&mut self) -> (&str, &Path, &TargetTable, &mut PropertyTable) {
        (
            &self.name,
            &self.basedir,
            &self.targets,
            &mut self.properties,
        )
    }
}
