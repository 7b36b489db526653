//! Build property table
//!
//! Two layers: user properties (command line, property files given to the
//! CLI) which are fixed once set, and project properties set by the build
//! file and by tasks. A user property always shadows a project property of
//! the same name.

use std::collections::BTreeMap;

/// Well-known property names
pub mod names {
    pub const PROJECT_NAME: &str = "ant.project.name";
    pub const PROJECT_DEFAULT_TARGET: &str = "ant.project.default-target";
    pub const PROJECT_INVOKED_TARGETS: &str = "ant.project.invoked-targets";
    pub const BUILD_FILE: &str = "ant.file";
    pub const BASEDIR: &str = "basedir";
}

/// Outcome of a property assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyChange {
    Set,
    /// A user property with this name exists; the assignment was ignored.
    ShadowedByUser,
    /// `set_new_property` found the name already defined.
    AlreadySet,
}

#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    user: BTreeMap<String, String>,
    project: BTreeMap<String, String>,
    /// User properties that sub-builds inherit. Always a subset of `user`.
    inherited: BTreeMap<String, String>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user property. The first value wins; later calls are ignored.
    pub fn set_user_property(&mut self, name: &str, value: &str) -> PropertyChange {
        if self.user.contains_key(name) {
            return PropertyChange::AlreadySet;
        }
        self.user.insert(name.to_string(), value.to_string());
        PropertyChange::Set
    }

    /// Set a user property that sub-builds should inherit as well.
    pub fn set_inherited_property(&mut self, name: &str, value: &str) -> PropertyChange {
        let change = self.set_user_property(name, value);
        if change == PropertyChange::Set {
            self.inherited.insert(name.to_string(), value.to_string());
        }
        change
    }

    /// Set or overwrite a project property, unless a user property shadows it.
    pub fn set_property(&mut self, name: &str, value: &str) -> PropertyChange {
        if self.user.contains_key(name) {
            tracing::trace!(property = name, "override ignored for user property");
            return PropertyChange::ShadowedByUser;
        }
        self.project.insert(name.to_string(), value.to_string());
        PropertyChange::Set
    }

    /// Set a project property only if no property of that name exists yet.
    pub fn set_new_property(&mut self, name: &str, value: &str) -> PropertyChange {
        if self.user.contains_key(name) {
            return PropertyChange::ShadowedByUser;
        }
        if self.project.contains_key(name) {
            tracing::trace!(property = name, "override ignored for property");
            return PropertyChange::AlreadySet;
        }
        self.project.insert(name.to_string(), value.to_string());
        PropertyChange::Set
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.user
            .get(name)
            .or_else(|| self.project.get(name))
            .map(String::as_str)
    }

    pub fn get_user_property(&self, name: &str) -> Option<&str> {
        self.user.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.user.contains_key(name) || self.project.contains_key(name)
    }

    /// Merged snapshot, user values taking precedence
    pub fn all(&self) -> BTreeMap<String, String> {
        let mut merged = self.project.clone();
        merged.extend(self.user.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    pub fn user_properties(&self) -> &BTreeMap<String, String> {
        &self.user
    }

    pub fn inherited_properties(&self) -> &BTreeMap<String, String> {
        &self.inherited
    }

    /// Copy user properties into another table, e.g. for an imported project.
    pub fn copy_user_properties(&self, other: &mut PropertyTable) {
        for (name, value) in &self.user {
            if !self.inherited.contains_key(name) {
                other.set_user_property(name, value);
            }
        }
    }

    /// Copy inherited properties into another table.
    pub fn copy_inherited_properties(&self, other: &mut PropertyTable) {
        for (name, value) in &self.inherited {
            other.set_inherited_property(name, value);
        }
    }
}
