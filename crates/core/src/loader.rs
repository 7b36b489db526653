//! Build file loading
//!
//! Turns a YAML build file, and the files it imports, into a [`Project`].
//! Imported targets are added under `<prefix>.<name>` and, unless the
//! importing file already defines the name, under the bare name as well.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::configs::project::{DependsConfig, TargetConfig};
use crate::configs::{parse_project_config, ProjectConfig};
use crate::project::Project;
use crate::properties::names;
use crate::target::{parse_depends, Target};
use crate::tasks::create_task;
use crate::types::{BuildError, BuildResult, Location};

/// Load `build_file` with the given user properties
pub fn load_project(
    build_file: &Path,
    user_properties: &BTreeMap<String, String>,
) -> BuildResult<Project> {
    let mut loader = Loader {
        user_properties,
        imported: HashSet::new(),
    };
    let (project, _) = loader.load(build_file)?;
    Ok(project)
}

struct BuildFile {
    path: PathBuf,
    text: String,
    config: ProjectConfig,
}

impl BuildFile {
    fn read(path: &Path) -> BuildResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            BuildError::Config(format!("Unable to read build file {}: {}", path.display(), e))
        })?;
        let config = parse_project_config(&text)?;
        Ok(Self {
            path: path.to_path_buf(),
            text,
            config,
        })
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn project_name(&self) -> String {
        self.config.name.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string())
        })
    }

    /// Targets of this file, optionally renamed to `prefix.name` with
    /// dependencies renamed the same way
    fn targets(&self, prefix: Option<&str>) -> BuildResult<Vec<Target>> {
        let qualify = |name: &str| match prefix {
            Some(prefix) => format!("{}.{}", prefix, name),
            None => name.to_string(),
        };
        let mut locator = LineLocator::new(&self.path, &self.text);
        let mut targets = Vec::with_capacity(self.config.targets.len());

        for (index, config) in self.config.targets.iter().enumerate() {
            let location = locator.target(&config.name, index);
            let depends: Vec<String> = target_depends(config)?
                .iter()
                .map(|name| qualify(name))
                .collect();
            let name = qualify(&config.name);
            let mut target = Target::new(&name)
                .with_depends(depends)
                .with_location(location);
            if let Some(description) = &config.description {
                target = target.with_description(description);
            }
            if let Some(raw) = &config.if_property {
                target.set_if(raw)?;
            }
            if let Some(raw) = &config.unless_property {
                target.set_unless(raw)?;
            }
            for (task_index, task) in config.tasks.iter().enumerate() {
                let location = locator.task(task.task_name(), task_index);
                target.add_task(create_task(&name, task, Some(location))?);
            }
            targets.push(target);
        }
        Ok(targets)
    }
}

fn target_depends(config: &TargetConfig) -> BuildResult<Vec<String>> {
    match &config.depends {
        None => Ok(Vec::new()),
        Some(DependsConfig::Text(text)) => parse_depends(&config.name, text),
        Some(DependsConfig::List(names)) => parse_depends(&config.name, &names.join(",")),
    }
}

struct Loader<'a> {
    user_properties: &'a BTreeMap<String, String>,
    /// Every file loaded so far; a file is only ever imported once
    imported: HashSet<PathBuf>,
}

impl Loader<'_> {
    /// Load one file and its imports. Also returns every build file the
    /// project is made of, the loaded file first.
    fn load(&mut self, path: &Path) -> BuildResult<(Project, Vec<BuildFile>)> {
        self.imported.insert(canonical(path));
        let file = BuildFile::read(path)?;
        tracing::debug!(file = %path.display(), "loading build file");
        let mut project = self.new_project(&file);

        for target in file.targets(None)? {
            project.add_target(target)?;
        }

        let mut parts = Vec::new();
        for import in &file.config.imports {
            let import_path = file.dir().join(&import.file);
            if !import_path.is_file() {
                if import.optional {
                    tracing::debug!(file = %import_path.display(), "optional import not found");
                    continue;
                }
                return Err(BuildError::Config(format!(
                    "Cannot find {} imported from {}",
                    import_path.display(),
                    file.path.display()
                )));
            }
            if self.imported.contains(&canonical(&import_path)) {
                tracing::debug!(file = %import_path.display(), "skipping already imported file");
                continue;
            }

            let (sub_project, imported_files) = self.load(&import_path)?;
            let prefix = import
                .prefix
                .clone()
                .unwrap_or_else(|| sub_project.name().to_string());

            if let Some(direct) = imported_files.first() {
                for target in direct.targets(Some(&prefix))? {
                    project.add_or_replace_target(target);
                }
            }
            for imported in &imported_files {
                for target in imported.targets(None)? {
                    if !project.targets().contains(target.name()) {
                        project.add_target(target)?;
                    }
                }
                for (name, value) in &imported.config.properties {
                    project.properties_mut().set_new_property(name, value);
                }
            }

            project.add_sub_project(prefix, sub_project);
            parts.extend(imported_files);
        }

        parts.insert(0, file);
        Ok((project, parts))
    }

    fn new_project(&self, file: &BuildFile) -> Project {
        let basedir = match &file.config.basedir {
            Some(basedir) => file.dir().join(basedir),
            None => file.dir().to_path_buf(),
        };
        let basedir = fs::canonicalize(&basedir).unwrap_or(basedir);

        let mut project = Project::new(file.project_name(), &basedir);
        project.set_description(file.config.description.clone());
        project.set_default_target(file.config.default.clone());
        project.set_build_file(&file.path);

        let properties = project.properties_mut();
        for (name, value) in self.user_properties {
            properties.set_user_property(name, value);
        }
        properties.set_user_property(names::PROJECT_NAME, &file.project_name());
        properties.set_user_property(names::BUILD_FILE, &canonical(&file.path).display().to_string());
        if let Some(default) = &file.config.default {
            properties.set_user_property(names::PROJECT_DEFAULT_TARGET, default);
        }
        properties.set_new_property(names::BASEDIR, &basedir.display().to_string());
        for (name, value) in &file.config.properties {
            properties.set_new_property(name, value);
        }
        project
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Finds the lines of target and task entries in the raw YAML text.
///
/// Entries are searched for in document order; an entry that cannot be
/// found gets its 1-based index as the line number.
struct LineLocator<'a> {
    file: &'a Path,
    lines: Vec<&'a str>,
    cursor: usize,
}

impl<'a> LineLocator<'a> {
    fn new(file: &'a Path, text: &'a str) -> Self {
        Self {
            file,
            lines: text.lines().collect(),
            cursor: 0,
        }
    }

    fn target(&mut self, name: &str, index: usize) -> Location {
        let found = self.find_next(|line| {
            let line = line.strip_prefix("- ").unwrap_or(line).trim_start();
            line.strip_prefix("name:")
                .map(|value| value.trim().trim_matches(['"', '\'']) == name)
                .unwrap_or(false)
        });
        self.location(found, index)
    }

    fn task(&mut self, task_name: &str, index: usize) -> Location {
        let key = format!("{}:", task_name);
        let found = self.find_next(|line| {
            line.strip_prefix("- ")
                .map(|rest| rest.trim_start().starts_with(&key))
                .unwrap_or(false)
        });
        self.location(found, index)
    }

    fn find_next(&mut self, matches: impl Fn(&str) -> bool) -> Option<usize> {
        let offset = self.lines[self.cursor.min(self.lines.len())..]
            .iter()
            .position(|line| matches(line.trim_start()))?;
        let line = self.cursor + offset;
        self.cursor = line + 1;
        Some(line + 1)
    }

    fn location(&self, line: Option<usize>, index: usize) -> Location {
        Location::new(self.file, line.unwrap_or(index + 1), 0)
    }
}
