//! Target dependency resolution
//!
//! Turns the requested targets into one execution order by depth-first
//! search over `depends` lists. Every dependency comes before its
//! dependents, each target appears once, and among independent targets the
//! order of the request and of the `depends` lists is kept.

use std::collections::HashMap;

use crate::project::Project;
use crate::types::{BuildError, BuildResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Visited,
}

struct Resolver<'a> {
    project: &'a Project,
    state: HashMap<&'a str, VisitState>,
    // Targets currently on the DFS path, outermost first
    visiting: Vec<&'a str>,
    order: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn new(project: &'a Project) -> Self {
        Self {
            project,
            state: HashMap::new(),
            visiting: Vec::new(),
            order: Vec::new(),
        }
    }

    fn visit_root(&mut self, name: &'a str) -> BuildResult<()> {
        match self.state.get(name) {
            None => self.visit(name),
            Some(_) => Ok(()),
        }
    }

    fn visit(&mut self, name: &'a str) -> BuildResult<()> {
        let target = match self.project.target(name) {
            Some(target) => target,
            None => {
                return Err(BuildError::UnknownTarget {
                    name: name.to_string(),
                    project: self.project.name().to_string(),
                    referenced_from: self.visiting.last().map(|s| s.to_string()),
                })
            }
        };

        self.state.insert(name, VisitState::Visiting);
        self.visiting.push(name);

        for dependency in target.depends() {
            match self.state.get(dependency.as_str()) {
                None => self.visit(dependency)?,
                Some(VisitState::Visiting) => {
                    return Err(BuildError::CircularDependency {
                        cycle: self.cycle_ending_at(dependency),
                    })
                }
                Some(VisitState::Visited) => {}
            }
        }

        self.visiting.pop();
        self.state.insert(name, VisitState::Visited);
        self.order.push(name.to_string());
        Ok(())
    }

    // Path from the earlier occurrence of `repeated` down to the current
    // target, closed with `repeated` again.
    fn cycle_ending_at(&self, repeated: &str) -> Vec<String> {
        let start = self
            .visiting
            .iter()
            .position(|name| *name == repeated)
            .unwrap_or(0);
        let mut cycle: Vec<String> = self.visiting[start..].iter().map(|s| s.to_string()).collect();
        cycle.push(repeated.to_string());
        cycle
    }
}

/// Execution order for `requested`.
///
/// An empty request falls back to the project's default target. Only targets
/// reachable from the request are examined, so a cycle or dangling
/// dependency elsewhere in the project does not stop this build.
pub fn resolve(project: &Project, requested: &[String]) -> BuildResult<Vec<String>> {
    let roots: Vec<&str> = if requested.is_empty() {
        match project.default_target() {
            Some(default) => vec![default],
            None => return Err(BuildError::Config("No target specified".to_string())),
        }
    } else {
        requested.iter().map(String::as_str).collect()
    };

    let mut resolver = Resolver::new(project);
    for &root in &roots {
        resolver.visit_root(root)?;
    }
    tracing::debug!(
        requested = ?roots,
        order = ?resolver.order,
        "resolved build sequence"
    );
    Ok(resolver.order)
}

/// Check every target of the project for cycles and unknown dependencies.
pub fn validate_all(project: &Project) -> BuildResult<()> {
    let mut resolver = Resolver::new(project);
    for target in project.targets().iter() {
        resolver.visit_root(target.name())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::target::Target;

    fn project(targets: &[(&str, &[&str])]) -> Project {
        let mut project = Project::new("demo", ".");
        for (name, depends) in targets {
            project
                .add_target(Target::new(*name).with_depends(depends.iter().copied()))
                .unwrap();
        }
        project
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dependencies_first_in_declaration_order() {
        let project = project(&[
            ("init", &[]),
            ("compile", &["init"]),
            ("docs", &["init"]),
            ("dist", &["compile", "docs"]),
        ]);
        let order = resolve(&project, &names(&["dist"])).unwrap();
        assert_eq!(order, names(&["init", "compile", "docs", "dist"]));
    }

    #[test]
    fn test_dist_after_test_and_compile() {
        let project = project(&[
            ("clean", &[]),
            ("compile", &["clean"]),
            ("test", &["compile"]),
            ("dist", &["compile", "test"]),
        ]);
        let order = resolve(&project, &names(&["dist"])).unwrap();
        assert_eq!(order, names(&["clean", "compile", "test", "dist"]));
    }

    #[test]
    fn test_resolving_twice_gives_same_order() {
        let project = project(&[
            ("init", &[]),
            ("gen", &["init"]),
            ("compile", &["gen", "init"]),
            ("docs", &["init"]),
            ("dist", &["docs", "compile"]),
        ]);
        let request = names(&["docs", "dist"]);
        let first = resolve(&project, &request).unwrap();
        let second = resolve(&project, &request).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, names(&["init", "docs", "gen", "compile", "dist"]));
    }

    #[test]
    fn test_multiple_roots_share_dependencies() {
        let project = project(&[("a", &[]), ("b", &["a"]), ("c", &["a"])]);
        let order = resolve(&project, &names(&["c", "b"])).unwrap();
        assert_eq!(order, names(&["a", "c", "b"]));

        let order = resolve(&project, &names(&["b", "b"])).unwrap();
        assert_eq!(order, names(&["a", "b"]));
    }

    #[test]
    fn test_cycle_reports_path() {
        let project = project(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        let err = resolve(&project, &names(&["a"])).unwrap_err();
        match &err {
            BuildError::CircularDependency { cycle } => {
                assert_eq!(cycle, &names(&["a", "b", "c", "a"]));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.to_string(), "Circular dependency: a <- c <- b <- a");
    }

    #[test]
    fn test_two_target_cycle_names_both() {
        let project = project(&[("a", &["b"]), ("b", &["a"])]);
        for root in ["a", "b"] {
            let err = resolve(&project, &names(&[root])).unwrap_err();
            let BuildError::CircularDependency { cycle } = &err else {
                panic!("unexpected error {:?}", err);
            };
            assert!(cycle.contains(&"a".to_string()));
            assert!(cycle.contains(&"b".to_string()));
            let message = err.to_string();
            assert!(message.contains('a') && message.contains('b'), "{}", message);
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let project = project(&[("loop", &["loop"])]);
        let err = resolve(&project, &names(&["loop"])).unwrap_err();
        assert_eq!(err.to_string(), "Circular dependency: loop <- loop");
    }

    #[test]
    fn test_unknown_dependency_names_its_user() {
        let project = project(&[("dist", &["compile"])]);
        let err = resolve(&project, &names(&["dist"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Target \"compile\" does not exist in the project \"demo\". It is used from target \"dist\"."
        );

        let err = resolve(&project, &names(&["nope"])).unwrap_err();
        assert!(matches!(
            err,
            BuildError::UnknownTarget { referenced_from: None, .. }
        ));
    }

    #[test]
    fn test_default_target_and_empty_request() {
        let mut project = project(&[("a", &[]), ("b", &["a"])]);
        assert_eq!(
            resolve(&project, &[]).unwrap_err().to_string(),
            "Configuration error: No target specified"
        );
        project.set_default_target(Some("b".into()));
        assert_eq!(resolve(&project, &[]).unwrap(), names(&["a", "b"]));
    }

    #[test]
    fn test_unreachable_cycle_only_fails_full_validation() {
        let project = project(&[("ok", &[]), ("x", &["y"]), ("y", &["x"])]);
        assert_eq!(resolve(&project, &names(&["ok"])).unwrap(), names(&["ok"]));
        assert!(matches!(
            validate_all(&project),
            Err(BuildError::CircularDependency { .. })
        ));
    }

    // Target `t{i}` may only depend on targets declared before it.
    fn acyclic_project(edges: &[Vec<bool>]) -> Project {
        let mut project = Project::new("generated", ".");
        for (index, row) in edges.iter().enumerate() {
            let depends = row
                .iter()
                .take(index)
                .enumerate()
                .filter(|&(_, &edge)| edge)
                .map(|(dep, _)| format!("t{}", dep));
            project
                .add_target(Target::new(format!("t{}", index)).with_depends(depends))
                .unwrap();
        }
        project
    }

    proptest! {
        #[test]
        fn test_every_target_follows_its_dependencies(
            edges in prop::collection::vec(prop::collection::vec(any::<bool>(), 10), 1..10),
            roots in prop::collection::vec(0usize..10, 1..4),
        ) {
            let project = acyclic_project(&edges);
            let request: Vec<String> = roots
                .iter()
                .map(|root| format!("t{}", root % edges.len()))
                .collect();

            let order = resolve(&project, &request).unwrap();
            prop_assert_eq!(&order, &resolve(&project, &request).unwrap());

            let position: HashMap<&str, usize> = order
                .iter()
                .enumerate()
                .map(|(index, name)| (name.as_str(), index))
                .collect();
            prop_assert_eq!(position.len(), order.len());
            for root in &request {
                prop_assert!(position.contains_key(root.as_str()));
            }
            for name in &order {
                let target = project.target(name).unwrap();
                for dep in target.depends() {
                    prop_assert!(position[dep.as_str()] < position[name.as_str()]);
                }
            }
        }
    }
}
