//! Whole-project dependency graph
//!
//! Unlike [`crate::execution::resolve`], which only walks what a build
//! needs, this looks at every target and reports every cycle at once.

use std::collections::HashMap;

use petgraph::algo::kosaraju_scc;
use petgraph::prelude::*;

use crate::project::Project;
use crate::types::{BuildError, BuildResult};

#[derive(Debug)]
pub struct TargetGraph {
    /// Edges point from a target to its dependency
    pub graph: DiGraph<String, ()>,
    /// Each cycle's members, sorted by name
    pub cycles: Vec<Vec<String>>,
}

impl TargetGraph {
    /// Direct dependencies of `name` in declaration order
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let Some(node) = self.graph.node_indices().find(|n| self.graph[*n] == name) else {
            return Vec::new();
        };
        let mut deps: Vec<String> = self
            .graph
            .neighbors(node)
            .map(|n| self.graph[n].clone())
            .collect();
        // petgraph yields the most recently added edge first
        deps.reverse();
        deps
    }
}

pub fn build_target_graph(project: &Project) -> BuildResult<TargetGraph> {
    let mut graph = DiGraph::<String, ()>::new();
    let mut node_indices = HashMap::new();

    for target in project.targets().iter() {
        let node = graph.add_node(target.name().to_string());
        node_indices.insert(target.name(), node);
    }

    for target in project.targets().iter() {
        let from = node_indices[target.name()];
        for dependency in target.depends() {
            let to = node_indices.get(dependency.as_str()).ok_or_else(|| {
                BuildError::UnknownTarget {
                    name: dependency.clone(),
                    project: project.name().to_string(),
                    referenced_from: Some(target.name().to_string()),
                }
            })?;
            graph.add_edge(from, *to, ());
        }
    }

    let mut cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .map(|component| {
            let mut cycle: Vec<String> = component.iter().map(|n| graph[*n].clone()).collect();
            cycle.sort();
            cycle
        })
        .collect();
    cycles.sort();

    Ok(TargetGraph { graph, cycles })
}
