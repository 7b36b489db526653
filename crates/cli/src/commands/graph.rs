use anthill_core::BuildManager;
use anyhow::Result;
use colored::*;

pub fn execute(manager: &BuildManager) -> Result<()> {
    println!("{}", "Target Dependency Graph:".bold().underline());

    let result = manager
        .dependency_graph()
        .map_err(|e| anyhow::anyhow!("Failed to get dependency graph: {}", e))?;
    let graph = &result.graph;

    if !graph.cycles.is_empty() {
        let cycles_description = graph
            .cycles
            .iter()
            .map(|cycle| {
                let mut path = cycle.clone();
                if let Some(first) = path.first().cloned() {
                    path.push(first);
                }
                path.join(" -> ")
            })
            .collect::<Vec<_>>()
            .join("; ");

        println!(
            "{} {}",
            "Warning:".yellow().bold(),
            format!("Circular dependencies detected: {}", cycles_description).yellow()
        );
    }

    for name in graph.graph.node_weights() {
        let color = result
            .target_colors
            .get(name)
            .copied()
            .unwrap_or(Color::White);
        println!("{}", name.color(color).bold());

        let deps = graph.dependencies_of(name);
        if deps.is_empty() {
            println!("  {}", "no dependencies".dimmed());
        } else {
            println!("  {} {}", "depends on:".dimmed(), deps.join(", "));
        }
        println!();
    }

    Ok(())
}
