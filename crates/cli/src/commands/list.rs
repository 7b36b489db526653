use anthill_core::results::TargetInfo;
use anthill_core::BuildManager;
use anyhow::Result;
use colored::*;
use std::collections::HashMap;

pub fn execute(manager: &BuildManager, all: bool) -> Result<()> {
    let result = manager.list_targets(all)?;

    println!("Buildfile: {}", result.build_file.display());
    if let Some(description) = &result.description {
        println!("{}", description);
    }
    println!();

    print_section("Main targets", &result.main_targets, &result.target_colors);
    if all {
        print_section("Other targets", &result.other_targets, &result.target_colors);
    }

    if let Some(default) = &result.default_target {
        println!("{} {}", "Default target:".bold(), default.cyan());
    }
    Ok(())
}

fn print_section(heading: &str, targets: &[TargetInfo], colors: &HashMap<String, Color>) {
    println!("{}", heading.bold().underline());
    println!();

    if targets.is_empty() {
        println!("  {}", "No targets found".dimmed());
        println!();
        return;
    }

    let width = targets.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for target in targets {
        let color = colors.get(&target.name).copied().unwrap_or(Color::White);
        let padded = format!("{:width$}", target.name, width = width);
        match &target.description {
            Some(description) => println!(" {}  {}", padded.color(color).bold(), description),
            None => println!(" {}", padded.color(color).bold()),
        }
    }
    println!();
}
