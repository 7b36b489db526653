use anthill_core::BuildManager;
use anyhow::Result;
use colored::*;

pub fn execute(manager: &BuildManager, targets: &[String], strict: bool) -> Result<()> {
    let plan = manager
        .plan(targets, strict)
        .map_err(|e| anyhow::anyhow!("Failed to plan build: {}", e))?;

    let requested = if plan.requested.is_empty() {
        "default target".to_string()
    } else {
        plan.requested.join(", ")
    };
    println!("{} {}", "Build plan for".bold(), requested.cyan());

    println!("\n{}:", "Execution order".bold());
    for (i, target) in plan.order.iter().enumerate() {
        let color = plan
            .target_colors
            .get(target)
            .copied()
            .unwrap_or(Color::White);
        println!("  {}. {}", i + 1, target.color(color));
    }

    Ok(())
}
