//! Template command - harness template validation.

use super::load_config;
use anyhow::Result;
use console::style;
use flowtest_core::{HarnessTemplate, Placeholder};
use std::path::Path;

/// Loads the configured template and prints its nodes and placeholders.
pub fn check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let path = config.resolve(&config.harness.template);

    let template = match HarnessTemplate::load(&path) {
        Ok(template) => template,
        Err(e) => {
            println!("{} {}", style("×").red(), e);
            if let Some(hint) = e.recovery_suggestion() {
                println!("  {}", style(hint).dim());
            }
            println!();
            println!("Recognized placeholders:");
            for placeholder in Placeholder::ALL {
                println!("  {}", placeholder);
            }
            anyhow::bail!("Harness template {} is invalid", path.display());
        }
    };

    println!("{} {} is valid", style("✓").green(), path.display());
    println!();
    println!("{}", style("Nodes:").bold());
    for node in template.nodes() {
        println!("  {:<18} {}", node.role.to_string(), node.node_type);
    }
    println!();
    println!("{}", style("Placeholders used:").bold());
    for placeholder in template.placeholders() {
        println!("  {}", placeholder);
    }
    Ok(())
}
