//! List command - discovered test cases, no platform calls.

use super::load_config;
use anyhow::Result;
use console::style;
use flowtest_core::discover;
use std::path::Path;

/// Prints test cases grouped by flow, with each flow's mapped version.
pub fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let root = config.test_data_root();
    let suites = discover(&root, &config.corpus)?;

    if suites.is_empty() {
        println!("No test cases under {}", root.display());
        return Ok(());
    }

    for (flow, cases) in &suites {
        let version = match config.flows.versions.get(flow) {
            Some(v) => style(format!("v{}", v)).green(),
            None => style("unmapped".to_string()).red(),
        };
        println!("{} {} ({} test cases)", style(flow).bold(), version, cases.len());
        for case in cases {
            let shown = case.strip_prefix(&root).unwrap_or(case);
            println!("  {}", shown.display());
        }
    }
    Ok(())
}
