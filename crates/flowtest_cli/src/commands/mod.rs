//! CLI commands.

pub mod expr;
pub mod list;
pub mod run;
pub mod secret;
pub mod template;

use anyhow::{Context, Result};
use flowtest_core::Config;
use std::path::Path;

/// Loads the configuration, pointing at the file on failure.
fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("Failed to load {}", path.display()))
}
