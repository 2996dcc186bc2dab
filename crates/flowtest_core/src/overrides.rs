//! Sensitive-property overrides.
//!
//! Sensitive properties (passwords, keys) are never exported with a flow
//! version, so a freshly deployed flow has them blank. The override file
//! supplies values per processor name or type:
//!
//! ```json
//! [{"processor_name": "PutSQL", "properties": {"Password": "secret"}}]
//! ```

use crate::error::{FlowTestError, Result};
use crate::platform::{Component, FlowPlatform};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Properties to set on matching sensitive processors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensitiveOverride {
    /// Exact processor name to match.
    #[serde(default)]
    pub processor_name: Option<String>,
    /// Exact processor type to match.
    #[serde(default)]
    pub processor_type: Option<String>,
    /// Properties merged into the processor's current properties.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl SensitiveOverride {
    /// Matches by name or by type; empty selectors never match.
    pub fn matches(&self, processor: &Component) -> bool {
        let by_name = self
            .processor_name
            .as_deref()
            .is_some_and(|n| !n.is_empty() && n == processor.name);
        let by_type = self
            .processor_type
            .as_deref()
            .is_some_and(|t| !t.is_empty() && t == processor.component_type);
        by_name || by_type
    }
}

/// Loads the override list from a JSON file.
pub fn load_overrides(path: &Path) -> Result<Vec<SensitiveOverride>> {
    let content = fs::read_to_string(path).map_err(|e| {
        FlowTestError::Config(format!(
            "failed to read sensitive overrides {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        FlowTestError::Config(format!(
            "invalid sensitive overrides {}: {}",
            path.display(),
            e
        ))
    })
}

/// Applies every matching override to the sensitive processors below `group_id`.
///
/// Returns the number of processor updates issued.
pub fn apply_overrides(
    platform: &dyn FlowPlatform,
    group_id: &str,
    overrides: &[SensitiveOverride],
) -> Result<usize> {
    if overrides.is_empty() {
        return Ok(0);
    }

    let processors = platform.list_sensitive_processors(group_id)?;
    let mut updated = 0;
    for processor in &processors {
        let mut current = processor.clone();
        for entry in overrides.iter().filter(|o| o.matches(processor)) {
            let mut properties = current.properties.clone();
            for (key, value) in &entry.properties {
                properties.insert(key.clone(), value.clone());
            }
            debug!(processor = processor.name.as_str(), "Applying sensitive override");
            current = platform.update_processor(&current, &properties)?;
            updated += 1;
        }
    }

    info!(group = group_id, updated, "Applied sensitive property overrides");
    Ok(updated)
}
