//! Expr command - print synthesized assertion expressions.

use anyhow::{Context, Result};
use flowtest_core::{AssertionReport, AttributeMap, CONTENT_MATCH_EXPRESSION};

/// Prints the assertion report for a JSON object of expected attributes.
pub fn run(attributes: &str) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(attributes).context("Attributes must be a JSON object")?;
    let expected = AttributeMap::from_json(&value)?;

    let report = AssertionReport::from_expected(&expected);
    println!("flow_attributes_match: {}", report.flow_attributes_match);
    println!("flow_content_match:    {}", CONTENT_MATCH_EXPRESSION);
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize the report")?
    );
    Ok(())
}
