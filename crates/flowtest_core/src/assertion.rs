//! Assertion expression synthesis.
//!
//! Expected output attributes are turned into NiFi Expression Language text
//! that the harness comparator evaluates against the flow file coming out of
//! the flow under test. Nothing is evaluated here; the output is static text
//! and must be byte-for-byte reproducible for the same input.

use crate::types::AttributeMap;
use serde::Serialize;

/// Attribute-match expression used when no attributes are expected.
pub const ALWAYS_TRUE_EXPRESSION: &str = "${literal('true')}";

/// Content-match expression.
///
/// Yields `match` when the flow file carries no `test.expected` attribute,
/// otherwise the route decided by the content comparator.
pub const CONTENT_MATCH_EXPRESSION: &str =
    "${test.expected:isEmpty():ifElse('match',${RouteOnAttribute.Route})}";

/// Input attribute carrying the expected output content to the comparator.
pub const EXPECTED_CONTENT_ATTRIBUTE: &str = "test.expected";

/// The assertion triple computed for one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionReport {
    /// True iff every expected attribute equals its expected value.
    pub flow_attributes_match: String,
    /// Attribute name -> reference to the runtime value.
    pub flow_file_attributes: AttributeMap,
    /// `match`, or the comparator's route.
    pub flow_content_match: String,
}

impl AssertionReport {
    /// Synthesizes the report for an expected attribute map.
    pub fn from_expected(expected: &AttributeMap) -> Self {
        Self {
            flow_attributes_match: attributes_match_expression(expected),
            flow_file_attributes: expected
                .iter()
                .map(|(key, _)| (key, attribute_reference(key)))
                .collect(),
            flow_content_match: CONTENT_MATCH_EXPRESSION.to_string(),
        }
    }
}

/// Builds the attribute-match expression by left-folding `and` over the
/// expected attributes in order.
///
/// `{"a": "1", "b": "2"}` becomes `${a:equals('1'):and(${b:equals('2')})}`.
pub fn attributes_match_expression(expected: &AttributeMap) -> String {
    let mut entries = expected.iter();
    let Some((first_key, first_value)) = entries.next() else {
        return ALWAYS_TRUE_EXPRESSION.to_string();
    };

    let mut expr = format!("${{{}", equals_clause(first_key, first_value));
    for (key, value) in entries {
        expr.push_str(&format!(":and(${{{}}})", equals_clause(key, value)));
    }
    expr.push('}');
    expr
}

/// `${name}` reference for an attribute.
pub fn attribute_reference(name: &str) -> String {
    format!("${{{}}}", subject(name))
}

fn equals_clause(key: &str, value: &str) -> String {
    format!("{}:equals('{}')", subject(key), escape_literal(value))
}

/// Attribute names outside the plain identifier alphabet, or starting with
/// a digit, must be quoted.
fn subject(name: &str) -> String {
    let plain = name.chars().next().is_some_and(|c| !c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if plain {
        name.to_string()
    } else {
        format!("'{}'", escape_literal(name))
    }
}

/// Backslashes first, so the ones added for quotes stay single.
fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
