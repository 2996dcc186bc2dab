//! Declarative harness template.
//!
//! The harness is described by an ordered JSON list of node descriptors:
//!
//! ```json
//! [
//!   {
//!     "name": "request_injector",
//!     "type": "org.apache.nifi.processors.standard.HandleHttpRequest",
//!     "location": {"x": 0, "y": 0},
//!     "config": {"properties": {"Listening Port": "{{test_api_port}}"}}
//!   }
//! ]
//! ```
//!
//! Node names are harness roles. Strings may carry `{{placeholder}}`
//! references drawn from a fixed set ([`Placeholder`]); anything else is
//! rejected when the template is loaded.

use crate::error::{FlowTestError, Result};
use crate::platform::{Position, ProcessorSpec};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

/// Logical role of a node in the harness chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HarnessRole {
    /// Receives the test request and creates the flow file.
    RequestInjector,
    /// Sets the test case's input attributes.
    AttributeMapper,
    /// Replaces the flow file content with the input content.
    ContentInjector,
    /// The deployed flow's input port.
    InputPort,
    /// The deployed flow's output port.
    OutputPort,
    /// Captures the output content into an attribute.
    ContentExtractor,
    /// Compares the captured content with the expected content.
    Comparator,
    /// Writes the assertion results into the response body.
    ResponseBuilder,
    /// Answers the test request.
    ResponseEmitter,
}

impl HarnessRole {
    /// Chain order, first to last.
    pub const CHAIN: [HarnessRole; 9] = [
        Self::RequestInjector,
        Self::AttributeMapper,
        Self::ContentInjector,
        Self::InputPort,
        Self::OutputPort,
        Self::ContentExtractor,
        Self::Comparator,
        Self::ResponseBuilder,
        Self::ResponseEmitter,
    ];

    /// Role name as written in the template.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestInjector => "request_injector",
            Self::AttributeMapper => "attribute_mapper",
            Self::ContentInjector => "content_injector",
            Self::InputPort => "input_port",
            Self::OutputPort => "output_port",
            Self::ContentExtractor => "content_extractor",
            Self::Comparator => "comparator",
            Self::ResponseBuilder => "response_builder",
            Self::ResponseEmitter => "response_emitter",
        }
    }

    /// Parses a role name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::CHAIN.into_iter().find(|r| r.as_str() == name)
    }

    /// Ports belong to the deployed flow, never to the template.
    pub fn is_port(self) -> bool {
        matches!(self, Self::InputPort | Self::OutputPort)
    }
}

impl fmt::Display for HarnessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    /// Port the request injector listens on (number).
    TestApiPort,
    /// Id of the sandbox's HTTP context map service.
    ContextMapId,
    /// Input file content (text).
    InputContent,
    /// Expected output content (text).
    ExpectedOutputContent,
    /// Input attributes (object).
    InputAttributes,
    /// Attribute-match expression.
    AttributesMatchExpression,
    /// Content-match expression.
    ContentMatchExpression,
    /// Attribute name -> runtime reference (object).
    FlowFileAttributes,
}

impl Placeholder {
    /// Every recognized placeholder.
    pub const ALL: [Placeholder; 8] = [
        Self::TestApiPort,
        Self::ContextMapId,
        Self::InputContent,
        Self::ExpectedOutputContent,
        Self::InputAttributes,
        Self::AttributesMatchExpression,
        Self::ContentMatchExpression,
        Self::FlowFileAttributes,
    ];

    /// Name as written between braces.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TestApiPort => "test_api_port",
            Self::ContextMapId => "context_map_id",
            Self::InputContent => "input_content",
            Self::ExpectedOutputContent => "expected_output_content",
            Self::InputAttributes => "input_attributes",
            Self::AttributesMatchExpression => "attributes_match_expression",
            Self::ContentMatchExpression => "content_match_expression",
            Self::FlowFileAttributes => "flow_file_attributes",
        }
    }

    /// Parses a placeholder name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{{}}}}}", self.as_str())
    }
}

/// Values bound to placeholders for one test case.
#[derive(Debug, Clone, Default)]
pub struct Bindings(BTreeMap<Placeholder, Value>);

impl Bindings {
    /// Creates an empty binding set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a value, builder style.
    pub fn with(mut self, placeholder: Placeholder, value: impl Into<Value>) -> Self {
        self.0.insert(placeholder, value.into());
        self
    }

    /// The bound value.
    pub fn get(&self, placeholder: Placeholder) -> Option<&Value> {
        self.0.get(&placeholder)
    }
}

#[derive(Debug, Deserialize)]
struct RawNode {
    name: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    location: Value,
    #[serde(default)]
    config: Value,
}

/// One harness node descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTemplate {
    /// Role, also the node's name on the canvas.
    pub role: HarnessRole,
    /// Processor type.
    pub node_type: String,
    /// Location expression.
    pub location: Value,
    /// Configuration expression.
    pub config: Value,
}

impl NodeTemplate {
    /// Substitutes placeholders and produces the processor to create.
    pub fn render(&self, bindings: &Bindings) -> Result<ProcessorSpec> {
        let node = self.role.as_str();
        let location = substitute(&self.location, bindings, node)?;
        let config = substitute(&self.config, bindings, node)?;

        Ok(ProcessorSpec {
            name: node.to_string(),
            processor_type: self.node_type.clone(),
            position: parse_position(&location, node)?,
            config,
        })
    }

    /// Placeholders referenced anywhere in the node.
    pub fn placeholders(&self) -> BTreeSet<Placeholder> {
        let mut found = BTreeSet::new();
        for value in [&self.location, &self.config] {
            // Validated at load time, unknown names cannot occur here
            let _ = collect_placeholders(value, self.role.as_str(), &mut found);
        }
        found
    }
}

/// Ordered, validated harness template.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessTemplate {
    nodes: Vec<NodeTemplate>,
}

impl HarnessTemplate {
    /// Loads a template from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FlowTestError::Template(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parses and validates template JSON.
    ///
    /// Fails on unknown roles, port roles, duplicate roles and unknown
    /// placeholders.
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: Vec<RawNode> = serde_json::from_str(content)
            .map_err(|e| FlowTestError::Template(format!("invalid template JSON: {}", e)))?;

        let mut seen = BTreeSet::new();
        let mut nodes = Vec::with_capacity(raw.len());
        for node in raw {
            let role = HarnessRole::parse(&node.name).ok_or_else(|| {
                FlowTestError::Template(format!("unknown harness role '{}'", node.name))
            })?;
            if role.is_port() {
                return Err(FlowTestError::Template(format!(
                    "'{}' is provided by the deployed flow and cannot be templated",
                    role
                )));
            }
            if !seen.insert(role) {
                return Err(FlowTestError::Template(format!("duplicate harness role '{}'", role)));
            }
            if node.node_type.trim().is_empty() {
                return Err(FlowTestError::Template(format!("node '{}' has no type", role)));
            }

            let mut found = BTreeSet::new();
            collect_placeholders(&node.location, role.as_str(), &mut found)?;
            collect_placeholders(&node.config, role.as_str(), &mut found)?;

            nodes.push(NodeTemplate {
                role,
                node_type: node.node_type,
                location: node.location,
                config: node.config,
            });
        }

        Ok(Self { nodes })
    }

    /// Nodes in template order.
    pub fn nodes(&self) -> &[NodeTemplate] {
        &self.nodes
    }

    /// Every placeholder the template references.
    pub fn placeholders(&self) -> BTreeSet<Placeholder> {
        self.nodes.iter().flat_map(|n| n.placeholders()).collect()
    }
}

/// Splits `text` into literal and placeholder segments.
fn scan(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        segments.push(Segment::Placeholder(rest[start + 2..start + 2 + len].trim()));
        rest = &rest[start + 2 + len + 2..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    segments
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

fn collect_placeholders(value: &Value, node: &str, found: &mut BTreeSet<Placeholder>) -> Result<()> {
    match value {
        Value::String(s) => check_text(s, node, found),
        Value::Array(items) => items
            .iter()
            .try_for_each(|v| collect_placeholders(v, node, found)),
        Value::Object(map) => {
            for (key, v) in map {
                check_text(key, node, found)?;
                collect_placeholders(v, node, found)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_text(text: &str, node: &str, found: &mut BTreeSet<Placeholder>) -> Result<()> {
    for segment in scan(text) {
        if let Segment::Placeholder(name) = segment {
            let placeholder =
                Placeholder::parse(name).ok_or_else(|| FlowTestError::UnknownPlaceholder {
                    node: node.to_string(),
                    placeholder: name.to_string(),
                })?;
            found.insert(placeholder);
        }
    }
    Ok(())
}

fn lookup<'a>(bindings: &'a Bindings, name: &str, node: &str) -> Result<&'a Value> {
    let placeholder = Placeholder::parse(name).ok_or_else(|| FlowTestError::UnknownPlaceholder {
        node: node.to_string(),
        placeholder: name.to_string(),
    })?;
    bindings.get(placeholder).ok_or_else(|| {
        FlowTestError::Template(format!("no value bound for {} in node '{}'", placeholder, node))
    })
}

/// A string consisting of exactly one placeholder, if any.
fn whole_placeholder(text: &str) -> Option<&str> {
    match scan(text).as_slice() {
        [Segment::Placeholder(name)] => Some(*name),
        _ => None,
    }
}

/// Binds every placeholder in `value`.
///
/// A string that is exactly one placeholder takes the bound value as is
/// (numbers and objects included). Placeholders embedded in longer text are
/// rendered as text. An object key that is exactly a placeholder bound to an
/// object is replaced by that object's entries.
fn substitute(value: &Value, bindings: &Bindings, node: &str) -> Result<Value> {
    match value {
        Value::String(s) => {
            if let Some(name) = whole_placeholder(s) {
                return lookup(bindings, name, node).cloned();
            }
            Ok(Value::String(substitute_text(s, bindings, node)?))
        }
        Value::Array(items) => items
            .iter()
            .map(|v| substitute(v, bindings, node))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, v) in map {
                if let Some(name) = whole_placeholder(key) {
                    match lookup(bindings, name, node)? {
                        Value::Object(spread) => {
                            for (k, sv) in spread {
                                out.insert(k.clone(), sv.clone());
                            }
                            continue;
                        }
                        other => {
                            return Err(FlowTestError::Template(format!(
                                "placeholder key {{{{{}}}}} in node '{}' must be bound to an object, found {}",
                                name, node, other
                            )))
                        }
                    }
                }
                let key = substitute_text(key, bindings, node)?;
                out.insert(key, substitute(v, bindings, node)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_text(text: &str, bindings: &Bindings, node: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    for segment in scan(text) {
        match segment {
            Segment::Literal(s) => out.push_str(s),
            Segment::Placeholder(name) => match lookup(bindings, name, node)? {
                Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            },
        }
    }
    Ok(out)
}

fn parse_position(location: &Value, node: &str) -> Result<Position> {
    let coord = |axis: &str| -> Result<f64> {
        let raw = match location {
            Value::Object(map) => map.get(axis),
            Value::Array(items) => items.get(if axis == "x" { 0 } else { 1 }),
            Value::Null => return Ok(0.0),
            _ => None,
        };
        let parsed = match raw {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            None => Some(0.0),
            _ => None,
        };
        parsed.ok_or_else(|| {
            FlowTestError::Template(format!("node '{}' has an invalid location {}", node, location))
        })
    };

    Ok(Position::new(coord("x")?, coord("y")?))
}
