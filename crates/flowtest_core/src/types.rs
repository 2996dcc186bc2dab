//! Test-case documents and per-test-case outcomes.

use crate::config::CorpusConfig;
use crate::error::{FlowTestError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Suffix of test-case documents.
pub const TEST_CASE_EXTENSION: &str = "json";

/// Ordered attribute name → value mapping.
///
/// Document order is kept so that everything derived from it (assertion
/// expressions in particular) is byte-for-byte reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap(Vec<(String, String)>);

impl AttributeMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from a JSON object, rendering non-string scalars as text.
    ///
    /// `null` and a missing value both yield an empty map.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(map) => Ok(Self(
                map.iter()
                    .map(|(k, v)| (k.clone(), scalar_to_string(v)))
                    .collect(),
            )),
            other => Err(FlowTestError::Deserialization(format!(
                "expected an attribute object, found {}",
                json_kind(other)
            ))),
        }
    }

    /// Sets `key` to `value`, replacing an existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Returns the value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the map as a JSON object, keeping order.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

impl Serialize for AttributeMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// How the test input is submitted to the flow's test endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadFileType {
    /// Input content is injected by the harness; the endpoint is called with a bare GET.
    #[default]
    Text,
    /// Input file is uploaded as multipart form data.
    Binary,
}

impl<'de> Deserialize<'de> for LoadFileType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // Anything that is not "binary" is treated as text
        if raw.trim().eq_ignore_ascii_case("binary") {
            Ok(Self::Binary)
        } else {
            Ok(Self::Text)
        }
    }
}

/// Shell commands run around a test case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubprocessSettings {
    /// Runs after the harness is built, before the endpoint is called.
    #[serde(default)]
    pub before: String,
    /// Runs after the response has been evaluated.
    #[serde(default)]
    pub after: String,
}

/// Optional per-test-case settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSettings {
    /// Text (default) or binary upload.
    #[serde(default)]
    pub load_file_type: LoadFileType,
    /// Do not inject the input content into the flow file.
    #[serde(default, deserialize_with = "flexible_bool")]
    pub skip_replace_text_in: bool,
    /// Treat the content comparison as matching regardless of the response.
    #[serde(default, deserialize_with = "flexible_bool")]
    pub skip_check_out_content: bool,
    /// Pre/post commands.
    #[serde(default)]
    pub subprocess: SubprocessSettings,
}

impl TestSettings {
    /// Returns true when the input is uploaded as a file.
    pub fn is_binary(&self) -> bool {
        self.load_file_type == LoadFileType::Binary
    }
}

/// A single loaded test-case document.
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Test-case name (file stem).
    pub name: String,
    /// Directory holding the document and its input/output files.
    pub dir: PathBuf,
    /// Input file name relative to `dir` (empty when the case has no input).
    pub input_file_name: String,
    /// Expected output file name relative to `dir` (empty when no content is expected).
    pub expected_output_file_name: String,
    /// Attributes set on the injected flow file.
    pub input_attributes: AttributeMap,
    /// Attributes the output flow file must carry.
    pub expected_attributes: AttributeMap,
    /// Optional settings block.
    pub settings: TestSettings,
}

impl TestCase {
    /// Loads a test-case document, extracting fields through the configured JSON pointers.
    pub fn load(path: &Path, corpus: &CorpusConfig) -> Result<Self> {
        let load_err = |reason: String| FlowTestError::TestCaseLoad {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let document: Value =
            serde_json::from_str(&content).map_err(|e| load_err(e.to_string()))?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| load_err("file has no name".to_string()))?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let input_file_name =
            required_string(&document, &corpus.input_file_name_pointer).map_err(load_err)?;
        let expected_output_file_name =
            required_string(&document, &corpus.expected_output_file_name_pointer)
                .map_err(load_err)?;
        let input_attributes =
            AttributeMap::from_json(document.pointer(&corpus.input_attributes_pointer).unwrap_or(&Value::Null))
                .map_err(|e| load_err(e.to_string()))?;
        let expected_attributes = AttributeMap::from_json(
            document
                .pointer(&corpus.expected_output_attributes_pointer)
                .unwrap_or(&Value::Null),
        )
        .map_err(|e| load_err(e.to_string()))?;

        let settings = match document.get("settings") {
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| load_err(format!("invalid settings: {}", e)))?,
            None => TestSettings::default(),
        };

        Ok(Self {
            name,
            dir,
            input_file_name,
            expected_output_file_name,
            input_attributes,
            expected_attributes,
            settings,
        })
    }

    /// Full path of the input file, if the case has one.
    pub fn input_path(&self) -> Option<PathBuf> {
        (!self.input_file_name.is_empty()).then(|| self.dir.join(&self.input_file_name))
    }

    /// Full path of the expected output file, if the case has one.
    pub fn expected_output_path(&self) -> Option<PathBuf> {
        (!self.expected_output_file_name.is_empty())
            .then(|| self.dir.join(&self.expected_output_file_name))
    }
}

/// Reads a text file, normalizing Windows line endings.
pub fn read_text(path: &Path) -> Result<String> {
    Ok(fs::read_to_string(path)?.replace("\r\n", "\n"))
}

/// Result tag of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestResult {
    /// Attributes and content matched.
    Passed,
    /// Mismatch or error.
    Failed,
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Outcome of a single test case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
    /// Pass/fail tag.
    pub result: TestResult,
    /// Wall-clock time spent on the case, harness setup and teardown included.
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Error message when the case failed because of a fault rather than a mismatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestOutcome {
    /// Creates an outcome without an attached error.
    pub fn new(result: TestResult, elapsed: Duration) -> Self {
        Self {
            result,
            elapsed,
            error: None,
        }
    }
}

pub(crate) fn serialize_secs<S: serde::Serializer>(
    d: &Duration,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64((d.as_secs_f64() * 100.0).round() / 100.0)
}

fn required_string(document: &Value, pointer: &str) -> std::result::Result<String, String> {
    match document.pointer(pointer) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) => Ok(String::new()),
        Some(other) => Err(format!(
            "expected a string at '{}', found {}",
            pointer,
            json_kind(other)
        )),
        None => Err(format!("missing field at '{}'", pointer)),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Accepts `true`/`false` as booleans or as case-insensitive strings.
fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Text(s) => Ok(s.trim().eq_ignore_ascii_case("true")),
    }
}
