use anyhow::{Context, Result};
use flowtest_core::HarnessTemplate;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Harness template shipped with the repository.
const HARNESS_TEMPLATE: &str = include_str!("../../../config/harness.json");

/// Parses the shipped harness template.
pub fn shipped_template() -> Result<HarnessTemplate> {
    Ok(HarnessTemplate::from_json(HARNESS_TEMPLATE)?)
}

/// One test-case document plus its input and expected output files.
#[derive(Debug, Clone)]
pub struct CaseSpec {
    pub name: String,
    pub input: Option<(String, String)>,
    pub expected_output: Option<(String, String)>,
    pub input_attributes: Vec<(String, String)>,
    pub expected_attributes: Vec<(String, String)>,
    pub settings: Option<Value>,
}

impl CaseSpec {
    /// A case with no files and no attributes.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            input: None,
            expected_output: None,
            input_attributes: Vec::new(),
            expected_attributes: Vec::new(),
            settings: None,
        }
    }

    pub fn input(mut self, file_name: &str, content: &str) -> Self {
        self.input = Some((file_name.to_string(), content.to_string()));
        self
    }

    pub fn expected_output(mut self, file_name: &str, content: &str) -> Self {
        self.expected_output = Some((file_name.to_string(), content.to_string()));
        self
    }

    pub fn input_attribute(mut self, key: &str, value: &str) -> Self {
        self.input_attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn expected_attribute(mut self, key: &str, value: &str) -> Self {
        self.expected_attributes
            .push((key.to_string(), value.to_string()));
        self
    }

    pub fn settings(mut self, settings: Value) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Shorthand for a `subprocess.before` command.
    pub fn before(self, command: &str) -> Self {
        self.settings(json!({"subprocess": {"before": command}}))
    }

    fn document(&self) -> Value {
        let file_name = |file: &Option<(String, String)>| match file {
            Some((name, _)) => Value::String(name.clone()),
            None => Value::Null,
        };
        let attributes = |pairs: &[(String, String)]| {
            let mut map = Map::new();
            for (k, v) in pairs {
                map.insert(k.clone(), Value::String(v.clone()));
            }
            Value::Object(map)
        };

        let mut document = json!({
            "input": {
                "file_name": file_name(&self.input),
                "attributes": attributes(&self.input_attributes),
            },
            "expected_output": {
                "file_name": file_name(&self.expected_output),
                "attributes": attributes(&self.expected_attributes),
            },
        });
        if let (Some(settings), Some(object)) = (&self.settings, document.as_object_mut()) {
            object.insert("settings".to_string(), settings.clone());
        }
        document
    }
}

/// Manages an isolated corpus directory with tempfile
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Create a workspace with an empty `test-data/` tree
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        fs::create_dir_all(dir.path().join("test-data"))
            .context("Failed to create test-data directory")?;
        Ok(Self { dir })
    }

    /// Get workspace path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Root of the test-data tree
    pub fn test_data(&self) -> PathBuf {
        self.path().join("test-data")
    }

    /// Write a test case under `test-data/<flow>/`
    pub fn write_case(&self, flow: &str, case: &CaseSpec) -> Result<PathBuf> {
        let dir = self.test_data().join(flow);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory for flow {}", flow))?;

        for (file_name, content) in case.input.iter().chain(case.expected_output.iter()) {
            fs::write(dir.join(file_name), content)
                .with_context(|| format!("Failed to write {}", file_name))?;
        }

        let path = dir.join(format!("{}.json", case.name));
        let document = serde_json::to_string_pretty(&case.document())?;
        fs::write(&path, document)
            .with_context(|| format!("Failed to write test case {}", case.name))?;
        Ok(path)
    }

    /// Write a raw file under `test-data/`
    pub fn write_raw(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.test_data().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directories for {}", relative))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write file: {}", relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtest_core::{CorpusConfig, TestCase};

    #[test]
    fn test_written_case_loads() {
        let workspace = TestWorkspace::new().unwrap();
        let spec = CaseSpec::new("validate_tc1")
            .input("in.txt", "hello")
            .expected_output("out.txt", "HELLO")
            .input_attribute("a", "1")
            .expected_attribute("b", "2")
            .before("echo hi");

        let path = workspace.write_case("validate", &spec).unwrap();
        let case = TestCase::load(&path, &CorpusConfig::default()).unwrap();

        assert_eq!(case.name, "validate_tc1");
        assert_eq!(case.input_file_name, "in.txt");
        assert_eq!(case.expected_attributes.get("b"), Some("2"));
        assert_eq!(case.settings.subprocess.before, "echo hi");
    }

    #[test]
    fn test_shipped_template_parses() {
        let template = shipped_template().unwrap();
        assert_eq!(template.nodes().len(), 7);
    }
}
