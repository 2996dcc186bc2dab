//! Configuration for a flowtest run.

use crate::error::{FlowTestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "flowtest.toml";

/// Comprehensive configuration for a flowtest run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// NiFi API connection.
    #[serde(default)]
    pub nifi: NifiConfig,

    /// NiFi Registry connection.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Where test cases live and how to read them.
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Flow versions under test.
    #[serde(default)]
    pub flows: FlowsConfig,

    /// Harness template and test endpoint.
    #[serde(default)]
    pub harness: HarnessConfig,

    /// Vault transit settings for the secret helper.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Directory the config was loaded from; relative paths resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Config {
    /// Load configuration from a file.
    ///
    /// A missing file yields the defaults. Environment overrides are applied
    /// in both cases.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| FlowTestError::Config(format!("failed to read config: {}", e)))?;
            Self::from_toml(&content)?
        } else {
            Config::default()
        };

        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.apply_env();
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| FlowTestError::Config(format!("failed to parse config: {}", e)))
    }

    /// Overrides credentials from `FLOWTEST_*` environment variables.
    fn apply_env(&mut self) {
        if let Ok(v) = env::var("FLOWTEST_NIFI_USERNAME") {
            self.nifi.username = Some(v);
        }
        if let Ok(v) = env::var("FLOWTEST_NIFI_PASSWORD") {
            self.nifi.password = Some(v);
        }
        if let Ok(v) = env::var("FLOWTEST_VAULT_TOKEN") {
            self.vault.token = Some(v);
        }
    }

    /// Resolves a configured path against the config file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Root of the test-data tree.
    pub fn test_data_root(&self) -> PathBuf {
        self.resolve(&self.corpus.repo_base_dir)
            .join(&self.corpus.test_data_dir)
    }
}

/// NiFi API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NifiConfig {
    /// Base URL of the REST API, including `/nifi-api`.
    pub url: String,
    /// Username for token login (no login when unset).
    pub username: Option<String>,
    /// Password for token login.
    pub password: Option<String>,
    /// Verify the server certificate (default: true).
    pub verify_tls: bool,
}

impl Default for NifiConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:8443/nifi-api".to_string(),
            username: None,
            password: None,
            verify_tls: true,
        }
    }
}

/// NiFi Registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry base URL, registered as a registry client when none exists.
    pub url: String,
    /// Bucket holding the flows under test.
    pub bucket: String,
    /// Name given to a newly registered registry client.
    pub client_name: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:18443".to_string(),
            bucket: "flow-unit-tests".to_string(),
            client_name: "NifiRegistry".to_string(),
        }
    }
}

/// Test corpus layout.
///
/// Pointers are RFC 6901 JSON pointers into each test-case document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Base directory of the corpus checkout.
    pub repo_base_dir: PathBuf,
    /// Test-data directory below `repo_base_dir`; first-level subdirectories are flow names.
    pub test_data_dir: PathBuf,
    /// Pointer to the input file name.
    pub input_file_name_pointer: String,
    /// Pointer to the expected output file name.
    pub expected_output_file_name_pointer: String,
    /// Pointer to the input attribute object.
    pub input_attributes_pointer: String,
    /// Pointer to the expected output attribute object.
    pub expected_output_attributes_pointer: String,
    /// Test-data subdirectories (relative, `/`-separated) to skip.
    pub skip_test_dirs: Vec<String>,
    /// Test-case file names to skip.
    pub skip_tests: Vec<String>,
    /// When non-empty, only these directories or file names run.
    pub include_only: Vec<String>,
    /// Git repository cloned into `repo_base_dir` before discovery.
    pub external_repo_git_url: Option<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            repo_base_dir: PathBuf::from("."),
            test_data_dir: PathBuf::from("test-data"),
            input_file_name_pointer: "/input/file_name".to_string(),
            expected_output_file_name_pointer: "/expected_output/file_name".to_string(),
            input_attributes_pointer: "/input/attributes".to_string(),
            expected_output_attributes_pointer: "/expected_output/attributes".to_string(),
            skip_test_dirs: Vec::new(),
            skip_tests: Vec::new(),
            include_only: Vec::new(),
            external_repo_git_url: None,
        }
    }
}

/// Flows under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowsConfig {
    /// Registry version to deploy per flow name.
    pub versions: BTreeMap<String, u32>,
    /// Top-level flow whose full deployment is replaced by one of its children.
    pub aggregate_flow: String,
    /// Child process group of the aggregate flow that is tested instead.
    pub aggregate_child: String,
}

impl Default for FlowsConfig {
    fn default() -> Self {
        Self {
            versions: BTreeMap::new(),
            aggregate_flow: "integration-platform".to_string(),
            aggregate_child: "Routing".to_string(),
        }
    }
}

/// Harness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Path of the harness node template (JSON).
    pub template: PathBuf,
    /// Host the request handler node is reachable on.
    pub test_api_host: String,
    /// Port the request handler node listens on.
    pub test_api_port: u16,
    /// Pause between harness start and test submission, in milliseconds.
    pub stabilize_delay_ms: u64,
    /// Optional path of the sensitive-property override list (JSON).
    pub sensitive_overrides: Option<PathBuf>,
    /// Delete every parameter context on the platform at teardown.
    pub purge_parameter_contexts: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("config/harness.json"),
            test_api_host: "nifi".to_string(),
            test_api_port: 8181,
            stabilize_delay_ms: 3000,
            sensitive_overrides: None,
            purge_parameter_contexts: true,
        }
    }
}

impl HarnessConfig {
    /// Returns the stabilization delay as a Duration.
    pub fn stabilize_delay(&self) -> Duration {
        Duration::from_millis(self.stabilize_delay_ms)
    }

    /// URL of the flow's test endpoint.
    pub fn test_endpoint_url(&self) -> String {
        format!("http://{}:{}/test", self.test_api_host, self.test_api_port)
    }
}

/// Vault transit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Vault base URL.
    pub url: Option<String>,
    /// Mount path of the transit engine.
    pub transit_path: String,
    /// Transit key name.
    pub key_name: Option<String>,
    /// Vault token.
    pub token: Option<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            url: None,
            transit_path: "transit".to_string(),
            key_name: None,
            token: None,
        }
    }
}
