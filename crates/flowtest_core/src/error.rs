//! Error types for flowtest_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for flowtest_core operations.
#[derive(Error, Debug)]
pub enum FlowTestError {
    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// No registry version is mapped for the flow under test.
    #[error("no flow version mapped for flow '{flow}'")]
    FlowVersionNotMapped {
        /// Flow name as discovered from the test-data directory
        flow: String,
    },

    /// A remote platform call failed.
    #[error("platform call '{operation}' failed: {message}")]
    Platform {
        /// Short name of the operation that failed
        operation: String,
        /// Error detail reported by the transport or the platform
        message: String,
    },

    /// A named platform object could not be found.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Kind of object (process group, bucket, processor type, ...)
        kind: &'static str,
        /// Name or identifier that was looked up
        name: String,
    },

    /// Test-case document could not be loaded.
    #[error("failed to load test case {}: {}", path.display(), reason)]
    TestCaseLoad {
        /// Path to the test-case document
        path: PathBuf,
        /// Description of what went wrong
        reason: String,
    },

    /// Harness template is invalid.
    #[error("harness template error: {0}")]
    Template(String),

    /// Harness template references a placeholder that is not recognized.
    #[error("unknown placeholder '{{{{{placeholder}}}}}' in harness node '{node}'")]
    UnknownPlaceholder {
        /// Node whose location or configuration carries the placeholder
        node: String,
        /// The unrecognized placeholder name
        placeholder: String,
    },

    /// An external shell command exited unsuccessfully.
    #[error("command '{command}' failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        /// The shell command line
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The flow's test endpoint could not be reached.
    #[error("test endpoint error: {0}")]
    Endpoint(String),

    /// The flow's test endpoint answered with something that is not the expected JSON.
    #[error("malformed test endpoint response: {0}")]
    MalformedResponse(String),

    /// A required field is missing from the test endpoint response.
    #[error("test endpoint response is missing field '{0}'")]
    MissingResponseField(&'static str),

    /// Invalid lifecycle state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state
        from: String,
        /// Target state
        to: String,
    },

    /// Another run holds the run lock.
    #[error("another run is in progress (PID: {pid}, config: {config}, flows: {flows})")]
    RunLockHeld {
        /// Process ID holding the lock
        pid: u32,
        /// Configuration file of the other run
        config: String,
        /// Flows the other run selected
        flows: String,
    },

    /// The run lock could not be acquired.
    #[error("run lock could not be acquired")]
    RunLocked,

    /// Secret transit encrypt/decrypt failed.
    #[error("secret transit error: {0}")]
    Secret(String),

    /// Deserialization error for documents read from disk or the network.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowTestError {
    /// Builds a [`FlowTestError::Platform`] from an operation name and any displayable error.
    pub fn platform(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Platform {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::FlowVersionNotMapped { .. } => {
                Some("Add the flow to [flows.versions] in flowtest.toml.")
            }
            Self::UnknownPlaceholder { .. } => Some(
                "Run 'flowtest template check' to list the placeholders the harness template may use.",
            ),
            Self::RunLockHeld { .. } | Self::RunLocked => Some(
                "Wait for the other run to finish; runs sharing a config cannot overlap.",
            ),
            Self::Platform { .. } => {
                Some("Check the NiFi URL and credentials in flowtest.toml and that NiFi is reachable.")
            }
            Self::Endpoint(_) => Some(
                "Check [harness] test_api_host/test_api_port and that the request handler node started.",
            ),
            Self::Config(_) => Some("Fix flowtest.toml; 'flowtest list' validates it without touching NiFi."),
            _ => None,
        }
    }
}

/// Convenience Result type for flowtest_core operations.
pub type Result<T> = std::result::Result<T, FlowTestError>;
