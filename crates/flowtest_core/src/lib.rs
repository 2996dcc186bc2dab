//! flowtest Core Library
//!
//! End-to-end test orchestration for NiFi dataflows:
//! - One disposable sandbox process group per flow under test
//! - Controller services enabled in dependency order, disabled in reverse
//! - A templated harness wrapped around the deployed flow for each test case
//! - Assertion expressions synthesized from expected attributes
//! - Per-flow and whole-run reports
//!
//! # Quick Start
//!
//! ```no_run
//! use flowtest_core::{
//!     discover, load_overrides, Config, HarnessTemplate, HttpTestEndpoint, NifiClient, RunSettings,
//!     ShellRunner, SuiteRunner,
//! };
//! use std::path::Path;
//!
//! # fn main() -> flowtest_core::Result<()> {
//! let config = Config::load(Path::new("flowtest.toml"))?;
//! let suites = discover(&config.test_data_root(), &config.corpus)?;
//! let template = HarnessTemplate::load(&config.resolve(&config.harness.template))?;
//!
//! let platform = NifiClient::new(&config.nifi, &config.registry)?;
//! let endpoint = HttpTestEndpoint::new(config.harness.test_endpoint_url());
//! let commands = ShellRunner;
//!
//! let settings = RunSettings::from_config(&config, Vec::new());
//! let report = SuiteRunner::new(&platform, &endpoint, &commands, &template, settings).run(&suites)?;
//! println!("{}", report.render());
//! # Ok(())
//! # }
//! ```
//!
//! # Assertion expressions
//!
//! ```
//! use flowtest_core::{AssertionReport, AttributeMap};
//!
//! let expected: AttributeMap = [("status", "ok")].into_iter().collect();
//! let report = AssertionReport::from_expected(&expected);
//! assert_eq!(report.flow_attributes_match, "${status:equals('ok')}");
//! ```

mod assertion;
mod config;
mod discovery;
mod endpoint;
mod error;
mod executor;
mod harness;
mod lifecycle;
mod lock;
mod nifi;
mod overrides;
mod platform;
mod report;
mod resolver;
mod runner;
mod secrets;
mod subprocess;
mod template;
mod types;

pub use assertion::{
    attribute_reference, attributes_match_expression, AssertionReport, ALWAYS_TRUE_EXPRESSION,
    CONTENT_MATCH_EXPRESSION, EXPECTED_CONTENT_ATTRIBUTE,
};
pub use config::{
    Config, CorpusConfig, FlowsConfig, HarnessConfig, NifiConfig, RegistryConfig, VaultConfig,
    CONFIG_FILE_NAME,
};
pub use discovery::{discover, fetch_corpus, is_test_case_name, TestSuites};
pub use endpoint::{
    EndpointResponse, HttpTestEndpoint, Submission, TestEndpoint, CONTENT_MATCH, UPLOAD_FIELD,
};
pub use error::{FlowTestError, Result};
pub use executor::{harness_inputs, submission, TestCaseExecutor};
pub use harness::{
    chain_links, input_attributes, linear_chain, HarnessBuilder, HarnessGraph, HarnessInputs,
    UPDATE_ATTRIBUTE_TYPE,
};
pub use lifecycle::{
    Deployment, FlowLifecycle, LifecycleOptions, LifecycleState, SandboxContext,
    CONTEXT_MAP_NAME, CONTEXT_MAP_TYPE, DEPLOY_POSITION,
};
pub use lock::{RunClaim, RunLock, LOCK_FILE_NAME};
pub use nifi::NifiClient;
pub use overrides::{apply_overrides, load_overrides, SensitiveOverride};
pub use platform::{
    Component, ComponentKind, Connection, ControllerService, FlowPlatform, FlowVersion,
    ParameterContext, PortKind, Position, ProcessGroup, ProcessorSpec, ReferenceType,
    ReferencingComponent,
};
pub use report::{hms, CaseReport, FlowReport, RunReport, RunVerdict};
pub use resolver::{disable_services, enable_services, resolve_order, DependencyGraph, ServiceOrder};
pub use runner::{ProgressCallback, RunSettings, SuiteRunner};
pub use secrets::VaultTransit;
pub use subprocess::{CommandRunner, ShellRunner};
pub use template::{Bindings, HarnessRole, HarnessTemplate, NodeTemplate, Placeholder};
pub use types::{
    read_text, AttributeMap, LoadFileType, SubprocessSettings, TestCase, TestOutcome, TestResult,
    TestSettings, TEST_CASE_EXTENSION,
};
