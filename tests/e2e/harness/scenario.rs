use super::assertions::Assertion;
use super::platform::FlowBlueprint;
use super::runner::{ScenarioRunner, ScenarioSetup};
use super::workspace::CaseSpec;
use flowtest_core::{CorpusConfig, Deployment, RunVerdict, SensitiveOverride, TestResult};
use serde_json::{Map, Value};

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    setup: ScenarioSetup,
    assertions: Vec<Assertion>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            setup: ScenarioSetup::default(),
            assertions: Vec::new(),
        }
    }

    // ===== Registry and canvas =====

    /// Register a flow and map its first version
    pub fn with_flow(mut self, name: &str, blueprint: FlowBlueprint) -> Self {
        if let Some(version) = blueprint.versions.first() {
            self.setup.versions.insert(name.to_string(), *version);
        }
        self.setup.flows.push((name.to_string(), blueprint));
        self
    }

    /// Register a flow without mapping a version for it
    pub fn with_unmapped_flow(mut self, name: &str, blueprint: FlowBlueprint) -> Self {
        self.setup.flows.push((name.to_string(), blueprint));
        self
    }

    /// Map a flow to a registry version
    pub fn map_version(mut self, name: &str, version: u32) -> Self {
        self.setup.versions.insert(name.to_string(), version);
        self
    }

    /// Test `child` instead of the full `flow`
    pub fn with_aggregate(mut self, flow: &str, child: &str) -> Self {
        self.setup.aggregate = Some((flow.to_string(), child.to_string()));
        self
    }

    /// Add a sensitive-property override by processor name
    pub fn with_override(mut self, processor_name: &str, key: &str, value: &str) -> Self {
        let mut properties = Map::new();
        properties.insert(key.to_string(), Value::String(value.to_string()));
        self.setup.overrides.push(SensitiveOverride {
            processor_name: Some(processor_name.to_string()),
            processor_type: None,
            properties,
        });
        self
    }

    /// Leave parameter contexts alone at teardown
    pub fn keep_parameter_contexts(mut self) -> Self {
        self.setup.keep_parameter_contexts = true;
        self
    }

    // ===== Corpus =====

    /// Add a test case under `test-data/<flow>/`
    pub fn with_case(mut self, flow: &str, case: CaseSpec) -> Self {
        self.setup.cases.push((flow.to_string(), case));
        self
    }

    /// Add a raw file under `test-data/`
    pub fn with_raw_file(mut self, path: &str, content: &str) -> Self {
        self.setup
            .raw_files
            .push((path.to_string(), content.to_string()));
        self
    }

    pub fn with_corpus(mut self, corpus: CorpusConfig) -> Self {
        self.setup.corpus = Some(corpus);
        self
    }

    // ===== Endpoint and commands =====

    /// Queue a response body
    pub fn endpoint_responds(mut self, body: &str) -> Self {
        self.setup.responses.push(Ok(body.to_string()));
        self
    }

    /// Queue an endpoint transport failure
    pub fn endpoint_fails(mut self, message: &str) -> Self {
        self.setup.responses.push(Err(message.to_string()));
        self
    }

    /// Response once the queue is exhausted
    pub fn endpoint_defaults_to(mut self, body: &str) -> Self {
        self.setup.fallback_response = Some(body.to_string());
        self
    }

    /// Make a shell command exit non-zero
    pub fn command_fails(mut self, command: &str) -> Self {
        self.setup.failing_commands.push(command.to_string());
        self
    }

    // ===== Failure simulation =====

    /// Fail every platform call of `operation`
    pub fn platform_fails(mut self, operation: &str) -> Self {
        self.setup
            .platform_failures
            .push((operation.to_string(), None));
        self
    }

    /// Fail platform calls of `operation` on `target`
    pub fn platform_fails_on(mut self, operation: &str, target: &str) -> Self {
        self.setup
            .platform_failures
            .push((operation.to_string(), Some(target.to_string())));
        self
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn assert_verdict(self, verdict: RunVerdict) -> Self {
        self.assert(Assertion::Verdict(verdict))
    }

    pub fn assert_passed(self, flow: &str, case: &str) -> Self {
        self.assert(Assertion::CaseResult {
            flow: flow.to_string(),
            case: case.to_string(),
            result: TestResult::Passed,
        })
    }

    pub fn assert_failed(self, flow: &str, case: &str) -> Self {
        self.assert(Assertion::CaseResult {
            flow: flow.to_string(),
            case: case.to_string(),
            result: TestResult::Failed,
        })
    }

    pub fn assert_case_error(self, flow: &str, case: &str, text: &str) -> Self {
        self.assert(Assertion::CaseErrorContains {
            flow: flow.to_string(),
            case: case.to_string(),
            text: text.to_string(),
        })
    }

    pub fn assert_aborted(self, flow: &str, text: &str) -> Self {
        self.assert(Assertion::FlowAborted {
            flow: flow.to_string(),
            text: text.to_string(),
        })
    }

    pub fn assert_completed(self, flow: &str) -> Self {
        self.assert(Assertion::FlowCompleted(flow.to_string()))
    }

    pub fn assert_deployment(self, flow: &str, deployment: Deployment) -> Self {
        self.assert(Assertion::Deployment {
            flow: flow.to_string(),
            deployment,
        })
    }

    pub fn assert_degraded(self, flow: &str) -> Self {
        self.assert(Assertion::DegradedDeployment(flow.to_string()))
    }

    pub fn assert_report_contains(self, flow: &str, text: &str) -> Self {
        self.assert(Assertion::ReportContains {
            flow: flow.to_string(),
            text: text.to_string(),
        })
    }

    pub fn assert_run_failed(self, text: &str) -> Self {
        self.assert(Assertion::RunFailed(text.to_string()))
    }

    /// Assert the calls appear in this relative order
    pub fn assert_calls_in_order(self, calls: &[&str]) -> Self {
        self.assert(Assertion::CallsInOrder(
            calls.iter().map(|c| c.to_string()).collect(),
        ))
    }

    pub fn assert_no_call(self, pattern: &str) -> Self {
        self.assert(Assertion::NoCall(pattern.to_string()))
    }

    pub fn assert_call_count(self, pattern: &str, count: usize) -> Self {
        self.assert(Assertion::CallCount {
            pattern: pattern.to_string(),
            count,
        })
    }

    /// Assert no group, connection or template is left behind
    pub fn assert_canvas_clean(self) -> Self {
        self.assert(Assertion::CanvasClean)
    }

    pub fn assert_parameter_contexts(self, count: usize) -> Self {
        self.assert(Assertion::ParameterContextCount(count))
    }

    pub fn assert_endpoint_calls(self, count: usize) -> Self {
        self.assert(Assertion::EndpointCalls(count))
    }

    pub fn assert_commands(self, commands: &[&str]) -> Self {
        self.assert(Assertion::CommandsRun(
            commands.iter().map(|c| c.to_string()).collect(),
        ))
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let step_count = self.assertions.len();
        let mut runner = match ScenarioRunner::new(self.setup) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.assertions) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: step_count,
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
