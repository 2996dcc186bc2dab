//! Single test-case execution.

use crate::assertion::AssertionReport;
use crate::endpoint::{EndpointResponse, Submission, TestEndpoint};
use crate::error::{FlowTestError, Result};
use crate::harness::{self, HarnessBuilder, HarnessGraph, HarnessInputs};
use crate::lifecycle::SandboxContext;
use crate::platform::FlowPlatform;
use crate::subprocess::CommandRunner;
use crate::template::{HarnessRole, HarnessTemplate};
use crate::types::{read_text, TestCase, TestOutcome, TestResult};
use std::collections::BTreeSet;
use std::fs;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Runs test cases against a ready sandbox.
pub struct TestCaseExecutor<'a> {
    platform: &'a dyn FlowPlatform,
    endpoint: &'a dyn TestEndpoint,
    commands: &'a dyn CommandRunner,
    template: &'a HarnessTemplate,
    test_api_port: u16,
    stabilize_delay: Duration,
}

impl<'a> TestCaseExecutor<'a> {
    /// Creates an executor.
    pub fn new(
        platform: &'a dyn FlowPlatform,
        endpoint: &'a dyn TestEndpoint,
        commands: &'a dyn CommandRunner,
        template: &'a HarnessTemplate,
        test_api_port: u16,
        stabilize_delay: Duration,
    ) -> Self {
        Self {
            platform,
            endpoint,
            commands,
            template,
            test_api_port,
            stabilize_delay,
        }
    }

    /// Runs one test case and records its outcome.
    ///
    /// Never fails: any error becomes a FAILED outcome carrying the message.
    /// The harness is torn down whatever happened.
    pub fn run(&self, ctx: &SandboxContext<'_>, case: &TestCase) -> TestOutcome {
        let start = Instant::now();
        info!(flow = ctx.flow_name, test_case = case.name.as_str(), "Running test case");

        let builder = HarnessBuilder::new(self.platform, self.template, self.test_api_port);
        let mut graph = HarnessGraph::default();

        let mut outcome = match self.execute(&builder, ctx, case, &mut graph) {
            Ok(result) => TestOutcome::new(result, Duration::ZERO),
            Err(e) => {
                error!(test_case = case.name.as_str(), error = %e, "Test case failed with error");
                TestOutcome {
                    result: TestResult::Failed,
                    elapsed: Duration::ZERO,
                    error: Some(e.to_string()),
                }
            }
        };

        if let Err(e) = builder.teardown(ctx, &graph) {
            error!(test_case = case.name.as_str(), error = %e, "Harness teardown failed");
            outcome.result = TestResult::Failed;
            outcome.error = Some(match outcome.error.take() {
                Some(previous) => format!("{}; harness teardown: {}", previous, e),
                None => format!("harness teardown: {}", e),
            });
        }

        outcome.elapsed = start.elapsed();
        info!(
            test_case = case.name.as_str(),
            result = %outcome.result,
            elapsed_secs = outcome.elapsed.as_secs_f64(),
            "Test case finished"
        );
        outcome
    }

    fn execute(
        &self,
        builder: &HarnessBuilder<'_>,
        ctx: &SandboxContext<'_>,
        case: &TestCase,
        graph: &mut HarnessGraph,
    ) -> Result<TestResult> {
        let inputs = harness_inputs(case)?;
        builder.build(ctx, &inputs, graph)?;

        self.commands
            .run(&case.settings.subprocess.before, Some(&case.dir))?;

        if !self.stabilize_delay.is_zero() {
            thread::sleep(self.stabilize_delay);
        }

        let submission = submission(case)?;
        let body = self.endpoint.submit(&submission)?;
        let response = EndpointResponse::parse(&body, case.settings.skip_check_out_content)?;

        let result = if response.passed() {
            TestResult::Passed
        } else {
            warn!(
                test_case = case.name.as_str(),
                attributes_match = response.flow_attributes_match.as_str(),
                content_match = response.flow_content_match.as_str(),
                response = body.as_str(),
                "Assertions did not match"
            );
            TestResult::Failed
        };

        self.commands
            .run(&case.settings.subprocess.after, Some(&case.dir))?;
        Ok(result)
    }
}

/// Everything the harness needs from a test case.
pub fn harness_inputs(case: &TestCase) -> Result<HarnessInputs> {
    let input_content = match case.input_path() {
        Some(path) if !case.settings.is_binary() => read_text(&path)?,
        _ => String::new(),
    };
    let expected_output_content = match case.expected_output_path() {
        Some(path) => read_text(&path)?,
        None => String::new(),
    };

    let mut skip = BTreeSet::new();
    if case.input_file_name.is_empty() || case.settings.skip_replace_text_in {
        skip.insert(HarnessRole::ContentInjector);
    }

    Ok(HarnessInputs {
        input_attributes: harness::input_attributes(&case.input_attributes, &expected_output_content),
        report: Some(AssertionReport::from_expected(&case.expected_attributes)),
        input_content,
        expected_output_content,
        skip,
    })
}

/// Binary cases with an input file upload it; everything else is a GET.
pub fn submission(case: &TestCase) -> Result<Submission> {
    match case.input_path() {
        Some(path) if case.settings.is_binary() => {
            let content = fs::read(&path).map_err(|e| FlowTestError::TestCaseLoad {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            Ok(Submission::Upload {
                file_name: case.input_file_name.clone(),
                content,
            })
        }
        _ => Ok(Submission::Get),
    }
}
