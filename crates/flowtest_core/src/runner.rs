//! Suite runner: one sandbox per flow, test cases in sequence.

use crate::config::{Config, CorpusConfig};
use crate::discovery::TestSuites;
use crate::endpoint::TestEndpoint;
use crate::error::Result;
use crate::executor::TestCaseExecutor;
use crate::lifecycle::{FlowLifecycle, LifecycleOptions};
use crate::overrides::SensitiveOverride;
use crate::platform::FlowPlatform;
use crate::report::{FlowReport, RunReport};
use crate::subprocess::CommandRunner;
use crate::template::HarnessTemplate;
use crate::types::{TestCase, TestResult};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Progress callback: `(test cases done, total test cases, flow)`.
pub type ProgressCallback = dyn Fn(usize, usize, &str);

/// Runtime settings for a suite run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Lifecycle settings.
    pub lifecycle: LifecycleOptions,
    /// How test-case documents are read.
    pub corpus: CorpusConfig,
    /// Port the request injector listens on.
    pub test_api_port: u16,
    /// Pause between harness start and submission.
    pub stabilize_delay: Duration,
}

impl RunSettings {
    /// Derives settings from a loaded configuration and override list.
    pub fn from_config(config: &Config, overrides: Vec<SensitiveOverride>) -> Self {
        Self {
            lifecycle: LifecycleOptions {
                versions: config.flows.versions.clone(),
                aggregate_flow: config.flows.aggregate_flow.clone(),
                aggregate_child: config.flows.aggregate_child.clone(),
                overrides,
                purge_parameter_contexts: config.harness.purge_parameter_contexts,
            },
            corpus: config.corpus.clone(),
            test_api_port: config.harness.test_api_port,
            stabilize_delay: config.harness.stabilize_delay(),
        }
    }
}

/// Drives every flow batch of a run.
pub struct SuiteRunner<'a> {
    platform: &'a dyn FlowPlatform,
    endpoint: &'a dyn TestEndpoint,
    commands: &'a dyn CommandRunner,
    template: &'a HarnessTemplate,
    settings: RunSettings,
    progress: Option<&'a ProgressCallback>,
}

impl<'a> SuiteRunner<'a> {
    /// Creates a runner.
    pub fn new(
        platform: &'a dyn FlowPlatform,
        endpoint: &'a dyn TestEndpoint,
        commands: &'a dyn CommandRunner,
        template: &'a HarnessTemplate,
        settings: RunSettings,
    ) -> Self {
        Self {
            platform,
            endpoint,
            commands,
            template,
            settings,
            progress: None,
        }
    }

    /// Reports progress through `callback`.
    pub fn with_progress(mut self, callback: &'a ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Runs every flow batch in order.
    ///
    /// Setup failures and test-case load failures abort only the affected
    /// batch. A teardown failure stops the run and is returned.
    pub fn run(&self, suites: &TestSuites) -> Result<RunReport> {
        let total: usize = suites.values().map(Vec::len).sum();
        let mut done = 0;
        let mut report = RunReport::default();

        for (flow, cases) in suites {
            if cases.is_empty() {
                continue;
            }
            self.notify(done, total, flow);
            let flow_report = self.run_flow(flow, cases, done, total)?;
            if !flow_report.is_success() {
                report.verdict.downgrade();
            }
            report.flows.push(flow_report);
            done += cases.len();
        }

        info!(
            verdict = %report.verdict,
            flows = report.flows.len(),
            failed = report.failed_count(),
            total = report.total_count(),
            "Run finished"
        );
        Ok(report)
    }

    fn run_flow(
        &self,
        flow: &str,
        cases: &[PathBuf],
        done: usize,
        total: usize,
    ) -> Result<FlowReport> {
        let mut report = FlowReport::new(flow);
        let mut lifecycle = FlowLifecycle::new(self.platform, &self.settings.lifecycle, flow);

        match lifecycle.setup() {
            Ok(()) => {
                if let Err(e) = self.run_cases(&lifecycle, cases, &mut report, done, total) {
                    error!(flow, error = %e, "Flow batch aborted");
                    report.aborted = Some(e.to_string());
                }
            }
            Err(e) => report.aborted = Some(format!("setup failed: {}", e)),
        }
        report.setup = lifecycle.setup_duration();
        report.deployment = lifecycle.deployment().cloned();

        let teardown = lifecycle.teardown();
        report.teardown = lifecycle.teardown_duration();
        if let Err(e) = teardown {
            error!(flow, error = %e, "Flow teardown failed");
            return Err(e);
        }

        Ok(report)
    }

    fn run_cases(
        &self,
        lifecycle: &FlowLifecycle<'_>,
        cases: &[PathBuf],
        report: &mut FlowReport,
        done: usize,
        total: usize,
    ) -> Result<()> {
        let ctx = lifecycle.context()?;
        let executor = TestCaseExecutor::new(
            self.platform,
            self.endpoint,
            self.commands,
            self.template,
            self.settings.test_api_port,
            self.settings.stabilize_delay,
        );

        for (index, path) in cases.iter().enumerate() {
            let case = TestCase::load(path, &self.settings.corpus)?;
            let outcome = executor.run(&ctx, &case);
            if outcome.result == TestResult::Failed {
                warn!(flow = ctx.flow_name, test_case = case.name.as_str(), "Test case FAILED");
            }
            report.record(case.name, outcome);
            self.notify(done + index + 1, total, ctx.flow_name);
        }
        Ok(())
    }

    fn notify(&self, done: usize, total: usize, flow: &str) {
        if let Some(cb) = self.progress {
            cb(done, total, flow);
        }
    }
}
