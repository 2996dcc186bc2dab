//! Run report aggregation.
//!
//! Pure bookkeeping: nothing here talks to the platform or changes control
//! flow.

use crate::lifecycle::Deployment;
use crate::types::{serialize_secs, TestOutcome, TestResult};
use serde::Serialize;
use std::fmt::{self, Write};
use std::time::Duration;

/// Process-wide verdict.
///
/// Starts as `Success` and only ever moves to `Failure`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunVerdict {
    /// Every test case passed and every flow batch completed.
    #[default]
    Success,
    /// Something failed.
    Failure,
}

impl RunVerdict {
    /// Moves the verdict to `Failure`.
    pub fn downgrade(&mut self) {
        *self = Self::Failure;
    }

    /// Returns true for `Success`.
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for RunVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Outcome of one named test case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    /// Test-case name.
    pub name: String,
    /// Result and timing.
    #[serde(flatten)]
    pub outcome: TestOutcome,
}

/// Report of one flow batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowReport {
    /// Flow name.
    pub flow: String,
    /// Time spent bringing the sandbox up.
    #[serde(rename = "setup_secs", serialize_with = "serialize_secs")]
    pub setup: Duration,
    /// Time spent tearing the sandbox down.
    #[serde(rename = "teardown_secs", serialize_with = "serialize_secs")]
    pub teardown: Duration,
    /// Outcomes in execution order.
    pub cases: Vec<CaseReport>,
    /// Why the batch stopped early, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    /// How the flow was deployed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Deployment>,
}

impl FlowReport {
    /// Creates an empty report for `flow`.
    pub fn new(flow: impl Into<String>) -> Self {
        Self {
            flow: flow.into(),
            ..Self::default()
        }
    }

    /// Records a test-case outcome.
    pub fn record(&mut self, name: impl Into<String>, outcome: TestOutcome) {
        self.cases.push(CaseReport {
            name: name.into(),
            outcome,
        });
    }

    /// Setup + every test case + teardown.
    pub fn total_duration(&self) -> Duration {
        self.setup
            + self
                .cases
                .iter()
                .map(|c| c.outcome.elapsed)
                .sum::<Duration>()
            + self.teardown
    }

    /// Names of failed test cases, in execution order.
    pub fn failed_cases(&self) -> Vec<&str> {
        self.cases
            .iter()
            .filter(|c| c.outcome.result == TestResult::Failed)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Number of passed test cases.
    pub fn passed_count(&self) -> usize {
        self.cases.len() - self.failed_cases().len()
    }

    /// Number of test cases run.
    pub fn total_count(&self) -> usize {
        self.cases.len()
    }

    /// True when every case passed and the batch ran to completion.
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.failed_cases().is_empty()
    }

    /// Deterministic text summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.write_summary(&mut out);
        out
    }

    fn write_summary(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "===== BEGIN :: Test Report: {} =====", self.flow)?;
        if let Some(deployment) = &self.deployment {
            match deployment {
                Deployment::Full => {}
                Deployment::Substituted { child } => {
                    writeln!(out, "Deployment: child group '{}'", child)?
                }
                Deployment::Degraded { reason } => {
                    writeln!(out, "Deployment: DEGRADED ({})", reason)?
                }
            }
        }
        writeln!(out, "Flow Setup: {}", hms(self.setup))?;
        writeln!(out)?;

        for case in &self.cases {
            writeln!(
                out,
                "{} {} took {:.2} secs",
                case.name,
                case.outcome.result,
                case.outcome.elapsed.as_secs_f64()
            )?;
            if let Some(error) = &case.outcome.error {
                writeln!(out, "    error: {}", error)?;
            }
        }
        if let Some(reason) = &self.aborted {
            writeln!(out, "Batch aborted: {}", reason)?;
        }

        writeln!(out)?;
        writeln!(out, "Flow TearDown: {}", hms(self.teardown))?;
        writeln!(out)?;

        let failed = self.failed_cases();
        writeln!(out, "Tests FAILED: {} {:?}", failed.len(), failed)?;
        writeln!(out, "Tests PASSED: {}", self.passed_count())?;
        writeln!(out, "Total Tests: {}", self.total_count())?;
        writeln!(out, "Total Time: {}", hms(self.total_duration()))?;
        writeln!(out, "===== END :: Test Report: {} =====", self.flow)
    }
}

/// Report of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Per-flow reports, in run order.
    pub flows: Vec<FlowReport>,
    /// Overall verdict.
    pub verdict: RunVerdict,
}

impl RunReport {
    /// Per-flow summaries followed by the verdict line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for flow in &self.flows {
            out.push_str(&flow.render());
            out.push('\n');
        }
        out.push_str(&format!("Unit Test Suite Result: {}\n", self.verdict));
        out
    }

    /// Number of failed test cases across all flows.
    pub fn failed_count(&self) -> usize {
        self.flows.iter().map(|f| f.failed_cases().len()).sum()
    }

    /// Number of test cases run across all flows.
    pub fn total_count(&self) -> usize {
        self.flows.iter().map(FlowReport::total_count).sum()
    }
}

/// Renders whole seconds as `H hours, M minutes and S seconds`.
pub fn hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!(
        "{} hours, {} minutes and {} seconds",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}
