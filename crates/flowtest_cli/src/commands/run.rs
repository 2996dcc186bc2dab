//! Run command - the full e2e run.

use super::load_config;
use crate::OutputFormat;
use anyhow::{Context, Result};
use chrono::Local;
use console::style;
use flowtest_core::{
    discover, fetch_corpus, load_overrides, HarnessTemplate, HttpTestEndpoint, NifiClient,
    RunClaim, RunLock, RunSettings, ShellRunner, SuiteRunner, TestSuites,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

/// Runs every selected flow and prints the report.
pub fn run(config_path: &Path, flows: &[String], format: OutputFormat) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let claim = RunClaim::current(config_path, flows);
    let _lock = RunLock::acquire(&config.base_dir, claim).map_err(|e| {
        if let Some(hint) = e.recovery_suggestion() {
            eprintln!("{} {}", style("Hint:").cyan(), hint);
        }
        e
    })?;

    let commands = ShellRunner;
    if let Some(git_url) = &config.corpus.external_repo_git_url {
        fetch_corpus(&commands, git_url, &config.resolve(&config.corpus.repo_base_dir))
            .context("Failed to fetch the test corpus")?;
    }

    let mut suites = discover(&config.test_data_root(), &config.corpus)?;
    select_flows(&mut suites, flows)?;

    let template_path = config.resolve(&config.harness.template);
    let template = HarnessTemplate::load(&template_path)
        .with_context(|| format!("Failed to load harness template {}", template_path.display()))?;
    let overrides = match &config.harness.sensitive_overrides {
        Some(path) => load_overrides(&config.resolve(path))?,
        None => Vec::new(),
    };

    let platform = NifiClient::new(&config.nifi, &config.registry)
        .context("Failed to connect to NiFi")?;
    let endpoint = HttpTestEndpoint::new(config.harness.test_endpoint_url());
    let settings = RunSettings::from_config(&config, overrides);

    if format == OutputFormat::Text {
        println!(
            "{} Run started {} ({} flows)",
            style("→").cyan(),
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            suites.len()
        );
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{pos}/{len}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let pb_clone = pb.clone();
    let progress = move |done: usize, total: usize, flow: &str| {
        pb_clone.set_length(total as u64);
        pb_clone.set_position(done as u64);
        pb_clone.set_message(format!("flow {}", flow));
    };

    let result = SuiteRunner::new(&platform, &endpoint, &commands, &template, settings)
        .with_progress(&progress)
        .run(&suites);
    pb.finish_and_clear();
    let report = result.context("Run stopped: sandbox teardown failed")?;

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize the report")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            print!("{}", report.render());
            let verdict = if report.verdict.is_success() {
                style(report.verdict.to_string()).green().bold()
            } else {
                style(report.verdict.to_string()).red().bold()
            };
            println!(
                "{} {}/{} test cases failed, verdict {}",
                style("→").cyan(),
                report.failed_count(),
                report.total_count(),
                verdict
            );
        }
    }

    Ok(if report.verdict.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Keeps only the requested flows; an empty selection keeps everything.
fn select_flows(suites: &mut TestSuites, flows: &[String]) -> Result<()> {
    if flows.is_empty() {
        return Ok(());
    }
    if let Some(unknown) = flows.iter().find(|f| !suites.contains_key(*f)) {
        anyhow::bail!("No test cases discovered for flow '{}'", unknown);
    }
    suites.retain(|flow, _| flows.contains(flow));
    Ok(())
}
