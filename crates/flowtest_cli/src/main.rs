//! flowtest CLI - end-to-end tests for NiFi dataflows.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(name = "flowtest")]
#[command(about = "End-to-end test runner for NiFi dataflows", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Machine-readable JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy each flow into a sandbox and run its test cases
    Run {
        /// Path to flowtest.toml
        #[arg(short, long, default_value = flowtest_core::CONFIG_FILE_NAME)]
        config: PathBuf,
        /// Only run these flows (repeatable)
        #[arg(short, long = "flow")]
        flows: Vec<String>,
        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List discovered test cases grouped by flow
    List {
        /// Path to flowtest.toml
        #[arg(short, long, default_value = flowtest_core::CONFIG_FILE_NAME)]
        config: PathBuf,
    },
    /// Harness template commands
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Print the assertion expressions for an expected-attribute map
    Expr {
        /// JSON object of expected attributes
        attributes: String,
    },
    /// Vault transit helpers
    Secret {
        /// Path to flowtest.toml
        #[arg(short, long, default_value = flowtest_core::CONFIG_FILE_NAME)]
        config: PathBuf,
        #[command(subcommand)]
        command: SecretCommands,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Load and validate the harness template
    Check {
        /// Path to flowtest.toml
        #[arg(short, long, default_value = flowtest_core::CONFIG_FILE_NAME)]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum SecretCommands {
    /// Encrypt a value with the configured transit key
    Encrypt {
        /// Plaintext to encrypt
        text: String,
    },
    /// Decrypt a transit ciphertext
    Decrypt {
        /// Ciphertext (vault:v1:...)
        ciphertext: String,
    },
}

fn main() -> Result<ExitCode> {
    // Respects RUST_LOG (e.g. RUST_LOG=flowtest_core=debug)
    let default_level = match std::env::args().nth(1).as_deref() {
        Some("run") => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            flows,
            format,
        } => commands::run::run(&config, &flows, format),
        Commands::List { config } => commands::list::run(&config).map(|()| ExitCode::SUCCESS),
        Commands::Template { command } => match command {
            TemplateCommands::Check { config } => {
                commands::template::check(&config).map(|()| ExitCode::SUCCESS)
            }
        },
        Commands::Expr { attributes } => {
            commands::expr::run(&attributes).map(|()| ExitCode::SUCCESS)
        }
        Commands::Secret { config, command } => match command {
            SecretCommands::Encrypt { text } => commands::secret::encrypt(&config, &text),
            SecretCommands::Decrypt { ciphertext } => {
                commands::secret::decrypt(&config, &ciphertext)
            }
        }
        .map(|()| ExitCode::SUCCESS),
    }
}
