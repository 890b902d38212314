//! ibge-etl - run the IBGE municipalities pipeline once
//!
//! With no arguments the pipeline runs with built-in defaults. Database credentials come from
//! `DB_USER`, `DB_PASSWORD`, `DB_HOST`, `DB_NAME` and optionally `DB_PORT`, read from the
//! environment or a `.env` file in the working directory.

mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use ibge_etl_core::load::DatabaseSettings;
use ibge_etl_core::pipeline::{LoggingConfig, PipelineConfig, PipelineExecutor, PipelineReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

/// Fetch, clean, enrich and load the IBGE municipalities dataset
#[derive(Parser, Debug)]
#[command(name = "ibge-etl", version, about, long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply to any key it omits
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the JSON run report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Log filter, overriding the configured level (RUST_LOG still takes precedence)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    init_logging(&config.logging);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let settings = DatabaseSettings::from_env();
    match runtime.block_on(run(config, settings)) {
        Ok(report) => {
            report.print_summary();
            if report.is_success() {
                eprintln!();
                eprintln!("Pipeline completed successfully!");
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn load_config(args: &Args) -> Result<PipelineConfig, CliError> {
    let mut config = match args.config {
        Some(ref path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(ref report) = args.report {
        config = config.with_report_path(report);
    }
    if let Some(ref level) = args.log_level {
        if level.trim().is_empty() {
            return Err(CliError::InvalidArgument("--log-level must not be empty".into()));
        }
        config.logging.level = level.clone();
    }

    config.validate().map_err(ibge_etl_core::PipelineError::InvalidConfig)?;
    Ok(config)
}

/// Initialize the tracing subscriber; `RUST_LOG` overrides the configured level
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(logging.ansi)
        .with_target(false)
        .init();
}

async fn run(
    config: PipelineConfig,
    settings: DatabaseSettings,
) -> Result<PipelineReport, CliError> {
    let executor = PipelineExecutor::new(config, settings)?;
    info!(run_id = %executor.run_id(), "Starting pipeline run");
    Ok(executor.run().await?)
}
