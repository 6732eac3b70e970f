//! Run command - execute the selected stages and report per-task outcomes.

use std::io;

use chrono::Local;
use paxload::config::load_dotenv;
use paxload::load::{PROMPT_ATTEMPTS, prompt_load_mode};
use paxload::logging::{LogConfig, init_logging};
use paxload::{EtlError, Paxload, PipelineConfig};
use tracing::{error, info};

use super::summary;
use crate::cli::Cli;

/// Fails only on errors outside any source or table task.
pub fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    // LOG_* settings may live in the same env file as the pipeline settings.
    let env_loaded = load_dotenv(cli.env_file.as_deref());

    let mut log_config = LogConfig::from_env()?;
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _guard = init_logging(&log_config)?;

    let config = load_config(env_loaded)?;

    let stages = cli.stages();
    let run_at = Local::now().naive_local();
    info!(
        stages = ?stages,
        run_at = %run_at.format("%Y-%m-%d %H:%M:%S"),
        "Pipeline starting"
    );

    let pipeline = Paxload::new(config)?;
    let report = pipeline.run(&stages, run_at, || match cli.mode {
        Some(mode) => Ok(mode),
        None => prompt_load_mode(io::stdin().lock(), io::stdout(), PROMPT_ATTEMPTS),
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        summary::print(&report, cli.verbose);
    }

    Ok(())
}

/// Build the pipeline configuration once logging is up, so a missing
/// setting reaches the log sinks.
fn load_config(env_loaded: paxload::Result<()>) -> Result<PipelineConfig, EtlError> {
    env_loaded
        .and_then(|()| PipelineConfig::from_process_env())
        .inspect_err(|err| error!(kind = err.kind(), "Configuration failed: {}", err))
}
