//! CLI argument definitions using clap.

use clap::Parser;
use paxload::{LoadMode, RunStage};
use std::path::PathBuf;

/// Paxload: extract, transform and load passenger booking records
#[derive(Parser)]
#[command(name = "paxload")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Run a single stage (extract, transform, load); all three when omitted
    #[arg(short, long, value_name = "STAGE")]
    pub stage: Option<RunStage>,

    /// Load mode (full, incremental); prompted for when omitted
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<LoadMode>,

    /// Read settings from this env file instead of ./.env
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Stages to run, in order.
    pub fn stages(&self) -> Vec<RunStage> {
        match self.stage {
            Some(stage) => vec![stage],
            None => RunStage::ALL.to_vec(),
        }
    }
}
