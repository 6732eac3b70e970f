//! Paxload CLI - run the booking pipeline stages.

mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use colored::Colorize;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = commands::run::run(&cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
