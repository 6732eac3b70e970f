//! Coloured per-stage summary of a run.

use colored::Colorize;
use paxload::{Outcome, RunReport};

pub fn print(report: &RunReport, verbose: bool) {
    for (stage, outcomes) in &report.stages {
        println!();
        println!(
            "{} {} ({}/{} succeeded)",
            "Stage".cyan().bold(),
            stage.to_string().white().bold(),
            outcomes.success_count(),
            outcomes.len()
        );

        for (name, outcome) in outcomes.iter() {
            match outcome {
                Outcome::Success(summary) => {
                    let issues = if summary.issues > 0 {
                        format!(", {} issues", summary.issues).yellow().to_string()
                    } else {
                        String::new()
                    };
                    println!(
                        "  {} {:28} {} rows{}",
                        "✓".green(),
                        name,
                        summary.rows.to_string().white(),
                        issues
                    );
                    if verbose && !summary.detail.is_empty() {
                        println!("      {}", summary.detail.dimmed());
                    }
                }
                Outcome::Failed { kind, message } => {
                    println!("  {} {:28} {}", "✗".red(), name, format!("[{}]", kind).red());
                    println!("      {}", message);
                }
            }
        }
    }

    println!();
    let failures = report.failure_count();
    if failures == 0 {
        println!("{}", "All tasks succeeded".green().bold());
    } else {
        println!(
            "{} {} task(s) failed; see the log for details",
            "Warning:".yellow().bold(),
            failures
        );
    }
}
