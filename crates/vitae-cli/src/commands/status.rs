//! Status command - per-stage progress.

use super::get_database;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use vitae_core::Stage;

pub fn run(data_dir: Option<&Path>) -> Result<()> {
    let db = get_database(data_dir)?;

    println!("{}", "Vitae Status".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("  Documents: {}", db.document_count()?);

    for stage in Stage::ALL {
        let counts = db.stage_counts(stage)?;
        println!();
        println!("{}", stage.as_str().white().bold());
        println!("  {} Completed: {}", "●".green(), counts.completed);
        println!("  {} Pending: {}", "○".yellow(), counts.pending);
        if counts.failing > 0 {
            println!("  {} Retrying: {}", "◐".blue(), counts.failing);
        }
        if counts.dead_lettered > 0 {
            println!("  {} Dead-lettered: {}", "✗".red(), counts.dead_lettered);
        }
    }

    Ok(())
}
