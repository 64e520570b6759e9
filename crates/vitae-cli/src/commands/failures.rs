//! Failure ledger commands.

use super::{get_database, short_id};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use vitae_core::Stage;

pub fn list(data_dir: Option<&Path>, stage: Option<Stage>, dead_only: bool) -> Result<()> {
    let db = get_database(data_dir)?;
    let failures = db.list_failures(stage.as_ref().map(Stage::as_str), dead_only)?;

    if failures.is_empty() {
        println!("{}", "No failures recorded.".dimmed());
        return Ok(());
    }

    for failure in &failures {
        let marker = if failure.dead_lettered {
            "✗ dead".red().bold()
        } else {
            "◐ retrying".yellow()
        };
        println!(
            "{} {} {} (attempts: {}, {})",
            marker,
            failure.stage.white().bold(),
            short_id(&failure.file_id),
            failure.attempts,
            failure.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!("    {}", failure.last_error.dimmed());
    }

    Ok(())
}

pub fn requeue(data_dir: Option<&Path>, file_id: &str, stage: Stage) -> Result<()> {
    let db = get_database(data_dir)?;
    db.requeue(file_id, stage.as_str())
        .with_context(|| format!("Failed to requeue {} for {}", file_id, stage))?;
    println!("{} {} is eligible for {} again", "✓".green(), file_id, stage);
    Ok(())
}
