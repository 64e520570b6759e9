//! Stage services: a single tick, or a scheduler running until Ctrl+C.

use super::{load_config, open_stores};
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use vitae_core::Stage;
use vitae_pipeline::stages::build_manager;
use vitae_pipeline::{Scheduler, SkipReason, TickOutcome, WorkOutcome};

/// Run one tick of `stage` and report what it did.
pub fn tick(data_dir: Option<&Path>, stage: Stage) -> Result<()> {
    let config = load_config()?;
    let (db, blobs) = open_stores(&config, data_dir)?;
    let manager = build_manager(stage, &config, db, blobs)
        .with_context(|| format!("Failed to set up the {} stage", stage))?;

    let rt = Runtime::new().context("Failed to create async runtime")?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Running {}", stage));
    pb.enable_steady_tick(Duration::from_millis(100));

    let outcome = rt.block_on(manager.tick());
    pb.finish_and_clear();

    print_outcome(stage, &outcome);
    if let TickOutcome::SelectionFailed(message) = outcome {
        anyhow::bail!("{} selection failed: {}", stage, message);
    }
    Ok(())
}

/// Run `stage` on a fixed interval until interrupted.
pub fn serve(data_dir: Option<&Path>, stage: Stage, interval: Option<u64>) -> Result<()> {
    let config = load_config()?;
    let (db, blobs) = open_stores(&config, data_dir)?;
    let manager = build_manager(stage, &config, db, blobs)
        .with_context(|| format!("Failed to set up the {} stage", stage))?;
    let every = Duration::from_secs(interval.unwrap_or(config.scheduler.interval_seconds).max(1));

    warn_missing_tools(stage);

    let rt = Runtime::new().context("Failed to create async runtime")?;
    rt.block_on(async {
        let mut scheduler = Scheduler::new(Arc::new(manager));
        scheduler.start(every)?;

        println!(
            "{} {} every {}s",
            "Serving".cyan().bold(),
            stage,
            every.as_secs()
        );
        println!("Press Ctrl+C to stop.\n");

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;

        println!("\n{}", "Stopping after the current tick...".yellow());
        scheduler.stop().await;
        println!(
            "{} {} stopped after {} ticks",
            "✓".green(),
            stage,
            scheduler.ticks_completed()
        );
        Ok::<_, anyhow::Error>(())
    })
}

fn warn_missing_tools(stage: Stage) {
    let needed: &[&str] = match stage {
        Stage::Ocr => &["tesseract", "pdftoppm"],
        Stage::Ner => &[],
        Stage::Cv => &["pdfimages"],
    };

    for (tool, available) in vitae_process::check_dependencies() {
        if needed.contains(&tool) && !available {
            println!(
                "{} {} is not installed; {} will fail for documents that need it.",
                "Warning:".yellow(),
                tool,
                stage
            );
        }
    }
}

fn print_outcome(stage: Stage, outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Idle => println!("{} {}: nothing eligible", "•".dimmed(), stage),
        TickOutcome::SelectionFailed(message) => {
            println!("{} {}: {}", "✗".red(), stage, message)
        }
        TickOutcome::Worked(WorkOutcome::Completed { file_id, duration }) => println!(
            "{} {}: processed {} in {:.2}s",
            "✓".green(),
            stage,
            file_id,
            duration
        ),
        TickOutcome::Worked(WorkOutcome::Skipped { file_id, reason }) => {
            let why = match reason {
                SkipReason::NotFound => "document removed",
                SkipReason::AlreadyDone => "already processed",
            };
            println!("{} {}: skipped {} ({})", "•".dimmed(), stage, file_id, why)
        }
        TickOutcome::Worked(WorkOutcome::Failed {
            file_id,
            error,
            retryable,
            dead_lettered,
        }) => {
            let state = if *dead_lettered {
                "dead-lettered".red().bold()
            } else if *retryable {
                "will retry".yellow()
            } else {
                "permanent".red()
            };
            println!(
                "{} {}: {} failed ({}): {}",
                "✗".red(),
                stage,
                file_id,
                state,
                error
            );
        }
    }
}
