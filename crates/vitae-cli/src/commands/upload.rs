//! Upload command - add a document to the pipeline.

use super::{load_config, open_stores};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

pub fn run(data_dir: Option<&Path>, path: &Path) -> Result<()> {
    let config = load_config()?;
    let (db, blobs) = open_stores(&config, data_dir)?;

    let outcome = vitae_pipeline::upload_file(&db, &blobs, path)
        .with_context(|| format!("Failed to upload {}", path.display()))?;
    let record = outcome.record;

    if outcome.duplicate {
        println!(
            "{} {} matches an earlier upload ({})",
            "Duplicate:".yellow().bold(),
            path.display(),
            record.file_name
        );
    } else {
        println!("{} {}", "Uploaded:".green().bold(), record.file_name);
    }
    println!("  file_id: {}", record.file_id);
    println!("  Type: {}", record.content_type);
    tracing::debug!("Payload stored at {}", record.raw_payload_ref);

    Ok(())
}
