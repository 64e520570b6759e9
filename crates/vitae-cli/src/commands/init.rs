//! Initialize Vitae.

use super::{get_paths, load_config};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use vitae_config::Config;
use vitae_db::{BlobStore, Database};

pub fn run(data_dir: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let paths = get_paths(&config, data_dir)?;

    // Check if already initialized
    if paths.is_initialized() {
        println!("{} Vitae is already initialized.", "Note:".yellow().bold());
        println!("  Config: {}", paths.config_file.display());
        println!("  Database: {}", paths.database_file.display());
        return Ok(());
    }

    println!("{}", "Initializing Vitae...".cyan().bold());

    paths.ensure_dirs().context("Failed to create directories")?;
    println!("  {} Created directories", "✓".green());

    if !paths.config_file.exists() {
        Config::create_default_file(&paths.config_file).context("Failed to create config file")?;
        println!(
            "  {} Created config: {}",
            "✓".green(),
            paths.config_file.display()
        );
    }

    let _db = Database::open(&paths.database_file).context("Failed to initialize database")?;
    println!(
        "  {} Created database: {}",
        "✓".green(),
        paths.database_file.display()
    );

    let _blobs = BlobStore::open(&paths.blob_dir).context("Failed to create blob store")?;
    println!(
        "  {} Created blob store: {}",
        "✓".green(),
        paths.blob_dir.display()
    );

    println!();
    println!("{}", "Vitae initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Check tools: {}", "vitae health".cyan());
    println!("  2. Upload a CV: {}", "vitae upload ~/cv.pdf".cyan());
    println!(
        "  3. Start the stages: {}",
        "vitae serve --stage ocr | ner | cv".cyan()
    );

    Ok(())
}
