//! CLI command implementations.

pub mod config;
pub mod documents;
pub mod failures;
pub mod health;
pub mod init;
pub mod run;
pub mod status;
pub mod upload;

use anyhow::{Context, Result};
use std::path::Path;
use vitae_config::{AppPaths, Config};
use vitae_db::{BlobStore, Database};

/// Load the configuration file, falling back to defaults when absent.
pub fn load_config() -> Result<Config> {
    Config::load().context("Failed to load configuration")
}

/// Get the application paths, honouring a `--data-dir` override.
pub fn get_paths(config: &Config, data_dir: Option<&Path>) -> Result<AppPaths> {
    let paths = config
        .paths()
        .context("Failed to determine application directories")?;
    Ok(match data_dir {
        Some(dir) => paths.with_data_dir(dir),
        None => paths,
    })
}

/// Open the document database and blob store, ensuring vitae is initialized.
pub fn open_stores(config: &Config, data_dir: Option<&Path>) -> Result<(Database, BlobStore)> {
    let paths = get_paths(config, data_dir)?;

    if !paths.is_initialized() {
        anyhow::bail!("Vitae is not initialized. Run 'vitae init' first.");
    }

    let db = Database::open(&paths.database_file).context("Failed to open database")?;
    let blobs = BlobStore::open(&paths.blob_dir).context("Failed to open blob store")?;
    Ok((db, blobs))
}

/// Get the document database, ensuring vitae is initialized.
pub fn get_database(data_dir: Option<&Path>) -> Result<Database> {
    let config = load_config()?;
    Ok(open_stores(&config, data_dir)?.0)
}

/// First eight characters of an id, for tables.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
