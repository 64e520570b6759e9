//! Configuration commands.

use anyhow::{Context, Result};
use colored::Colorize;
use vitae_config::{AppPaths, Config};

pub fn show() -> Result<()> {
    let paths = AppPaths::new().context("Failed to determine application directories")?;

    let contents = if paths.config_file.exists() {
        std::fs::read_to_string(&paths.config_file).context("Failed to read config file")?
    } else {
        println!(
            "{} No config file yet; showing defaults.",
            "Note:".yellow().bold()
        );
        Config::default_config_string()
    };

    println!("{}", "Current Configuration".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("{}", contents);

    Ok(())
}

pub fn path() -> Result<()> {
    let paths = AppPaths::new().context("Failed to determine application directories")?;
    println!("{}", paths.config_file.display());
    Ok(())
}
