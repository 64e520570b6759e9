//! Health command - check the tools and services the stages rely on.

use super::load_config;
use anyhow::{Context, Result};
use colored::Colorize;
use tokio::runtime::Runtime;
use vitae_ollama::OllamaClient;

pub fn run() -> Result<()> {
    let config = load_config()?;

    println!("{}", "External tools".white().bold());
    for (tool, available) in vitae_process::check_dependencies() {
        if available {
            println!("  {} {}", "✓".green(), tool);
        } else {
            println!("  {} {} (not found in PATH)", "✗".red(), tool);
        }
    }

    println!();
    println!("{}", "Ollama".white().bold());
    let client = OllamaClient::from_config(&config.ollama)?;
    let rt = Runtime::new().context("Failed to create async runtime")?;

    if !rt.block_on(client.is_available()) {
        println!(
            "  {} not running at {}. Start it with 'ollama serve'.",
            "✗".red(),
            client.host()
        );
        return Ok(());
    }

    let version = rt
        .block_on(client.version())
        .unwrap_or_else(|_| "unknown".to_string());
    println!("  {} {} (version {})", "✓".green(), client.host(), version);

    match rt.block_on(client.has_model(&config.ollama.model)) {
        Ok(true) => println!("  {} model {}", "✓".green(), config.ollama.model),
        Ok(false) => println!(
            "  {} model {} missing. Run: {}",
            "✗".red(),
            config.ollama.model,
            format!("ollama pull {}", config.ollama.model).cyan()
        ),
        Err(e) => println!("  {} could not list models: {}", "✗".red(), e),
    }

    Ok(())
}
