//! Document record queries: list, show, remove.

use super::{get_database, short_id};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use colored::Colorize;
use std::path::Path;
use vitae_core::{DocumentRecord, Stage};

pub fn list(data_dir: Option<&Path>, date: Option<&str>, limit: i64) -> Result<()> {
    let db = get_database(data_dir)?;

    let documents = match date {
        Some(date) => {
            let day = parse_day(date)?;
            db.documents_created_on(day)?
        }
        None => db.list_documents(Some(limit))?,
    };

    if documents.is_empty() {
        println!(
            "{}",
            "No documents. Use 'vitae upload <path>' to add one.".dimmed()
        );
        return Ok(());
    }

    println!(
        "{:<10} {:<19} {:<10} {}",
        "ID".cyan(),
        "Uploaded".cyan(),
        "Stages".cyan(),
        "File".cyan()
    );
    println!("{}", "─".repeat(70));

    for doc in &documents {
        println!(
            "{:<10} {:<19} {:<10} {}",
            short_id(&doc.file_id),
            doc.creation_date.format("%Y-%m-%d %H:%M:%S"),
            stage_marks(doc),
            doc.file_name
        );
    }

    Ok(())
}

pub fn show(data_dir: Option<&Path>, file_id: &str, json: bool) -> Result<()> {
    let db = get_database(data_dir)?;
    let doc = db
        .get_document(file_id)?
        .with_context(|| format!("Document not found: {}", file_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{}", doc.file_name.white().bold());
    println!("{}", "─".repeat(70));
    println!("  {}: {}", "ID".cyan(), doc.file_id);
    println!("  {}: {}", "Type".cyan(), doc.content_type);
    println!(
        "  {}: {}",
        "Uploaded".cyan(),
        doc.creation_date.format("%Y-%m-%d %H:%M:%S")
    );
    println!("  {}: {}", "Payload".cyan(), doc.raw_payload_ref);

    if doc.results.is_empty() {
        println!();
        println!("{}", "No stage results yet.".dimmed());
        return Ok(());
    }

    for result in &doc.results {
        println!();
        println!(
            "{} ({:.2}s)",
            result.process.white().bold(),
            result.duration
        );
        println!("{}", "─".repeat(70));
        for (key, value) in &result.metadata {
            println!("  {}: {}", key.cyan(), value);
        }
        println!("{}", preview(&result.data));
    }

    Ok(())
}

pub fn remove(data_dir: Option<&Path>, file_id: &str) -> Result<()> {
    let db = get_database(data_dir)?;
    db.delete_document(file_id)
        .with_context(|| format!("Failed to remove {}", file_id))?;
    println!("{} Removed {}", "✓".green(), file_id);
    Ok(())
}

fn parse_day(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%d-%m-%Y")
        .with_context(|| format!("Invalid date '{}', expected dd-mm-yyyy", date))
}

fn stage_marks(doc: &DocumentRecord) -> String {
    Stage::ALL
        .iter()
        .map(|stage| {
            if doc.has_result(stage.as_str()) {
                stage.as_str().green().to_string()
            } else {
                stage.as_str().dimmed().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn preview(data: &serde_json::Value) -> String {
    const MAX: usize = 600;
    let text = match data {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "(nothing found)".to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    };
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text,
    }
}
