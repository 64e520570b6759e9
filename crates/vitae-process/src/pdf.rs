//! Embedded text extraction from PDF bytes.

use crate::error::{ProcessError, ProcessResult};
use tracing::debug;

/// Extract the text layer of a PDF without OCR. Scanned documents yield an
/// empty (or whitespace-only) string.
pub fn extract_pdf_text(bytes: &[u8]) -> ProcessResult<String> {
    let raw = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ProcessError::PdfError(format!("Failed to extract text from PDF: {}", e)))?;

    let text = clean_pdf_text(&raw);
    debug!("Extracted {} characters from PDF text layer", text.len());
    Ok(text)
}

/// Clean up extracted PDF text.
pub fn clean_pdf_text(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        // Collapse runs of empty lines
        .fold(Vec::new(), |mut acc, line| {
            let last_was_empty = acc.last().map(|s: &String| s.is_empty()).unwrap_or(false);
            if !(line.is_empty() && last_was_empty) {
                acc.push(line.to_string());
            }
            acc
        })
        .join("\n")
        // Form feeds mark page breaks
        .replace('\x0C', "\n\n")
        .trim()
        .to_string()
}
