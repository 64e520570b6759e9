//! OCR processing using Tesseract.

use crate::error::{ProcessError, ProcessResult};
use crate::raster::rasterize_pdf;
use crate::require_tool;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Perform OCR on an image file in the given Tesseract languages
/// (e.g. `["spa", "eng"]`).
pub fn ocr_image(image_path: &Path, languages: &[String]) -> ProcessResult<String> {
    if !image_path.exists() {
        return Err(ProcessError::FileNotFound(image_path.to_path_buf()));
    }
    require_tool("tesseract")?;

    debug!("Running OCR on {:?}", image_path);

    let mut command = Command::new("tesseract");
    command
        .arg(image_path)
        .arg("stdout") // Output to stdout instead of file
        .args(["--oem", "3"]) // LSTM + legacy engine
        .args(["--psm", "3"]); // Fully automatic page segmentation
    if !languages.is_empty() {
        command.arg("-l").arg(languages.join("+"));
    }

    let output = command.output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Tesseract sometimes outputs warnings to stderr but still works
        if !output.stdout.is_empty() {
            debug!("Tesseract warning: {}", stderr);
        } else {
            return Err(ProcessError::OcrError(stderr.to_string()));
        }
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Rasterise a PDF into `work_dir` and OCR every page, joining pages with a
/// blank line.
pub fn ocr_pdf(
    pdf_path: &Path,
    work_dir: &Path,
    dpi: u32,
    languages: &[String],
) -> ProcessResult<String> {
    let pages = rasterize_pdf(pdf_path, work_dir, dpi)?;

    let mut texts = Vec::with_capacity(pages.len());
    for page in &pages {
        let text = ocr_image(page, languages)?;
        if !text.is_empty() {
            texts.push(text);
        }
    }

    info!("OCR produced text for {}/{} page(s)", texts.len(), pages.len());
    Ok(texts.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_image() {
        let err = ocr_image(Path::new("/nonexistent/scan.png"), &["spa".to_string()]).unwrap_err();
        assert!(matches!(err, ProcessError::FileNotFound(_)));
    }
}
