//! Vitae Process - document tooling used by the stage processors.
//!
//! This crate provides:
//! - Embedded PDF text extraction (via pdf-extract)
//! - Page rasterisation (via `pdftoppm`) and OCR (via Tesseract CLI)
//! - Embedded image listing and extraction (via `pdfimages`)
//!
//! Everything here is blocking; callers on an async runtime should wrap the
//! calls in `spawn_blocking`.

mod error;
mod images;
mod ocr;
mod pdf;
mod raster;

pub use error::{ProcessError, ProcessResult};
pub use images::{
    extract_page_image, first_accepted, list_pdf_images, parse_image_list, ImageAcceptor,
    ImageCandidate, PortraitHeuristic,
};
pub use ocr::{ocr_image, ocr_pdf};
pub use pdf::{clean_pdf_text, extract_pdf_text};
pub use raster::rasterize_pdf;

/// Check if required external tools are available.
pub fn check_dependencies() -> Vec<(&'static str, bool)> {
    vec![
        ("tesseract", which::which("tesseract").is_ok()),
        ("pdftoppm", which::which("pdftoppm").is_ok()),
        ("pdfimages", which::which("pdfimages").is_ok()),
    ]
}

/// Check if all required tools are installed.
pub fn all_tools_available() -> bool {
    check_dependencies().iter().all(|(_, available)| *available)
}

pub(crate) fn require_tool(tool: &str) -> ProcessResult<()> {
    if which::which(tool).is_err() {
        return Err(ProcessError::ToolNotFound {
            tool: tool.to_string(),
        });
    }
    Ok(())
}
