//! Page rasterisation with poppler's `pdftoppm`.

use crate::error::{ProcessError, ProcessResult};
use crate::require_tool;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Render every page of `pdf_path` to PNG under `out_dir` at `dpi`.
/// Returns the page images in page order.
pub fn rasterize_pdf(pdf_path: &Path, out_dir: &Path, dpi: u32) -> ProcessResult<Vec<PathBuf>> {
    if !pdf_path.exists() {
        return Err(ProcessError::FileNotFound(pdf_path.to_path_buf()));
    }
    require_tool("pdftoppm")?;

    debug!("Rasterising {:?} at {} dpi", pdf_path, dpi);

    let output = Command::new("pdftoppm")
        .arg("-r")
        .arg(dpi.to_string())
        .arg("-png")
        .arg(pdf_path)
        .arg(out_dir.join("page"))
        .output()?;

    if !output.status.success() {
        return Err(ProcessError::ProcessFailed {
            tool: "pdftoppm".to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    // pdftoppm zero-pads page numbers, so name order is page order.
    let mut pages = std::fs::read_dir(out_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("page") && n.ends_with(".png"))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();
    pages.sort();

    debug!("Rendered {} page(s)", pages.len());
    Ok(pages)
}
