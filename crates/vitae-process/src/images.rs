//! Embedded image discovery and extraction with poppler's `pdfimages`.

use crate::error::{ProcessError, ProcessResult};
use crate::require_tool;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// One image embedded in a PDF, as reported by `pdfimages -list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    /// 1-based page number.
    pub page: u32,
    /// Position among everything `pdfimages` writes for this page, masks
    /// included. Matches the order of the files `extract_page_image` sees.
    pub index_on_page: usize,
    pub width: u32,
    pub height: u32,
}

impl ImageCandidate {
    /// Height over width.
    pub fn aspect(&self) -> f64 {
        if self.width == 0 {
            return 0.0;
        }
        self.height as f64 / self.width as f64
    }
}

/// Decides whether an embedded image is the one worth keeping.
pub trait ImageAcceptor {
    fn accept(&self, candidate: &ImageCandidate) -> bool;
}

/// Accepts images large enough and shaped roughly like an ID photo.
#[derive(Debug, Clone)]
pub struct PortraitHeuristic {
    pub min_width: u32,
    pub min_height: u32,
    pub min_aspect: f64,
    pub max_aspect: f64,
}

impl ImageAcceptor for PortraitHeuristic {
    fn accept(&self, candidate: &ImageCandidate) -> bool {
        let aspect = candidate.aspect();
        candidate.width >= self.min_width
            && candidate.height >= self.min_height
            && aspect >= self.min_aspect
            && aspect <= self.max_aspect
    }
}

/// The first accepted candidate in page order, and how many candidates were
/// examined to find it. Candidates after the first match are never examined.
pub fn first_accepted<'a, A: ImageAcceptor + ?Sized>(
    candidates: &'a [ImageCandidate],
    acceptor: &A,
) -> (Option<&'a ImageCandidate>, usize) {
    let mut examined = 0;
    for candidate in candidates {
        examined += 1;
        if acceptor.accept(candidate) {
            return (Some(candidate), examined);
        }
    }
    (None, examined)
}

/// List the real images (no soft masks or stencils) embedded in a PDF, in
/// page order.
pub fn list_pdf_images(pdf_path: &Path) -> ProcessResult<Vec<ImageCandidate>> {
    if !pdf_path.exists() {
        return Err(ProcessError::FileNotFound(pdf_path.to_path_buf()));
    }
    require_tool("pdfimages")?;

    let output = Command::new("pdfimages").arg("-list").arg(pdf_path).output()?;
    if !output.status.success() {
        return Err(ProcessError::ProcessFailed {
            tool: "pdfimages".to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    parse_image_list(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the table printed by `pdfimages -list`.
pub fn parse_image_list(listing: &str) -> ProcessResult<Vec<ImageCandidate>> {
    let mut candidates = Vec::new();
    let mut current_page = 0;
    let mut index_on_page = 0;

    // Header row and dashed separator come first.
    for line in listing.lines().skip(2) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            continue;
        }

        let page: u32 = parse_field(fields[0], "page", line)?;
        if page != current_page {
            current_page = page;
            index_on_page = 0;
        }
        let position = index_on_page;
        index_on_page += 1;

        if fields[2] != "image" {
            continue;
        }

        candidates.push(ImageCandidate {
            page,
            index_on_page: position,
            width: parse_field(fields[3], "width", line)?,
            height: parse_field(fields[4], "height", line)?,
        });
    }

    debug!("Found {} embedded image(s)", candidates.len());
    Ok(candidates)
}

fn parse_field<T: std::str::FromStr>(value: &str, name: &str, line: &str) -> ProcessResult<T> {
    value
        .parse()
        .map_err(|_| ProcessError::ParseError(format!("bad {} in pdfimages row: {}", name, line)))
}

/// Write the candidate's image as PNG into `out_dir` and return its path.
pub fn extract_page_image(
    pdf_path: &Path,
    candidate: &ImageCandidate,
    out_dir: &Path,
) -> ProcessResult<PathBuf> {
    require_tool("pdfimages")?;
    let page = candidate.page.to_string();

    let output = Command::new("pdfimages")
        .arg("-png")
        .arg("-f")
        .arg(&page)
        .arg("-l")
        .arg(&page)
        .arg(pdf_path)
        .arg(out_dir.join("img"))
        .output()?;

    if !output.status.success() {
        return Err(ProcessError::ProcessFailed {
            tool: "pdfimages".to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let mut files = std::fs::read_dir(out_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|e| e == "png").unwrap_or(false))
        .collect::<Vec<_>>();
    files.sort();

    files.into_iter().nth(candidate.index_on_page).ok_or_else(|| {
        ProcessError::ParseError(format!(
            "pdfimages wrote no image #{} for page {}",
            candidate.index_on_page, candidate.page
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const LISTING: &str = "\
page   num  type   width height color comp bpc  enc interp  object ID x-ppi y-ppi size ratio
--------------------------------------------------------------------------------------------
   1     0 image      20    20  rgb     3   8  jpeg   no         7  0    72    72  1.2K 9.8%
   1     1 image     300   400  rgb     3   8  jpeg   no         8  0    96    96 25.3K 7.1%
   1     2 smask     300   400  gray    1   8  image  no         8  0    96    96  3.1K 2.6%
   2     3 image     600   200  rgb     3   8  jpeg   no        12  0    96    96 40.0K 11%
";

    fn heuristic() -> PortraitHeuristic {
        PortraitHeuristic {
            min_width: 64,
            min_height: 64,
            min_aspect: 0.75,
            max_aspect: 2.0,
        }
    }

    #[test]
    fn test_parse_image_list() {
        let candidates = parse_image_list(LISTING).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[1].width, 300);
        assert_eq!(candidates[1].index_on_page, 1);
        assert_eq!(candidates[2].page, 2);
        assert_eq!(candidates[2].index_on_page, 0);
    }

    #[test]
    fn test_parse_empty_listing() {
        let header_only = LISTING.lines().take(2).collect::<Vec<_>>().join("\n");
        assert!(parse_image_list(&header_only).unwrap().is_empty());
    }

    #[test]
    fn test_portrait_heuristic() {
        let candidates = parse_image_list(LISTING).unwrap();
        let h = heuristic();
        assert!(!h.accept(&candidates[0])); // too small
        assert!(h.accept(&candidates[1]));
        assert!(!h.accept(&candidates[2])); // landscape banner
    }

    struct Counting<'a> {
        seen: &'a Cell<usize>,
    }

    impl ImageAcceptor for Counting<'_> {
        fn accept(&self, candidate: &ImageCandidate) -> bool {
            self.seen.set(self.seen.get() + 1);
            candidate.width >= 300
        }
    }

    #[test]
    fn test_first_accepted_short_circuits() {
        let candidates = parse_image_list(LISTING).unwrap();
        let seen = Cell::new(0);
        let (found, examined) = first_accepted(&candidates, &Counting { seen: &seen });

        assert_eq!(found.map(|c| c.width), Some(300));
        assert_eq!(examined, 2);
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_first_accepted_none() {
        let candidates = parse_image_list(LISTING).unwrap();
        let strict = PortraitHeuristic {
            min_width: 10_000,
            ..heuristic()
        };
        let (found, examined) = first_accepted(&candidates, &strict);
        assert!(found.is_none());
        assert_eq!(examined, 3);
    }
}
