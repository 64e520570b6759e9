//! Error types for document processing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for processing operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors that can occur during document processing.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Tool not found: {tool}. Please install it.")]
    ToolNotFound { tool: String },

    #[error("PDF error: {0}")]
    PdfError(String),

    #[error("OCR error: {0}")]
    OcrError(String),

    #[error("{tool} failed with exit code {code}: {stderr}")]
    ProcessFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ProcessError {
    /// Whether the input itself is unusable, so retrying cannot help.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ProcessError::PdfError(_) | ProcessError::ParseError(_))
    }
}
