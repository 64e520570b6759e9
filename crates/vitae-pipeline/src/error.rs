//! Error types for the stage pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while coordinating stages.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] vitae_db::DbError),

    #[error("Config error: {0}")]
    Config(#[from] vitae_config::ConfigError),

    #[error("Ollama error: {0}")]
    Ollama(#[from] vitae_ollama::OllamaError),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The record cannot be processed as stored, e.g. the previous stage's
    /// output is missing or has the wrong shape.
    #[error("Malformed record {file_id}: {message}")]
    Configuration { file_id: String, message: String },

    #[error("Processor error: {0}")]
    Processor(#[from] crate::processor::ProcessorError),

    #[error("Scheduler is already running")]
    AlreadyRunning,
}

impl PipelineError {
    /// Whether a later attempt at the same work could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Configuration { .. } | PipelineError::UnsupportedFileType(_) => false,
            PipelineError::Processor(e) => !e.is_permanent(),
            _ => true,
        }
    }
}
