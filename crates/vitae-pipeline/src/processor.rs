//! The pluggable stage processor seam.

use async_trait::async_trait;
use thiserror::Error;
use vitae_core::{ContentType, FileId, Stage};
use vitae_ollama::OllamaError;
use vitae_process::ProcessError;

/// What a stage processor receives.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub file_id: FileId,
    pub file_name: String,
    pub content_type: ContentType,
    pub payload: StagePayload,
}

#[derive(Debug, Clone)]
pub enum StagePayload {
    /// The original uploaded bytes.
    Bytes(Vec<u8>),
    /// The `data` of an earlier stage's result.
    Data(serde_json::Value),
}

/// What a stage processor produces on success.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub data: serde_json::Value,
    /// Extra fields stored next to `data`, e.g. `ocr_backend`.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl StageOutput {
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            data,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Stage processor failure, classified for the retry budget.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("{0}")]
    Retryable(String),

    #[error("{0}")]
    Permanent(String),
}

impl ProcessorError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, ProcessorError::Permanent(_))
    }
}

impl From<ProcessError> for ProcessorError {
    fn from(e: ProcessError) -> Self {
        if e.is_permanent() {
            ProcessorError::Permanent(e.to_string())
        } else {
            ProcessorError::Retryable(e.to_string())
        }
    }
}

impl From<OllamaError> for ProcessorError {
    fn from(e: OllamaError) -> Self {
        ProcessorError::Retryable(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ProcessorError {
    fn from(e: tokio::task::JoinError) -> Self {
        ProcessorError::Retryable(format!("processing task failed: {}", e))
    }
}

impl From<std::io::Error> for ProcessorError {
    fn from(e: std::io::Error) -> Self {
        ProcessorError::Retryable(e.to_string())
    }
}

/// One stage's processing capability. Implementations own their timeouts.
#[async_trait]
pub trait StageProcessor: Send + Sync {
    fn stage(&self) -> Stage;

    async fn run(&self, input: StageInput) -> Result<StageOutput, ProcessorError>;
}
