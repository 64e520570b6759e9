//! OCR stage: text extraction with an OCR fallback.

use crate::processor::{ProcessorError, StageInput, StageOutput, StagePayload, StageProcessor};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};
use vitae_config::OcrConfig;
use vitae_core::{ContentType, Stage};

pub const BACKEND_NO_OCR: &str = "no_ocr";
pub const BACKEND_TESSERACT: &str = "tesseract";

/// Extracts text from the upload. PDFs use their text layer first and fall
/// back to Tesseract when that layer is empty; images always go to Tesseract.
pub struct TextExtractor {
    config: OcrConfig,
}

impl TextExtractor {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StageProcessor for TextExtractor {
    fn stage(&self) -> Stage {
        Stage::Ocr
    }

    async fn run(&self, input: StageInput) -> Result<StageOutput, ProcessorError> {
        let StagePayload::Bytes(bytes) = input.payload else {
            return Err(ProcessorError::Permanent(
                "text extraction needs the raw upload".to_string(),
            ));
        };

        let config = self.config.clone();
        let content_type = input.content_type;
        let (text, backend) =
            tokio::task::spawn_blocking(move || extract(&bytes, content_type, &config)).await??;

        info!(
            "Extracted {} characters from {} ({})",
            text.len(),
            input.file_name,
            backend
        );
        Ok(StageOutput::new(Value::String(text)).with_meta("ocr_backend", backend))
    }
}

fn extract(
    bytes: &[u8],
    content_type: ContentType,
    config: &OcrConfig,
) -> Result<(String, &'static str), ProcessorError> {
    match content_type {
        ContentType::Text => Ok((String::from_utf8_lossy(bytes).trim().to_string(), BACKEND_NO_OCR)),
        ContentType::Pdf => {
            let embedded = vitae_process::extract_pdf_text(bytes);
            match embedded {
                Ok(text) if !text.trim().is_empty() => return Ok((text, BACKEND_NO_OCR)),
                Ok(text) if !config.ocr_fallback => return Ok((text, BACKEND_NO_OCR)),
                Err(e) if !config.ocr_fallback => return Err(e.into()),
                Ok(_) => debug!("No embedded text; retrying with OCR"),
                Err(e) => debug!("Text layer unreadable ({}); retrying with OCR", e),
            }

            let dir = tempfile::tempdir()?;
            let pdf_path = dir.path().join("input.pdf");
            std::fs::write(&pdf_path, bytes)?;
            let text = vitae_process::ocr_pdf(&pdf_path, dir.path(), config.dpi, &config.languages)?;
            Ok((text, BACKEND_TESSERACT))
        }
        image => {
            let dir = tempfile::tempdir()?;
            let image_path = dir.path().join(format!("input.{}", image.extension()));
            std::fs::write(&image_path, bytes)?;
            let text = vitae_process::ocr_image(&image_path, &config.languages)?;
            Ok((text, BACKEND_TESSERACT))
        }
    }
}
