//! CV stage: profile picture extraction from PDFs.

use crate::processor::{ProcessorError, StageInput, StageOutput, StagePayload, StageProcessor};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;
use vitae_config::ImagesConfig;
use vitae_core::{ContentType, Stage};
use vitae_db::BlobStore;
use vitae_process::{first_accepted, ImageAcceptor, PortraitHeuristic};

/// Finds the first embedded image that looks like a portrait, in page order,
/// and stores it in the blob store.
pub struct ImageExtractor {
    blobs: BlobStore,
    acceptor: PortraitHeuristic,
}

impl ImageExtractor {
    pub fn new(blobs: BlobStore, config: &ImagesConfig) -> Self {
        Self {
            blobs,
            acceptor: PortraitHeuristic {
                min_width: config.min_width,
                min_height: config.min_height,
                min_aspect: config.min_aspect,
                max_aspect: config.max_aspect,
            },
        }
    }
}

#[async_trait]
impl StageProcessor for ImageExtractor {
    fn stage(&self) -> Stage {
        Stage::Cv
    }

    async fn run(&self, input: StageInput) -> Result<StageOutput, ProcessorError> {
        if input.content_type != ContentType::Pdf {
            return Err(ProcessorError::Permanent(format!(
                "image extraction supports PDFs only, got {}",
                input.content_type
            )));
        }
        let StagePayload::Bytes(bytes) = input.payload else {
            return Err(ProcessorError::Permanent(
                "image extraction needs the raw upload".to_string(),
            ));
        };

        let blobs = self.blobs.clone();
        let acceptor = self.acceptor.clone();
        let (data, examined) =
            tokio::task::spawn_blocking(move || extract(&bytes, &acceptor, &blobs)).await??;

        if data.is_null() {
            info!("No portrait among {} image(s) in {}", examined, input.file_name);
        }
        Ok(StageOutput::new(data).with_meta("candidates_examined", examined))
    }
}

fn extract(
    bytes: &[u8],
    acceptor: &dyn ImageAcceptor,
    blobs: &BlobStore,
) -> Result<(Value, usize), ProcessorError> {
    let dir = tempfile::tempdir()?;
    let pdf_path = dir.path().join("input.pdf");
    std::fs::write(&pdf_path, bytes)?;

    let candidates = vitae_process::list_pdf_images(&pdf_path)?;
    let (found, examined) = first_accepted(&candidates, acceptor);
    let Some(candidate) = found else {
        return Ok((Value::Null, examined));
    };

    let out_dir = dir.path().join("images");
    std::fs::create_dir_all(&out_dir)?;
    let image_path = vitae_process::extract_page_image(&pdf_path, candidate, &out_dir)?;
    let image_ref = blobs
        .write(&std::fs::read(&image_path)?)
        .map_err(|e| ProcessorError::Retryable(e.to_string()))?;

    let data = json!({
        "image_ref": image_ref,
        "content_type": ContentType::Png.as_str(),
        "page": candidate.page,
        "width": candidate.width,
        "height": candidate.height,
    });
    Ok((data, examined))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> (ImageExtractor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).unwrap();
        (ImageExtractor::new(blobs, &ImagesConfig::default()), dir)
    }

    #[tokio::test]
    async fn test_non_pdf_is_permanent() {
        let (extractor, _dir) = extractor();
        let err = extractor
            .run(StageInput {
                file_id: "f1".into(),
                file_name: "photo.png".into(),
                content_type: ContentType::Png,
                payload: StagePayload::Bytes(vec![0x89, b'P', b'N', b'G']),
            })
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }

    #[test]
    fn test_acceptor_follows_config() {
        let (extractor, _dir) = extractor();
        assert_eq!(extractor.acceptor.min_width, 64);
        assert_eq!(extractor.acceptor.max_aspect, 2.0);
    }
}
