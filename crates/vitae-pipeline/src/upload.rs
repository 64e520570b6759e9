//! Adding new documents to the store.

use crate::error::{PipelineError, PipelineResult};
use std::path::Path;
use tracing::{debug, info};
use vitae_core::{ContentType, DocumentRecord};
use vitae_db::{BlobStore, Database};

/// Result of an upload.
#[derive(Debug)]
pub struct UploadOutcome {
    pub record: DocumentRecord,
    /// True when identical bytes were already uploaded; `record` is then the
    /// earlier document and nothing new was created.
    pub duplicate: bool,
}

/// Upload a file from disk.
pub fn upload_file(db: &Database, blobs: &BlobStore, path: &Path) -> PipelineResult<UploadOutcome> {
    if !path.exists() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let bytes = std::fs::read(path)?;
    upload_bytes(db, blobs, &file_name, &bytes)
}

/// Store `bytes` and create a document record with an empty result log.
pub fn upload_bytes(
    db: &Database,
    blobs: &BlobStore,
    file_name: &str,
    bytes: &[u8],
) -> PipelineResult<UploadOutcome> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    let content_type = ContentType::from_extension(extension)
        .ok_or_else(|| PipelineError::UnsupportedFileType(file_name.to_string()))?;

    let payload_ref = blobs.write(bytes)?;

    if let Some(existing) = db.find_document_by_payload(&payload_ref)? {
        debug!("{} matches existing document {}", file_name, existing.file_id);
        return Ok(UploadOutcome {
            record: existing,
            duplicate: true,
        });
    }

    let record = DocumentRecord::new(file_name, content_type, payload_ref);
    db.create_document(&record)?;
    info!(file_id = %record.file_id, "Uploaded {}", file_name);

    Ok(UploadOutcome {
        record,
        duplicate: false,
    })
}
