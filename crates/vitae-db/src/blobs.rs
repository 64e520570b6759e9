//! Content-addressed storage for raw uploads and extracted images.

use crate::error::{DbError, DbResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Blobs keyed by the SHA-256 of their bytes, fanned out by the first two hex
/// characters: `<root>/ab/cdef...`.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn open(root: impl Into<PathBuf>) -> DbResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store bytes and return their reference. Writing identical bytes twice
    /// yields the same reference and leaves a single copy.
    pub fn write(&self, bytes: &[u8]) -> DbResult<String> {
        let blob_ref = content_address(bytes);
        let path = self.path_for(&blob_ref)?;

        if path.exists() {
            debug!("Blob {} already stored", blob_ref);
            return Ok(blob_ref);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let staging = path.with_extension("partial");
        std::fs::write(&staging, bytes)?;
        std::fs::rename(&staging, &path)?;

        debug!("Stored blob {} ({} bytes)", blob_ref, bytes.len());
        Ok(blob_ref)
    }

    pub fn read(&self, blob_ref: &str) -> DbResult<Vec<u8>> {
        let path = self.path_for(blob_ref)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DbError::NotFound(format!("Blob not found: {}", blob_ref)))
            }
            Err(e) => Err(DbError::Io(e)),
        }
    }

    pub fn exists(&self, blob_ref: &str) -> bool {
        self.path_for(blob_ref).map(|p| p.exists()).unwrap_or(false)
    }

    fn path_for(&self, blob_ref: &str) -> DbResult<PathBuf> {
        let valid = blob_ref.len() == 64 && blob_ref.chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(DbError::InvalidBlobRef(blob_ref.to_string()));
        }
        Ok(self.root.join(&blob_ref[..2]).join(&blob_ref[2..]))
    }
}

/// SHA-256 of the bytes as lowercase hex.
pub fn content_address(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();

        let blob_ref = store.write(b"%PDF-1.4 fake").unwrap();
        assert_eq!(blob_ref.len(), 64);
        assert!(store.exists(&blob_ref));
        assert_eq!(store.read(&blob_ref).unwrap(), b"%PDF-1.4 fake");
    }

    #[test]
    fn test_identical_bytes_share_a_reference() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();

        let first = store.write(b"same").unwrap();
        let second = store.write(b"same").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_and_invalid_refs() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();

        let missing = content_address(b"never written");
        assert!(store.read(&missing).unwrap_err().is_not_found());
        assert!(matches!(
            store.read("../etc/passwd"),
            Err(DbError::InvalidBlobRef(_))
        ));
    }
}
