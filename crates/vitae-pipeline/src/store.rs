//! Store seams the coordinator depends on, implemented by the SQLite
//! database and the blob store.

use chrono::Duration;
use vitae_core::{DocumentRecord, Eligibility, FailureRecord, StageResult};
use vitae_db::{BlobStore, Database, DbResult};

/// The shared document collection.
pub trait DocumentStore: Send + Sync {
    fn find_oldest_eligible(
        &self,
        stage: &str,
        predicate: &Eligibility,
    ) -> DbResult<Option<DocumentRecord>>;

    fn claim_oldest_eligible(
        &self,
        stage: &str,
        predicate: &Eligibility,
        owner: &str,
        lease: Duration,
    ) -> DbResult<Option<DocumentRecord>>;

    fn release_claim(&self, file_id: &str, stage: &str, owner: &str) -> DbResult<()>;

    fn find_by_id(&self, file_id: &str) -> DbResult<Option<DocumentRecord>>;

    /// Atomically push one entry onto the document's results.
    /// Fails with `NotFound` when the document is gone.
    fn append_result(&self, file_id: &str, entry: &StageResult) -> DbResult<()>;

    fn record_failure(
        &self,
        file_id: &str,
        stage: &str,
        error: &str,
        permanent: bool,
        max_attempts: i32,
    ) -> DbResult<FailureRecord>;

    fn clear_failures(&self, file_id: &str, stage: &str) -> DbResult<()>;
}

impl DocumentStore for Database {
    fn find_oldest_eligible(
        &self,
        stage: &str,
        predicate: &Eligibility,
    ) -> DbResult<Option<DocumentRecord>> {
        Database::find_oldest_eligible(self, stage, predicate)
    }

    fn claim_oldest_eligible(
        &self,
        stage: &str,
        predicate: &Eligibility,
        owner: &str,
        lease: Duration,
    ) -> DbResult<Option<DocumentRecord>> {
        Database::claim_oldest_eligible(self, stage, predicate, owner, lease)
    }

    fn release_claim(&self, file_id: &str, stage: &str, owner: &str) -> DbResult<()> {
        Database::release_claim(self, file_id, stage, owner)
    }

    fn find_by_id(&self, file_id: &str) -> DbResult<Option<DocumentRecord>> {
        self.get_document(file_id)
    }

    fn append_result(&self, file_id: &str, entry: &StageResult) -> DbResult<()> {
        Database::append_result(self, file_id, entry)
    }

    fn record_failure(
        &self,
        file_id: &str,
        stage: &str,
        error: &str,
        permanent: bool,
        max_attempts: i32,
    ) -> DbResult<FailureRecord> {
        Database::record_failure(self, file_id, stage, error, permanent, max_attempts)
    }

    fn clear_failures(&self, file_id: &str, stage: &str) -> DbResult<()> {
        Database::clear_failures(self, file_id, stage)
    }
}

/// Content-addressed raw payloads.
pub trait PayloadStore: Send + Sync {
    fn read(&self, payload_ref: &str) -> DbResult<Vec<u8>>;
}

impl PayloadStore for BlobStore {
    fn read(&self, payload_ref: &str) -> DbResult<Vec<u8>> {
        BlobStore::read(self, payload_ref)
    }
}
