//! Picks the next document for a stage and hands it to the worker.

use crate::policy::EligibilityPolicy;
use crate::store::DocumentStore;
use crate::worker::{WorkOutcome, Worker};
use std::sync::Arc;
use tracing::{debug, error, warn};
use vitae_core::new_id;

/// Settings shared by every tick of a manager.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// How long a claim keeps other processes of the same stage away.
    pub claim_lease: chrono::Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            claim_lease: chrono::Duration::seconds(900),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing was eligible.
    Idle,
    /// One document went through the worker.
    Worked(WorkOutcome),
    /// Selection itself failed; nothing was processed.
    SelectionFailed(String),
}

/// Processes at most one document per tick.
pub struct Manager {
    store: Arc<dyn DocumentStore>,
    worker: Worker,
    owner: String,
    settings: ManagerSettings,
}

impl Manager {
    pub fn new(store: Arc<dyn DocumentStore>, worker: Worker, settings: ManagerSettings) -> Self {
        Self {
            store,
            worker,
            owner: new_id(),
            settings,
        }
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        self.worker.policy()
    }

    /// Claim owner id used by this manager.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub async fn tick(&self) -> TickOutcome {
        let policy = self.worker.policy();
        let stage = policy.stage();

        let record = match policy.claim(self.store.as_ref(), &self.owner, self.settings.claim_lease)
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("{}: nothing to do", stage);
                return TickOutcome::Idle;
            }
            Err(e) => {
                error!("{}: selecting next document failed: {}", stage, e);
                return TickOutcome::SelectionFailed(e.to_string());
            }
        };

        debug!("{}: picked {}", stage, record.file_id);
        let outcome = self.worker.process(&record.file_id).await;

        if let Err(e) = self
            .store
            .release_claim(&record.file_id, stage.as_str(), &self.owner)
        {
            warn!("{}: could not release claim on {}: {}", stage, record.file_id, e);
        }

        TickOutcome::Worked(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PayloadSource;
    use crate::processor::{ProcessorError, StageInput, StageOutput, StageProcessor};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use vitae_core::{ContentType, DocumentRecord, Stage};
    use vitae_db::{BlobStore, Database};

    struct Constant;

    #[async_trait]
    impl StageProcessor for Constant {
        fn stage(&self) -> Stage {
            Stage::Ocr
        }

        async fn run(&self, _input: StageInput) -> Result<StageOutput, ProcessorError> {
            Ok(StageOutput::new(json!("text")))
        }
    }

    fn manager(db: &Database, blobs: &BlobStore) -> Manager {
        let store: Arc<dyn DocumentStore> = Arc::new(db.clone());
        let worker = Worker::new(
            store.clone(),
            Arc::new(blobs.clone()),
            Arc::new(Constant),
            PayloadSource::RawBytes,
            5,
        );
        Manager::new(store, worker, ManagerSettings::default())
    }

    fn add(db: &Database, blobs: &BlobStore, name: &str, minute: u32) -> String {
        let payload_ref = blobs.write(name.as_bytes()).unwrap();
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, minute, 0).unwrap();
        let record =
            DocumentRecord::new(name, ContentType::Text, payload_ref).with_creation_date(created);
        db.create_document(&record).unwrap();
        record.file_id
    }

    #[tokio::test]
    async fn test_idle_when_nothing_is_eligible() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let blobs = BlobStore::open(dir.path()).unwrap();

        assert_eq!(manager(&db, &blobs).tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_one_document_per_tick_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let blobs = BlobStore::open(dir.path()).unwrap();
        let later = add(&db, &blobs, "later.txt", 30);
        let earlier = add(&db, &blobs, "earlier.txt", 10);
        let manager = manager(&db, &blobs);

        match manager.tick().await {
            TickOutcome::Worked(WorkOutcome::Completed { file_id, .. }) => {
                assert_eq!(file_id, earlier)
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(db.get_results(&later).unwrap().is_empty());

        manager.tick().await;
        assert_eq!(db.get_results(&later).unwrap().len(), 1);
        assert_eq!(manager.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_custom_predicate_does_not_stall_on_done_document() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let blobs = BlobStore::open(dir.path()).unwrap();
        let older = add(&db, &blobs, "older.txt", 1);
        let newer = add(&db, &blobs, "newer.txt", 2);
        db.append_result(&older, &vitae_core::StageResult::new("PHOTO", json!(null), 0.1))
            .unwrap();

        let store: Arc<dyn DocumentStore> = Arc::new(db.clone());
        let policy = EligibilityPolicy::new(
            Stage::Ocr,
            vitae_core::Eligibility::Missing {
                stage: "PHOTO".to_string(),
                after: None,
            },
        );
        let worker = Worker::new(
            store.clone(),
            Arc::new(blobs.clone()),
            Arc::new(Constant),
            PayloadSource::RawBytes,
            5,
        )
        .with_policy(policy);
        let manager = Manager::new(store, worker, ManagerSettings::default());

        match manager.tick().await {
            TickOutcome::Worked(WorkOutcome::Completed { file_id, .. }) => {
                assert_eq!(file_id, newer)
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(db.get_results(&older).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_is_released_after_tick() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let blobs = BlobStore::open(dir.path()).unwrap();
        let id = add(&db, &blobs, "a.txt", 1);
        db.record_failure(&id, "OCR", "warm-up", false, 5).unwrap();

        let store: Arc<dyn DocumentStore> = Arc::new(db.clone());
        let failing_worker = Worker::new(
            store.clone(),
            Arc::new(blobs.clone()),
            Arc::new(Failing),
            PayloadSource::RawBytes,
            5,
        );
        let manager = Manager::new(store, failing_worker, ManagerSettings::default());
        manager.tick().await;

        // Still eligible and not hidden by a stale claim.
        let claimed = db
            .claim_oldest_eligible("OCR", manager.policy().predicate(), "other", Duration::seconds(60))
            .unwrap();
        assert_eq!(claimed.map(|r| r.file_id), Some(id));
    }

    struct Failing;

    #[async_trait]
    impl StageProcessor for Failing {
        fn stage(&self) -> Stage {
            Stage::Ocr
        }

        async fn run(&self, _input: StageInput) -> Result<StageOutput, ProcessorError> {
            Err(ProcessorError::Retryable("busy".into()))
        }
    }
}
