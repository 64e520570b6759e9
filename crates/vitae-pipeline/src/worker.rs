//! One document's pass through one stage.

use crate::error::PipelineError;
use crate::policy::{EligibilityPolicy, PayloadSource};
use crate::processor::{StageInput, StagePayload, StageProcessor};
use crate::store::{DocumentStore, PayloadStore};
use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use vitae_core::{DocumentRecord, FileId, StageResult};

/// Why a worker pass did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The document no longer exists.
    NotFound,
    /// Another pass already recorded this stage.
    AlreadyDone,
}

/// Result of one worker pass. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOutcome {
    Completed {
        file_id: FileId,
        duration: f64,
    },
    Skipped {
        file_id: FileId,
        reason: SkipReason,
    },
    Failed {
        file_id: FileId,
        error: String,
        retryable: bool,
        dead_lettered: bool,
    },
}

/// Runs a stage processor against a single document and records the outcome.
pub struct Worker {
    store: Arc<dyn DocumentStore>,
    payloads: Arc<dyn PayloadStore>,
    processor: Arc<dyn StageProcessor>,
    policy: EligibilityPolicy,
    source: PayloadSource,
    max_attempts: i32,
}

impl Worker {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        payloads: Arc<dyn PayloadStore>,
        processor: Arc<dyn StageProcessor>,
        source: PayloadSource,
        max_attempts: i32,
    ) -> Self {
        let policy = EligibilityPolicy::for_stage(processor.stage());
        Self {
            store,
            payloads,
            processor,
            policy,
            source,
            max_attempts,
        }
    }

    /// Replace the default policy for the processor's stage.
    pub fn with_policy(mut self, policy: EligibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    /// Process one document. Appends at most one result entry.
    pub async fn process(&self, file_id: &str) -> WorkOutcome {
        let stage = self.policy.stage();

        let record = match self.store.find_by_id(file_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("{}: no document with file_id {}", stage, file_id);
                return skipped(file_id, SkipReason::NotFound);
            }
            Err(e) => return self.fail(file_id, PipelineError::Store(e)),
        };

        if !self.policy.is_due(&record) {
            debug!("{}: {} already advanced, skipping", stage, file_id);
            return skipped(file_id, SkipReason::AlreadyDone);
        }

        let input = match self.resolve_input(&record) {
            Ok(input) => input,
            Err(e) => return self.fail(file_id, e),
        };

        let started = Instant::now();
        let result = self.processor.run(input).await;
        let duration = started.elapsed().as_secs_f64();

        let output = match result {
            Ok(output) => output,
            Err(e) => return self.fail(file_id, PipelineError::Processor(e)),
        };

        let entry = StageResult::new(stage.as_str(), output.data, duration)
            .with_timestamp(Utc::now().trunc_subsecs(0))
            .with_metadata(output.metadata);

        match self.store.append_result(file_id, &entry) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                info!("{}: {} was removed while processing", stage, file_id);
                return skipped(file_id, SkipReason::NotFound);
            }
            Err(e) => return self.fail(file_id, PipelineError::Store(e)),
        }

        if let Err(e) = self.store.clear_failures(file_id, stage.as_str()) {
            warn!("{}: could not clear failures for {}: {}", stage, file_id, e);
        }

        info!(
            "{}: file with file_id {} processed in {:.2}s",
            stage, file_id, duration
        );
        WorkOutcome::Completed {
            file_id: file_id.to_string(),
            duration,
        }
    }

    fn resolve_input(&self, record: &DocumentRecord) -> Result<StageInput, PipelineError> {
        let payload = match &self.source {
            PayloadSource::RawBytes => match self.payloads.read(&record.raw_payload_ref) {
                Ok(bytes) => StagePayload::Bytes(bytes),
                Err(e) if e.is_not_found() => {
                    return Err(PipelineError::Configuration {
                        file_id: record.file_id.clone(),
                        message: format!("raw payload {} is missing", record.raw_payload_ref),
                    })
                }
                Err(e) => return Err(PipelineError::Store(e)),
            },
            PayloadSource::StageData(process) => match record.result_for(process) {
                Some(result) => StagePayload::Data(result.data.clone()),
                None => {
                    return Err(PipelineError::Configuration {
                        file_id: record.file_id.clone(),
                        message: format!("no {} result to read", process),
                    })
                }
            },
        };

        Ok(StageInput {
            file_id: record.file_id.clone(),
            file_name: record.file_name.clone(),
            content_type: record.content_type,
            payload,
        })
    }

    fn fail(&self, file_id: &str, err: PipelineError) -> WorkOutcome {
        let stage = self.policy.stage();
        let retryable = err.is_retryable();
        let message = err.to_string();
        error!("{}: file_id {} failed: {}", stage, file_id, message);

        let dead_lettered = match self.store.record_failure(
            file_id,
            stage.as_str(),
            &message,
            !retryable,
            self.max_attempts,
        ) {
            Ok(failure) => {
                if failure.dead_lettered {
                    warn!(
                        file_id = %file_id,
                        attempts = failure.attempts,
                        "{}: dead-lettered, run 'vitae requeue' to retry",
                        stage
                    );
                }
                failure.dead_lettered
            }
            Err(e) => {
                warn!("{}: could not record failure for {}: {}", stage, file_id, e);
                false
            }
        };

        WorkOutcome::Failed {
            file_id: file_id.to_string(),
            error: message,
            retryable,
            dead_lettered,
        }
    }
}

fn skipped(file_id: &str, reason: SkipReason) -> WorkOutcome {
    WorkOutcome::Skipped {
        file_id: file_id.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{ProcessorError, StageOutput};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vitae_core::{ContentType, Stage};
    use vitae_db::{BlobStore, Database};

    struct Echo {
        stage: Stage,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StageProcessor for Echo {
        fn stage(&self) -> Stage {
            self.stage
        }

        async fn run(&self, input: StageInput) -> Result<StageOutput, ProcessorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let data = match input.payload {
                StagePayload::Bytes(bytes) => json!(String::from_utf8_lossy(&bytes)),
                StagePayload::Data(value) => json!({ "echo": value }),
            };
            Ok(StageOutput::new(data).with_meta("backend", "echo"))
        }
    }

    struct Failing(ProcessorError);

    #[async_trait]
    impl StageProcessor for Failing {
        fn stage(&self) -> Stage {
            Stage::Ocr
        }

        async fn run(&self, _input: StageInput) -> Result<StageOutput, ProcessorError> {
            Err(match &self.0 {
                ProcessorError::Retryable(m) => ProcessorError::Retryable(m.clone()),
                ProcessorError::Permanent(m) => ProcessorError::Permanent(m.clone()),
            })
        }
    }

    struct Fixture {
        db: Database,
        blobs: BlobStore,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        Fixture {
            db: Database::open_in_memory().unwrap(),
            blobs: BlobStore::open(dir.path()).unwrap(),
            _dir: dir,
        }
    }

    impl Fixture {
        fn upload(&self, bytes: &[u8]) -> String {
            let payload_ref = self.blobs.write(bytes).unwrap();
            let record = DocumentRecord::new("cv.txt", ContentType::Text, payload_ref);
            self.db.create_document(&record).unwrap();
            record.file_id
        }

        fn worker(&self, processor: Arc<dyn StageProcessor>, max_attempts: i32) -> Worker {
            let source = PayloadSource::for_stage(processor.stage());
            Worker::new(
                Arc::new(self.db.clone()),
                Arc::new(self.blobs.clone()),
                processor,
                source,
                max_attempts,
            )
        }
    }

    fn echo(stage: Stage) -> Arc<Echo> {
        Arc::new(Echo {
            stage,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_success_appends_one_entry() {
        let fx = fixture();
        let id = fx.upload(b"Ana Perez");
        let worker = fx.worker(echo(Stage::Ocr), 5);

        let outcome = worker.process(&id).await;
        assert!(matches!(outcome, WorkOutcome::Completed { .. }));

        let record = fx.db.get_document(&id).unwrap().unwrap();
        assert_eq!(record.results.len(), 1);
        let entry = &record.results[0];
        assert_eq!(entry.process, "OCR");
        assert_eq!(entry.data, json!("Ana Perez"));
        assert!(entry.duration >= 0.0);
        assert!(entry.timestamp.is_some());
        assert_eq!(entry.metadata["backend"], "echo");
    }

    #[tokio::test]
    async fn test_second_pass_is_a_noop() {
        let fx = fixture();
        let id = fx.upload(b"text");
        let processor = echo(Stage::Ocr);
        let worker = fx.worker(processor.clone(), 5);

        worker.process(&id).await;
        let outcome = worker.process(&id).await;

        assert_eq!(
            outcome,
            WorkOutcome::Skipped {
                file_id: id.clone(),
                reason: SkipReason::AlreadyDone
            }
        );
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.db.get_results(&id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_document_is_benign() {
        let fx = fixture();
        let worker = fx.worker(echo(Stage::Ocr), 5);
        let outcome = worker.process("ghost").await;
        assert!(matches!(
            outcome,
            WorkOutcome::Skipped {
                reason: SkipReason::NotFound,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_reads_previous_stage_by_name() {
        let fx = fixture();
        let id = fx.upload(b"raw");
        fx.db
            .append_result(&id, &StageResult::new("OCR", json!("ocr text"), 0.1))
            .unwrap();

        let worker = fx.worker(echo(Stage::Ner), 5);
        worker.process(&id).await;

        let record = fx.db.get_document(&id).unwrap().unwrap();
        let ner = record.result_for("NER").unwrap();
        assert_eq!(ner.data, json!({ "echo": "ocr text" }));
        assert_eq!(record.results[0].data, json!("ocr text"));
    }

    #[tokio::test]
    async fn test_retryable_failure_leaves_document_eligible() {
        let fx = fixture();
        let id = fx.upload(b"text");
        let worker = fx.worker(
            Arc::new(Failing(ProcessorError::Retryable("model timeout".into()))),
            3,
        );

        let outcome = worker.process(&id).await;
        assert!(matches!(
            outcome,
            WorkOutcome::Failed {
                retryable: true,
                dead_lettered: false,
                ..
            }
        ));
        assert!(fx.db.get_results(&id).unwrap().is_empty());
        assert!(worker.policy().select(&fx.db).unwrap().is_some());

        worker.process(&id).await;
        let last = worker.process(&id).await;
        assert!(matches!(
            last,
            WorkOutcome::Failed {
                dead_lettered: true,
                ..
            }
        ));
        assert!(worker.policy().select(&fx.db).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_permanent_failure_dead_letters_at_once() {
        let fx = fixture();
        let id = fx.upload(b"text");
        let worker = fx.worker(
            Arc::new(Failing(ProcessorError::Permanent("corrupt".into()))),
            5,
        );

        let outcome = worker.process(&id).await;
        assert!(matches!(
            outcome,
            WorkOutcome::Failed {
                retryable: false,
                dead_lettered: true,
                ..
            }
        ));
        let failure = fx.db.get_failure(&id, "OCR").unwrap().unwrap();
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn test_missing_prior_stage_is_a_configuration_failure() {
        let fx = fixture();
        let id = fx.upload(b"text");
        // Force NER onto a document without OCR output.
        let worker = fx
            .worker(echo(Stage::Ner), 5)
            .with_policy(EligibilityPolicy::new(
                Stage::Ner,
                vitae_core::Eligibility::Missing {
                    stage: "NER".into(),
                    after: None,
                },
            ));

        let outcome = worker.process(&id).await;
        assert!(matches!(
            outcome,
            WorkOutcome::Failed {
                retryable: false,
                dead_lettered: true,
                ..
            }
        ));
        assert!(fx.db.get_results(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_clears_earlier_failures() {
        let fx = fixture();
        let id = fx.upload(b"text");
        fx.db.record_failure(&id, "OCR", "flaky", false, 5).unwrap();

        fx.worker(echo(Stage::Ocr), 5).process(&id).await;
        assert!(fx.db.get_failure(&id, "OCR").unwrap().is_none());
    }
}
