//! Eligibility policy and payload sourcing for a stage.

use crate::error::PipelineResult;
use crate::store::DocumentStore;
use chrono::Duration;
use vitae_core::{DocumentRecord, Eligibility, Stage};

/// Decides which document a stage works on next: the oldest one whose
/// results still satisfy the stage's completion predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityPolicy {
    stage: Stage,
    predicate: Eligibility,
}

impl EligibilityPolicy {
    pub fn new(stage: Stage, predicate: Eligibility) -> Self {
        Self { stage, predicate }
    }

    /// Policy for a stage in the fixed OCR → NER → CV order.
    pub fn for_stage(stage: Stage) -> Self {
        Self::new(stage, Eligibility::for_stage(stage))
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn predicate(&self) -> &Eligibility {
        &self.predicate
    }

    /// Whether a record is still due for this stage.
    pub fn is_due(&self, record: &DocumentRecord) -> bool {
        self.predicate.matches(record)
    }

    /// The oldest eligible document, without side effects.
    pub fn select(&self, store: &dyn DocumentStore) -> PipelineResult<Option<DocumentRecord>> {
        Ok(store.find_oldest_eligible(self.stage.as_str(), &self.predicate)?)
    }

    /// Select and lease the oldest eligible document not leased by anyone else.
    pub fn claim(
        &self,
        store: &dyn DocumentStore,
        owner: &str,
        lease: Duration,
    ) -> PipelineResult<Option<DocumentRecord>> {
        Ok(store.claim_oldest_eligible(self.stage.as_str(), &self.predicate, owner, lease)?)
    }
}

/// Where a stage's input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    /// The uploaded bytes, read through `raw_payload_ref`.
    RawBytes,
    /// The `data` of the result tagged with this process name.
    StageData(String),
}

impl PayloadSource {
    /// OCR and CV read the upload; NER reads the OCR text.
    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Ocr | Stage::Cv => PayloadSource::RawBytes,
            Stage::Ner => PayloadSource::StageData(Stage::Ocr.as_str().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vitae_core::{ContentType, StageResult};
    use vitae_db::Database;

    #[test]
    fn test_policy_selects_oldest_due_document() {
        let db = Database::open_in_memory().unwrap();
        let first = DocumentRecord::new("a.pdf", ContentType::Pdf, "a");
        let second = DocumentRecord::new("b.pdf", ContentType::Pdf, "b")
            .with_creation_date(first.creation_date + Duration::seconds(1));
        db.create_document(&first).unwrap();
        db.create_document(&second).unwrap();

        let ocr = EligibilityPolicy::for_stage(Stage::Ocr);
        let selected = ocr.select(&db).unwrap().unwrap();
        assert_eq!(selected.file_id, first.file_id);
        assert!(ocr.is_due(&selected));

        let ner = EligibilityPolicy::for_stage(Stage::Ner);
        assert!(ner.select(&db).unwrap().is_none());

        db.append_result(&first.file_id, &StageResult::new("OCR", json!("t"), 0.1))
            .unwrap();
        assert_eq!(ner.select(&db).unwrap().unwrap().file_id, first.file_id);
        assert_eq!(ocr.select(&db).unwrap().unwrap().file_id, second.file_id);
    }

    #[test]
    fn test_payload_sources() {
        assert_eq!(PayloadSource::for_stage(Stage::Ocr), PayloadSource::RawBytes);
        assert_eq!(
            PayloadSource::for_stage(Stage::Ner),
            PayloadSource::StageData("OCR".to_string())
        );
        assert_eq!(PayloadSource::for_stage(Stage::Cv), PayloadSource::RawBytes);
    }
}
