//! Core domain types for Vitae.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for uploaded documents.
pub type FileId = String;

/// Generate a new unique ID.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Render a timestamp with a fixed width so stored values sort lexically in
/// chronological order.
pub fn sortable_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A named processing step. Stages run in the fixed order OCR → NER → CV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "OCR")]
    Ocr,
    #[serde(rename = "NER")]
    Ner,
    #[serde(rename = "CV")]
    Cv,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Ocr, Stage::Ner, Stage::Cv];

    /// The tag written into `StageResult::process`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ocr => "OCR",
            Stage::Ner => "NER",
            Stage::Cv => "CV",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ocr" | "text" => Some(Stage::Ocr),
            "ner" | "entities" => Some(Stage::Ner),
            "cv" | "images" => Some(Stage::Cv),
            _ => None,
        }
    }

    /// The stage whose result must exist before this one runs.
    pub fn previous(&self) -> Option<Stage> {
        match self {
            Stage::Ocr => None,
            Stage::Ner => Some(Stage::Ocr),
            Stage::Cv => Some(Stage::Ner),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Stage::from_str(s).ok_or_else(|| crate::Error::UnknownStage(s.to_string()))
    }
}

/// Kind of uploaded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/tiff")]
    Tiff,
    #[serde(rename = "text/plain")]
    Text,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Pdf => "application/pdf",
            ContentType::Png => "image/png",
            ContentType::Jpeg => "image/jpeg",
            ContentType::Tiff => "image/tiff",
            ContentType::Text => "text/plain",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "application/pdf" => Some(ContentType::Pdf),
            "image/png" => Some(ContentType::Png),
            "image/jpeg" => Some(ContentType::Jpeg),
            "image/tiff" => Some(ContentType::Tiff),
            "text/plain" => Some(ContentType::Text),
            _ => None,
        }
    }

    /// Detect content type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(ContentType::Pdf),
            "png" => Some(ContentType::Png),
            "jpg" | "jpeg" => Some(ContentType::Jpeg),
            "tif" | "tiff" => Some(ContentType::Tiff),
            "txt" | "md" => Some(ContentType::Text),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentType::Png | ContentType::Jpeg | ContentType::Tiff)
    }

    /// File extension used when the payload is materialised on disk.
    pub fn extension(&self) -> &'static str {
        match self {
            ContentType::Pdf => "pdf",
            ContentType::Png => "png",
            ContentType::Jpeg => "jpg",
            ContentType::Tiff => "tiff",
            ContentType::Text => "txt",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One append-only log entry recording a stage's output and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub process: String,
    pub data: serde_json::Value,
    /// Seconds spent inside the stage processor.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Stage-specific extras such as `ocr_backend`.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl StageResult {
    pub fn new(process: impl Into<String>, data: serde_json::Value, duration: f64) -> Self {
        Self {
            process: process.into(),
            data,
            duration,
            timestamp: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The persistent record tracking one uploaded file and its stage outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub file_id: FileId,
    pub file_name: String,
    pub content_type: ContentType,
    pub raw_payload_ref: String,
    pub creation_date: DateTime<Utc>,
    pub results: Vec<StageResult>,
}

impl DocumentRecord {
    pub fn new(
        file_name: impl Into<String>,
        content_type: ContentType,
        raw_payload_ref: impl Into<String>,
    ) -> Self {
        Self {
            file_id: new_id(),
            file_name: file_name.into(),
            content_type,
            raw_payload_ref: raw_payload_ref.into(),
            // Stored timestamps keep microseconds.
            creation_date: Utc::now().trunc_subsecs(6),
            results: Vec::new(),
        }
    }

    pub fn with_creation_date(mut self, creation_date: DateTime<Utc>) -> Self {
        self.creation_date = creation_date;
        self
    }

    /// First result tagged with the given process name.
    pub fn result_for(&self, process: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.process == process)
    }

    pub fn has_result(&self, process: &str) -> bool {
        self.result_for(process).is_some()
    }
}

/// Completion predicate deciding whether a document is due for a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// The document has no result entries at all.
    NoResults,
    /// No entry is tagged `stage`; when `after` is set, an entry tagged
    /// `after` must already exist.
    Missing { stage: String, after: Option<String> },
}

impl Eligibility {
    /// Predicate for a stage in the fixed linear order.
    pub fn for_stage(stage: Stage) -> Self {
        Eligibility::Missing {
            stage: stage.as_str().to_string(),
            after: stage.previous().map(|s| s.as_str().to_string()),
        }
    }

    pub fn matches(&self, record: &DocumentRecord) -> bool {
        match self {
            Eligibility::NoResults => record.results.is_empty(),
            Eligibility::Missing { stage, after } => {
                !record.has_result(stage)
                    && after.as_deref().map_or(true, |prev| record.has_result(prev))
            }
        }
    }
}

/// Failure ledger entry for one (document, stage) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub file_id: FileId,
    pub stage: String,
    pub attempts: i32,
    pub last_error: String,
    pub dead_lettered: bool,
    pub updated_at: DateTime<Utc>,
}

/// Per-stage progress counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageCounts {
    pub completed: i64,
    pub pending: i64,
    pub failing: i64,
    pub dead_lettered: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_with(processes: &[&str]) -> DocumentRecord {
        let mut record = DocumentRecord::new("cv.pdf", ContentType::Pdf, "abc");
        for p in processes {
            record.results.push(StageResult::new(*p, json!("x"), 0.1));
        }
        record
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::Ocr.previous(), None);
        assert_eq!(Stage::Ner.previous(), Some(Stage::Ocr));
        assert_eq!(Stage::Cv.previous(), Some(Stage::Ner));
        assert_eq!(Stage::from_str("ner"), Some(Stage::Ner));
        assert_eq!(Stage::from_str("bogus"), None);
    }

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(ContentType::from_extension("PDF"), Some(ContentType::Pdf));
        assert_eq!(ContentType::from_extension("jpeg"), Some(ContentType::Jpeg));
        assert_eq!(ContentType::from_extension("docx"), None);
        assert!(ContentType::Png.is_image());
        assert!(!ContentType::Pdf.is_image());
    }

    #[test]
    fn test_eligibility_predicates() {
        let fresh = record_with(&[]);
        let after_ocr = record_with(&["OCR"]);
        let after_ner = record_with(&["OCR", "NER"]);

        assert!(Eligibility::NoResults.matches(&fresh));
        assert!(!Eligibility::NoResults.matches(&after_ocr));

        let ocr = Eligibility::for_stage(Stage::Ocr);
        let ner = Eligibility::for_stage(Stage::Ner);
        assert!(ocr.matches(&fresh));
        assert!(!ocr.matches(&after_ocr));
        assert!(!ner.matches(&fresh));
        assert!(ner.matches(&after_ocr));
        assert!(!ner.matches(&after_ner));
    }

    #[test]
    fn test_lookup_is_by_name_not_position() {
        // A CV entry ahead of OCR must not be mistaken for the OCR output.
        let record = record_with(&["CV", "OCR"]);
        assert_eq!(record.result_for("OCR").map(|r| r.process.as_str()), Some("OCR"));
        assert!(Eligibility::for_stage(Stage::Ner).matches(&record));
    }

    #[test]
    fn test_stage_result_flattens_metadata() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("ocr_backend".to_string(), json!("no_ocr"));
        let entry = StageResult::new("OCR", json!("text"), 1.5).with_metadata(metadata);

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["process"], "OCR");
        assert_eq!(value["ocr_backend"], "no_ocr");
        assert!(value.get("timestamp").is_none());

        let back: StageResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }
}
