//! The three stage processors and how each stage is wired together.

mod entities;
mod images;
mod text;

pub use entities::{coerce_json_object, EntityExtractor};
pub use images::ImageExtractor;
pub use text::{TextExtractor, BACKEND_NO_OCR, BACKEND_TESSERACT};

use crate::error::PipelineResult;
use crate::manager::{Manager, ManagerSettings};
use crate::policy::PayloadSource;
use crate::processor::StageProcessor;
use crate::store::DocumentStore;
use crate::worker::Worker;
use std::sync::Arc;
use vitae_config::Config;
use vitae_core::Stage;
use vitae_db::{BlobStore, Database};

/// Build the production processor for a stage.
pub fn build_processor(
    stage: Stage,
    config: &Config,
    blobs: &BlobStore,
) -> PipelineResult<Arc<dyn StageProcessor>> {
    let processor: Arc<dyn StageProcessor> = match stage {
        Stage::Ocr => Arc::new(TextExtractor::new(config.ocr.clone())),
        Stage::Ner => Arc::new(EntityExtractor::from_config(&config.ollama)?),
        Stage::Cv => Arc::new(ImageExtractor::new(blobs.clone(), &config.images)),
    };
    Ok(processor)
}

/// Wire a manager for `stage` around an explicit processor.
pub fn manager_with_processor(
    processor: Arc<dyn StageProcessor>,
    config: &Config,
    db: Database,
    blobs: BlobStore,
) -> Manager {
    let store: Arc<dyn DocumentStore> = Arc::new(db);
    let worker = Worker::new(
        store.clone(),
        Arc::new(blobs),
        processor.clone(),
        PayloadSource::for_stage(processor.stage()),
        config.scheduler.max_attempts,
    );
    let settings = ManagerSettings {
        claim_lease: chrono::Duration::seconds(config.scheduler.claim_lease_seconds as i64),
    };
    Manager::new(store, worker, settings)
}

/// Wire the production manager for `stage`.
pub fn build_manager(
    stage: Stage,
    config: &Config,
    db: Database,
    blobs: BlobStore,
) -> PipelineResult<Manager> {
    let processor = build_processor(stage, config, &blobs)?;
    Ok(manager_with_processor(processor, config, db, blobs))
}
