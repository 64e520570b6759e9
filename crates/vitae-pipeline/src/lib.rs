//! Vitae Pipeline - the stage pipeline coordinator.
//!
//! This crate provides:
//! - Eligibility policy: which document a stage should work on next
//! - Worker: one document's pass through one stage
//! - Manager: one claim-and-process step per tick
//! - Scheduler: the periodic loop driving a manager
//! - The OCR, NER and CV stage processors and their wiring
//! - Upload of new documents into the store

mod error;
mod manager;
mod policy;
mod processor;
mod scheduler;
pub mod stages;
mod store;
mod upload;
mod worker;

pub use error::{PipelineError, PipelineResult};
pub use manager::{Manager, ManagerSettings, TickOutcome};
pub use policy::{EligibilityPolicy, PayloadSource};
pub use processor::{ProcessorError, StageInput, StageOutput, StagePayload, StageProcessor};
pub use scheduler::{Scheduler, SchedulerState};
pub use store::{DocumentStore, PayloadStore};
pub use upload::{upload_bytes, upload_file, UploadOutcome};
pub use worker::{SkipReason, WorkOutcome, Worker};
