//! Vitae DB - Document store and blob store for the stage pipeline.

mod blobs;
mod database;
mod error;
mod migrations;
mod operations;

pub use blobs::BlobStore;
pub use database::Database;
pub use error::{DbError, DbResult};
