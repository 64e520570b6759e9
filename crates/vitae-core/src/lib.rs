//! Vitae Core - Domain types shared by the document stage pipeline.

mod error;
mod types;

pub use error::{Error, Result};
pub use types::*;
