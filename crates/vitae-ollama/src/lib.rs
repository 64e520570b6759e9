//! Vitae Ollama - async client for a local Ollama server.
//!
//! Only the pieces the entity extraction stage and the health check need:
//! availability, model listing and non-streaming generation.

mod client;
mod error;
mod types;

pub use client::OllamaClient;
pub use error::{OllamaError, OllamaResult};
pub use types::*;
