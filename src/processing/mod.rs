pub mod extraction;
pub mod redaction;

pub use extraction::extract_events;
pub use redaction::PatternRedactionEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ExtractedEvent, RedactionMap};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unsupported mime type for built-in processing: {0}")]
    UnsupportedMime(String),

    #[error("document is not valid text: {0}")]
    InvalidEncoding(String),
}

/// Result of the redaction pass: the masked text plus per-category
/// counts for every span that was masked.
#[derive(Debug, Clone)]
pub struct Redaction {
    pub redacted_text: String,
    pub redaction_map: RedactionMap,
}

/// Everything the pipeline derives from one document, persisted in a
/// single write once both extraction and redaction have completed.
/// Partial results never leave the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    /// Extracted text with every detected PII span masked
    pub redacted_text: String,
    pub redaction_map: RedactionMap,
    /// Timeline candidates pulled from the redacted text
    pub events: Vec<ExtractedEvent>,
}

/// Seam for the PII-detection / text-extraction collaborator. The
/// engine is stateless with respect to the pipeline: raw bytes in,
/// derived artifacts out, no side effects. The original bytes are never
/// mutated.
#[async_trait]
pub trait RedactionEngine: Send + Sync {
    /// Turn raw document bytes into text. The OCR seam for binary
    /// formats lives behind this method.
    async fn extract_text(&self, bytes: &[u8], mime_type: &str) -> Result<String, EngineError>;

    /// Detect and mask PII in extracted text.
    async fn redact(&self, text: &str) -> Result<Redaction, EngineError>;
}
