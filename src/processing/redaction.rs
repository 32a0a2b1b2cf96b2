use async_trait::async_trait;
use regex::Regex;

use crate::models::{PiiCategory, RedactionMap};

use super::{EngineError, Redaction, RedactionEngine};

/// Regex-based reference engine for text documents. Binary formats
/// (PDF, images) belong to the external OCR/model collaborator behind
/// the same trait; this engine rejects them.
pub struct PatternRedactionEngine {
    detectors: Vec<(PiiCategory, Regex)>,
}

impl PatternRedactionEngine {
    pub fn new() -> Self {
        // Detector order matters: specific numeric formats run before
        // the broader address and name patterns so overlapping spans are
        // attributed to the narrower category.
        let detectors = vec![
            (
                PiiCategory::Ssn,
                Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
            ),
            (
                PiiCategory::Email,
                Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
            ),
            (
                PiiCategory::DateOfBirth,
                Regex::new(r"(?i)\b(?:DOB|date of birth)\s*[:\-]?\s*\d{1,2}/\d{1,2}/\d{4}")
                    .unwrap(),
            ),
            (
                PiiCategory::Phone,
                Regex::new(r"\b(?:\+1[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b").unwrap(),
            ),
            (
                PiiCategory::AccountNumber,
                Regex::new(r"(?i)\b(?:account|acct)\.?\s*(?:#|no\.?|number)?\s*[:\-]?\s*\d{6,}\b")
                    .unwrap(),
            ),
            (
                PiiCategory::Address,
                Regex::new(
                    r"\b\d+\s+[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)*\s+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct)\b\.?",
                )
                .unwrap(),
            ),
            (
                PiiCategory::Name,
                Regex::new(r"\b(?:Mr|Mrs|Ms|Dr|Prof)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\b")
                    .unwrap(),
            ),
        ];

        Self { detectors }
    }

    fn is_text_mime(mime_type: &str) -> bool {
        let mime = mime_type.to_lowercase();
        mime.starts_with("text/")
            || matches!(
                mime.as_str(),
                "application/json" | "application/xml" | "application/csv"
            )
    }
}

impl Default for PatternRedactionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RedactionEngine for PatternRedactionEngine {
    async fn extract_text(&self, bytes: &[u8], mime_type: &str) -> Result<String, EngineError> {
        if !Self::is_text_mime(mime_type) {
            return Err(EngineError::UnsupportedMime(mime_type.to_string()));
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| EngineError::InvalidEncoding(e.to_string()))?;

        Ok(text.to_string())
    }

    async fn redact(&self, text: &str) -> Result<Redaction, EngineError> {
        let mut redacted = text.to_string();
        let mut map = RedactionMap::default();

        for (category, detector) in &self.detectors {
            let mask = format!("[REDACTED:{}]", category.as_str().to_uppercase());
            let mut count = 0;
            redacted = detector
                .replace_all(&redacted, |_: &regex::Captures<'_>| {
                    count += 1;
                    mask.clone()
                })
                .into_owned();
            for _ in 0..count {
                map.record(*category);
            }
        }

        Ok(Redaction {
            redacted_text: redacted,
            redaction_map: map,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PatternRedactionEngine {
        PatternRedactionEngine::new()
    }

    async fn redact_str(input: &str) -> Redaction {
        let engine = engine();
        let text = engine.extract_text(input.as_bytes(), "text/plain").await.unwrap();
        engine.redact(&text).await.unwrap()
    }

    #[tokio::test]
    async fn masks_ssn_email_and_phone() {
        let outcome =
            redact_str("Contact Jane at jane.doe@example.com or 555-867-5309. SSN 123-45-6789.")
                .await;

        assert!(!outcome.redacted_text.contains("jane.doe@example.com"));
        assert!(!outcome.redacted_text.contains("123-45-6789"));
        assert!(!outcome.redacted_text.contains("555-867-5309"));
        assert!(outcome.redacted_text.contains("[REDACTED:EMAIL]"));
        assert!(outcome.redacted_text.contains("[REDACTED:SSN]"));
        assert!(outcome.redacted_text.contains("[REDACTED:PHONE]"));

        let map = &outcome.redaction_map;
        assert_eq!(map.by_category.get(&PiiCategory::Email), Some(&1));
        assert_eq!(map.by_category.get(&PiiCategory::Ssn), Some(&1));
        assert_eq!(map.by_category.get(&PiiCategory::Phone), Some(&1));
        assert_eq!(map.total(), 3);
    }

    #[tokio::test]
    async fn masks_dob_address_account_and_names() {
        let outcome = redact_str(
            "Mr. John Smith, DOB: 01/02/1980, lives at 42 Elm Street. Account No: 12345678.",
        )
        .await;

        assert!(!outcome.redacted_text.contains("01/02/1980"));
        assert!(!outcome.redacted_text.contains("42 Elm Street"));
        assert!(!outcome.redacted_text.contains("12345678"));
        assert!(!outcome.redacted_text.contains("John Smith"));
        let map = &outcome.redaction_map;
        assert_eq!(map.by_category.get(&PiiCategory::DateOfBirth), Some(&1));
        assert_eq!(map.by_category.get(&PiiCategory::Address), Some(&1));
        assert_eq!(map.by_category.get(&PiiCategory::AccountNumber), Some(&1));
        assert_eq!(map.by_category.get(&PiiCategory::Name), Some(&1));
    }

    #[tokio::test]
    async fn clean_text_passes_through_unchanged() {
        let outcome = redact_str("The committee reviewed the case materials on schedule.").await;

        assert_eq!(
            outcome.redacted_text,
            "The committee reviewed the case materials on schedule."
        );
        assert!(outcome.redaction_map.is_empty());
        assert_eq!(outcome.redaction_map.total(), 0);
    }

    #[tokio::test]
    async fn rejects_binary_mime_types() {
        let result = engine().extract_text(b"%PDF-1.7", "application/pdf").await;
        assert!(matches!(result, Err(EngineError::UnsupportedMime(_))));
    }

    #[tokio::test]
    async fn rejects_invalid_utf8() {
        let result = engine().extract_text(&[0xff, 0xfe, 0x00], "text/plain").await;
        assert!(matches!(result, Err(EngineError::InvalidEncoding(_))));
    }

    #[tokio::test]
    async fn input_bytes_are_never_mutated() {
        let input = b"SSN 123-45-6789".to_vec();
        let before = input.clone();
        let engine = engine();
        let text = engine.extract_text(&input, "text/plain").await.unwrap();
        let _ = engine.redact(&text).await.unwrap();
        assert_eq!(input, before);
    }

    #[tokio::test]
    async fn counts_repeated_matches_per_category() {
        let outcome = redact_str(
            "Mr. Adam Jones met Dr. Beth Miles and Ms. Cara Stone. SSN 111-22-3333.",
        )
        .await;

        assert_eq!(
            outcome.redaction_map.by_category.get(&PiiCategory::Name),
            Some(&3)
        );
        assert_eq!(
            outcome.redaction_map.by_category.get(&PiiCategory::Ssn),
            Some(&1)
        );
        assert_eq!(outcome.redaction_map.total(), 4);
    }
}
