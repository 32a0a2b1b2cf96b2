use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use casevault::models::PiiCategory;
use casevault::processing::{
    extract_events, EngineError, PatternRedactionEngine, Redaction, RedactionEngine,
};

const CASE_DOCUMENT: &str = "\
Intake summary for Mr. Alan Reyes
DOB: 07/14/1975
Reached at alan.reyes@example.org or 555-203-9981.
03/02/2024 Initial consultation at 118 Maple Avenue office.
04/18/2024 Filed benefits claim, reference SSN 523-11-0187.
Follow-up hearing scheduled for June 3, 2024.
";

#[tokio::test]
async fn full_pipeline_masks_pii_and_builds_a_timeline() {
    let engine = PatternRedactionEngine::new();

    let text = engine
        .extract_text(CASE_DOCUMENT.as_bytes(), "text/plain")
        .await
        .unwrap();
    let redaction = engine.redact(&text).await.unwrap();

    // Every detected span is masked in the persisted artifact
    for leaked in [
        "Alan Reyes",
        "07/14/1975",
        "alan.reyes@example.org",
        "555-203-9981",
        "118 Maple Avenue",
        "523-11-0187",
    ] {
        assert!(
            !redaction.redacted_text.contains(leaked),
            "redacted text still contains {leaked:?}"
        );
    }

    let by_category = &redaction.redaction_map.by_category;
    assert_eq!(by_category.get(&PiiCategory::Name), Some(&1));
    assert_eq!(by_category.get(&PiiCategory::DateOfBirth), Some(&1));
    assert_eq!(by_category.get(&PiiCategory::Email), Some(&1));
    assert_eq!(by_category.get(&PiiCategory::Phone), Some(&1));
    assert_eq!(by_category.get(&PiiCategory::Address), Some(&1));
    assert_eq!(by_category.get(&PiiCategory::Ssn), Some(&1));
    assert_eq!(redaction.redaction_map.total(), 6);

    // Timeline candidates come from the redacted text: the masked date
    // of birth never becomes an event, the case dates do
    let events = extract_events(&redaction.redacted_text);
    let dates: Vec<NaiveDate> = events.iter().map(|e| e.occurred_on).collect();

    assert!(dates.contains(&NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()));
    assert!(dates.contains(&NaiveDate::from_ymd_opt(2024, 4, 18).unwrap()));
    assert!(dates.contains(&NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()));
    assert!(!dates.contains(&NaiveDate::from_ymd_opt(1975, 7, 14).unwrap()));

    for event in &events {
        assert!(!event.snippet.contains("523-11-0187"));
    }
}

#[tokio::test]
async fn engine_runs_unchanged_on_repeat_input() {
    // The engine is pure: same bytes in, same artifacts out
    let engine = PatternRedactionEngine::new();

    let first = engine
        .extract_text(CASE_DOCUMENT.as_bytes(), "text/plain")
        .await
        .unwrap();
    let second = engine
        .extract_text(CASE_DOCUMENT.as_bytes(), "text/plain")
        .await
        .unwrap();
    assert_eq!(first, second);

    let first = engine.redact(&first).await.unwrap();
    let second = engine.redact(&second).await.unwrap();
    assert_eq!(first.redacted_text, second.redacted_text);
    assert_eq!(first.redaction_map, second.redaction_map);
}

/// A stand-in for the external OCR/model collaborator, wired through
/// the same trait object seam the worker uses.
struct StubEngine;

#[async_trait]
impl RedactionEngine for StubEngine {
    async fn extract_text(&self, bytes: &[u8], mime_type: &str) -> Result<String, EngineError> {
        if mime_type == "application/pdf" {
            Ok(format!("extracted {} bytes", bytes.len()))
        } else {
            Err(EngineError::UnsupportedMime(mime_type.to_string()))
        }
    }

    async fn redact(&self, text: &str) -> Result<Redaction, EngineError> {
        Ok(Redaction {
            redacted_text: text.to_string(),
            redaction_map: Default::default(),
        })
    }
}

#[tokio::test]
async fn external_engines_plug_in_behind_the_trait() {
    let engine: Arc<dyn RedactionEngine> = Arc::new(StubEngine);

    let text = engine.extract_text(b"%PDF-1.7", "application/pdf").await.unwrap();
    assert_eq!(text, "extracted 8 bytes");

    let err = engine.extract_text(b"...", "image/png").await.unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedMime(_)));
}
