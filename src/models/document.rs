use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of a vault document. Transitions are compare-and-set
/// in the database; the only legal edges are pending -> processing,
/// processing -> ready, processing -> failed and failed -> pending
/// (owner-initiated reprocess).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DocumentStatus::Pending),
            "processing" => Some(DocumentStatus::Processing),
            "ready" => Some(DocumentStatus::Ready),
            "failed" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }

    /// Whether a compare-and-set transition from `self` to `next` is legal.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (DocumentStatus::Pending, DocumentStatus::Processing)
                | (DocumentStatus::Processing, DocumentStatus::Ready)
                | (DocumentStatus::Processing, DocumentStatus::Failed)
                | (DocumentStatus::Failed, DocumentStatus::Pending)
        )
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed set of PII categories the redaction engine reports. Kept as an
/// enum rather than free-form strings so redaction maps stay statically
/// checkable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Name,
    Email,
    Phone,
    Ssn,
    DateOfBirth,
    Address,
    AccountNumber,
}

impl PiiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiCategory::Name => "name",
            PiiCategory::Email => "email",
            PiiCategory::Phone => "phone",
            PiiCategory::Ssn => "ssn",
            PiiCategory::DateOfBirth => "date_of_birth",
            PiiCategory::Address => "address",
            PiiCategory::AccountNumber => "account_number",
        }
    }
}

impl std::fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-document redaction summary: total masked spans plus a count per
/// PII category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RedactionMap {
    pub by_category: BTreeMap<PiiCategory, i32>,
}

impl RedactionMap {
    pub fn record(&mut self, category: PiiCategory) {
        *self.by_category.entry(category).or_insert(0) += 1;
    }

    pub fn total(&self) -> i32 {
        self.by_category.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_category.is_empty()
    }
}

/// A timeline candidate extracted from the redacted text: a date the
/// engine could anchor plus the surrounding line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExtractedEvent {
    pub occurred_on: NaiveDate,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VaultDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub checksum: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub processing_error: Option<String>,
    pub pii_redacted: bool,
    pub redaction_count: Option<i32>,
    pub redactions_by_type: Option<serde_json::Value>,
    pub extracted_text: Option<String>,
    pub extracted_events: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VaultDocument {
    pub fn status(&self) -> Option<DocumentStatus> {
        DocumentStatus::parse(&self.status)
    }

    pub fn redaction_map(&self) -> Option<RedactionMap> {
        self.redactions_by_type
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .map(|by_category| RedactionMap { by_category })
    }
}

/// Everything needed to create a new document record at upload-intent
/// time. The storage key is issued by the storage service before the
/// record exists.
#[derive(Debug, Clone)]
pub struct NewVaultDocument {
    pub user_id: Uuid,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_status_edges() {
        use DocumentStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Ready));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));
    }

    #[test]
    fn illegal_status_edges() {
        use DocumentStatus::*;
        assert!(!Pending.can_transition_to(Ready));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Ready.can_transition_to(Pending));
        assert!(!Ready.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Ready));
        assert!(!Processing.can_transition_to(Pending));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Processing,
            DocumentStatus::Ready,
            DocumentStatus::Failed,
        ] {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::parse("queued"), None);
    }

    #[test]
    fn redaction_map_totals() {
        let mut map = RedactionMap::default();
        map.record(PiiCategory::Name);
        map.record(PiiCategory::Name);
        map.record(PiiCategory::Name);
        map.record(PiiCategory::Ssn);

        assert_eq!(map.total(), 4);
        assert_eq!(map.by_category.get(&PiiCategory::Name), Some(&3));
        assert_eq!(map.by_category.get(&PiiCategory::Ssn), Some(&1));
        assert_eq!(map.by_category.get(&PiiCategory::Email), None);
    }
}
