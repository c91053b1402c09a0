use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Structured,
    Microdata,
    SiteSpecific,
    Feed,
    CssHeuristic,
    TextMining,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Structured => "structured",
            ExtractionMethod::Microdata => "microdata",
            ExtractionMethod::SiteSpecific => "site_specific",
            ExtractionMethod::Feed => "feed",
            ExtractionMethod::CssHeuristic => "css_heuristic",
            ExtractionMethod::TextMining => "text_mining",
        }
    }

    /// Lower rank means the method is trusted more. Drives both the
    /// orchestration order and which copy of a duplicate survives.
    pub fn trust_rank(&self) -> u8 {
        match self {
            ExtractionMethod::Structured => 0,
            ExtractionMethod::Microdata => 1,
            ExtractionMethod::SiteSpecific => 2,
            ExtractionMethod::Feed => 3,
            ExtractionMethod::CssHeuristic => 4,
            ExtractionMethod::TextMining => 5,
        }
    }
}

/// Unvalidated event as it came off the page. Produced by exactly one
/// extractor invocation and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub title: String,
    pub description: Option<String>,
    pub start_text: Option<String>,
    pub location_text: Option<String>,
    pub price_text: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub link: Option<String>,
    pub source_url: String,
    pub method: ExtractionMethod,
}

/// A candidate after validation and scoring.
#[derive(Debug, Clone)]
pub struct ScoredEvent {
    pub candidate: RawCandidate,
    pub confidence: u8,
    pub start: Option<NaiveDateTime>,
    pub title_ok: bool,
}

/// Identity used for duplicate suppression: two events with equal
/// fingerprints are treated as the same real-world event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventFingerprint {
    pub title_key: String,
    pub date_bucket: String,
}

impl EventFingerprint {
    pub fn storage_key(&self) -> String {
        format!("{}|{}", self.title_key, self.date_bucket)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// Queue record awaiting human review. The pipeline only ever inserts
/// these with `approval_status = pending`; status transitions belong to
/// the admin collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_datetime: Option<NaiveDateTime>,
    pub location_name: Option<String>,
    pub price_info: Option<String>,
    pub url: String,
    pub source: String,
    pub approval_status: ApprovalStatus,
    pub confidence_score: u8,
    pub method: ExtractionMethod,
    #[serde(default)]
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueState {
    pub schema_version: u32,
    pub events: BTreeMap<String, PendingEvent>,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            schema_version: 1,
            events: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceRunReport {
    pub source_key: String,
    pub found: usize,
    pub admitted: usize,
    pub skipped_duplicate: usize,
    pub skipped_low_confidence: usize,
    pub flagged_review: usize,
    pub suppressed_past: usize,
    pub errored: usize,
}
