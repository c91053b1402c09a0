use crate::model::{EventFingerprint, PendingEvent, QueueState, ScoredEvent};
use chrono::{Duration, NaiveDateTime};
use std::collections::{HashMap, HashSet};

/// Token-overlap similarity at or above this flags a near-duplicate.
pub const NEAR_DUPLICATE_THRESHOLD: f32 = 0.8;

/// Events whose only known date is older than this are dropped as
/// stale regardless of score.
pub const STALENESS_DAYS: i64 = 30;

const TITLE_KEY_LEN: usize = 50;

/// Phrases a page uses to announce that an event already happened.
const PAST_MARKERS: &[&str] = &[
    "past event",
    "this event has ended",
    "event has concluded",
    "event is over",
    "already taken place",
];

/// Normalized (title, date) identity: lowercased, punctuation stripped,
/// truncated title plus a date-only bucket.
pub fn fingerprint(title: &str, start: Option<NaiveDateTime>) -> EventFingerprint {
    EventFingerprint {
        title_key: title_key(title),
        date_bucket: date_bucket(start),
    }
}

fn title_key(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(TITLE_KEY_LEN)
        .collect()
}

pub fn date_bucket(start: Option<NaiveDateTime>) -> String {
    match start {
        Some(start) => start.date().format("%Y-%m-%d").to_string(),
        None => "undated".to_string(),
    }
}

/// Collapses a run's candidates to one event per fingerprint, keeping
/// the more structured extraction and breaking ties on confidence.
/// Input order is preserved for the survivors.
pub fn dedupe_run(events: Vec<ScoredEvent>) -> Vec<ScoredEvent> {
    let mut order: Vec<EventFingerprint> = Vec::new();
    let mut best: HashMap<EventFingerprint, ScoredEvent> = HashMap::new();

    for event in events {
        let fp = fingerprint(&event.candidate.title, event.start);
        let keep = match best.get(&fp) {
            None => {
                order.push(fp.clone());
                true
            }
            Some(current) => prefer(&event, current),
        };
        if keep {
            best.insert(fp, event);
        }
    }

    order.into_iter().filter_map(|fp| best.remove(&fp)).collect()
}

fn prefer(new: &ScoredEvent, current: &ScoredEvent) -> bool {
    let new_key = (new.candidate.method.trust_rank(), u8::MAX - new.confidence);
    let current_key = (
        current.candidate.method.trust_rank(),
        u8::MAX - current.confidence,
    );
    new_key < current_key
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreVerdict {
    Fresh,
    /// Exact fingerprint match against a persisted record.
    Duplicate,
    /// Same date bucket, similar-but-not-identical title: admit, but
    /// flag for a human instead of silently merging or inserting.
    NearDuplicate { existing_title: String },
}

pub fn check_against_store(event: &ScoredEvent, state: &QueueState) -> StoreVerdict {
    let fp = fingerprint(&event.candidate.title, event.start);

    if state.events.contains_key(&crate::store::queue_key(&fp)) {
        return StoreVerdict::Duplicate;
    }

    for existing in state.events.values() {
        if persisted_date_bucket(existing) != fp.date_bucket {
            continue;
        }
        if token_overlap(&event.candidate.title, &existing.title) >= NEAR_DUPLICATE_THRESHOLD {
            return StoreVerdict::NearDuplicate {
                existing_title: existing.title.clone(),
            };
        }
    }

    StoreVerdict::Fresh
}

fn persisted_date_bucket(event: &PendingEvent) -> String {
    date_bucket(event.start_datetime)
}

/// Intersection-over-union of the two titles' lowercased word sets.
pub fn token_overlap(a: &str, b: &str) -> f32 {
    let set_a = word_set(a);
    let set_b = word_set(b);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f32 / union as f32
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(ToString::to_string)
        .collect()
}

pub fn page_declares_past(page_text: &str) -> bool {
    let lower = page_text.to_lowercase();
    PAST_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// A candidate is suppressed outright when the page says the event is
/// over and its date agrees, or when its date fell out of the staleness
/// window entirely. Score cannot rescue it.
pub fn suppress_as_past(
    event: &ScoredEvent,
    page_marks_past: bool,
    reference: NaiveDateTime,
) -> bool {
    let Some(start) = event.start else {
        return false;
    };

    let today = reference.date();
    if page_marks_past && start.date() < today {
        return true;
    }

    start.date() < today - Duration::days(STALENESS_DAYS)
}
