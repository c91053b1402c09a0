use crate::model::{ExtractionMethod, RawCandidate, ScoredEvent};
use crate::normalize;
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Candidates below this confidence never reach the deduplicator.
pub const ADMISSION_THRESHOLD: u8 = 55;

const SPAM_PENALTY: i32 = 20;

/// Block-list scanned against title+description, one penalty per
/// matched term.
const SPAM_TERMS: &[&str] = &[
    "casino",
    "poker",
    "slots",
    "viagra",
    "cialis",
    "online pharmacy",
    "lottery",
    "jackpot",
    "work from home",
    "make money fast",
    "mlm",
    "multi-level marketing",
    "forex signals",
    "crypto giveaway",
    "click here",
    "buy now",
    "limited time offer",
    "free money",
    "hot singles",
];

/// Strings that show up where a title should be but never are one:
/// column headers, section labels, call-to-action stubs.
const KNOWN_NON_TITLES: &[&str] = &[
    "Event Date",
    "Event Type",
    "Event",
    "Events",
    "Calendar",
    "Upcoming Events",
    "More Info",
    "Read More",
    "Learn More",
    "View Details",
];

static LOCATION_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+(?:st|nd|rd|th)?\s+floor\b").expect("location-only regex must be valid")
});

/// A title is rejected outright (treated as absent) when it cannot be a
/// real event name: too short or long, a known non-title, raw markup,
/// or a bare location fragment.
pub fn validate_title(title: &str) -> bool {
    let title = title.trim();
    let len = title.chars().count();
    if len < 3 || len > 200 {
        return false;
    }

    if KNOWN_NON_TITLES
        .iter()
        .any(|known| title.eq_ignore_ascii_case(known))
    {
        return false;
    }

    if title.contains(['<', '>', '{', '}']) || title.contains("&lt;") || title.contains("&#") {
        return false;
    }

    if LOCATION_ONLY.is_match(title) {
        return false;
    }

    true
}

/// Scores a candidate on field completeness, date plausibility and spam
/// signals. The result is clamped to [0, 100]; a null date penalizes
/// but never rejects on its own.
pub fn score(candidate: RawCandidate, reference: NaiveDateTime) -> ScoredEvent {
    let title_ok = validate_title(&candidate.title);
    let start = candidate
        .start_text
        .as_deref()
        .and_then(|raw| normalize::normalize(raw, reference));

    let mut points: i32 = 0;

    if title_ok {
        let len = candidate.title.trim().chars().count();
        points += if (5..=200).contains(&len) { 30 } else { 15 };
    }

    if let Some(start) = start {
        points += if start.date() >= reference.date() {
            25
        } else {
            10
        };
    }

    if candidate
        .location_text
        .as_deref()
        .is_some_and(|v| !v.trim().is_empty())
    {
        points += 15;
    }

    match candidate.description.as_deref().map(str::len).unwrap_or(0) {
        len if len > 50 => points += 15,
        len if len > 10 => points += 8,
        _ => {}
    }

    if candidate.link.as_deref().is_some_and(is_absolute_url) {
        points += 10;
    }

    if candidate.image_url.is_some() {
        points += 2;
    }
    if candidate
        .price_text
        .as_deref()
        .is_some_and(|v| !v.trim().is_empty())
    {
        points += 2;
    }
    if candidate.category.is_some() {
        points += 1;
    }

    points += match candidate.method {
        ExtractionMethod::Structured | ExtractionMethod::SiteSpecific => 10,
        ExtractionMethod::Feed => 5,
        _ => 0,
    };

    points -= SPAM_PENALTY * spam_matches(&candidate) as i32;

    ScoredEvent {
        confidence: points.clamp(0, 100) as u8,
        start,
        title_ok,
        candidate,
    }
}

fn spam_matches(candidate: &RawCandidate) -> usize {
    let haystack = format!(
        "{} {}",
        candidate.title,
        candidate.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();

    SPAM_TERMS
        .iter()
        .filter(|term| haystack.contains(*term))
        .count()
}

fn is_absolute_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}
