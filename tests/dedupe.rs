use chrono::{NaiveDate, NaiveDateTime, Utc};
use evscout::dedupe::{
    StoreVerdict, check_against_store, dedupe_run, fingerprint, page_declares_past,
    suppress_as_past, token_overlap,
};
use evscout::model::{
    ApprovalStatus, ExtractionMethod, PendingEvent, QueueState, RawCandidate, ScoredEvent,
};
use evscout::store::{InsertOutcome, insert_pending, queue_key};

fn reference() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2027, 3, 10)
        .expect("valid date")
        .and_hms_opt(12, 0, 0)
        .expect("valid time")
}

fn start(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .expect("valid date")
        .and_hms_opt(19, 0, 0)
        .expect("valid time")
}

fn scored(title: &str, method: ExtractionMethod, confidence: u8) -> ScoredEvent {
    ScoredEvent {
        candidate: RawCandidate {
            title: title.to_string(),
            description: None,
            start_text: None,
            location_text: None,
            price_text: None,
            image_url: None,
            category: None,
            link: None,
            source_url: "https://venue.example.org/events".to_string(),
            method,
        },
        confidence,
        start: Some(start(2027, 6, 5)),
        title_ok: true,
    }
}

fn pending(title: &str, start_datetime: Option<NaiveDateTime>) -> PendingEvent {
    PendingEvent {
        title: title.to_string(),
        description: None,
        start_datetime,
        location_name: None,
        price_info: None,
        url: "https://venue.example.org/events".to_string(),
        source: "scraper".to_string(),
        approval_status: ApprovalStatus::Pending,
        confidence_score: 80,
        method: ExtractionMethod::CssHeuristic,
        review_note: None,
        created_at: Utc::now(),
    }
}

#[test]
fn punctuation_and_case_do_not_change_the_fingerprint() {
    let a = fingerprint("Jazz Night", Some(start(2027, 6, 5)));
    let b = fingerprint("jazz night!!", Some(start(2027, 6, 5)));
    assert_eq!(a, b);

    let c = fingerprint("jazz night", Some(start(2027, 6, 6)));
    assert_ne!(a, c);
}

#[test]
fn time_of_day_does_not_change_the_date_bucket() {
    let morning = NaiveDate::from_ymd_opt(2027, 6, 5)
        .expect("valid date")
        .and_hms_opt(9, 0, 0)
        .expect("valid time");
    assert_eq!(
        fingerprint("Jazz Night", Some(morning)),
        fingerprint("Jazz Night", Some(start(2027, 6, 5)))
    );
}

#[test]
fn run_dedupe_prefers_the_more_structured_extraction() {
    let survivors = dedupe_run(vec![
        scored("Harbor Lights Festival", ExtractionMethod::CssHeuristic, 95),
        scored("Harbor Lights Festival", ExtractionMethod::Structured, 88),
    ]);

    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].candidate.method, ExtractionMethod::Structured);
}

#[test]
fn run_dedupe_breaks_method_ties_on_confidence() {
    let survivors = dedupe_run(vec![
        scored("Harbor Lights Festival", ExtractionMethod::CssHeuristic, 70),
        scored("Harbor Lights Festival", ExtractionMethod::CssHeuristic, 85),
    ]);

    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].confidence, 85);
}

#[test]
fn token_overlap_is_word_set_intersection_over_union() {
    let high = token_overlap("Jazz Night at the Blue Room", "Jazz Night at Blue Room");
    assert!(high >= 0.8, "got {high}");

    let low = token_overlap("Jazz Night at the Blue Room", "Quarterly Budget Meeting");
    assert!(low < 0.2, "got {low}");

    assert_eq!(token_overlap("", "anything"), 0.0);
}

#[test]
fn exact_store_match_is_a_duplicate() {
    let mut state = QueueState::default();
    let key = queue_key(&fingerprint("Jazz Night", Some(start(2027, 6, 5))));
    assert_eq!(
        insert_pending(&mut state, key.clone(), pending("Jazz Night", Some(start(2027, 6, 5)))),
        InsertOutcome::Inserted
    );
    assert_eq!(
        insert_pending(&mut state, key, pending("Jazz Night", Some(start(2027, 6, 5)))),
        InsertOutcome::DuplicateKey
    );

    let verdict = check_against_store(
        &scored("jazz night!!", ExtractionMethod::CssHeuristic, 80),
        &state,
    );
    // The scored fixture uses the same date bucket as the stored event.
    assert_eq!(verdict, StoreVerdict::Duplicate);
}

#[test]
fn similar_title_same_date_is_flagged_for_review() {
    let mut state = QueueState::default();
    let stored = pending("Jazz Night at the Blue Room", Some(start(2027, 6, 5)));
    let key = queue_key(&fingerprint(&stored.title, stored.start_datetime));
    insert_pending(&mut state, key, stored);

    let verdict = check_against_store(
        &scored("Jazz Night at Blue Room", ExtractionMethod::CssHeuristic, 80),
        &state,
    );
    assert_eq!(
        verdict,
        StoreVerdict::NearDuplicate {
            existing_title: "Jazz Night at the Blue Room".to_string()
        }
    );
}

#[test]
fn unrelated_titles_are_fresh() {
    let mut state = QueueState::default();
    let stored = pending("Quarterly Budget Meeting", Some(start(2027, 6, 5)));
    let key = queue_key(&fingerprint(&stored.title, stored.start_datetime));
    insert_pending(&mut state, key, stored);

    let verdict = check_against_store(
        &scored("Jazz Night at Blue Room", ExtractionMethod::CssHeuristic, 80),
        &state,
    );
    assert_eq!(verdict, StoreVerdict::Fresh);
}

#[test]
fn stale_events_are_suppressed_without_a_page_marker() {
    let mut event = scored("Jazz Night", ExtractionMethod::CssHeuristic, 90);
    event.start = Some(start(2026, 12, 1));
    assert!(suppress_as_past(&event, false, reference()));
}

#[test]
fn recent_past_needs_the_page_marker_to_suppress() {
    let mut event = scored("Jazz Night", ExtractionMethod::CssHeuristic, 90);
    // A few days back: inside the staleness window.
    event.start = Some(start(2027, 3, 5));

    assert!(!suppress_as_past(&event, false, reference()));
    assert!(suppress_as_past(&event, true, reference()));
}

#[test]
fn future_and_undated_events_are_never_suppressed() {
    let future = scored("Jazz Night", ExtractionMethod::CssHeuristic, 90);
    assert!(!suppress_as_past(&future, true, reference()));

    let mut undated = scored("Jazz Night", ExtractionMethod::CssHeuristic, 90);
    undated.start = None;
    assert!(!suppress_as_past(&undated, true, reference()));
}

#[test]
fn page_past_markers_are_detected() {
    assert!(page_declares_past(
        "<p>This event has concluded. Thanks to everyone who came!</p>"
    ));
    assert!(page_declares_past("Browse our PAST EVENT archive"));
    assert!(!page_declares_past("Upcoming shows and tickets"));
}
