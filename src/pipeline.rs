use crate::config::{FetchMode, LoadedSource, load_source_file, load_sources_from_dir};
use crate::dedupe::{self, StoreVerdict};
use crate::extract::{ExtractContext, ScanMode, SiteRegistry, extract_candidates};
use crate::fetch::fetch_source_page;
use crate::model::{
    ApprovalStatus, ExtractionMethod, PendingEvent, QueueState, ScoredEvent, SourceRunReport,
};
use crate::normalize;
use crate::rss;
use crate::score::{self, ADMISSION_THRESHOLD};
use crate::store::{InsertOutcome, insert_pending, load_queue, queue_key, save_queue};
use anyhow::{Result, bail};
use chrono::Utc;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

pub const MAX_WORKERS: usize = 8;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub config_dir: PathBuf,
    pub queue_path: PathBuf,
    pub source: Option<String>,
    pub mode: ScanMode,
    pub dry_run: bool,
    pub workers: usize,
}

#[derive(Debug, Clone)]
pub struct ValidateOptions {
    pub config_dir: Option<PathBuf>,
    pub source_file: Option<PathBuf>,
}

/// One source's worth of pipeline output, produced by a worker and
/// merged into the queue after the pool joins.
struct SourceOutcome {
    report: SourceRunReport,
    admitted: Vec<(String, PendingEvent)>,
}

pub fn scan_sources(options: &ScanOptions) -> Result<Vec<SourceRunReport>> {
    let mut sources = load_sources_from_dir(&options.config_dir)?;
    if let Some(filter) = &options.source {
        sources.retain(|s| s.config.source.key == *filter);
    }
    sources.retain(|s| {
        if !s.config.source.enabled {
            info!(source = %s.config.source.key, "source disabled; skipping");
        }
        s.config.source.enabled
    });
    if sources.is_empty() {
        bail!("no matching source configurations found");
    }

    let registry = SiteRegistry::from_sources(&sources);
    let mut state = load_queue(&options.queue_path)?;

    let outcomes = run_worker_pool(&sources, &registry, &state, options);

    // Single-threaded merge; the queue key is the uniqueness constraint
    // that settles any duplicate the workers' snapshot checks missed.
    let mut reports = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let mut report = outcome.report;
        for (key, event) in outcome.admitted {
            match insert_pending(&mut state, key, event) {
                InsertOutcome::Inserted => report.admitted += 1,
                InsertOutcome::DuplicateKey => report.skipped_duplicate += 1,
            }
        }

        info!(
            source = %report.source_key,
            found = report.found,
            admitted = report.admitted,
            skipped_duplicate = report.skipped_duplicate,
            skipped_low_confidence = report.skipped_low_confidence,
            flagged_review = report.flagged_review,
            suppressed_past = report.suppressed_past,
            errored = report.errored,
            "source scan summary"
        );
        reports.push(report);
    }

    if !options.dry_run {
        save_queue(&options.queue_path, &state)?;
        info!(queue = %options.queue_path.display(), "queue written");
    } else {
        info!("dry run enabled; queue not persisted");
    }

    Ok(reports)
}

fn run_worker_pool(
    sources: &[LoadedSource],
    registry: &SiteRegistry,
    state: &QueueState,
    options: &ScanOptions,
) -> Vec<SourceOutcome> {
    let worker_count = options.workers.clamp(1, MAX_WORKERS).min(sources.len());
    let next = AtomicUsize::new(0);
    let mut indexed: Vec<(usize, SourceOutcome)> = Vec::with_capacity(sources.len());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|_| {
                scope.spawn(|| {
                    let mut local = Vec::new();
                    loop {
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(source) = sources.get(index) else {
                            break;
                        };
                        if !local.is_empty() && source.config.fetch.mode == FetchMode::Http {
                            politeness_pause();
                        }
                        local.push((index, scan_single_source(source, registry, state, options.mode)));
                    }
                    local
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(local) => indexed.extend(local),
                Err(_) => warn!("scan worker panicked; its sources are unreported"),
            }
        }
    });

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Advisory delay between successive live fetches from one worker, so
/// back-to-back sources on the same host do not trip rate limits.
fn politeness_pause() {
    let ms = rand::rng().random_range(1_000..=3_000);
    std::thread::sleep(Duration::from_millis(ms));
}

/// Runs the whole per-source pipeline behind one error boundary: any
/// unexpected failure becomes a zero-candidate result with a logged
/// diagnostic, never an aborted run.
fn scan_single_source(
    source: &LoadedSource,
    registry: &SiteRegistry,
    state: &QueueState,
    mode: ScanMode,
) -> SourceOutcome {
    let mut report = SourceRunReport {
        source_key: source.config.source.key.clone(),
        ..SourceRunReport::default()
    };

    match scan_source_inner(source, registry, state, mode, &mut report) {
        Ok(admitted) => SourceOutcome { report, admitted },
        Err(err) => {
            warn!(
                source = %source.config.source.key,
                error = %err,
                "source scan failed; treating as zero candidates"
            );
            report.errored += 1;
            SourceOutcome {
                report,
                admitted: Vec::new(),
            }
        }
    }
}

fn scan_source_inner(
    source: &LoadedSource,
    registry: &SiteRegistry,
    state: &QueueState,
    mode: ScanMode,
    report: &mut SourceRunReport,
) -> Result<Vec<(String, PendingEvent)>> {
    let reference = normalize::local_now(source.config.source.timezone.as_deref());

    let Some(page) = fetch_source_page(source) else {
        report.errored += 1;
        return Ok(Vec::new());
    };

    let (candidates, page_marks_past) = if source.config.feed.enabled {
        (rss::parse_feed(&page.html, &page.url)?, false)
    } else {
        let ctx = ExtractContext {
            overrides: &source.config.selectors,
            registry,
        };
        let candidates = extract_candidates(&page, &ctx, mode);
        let marks_past = dedupe::page_declares_past(&page.html);
        (candidates, marks_past)
    };

    report.found = candidates.len();

    let mut scored: Vec<ScoredEvent> = Vec::new();
    for candidate in candidates {
        let event = score::score(candidate, reference);

        if !event.title_ok {
            report.skipped_low_confidence += 1;
            continue;
        }
        if dedupe::suppress_as_past(&event, page_marks_past, reference) {
            report.suppressed_past += 1;
            continue;
        }
        if event.confidence < ADMISSION_THRESHOLD {
            report.skipped_low_confidence += 1;
            continue;
        }
        scored.push(event);
    }

    let before = scored.len();
    let deduped = dedupe::dedupe_run(scored);
    report.skipped_duplicate += before - deduped.len();

    let mut admitted = Vec::new();
    for event in deduped {
        match dedupe::check_against_store(&event, state) {
            StoreVerdict::Duplicate => report.skipped_duplicate += 1,
            StoreVerdict::NearDuplicate { existing_title } => {
                report.flagged_review += 1;
                let note = format!("possible duplicate of \"{existing_title}\"");
                admitted.push(to_pending(event, Some(note)));
            }
            StoreVerdict::Fresh => admitted.push(to_pending(event, None)),
        }
    }

    Ok(admitted)
}

fn to_pending(event: ScoredEvent, review_note: Option<String>) -> (String, PendingEvent) {
    let fp = dedupe::fingerprint(&event.candidate.title, event.start);
    let key = queue_key(&fp);
    let candidate = event.candidate;

    let source = if candidate.method == ExtractionMethod::Feed {
        "rss"
    } else {
        "scraper"
    };

    let pending = PendingEvent {
        title: candidate.title,
        description: candidate.description,
        start_datetime: event.start,
        location_name: candidate.location_text,
        price_info: candidate.price_text,
        url: candidate.link.unwrap_or(candidate.source_url),
        source: source.to_string(),
        approval_status: ApprovalStatus::Pending,
        confidence_score: event.confidence,
        method: candidate.method,
        review_note,
        created_at: Utc::now(),
    };

    (key, pending)
}

pub fn validate_configs(options: &ValidateOptions) -> Result<Vec<String>> {
    let mut messages = Vec::new();

    if let Some(file) = &options.source_file {
        let source = load_source_file(file)?;
        messages.push(format!(
            "OK: {} ({})",
            source.config.source.key,
            file.display()
        ));
        return Ok(messages);
    }

    if let Some(dir) = &options.config_dir {
        let sources = load_sources_from_dir(dir)?;
        for source in sources {
            messages.push(format!(
                "OK: {} ({})",
                source.config.source.key,
                source.path.display()
            ));
        }
        return Ok(messages);
    }

    bail!("either --config-dir or --source-file must be provided");
}

pub fn load_queue_for_read(path: &Path) -> Result<QueueState> {
    load_queue(path)
}
