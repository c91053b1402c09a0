use crate::extract::ScanMode;
use crate::pipeline::{ScanOptions, load_queue_for_read, scan_sources};
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub config_dir: PathBuf,
    pub queue_path: PathBuf,
}

/// Stability check: a second scan of unchanged pages must admit
/// nothing, because everything it finds is already queued.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    pub sources: usize,
    pub first_run_admitted: usize,
    pub first_run_skipped_low_confidence: usize,
    pub first_run_suppressed_past: usize,
    pub second_run_admitted: usize,
    pub second_run_skipped_duplicate: usize,
    pub queued_events: usize,
}

pub fn run_harness(options: &HarnessOptions) -> Result<HarnessReport> {
    if options.queue_path.exists() {
        std::fs::remove_file(&options.queue_path)?;
    }

    let scan = ScanOptions {
        config_dir: options.config_dir.clone(),
        queue_path: options.queue_path.clone(),
        source: None,
        mode: ScanMode::Union,
        dry_run: false,
        workers: 1,
    };

    let first = scan_sources(&scan)?;
    let second = scan_sources(&scan)?;

    let state = load_queue_for_read(&options.queue_path)?;

    Ok(HarnessReport {
        sources: first.len(),
        first_run_admitted: first.iter().map(|r| r.admitted).sum(),
        first_run_skipped_low_confidence: first.iter().map(|r| r.skipped_low_confidence).sum(),
        first_run_suppressed_past: first.iter().map(|r| r.suppressed_past).sum(),
        second_run_admitted: second.iter().map(|r| r.admitted).sum(),
        second_run_skipped_duplicate: second.iter().map(|r| r.skipped_duplicate).sum(),
        queued_events: state.events.len(),
    })
}
