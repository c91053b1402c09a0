use anyhow::Result;
use evscout::harness::{HarnessOptions, run_harness};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn harness_reports_idempotence_across_runs() -> Result<()> {
    let temp = tempdir()?;
    let root = temp.keep();

    let fixture_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    copy_dir(&fixture_root, &root)?;

    let report = run_harness(&HarnessOptions {
        config_dir: root.join("sources"),
        queue_path: root.join("state/queue.json"),
    })?;

    assert_eq!(report.sources, 3);
    assert!(report.first_run_admitted >= 5);
    assert_eq!(report.second_run_admitted, 0);
    assert!(report.second_run_skipped_duplicate >= report.first_run_admitted);
    assert_eq!(report.queued_events, report.first_run_admitted);

    Ok(())
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else {
            if let Some(parent) = dst_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(src_path, dst_path)?;
        }
    }

    Ok(())
}
