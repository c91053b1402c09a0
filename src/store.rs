use crate::model::{EventFingerprint, PendingEvent, QueueState};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::btree_map::Entry;
use std::path::Path;

pub fn load_queue(path: &Path) -> Result<QueueState> {
    if !path.exists() {
        return Ok(QueueState::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read queue file {}", path.display()))?;
    let state = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse queue file {}", path.display()))?;
    Ok(state)
}

pub fn save_queue(path: &Path, state: &QueueState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create queue directory {}", parent.display()))?;
    }

    let serialized = serde_json::to_string_pretty(state)?;
    std::fs::write(path, serialized)
        .with_context(|| format!("failed to write queue file {}", path.display()))?;
    Ok(())
}

/// Storage key for a fingerprint. Hashing the normalized (title, date)
/// pair is what makes the queue's uniqueness constraint the final word
/// on duplicate-insert races.
pub fn queue_key(fp: &EventFingerprint) -> String {
    let digest = Sha256::digest(fp.storage_key().as_bytes());
    hex::encode(digest)[..24].to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The key was already present; callers treat this exactly like a
    /// deduplication skip.
    DuplicateKey,
}

pub fn insert_pending(state: &mut QueueState, key: String, event: PendingEvent) -> InsertOutcome {
    match state.events.entry(key) {
        Entry::Occupied(_) => InsertOutcome::DuplicateKey,
        Entry::Vacant(slot) => {
            slot.insert(event);
            InsertOutcome::Inserted
        }
    }
}
