//! Single-use hand-off slot between the view that starts a run and the
//! session view that displays it.
//!
//! A mailbox, not a cache: whatever was last written wins, and `take`
//! consumes it. Carries exactly the values a session view needs to attach
//! to an already-started run: the push-channel client id, the run id, the
//! dynamic-filter map, and the original task text.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use shopwatch_api_types::DynamicFilterMap;

const SLOT_FILE: &str = "handoff.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub client_id: String,
    pub run_id: String,
    pub dynamic_filters: DynamicFilterMap,
    pub task: String,
}

fn slot_path(dir: &Path) -> PathBuf {
    dir.join(SLOT_FILE)
}

/// Write the slot, replacing any previous content.
pub fn write(dir: &Path, handoff: &Handoff) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let raw = serde_json::to_string(handoff)?;
    std::fs::write(slot_path(dir), raw)?;
    Ok(())
}

/// Read and consume the slot. Returns `None` when empty or unreadable;
/// either way the slot is empty afterwards.
pub fn take(dir: &Path) -> Option<Handoff> {
    let path = slot_path(dir);
    let raw = std::fs::read_to_string(&path).ok()?;
    let _ = std::fs::remove_file(&path);
    match serde_json::from_str(&raw) {
        Ok(handoff) => Some(handoff),
        Err(e) => {
            debug!("discarding unreadable handoff slot: {e}");
            None
        }
    }
}
