//! Remembers where the user stopped reading.
//!
//! A single JSON record `{"file": ..., "current_page": ...}` is kept at a
//! fixed path and overwritten on every save. Reading is best effort: a missing
//! or malformed file simply means "no saved position".

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingPosition {
    pub file: String,
    pub current_page: usize,
}

impl ReadingPosition {
    pub fn new(document: &Path, current_page: usize) -> Self {
        Self {
            file: document.to_string_lossy().into_owned(),
            current_page,
        }
    }

    /// Page to resume at when opening `document`, if this record belongs to it.
    pub fn resume_page(&self, document: &Path, page_count: usize) -> Option<usize> {
        if self.file != document.to_string_lossy() {
            debug!(
                stored = %self.file,
                opened = %document.display(),
                "Ignoring saved position for a different document"
            );
            return None;
        }
        if page_count == 0 {
            return None;
        }
        Some(self.current_page.min(page_count - 1))
    }
}

pub fn load_position(store: &Path) -> Option<ReadingPosition> {
    let data = fs::read_to_string(store).ok()?;
    match serde_json::from_str(&data) {
        Ok(position) => Some(position),
        Err(err) => {
            warn!(path = %store.display(), "Ignoring malformed reading position: {err}");
            None
        }
    }
}

pub fn save_position(store: &Path, position: &ReadingPosition) -> Result<()> {
    if let Some(parent) = store.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating {}", parent.display()))?;
        }
    }
    let contents = serde_json::to_string(position).context("Serializing reading position")?;
    fs::write(store, contents).with_context(|| format!("Writing {}", store.display()))?;
    info!(
        path = %store.display(),
        file = %position.file,
        page = position.current_page,
        "Saved reading position"
    );
    Ok(())
}
