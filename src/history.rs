use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub command: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct HistoryLog {
    /// Oldest first.
    entries: Vec<HistoryEntry>,
    capacity: usize,
    path: Option<PathBuf>,
}

impl HistoryLog {
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
            path: None,
        }
    }

    /// Migration and load problems are logged and leave an empty log.
    pub fn open(path: PathBuf, legacy: Option<&Path>, capacity: usize) -> Self {
        let mut log = Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
            path: Some(path),
        };

        if let (Some(legacy), Some(current)) = (legacy, log.path.as_deref()) {
            match migrate_legacy(legacy, current, log.capacity) {
                Ok(true) => tracing::info!(
                    from = %legacy.display(),
                    to = %current.display(),
                    "migrated legacy history"
                ),
                Ok(false) => {}
                Err(err) => tracing::warn!(
                    from = %legacy.display(),
                    error = %err,
                    "failed to migrate legacy history"
                ),
            }
        }

        if let Err(err) = log.load() {
            tracing::warn!(error = %err, "failed to load history, starting empty");
            log.entries.clear();
        }
        log
    }

    pub fn load(&mut self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        if !path.exists() {
            self.entries.clear();
            return Ok(());
        }
        let mut entries = read_entries(path)?;
        truncate_to_tail(&mut entries, self.capacity);
        self.entries = entries;
        Ok(())
    }

    /// A persistence error is returned after the entry is already in memory.
    pub fn add(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        if self.entries.last().is_some_and(|last| last.command == text) {
            return Ok(());
        }

        self.entries.push(HistoryEntry {
            command: text.to_string(),
            timestamp: Utc::now(),
        });
        truncate_to_tail(&mut self.entries, self.capacity);
        self.save()
    }

    /// Persists the empty log first; memory is only cleared once disk is.
    pub fn clear(&mut self) -> Result<()> {
        if let Some(path) = self.path.as_deref() {
            write_entries(path, &[])?;
        }
        self.entries.clear();
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        match self.path.as_deref() {
            Some(path) => write_entries(path, &self.entries),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// `0` is the most recent entry.
    pub fn recent(&self, index: usize) -> Option<&str> {
        let len = self.entries.len();
        if index >= len {
            return None;
        }
        Some(self.entries[len - 1 - index].command.as_str())
    }
}

/// Copies a legacy log into `current` when the legacy file exists and
/// `current` does not. The legacy file is left in place.
pub fn migrate_legacy(legacy: &Path, current: &Path, capacity: usize) -> Result<bool> {
    if !legacy.exists() || current.exists() {
        return Ok(false);
    }
    let mut entries = read_entries(legacy)?;
    truncate_to_tail(&mut entries, capacity.max(1));
    write_entries(current, &entries)
        .with_context(|| format!("failed to save migrated history to '{}'", current.display()))?;
    Ok(true)
}

fn truncate_to_tail(entries: &mut Vec<HistoryEntry>, capacity: usize) {
    if entries.len() > capacity {
        let excess = entries.len() - capacity;
        entries.drain(..excess);
    }
}

fn read_entries(path: &Path) -> Result<Vec<HistoryEntry>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open history file '{}'", path.display()))?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).split(b'\n') {
        let line =
            line.with_context(|| format!("failed to read history file '{}'", path.display()))?;
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<HistoryEntry>(line) {
            Ok(entry) if !entry.command.trim().is_empty() => entries.push(entry),
            Ok(_) => {}
            Err(err) => tracing::debug!(error = %err, "skipping malformed history line"),
        }
    }
    Ok(entries)
}

fn write_entries(path: &Path, entries: &[HistoryEntry]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create history directory '{}'", parent.display())
        })?;
    }

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("failed to create '{}'", tmp_path.display()))?;
        for entry in entries {
            serde_json::to_writer(&mut file, entry).context("failed to serialize history entry")?;
            writeln!(file).context("failed to write history newline")?;
        }
        file.sync_all()
            .with_context(|| format!("failed to sync '{}'", tmp_path.display()))?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to replace history file '{}'", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Back,
    /// Toward newer entries, and past the newest back to the draft.
    Forward,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryCursor {
    index: Option<usize>,
    saved_draft: String,
}

impl HistoryCursor {
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_navigating(&self) -> bool {
        self.index.is_some()
    }

    pub fn saved_draft(&self) -> &str {
        &self.saved_draft
    }

    pub fn reset(&mut self, draft: &str) {
        self.index = None;
        self.saved_draft = draft.to_string();
    }

    /// Moves the cursor and returns the text the edit buffer should now
    /// hold, or `None` when the cursor did not move.
    pub fn navigate(
        &mut self,
        direction: Direction,
        log: &HistoryLog,
        current: &str,
    ) -> Option<String> {
        match (direction, self.index) {
            (Direction::Back, None) => {
                let text = log.recent(0)?.to_string();
                self.saved_draft = current.to_string();
                self.index = Some(0);
                Some(text)
            }
            (Direction::Back, Some(index)) => {
                let text = log.recent(index + 1)?.to_string();
                self.index = Some(index + 1);
                Some(text)
            }
            (Direction::Forward, Some(0)) => {
                self.index = None;
                Some(self.saved_draft.clone())
            }
            (Direction::Forward, Some(index)) => {
                let target = (index - 1).min(log.len().saturating_sub(1));
                match log.recent(target) {
                    Some(text) => {
                        self.index = Some(target);
                        Some(text.to_string())
                    }
                    None => {
                        self.index = None;
                        Some(self.saved_draft.clone())
                    }
                }
            }
            (Direction::Forward, None) => None,
        }
    }
}
