//! Persisted list of recent searches.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub query: String,
    pub searched_at: DateTime<Utc>,
}

/// Most-recent-first search history backed by a JSON file
#[derive(Debug)]
pub struct SearchHistory {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
    max_entries: usize,
    min_query_length: usize,
}

impl SearchHistory {
    /// Load history from `path`; a missing or unreadable file yields an empty history
    pub fn load(path: impl AsRef<Path>, max_entries: usize, min_query_length: usize) -> Self {
        let path = path.as_ref().to_path_buf();

        let entries = match Self::read_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load search history, starting empty");
                Vec::new()
            }
        };

        let mut history = Self {
            path,
            entries,
            max_entries,
            min_query_length,
        };
        history.entries.truncate(max_entries);
        history
    }

    fn read_entries(path: &Path) -> Result<Vec<HistoryEntry>> {
        if !path.exists() {
            debug!(path = %path.display(), "No search history yet");
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read history file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse history file: {}", path.display()))
    }

    /// Record a query; returns false when it is too short to remember
    pub fn add(&mut self, query: &str) -> bool {
        self.add_at(query, Utc::now())
    }

    fn add_at(&mut self, query: &str, now: DateTime<Utc>) -> bool {
        let query = query.trim();
        if query.chars().count() < self.min_query_length {
            return false;
        }

        let lowered = query.to_lowercase();
        self.entries.retain(|entry| entry.query.to_lowercase() != lowered);
        self.entries.insert(
            0,
            HistoryEntry {
                query: query.to_string(),
                searched_at: now,
            },
        );
        self.entries.truncate(self.max_entries);
        true
    }

    /// Write the history back to disk, creating parent directories as needed
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content =
            serde_json::to_string_pretty(&self.entries).context("Failed to serialize history")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write history file: {}", self.path.display()))?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Search history saved");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        info!("Search history cleared");
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
