//! Ordered log of past generations.
//!
//! Entries are appended once per successful generation and never mutated.
//! Selecting an entry hands out a shared handle; the log itself is unchanged.
//! When a capacity is configured the oldest entry is evicted to make room.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;

use crate::error::HistoryError;
use crate::graph::Graph;

/// One past successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Topic as the user typed it; used as the display label.
    pub query: String,
    /// Topic after refinement; the key used for lookup and generation.
    pub refined_query: String,
    pub response: Graph,
    pub knowledge_context: String,
}

impl HistoryEntry {
    pub fn new(
        query: impl Into<String>,
        refined_query: impl Into<String>,
        response: Graph,
        knowledge_context: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            refined_query: refined_query.into(),
            response,
            knowledge_context: knowledge_context.into(),
        }
    }
}

/// Append-only history, oldest first.
#[derive(Debug, Default)]
pub struct History {
    entries: VecDeque<Arc<HistoryEntry>>,
    capacity: Option<usize>,
}

impl History {
    /// An unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// A history that keeps at most `capacity` entries. A capacity of zero is
    /// treated as one so the latest generation is always retained.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: Some(capacity.max(1)),
        }
    }

    /// Build from an optional capacity (`None` = unbounded).
    pub fn bounded(capacity: Option<usize>) -> Self {
        match capacity {
            Some(cap) => Self::with_capacity(cap),
            None => Self::new(),
        }
    }

    /// Append an entry and return its shared handle.
    pub fn append(&mut self, entry: HistoryEntry) -> Arc<HistoryEntry> {
        if let Some(cap) = self.capacity {
            while self.entries.len() >= cap {
                if let Some(evicted) = self.entries.pop_front() {
                    tracing::debug!(query = %evicted.query, "history full, evicting oldest entry");
                }
            }
        }
        let entry = Arc::new(entry);
        self.entries.push_back(Arc::clone(&entry));
        entry
    }

    /// Entry at `index` (0 = oldest).
    pub fn select(&self, index: usize) -> Result<Arc<HistoryEntry>, HistoryError> {
        self.entries
            .get(index)
            .cloned()
            .ok_or(HistoryError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().map(|e| e.as_ref())
    }

    /// Display labels in insertion order.
    pub fn labels(&self) -> Vec<&str> {
        self.iter().map(|e| e.query.as_str()).collect()
    }
}
