//! Grouping and display-record state owned by the executor thread.
//!
//! Nothing outside the executor mutates this state directly; all changes
//! arrive as submitted tasks. Groupings are created lazily by key and live
//! for the process lifetime (no eviction).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;

use crate::types::{FrameId, GroupingKey};

/// One ingested frame as known to the display layer.
#[derive(Clone, Debug)]
pub struct DisplayRecord {
    /// Canonical frame identifier (dedup key within a grouping).
    pub frame_id: FrameId,
    /// Path the frame arrived from.
    pub source_path: PathBuf,
    /// Arrival timestamp carried over from the queue.
    pub received_at: DateTime<Utc>,
}

/// A logical display bucket holding records in insertion order.
#[derive(Default)]
pub struct Grouping {
    records: IndexMap<FrameId, DisplayRecord>,
}

impl Grouping {
    /// Whether `frame_id` is already present.
    pub fn contains(&self, frame_id: &str) -> bool {
        self.records.contains_key(frame_id)
    }

    /// Number of records in this grouping.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when the grouping holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &DisplayRecord> {
        self.records.values()
    }
}

/// All groupings, keyed by their derived grouping key.
#[derive(Default)]
pub struct ViewerState {
    groupings: IndexMap<GroupingKey, Grouping>,
}

impl ViewerState {
    /// Create empty display state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the grouping for `key` if absent, then add `record` unless a
    /// record with the same frame id is already present.
    ///
    /// Returns `true` when the record was inserted.
    pub fn insert_record(&mut self, key: &str, record: DisplayRecord) -> bool {
        let grouping = self.groupings.entry(key.to_string()).or_default();
        if grouping.contains(&record.frame_id) {
            debug!(grouping = key, frame = %record.frame_id, "frame already displayed, skipping");
            return false;
        }
        grouping.records.insert(record.frame_id.clone(), record);
        true
    }

    /// Look up a grouping by key.
    pub fn grouping(&self, key: &str) -> Option<&Grouping> {
        self.groupings.get(key)
    }

    /// Number of groupings created so far.
    pub fn grouping_count(&self) -> usize {
        self.groupings.len()
    }

    /// Total records across all groupings.
    pub fn record_count(&self) -> usize {
        self.groupings.values().map(Grouping::len).sum()
    }

    /// Grouping keys in creation order.
    pub fn grouping_keys(&self) -> impl Iterator<Item = &str> {
        self.groupings.keys().map(String::as_str)
    }
}
