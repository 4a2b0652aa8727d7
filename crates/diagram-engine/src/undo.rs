//! Undo/redo history using compressed snapshots
//!
//! Each mutation records a zstd-compressed JSON snapshot of the document as
//! it was before the change. History is kept as two sequences:
//!
//! - `past`: snapshots to return to on undo, oldest first
//! - `future`: snapshots undone and available for redo, most recent last
//!
//! Recording a new snapshot discards `future` entirely.

use std::collections::VecDeque;

use crate::constants::history;
use crate::error::{DiagramError, Result};
use crate::types::GraphDocument;

/// An immutable, compressed copy of a document
#[derive(Clone)]
pub struct Snapshot {
    bytes: Vec<u8>,
}

impl Snapshot {
    pub fn capture(document: &GraphDocument, level: i32) -> Result<Self> {
        let json = serde_json::to_vec(document)?;
        let bytes = zstd::encode_all(&json[..], level)
            .map_err(|e| DiagramError::Compression(e.to_string()))?;
        Ok(Self { bytes })
    }

    pub fn restore(&self) -> Result<GraphDocument> {
        let json = zstd::decode_all(&self.bytes[..])
            .map_err(|e| DiagramError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }

    pub fn compressed_size(&self) -> usize {
        self.bytes.len()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("compressed_size", &self.bytes.len())
            .finish()
    }
}

/// Past/future snapshot sequences for one document
#[derive(Debug)]
pub struct History {
    past: VecDeque<Snapshot>,
    future: VecDeque<Snapshot>,
    /// Maximum number of snapshots kept in `past`
    limit: usize,
    compression_level: i32,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: VecDeque::new(),
            limit: limit.max(1),
            compression_level: history::COMPRESSION_LEVEL,
        }
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Record the pre-mutation state of `document`
    ///
    /// Clears the redo sequence and drops the oldest snapshots beyond the limit.
    pub fn record(&mut self, document: &GraphDocument) -> Result<()> {
        let snapshot = Snapshot::capture(document, self.compression_level)?;
        self.push_snapshot(snapshot);
        Ok(())
    }

    /// Record a snapshot captured earlier
    pub fn push_snapshot(&mut self, snapshot: Snapshot) {
        self.future.clear();
        self.past.push_back(snapshot);
        while self.past.len() > self.limit {
            self.past.pop_front();
        }
    }

    /// Undo: restore the most recent past snapshot
    ///
    /// `current` moves onto the redo sequence. Returns None if there is
    /// nothing to undo; on error both sequences are left untouched.
    pub fn undo(&mut self, current: &GraphDocument) -> Option<Result<GraphDocument>> {
        Self::shift(
            &mut self.past,
            &mut self.future,
            current,
            self.compression_level,
        )
    }

    /// Redo: restore the most recently undone snapshot
    pub fn redo(&mut self, current: &GraphDocument) -> Option<Result<GraphDocument>> {
        Self::shift(
            &mut self.future,
            &mut self.past,
            current,
            self.compression_level,
        )
    }

    fn shift(
        from: &mut VecDeque<Snapshot>,
        to: &mut VecDeque<Snapshot>,
        current: &GraphDocument,
        level: i32,
    ) -> Option<Result<GraphDocument>> {
        let restored = match from.back()?.restore() {
            Ok(document) => document,
            Err(e) => return Some(Err(e)),
        };
        let current = match Snapshot::capture(current, level) {
            Ok(snapshot) => snapshot,
            Err(e) => return Some(Err(e)),
        };
        from.pop_back();
        to.push_back(current);
        Some(Ok(restored))
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of undo steps available
    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    /// Number of redo steps available
    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    /// Get the total compressed size of all snapshots
    pub fn compressed_size(&self) -> usize {
        self.past
            .iter()
            .chain(self.future.iter())
            .map(Snapshot::compressed_size)
            .sum()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(history::LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiagramKind;

    fn doc_titled(title: &str) -> GraphDocument {
        GraphDocument::new(DiagramKind::Flowchart, title)
    }

    #[test]
    fn test_record_and_undo() {
        let mut history = History::new(10);
        let before = doc_titled("before");
        let after = doc_titled("after");

        history.record(&before).unwrap();
        assert!(history.can_undo());
        assert!(!history.can_redo());

        let restored = history.undo(&after).unwrap().unwrap();
        assert_eq!(restored.title, "before");
        assert!(!history.can_undo());
        assert!(history.can_redo());
    }

    #[test]
    fn test_redo_returns_undone_state() {
        let mut history = History::new(10);
        history.record(&doc_titled("v1")).unwrap();

        let v1 = history.undo(&doc_titled("v2")).unwrap().unwrap();
        let v2 = history.redo(&v1).unwrap().unwrap();
        assert_eq!(v2.title, "v2");
        assert_eq!(history.past_len(), 1);
        assert_eq!(history.future_len(), 0);
    }

    #[test]
    fn test_record_after_undo_discards_future() {
        let mut history = History::new(10);
        history.record(&doc_titled("v1")).unwrap();
        history.record(&doc_titled("v2")).unwrap();

        let _ = history.undo(&doc_titled("v3")).unwrap().unwrap();
        assert!(history.can_redo());

        history.record(&doc_titled("v2b")).unwrap();
        assert!(!history.can_redo());
        assert!(history.redo(&doc_titled("v3b")).is_none());
    }

    #[test]
    fn test_empty_history_is_noop() {
        let mut history = History::default();
        assert!(history.undo(&doc_titled("x")).is_none());
        assert!(history.redo(&doc_titled("x")).is_none());
        assert_eq!(history.limit(), history::LIMIT);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.record(&doc_titled(&format!("v{}", i))).unwrap();
        }
        assert_eq!(history.past_len(), 3);

        let mut current = doc_titled("v5");
        let mut titles = Vec::new();
        while let Some(restored) = history.undo(&current) {
            current = restored.unwrap();
            titles.push(current.title.clone());
        }
        assert_eq!(titles, vec!["v4", "v3", "v2"]);
    }

    #[test]
    fn test_snapshots_are_compressed() {
        let mut history = History::new(10);
        let mut doc = doc_titled("big");
        doc.description = Some("repeated ".repeat(500));
        history.record(&doc).unwrap();

        let raw = serde_json::to_vec(&doc).unwrap().len();
        assert!(history.compressed_size() < raw);
    }
}
