use std::collections::VecDeque;

use calcgraph_core::WorksheetDocument;

use crate::error::EngineError;

pub const DEFAULT_HISTORY_DEPTH: usize = 50;

/// Linear undo/redo over whole-document snapshots.
///
/// Owned by one session and reset whenever a different document is
/// installed, so stacks never outlive the document they describe.
/// Snapshots are msgpack blobs; the undo stack is depth-bounded with
/// oldest-first eviction.
pub struct HistoryManager {
    undo_stack: VecDeque<Vec<u8>>,
    redo_stack: VecDeque<Vec<u8>>,
    max_depth: usize,
}

impl HistoryManager {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
        }
    }

    pub fn reset(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    fn encode(document: &WorksheetDocument) -> Result<Vec<u8>, EngineError> {
        rmp_serde::to_vec(document).map_err(|e| EngineError::Snapshot(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<WorksheetDocument, EngineError> {
        rmp_serde::from_slice(bytes).map_err(|e| EngineError::Snapshot(e.to_string()))
    }

    /// Record the pre-mutation state. A new action invalidates the redo
    /// branch.
    pub fn push_snapshot(&mut self, document: &WorksheetDocument) -> Result<(), EngineError> {
        let blob = Self::encode(document)?;
        self.undo_stack.push_back(blob);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
        self.redo_stack.clear();
        Ok(())
    }

    /// Pop the most recent snapshot, pushing `live` onto the redo stack.
    /// Returns the restored document, or `None` with nothing to undo.
    /// On error the stacks are left as they were.
    pub fn undo(&mut self, live: &WorksheetDocument) -> Result<Option<WorksheetDocument>, EngineError> {
        let Some(blob) = self.undo_stack.pop_back() else {
            return Ok(None);
        };
        let restored = match Self::decode(&blob) {
            Ok(doc) => doc,
            Err(e) => {
                self.undo_stack.push_back(blob);
                return Err(e);
            }
        };
        match Self::encode(live) {
            Ok(current) => {
                self.redo_stack.push_back(current);
                Ok(Some(restored))
            }
            Err(e) => {
                self.undo_stack.push_back(blob);
                Err(e)
            }
        }
    }

    /// Symmetric to `undo`.
    pub fn redo(&mut self, live: &WorksheetDocument) -> Result<Option<WorksheetDocument>, EngineError> {
        let Some(blob) = self.redo_stack.pop_back() else {
            return Ok(None);
        };
        let restored = match Self::decode(&blob) {
            Ok(doc) => doc,
            Err(e) => {
                self.redo_stack.push_back(blob);
                return Err(e);
            }
        };
        match Self::encode(live) {
            Ok(current) => {
                self.undo_stack.push_back(current);
                Ok(Some(restored))
            }
            Err(e) => {
                self.redo_stack.push_back(blob);
                Err(e)
            }
        }
    }
}
