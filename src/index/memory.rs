//! In-process index.

use super::{IndexDocument, Operation, SearchIndex};
use crate::error::Result;
use indexmap::IndexMap;

/// Index held in memory.
///
/// Keeps committed documents in insertion order, keyed by id; changes queue
/// up until [`commit`](SearchIndex::commit).
#[derive(Debug, Default)]
pub struct MemoryIndex {
    committed: IndexMap<String, IndexDocument>,
    pending: Vec<Operation>,
    commits: usize,
}

impl MemoryIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        MemoryIndex::default()
    }

    /// Number of committed documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    /// Whether no documents are committed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Committed document by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&IndexDocument> {
        self.committed.get(id)
    }

    /// Committed documents in insertion order
    pub fn documents(&self) -> impl Iterator<Item = &IndexDocument> {
        self.committed.values()
    }

    /// Number of queued changes
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of commits applied
    #[must_use]
    pub fn commits(&self) -> usize {
        self.commits
    }
}

impl SearchIndex for MemoryIndex {
    fn add_document(&mut self, document: IndexDocument) -> Result<()> {
        self.pending.push(Operation::Add { document });
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        for op in self.pending.drain(..) {
            match op {
                Operation::Add { document } => {
                    self.committed.insert(document.id.clone(), document);
                },
                Operation::Delete { id } => {
                    self.committed.shift_remove(&id);
                },
                Operation::DeleteAll => self.committed.clear(),
            }
        }
        self.commits += 1;
        Ok(())
    }

    fn delete_by_id(&mut self, id: &str) -> Result<()> {
        self.pending.push(Operation::Delete { id: id.to_string() });
        Ok(())
    }

    fn delete_all(&mut self) -> Result<()> {
        self.pending.push(Operation::DeleteAll);
        Ok(())
    }

    fn search(&self, field: &str, value: &str) -> Result<Vec<IndexDocument>> {
        Ok(self
            .committed
            .values()
            .filter(|doc| doc.matches(field, value))
            .cloned()
            .collect())
    }
}
