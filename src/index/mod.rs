//! Downstream index adapters.
//!
//! Combined records are turned into [`IndexDocument`]s by a
//! [`DocumentBuilder`] and pushed to a [`SearchIndex`]. One adapter exists
//! per target and the target is picked once through [`IndexTarget`]:
//!
//! | Target | Adapter | Searchable |
//! |--------|---------|------------|
//! | in-process | [`MemoryIndex`] | yes, after commit |
//! | JSON lines file | [`JsonLinesIndex`] | no |
//!
//! The [`Importer`] drives a [`CombiningReader`](crate::CombiningReader)
//! into an index, committing in batches.

mod document;
mod importer;
mod jsonl;
mod memory;

pub use document::{DocumentBuilder, FieldValueDocumentBuilder};
pub use importer::{import_path, ImportSummary, Importer};
pub use jsonl::JsonLinesIndex;
pub use memory::MemoryIndex;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;

/// A document ready for indexing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Unique key
    pub id: String,
    /// Field name to values
    pub fields: BTreeMap<String, Vec<String>>,
}

impl IndexDocument {
    /// Empty document with the given key
    pub fn new(id: impl Into<String>) -> Self {
        IndexDocument {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Append a value to a field.
    pub fn add_value(&mut self, field: &str, value: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(value.into());
    }

    /// Values of a field
    #[must_use]
    pub fn values(&self, field: &str) -> &[String] {
        self.fields.get(field).map_or(&[], Vec::as_slice)
    }

    /// Whether `field` holds exactly `value`. The field `id` matches the key.
    #[must_use]
    pub fn matches(&self, field: &str, value: &str) -> bool {
        if field == "id" {
            return self.id == value;
        }
        self.values(field).iter().any(|v| v == value)
    }
}

/// Capabilities every index adapter offers.
///
/// Changes become visible to [`search`](SearchIndex::search) only after
/// [`commit`](SearchIndex::commit).
pub trait SearchIndex: Debug {
    /// Queue a document; replaces any document with the same id on commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter cannot accept the document.
    fn add_document(&mut self, document: IndexDocument) -> Result<()>;

    /// Apply queued changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the changes cannot be persisted.
    fn commit(&mut self) -> Result<()>;

    /// Queue removal of one document.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter cannot accept the deletion.
    fn delete_by_id(&mut self, id: &str) -> Result<()>;

    /// Queue removal of every document.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter cannot accept the deletion.
    fn delete_all(&mut self) -> Result<()>;

    /// Committed documents whose `field` holds exactly `value`.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::Index`](crate::MarcError::Index) if the adapter
    /// does not support searching.
    fn search(&self, field: &str, value: &str) -> Result<Vec<IndexDocument>>;
}

impl<I: SearchIndex + ?Sized> SearchIndex for Box<I> {
    fn add_document(&mut self, document: IndexDocument) -> Result<()> {
        (**self).add_document(document)
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn delete_by_id(&mut self, id: &str) -> Result<()> {
        (**self).delete_by_id(id)
    }

    fn delete_all(&mut self) -> Result<()> {
        (**self).delete_all()
    }

    fn search(&self, field: &str, value: &str) -> Result<Vec<IndexDocument>> {
        (**self).search(field, value)
    }
}

/// Queued index change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Operation {
    Add { document: IndexDocument },
    Delete { id: String },
    DeleteAll,
}

/// Index adapter selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexTarget {
    /// In-process [`MemoryIndex`]
    #[default]
    Memory,
    /// [`JsonLinesIndex`] writing to a file
    JsonLines {
        /// Output file, created or truncated
        path: PathBuf,
    },
}

impl IndexTarget {
    /// Open the selected adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the output file cannot be created.
    pub fn open(&self) -> Result<Box<dyn SearchIndex>> {
        let index: Box<dyn SearchIndex> = match self {
            IndexTarget::Memory => Box::new(MemoryIndex::new()),
            IndexTarget::JsonLines { path } => Box::new(JsonLinesIndex::create(path)?),
        };
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_values() {
        let mut doc = IndexDocument::new("b1");
        doc.add_value("852", "Main stacks");
        doc.add_value("852", "Annex");
        assert_eq!(doc.values("852"), ["Main stacks", "Annex"]);
        assert!(doc.values("999").is_empty());
        assert!(doc.matches("852", "Annex"));
        assert!(doc.matches("id", "b1"));
        assert!(!doc.matches("852", "Ann"));
    }

    #[test]
    fn test_operation_json_shape() {
        let op = Operation::Delete { id: "b1".into() };
        assert_eq!(
            serde_json::to_string(&op).unwrap(),
            r#"{"op":"delete","id":"b1"}"#
        );
        assert_eq!(
            serde_json::to_string(&Operation::DeleteAll).unwrap(),
            r#"{"op":"delete_all"}"#
        );
    }

    #[test]
    fn test_target_serde() {
        let target: IndexTarget = serde_json::from_str(r#"{"type":"memory"}"#).unwrap();
        assert_eq!(target, IndexTarget::Memory);
        let target: IndexTarget =
            serde_json::from_str(r#"{"type":"json_lines","path":"out.jsonl"}"#).unwrap();
        assert_eq!(
            target,
            IndexTarget::JsonLines {
                path: PathBuf::from("out.jsonl")
            }
        );
    }

    #[test]
    fn test_open_memory_target() {
        let mut index = IndexTarget::Memory.open().unwrap();
        index.add_document(IndexDocument::new("b1")).unwrap();
        index.commit().unwrap();
        assert_eq!(index.search("id", "b1").unwrap().len(), 1);
    }
}
