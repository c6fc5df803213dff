//! Export adapter writing index operations as JSON lines.

use super::{IndexDocument, Operation, SearchIndex};
use crate::error::{MarcError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one JSON object per operation on each commit.
///
/// ```text
/// {"op":"add","document":{"id":"b1","fields":{"245":["Title"]}}}
/// {"op":"delete","id":"b7"}
/// {"op":"delete_all"}
/// ```
///
/// The output is meant for a bulk loader; searching is not supported.
#[derive(Debug)]
pub struct JsonLinesIndex<W: Write> {
    writer: W,
    pending: Vec<Operation>,
    lines_written: usize,
}

impl JsonLinesIndex<BufWriter<File>> {
    /// Create (or truncate) `path` and write to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(JsonLinesIndex::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> JsonLinesIndex<W> {
    /// Write operations to `writer`.
    pub fn new(writer: W) -> Self {
        JsonLinesIndex {
            writer,
            pending: Vec::new(),
            lines_written: 0,
        }
    }

    /// Lines written by previous commits
    #[must_use]
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    /// Recover the destination. Uncommitted operations are dropped.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + std::fmt::Debug> SearchIndex for JsonLinesIndex<W> {
    fn add_document(&mut self, document: IndexDocument) -> Result<()> {
        self.pending.push(Operation::Add { document });
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        for op in self.pending.drain(..) {
            serde_json::to_writer(&mut self.writer, &op)?;
            self.writer.write_all(b"\n")?;
            self.lines_written += 1;
        }
        self.writer.flush()?;
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

    fn search(&self, _field: &str, _value: &str) -> Result<Vec<IndexDocument>> {
        Err(MarcError::Index(
            "JSON lines export does not support search".to_string(),
        ))
    }
}
