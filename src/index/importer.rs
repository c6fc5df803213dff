//! Batch import from a combining reader into an index.

use super::{DocumentBuilder, FieldValueDocumentBuilder, SearchIndex};
use crate::combining_reader::{CombiningReader, ReaderStats};
use crate::config::ImportConfig;
use crate::diagnostics::DiagnosticSink;
use crate::error::Result;
use crate::formats::FormatReader;
use std::path::Path;

/// Outcome of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Documents added to the index
    pub documents: usize,
    /// Combined records the document builder rejected
    pub rejected: usize,
    /// Commits issued
    pub commits: usize,
    /// Reader counters at the end of the run
    pub reader: ReaderStats,
}

/// Pushes combined records into a [`SearchIndex`].
#[derive(Debug)]
pub struct Importer<I: SearchIndex, B: DocumentBuilder = FieldValueDocumentBuilder> {
    index: I,
    builder: B,
    commit_every: usize,
}

impl<I: SearchIndex> Importer<I, FieldValueDocumentBuilder> {
    /// Importer indexing every field, with ids from `001`.
    pub fn new(index: I) -> Self {
        Importer {
            index,
            builder: FieldValueDocumentBuilder::default(),
            commit_every: 0,
        }
    }
}

impl<I: SearchIndex, B: DocumentBuilder> Importer<I, B> {
    /// Use another document builder.
    pub fn with_builder<T: DocumentBuilder>(self, builder: T) -> Importer<I, T> {
        Importer {
            index: self.index,
            builder,
            commit_every: self.commit_every,
        }
    }

    /// Commit after every `count` documents; 0 commits only at the end.
    #[must_use]
    pub fn with_commit_every(mut self, count: usize) -> Self {
        self.commit_every = count;
        self
    }

    /// The target index
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Consume the importer, returning the index.
    pub fn into_index(self) -> I {
        self.index
    }

    /// Read every combined record and index it.
    ///
    /// Records the builder rejects are counted and skipped. When the reader
    /// fails, documents added so far are committed before the error is
    /// returned. A failing commit at that point is logged, and the reader's
    /// error is still the one returned.
    ///
    /// # Errors
    ///
    /// Returns the reader's fatal error or any index error.
    pub fn run<C, S>(&mut self, reader: &mut CombiningReader<C, S>) -> Result<ImportSummary>
    where
        C: FormatReader,
        S: DiagnosticSink,
    {
        let mut summary = ImportSummary::default();
        let mut uncommitted = 0;

        loop {
            let record = match reader.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(error) => {
                    if let Err(commit_error) = self.index.commit() {
                        log::error!("Final commit failed: {commit_error}");
                    }
                    log::error!(
                        "Import stopped after {} documents: {error}",
                        summary.documents
                    );
                    return Err(error);
                },
            };

            match self.builder.build(&record) {
                Ok(document) => {
                    self.index.add_document(document)?;
                    summary.documents += 1;
                    uncommitted += 1;
                },
                Err(error) => {
                    summary.rejected += 1;
                    log::warn!("Not indexing record: {error}");
                    continue;
                },
            }

            if self.commit_every > 0 && uncommitted >= self.commit_every {
                self.index.commit()?;
                summary.commits += 1;
                uncommitted = 0;
                log::info!("Committed {} documents", summary.documents);
            }
        }

        self.index.commit()?;
        summary.commits += 1;
        summary.reader = reader.stats();
        log::info!(
            "Imported {} documents from {} raw records ({} skipped, {} rejected)",
            summary.documents,
            summary.reader.raw_records,
            summary.reader.skipped,
            summary.rejected
        );
        Ok(summary)
    }
}

/// Import a file as described by `config`.
///
/// Opens the configured index, combines the file's records and indexes them.
/// Returns the summary and the index so it can be searched or inspected.
///
/// # Errors
///
/// Returns an error if the file or index cannot be opened, or if the run fails.
pub fn import_path(
    config: &ImportConfig,
    path: impl AsRef<Path>,
) -> Result<(ImportSummary, Box<dyn SearchIndex>)> {
    let path = path.as_ref();
    let index = config.index.open()?;
    let mut reader =
        CombiningReader::open_path(config.format, path, config.combining.clone())?;
    let builder = FieldValueDocumentBuilder::new(config.combining.current_id_field.clone());
    let mut importer = Importer::new(index)
        .with_builder(builder)
        .with_commit_every(config.commit_every);

    log::info!("Importing {} ({})", path.display(), config.format);
    let summary = importer.run(&mut reader)?;
    Ok((summary, importer.into_index()))
}
