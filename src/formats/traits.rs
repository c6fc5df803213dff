//! Format reader and writer traits for MARC records.
//!
//! These traits give every codec the same streaming interface, so the
//! combining reader and the importer can be written once over any input
//! serialization.
//!
//! # Example
//!
//! ```
//! use marc_combiner::formats::{FormatReader, FormatWriter};
//!
//! fn copy_records<R: FormatReader, W: FormatWriter>(
//!     reader: &mut R,
//!     writer: &mut W,
//! ) -> marc_combiner::Result<usize> {
//!     let mut count = 0;
//!     while let Some(record) = reader.read_record()? {
//!         writer.write_record(&record)?;
//!         count += 1;
//!     }
//!     writer.finish()?;
//!     Ok(count)
//! }
//! ```

use crate::error::Result;
use crate::record::Record;

/// Trait for readers that can produce MARC records from a source.
///
/// This trait abstracts over different serialization formats, allowing
/// uniform access to MARC records regardless of the underlying format.
///
/// # Streaming vs Batch
///
/// The trait supports both streaming and batch reading patterns:
/// - Use [`read_record`](Self::read_record) for streaming one record at a time
/// - Use [`read_all`](Self::read_all) to read all records into memory
///
/// # Implementation Notes
///
/// Implementations should:
/// - Return `Ok(None)` when the source is exhausted (not an error)
/// - Preserve field ordering and all record metadata exactly
/// - Leave the source positioned at the next record after returning an
///   `Err` for a record that failed to decode; only errors for which
///   [`MarcError::is_fatal`](crate::MarcError::is_fatal) holds may leave
///   the source unusable
pub trait FormatReader: std::fmt::Debug {
    /// Read the next record from the source.
    ///
    /// Returns:
    /// - `Ok(Some(record))` if a record was read successfully
    /// - `Ok(None)` if the end of the source was reached
    /// - `Err(_)` if reading failed due to malformed data or I/O errors
    ///
    /// # Errors
    ///
    /// Returns an error if the current record is malformed or I/O fails.
    fn read_record(&mut self) -> Result<Option<Record>>;

    /// Read all remaining records into a vector.
    ///
    /// This is a convenience method that repeatedly calls [`read_record`](Self::read_record)
    /// until the source is exhausted. For large files, prefer streaming with
    /// `read_record` to avoid memory pressure.
    ///
    /// # Errors
    ///
    /// Returns an error if any record fails to read. On error, previously
    /// read records are discarded.
    fn read_all(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Returns the number of records read so far.
    ///
    /// This is useful for progress reporting and debugging.
    /// The default implementation returns `None` if tracking is not supported.
    fn records_read(&self) -> Option<usize> {
        None
    }
}

/// Trait for writers that can serialize MARC records to a format.
///
/// This trait provides a uniform interface for writing MARC records to
/// different serialization formats. All format-specific writers implement
/// this trait.
///
/// # Usage Pattern
///
/// Writers follow a standard pattern:
/// 1. Create the writer with format-specific configuration
/// 2. Write records using [`write_record`](Self::write_record) or [`write_batch`](Self::write_batch)
/// 3. Call [`finish`](Self::finish) to flush and finalize output
///
/// # Important: Always Call `finish`
///
/// The [`finish`](Self::finish) method MUST be called to ensure all data is written.
/// Some formats buffer data for efficiency and only write on finish.
/// Dropping a writer without calling `finish` may result in data loss.
///
pub trait FormatWriter: std::fmt::Debug {
    /// Write a single record to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized (e.g., invalid
    /// structure) or if writing to the underlying output fails.
    fn write_record(&mut self, record: &Record) -> Result<()>;

    /// Write multiple records to the output.
    ///
    /// This method may be more efficient than calling `write_record` repeatedly
    /// for formats that benefit from batch operations.
    ///
    /// The default implementation calls `write_record` for each record.
    ///
    /// # Errors
    ///
    /// Returns an error if any record cannot be written.
    fn write_batch(&mut self, records: &[Record]) -> Result<()> {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Finish writing and flush any buffered data.
    ///
    /// This method MUST be called to ensure all data is written to the output.
    /// After calling `finish`, the writer should not be used for further writes.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails or if the underlying output
    /// cannot be finalized (e.g., network error, disk full).
    fn finish(&mut self) -> Result<()>;

    /// Returns the number of records written so far.
    ///
    /// This is useful for progress reporting and debugging.
    /// The default implementation returns `None` if tracking is not supported.
    fn records_written(&self) -> Option<usize> {
        None
    }
}

/// Extension trait providing iterator-style access for format readers.
///
/// This trait is automatically implemented for all types implementing [`FormatReader`].
pub trait FormatReaderExt: FormatReader {
    /// Create an iterator over records from this reader.
    ///
    /// The iterator yields `Result<Record>` for each record, allowing
    /// error handling during iteration.
    ///
    fn records(&mut self) -> RecordIterator<'_, Self>
    where
        Self: Sized,
    {
        RecordIterator { reader: self }
    }
}

impl<T: FormatReader> FormatReaderExt for T {}

impl<R: FormatReader + ?Sized> FormatReader for Box<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        (**self).read_record()
    }

    fn records_read(&self) -> Option<usize> {
        (**self).records_read()
    }
}

/// Iterator adapter for [`FormatReader`].
///
/// Created by the [`records`](FormatReaderExt::records) method.
#[derive(Debug)]
pub struct RecordIterator<'a, R: FormatReader> {
    reader: &'a mut R,
}

impl<R: FormatReader> Iterator for RecordIterator<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
