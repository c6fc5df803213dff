//! Writing MARC records to binary format.
//!
//! This module provides [`MarcWriter`] for serializing [`Record`] instances
//! to ISO 2709 binary format that can be written to any destination implementing
//! [`std::io::Write`]. Combined logical records are written this way, and the
//! test fixtures are built with it.
//!
//! Text is always written as UTF-8, so the writer sets leader/09 to `a`
//! regardless of what the in-memory leader says.
//!
//! # Examples
//!
//! ```
//! use marc_combiner::{Field, Leader, MarcWriter, Record};
//!
//! let mut record = Record::new(Leader::default());
//! record.add_control_field_str("001", "b1");
//! record.add_field(Field::builder("245".to_string(), '1', '0').subfield_str('a', "Title").build());
//!
//! let mut buffer = Vec::new();
//! let mut writer = MarcWriter::new(&mut buffer);
//! writer.write_record(&record)?;
//! writer.finish()?;
//! assert_eq!(buffer.last(), Some(&0x1D));
//! # Ok::<(), marc_combiner::MarcError>(())
//! ```

use crate::error::{MarcError, Result};
use crate::formats::FormatWriter;
use crate::reader::{FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_DELIMITER};
use crate::record::Record;
use std::io::Write;

const MAX_RECORD_LENGTH: usize = 99_999;
const MAX_FIELD_LENGTH: usize = 9_999;

/// Writer for ISO 2709 binary MARC format.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    records_written: usize,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a new MARC writer.
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            records_written: 0,
            finished: false,
        }
    }

    /// Write a single MARC record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The writer has been finished
    /// - The record does not fit ISO 2709 limits or has non-ASCII structure bytes
    /// - An I/O error occurs during writing
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::InvalidRecord(
                "Cannot write to a finished writer".to_string(),
            ));
        }

        let bytes = encode_record(record)?;
        self.writer.write_all(&bytes)?;
        self.records_written += 1;
        Ok(())
    }

    /// Flush the writer and mark it as finished.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Recover the underlying destination
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + std::fmt::Debug> FormatWriter for MarcWriter<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        MarcWriter::write_record(self, record)
    }

    fn finish(&mut self) -> Result<()> {
        MarcWriter::finish(self)
    }

    fn records_written(&self) -> Option<usize> {
        Some(self.records_written)
    }
}

/// Serialize one record to ISO 2709 bytes.
///
/// Control fields come first, then data field groups in storage order.
///
/// # Errors
///
/// Returns an error if a field or the whole record exceeds the ISO 2709
/// length limits, or if an indicator or subfield code is not ASCII.
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let mut directory = Vec::new();
    let mut data_area = Vec::new();

    for (tag, value) in &record.control_fields {
        let start = data_area.len();
        data_area.extend_from_slice(value.as_bytes());
        data_area.push(FIELD_TERMINATOR);
        push_entry(&mut directory, tag, data_area.len() - start, start)?;
    }

    for field in record.fields() {
        let start = data_area.len();
        data_area.push(ascii(field.indicator1, &field.tag, "indicator")?);
        data_area.push(ascii(field.indicator2, &field.tag, "indicator")?);
        for subfield in &field.subfields {
            data_area.push(SUBFIELD_DELIMITER);
            data_area.push(ascii(subfield.code, &field.tag, "subfield code")?);
            data_area.extend_from_slice(subfield.value.as_bytes());
        }
        data_area.push(FIELD_TERMINATOR);
        push_entry(&mut directory, &field.tag, data_area.len() - start, start)?;
    }
    directory.push(FIELD_TERMINATOR);

    let base_address = 24 + directory.len();
    let record_length = base_address + data_area.len() + 1;
    if record_length > MAX_RECORD_LENGTH {
        return Err(MarcError::InvalidRecord(format!(
            "Record length {record_length} exceeds the ISO 2709 limit of {MAX_RECORD_LENGTH}"
        )));
    }

    let mut leader = record.leader.clone();
    leader.character_coding = 'a';
    leader.record_length = u32::try_from(record_length)
        .map_err(|_| MarcError::InvalidRecord("Record length out of range".to_string()))?;
    leader.data_base_address = u32::try_from(base_address)
        .map_err(|_| MarcError::InvalidRecord("Base address out of range".to_string()))?;

    let mut bytes = Vec::with_capacity(record_length);
    bytes.extend_from_slice(&leader.as_bytes()?);
    bytes.extend_from_slice(&directory);
    bytes.extend_from_slice(&data_area);
    bytes.push(RECORD_TERMINATOR);
    Ok(bytes)
}

fn push_entry(directory: &mut Vec<u8>, tag: &str, length: usize, start: usize) -> Result<()> {
    if tag.len() != 3 || !tag.is_ascii() {
        return Err(MarcError::InvalidField(format!("Invalid tag '{tag}'")));
    }
    if length > MAX_FIELD_LENGTH {
        return Err(MarcError::InvalidField(format!(
            "Field {tag} is {length} bytes; the ISO 2709 limit is {MAX_FIELD_LENGTH}"
        )));
    }
    directory.extend_from_slice(tag.as_bytes());
    directory.extend_from_slice(format!("{length:04}{start:05}").as_bytes());
    Ok(())
}

fn ascii(c: char, tag: &str, what: &str) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| MarcError::InvalidField(format!("Field {tag}: non-ASCII {what} {c:?}")))
}
