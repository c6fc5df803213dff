//! Reading MARC records from binary streams.
//!
//! This module provides [`MarcReader`] for reading ISO 2709 formatted MARC records
//! from any source that implements [`std::io::Read`].
//!
//! Records are framed on the record terminator (0x1D) before they are parsed,
//! so a malformed record costs exactly one `Err` and the following call reads
//! the next record. A record that lost its terminator is split off the whole
//! record behind it. Only I/O failures leave the stream unusable.
//!
//! # Examples
//!
//! ```no_run
//! use marc_combiner::MarcReader;
//! use std::fs::File;
//!
//! let file = File::open("records.mrc")?;
//! let mut reader = MarcReader::new(file);
//!
//! while let Some(record) = reader.read_record()? {
//!     println!("Record type: {}", record.leader.record_type);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::encoding::{FieldDecoder, SourceEncoding};
use crate::error::{MarcError, Result};
use crate::formats::{CodecOptions, FormatReader};
use crate::leader::Leader;
use crate::record::{is_control_tag, Field, Record};
use crate::recovery::{RecoveryContext, RecoveryMode};
use std::io::{BufRead, BufReader, Read};

pub(crate) const FIELD_TERMINATOR: u8 = 0x1E;
pub(crate) const SUBFIELD_DELIMITER: u8 = 0x1F;
pub(crate) const RECORD_TERMINATOR: u8 = 0x1D;

const LEADER_LEN: usize = 24;
const DIRECTORY_ENTRY_LEN: usize = 12;

/// Reader for ISO 2709 binary MARC format.
///
/// # Examples
///
/// ```
/// use marc_combiner::{MarcReader, RecoveryMode};
/// use std::io::Cursor;
///
/// let mut reader = MarcReader::new(Cursor::new(Vec::new()))
///     .with_recovery_mode(RecoveryMode::Lenient);
/// assert!(reader.read_record().unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    reader: BufReader<R>,
    recovery_mode: RecoveryMode,
    source_encoding: SourceEncoding,
    convert_to_utf8: bool,
    records_read: usize,
    frame: Vec<u8>,
    carry: Vec<u8>,
}

impl<R: Read> MarcReader<R> {
    /// Create a new MARC reader.
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader: BufReader::new(reader),
            recovery_mode: RecoveryMode::Strict,
            source_encoding: SourceEncoding::Auto,
            convert_to_utf8: false,
            records_read: 0,
            frame: Vec::new(),
            carry: Vec::new(),
        }
    }

    /// Create a reader configured from codec options.
    pub fn with_options(reader: R, options: &CodecOptions) -> Self {
        MarcReader::new(reader)
            .with_recovery_mode(options.recovery_mode)
            .with_source_encoding(options.source_encoding)
            .with_utf8_conversion(options.convert_to_utf8)
    }

    /// Set the recovery mode for handling malformed records.
    ///
    /// - `Strict`: Return errors immediately (default)
    /// - `Lenient`: Drop malformed fields, keep the rest of the record
    /// - `Permissive`: Also accept truncated records and undecodable text
    #[must_use]
    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery_mode = mode;
        self
    }

    /// Set the source character encoding (default: follow each leader).
    #[must_use]
    pub fn with_source_encoding(mut self, encoding: SourceEncoding) -> Self {
        self.source_encoding = encoding;
        self
    }

    /// NFC-normalize text and mark records as UTF-8 (leader/09 = 'a').
    #[must_use]
    pub fn with_utf8_conversion(mut self, convert: bool) -> Self {
        self.convert_to_utf8 = convert;
        self
    }

    /// Read a single MARC record.
    ///
    /// Returns `Ok(Some(record))` if a record was successfully read, `Ok(None)` if EOF
    /// was reached, or `Err` if the current record could not be decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The binary data is malformed (the next call continues with the next record)
    /// - An I/O error occurs
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        if !self.fill_frame()? {
            return Ok(None);
        }
        if let Some(start) = embedded_record_start(&self.frame) {
            self.carry = self.frame.split_off(start);
            return Err(MarcError::TruncatedRecord(format!(
                "Record has no terminator; skipped {start} bytes before the next record"
            )));
        }

        let record = decode_record(
            &self.frame,
            self.recovery_mode,
            self.source_encoding,
            self.convert_to_utf8,
        )?;
        self.records_read += 1;
        Ok(Some(record))
    }

    /// Load the next terminator-delimited record into `self.frame`.
    ///
    /// Whitespace between records (some exports add newlines) is dropped.
    fn fill_frame(&mut self) -> Result<bool> {
        if !self.carry.is_empty() {
            std::mem::swap(&mut self.frame, &mut self.carry);
            self.carry.clear();
            return Ok(true);
        }
        loop {
            self.frame.clear();
            if self.reader.read_until(RECORD_TERMINATOR, &mut self.frame)? == 0 {
                return Ok(false);
            }
            let start = self
                .frame
                .iter()
                .position(|b| !b.is_ascii_whitespace())
                .unwrap_or(self.frame.len());
            if start < self.frame.len() {
                self.frame.drain(..start);
                return Ok(true);
            }
        }
    }
}

impl<R: Read + std::fmt::Debug> FormatReader for MarcReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        MarcReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }
}

/// Offset of a whole record that follows an unterminated one in `frame`.
///
/// Only frames whose own leader length disagrees with their size are
/// searched. The embedded record must have a valid leader, a length reaching
/// exactly to the frame's terminator and a directory ending in 0x1E.
fn embedded_record_start(frame: &[u8]) -> Option<usize> {
    if frame.last() != Some(&RECORD_TERMINATOR) || declared_length(frame) == Some(frame.len()) {
        return None;
    }
    (1..frame.len().saturating_sub(LEADER_LEN))
        .filter(|&start| declared_length(&frame[start..]) == Some(frame.len() - start))
        .find(|&start| {
            let candidate = &frame[start..];
            Leader::from_bytes(candidate)
                .and_then(|leader| leader.validate_for_reading().map(|()| leader))
                .is_ok_and(|leader| {
                    let base_address = leader.data_base_address as usize;
                    base_address > LEADER_LEN && candidate[base_address - 1] == FIELD_TERMINATOR
                })
        })
}

fn declared_length(bytes: &[u8]) -> Option<usize> {
    bytes.get(..5).and_then(|digits| parse_number(digits).ok())
}

/// Decode one framed record.
fn decode_record(
    frame: &[u8],
    mode: RecoveryMode,
    source_encoding: SourceEncoding,
    convert_to_utf8: bool,
) -> Result<Record> {
    let mut context = RecoveryContext::new(mode);

    let body = match frame.split_last() {
        Some((&RECORD_TERMINATOR, body)) => body,
        _ => {
            context.tolerate_truncation(
                MarcError::TruncatedRecord(
                    "Unexpected end of file while reading record data".to_string(),
                ),
                "record",
            )?;
            frame
        },
    };

    let mut leader = Leader::from_bytes(body)?;
    leader.validate_for_reading()?;

    let declared = leader.record_length as usize;
    if declared != frame.len() {
        let error = MarcError::InvalidRecord(format!(
            "Leader declares {declared} bytes but the record has {}",
            frame.len()
        ));
        if declared > frame.len() {
            context.tolerate_truncation(MarcError::TruncatedRecord(error.to_string()), "record")?;
        } else {
            context.tolerate(error, "record")?;
        }
    }

    let base_address = leader.data_base_address as usize;
    if base_address > body.len() {
        return Err(MarcError::TruncatedRecord(
            "Record ends before its data area".to_string(),
        ));
    }
    let directory = &body[LEADER_LEN..base_address];
    let data = &body[base_address..];

    let decoder = FieldDecoder::for_record(
        source_encoding,
        &leader,
        mode.lenient_decoding(),
        convert_to_utf8,
    );
    if convert_to_utf8 {
        leader.character_coding = 'a';
    }
    let mut record = Record::new(leader);

    for entry in directory.chunks(DIRECTORY_ENTRY_LEN) {
        if entry[0] == FIELD_TERMINATOR {
            break;
        }
        if entry.len() < DIRECTORY_ENTRY_LEN {
            context.tolerate(
                MarcError::InvalidRecord("Incomplete directory entry".to_string()),
                "directory",
            )?;
            break;
        }

        let tag = String::from_utf8_lossy(&entry[0..3]).to_string();
        match read_entry(entry, data, &tag, &decoder, &mut context) {
            Ok(Some(Entry::Control(value))) => record.add_control_field(tag, value),
            Ok(Some(Entry::Data(field))) => record.add_field(field),
            Ok(None) => {},
            Err(e) => context.tolerate(e, &tag)?,
        }
    }

    context.report(record.get_control_field("001"));
    Ok(record)
}

enum Entry {
    Control(String),
    Data(Field),
}

/// Decode the field a directory entry points at.
fn read_entry(
    entry: &[u8],
    data: &[u8],
    tag: &str,
    decoder: &FieldDecoder,
    context: &mut RecoveryContext,
) -> Result<Option<Entry>> {
    let field_length = parse_number(&entry[3..7])?;
    let start = parse_number(&entry[7..12])?;
    let mut end = start + field_length;

    if end > data.len() {
        context.tolerate_truncation(
            MarcError::InvalidRecord(format!("Field {tag} exceeds data area")),
            tag,
        )?;
        end = data.len();
    }
    if start >= end {
        return Ok(None);
    }

    let raw = &data[start..end];
    let raw = memchr::memchr(FIELD_TERMINATOR, raw).map_or(raw, |i| &raw[..i]);

    if is_control_tag(tag) {
        Ok(Some(Entry::Control(decoder.decode(raw)?)))
    } else {
        parse_data_field(raw, tag, decoder).map(|f| Some(Entry::Data(f)))
    }
}

/// Parse a data field from raw bytes (field terminator already removed)
fn parse_data_field(data: &[u8], tag: &str, decoder: &FieldDecoder) -> Result<Field> {
    if data.len() < 2 {
        return Err(MarcError::InvalidField(
            "Data field too short (needs indicators)".to_string(),
        ));
    }

    let mut field = Field::new(tag.to_string(), data[0] as char, data[1] as char);
    let mut chunks = data[2..].split(|&b| b == SUBFIELD_DELIMITER);

    if chunks.next().is_some_and(|lead| !lead.is_empty()) {
        return Err(MarcError::InvalidField(
            "Expected subfield delimiter".to_string(),
        ));
    }
    for chunk in chunks {
        let Some((&code, value)) = chunk.split_first() else {
            continue;
        };
        field.add_subfield(code as char, decoder.decode(value)?);
    }

    Ok(field)
}

/// Parse a fixed-width ASCII number from a directory entry
fn parse_number(bytes: &[u8]) -> Result<usize> {
    bytes.iter().try_fold(0usize, |acc, &byte| {
        if byte.is_ascii_digit() {
            Ok(acc * 10 + usize::from(byte - b'0'))
        } else {
            Err(MarcError::InvalidRecord(format!(
                "Invalid numeric field: expected digits, got byte {}",
                byte as char
            )))
        }
    })
}
