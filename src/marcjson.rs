//! MARC-in-JSON serialization and deserialization of MARC records.
//!
//! # Format
//!
//! One JSON object per record:
//!
//! - `"leader"`: the 24-character leader
//! - `"fields"`: array of single-key objects, in record order
//!   - control fields (001-009): `{"001": "value"}`
//!   - data fields (010+): `{"245": {"ind1": "1", "ind2": "0", "subfields": [{"a": "..."}]}}`
//!
//! [`MarcJsonReader`] reads a stream with one such object per line. Blank
//! lines are ignored; a line that does not hold a valid record fails that
//! record only.

use crate::error::{MarcError, Result};
use crate::formats::{CodecOptions, FormatReader};
use crate::leader::Leader;
use crate::record::{Field, Record};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::BufRead;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Serialize, Deserialize)]
struct JsonRecord {
    leader: String,
    #[serde(default)]
    fields: Vec<IndexMap<String, JsonField>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum JsonField {
    Control(String),
    Data {
        #[serde(default = "blank")]
        ind1: String,
        #[serde(default = "blank")]
        ind2: String,
        #[serde(default)]
        subfields: Vec<IndexMap<String, String>>,
    },
}

fn blank() -> String {
    " ".to_string()
}

/// Convert a MARC record to a MARC-in-JSON value.
///
/// # Examples
///
/// ```
/// use marc_combiner::{marcjson, Field, Leader, Record};
///
/// let mut record = Record::new(Leader::default());
/// record.add_control_field_str("001", "b1");
/// let json = marcjson::record_to_marcjson(&record)?;
/// assert_eq!(json["fields"][0]["001"], "b1");
/// # Ok::<(), marc_combiner::MarcError>(())
/// ```
///
/// # Errors
///
/// Returns an error if the leader cannot be serialized.
pub fn record_to_marcjson(record: &Record) -> Result<Value> {
    let leader_bytes = record.leader.as_bytes()?;
    let mut fields = Vec::with_capacity(record.control_fields.len() + record.field_count());

    for (tag, value) in record.control_fields_iter() {
        fields.push(IndexMap::from([(
            tag.to_string(),
            JsonField::Control(value.to_string()),
        )]));
    }
    for field in record.fields() {
        let subfields = field
            .subfields()
            .map(|sf| IndexMap::from([(sf.code.to_string(), sf.value.clone())]))
            .collect();
        fields.push(IndexMap::from([(
            field.tag.clone(),
            JsonField::Data {
                ind1: field.indicator1.to_string(),
                ind2: field.indicator2.to_string(),
                subfields,
            },
        )]));
    }

    let json = JsonRecord {
        leader: String::from_utf8_lossy(&leader_bytes).into_owned(),
        fields,
    };
    Ok(serde_json::to_value(json)?)
}

/// Convert a MARC-in-JSON value to a MARC record
///
/// # Errors
///
/// Returns an error if the JSON is not a MARC-in-JSON record.
pub fn marcjson_to_record(json: &Value) -> Result<Record> {
    let parsed = JsonRecord::deserialize(json)?;
    json_to_record(parsed, false)
}

fn json_to_record(json: JsonRecord, normalize: bool) -> Result<Record> {
    let text = |s: String| -> String {
        if normalize {
            s.nfc().collect()
        } else {
            s
        }
    };

    let mut leader = Leader::from_bytes(json.leader.as_bytes())?;
    if normalize {
        leader.character_coding = 'a';
    }
    let mut record = Record::new(leader);

    for entry in json.fields {
        for (tag, value) in entry {
            if tag.len() != 3 {
                return Err(MarcError::InvalidField(format!("Invalid tag '{tag}'")));
            }
            match value {
                JsonField::Control(value) => record.add_control_field(tag, text(value)),
                JsonField::Data {
                    ind1,
                    ind2,
                    subfields,
                } => {
                    let mut field = Field::new(
                        tag,
                        ind1.chars().next().unwrap_or(' '),
                        ind2.chars().next().unwrap_or(' '),
                    );
                    for subfield in subfields {
                        for (code, value) in subfield {
                            let code = code.chars().next().ok_or_else(|| {
                                MarcError::InvalidField("Missing subfield code".to_string())
                            })?;
                            field.add_subfield(code, text(value));
                        }
                    }
                    record.add_field(field);
                },
            }
        }
    }

    Ok(record)
}

/// Reader for line-delimited MARC-in-JSON.
#[derive(Debug)]
pub struct MarcJsonReader<R: BufRead> {
    source: R,
    line: Vec<u8>,
    line_number: usize,
    convert_to_utf8: bool,
    records_read: usize,
}

impl<R: BufRead> MarcJsonReader<R> {
    /// Create a reader over JSON lines.
    pub fn new(source: R) -> Self {
        MarcJsonReader {
            source,
            line: Vec::new(),
            line_number: 0,
            convert_to_utf8: false,
            records_read: 0,
        }
    }

    /// Create a reader configured from codec options.
    ///
    /// Only UTF-8 conversion applies; JSON text is always Unicode.
    pub fn with_options(source: R, options: &CodecOptions) -> Self {
        MarcJsonReader::new(source).with_utf8_conversion(options.convert_to_utf8)
    }

    /// NFC-normalize text and mark records as UTF-8 (leader/09 = 'a').
    #[must_use]
    pub fn with_utf8_conversion(mut self, convert: bool) -> Self {
        self.convert_to_utf8 = convert;
        self
    }

    /// Read the record on the next non-blank line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a valid record (the next call
    /// moves on to the following line) or if reading fails.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        loop {
            self.line.clear();
            if self.source.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let text = std::str::from_utf8(&self.line).map_err(|e| {
                MarcError::EncodingError(format!("Line {}: {e}", self.line_number))
            })?;
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            let parsed: JsonRecord = serde_json::from_str(text).map_err(|e| {
                MarcError::ParseError(format!("Line {}: {e}", self.line_number))
            })?;
            let record = json_to_record(parsed, self.convert_to_utf8)?;
            self.records_read += 1;
            return Ok(Some(record));
        }
    }
}

impl<R: BufRead + std::fmt::Debug> FormatReader for MarcJsonReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        MarcJsonReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }
}
