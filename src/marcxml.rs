//! MARCXML serialization and deserialization of MARC records.
//!
//! This module provides conversion between MARC records and standard MARCXML format,
//! as defined by the Library of Congress (<https://www.loc.gov/standards/marcxml/>).
//!
//! [`MarcXmlReader`] streams `<record>` elements out of a document of any
//! size, one at a time. Both default-namespace (`<record xmlns="...">`) and
//! prefix-namespace (`<marc:record xmlns:marc="...">`) forms are accepted.
//!
//! A structural problem inside one `<record>` (missing leader, missing tag or
//! subfield code) fails that record only and the next call continues after
//! it. Malformed XML cannot be resynchronized and is reported as a fatal
//! I/O-class error.
//!
//! # Examples
//!
//! ```
//! use marc_combiner::{marcxml, Field, Leader, Record};
//!
//! let mut record = Record::new(Leader::default());
//! record.add_field(Field::builder("245".to_string(), '1', '0').subfield_str('a', "Title").build());
//!
//! let xml = marcxml::record_to_marcxml(&record)?;
//! let restored = marcxml::marcxml_to_record(&xml)?;
//! assert_eq!(restored.get_field("245").unwrap().get_subfield('a'), Some("Title"));
//! # Ok::<(), marc_combiner::MarcError>(())
//! ```

use crate::error::{MarcError, Result};
use crate::formats::{CodecOptions, FormatReader};
use crate::leader::Leader;
use crate::record::{Field, Record};
use crate::recovery::{RecoveryContext, RecoveryMode};
use quick_xml::events::{BytesStart, Event};
use quick_xml::se::to_string as xml_to_string;
use serde::Serialize;
use std::fmt;
use std::io::BufRead;
use unicode_normalization::UnicodeNormalization;

/// The MARCXML namespace URI.
const MARCXML_NS: &str = "http://www.loc.gov/MARC21/slim";

/// MARCXML record representation for serialization.
#[derive(Debug, Serialize)]
#[serde(rename = "record")]
struct MarcxmlRecord {
    leader: String,
    controlfield: Vec<MarcxmlControlField>,
    datafield: Vec<MarcxmlDataField>,
}

#[derive(Debug, Serialize)]
struct MarcxmlControlField {
    #[serde(rename = "@tag")]
    tag: String,
    #[serde(rename = "$value")]
    value: String,
}

#[derive(Debug, Serialize)]
struct MarcxmlDataField {
    #[serde(rename = "@tag")]
    tag: String,
    #[serde(rename = "@ind1")]
    ind1: String,
    #[serde(rename = "@ind2")]
    ind2: String,
    subfield: Vec<MarcxmlSubfield>,
}

#[derive(Debug, Serialize)]
struct MarcxmlSubfield {
    #[serde(rename = "@code")]
    code: String,
    #[serde(rename = "$value")]
    value: String,
}

/// Convert a MARC record to a standard MARCXML string.
///
/// The output includes an XML declaration and the
/// `xmlns="http://www.loc.gov/MARC21/slim"` namespace on the root `<record>` element.
///
/// # Errors
///
/// Returns an error if the record cannot be serialized to XML.
pub fn record_to_marcxml(record: &Record) -> Result<String> {
    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}",
        record_element(record, true)?
    ))
}

/// Convert records to a MARCXML `<collection>` document.
///
/// # Errors
///
/// Returns an error if a record cannot be serialized to XML.
pub fn records_to_marcxml(records: &[Record]) -> Result<String> {
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><collection xmlns=\"{MARCXML_NS}\">"
    );
    for record in records {
        xml.push_str(&record_element(record, false)?);
    }
    xml.push_str("</collection>");
    Ok(xml)
}

fn record_element(record: &Record, with_namespace: bool) -> Result<String> {
    let leader_bytes = record.leader.as_bytes()?;

    let xml_record = MarcxmlRecord {
        leader: String::from_utf8_lossy(&leader_bytes).into_owned(),
        controlfield: record
            .control_fields_iter()
            .map(|(tag, value)| MarcxmlControlField {
                tag: tag.to_string(),
                value: value.to_string(),
            })
            .collect(),
        datafield: record
            .fields()
            .map(|field| MarcxmlDataField {
                tag: field.tag.clone(),
                ind1: field.indicator1.to_string(),
                ind2: field.indicator2.to_string(),
                subfield: field
                    .subfields()
                    .map(|sf| MarcxmlSubfield {
                        code: sf.code.to_string(),
                        value: sf.value.clone(),
                    })
                    .collect(),
            })
            .collect(),
    };

    let body = xml_to_string(&xml_record)
        .map_err(|e| MarcError::ParseError(format!("Failed to serialize to MARCXML: {e}")))?;

    if with_namespace {
        Ok(body.replacen("<record>", &format!("<record xmlns=\"{MARCXML_NS}\">"), 1))
    } else {
        Ok(body)
    }
}

/// Convert a MARCXML string holding one record to a MARC record.
///
/// # Errors
///
/// Returns an error if the XML is invalid or holds no usable record.
pub fn marcxml_to_record(xml: &str) -> Result<Record> {
    MarcXmlReader::new(xml.as_bytes())
        .read_record()?
        .ok_or_else(|| MarcError::ParseError("No <record> element found".to_string()))
}

/// Convert a MARCXML `<collection>` string to multiple MARC records.
///
/// # Errors
///
/// Returns an error if the XML is invalid or any record is malformed.
pub fn marcxml_to_records(xml: &str) -> Result<Vec<Record>> {
    MarcXmlReader::new(xml.as_bytes()).read_all()
}

/// Streaming reader for MARCXML documents.
pub struct MarcXmlReader<R: BufRead> {
    reader: quick_xml::Reader<R>,
    buf: Vec<u8>,
    recovery_mode: RecoveryMode,
    convert_to_utf8: bool,
    records_read: usize,
    finished: bool,
}

impl<R: BufRead> fmt::Debug for MarcXmlReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarcXmlReader")
            .field("recovery_mode", &self.recovery_mode)
            .field("convert_to_utf8", &self.convert_to_utf8)
            .field("records_read", &self.records_read)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Outcome of scanning for the next record start.
enum Step {
    Record,
    EmptyRecord,
    Eof,
    Skip,
}

/// Element whose text is being collected.
enum Target {
    None,
    Leader,
    Control(Option<String>),
    Subfield(Option<char>),
}

impl<R: BufRead> MarcXmlReader<R> {
    /// Create a reader over a MARCXML document.
    pub fn new(source: R) -> Self {
        MarcXmlReader {
            reader: quick_xml::Reader::from_reader(source),
            buf: Vec::new(),
            recovery_mode: RecoveryMode::Strict,
            convert_to_utf8: false,
            records_read: 0,
            finished: false,
        }
    }

    /// Create a reader configured from codec options.
    ///
    /// The source encoding option does not apply: XML declares its own.
    pub fn with_options(source: R, options: &CodecOptions) -> Self {
        MarcXmlReader::new(source)
            .with_recovery_mode(options.recovery_mode)
            .with_utf8_conversion(options.convert_to_utf8)
    }

    /// Set the recovery mode; non-strict modes drop malformed fields.
    #[must_use]
    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery_mode = mode;
        self
    }

    /// NFC-normalize text and mark records as UTF-8 (leader/09 = 'a').
    #[must_use]
    pub fn with_utf8_conversion(mut self, convert: bool) -> Self {
        self.convert_to_utf8 = convert;
        self
    }

    /// Read the next `<record>` element.
    ///
    /// # Errors
    ///
    /// Returns a recoverable error for a malformed record and a fatal
    /// [`MarcError::IoError`] for malformed XML.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        while !self.finished {
            self.buf.clear();
            let step = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"record" => Step::Record,
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"record" => Step::EmptyRecord,
                Ok(Event::Eof) => Step::Eof,
                Ok(_) => Step::Skip,
                Err(e) => {
                    self.finished = true;
                    return Err(syntax_error(&e, self.reader.buffer_position()));
                },
            };
            match step {
                Step::Record => {
                    let record = self.read_record_body()?;
                    self.records_read += 1;
                    return Ok(Some(record));
                },
                Step::EmptyRecord => {
                    return Err(MarcError::InvalidRecord(
                        "Empty <record> element".to_string(),
                    ));
                },
                Step::Eof => self.finished = true,
                Step::Skip => {},
            }
        }
        Ok(None)
    }

    /// Consume events up to the matching `</record>`.
    fn read_record_body(&mut self) -> Result<Record> {
        let mut context = RecoveryContext::new(self.recovery_mode);
        let mut structural: Option<MarcError> = None;
        let mut leader: Option<String> = None;
        let mut control: Vec<(String, String)> = Vec::new();
        let mut data: Vec<Field> = Vec::new();
        let mut field: Option<Field> = None;
        let mut target = Target::None;
        let mut text = String::new();

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    self.finished = true;
                    return Err(syntax_error(&e, self.reader.buffer_position()));
                },
            };

            match event {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"record" => {
                    structural.get_or_insert(MarcError::InvalidRecord(
                        "Nested <record> element".to_string(),
                    ));
                },
                Event::Start(e) => {
                    text.clear();
                    match e.local_name().as_ref() {
                        b"leader" => target = Target::Leader,
                        b"controlfield" => target = Target::Control(attribute(&e, b"tag")),
                        b"datafield" => field = Some(start_datafield(&e)),
                        b"subfield" => {
                            target = Target::Subfield(
                                attribute(&e, b"code").and_then(|c| c.chars().next()),
                            );
                        },
                        _ => {},
                    }
                },
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"leader" => leader = Some(String::new()),
                    b"controlfield" => match attribute(&e, b"tag") {
                        Some(tag) => control.push((tag, String::new())),
                        None => context.tolerate(missing("controlfield", "tag"), "controlfield")?,
                    },
                    b"datafield" => {
                        let f = start_datafield(&e);
                        if f.tag.is_empty() {
                            context.tolerate(missing("datafield", "tag"), "datafield")?;
                        } else {
                            data.push(f);
                        }
                    },
                    b"subfield" => match (field.as_mut(), attribute(&e, b"code")) {
                        (Some(f), Some(code)) => {
                            if let Some(code) = code.chars().next() {
                                f.add_subfield(code, String::new());
                            }
                        },
                        _ => context.tolerate(missing("subfield", "code"), "subfield")?,
                    },
                    _ => {},
                },
                Event::Text(t) => {
                    if !matches!(target, Target::None) {
                        match t.unescape() {
                            Ok(value) => text.push_str(&value),
                            Err(e) => {
                                self.finished = true;
                                return Err(syntax_error(&e, self.reader.buffer_position()));
                            },
                        }
                    }
                },
                Event::CData(c) => {
                    if !matches!(target, Target::None) {
                        text.push_str(&String::from_utf8_lossy(&c));
                    }
                },
                Event::End(e) => match e.local_name().as_ref() {
                    b"record" => break,
                    b"leader" => {
                        leader = Some(std::mem::take(&mut text));
                        target = Target::None;
                    },
                    b"controlfield" => {
                        match std::mem::replace(&mut target, Target::None) {
                            Target::Control(Some(tag)) => {
                                control.push((tag, std::mem::take(&mut text)));
                            },
                            _ => context.tolerate(missing("controlfield", "tag"), "controlfield")?,
                        }
                    },
                    b"subfield" => {
                        let code = match std::mem::replace(&mut target, Target::None) {
                            Target::Subfield(code) => code,
                            _ => None,
                        };
                        match (field.as_mut(), code) {
                            (Some(f), Some(code)) => {
                                f.add_subfield(code, std::mem::take(&mut text));
                            },
                            _ => context.tolerate(missing("subfield", "code"), "subfield")?,
                        }
                    },
                    b"datafield" => {
                        if let Some(f) = field.take() {
                            if f.tag.is_empty() {
                                context.tolerate(missing("datafield", "tag"), "datafield")?;
                            } else {
                                data.push(f);
                            }
                        }
                    },
                    _ => {},
                },
                Event::Eof => {
                    self.finished = true;
                    return Err(MarcError::TruncatedRecord(
                        "Document ended inside <record>".to_string(),
                    ));
                },
                _ => {},
            }
        }

        if let Some(error) = structural {
            return Err(error);
        }
        let leader = leader
            .ok_or_else(|| MarcError::InvalidRecord("MARCXML record has no <leader>".to_string()))?;
        let mut leader = Leader::from_bytes(leader.as_bytes())?;
        if self.convert_to_utf8 {
            leader.character_coding = 'a';
        }

        let normalize = |s: String| -> String {
            if self.convert_to_utf8 {
                s.nfc().collect()
            } else {
                s
            }
        };

        let mut record = Record::new(leader);
        for (tag, value) in control {
            record.add_control_field(tag, normalize(value));
        }
        for mut f in data {
            for subfield in f.subfields_mut() {
                subfield.value = normalize(std::mem::take(&mut subfield.value));
            }
            record.add_field(f);
        }
        context.report(record.get_control_field("001"));
        Ok(record)
    }
}

impl<R: BufRead> FormatReader for MarcXmlReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        MarcXmlReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .filter_map(std::result::Result::ok)
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// A data field from its start tag; a missing tag leaves it empty for the end handler.
fn start_datafield(element: &BytesStart<'_>) -> Field {
    let indicator = |name: &[u8]| {
        attribute(element, name)
            .and_then(|v| v.chars().next())
            .unwrap_or(' ')
    };
    Field::new(
        attribute(element, b"tag").unwrap_or_default(),
        indicator(b"ind1"),
        indicator(b"ind2"),
    )
}

fn syntax_error(error: &quick_xml::Error, position: usize) -> MarcError {
    MarcError::IoError(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("MARCXML syntax error at byte {position}: {error}"),
    ))
}

fn missing(element: &str, attribute: &str) -> MarcError {
    MarcError::InvalidField(format!("<{element}> without a {attribute} attribute"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        let mut record = Record::new(Leader::default());
        record.add_control_field_str("001", "12345");
        record.add_control_field_str("008", "920219s1990    mau    ");
        record.add_field(
            Field::builder("245".to_string(), '1', '0')
                .subfield_str('a', "Test title & more")
                .subfield_str('c', "Author")
                .build(),
        );
        record
    }

    #[test]
    fn test_record_to_marcxml_output_format() {
        let xml = record_to_marcxml(&sample_record()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(&format!("xmlns=\"{MARCXML_NS}\"")));
        assert!(xml.contains("<controlfield tag=\"001\">12345</controlfield>"));
        assert!(xml.contains("<datafield tag=\"245\" ind1=\"1\" ind2=\"0\">"));
        assert!(xml.contains("<subfield code=\"a\">Test title &amp; more</subfield>"));
    }

    #[test]
    fn test_marcxml_roundtrip_keeps_whitespace() {
        let xml = record_to_marcxml(&sample_record()).unwrap();
        let restored = marcxml_to_record(&xml).unwrap();
        assert_eq!(restored.get_control_field("008"), Some("920219s1990    mau    "));
        assert_eq!(
            restored.get_field("245").unwrap().get_subfield('a'),
            Some("Test title & more")
        );
    }

    #[test]
    fn test_parse_marcxml_with_prefix_namespace() {
        let xml = r#"<marc:record xmlns:marc="http://www.loc.gov/MARC21/slim">
            <marc:leader>01234nam a2200289 a 4500</marc:leader>
            <marc:controlfield tag="001">88888</marc:controlfield>
            <marc:datafield tag="245" ind1="1" ind2="0">
                <marc:subfield code="a">Prefixed title</marc:subfield>
            </marc:datafield>
        </marc:record>"#;

        let record = marcxml_to_record(xml).unwrap();
        assert_eq!(record.get_control_field("001"), Some("88888"));
        assert_eq!(
            record.get_field("245").unwrap().get_subfield('a'),
            Some("Prefixed title")
        );
    }

    #[test]
    fn test_collection_streaming() {
        let records: Vec<Record> = ["rec1", "rec2", "rec3"]
            .iter()
            .map(|id| {
                let mut r = Record::new(Leader::default());
                r.add_control_field_str("001", id);
                r
            })
            .collect();
        let xml = records_to_marcxml(&records).unwrap();

        let mut reader = MarcXmlReader::new(xml.as_bytes());
        let mut ids = Vec::new();
        while let Some(record) = reader.read_record().unwrap() {
            ids.push(record.get_control_field("001").unwrap().to_string());
        }
        assert_eq!(ids, vec!["rec1", "rec2", "rec3"]);
        assert_eq!(FormatReader::records_read(&reader), Some(3));
    }

    #[test]
    fn test_bad_record_is_skippable() {
        let xml = r#"<collection>
            <record><leader>01234nam a2200289 a 4500</leader><controlfield tag="001">b1</controlfield></record>
            <record><controlfield tag="001">no-leader</controlfield></record>
            <record><leader>01234nam a2200289 a 4500</leader><controlfield tag="001">b3</controlfield></record>
        </collection>"#;

        let mut reader = MarcXmlReader::new(xml.as_bytes());
        assert_eq!(
            reader.read_record().unwrap().unwrap().get_control_field("001"),
            Some("b1")
        );
        assert!(matches!(reader.read_record(), Err(MarcError::InvalidRecord(_))));
        assert_eq!(
            reader.read_record().unwrap().unwrap().get_control_field("001"),
            Some("b3")
        );
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_missing_subfield_code_strict_vs_lenient() {
        let xml = r#"<record><leader>01234nam a2200289 a 4500</leader>
            <datafield tag="245" ind1="1" ind2="0"><subfield>orphan</subfield><subfield code="a">kept</subfield></datafield>
        </record>"#;

        assert!(MarcXmlReader::new(xml.as_bytes()).read_record().is_err());

        let record = MarcXmlReader::new(xml.as_bytes())
            .with_recovery_mode(RecoveryMode::Lenient)
            .read_record()
            .unwrap()
            .unwrap();
        let field = record.get_field("245").unwrap();
        assert_eq!(field.subfields().count(), 1);
        assert_eq!(field.get_subfield('a'), Some("kept"));
    }

    #[test]
    fn test_malformed_xml_is_fatal() {
        let xml = "<collection><record><leader>x</leader></wrong></collection>";
        let mut reader = MarcXmlReader::new(xml.as_bytes());
        let err = reader.read_record().unwrap_err();
        assert!(err.is_fatal(), "{err}");
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_utf8_conversion_normalizes() {
        let xml = "<record><leader>01234nam  2200289 a 4500</leader>\
            <datafield tag=\"245\" ind1=\"1\" ind2=\"0\"><subfield code=\"a\">Cafe\u{0301}</subfield></datafield></record>";
        let record = MarcXmlReader::new(xml.as_bytes())
            .with_utf8_conversion(true)
            .read_record()
            .unwrap()
            .unwrap();
        assert_eq!(record.leader.character_coding, 'a');
        assert_eq!(record.get_field("245").unwrap().get_subfield('a'), Some("Caf\u{00E9}"));
    }
}
