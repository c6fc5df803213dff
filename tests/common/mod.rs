//! Common test helpers and fixtures shared across the test suite.

#![allow(dead_code)]

use marc_combiner::diagnostics::CollectingSink;
use marc_combiner::formats::{open_reader, FormatReader, RecordFormat};
use marc_combiner::{
    marcjson, marcxml, CombiningConfig, CombiningReader, Field, Leader, MarcWriter, Record,
};
use std::io::Cursor;

/// A frame the binary reader cannot decode; it ends in a record terminator
/// so the following record is still found.
pub const BAD_RECORD: &[u8] = b"this is not a MARC record at all\x1D";

/// Leader for a record of the given type (`a` bib, `x`/`y`/`v`/`u` holdings).
pub fn leader(record_type: char) -> Leader {
    Leader {
        record_type,
        ..Leader::default()
    }
}

/// Data field with one `$a`.
pub fn field(tag: &str, value: &str) -> Field {
    Field::builder(tag.to_string(), ' ', ' ')
        .subfield_str('a', value)
        .build()
}

/// Bib record with a title and extra `(tag, $a)` fields.
pub fn bib(id: &str, fields: &[(&str, &str)]) -> Record {
    let mut record = Record::new(leader('a'));
    record.add_control_field_str("001", id);
    record.add_field(
        Field::builder("245".to_string(), '1', '0')
            .subfield_str('a', &format!("Title {id}"))
            .build(),
    );
    for (tag, value) in fields {
        record.add_field(field(tag, value));
    }
    record
}

/// Serial holdings record with extra `(tag, $a)` fields.
pub fn mhld(id: &str, fields: &[(&str, &str)]) -> Record {
    let mut record = Record::new(leader('y'));
    record.add_control_field_str("001", id);
    for (tag, value) in fields {
        record.add_field(field(tag, value));
    }
    record
}

/// Encode records as ISO 2709.
pub fn to_binary(records: &[Record]) -> Vec<u8> {
    let mut writer = MarcWriter::new(Vec::new());
    for record in records {
        writer.write_record(record).expect("fixture record encodes");
    }
    writer.into_inner()
}

/// Encode records as a MARCXML collection.
pub fn to_xml(records: &[Record]) -> String {
    marcxml::records_to_marcxml(records).expect("fixture records serialize")
}

/// Encode records as MARC-in-JSON lines.
pub fn to_json_lines(records: &[Record]) -> String {
    records
        .iter()
        .map(|r| marcjson::record_to_marcjson(r).expect("fixture record serializes").to_string() + "\n")
        .collect()
}

/// Combining reader over an in-memory stream, collecting diagnostics.
pub fn combining(
    format: RecordFormat,
    bytes: Vec<u8>,
    config: CombiningConfig,
) -> CombiningReader<Box<dyn FormatReader>, CollectingSink> {
    let codec = open_reader(format, Cursor::new(bytes), &config.codec_options());
    CombiningReader::new(codec, config).with_sink(CollectingSink::default())
}

/// Combining reader over binary records with the default configuration.
pub fn combining_binary(records: &[Record]) -> CombiningReader<Box<dyn FormatReader>, CollectingSink> {
    combining(RecordFormat::Binary, to_binary(records), CombiningConfig::default())
}

/// Control number of each record.
pub fn ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get_control_field("001").unwrap_or_default().to_string())
        .collect()
}

/// `$a` values of every field with `tag`.
pub fn values(record: &Record, tag: &str) -> Vec<String> {
    record
        .fields_by_tag(tag)
        .filter_map(|f| f.get_subfield('a'))
        .map(str::to_string)
        .collect()
}
