#![warn(missing_docs)]

//! # marc-combiner
//!
//! A single-pass reader that merges split MARC exports into one logical
//! record per title, ready for indexing.
//!
//! Some integrated library systems export a title as several raw records: one
//! or more bibliographic fragments sharing an identifier, followed by the
//! title's holdings (MHLD) records. [`CombiningReader`] reads such a stream
//! in ISO 2709, MARCXML or MARC-in-JSON form and emits merged records,
//! skipping and reporting bad input instead of failing the whole run.
//!
//! ## Quick Start
//!
//! ```
//! use marc_combiner::{CombiningConfig, CombiningReader, Field, Leader, MarcWriter, Record};
//! use marc_combiner::formats::RecordFormat;
//! use std::io::Cursor;
//!
//! // A bib record followed by its holdings record
//! let mut bib = Record::new(Leader::default());
//! bib.add_control_field_str("001", "a1");
//! bib.add_field(Field::builder("245".to_string(), '1', '0').subfield_str('a', "Title").build());
//!
//! let mut holdings_leader = Leader::default();
//! holdings_leader.record_type = 'y';
//! let mut holdings = Record::new(holdings_leader);
//! holdings.add_control_field_str("001", "a1");
//! holdings.add_field(Field::builder("852".to_string(), ' ', ' ').subfield_str('b', "Main").build());
//!
//! let mut bytes = Vec::new();
//! let mut writer = MarcWriter::new(&mut bytes);
//! writer.write_record(&bib)?;
//! writer.write_record(&holdings)?;
//!
//! let mut reader = CombiningReader::open(RecordFormat::Binary, Cursor::new(bytes), CombiningConfig::default());
//! let record = reader.next_record()?.unwrap();
//! assert_eq!(record.get_field("852").and_then(|f| f.get_subfield('b')), Some("Main"));
//! assert!(reader.next_record()?.is_none());
//! # Ok::<(), marc_combiner::MarcError>(())
//! ```
//!
//! ## Modules
//!
//! - [`combining_reader`] — The combining state machine
//! - [`field_merge`] — Field merge policy and tag sets
//! - [`natural_order`] — Identifier comparison for sort-order checks
//! - [`diagnostics`] — Reader events and sinks
//! - [`config`] — Reader and import configuration
//! - [`record`] / [`leader`] — In-memory MARC records
//! - [`reader`] / [`writer`] — ISO 2709 codec
//! - [`marcxml`] / [`marcjson`] — MARCXML and MARC-in-JSON codecs
//! - [`formats`] — Codec traits and format selection
//! - [`encoding`] / [`recovery`] — Character sets and malformed-record handling
//! - [`index`] — Index documents, adapters and the importer

pub mod combining_reader;
pub mod config;
pub mod diagnostics;
pub mod encoding;
pub mod error;
pub mod field_merge;
pub mod formats;
pub mod identifier;
pub mod index;
pub mod kind;
pub mod leader;
pub mod marcjson;
pub mod marcxml;
pub mod natural_order;
pub mod reader;
pub mod record;
pub mod recovery;
pub mod writer;

pub use combining_reader::{CombiningReader, ReaderStats};
pub use config::{CombiningConfig, ImportConfig};
pub use diagnostics::{CollectingSink, DiagnosticSink, LogSink, ReaderEvent};
pub use encoding::{MarcEncoding, SourceEncoding};
pub use error::{MarcError, Result};
pub use field_merge::{append_fields, merge_fields, MergeOutcome, TagSet};
pub use identifier::FieldSpec;
pub use kind::{HoldingsType, RecordKind};
pub use leader::Leader;
pub use natural_order::{compare_natural, NaturalKey};
pub use reader::MarcReader;
pub use record::{Field, FieldBuilder, Record, RecordBuilder, Subfield};
pub use recovery::{RecoveryContext, RecoveryMode};
pub use writer::MarcWriter;
