//! Single-pass reader that combines split records into logical records.
//!
//! Exports from some library systems split one title across several raw
//! records: repeated bib fragments sharing an identifier, followed by the
//! title's holdings (MHLD) records. [`CombiningReader`] pulls raw records from
//! any [`FormatReader`] and hands back one merged record per identifier.
//!
//! - Bib fragments with the current identifier contribute their
//!   `bib_fields_to_merge` fields, appended in file order.
//! - The first matching holdings record replaces the bib's
//!   `mhld_fields_to_merge` fields with its own; later ones append.
//! - A bib record with the current identifier arriving after a matching
//!   holdings record is corrupt input and stops the run with
//!   [`MarcError::BibAfterHoldings`].
//!
//! Everything else (unreadable records, orphaned holdings, unsorted input) is
//! reported to the [`DiagnosticSink`] and skipped. At most one logical record
//! plus one raw record is held in memory.
//!
//! # Examples
//!
//! ```
//! use marc_combiner::{CombiningConfig, CombiningReader, Field, Leader, MarcWriter, Record};
//! use marc_combiner::formats::RecordFormat;
//! use std::io::Cursor;
//!
//! let mut bytes = Vec::new();
//! let mut writer = MarcWriter::new(&mut bytes);
//! for item in ["X1", "X2"] {
//!     let mut bib = Record::new(Leader::default());
//!     bib.add_control_field_str("001", "a1");
//!     bib.add_field(Field::builder("999".to_string(), ' ', ' ').subfield_str('a', item).build());
//!     writer.write_record(&bib)?;
//! }
//!
//! let reader = CombiningReader::open(RecordFormat::Binary, Cursor::new(bytes), CombiningConfig::default());
//! let records = reader.collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].get_fields("999").map(<[_]>::len), Some(2));
//! # Ok::<(), marc_combiner::MarcError>(())
//! ```

use crate::config::CombiningConfig;
use crate::diagnostics::{DiagnosticSink, LogSink, ReaderEvent};
use crate::error::{MarcError, Result};
use crate::field_merge::{append_fields, merge_fields};
use crate::formats::{open_path, open_reader, FormatReader, RecordFormat};
use crate::kind::RecordKind;
use crate::natural_order::compare_natural;
use crate::record::Record;
use std::cmp::Ordering;
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Counters kept by a [`CombiningReader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Raw records decoded by the codec
    pub raw_records: usize,
    /// Logical records handed to the caller
    pub emitted: usize,
    /// Raw records dropped (unreadable, orphaned or without identifier)
    pub skipped: usize,
    /// Bib fragments merged into an earlier bib
    pub bib_merges: usize,
    /// Holdings records merged into a bib
    pub holdings_merges: usize,
}

/// One raw record that went into a logical record.
#[derive(Debug, Clone)]
struct ChainLink {
    kind: RecordKind,
    id: String,
}

/// Logical record under construction.
#[derive(Debug)]
struct Pending {
    record: Record,
    id: String,
    chain: Vec<ChainLink>,
    holdings_merged: bool,
}

impl Pending {
    fn new(record: Record, id: String) -> Self {
        let chain = vec![ChainLink {
            kind: RecordKind::Bibliographic,
            id: id.clone(),
        }];
        Pending {
            record,
            id,
            chain,
            holdings_merged: false,
        }
    }

    fn last_was_holdings(&self) -> bool {
        self.chain.last().is_some_and(|link| link.kind.is_holdings())
    }

    fn push(&mut self, kind: RecordKind, id: &str) {
        self.chain.push(ChainLink {
            kind,
            id: id.to_string(),
        });
    }

    fn render_chain(&self) -> String {
        self.chain
            .iter()
            .map(|link| format!("{} {}", link.kind, link.id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug)]
enum State {
    /// Nothing buffered; the next bib starts a logical record
    Empty,
    /// A logical record is buffered, waiting for continuations
    Holding(Pending),
    /// Input exhausted
    Done,
    /// Stopped on corrupt input
    Halted,
}

/// Reader that merges bib fragments and holdings into logical records.
///
/// `C` is the codec supplying raw records; `S` receives diagnostics and
/// defaults to [`LogSink`].
pub struct CombiningReader<C: FormatReader, S: DiagnosticSink = LogSink> {
    codec: C,
    config: CombiningConfig,
    sink: S,
    state: State,
    ready: Option<Record>,
    stats: ReaderStats,
}

impl<C: FormatReader, S: DiagnosticSink> fmt::Debug for CombiningReader<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombiningReader")
            .field("codec", &self.codec)
            .field("sink", &self.sink)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<C: FormatReader> CombiningReader<C, LogSink> {
    /// Combine records pulled from `codec`.
    ///
    /// The codec should already be configured with
    /// [`CombiningConfig::codec_options`]; use [`CombiningReader::open`] to
    /// have that done for you.
    pub fn new(codec: C, config: CombiningConfig) -> Self {
        CombiningReader {
            codec,
            config,
            sink: LogSink,
            state: State::Empty,
            ready: None,
            stats: ReaderStats::default(),
        }
    }
}

impl CombiningReader<Box<dyn FormatReader>, LogSink> {
    /// Open a codec for `format` over `source` and combine its records.
    pub fn open<R>(format: RecordFormat, source: R, config: CombiningConfig) -> Self
    where
        R: Read + fmt::Debug + 'static,
    {
        let codec = open_reader(format, source, &config.codec_options());
        CombiningReader::new(codec, config)
    }

    /// Open a file and combine its records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open_path(
        format: RecordFormat,
        path: impl AsRef<Path>,
        config: CombiningConfig,
    ) -> Result<Self> {
        let codec = open_path(format, path, &config.codec_options())?;
        Ok(CombiningReader::new(codec, config))
    }
}

impl<C: FormatReader, S: DiagnosticSink> CombiningReader<C, S> {
    /// Replace the diagnostic sink.
    pub fn with_sink<T: DiagnosticSink>(self, sink: T) -> CombiningReader<C, T> {
        CombiningReader {
            codec: self.codec,
            config: self.config,
            sink,
            state: self.state,
            ready: self.ready,
            stats: self.stats,
        }
    }

    /// The diagnostic sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the reader, returning its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// The configuration in use
    pub fn config(&self) -> &CombiningConfig {
        &self.config
    }

    /// Counters so far
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Identifier of the logical record being built, if any
    pub fn current_id(&self) -> Option<&str> {
        match &self.state {
            State::Holding(pending) => Some(&pending.id),
            _ => None,
        }
    }

    /// Whether another logical record can be produced.
    ///
    /// Pulls raw records until one logical record is complete or input ends.
    /// Calling it again before [`next_record`](Self::next_record) returns the
    /// same answer without reading further.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::BibAfterHoldings`] on corrupt input and any I/O
    /// error from the codec. After either, the reader produces nothing more.
    pub fn has_next(&mut self) -> Result<bool> {
        loop {
            if self.ready.is_some() {
                return Ok(true);
            }
            if matches!(self.state, State::Done | State::Halted) {
                return Ok(false);
            }
            self.step()?;
        }
    }

    /// Next fully merged logical record, or `None` once input is exhausted.
    ///
    /// # Errors
    ///
    /// Same as [`has_next`](Self::has_next).
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        if !self.has_next()? {
            return Ok(None);
        }
        let record = self.ready.take();
        if record.is_some() {
            self.stats.emitted += 1;
        }
        Ok(record)
    }

    /// Pull and place one raw record.
    fn step(&mut self) -> Result<()> {
        let raw = match self.codec.read_record() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                if let State::Holding(pending) = std::mem::replace(&mut self.state, State::Done) {
                    self.ready = Some(pending.record);
                }
                return Ok(());
            },
            Err(error) if error.is_fatal() => {
                self.state = State::Halted;
                return Err(error);
            },
            Err(error) => {
                let after = self.current_id().map(str::to_string);
                self.skip(&ReaderEvent::UnreadableRecord {
                    after,
                    details: error.to_string(),
                });
                return Ok(());
            },
        };
        self.stats.raw_records += 1;

        let kind = RecordKind::of(&raw);
        match std::mem::replace(&mut self.state, State::Empty) {
            State::Holding(pending) => self.continue_with(pending, raw, kind),
            State::Empty => {
                self.start_with(raw, kind);
                Ok(())
            },
            finished @ (State::Done | State::Halted) => {
                self.state = finished;
                Ok(())
            },
        }
    }

    /// Place a raw record when nothing is buffered.
    fn start_with(&mut self, raw: Record, kind: RecordKind) {
        if kind.is_holdings() {
            let id = self
                .config
                .look_ahead_id_field
                .extract(&raw)
                .unwrap_or_default()
                .to_string();
            self.skip(&ReaderEvent::FirstRecordIsHoldings { id });
            return;
        }

        match self.config.current_id_field.extract(&raw) {
            Some(id) => {
                let id = id.to_string();
                self.state = State::Holding(Pending::new(raw, id));
            },
            None => self.skip(&ReaderEvent::MissingIdentifier {
                kind,
                field: self.config.current_id_field.to_string(),
                after: None,
            }),
        }
    }

    /// Place a raw record while a logical record is buffered.
    fn continue_with(&mut self, mut pending: Pending, raw: Record, kind: RecordKind) -> Result<()> {
        let field = if kind.is_holdings() {
            &self.config.look_ahead_id_field
        } else {
            &self.config.current_id_field
        };
        let Some(id) = field.extract(&raw).map(str::to_string) else {
            let event = ReaderEvent::MissingIdentifier {
                kind,
                field: field.to_string(),
                after: Some(pending.id.clone()),
            };
            self.state = State::Holding(pending);
            self.skip(&event);
            return Ok(());
        };

        if kind.is_holdings() {
            if id == pending.id {
                let tags = &self.config.mhld_fields_to_merge;
                let insertion_tag = &self.config.insertion_tag;
                if pending.holdings_merged {
                    append_fields(&mut pending.record, &raw, tags, insertion_tag);
                } else {
                    merge_fields(&mut pending.record, &raw, tags, insertion_tag);
                    pending.holdings_merged = true;
                }
                pending.push(kind, &id);
                self.stats.holdings_merges += 1;
                self.state = State::Holding(pending);
            } else {
                let current = pending.id.clone();
                self.state = State::Holding(pending);
                self.skip(&ReaderEvent::HoldingsMismatch { id, current });
            }
            return Ok(());
        }

        if id == pending.id {
            if pending.last_was_holdings() {
                pending.push(kind, &id);
                let chain = pending.render_chain();
                self.sink.report(&ReaderEvent::ChainBroken {
                    id: id.clone(),
                    chain: chain.clone(),
                });
                self.state = State::Halted;
                return Err(MarcError::BibAfterHoldings { id, chain });
            }
            append_fields(
                &mut pending.record,
                &raw,
                &self.config.bib_fields_to_merge,
                &self.config.insertion_tag,
            );
            pending.push(kind, &id);
            self.stats.bib_merges += 1;
            self.state = State::Holding(pending);
            return Ok(());
        }

        if compare_natural(&id, &pending.id) == Ordering::Less {
            self.sink.report(&ReaderEvent::OutOfOrder {
                id: id.clone(),
                previous: pending.id.clone(),
            });
        }
        self.ready = Some(pending.record);
        self.state = State::Holding(Pending::new(raw, id));
        Ok(())
    }

    fn skip(&mut self, event: &ReaderEvent) {
        self.stats.skipped += 1;
        self.sink.report(event);
    }
}

impl<C: FormatReader, S: DiagnosticSink> Iterator for CombiningReader<C, S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

impl<C: FormatReader, S: DiagnosticSink> FormatReader for CombiningReader<C, S> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        self.next_record()
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.stats.emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::leader::Leader;
    use crate::record::Field;
    use log::Level;
    use std::collections::VecDeque;
    use std::io;

    /// Codec that replays a script; `Err` entries are decode failures.
    #[derive(Debug)]
    struct Script(VecDeque<Result<Record>>);

    impl Script {
        fn new(items: Vec<Result<Record>>) -> Self {
            Script(items.into())
        }
    }

    impl FormatReader for Script {
        fn read_record(&mut self) -> Result<Option<Record>> {
            self.0.pop_front().transpose()
        }
    }

    fn field(tag: &str, value: &str) -> Field {
        Field::builder(tag.to_string(), ' ', ' ')
            .subfield_str('a', value)
            .build()
    }

    fn bib(id: &str, extra: &[(&str, &str)]) -> Result<Record> {
        let mut record = Record::new(Leader::default());
        record.add_control_field_str("001", id);
        record.add_field(field("245", &format!("Title {id}")));
        for (tag, value) in extra {
            record.add_field(field(tag, value));
        }
        Ok(record)
    }

    fn mhld(id: &str, extra: &[(&str, &str)]) -> Result<Record> {
        let mut leader = Leader::default();
        leader.record_type = 'y';
        let mut record = Record::new(leader);
        record.add_control_field_str("001", id);
        for (tag, value) in extra {
            record.add_field(field(tag, value));
        }
        Ok(record)
    }

    fn bad() -> Result<Record> {
        Err(MarcError::InvalidLeader("Record length must be at least 24".into()))
    }

    fn reader(items: Vec<Result<Record>>) -> CombiningReader<Script, CollectingSink> {
        CombiningReader::new(Script::new(items), CombiningConfig::default())
            .with_sink(CollectingSink::default())
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records
            .iter()
            .filter_map(|r| r.get_control_field("001"))
            .collect()
    }

    fn values<'a>(record: &'a Record, tag: &str) -> Vec<&'a str> {
        record
            .fields_by_tag(tag)
            .filter_map(|f| f.get_subfield('a'))
            .collect()
    }

    #[test]
    fn test_distinct_bibs_pass_through() {
        let mut reader = reader(vec![bib("b1", &[]), bib("b2", &[]), bib("b3", &[])]);
        let records: Vec<Record> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(ids(&records), ["b1", "b2", "b3"]);
        assert!(reader.sink().events().is_empty());
        assert_eq!(reader.stats().emitted, 3);
        assert_eq!(reader.stats().raw_records, 3);
    }

    #[test]
    fn test_empty_input() {
        let mut reader = reader(vec![]);
        assert!(!reader.has_next().unwrap());
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_bib_fragments_and_holdings() {
        let mut reader = reader(vec![
            bib("a1", &[("999", "X1")]),
            bib("a1", &[("999", "X2")]),
            mhld("a1", &[("852", "H1")]),
        ]);
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(values(&record, "999"), ["X1", "X2"]);
        assert_eq!(values(&record, "852"), ["H1"]);
        assert_eq!(record.tag_position("852").unwrap() + 1, record.tag_position("999").unwrap());
        assert!(reader.next_record().unwrap().is_none());

        let stats = reader.stats();
        assert_eq!(stats.bib_merges, 1);
        assert_eq!(stats.holdings_merges, 1);
    }

    #[test]
    fn test_holdings_replace_bib_instances_once() {
        let mut reader = reader(vec![
            bib("a1", &[("852", "bib copy"), ("999", "item")]),
            mhld("a1", &[("852", "H1")]),
            mhld("a1", &[("852", "H2"), ("866", "v.1-10")]),
        ]);
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(values(&record, "852"), ["H1", "H2"]);
        assert_eq!(values(&record, "866"), ["v.1-10"]);
        assert_eq!(values(&record, "999"), ["item"]);
    }

    #[test]
    fn test_fragments_only_merge_configured_tags() {
        let mut reader = reader(vec![
            bib("a1", &[("999", "X1")]),
            bib("a1", &[("500", "ignored"), ("999", "X2")]),
        ]);
        let record = reader.next_record().unwrap().unwrap();
        assert!(record.get_field("500").is_none());
        assert_eq!(values(&record, "245"), ["Title a1"]);
    }

    #[test]
    fn test_has_next_is_idempotent() {
        let mut reader = reader(vec![bib("b1", &[]), bib("b2", &[])]);
        assert!(reader.has_next().unwrap());
        assert!(reader.has_next().unwrap());
        assert_eq!(reader.stats().raw_records, 2);
        let first = reader.next_record().unwrap().unwrap();
        assert_eq!(first.get_control_field("001"), Some("b1"));
        assert!(reader.has_next().unwrap());
        assert!(reader.has_next().unwrap());
        assert_eq!(
            reader.next_record().unwrap().unwrap().get_control_field("001"),
            Some("b2")
        );
        assert!(!reader.has_next().unwrap());
    }

    #[test]
    fn test_unreadable_record_is_skipped() {
        let mut reader = reader(vec![bib("b1", &[]), bad(), bib("b3", &[])]);
        let records: Vec<Record> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(ids(&records), ["b1", "b3"]);
        assert_eq!(
            reader.sink().messages(),
            ["Skipping record after b1; Couldn't read it: Invalid leader: Record length must be at least 24"]
        );
        assert_eq!(reader.stats().skipped, 1);
    }

    #[test]
    fn test_unreadable_first_record() {
        let mut reader = reader(vec![bad(), bib("b1", &[])]);
        assert_eq!(ids(&reader.by_ref().collect::<Result<Vec<_>>>().unwrap()), ["b1"]);
        assert!(reader.sink().messages()[0].starts_with("Skipping record; Couldn't read it"));
    }

    #[test]
    fn test_out_of_order_is_reported_not_fatal() {
        let mut reader = reader(vec![bib("b2", &[]), bib("b1", &[]), bib("b3", &[])]);
        let records: Vec<Record> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(ids(&records), ["b2", "b1", "b3"]);
        let sink = reader.sink();
        assert_eq!(sink.count_at(Level::Info), 1);
        assert_eq!(
            sink.messages(),
            ["bib record b1 came after bib record b2: file isn't sorted."]
        );
    }

    #[test]
    fn test_natural_order_is_forward_progress() {
        let mut reader = reader(vec![bib("a9", &[]), bib("a10", &[])]);
        assert_eq!(reader.by_ref().count(), 2);
        assert!(reader.sink().events().is_empty());
    }

    #[test]
    fn test_first_record_holdings() {
        let mut reader = reader(vec![mhld("m1", &[("852", "H")]), bib("b1", &[])]);
        let records: Vec<Record> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(ids(&records), ["b1"]);
        assert!(records[0].get_field("852").is_none());
        assert_eq!(
            reader.sink().messages(),
            ["First record in file is mhld (not bib): Skipping record m1"]
        );
    }

    #[test]
    fn test_mismatched_holdings_skipped() {
        let mut reader = reader(vec![
            bib("b1", &[]),
            mhld("b9", &[("852", "stray")]),
            mhld("b1", &[("852", "H1")]),
        ]);
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(values(&record, "852"), ["H1"]);
        let sink = reader.sink();
        assert_eq!(sink.count_at(Level::Error), 1);
        assert_eq!(
            sink.messages()[0],
            "mhld id mismatch: mhld record b9 came after bib or mhld record b1: skipping mhld record b9."
        );
    }

    #[test]
    fn test_bib_after_holdings_halts() {
        let mut reader = reader(vec![
            bib("b1", &[]),
            mhld("b1", &[("852", "H1")]),
            bib("b1", &[]),
            bib("b2", &[]),
        ]);
        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, MarcError::BibAfterHoldings { ref id, .. } if id == "b1"));
        let message = err.to_string();
        assert!(message.starts_with("b1: "), "{message}");
        assert!(message.contains("[bib b1, mhld b1, bib b1]"), "{message}");
        assert!(message.ends_with("STOPPING PROCESSING."));

        assert!(!reader.has_next().unwrap());
        assert!(reader.next().is_none());
        assert_eq!(reader.stats().emitted, 0);
        assert!(reader.sink().events()[0].is_fatal());
    }

    #[test]
    fn test_missing_identifier_skipped() {
        let mut no_id = Record::new(Leader::default());
        no_id.add_field(field("245", "Anonymous"));
        let mut reader = reader(vec![Ok(no_id), bib("b1", &[]), mhld("", &[])]);
        let records: Vec<Record> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(ids(&records), ["b1"]);
        assert_eq!(
            reader.sink().messages(),
            [
                "Skipping bib record with no identifier in field 001",
                "Skipping mhld record with no identifier in field 001 (after record b1)",
            ]
        );
    }

    #[test]
    fn test_look_ahead_field_for_holdings() {
        let config = CombiningConfig::default().with_look_ahead_id_field("004".parse().unwrap());
        let mut holdings = mhld("h100", &[("852", "H1")]).unwrap();
        holdings.add_control_field_str("004", "b1");
        let mut reader = CombiningReader::new(
            Script::new(vec![bib("b1", &[]), Ok(holdings)]),
            config,
        )
        .with_sink(CollectingSink::default());
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(values(&record, "852"), ["H1"]);
        assert_eq!(record.get_control_field("001"), Some("b1"));
    }

    #[test]
    fn test_io_error_propagates() {
        let mut reader = reader(vec![
            bib("b1", &[]),
            Err(MarcError::IoError(io::Error::new(io::ErrorKind::Other, "disk gone"))),
        ]);
        assert!(matches!(reader.next_record(), Err(MarcError::IoError(_))));
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_borrowed_sink() {
        let mut sink = CollectingSink::default();
        {
            let reader = CombiningReader::new(
                Script::new(vec![bib("b2", &[]), bib("b1", &[])]),
                CombiningConfig::default(),
            )
            .with_sink(&mut sink);
            assert_eq!(reader.count(), 2);
        }
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn test_as_format_reader() {
        let mut reader = reader(vec![bib("b1", &[]), bib("b1", &[("999", "X")]), bib("b2", &[])]);
        let records = FormatReader::read_all(&mut reader).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(FormatReader::records_read(&reader), Some(2));
        assert_eq!(reader.into_sink().events().len(), 0);
    }
}
