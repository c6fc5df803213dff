//! Diagnostic events raised while combining records.
//!
//! The combining reader never logs on its own. Every anomaly becomes a
//! [`ReaderEvent`] handed to the [`DiagnosticSink`] the reader was built
//! with. [`LogSink`] forwards events to the `log` facade, [`CollectingSink`]
//! keeps them for inspection.
//!
//! ```
//! use marc_combiner::diagnostics::{CollectingSink, DiagnosticSink, ReaderEvent};
//!
//! let mut sink = CollectingSink::default();
//! sink.report(&ReaderEvent::OutOfOrder { id: "b1".into(), previous: "b2".into() });
//! assert_eq!(
//!     sink.messages(),
//!     vec!["bib record b1 came after bib record b2: file isn't sorted."]
//! );
//! ```

use crate::error::MarcError;
use crate::kind::RecordKind;
use log::Level;
use std::fmt;

/// Log target used by [`LogSink`] for recoverable events.
pub const LOG_TARGET: &str = "marc_combiner::reader";

/// Log target used by [`LogSink`] for events that end the run.
pub const FATAL_LOG_TARGET: &str = "marc_combiner::reader::fatal";

/// Something the combining reader noticed about its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// The codec could not decode a raw record; it was skipped.
    UnreadableRecord {
        /// Identifier of the logical record being built, if any
        after: Option<String>,
        /// Codec error text
        details: String,
    },
    /// A holdings record arrived with no bib record before it.
    FirstRecordIsHoldings {
        /// Holdings record identifier
        id: String,
    },
    /// A bib identifier sorts before the previous one.
    OutOfOrder {
        /// Identifier of the new bib record
        id: String,
        /// Identifier of the logical record it followed
        previous: String,
    },
    /// A holdings record does not match the current logical record.
    HoldingsMismatch {
        /// Holdings record identifier
        id: String,
        /// Identifier of the current logical record
        current: String,
    },
    /// A raw record has no value in its identifier field.
    MissingIdentifier {
        /// Kind of the skipped record
        kind: RecordKind,
        /// Identifier field that was empty
        field: String,
        /// Identifier of the logical record being built, if any
        after: Option<String>,
    },
    /// A bib record followed a matching holdings record; processing stops.
    ChainBroken {
        /// Identifier shared by the chain
        id: String,
        /// Rendered record chain
        chain: String,
    },
}

impl ReaderEvent {
    /// Severity this event is logged at
    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            ReaderEvent::OutOfOrder { .. } => Level::Info,
            ReaderEvent::UnreadableRecord { .. }
            | ReaderEvent::FirstRecordIsHoldings { .. }
            | ReaderEvent::HoldingsMismatch { .. }
            | ReaderEvent::MissingIdentifier { .. }
            | ReaderEvent::ChainBroken { .. } => Level::Error,
        }
    }

    /// Whether the event ends the run
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReaderEvent::ChainBroken { .. })
    }

    /// Log target for this event
    #[must_use]
    pub fn target(&self) -> &'static str {
        if self.is_fatal() {
            FATAL_LOG_TARGET
        } else {
            LOG_TARGET
        }
    }
}

impl fmt::Display for ReaderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderEvent::UnreadableRecord {
                after: Some(after),
                details,
            } => write!(f, "Skipping record after {after}; Couldn't read it: {details}"),
            ReaderEvent::UnreadableRecord {
                after: None,
                details,
            } => write!(f, "Skipping record; Couldn't read it: {details}"),
            ReaderEvent::FirstRecordIsHoldings { id } => write!(
                f,
                "First record in file is mhld (not bib): Skipping record {id}"
            ),
            ReaderEvent::OutOfOrder { id, previous } => write!(
                f,
                "bib record {id} came after bib record {previous}: file isn't sorted."
            ),
            ReaderEvent::HoldingsMismatch { id, current } => write!(
                f,
                "mhld id mismatch: mhld record {id} came after bib or mhld record {current}: skipping mhld record {id}."
            ),
            ReaderEvent::MissingIdentifier { kind, field, after } => {
                write!(f, "Skipping {kind} record with no identifier in field {field}")?;
                if let Some(after) = after {
                    write!(f, " (after record {after})")?;
                }
                Ok(())
            },
            ReaderEvent::ChainBroken { id, chain } => {
                let error = MarcError::BibAfterHoldings {
                    id: id.clone(),
                    chain: chain.clone(),
                };
                write!(f, "{error}")
            },
        }
    }
}

/// Receiver for reader diagnostics.
pub trait DiagnosticSink: fmt::Debug {
    /// Handle one event
    fn report(&mut self, event: &ReaderEvent);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, event: &ReaderEvent) {
        (**self).report(event);
    }
}

/// Forwards events to the `log` facade under [`LOG_TARGET`], or
/// [`FATAL_LOG_TARGET`] for fatal events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, event: &ReaderEvent) {
        log::log!(target: event.target(), event.level(), "{event}");
    }
}

/// Keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    events: Vec<ReaderEvent>,
}

impl CollectingSink {
    /// Events in the order they were reported
    #[must_use]
    pub fn events(&self) -> &[ReaderEvent] {
        &self.events
    }

    /// Rendered messages in report order
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.events.iter().map(ToString::to_string).collect()
    }

    /// Number of events at `level`
    #[must_use]
    pub fn count_at(&self, level: Level) -> usize {
        self.events.iter().filter(|e| e.level() == level).count()
    }

    /// Drop all collected events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, event: &ReaderEvent) {
        self.events.push(event.clone());
    }
}
