//! Bibliographic vs. holdings classification.
//!
//! A raw record is a holdings (MHLD) record when its leader/06 carries one of
//! the holdings record types; every other record type is treated as
//! bibliographic. The identifier field plays no part in the decision.

use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of holdings record (Leader/06)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldingsType {
    /// x - Single-part item holdings (monographs)
    SinglePartItem,
    /// y - Serial item holdings
    SerialItem,
    /// v - Multipart item holdings (sets and multivolume monographs)
    MultipartItem,
    /// u - Unknown
    Unknown,
}

impl HoldingsType {
    /// Map a leader/06 value to a holdings type
    #[must_use]
    pub fn from_record_type(record_type: char) -> Option<Self> {
        match record_type {
            'x' => Some(HoldingsType::SinglePartItem),
            'y' => Some(HoldingsType::SerialItem),
            'v' => Some(HoldingsType::MultipartItem),
            'u' => Some(HoldingsType::Unknown),
            _ => None,
        }
    }
}

/// Classification of a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    /// Bibliographic record (or any non-holdings record type)
    Bibliographic,
    /// Holdings (MHLD) record
    Holdings(HoldingsType),
}

impl RecordKind {
    /// Classify a record by its leader
    #[must_use]
    pub fn of(record: &Record) -> Self {
        match HoldingsType::from_record_type(record.leader.record_type) {
            Some(holdings) => RecordKind::Holdings(holdings),
            None => RecordKind::Bibliographic,
        }
    }

    /// Whether this is a holdings classification
    #[must_use]
    pub fn is_holdings(self) -> bool {
        matches!(self, RecordKind::Holdings(_))
    }

    /// Short label used in log messages
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Bibliographic => "bib",
            RecordKind::Holdings(_) => "mhld",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leader::Leader;

    fn record_of_type(record_type: char) -> Record {
        Record::new(Leader {
            record_type,
            ..Leader::default()
        })
    }

    #[test]
    fn test_holdings_types() {
        assert_eq!(
            RecordKind::of(&record_of_type('x')),
            RecordKind::Holdings(HoldingsType::SinglePartItem)
        );
        assert_eq!(
            RecordKind::of(&record_of_type('y')),
            RecordKind::Holdings(HoldingsType::SerialItem)
        );
        assert_eq!(
            RecordKind::of(&record_of_type('v')),
            RecordKind::Holdings(HoldingsType::MultipartItem)
        );
        assert_eq!(
            RecordKind::of(&record_of_type('u')),
            RecordKind::Holdings(HoldingsType::Unknown)
        );
    }

    #[test]
    fn test_everything_else_is_bib() {
        for record_type in ['a', 'c', 'e', 'g', 'j', 'm', 't', 'z'] {
            assert_eq!(
                RecordKind::of(&record_of_type(record_type)),
                RecordKind::Bibliographic
            );
        }
    }

    #[test]
    fn test_identifier_does_not_affect_kind() {
        let mut record = record_of_type('a');
        record.add_control_field_str("004", "bib-link");
        assert!(!RecordKind::of(&record).is_holdings());
    }

    #[test]
    fn test_labels() {
        assert_eq!(RecordKind::Bibliographic.to_string(), "bib");
        assert_eq!(RecordKind::Holdings(HoldingsType::SerialItem).to_string(), "mhld");
    }
}
