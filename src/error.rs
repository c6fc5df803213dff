//! Error types for MARC reading, combining and indexing.
//!
//! This module provides the [`MarcError`] type for all library operations
//! and the [`Result`] convenience type.

use thiserror::Error;

/// Error type for all library operations.
///
/// Most variants describe a single record that could not be decoded; the
/// [`CombiningReader`](crate::CombiningReader) treats those as recoverable and
/// skips the record. [`MarcError::BibAfterHoldings`] and [`MarcError::IoError`]
/// are the conditions that end a combining run.
#[derive(Error, Debug)]
pub enum MarcError {
    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Error related to character encoding conversion.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Error during parsing of MARC data.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Error indicating a truncated or incomplete record.
    #[error("Truncated record: {0}")]
    TruncatedRecord(String),

    /// A bib record arrived directly after a holdings record that was merged
    /// into a logical record with the same identifier.
    ///
    /// This means the upstream export is corrupt; combining cannot continue.
    #[error("{id}: bib record {id} came after holdings record {id} in record chain [{chain}]; bib records for an id must precede its holdings records. STOPPING PROCESSING.")]
    BibAfterHoldings {
        /// Identifier shared by the offending records
        id: String,
        /// Kinds and identifiers of the raw records merged so far, in file order
        chain: String,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure reported by a search index adapter.
    #[error("Index error: {0}")]
    Index(String),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MarcError {
    /// Whether this error ends a combining run rather than failing one record.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, MarcError::BibAfterHoldings { .. } | MarcError::IoError(_))
    }
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
