//! Recovery strategies for malformed and truncated MARC records.
//!
//! A codec decodes one record at a time. Within a record, the recovery mode
//! decides whether a defect fails the whole record or is noted and skipped
//! so the rest of the record can still be used. Failing a record never stops
//! the stream: the binary reader frames records on the record terminator, so
//! the next call starts cleanly at the following record.

use crate::error::{MarcError, Result};

/// Strategy for handling malformed or truncated records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryMode {
    /// Strict mode: return errors for any malformation (default)
    #[default]
    Strict,
    /// Lenient mode: drop malformed fields and directory entries, keep the rest
    Lenient,
    /// Permissive mode: also accept truncated records and replace
    /// undecodable characters with U+FFFD
    Permissive,
}

impl RecoveryMode {
    /// Mode selected by the combining configuration's `permissive` flag
    #[must_use]
    pub fn from_permissive(permissive: bool) -> Self {
        if permissive {
            RecoveryMode::Permissive
        } else {
            RecoveryMode::Strict
        }
    }

    /// Whether text decoding substitutes U+FFFD instead of failing
    #[must_use]
    pub fn lenient_decoding(self) -> bool {
        self == RecoveryMode::Permissive
    }
}

/// Recovery context for handling malformed data within one record
#[derive(Debug)]
pub struct RecoveryContext {
    /// Current recovery mode
    pub mode: RecoveryMode,
    /// Whether warnings/recoveries were needed
    pub has_errors: bool,
    /// List of recovery messages
    pub recovery_messages: Vec<String>,
}

impl Default for RecoveryContext {
    fn default() -> Self {
        RecoveryContext::new(RecoveryMode::Strict)
    }
}

impl RecoveryContext {
    /// Create a new recovery context with the given mode
    #[must_use]
    pub fn new(mode: RecoveryMode) -> Self {
        RecoveryContext {
            mode,
            has_errors: false,
            recovery_messages: Vec::new(),
        }
    }

    fn add_message(&mut self, message: String) {
        self.has_errors = true;
        self.recovery_messages.push(message);
    }

    /// Tolerate a defect unless the mode is strict
    ///
    /// # Errors
    ///
    /// Returns `error` unchanged in strict mode.
    pub fn tolerate(&mut self, error: MarcError, context: &str) -> Result<()> {
        match self.mode {
            RecoveryMode::Strict => Err(error),
            RecoveryMode::Lenient | RecoveryMode::Permissive => {
                self.add_message(format!("{context}: {error}"));
                Ok(())
            },
        }
    }

    /// Tolerate a truncated record; only permissive mode accepts one
    ///
    /// # Errors
    ///
    /// Returns `error` unchanged unless the mode is permissive.
    pub fn tolerate_truncation(&mut self, error: MarcError, context: &str) -> Result<()> {
        if self.mode == RecoveryMode::Permissive {
            self.add_message(format!("{context}: {error}"));
            Ok(())
        } else {
            Err(error)
        }
    }

    /// Log what was salvaged, if anything
    pub fn report(&self, record_id: Option<&str>) {
        if self.has_errors {
            log::debug!(
                "Recovered record {}: {}",
                record_id.unwrap_or("<no id>"),
                self.recovery_messages.join("; ")
            );
        }
    }
}
