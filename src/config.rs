//! Construction-time configuration.
//!
//! [`CombiningConfig`] carries everything the combining reader needs: the
//! identifier fields, the two merge tag sets, the insertion tag and the codec
//! options. [`ImportConfig`] wraps it with the input format and index
//! settings used by the [`Importer`](crate::index::Importer).
//!
//! Both load from JSON. Missing keys take their defaults, unknown keys are
//! rejected.
//!
//! ```
//! use marc_combiner::config::CombiningConfig;
//!
//! let config = CombiningConfig::from_json_str(
//!     r#"{"look_ahead_id_field": "004", "mhld_fields_to_merge": "852|866"}"#,
//! )?;
//! assert_eq!(config.look_ahead_id_field.tag(), "004");
//! assert_eq!(config.insertion_tag, "999");
//! # Ok::<(), marc_combiner::MarcError>(())
//! ```

use crate::encoding::SourceEncoding;
use crate::error::{MarcError, Result};
use crate::field_merge::TagSet;
use crate::formats::{CodecOptions, RecordFormat};
use crate::identifier::FieldSpec;
use crate::index::IndexTarget;
use crate::recovery::RecoveryMode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Holdings tags copied into bib records unless configured otherwise.
pub const DEFAULT_MHLD_FIELDS: [&str; 6] = ["852", "853", "863", "866", "867", "868"];

/// Default tag for fields repeated across bib fragments, and default insertion tag.
pub const DEFAULT_BIB_FIELD: &str = "999";

/// Settings for a [`CombiningReader`](crate::CombiningReader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CombiningConfig {
    /// Identifier field of bib records
    pub current_id_field: FieldSpec,
    /// Identifier field of holdings records, matched against the current id
    pub look_ahead_id_field: FieldSpec,
    /// Tags appended from later bib fragments with the same id
    pub bib_fields_to_merge: TagSet,
    /// Tags copied from matching holdings records
    pub mhld_fields_to_merge: TagSet,
    /// Merged fields are placed before this tag's group
    pub insertion_tag: String,
    /// Salvage truncated or badly encoded records instead of skipping them
    pub permissive: bool,
    /// Character encoding of the input
    pub source_encoding: SourceEncoding,
    /// Normalize output text to NFC UTF-8
    pub convert_to_utf8: bool,
}

impl Default for CombiningConfig {
    fn default() -> Self {
        CombiningConfig {
            current_id_field: FieldSpec::default(),
            look_ahead_id_field: FieldSpec::default(),
            bib_fields_to_merge: TagSet::from_tags([DEFAULT_BIB_FIELD]).unwrap_or_default(),
            mhld_fields_to_merge: TagSet::from_tags(DEFAULT_MHLD_FIELDS).unwrap_or_default(),
            insertion_tag: DEFAULT_BIB_FIELD.to_string(),
            permissive: false,
            source_encoding: SourceEncoding::Auto,
            convert_to_utf8: false,
        }
    }
}

impl CombiningConfig {
    /// Set the bib identifier field.
    #[must_use]
    pub fn with_current_id_field(mut self, field: FieldSpec) -> Self {
        self.current_id_field = field;
        self
    }

    /// Set the holdings identifier field.
    #[must_use]
    pub fn with_look_ahead_id_field(mut self, field: FieldSpec) -> Self {
        self.look_ahead_id_field = field;
        self
    }

    /// Set the tags merged across bib fragments.
    #[must_use]
    pub fn with_bib_fields_to_merge(mut self, tags: TagSet) -> Self {
        self.bib_fields_to_merge = tags;
        self
    }

    /// Set the tags copied from holdings records.
    #[must_use]
    pub fn with_mhld_fields_to_merge(mut self, tags: TagSet) -> Self {
        self.mhld_fields_to_merge = tags;
        self
    }

    /// Set the insertion tag.
    #[must_use]
    pub fn with_insertion_tag(mut self, tag: impl Into<String>) -> Self {
        self.insertion_tag = tag.into();
        self
    }

    /// Enable or disable permissive decoding.
    #[must_use]
    pub fn with_permissive(mut self, permissive: bool) -> Self {
        self.permissive = permissive;
        self
    }

    /// Set the source encoding.
    #[must_use]
    pub fn with_source_encoding(mut self, encoding: SourceEncoding) -> Self {
        self.source_encoding = encoding;
        self
    }

    /// Enable or disable UTF-8 conversion.
    #[must_use]
    pub fn with_convert_to_utf8(mut self, convert: bool) -> Self {
        self.convert_to_utf8 = convert;
        self
    }

    /// Codec settings implied by this configuration.
    #[must_use]
    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            recovery_mode: RecoveryMode::from_permissive(self.permissive),
            source_encoding: self.source_encoding,
            convert_to_utf8: self.convert_to_utf8,
        }
    }

    /// Check values serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::Config`] if the insertion tag is not a three
    /// character tag.
    pub fn validate(&self) -> Result<()> {
        let tag = &self.insertion_tag;
        if tag.len() != 3 || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MarcError::Config(format!("Invalid insertion tag '{tag}'")));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON, unknown keys or invalid values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = parse_json(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid configuration.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

/// Settings for a full import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Input serialization
    pub format: RecordFormat,
    /// Combining reader settings
    pub combining: CombiningConfig,
    /// Commit after this many documents; 0 commits only at the end
    pub commit_every: usize,
    /// Where documents go
    pub index: IndexTarget,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            format: RecordFormat::Binary,
            combining: CombiningConfig::default(),
            commit_every: 1000,
            index: IndexTarget::Memory,
        }
    }
}

impl ImportConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON, unknown keys or invalid values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = parse_json(json)?;
        config.combining.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid configuration.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

fn parse_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| MarcError::Config(e.to_string()))
}
