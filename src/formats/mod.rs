//! Record codecs and format selection.
//!
//! Every serialization implements [`FormatReader`] (and, for output,
//! [`FormatWriter`]), so the combining reader works over any of them. The
//! concrete codec is picked once, at configuration time, through
//! [`RecordFormat`] and [`open_reader`].
//!
//! # Supported Formats
//!
//! | Format | Reader | Description |
//! |--------|--------|-------------|
//! | ISO 2709 | [`MarcReader`](crate::MarcReader) | Standard MARC interchange format |
//! | MARCXML | [`MarcXmlReader`](crate::marcxml::MarcXmlReader) | `<collection>` of `<record>` elements |
//! | MARC-in-JSON | [`MarcJsonReader`](crate::marcjson::MarcJsonReader) | One JSON document per line |
//!
//! # Format-Agnostic Processing
//!
//! ```
//! use marc_combiner::formats::{open_reader, CodecOptions, FormatReader, RecordFormat};
//! use std::io::Cursor;
//!
//! let xml = r#"<collection><record><leader>00000nam a2200000 a 4500</leader>
//!     <controlfield tag="001">b1</controlfield></record></collection>"#;
//! let mut reader = open_reader(RecordFormat::Xml, Cursor::new(xml), &CodecOptions::default());
//! let record = reader.read_record()?.unwrap();
//! assert_eq!(record.get_control_field("001"), Some("b1"));
//! # Ok::<(), marc_combiner::MarcError>(())
//! ```

mod traits;

pub use traits::{FormatReader, FormatReaderExt, FormatWriter, RecordIterator};

use crate::encoding::SourceEncoding;
use crate::error::{MarcError, Result};
use crate::marcjson::MarcJsonReader;
use crate::marcxml::MarcXmlReader;
use crate::reader::MarcReader;
use crate::recovery::RecoveryMode;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

/// Serialization of an input record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// ISO 2709 binary MARC (`.mrc`, `.marc`)
    #[default]
    Binary,
    /// MARCXML (`.xml`)
    Xml,
    /// MARC-in-JSON, one record per line (`.json`, `.jsonl`, `.ndjson`)
    Json,
}

impl RecordFormat {
    /// Detect format from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    ///
    /// ```
    /// use marc_combiner::formats::RecordFormat;
    ///
    /// assert_eq!(RecordFormat::from_extension("mrc"), Some(RecordFormat::Binary));
    /// assert_eq!(RecordFormat::from_extension("unknown"), None);
    /// ```
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mrc" | "marc" | "dat" => Some(Self::Binary),
            "xml" | "marcxml" => Some(Self::Xml),
            "json" | "jsonl" | "ndjson" => Some(Self::Json),
            _ => None,
        }
    }

    /// Detect format from a path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the canonical file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Binary => "mrc",
            Self::Xml => "xml",
            Self::Json => "jsonl",
        }
    }

    /// Get the human-readable name for this format.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Binary => "ISO 2709",
            Self::Xml => "MARCXML",
            Self::Json => "MARC-in-JSON",
        }
    }
}

impl std::fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for RecordFormat {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "binary" | "iso2709" | "marc" => Ok(Self::Binary),
            "xml" | "marcxml" => Ok(Self::Xml),
            "json" | "marcjson" => Ok(Self::Json),
            other => Err(MarcError::Config(format!("Unknown record format '{other}'"))),
        }
    }
}

/// Decoding options shared by all codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecOptions {
    /// How malformed records are handled
    pub recovery_mode: RecoveryMode,
    /// Character encoding of binary input
    pub source_encoding: SourceEncoding,
    /// NFC-normalize text and mark records as UTF-8
    pub convert_to_utf8: bool,
}

/// Open a reader for `format` over `source`.
pub fn open_reader<R>(format: RecordFormat, source: R, options: &CodecOptions) -> Box<dyn FormatReader>
where
    R: Read + Debug + 'static,
{
    match format {
        RecordFormat::Binary => Box::new(MarcReader::with_options(source, options)),
        RecordFormat::Xml => Box::new(MarcXmlReader::with_options(BufReader::new(source), options)),
        RecordFormat::Json => {
            Box::new(MarcJsonReader::with_options(BufReader::new(source), options))
        },
    }
}

/// Open a file as a record stream.
///
/// # Errors
///
/// Returns an error if the file cannot be opened.
pub fn open_path(
    format: RecordFormat,
    path: impl AsRef<Path>,
    options: &CodecOptions,
) -> Result<Box<dyn FormatReader>> {
    let file = File::open(path)?;
    Ok(open_reader(format, file, options))
}
