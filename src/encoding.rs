//! Character encoding support for MARC records.
//!
//! MARC records can use different character encodings:
//! - **MARC-8** (legacy) — ISO 2022 style character sets switched by escape sequences
//! - **UTF-8** (modern) — Unicode standard encoding
//! - Occasionally a single-byte legacy charset such as ISO-8859-1 (handled via `encoding_rs`)
//!
//! The encoding is indicated in position 9 of the MARC leader:
//! - Space character = MARC-8
//! - 'a' = UTF-8
//!
//! MARC-8 support covers the Basic Latin (ASCII) and Extended Latin (ANSEL)
//! graphic sets, which is what Western catalogs use in practice. ANSEL
//! combining diacritics precede their base character in MARC-8 and follow it
//! in Unicode; the decoder reorders them. Other MARC-8 sets (Hebrew, Cyrillic,
//! Arabic, Greek, CJK, sub/superscripts) are reported as decode errors, or
//! replaced with U+FFFD when decoding leniently.

use crate::error::{MarcError, Result};
use crate::leader::Leader;
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

const ESCAPE: u8 = 0x1B;

/// Character encoding for MARC records.
///
/// Indicates the character set used to encode field data in a MARC record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarcEncoding {
    /// MARC-8 encoding (legacy, mixed character sets)
    Marc8,
    /// UTF-8 encoding (modern standard)
    Utf8,
}

impl MarcEncoding {
    /// Detect encoding from leader character coding field
    ///
    /// ' ' (space) = MARC-8, 'a' = UTF-8
    ///
    /// # Errors
    ///
    /// Returns `MarcError::EncodingError` if the character is not a valid encoding indicator.
    pub fn from_leader_char(c: char) -> Result<Self> {
        match c {
            ' ' => Ok(MarcEncoding::Marc8),
            'a' => Ok(MarcEncoding::Utf8),
            _ => Err(MarcError::EncodingError(format!(
                "Unknown character encoding: {c}"
            ))),
        }
    }

    /// Get the leader character for this encoding
    #[must_use]
    pub fn as_leader_char(&self) -> char {
        match self {
            MarcEncoding::Marc8 => ' ',
            MarcEncoding::Utf8 => 'a',
        }
    }
}

/// Source character encoding hint for a record stream.
///
/// String forms: `"auto"`, `"utf8"`/`"UTF-8"`, `"marc8"`/`"MARC-8"`, or any
/// WHATWG encoding label known to `encoding_rs` (e.g. `"ISO-8859-1"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceEncoding {
    /// Follow each record's leader/09
    #[default]
    Auto,
    /// Always UTF-8
    Utf8,
    /// Always MARC-8
    Marc8,
    /// Another single- or multi-byte charset
    Other(&'static Encoding),
}

impl SourceEncoding {
    /// Resolve `Auto` against a record's leader.
    ///
    /// Leader/09 `a` means UTF-8; anything else is read as MARC-8.
    #[must_use]
    pub fn for_leader(self, leader: &Leader) -> SourceEncoding {
        match self {
            SourceEncoding::Auto => match MarcEncoding::from_leader_char(leader.character_coding) {
                Ok(MarcEncoding::Utf8) => SourceEncoding::Utf8,
                _ => SourceEncoding::Marc8,
            },
            resolved => resolved,
        }
    }
}

impl FromStr for SourceEncoding {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "" | "auto" => Ok(SourceEncoding::Auto),
            "utf8" => Ok(SourceEncoding::Utf8),
            "marc8" => Ok(SourceEncoding::Marc8),
            _ => Encoding::for_label(s.trim().as_bytes())
                .map(SourceEncoding::Other)
                .ok_or_else(|| MarcError::Config(format!("Unknown source encoding '{s}'"))),
        }
    }
}

impl TryFrom<String> for SourceEncoding {
    type Error = MarcError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SourceEncoding> for String {
    fn from(encoding: SourceEncoding) -> Self {
        encoding.to_string()
    }
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceEncoding::Auto => f.write_str("auto"),
            SourceEncoding::Utf8 => f.write_str("UTF-8"),
            SourceEncoding::Marc8 => f.write_str("MARC-8"),
            SourceEncoding::Other(encoding) => f.write_str(encoding.name()),
        }
    }
}

/// Per-record text decoder.
///
/// Built once per record from the stream's [`SourceEncoding`] and the record's
/// leader, then applied to every field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDecoder {
    encoding: SourceEncoding,
    lenient: bool,
    normalize: bool,
}

impl FieldDecoder {
    /// Create a decoder for one record.
    ///
    /// * `lenient` - replace undecodable data with U+FFFD instead of failing
    /// * `normalize` - NFC-normalize decoded text (used when converting output to UTF-8)
    #[must_use]
    pub fn for_record(source: SourceEncoding, leader: &Leader, lenient: bool, normalize: bool) -> Self {
        FieldDecoder {
            encoding: source.for_leader(leader),
            lenient,
            normalize,
        }
    }

    /// Resolved encoding this decoder reads
    #[must_use]
    pub fn encoding(&self) -> SourceEncoding {
        self.encoding
    }

    /// Decode one field or subfield value.
    ///
    /// # Errors
    ///
    /// Returns `MarcError::EncodingError` if the bytes are invalid for the
    /// encoding and the decoder is not lenient.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        let text = match self.encoding {
            SourceEncoding::Utf8 | SourceEncoding::Auto => {
                if self.lenient {
                    String::from_utf8_lossy(bytes).into_owned()
                } else {
                    String::from_utf8(bytes.to_vec())
                        .map_err(|e| MarcError::EncodingError(format!("Invalid UTF-8: {e}")))?
                }
            },
            SourceEncoding::Marc8 => decode_marc8(bytes, self.lenient)?,
            SourceEncoding::Other(encoding) => {
                if self.lenient {
                    encoding.decode_without_bom_handling(bytes).0.into_owned()
                } else {
                    encoding
                        .decode_without_bom_handling_and_without_replacement(bytes)
                        .map(std::borrow::Cow::into_owned)
                        .ok_or_else(|| {
                            MarcError::EncodingError(format!(
                                "Invalid {} data",
                                encoding.name()
                            ))
                        })?
                }
            },
        };

        if self.normalize {
            Ok(text.nfc().collect())
        } else {
            Ok(text)
        }
    }
}

/// Decode bytes using the specified encoding
///
/// # Errors
///
/// Returns `MarcError::EncodingError` if the bytes are invalid for the encoding.
pub fn decode_bytes(bytes: &[u8], encoding: MarcEncoding) -> Result<String> {
    match encoding {
        MarcEncoding::Utf8 => String::from_utf8(bytes.to_vec())
            .map_err(|e| MarcError::EncodingError(format!("Invalid UTF-8: {e}"))),
        MarcEncoding::Marc8 => decode_marc8(bytes, false),
    }
}

/// MARC-8 graphic character sets this decoder distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharacterSet {
    BasicLatin,
    ExtendedLatin,
    Unsupported(u8),
}

/// Decode MARC-8 bytes to a string.
///
/// # Errors
///
/// Returns `MarcError::EncodingError` for malformed escape sequences, bytes
/// outside the MARC-8 ranges, or unsupported character sets when not lenient.
pub fn decode_marc8(bytes: &[u8], lenient: bool) -> Result<String> {
    let mut g0 = CharacterSet::BasicLatin;
    let mut g1 = CharacterSet::ExtendedLatin;
    let mut out = String::with_capacity(bytes.len());
    let mut pending_marks: Vec<char> = Vec::new();

    let fail = |message: String| -> Result<Option<char>> {
        if lenient {
            Ok(Some(char::REPLACEMENT_CHARACTER))
        } else {
            Err(MarcError::EncodingError(message))
        }
    };

    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        i += 1;

        let decoded = match byte {
            ESCAPE => {
                match parse_escape(&bytes[i..]) {
                    Some((Designation::G0(set), used)) => {
                        g0 = set;
                        i += used;
                    },
                    Some((Designation::G1(set), used)) => {
                        g1 = set;
                        i += used;
                    },
                    None => {
                        if let Some(c) = fail(format!("Invalid MARC-8 escape sequence at byte {}", i - 1))? {
                            out.push(c);
                        }
                    },
                }
                continue;
            },
            0x20..=0x7E => graphic(g0, byte | 0x80, byte).map_or_else(
                |set| fail(format!("Unsupported MARC-8 character set {set:#04x}")),
                |c| Ok(Some(c)),
            )?,
            0xA1..=0xFE => graphic(g1, byte, byte & 0x7F).map_or_else(
                |set| fail(format!("Unsupported MARC-8 character set {set:#04x}")),
                |c| Ok(Some(c)),
            )?,
            0x00..=0x1F => Some(byte as char),
            0x88 => Some('\u{98}'),
            0x89 => Some('\u{9C}'),
            0x8D => Some('\u{200D}'),
            0x8E => Some('\u{200C}'),
            _ => fail(format!("Byte {byte:#04x} is not valid MARC-8"))?,
        };

        if let Some(c) = decoded {
            if is_combining(c) {
                pending_marks.push(c);
            } else {
                out.push(c);
                out.extend(pending_marks.drain(..));
            }
        }
    }

    out.extend(pending_marks);
    Ok(out)
}

/// Map a graphic byte through the active set.
///
/// `high` is the byte in the 0xA1-0xFE range, `low` the same position in the
/// 0x21-0x7E range. Returns the unsupported set's final byte on failure.
fn graphic(set: CharacterSet, high: u8, low: u8) -> std::result::Result<char, u8> {
    match set {
        CharacterSet::BasicLatin => Ok(low as char),
        CharacterSet::ExtendedLatin => {
            if low == 0x20 {
                Ok(' ')
            } else {
                ansel_to_unicode(high).ok_or(high)
            }
        },
        CharacterSet::Unsupported(final_byte) => Err(final_byte),
    }
}

#[derive(Debug, Clone, Copy)]
enum Designation {
    G0(CharacterSet),
    G1(CharacterSet),
}

/// Parse the bytes following ESC. Returns the designation and bytes consumed.
fn parse_escape(rest: &[u8]) -> Option<(Designation, usize)> {
    let first = *rest.first()?;
    match first {
        b's' => Some((Designation::G0(CharacterSet::BasicLatin), 1)),
        b'g' | b'b' | b'p' => Some((Designation::G0(CharacterSet::Unsupported(first)), 1)),
        b'(' | b',' => final_set(&rest[1..]).map(|(set, used)| (Designation::G0(set), used + 1)),
        b')' | b'-' => final_set(&rest[1..]).map(|(set, used)| (Designation::G1(set), used + 1)),
        b'$' => {
            // multibyte (EACC) designations, optionally with an intermediate
            let skip = usize::from(matches!(rest.get(1), Some(b'(' | b',' | b')' | b'-')));
            let final_byte = *rest.get(1 + skip)?;
            let set = CharacterSet::Unsupported(final_byte);
            if matches!(rest.get(1), Some(b')' | b'-')) {
                Some((Designation::G1(set), 2 + skip))
            } else {
                Some((Designation::G0(set), 2 + skip))
            }
        },
        _ => None,
    }
}

fn final_set(rest: &[u8]) -> Option<(CharacterSet, usize)> {
    match *rest.first()? {
        b'B' => Some((CharacterSet::BasicLatin, 1)),
        b'E' => Some((CharacterSet::ExtendedLatin, 1)),
        b'!' => match rest.get(1)? {
            b'E' => Some((CharacterSet::ExtendedLatin, 2)),
            other => Some((CharacterSet::Unsupported(*other), 2)),
        },
        other => Some((CharacterSet::Unsupported(other), 1)),
    }
}

fn is_combining(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}' | '\u{FE20}'..='\u{FE23}')
}

/// ANSEL (Extended Latin) graphic characters, high-byte form.
fn ansel_to_unicode(byte: u8) -> Option<char> {
    let c = match byte {
        0xA1 => '\u{0141}',
        0xA2 => '\u{00D8}',
        0xA3 => '\u{0110}',
        0xA4 => '\u{00DE}',
        0xA5 => '\u{00C6}',
        0xA6 => '\u{0152}',
        0xA7 => '\u{02B9}',
        0xA8 => '\u{00B7}',
        0xA9 => '\u{266D}',
        0xAA => '\u{00AE}',
        0xAB => '\u{00B1}',
        0xAC => '\u{01A0}',
        0xAD => '\u{01AF}',
        0xAE => '\u{02BC}',
        0xB0 => '\u{02BB}',
        0xB1 => '\u{0142}',
        0xB2 => '\u{00F8}',
        0xB3 => '\u{0111}',
        0xB4 => '\u{00FE}',
        0xB5 => '\u{00E6}',
        0xB6 => '\u{0153}',
        0xB7 => '\u{02BA}',
        0xB8 => '\u{0131}',
        0xB9 => '\u{00A3}',
        0xBA => '\u{00F0}',
        0xBC => '\u{01A1}',
        0xBD => '\u{01B0}',
        0xC0 => '\u{00B0}',
        0xC1 => '\u{2113}',
        0xC2 => '\u{2117}',
        0xC3 => '\u{00A9}',
        0xC4 => '\u{266F}',
        0xC5 => '\u{00BF}',
        0xC6 => '\u{00A1}',
        0xC7 => '\u{00DF}',
        0xC8 => '\u{20AC}',
        // combining diacritics
        0xE0 => '\u{0309}',
        0xE1 => '\u{0300}',
        0xE2 => '\u{0301}',
        0xE3 => '\u{0302}',
        0xE4 => '\u{0303}',
        0xE5 => '\u{0304}',
        0xE6 => '\u{0306}',
        0xE7 => '\u{0307}',
        0xE8 => '\u{0308}',
        0xE9 => '\u{030C}',
        0xEA => '\u{030A}',
        0xEB => '\u{FE20}',
        0xEC => '\u{FE21}',
        0xED => '\u{0315}',
        0xEE => '\u{030B}',
        0xEF => '\u{0310}',
        0xF0 => '\u{0327}',
        0xF1 => '\u{0328}',
        0xF2 => '\u{0323}',
        0xF3 => '\u{0324}',
        0xF4 => '\u{0325}',
        0xF5 => '\u{0333}',
        0xF6 => '\u{0332}',
        0xF7 => '\u{0326}',
        0xF8 => '\u{031C}',
        0xF9 => '\u{032E}',
        0xFA => '\u{FE22}',
        0xFB => '\u{FE23}',
        0xFE => '\u{0313}',
        _ => return None,
    };
    Some(c)
}
