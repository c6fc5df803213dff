//! Match identifier extraction.
//!
//! A [`FieldSpec`] names where a record's identifier lives: a control field
//! (`"001"`) or a subfield of a data field (`"035a"`).

use crate::error::{MarcError, Result};
use crate::record::{is_control_tag, Record};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Location of an identifier inside a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldSpec {
    tag: String,
    subfield: Option<char>,
}

fn spec_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9A-Za-z]{3})([0-9a-z])?$").expect("field spec pattern is valid")
    })
}

impl FieldSpec {
    /// Identifier held in a control field
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is not a control tag (001-009).
    pub fn control(tag: &str) -> Result<Self> {
        if !is_control_tag(tag) {
            return Err(MarcError::Config(format!(
                "{tag} is not a control field tag"
            )));
        }
        Ok(FieldSpec {
            tag: tag.to_string(),
            subfield: None,
        })
    }

    /// Identifier held in a subfield of a data field
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is a control tag.
    pub fn data(tag: &str, subfield: char) -> Result<Self> {
        if is_control_tag(tag) || tag.len() != 3 {
            return Err(MarcError::Config(format!("{tag} is not a data field tag")));
        }
        Ok(FieldSpec {
            tag: tag.to_string(),
            subfield: Some(subfield),
        })
    }

    /// Field tag
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Subfield code, for data field specs
    #[must_use]
    pub fn subfield(&self) -> Option<char> {
        self.subfield
    }

    /// Extract the identifier from a record
    ///
    /// Returns the first matching value with surrounding whitespace removed.
    /// An empty value counts as absent.
    #[must_use]
    pub fn extract<'a>(&self, record: &'a Record) -> Option<&'a str> {
        let raw = match self.subfield {
            None => record.get_control_field(&self.tag),
            Some(code) => record
                .fields_by_tag(&self.tag)
                .find_map(|field| field.get_subfield(code)),
        }?;
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

impl Default for FieldSpec {
    fn default() -> Self {
        FieldSpec {
            tag: "001".to_string(),
            subfield: None,
        }
    }
}

impl FromStr for FieldSpec {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let captures = spec_pattern()
            .captures(trimmed)
            .ok_or_else(|| MarcError::Config(format!("Invalid identifier field spec: '{s}'")))?;
        let tag = &captures[1];
        match captures.get(2).and_then(|m| m.as_str().chars().next()) {
            None => FieldSpec::control(tag),
            Some(code) => FieldSpec::data(tag, code),
        }
    }
}

impl TryFrom<String> for FieldSpec {
    type Error = MarcError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FieldSpec> for String {
    fn from(spec: FieldSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subfield {
            Some(code) => write!(f, "{}{code}", self.tag),
            None => f.write_str(&self.tag),
        }
    }
}
