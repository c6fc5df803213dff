//! MARC record structures and operations.
//!
//! This module provides the core record types shared by every codec and by the
//! combining reader:
//! - [`Record`] — A bibliographic or holdings record
//! - [`Field`] — Variable data fields (010+)
//! - [`Subfield`] — Named data elements within fields
//!
//! # Examples
//!
//! ```
//! use marc_combiner::{Field, Leader, Record};
//!
//! let record = Record::builder(Leader::default())
//!     .control_field_str("001", "12345")
//!     .field(
//!         Field::builder("245".to_string(), '1', '0')
//!             .subfield_str('a', "Title")
//!             .build(),
//!     )
//!     .build();
//!
//! assert_eq!(record.get_control_field("001"), Some("12345"));
//! ```

use crate::leader::Leader;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A MARC record
///
/// Fields are stored in insertion order using `IndexMap`, grouped per tag.
/// Within a tag, fields keep the order in which they were added; tag groups
/// keep the order in which each tag was first seen, unless a group is placed
/// explicitly with [`Record::insert_fields_before`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record leader (24 bytes)
    pub leader: Leader,
    /// Control fields (000-009) - tag -> value, preserves insertion order
    pub control_fields: IndexMap<String, String>,
    /// Data fields (010+) - tag -> fields, preserves insertion order
    pub fields: IndexMap<String, Vec<Field>>,
}

/// A data field in a MARC record (fields 010 and higher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag (3 characters)
    pub tag: String,
    /// First indicator
    pub indicator1: char,
    /// Second indicator
    pub indicator2: char,
    /// Subfields (stored in `SmallVec` to avoid allocation for typical fields with 4 or fewer subfields)
    pub subfields: SmallVec<[Subfield; 4]>,
}

/// A subfield within a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

/// Whether a tag names a control field (001-009).
#[must_use]
pub fn is_control_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.starts_with("00") && tag.chars().all(|c| c.is_ascii_digit())
}

impl Record {
    /// Create a new MARC record with the given leader
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            control_fields: IndexMap::new(),
            fields: IndexMap::new(),
        }
    }

    /// Create a builder for fluently constructing MARC records
    #[must_use]
    pub fn builder(leader: Leader) -> RecordBuilder {
        RecordBuilder {
            record: Record::new(leader),
        }
    }

    /// Add a control field (000-009)
    pub fn add_control_field(&mut self, tag: String, value: String) {
        self.control_fields.insert(tag, value);
    }

    /// Add a control field using string slices
    pub fn add_control_field_str(&mut self, tag: &str, value: &str) {
        self.add_control_field(tag.to_string(), value.to_string());
    }

    /// Get a control field value
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields.get(tag).map(String::as_str)
    }

    /// Add a data field
    pub fn add_field(&mut self, field: Field) {
        self.fields
            .entry(field.tag.clone())
            .or_default()
            .push(field);
    }

    /// Get all fields with a given tag
    #[must_use]
    pub fn get_fields(&self, tag: &str) -> Option<&[Field]> {
        self.fields.get(tag).map(Vec::as_slice)
    }

    /// Get first field with a given tag
    #[must_use]
    pub fn get_field(&self, tag: &str) -> Option<&Field> {
        self.fields.get(tag).and_then(|v| v.first())
    }

    /// Iterate over all data fields in storage order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values().flat_map(|v| v.iter())
    }

    /// Iterate over fields matching a specific tag
    pub fn fields_by_tag(&self, tag: &str) -> impl Iterator<Item = &Field> {
        self.fields.get(tag).map(|v| v.iter()).into_iter().flatten()
    }

    /// Iterate over all control fields as `(tag, value)` pairs
    pub fn control_fields_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.control_fields
            .iter()
            .map(|(tag, value)| (tag.as_str(), value.as_str()))
    }

    /// Number of data fields in the record
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    /// Position of a tag's group among the data field groups
    #[must_use]
    pub fn tag_position(&self, tag: &str) -> Option<usize> {
        self.fields.get_index_of(tag)
    }

    /// Remove all fields with a given tag
    ///
    /// Returns the removed fields. The relative order of the remaining tag
    /// groups is preserved.
    pub fn remove_fields_by_tag(&mut self, tag: &str) -> Vec<Field> {
        self.fields.shift_remove(tag).unwrap_or_default()
    }

    /// Insert fields sharing one tag immediately before the group of `before_tag`
    ///
    /// If the record already holds fields with that tag, the new fields are
    /// appended to that group where it stands. Otherwise a new group is placed
    /// just before `before_tag`, or at the end when `before_tag` is absent.
    /// Fields whose tag differs from `tag` are added with [`Record::add_field`].
    pub fn insert_fields_before<I>(&mut self, tag: &str, fields: I, before_tag: &str)
    where
        I: IntoIterator<Item = Field>,
    {
        let mut incoming: Vec<Field> = Vec::new();
        for field in fields {
            if field.tag == tag {
                incoming.push(field);
            } else {
                self.add_field(field);
            }
        }
        if incoming.is_empty() {
            return;
        }

        if let Some(existing) = self.fields.get_mut(tag) {
            existing.extend(incoming);
            return;
        }

        match self.fields.get_index_of(before_tag) {
            Some(index) => {
                self.fields.shift_insert(index, tag.to_string(), incoming);
            },
            None => {
                self.fields.insert(tag.to_string(), incoming);
            },
        }
    }

    /// Tags of the data field groups in storage order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Builder for fluently constructing MARC records
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Add a control field to the record being built
    #[must_use]
    pub fn control_field(mut self, tag: String, value: String) -> Self {
        self.record.add_control_field(tag, value);
        self
    }

    /// Add a control field using string slices
    #[must_use]
    pub fn control_field_str(mut self, tag: &str, value: &str) -> Self {
        self.record.add_control_field_str(tag, value);
        self
    }

    /// Add a data field to the record being built
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.record.add_field(field);
        self
    }

    /// Build the record
    #[must_use]
    pub fn build(self) -> Record {
        self.record
    }
}

impl Field {
    /// Create a new data field
    #[must_use]
    pub fn new(tag: String, indicator1: char, indicator2: char) -> Self {
        Field {
            tag,
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Create a builder for constructing fields fluently
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_combiner::Field;
    ///
    /// let field = Field::builder("852".to_string(), '0', ' ')
    ///     .subfield_str('b', "MAIN")
    ///     .subfield_str('h', "QA76.73 .R87")
    ///     .build();
    /// assert_eq!(field.get_subfield('b'), Some("MAIN"));
    /// ```
    #[must_use]
    pub fn builder(tag: String, indicator1: char, indicator2: char) -> FieldBuilder {
        FieldBuilder {
            field: Field::new(tag, indicator1, indicator2),
        }
    }

    /// Add a subfield
    pub fn add_subfield(&mut self, code: char, value: String) {
        self.subfields.push(Subfield { code, value });
    }

    /// Add a subfield using a string slice
    pub fn add_subfield_str(&mut self, code: char, value: &str) {
        self.add_subfield(code, value.to_string());
    }

    /// Get all values for a subfield code
    #[must_use]
    pub fn get_subfield_values(&self, code: char) -> Vec<&str> {
        self.subfields_by_code(code).collect()
    }

    /// Get first value for a subfield code
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Iterate over all subfields
    pub fn subfields(&self) -> impl Iterator<Item = &Subfield> {
        self.subfields.iter()
    }

    /// Iterate over subfield values with a specific code
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Get the field's content as a string
    ///
    /// Concatenates all subfield values with spaces.
    #[must_use]
    pub fn value(&self) -> String {
        self.subfields
            .iter()
            .map(|sf| sf.value.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Iterate mutably over subfields
    pub fn subfields_mut(&mut self) -> impl Iterator<Item = &mut Subfield> {
        self.subfields.iter_mut()
    }
}

/// Builder for fluently constructing fields
#[derive(Debug)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Add a subfield to the field being built
    #[must_use]
    pub fn subfield(mut self, code: char, value: String) -> Self {
        self.field.add_subfield(code, value);
        self
    }

    /// Add a subfield using a string slice
    #[must_use]
    pub fn subfield_str(mut self, code: char, value: &str) -> Self {
        self.field.add_subfield_str(code, value);
        self
    }

    /// Build the field
    #[must_use]
    pub fn build(self) -> Field {
        self.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_leader() -> Leader {
        Leader {
            record_length: 1000,
            record_status: 'a',
            record_type: 'a',
            bibliographic_level: 'm',
            control_record_type: 'a',
            character_coding: ' ',
            indicator_count: 2,
            subfield_code_count: 2,
            data_base_address: 100,
            encoding_level: ' ',
            cataloging_form: ' ',
            multipart_level: ' ',
            reserved: "4500".to_string(),
        }
    }

    fn field(tag: &str, value: &str) -> Field {
        Field::builder(tag.to_string(), ' ', ' ')
            .subfield_str('a', value)
            .build()
    }

    #[test]
    fn test_record_creation() {
        let leader = make_leader();
        let record = Record::new(leader.clone());
        assert_eq!(record.leader, leader);
        assert!(record.control_fields.is_empty());
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_add_control_field() {
        let mut record = Record::new(make_leader());

        record.add_control_field("001".to_string(), "12345".to_string());
        assert_eq!(record.get_control_field("001"), Some("12345"));
    }

    #[test]
    fn test_field_subfields() {
        let mut field = Field::new("245".to_string(), '1', '0');
        field.add_subfield('a', "Title".to_string());
        field.add_subfield('c', "Author".to_string());
        field.add_subfield('a', "Title continued".to_string());

        assert_eq!(field.get_subfield('a'), Some("Title"));
        assert_eq!(field.get_subfield_values('a').len(), 2);
        assert_eq!(field.value(), "Title Author Title continued");
    }

    #[test]
    fn test_multiple_fields_same_tag() {
        let mut record = Record::new(make_leader());

        for i in 0..3 {
            record.add_field(field("650", &format!("Subject {i}")));
        }

        assert_eq!(record.get_fields("650").unwrap().len(), 3);
        assert_eq!(record.field_count(), 3);
    }

    #[test]
    fn test_remove_fields_by_tag_keeps_group_order() {
        let mut record = Record::new(make_leader());
        record.add_field(field("245", "Title"));
        record.add_field(field("852", "Bib location"));
        record.add_field(field("999", "Item"));

        let removed = record.remove_fields_by_tag("852");
        assert_eq!(removed.len(), 1);
        assert_eq!(record.tags().collect::<Vec<_>>(), vec!["245", "999"]);
        assert!(record.remove_fields_by_tag("852").is_empty());
    }

    #[test]
    fn test_insert_fields_before_places_new_group() {
        let mut record = Record::new(make_leader());
        record.add_field(field("245", "Title"));
        record.add_field(field("999", "Item"));

        record.insert_fields_before("852", vec![field("852", "H1"), field("852", "H2")], "999");

        assert_eq!(record.tags().collect::<Vec<_>>(), vec!["245", "852", "999"]);
        assert_eq!(record.tag_position("852"), Some(1));
        let values: Vec<_> = record
            .fields_by_tag("852")
            .filter_map(|f| f.get_subfield('a'))
            .collect();
        assert_eq!(values, vec!["H1", "H2"]);
    }

    #[test]
    fn test_insert_fields_before_missing_anchor_appends() {
        let mut record = Record::new(make_leader());
        record.add_field(field("245", "Title"));

        record.insert_fields_before("866", vec![field("866", "v.1-10")], "999");
        assert_eq!(record.tags().collect::<Vec<_>>(), vec!["245", "866"]);
    }

    #[test]
    fn test_insert_fields_before_extends_existing_group() {
        let mut record = Record::new(make_leader());
        record.add_field(field("852", "H1"));
        record.add_field(field("999", "Item"));

        record.insert_fields_before("852", vec![field("852", "H2")], "999");
        assert_eq!(record.get_fields("852").unwrap().len(), 2);
        assert_eq!(record.tags().collect::<Vec<_>>(), vec!["852", "999"]);
    }

    #[test]
    fn test_is_control_tag() {
        assert!(is_control_tag("001"));
        assert!(is_control_tag("008"));
        assert!(!is_control_tag("010"));
        assert!(!is_control_tag("LDR"));
        assert!(!is_control_tag("00"));
    }
}
