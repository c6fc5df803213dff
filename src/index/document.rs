//! Record to document conversion.

use super::IndexDocument;
use crate::error::{MarcError, Result};
use crate::field_merge::TagSet;
use crate::identifier::FieldSpec;
use crate::record::Record;

/// Turns a combined record into an index document.
pub trait DocumentBuilder {
    /// Build the document for `record`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be represented, e.g. it has no id.
    fn build(&self, record: &Record) -> Result<IndexDocument>;
}

impl<F> DocumentBuilder for F
where
    F: Fn(&Record) -> Result<IndexDocument>,
{
    fn build(&self, record: &Record) -> Result<IndexDocument> {
        self(record)
    }
}

/// Maps every field to a document field named after its tag.
///
/// Control fields contribute their value; data fields contribute their
/// subfield values joined with spaces.
#[derive(Debug, Clone, Default)]
pub struct FieldValueDocumentBuilder {
    id_field: FieldSpec,
    tags: Option<TagSet>,
}

impl FieldValueDocumentBuilder {
    /// Builder taking document ids from `id_field`.
    #[must_use]
    pub fn new(id_field: FieldSpec) -> Self {
        FieldValueDocumentBuilder {
            id_field,
            tags: None,
        }
    }

    /// Only index the given tags.
    #[must_use]
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = Some(tags);
        self
    }

    fn wanted(&self, tag: &str) -> bool {
        self.tags.as_ref().map_or(true, |tags| tags.contains(tag))
    }
}

impl DocumentBuilder for FieldValueDocumentBuilder {
    fn build(&self, record: &Record) -> Result<IndexDocument> {
        let id = self.id_field.extract(record).ok_or_else(|| {
            MarcError::Index(format!("Record has no identifier in field {}", self.id_field))
        })?;

        let mut document = IndexDocument::new(id);
        for (tag, value) in record.control_fields_iter() {
            if self.wanted(tag) {
                document.add_value(tag, value);
            }
        }
        for field in record.fields() {
            if self.wanted(&field.tag) {
                document.add_value(&field.tag, field.value());
            }
        }
        Ok(document)
    }
}
