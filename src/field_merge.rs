//! Field merge policy used when combining records.
//!
//! [`merge_fields`] replaces a set of tags in the target with the instances
//! found in a source record; [`append_fields`] adds the source's instances
//! without removing anything. Both place new tag groups immediately before
//! an insertion tag so that the merged record keeps a stable field layout.
//! Neither touches the source record.

use crate::error::{MarcError, Result};
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered set of field tags.
///
/// Parsed from `"852|853|863"`, `"852,853"` or whitespace separated lists.
/// In serde form it accepts either that string or an array of tags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "TagSetRepr", into = "Vec<String>")]
pub struct TagSet {
    tags: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagSetRepr {
    List(Vec<String>),
    Joined(String),
}

impl TryFrom<TagSetRepr> for TagSet {
    type Error = MarcError;

    fn try_from(repr: TagSetRepr) -> Result<Self> {
        match repr {
            TagSetRepr::Joined(s) => s.parse(),
            TagSetRepr::List(tags) => TagSet::from_tags(tags),
        }
    }
}

impl From<TagSet> for Vec<String> {
    fn from(set: TagSet) -> Self {
        set.tags
    }
}

impl TagSet {
    /// Build a tag set, dropping duplicates while keeping first-seen order
    ///
    /// # Errors
    ///
    /// Returns an error if a tag is not three characters long.
    pub fn from_tags<I, S>(tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = TagSet::default();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if tag.is_empty() {
                continue;
            }
            if tag.len() != 3 || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(MarcError::Config(format!("Invalid field tag '{tag}'")));
            }
            if !set.contains(tag) {
                set.tags.push(tag.to_string());
            }
        }
        Ok(set)
    }

    /// Whether `tag` is in the set
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Iterate over the tags in configured order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Number of tags
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromStr for TagSet {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        TagSet::from_tags(s.split(|c: char| c == '|' || c == ',' || c.is_whitespace()))
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tags.join("|"))
    }
}

/// Counts of fields touched by a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Fields removed from the target
    pub removed: usize,
    /// Fields copied from the source
    pub added: usize,
}

/// Replace the target's instances of `tags` with the source's instances.
///
/// Every target field whose tag is in `tags` is removed first (removing
/// nothing is fine). Then every source field whose tag is in `tags` is copied,
/// keeping source order, immediately before the `insert_before` group of the
/// target, or at the end when the target has no such group.
pub fn merge_fields(
    target: &mut Record,
    source: &Record,
    tags: &TagSet,
    insert_before: &str,
) -> MergeOutcome {
    let mut removed = 0;
    for tag in tags.iter() {
        removed += target.remove_fields_by_tag(tag).len();
    }
    let added = copy_fields(target, source, tags, insert_before);
    MergeOutcome { removed, added }
}

/// Copy the source's instances of `tags` into the target without removing any.
///
/// Tags the target already holds grow in place; new tags are placed as in
/// [`merge_fields`].
pub fn append_fields(
    target: &mut Record,
    source: &Record,
    tags: &TagSet,
    insert_before: &str,
) -> MergeOutcome {
    MergeOutcome {
        removed: 0,
        added: copy_fields(target, source, tags, insert_before),
    }
}

/// Copy tag groups in the order the source first shows them.
fn copy_fields(target: &mut Record, source: &Record, tags: &TagSet, insert_before: &str) -> usize {
    let mut added = 0;
    for (tag, fields) in &source.fields {
        if !tags.contains(tag) || fields.is_empty() {
            continue;
        }
        added += fields.len();
        target.insert_fields_before(tag, fields.iter().cloned(), insert_before);
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leader::Leader;
    use crate::record::Field;

    fn field(tag: &str, value: &str) -> Field {
        Field::builder(tag.to_string(), ' ', ' ')
            .subfield_str('a', value)
            .build()
    }

    fn values(record: &Record, tag: &str) -> Vec<String> {
        record
            .fields_by_tag(tag)
            .filter_map(|f| f.get_subfield('a'))
            .map(str::to_string)
            .collect()
    }

    fn bib() -> Record {
        let mut record = Record::new(Leader::default());
        record.add_control_field_str("001", "a1");
        record.add_field(field("245", "Title"));
        record.add_field(field("852", "bib-852"));
        record.add_field(field("999", "item"));
        record
    }

    fn holdings(values: &[(&str, &str)]) -> Record {
        let mut record = Record::new(Leader {
            record_type: 'y',
            ..Leader::default()
        });
        record.add_control_field_str("001", "a1");
        for (tag, value) in values {
            record.add_field(field(tag, value));
        }
        record
    }

    fn mhld_tags() -> TagSet {
        "852|853|863|866|867|868".parse().unwrap()
    }

    #[test]
    fn test_tag_set_parsing() {
        let set: TagSet = "852|853, 863 866".parse().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["852", "853", "863", "866"]);
        assert_eq!(set.to_string(), "852|853|863|866");
        assert!(set.contains("863"));
        assert!(!set.contains("999"));
    }

    #[test]
    fn test_tag_set_dedupes_and_rejects_bad_tags() {
        let set: TagSet = "999|999".parse().unwrap();
        assert_eq!(set.len(), 1);
        assert!("99|852".parse::<TagSet>().is_err());
        assert!("".parse::<TagSet>().unwrap().is_empty());
    }

    #[test]
    fn test_tag_set_serde_forms() {
        let joined: TagSet = serde_json::from_str("\"852|866\"").unwrap();
        let list: TagSet = serde_json::from_str("[\"852\", \"866\"]").unwrap();
        assert_eq!(joined, list);
        assert_eq!(serde_json::to_string(&joined).unwrap(), "[\"852\",\"866\"]");
    }

    #[test]
    fn test_merge_replaces_bib_values() {
        let mut target = bib();
        let source = holdings(&[("852", "H1"), ("866", "v.1-5")]);

        let outcome = merge_fields(&mut target, &source, &mhld_tags(), "999");

        assert_eq!(outcome, MergeOutcome { removed: 1, added: 2 });
        assert_eq!(values(&target, "852"), vec!["H1"]);
        assert_eq!(values(&target, "866"), vec!["v.1-5"]);
        assert_eq!(
            target.tags().collect::<Vec<_>>(),
            vec!["245", "852", "866", "999"]
        );
    }

    #[test]
    fn test_merge_does_not_touch_source() {
        let mut target = bib();
        let source = holdings(&[("852", "H1")]);
        let before = source.clone();

        merge_fields(&mut target, &source, &mhld_tags(), "999");
        assert_eq!(source, before);
    }

    #[test]
    fn test_merge_with_nothing_to_remove() {
        let mut target = Record::new(Leader::default());
        target.add_field(field("245", "Title"));
        let source = holdings(&[("863", "1"), ("863", "2")]);

        let outcome = merge_fields(&mut target, &source, &mhld_tags(), "999");
        assert_eq!(outcome, MergeOutcome { removed: 0, added: 2 });
        assert_eq!(values(&target, "863"), vec!["1", "2"]);
        assert_eq!(target.tags().collect::<Vec<_>>(), vec!["245", "863"]);
    }

    #[test]
    fn test_merge_ignores_tags_outside_set() {
        let mut target = bib();
        let source = holdings(&[("852", "H1"), ("500", "note")]);

        merge_fields(&mut target, &source, &mhld_tags(), "999");
        assert!(target.get_fields("500").is_none());
    }

    #[test]
    fn test_append_accumulates() {
        let mut target = bib();
        merge_fields(
            &mut target,
            &holdings(&[("852", "H1")]),
            &mhld_tags(),
            "999",
        );
        let outcome = append_fields(
            &mut target,
            &holdings(&[("852", "H2"), ("867", "suppl")]),
            &mhld_tags(),
            "999",
        );

        assert_eq!(outcome, MergeOutcome { removed: 0, added: 2 });
        assert_eq!(values(&target, "852"), vec!["H1", "H2"]);
        assert_eq!(values(&target, "867"), vec!["suppl"]);
        assert_eq!(
            target.tags().collect::<Vec<_>>(),
            vec!["245", "852", "867", "999"]
        );
    }
}
