//! Natural (numeric-aware) ordering of record identifiers.
//!
//! Identifiers are split into alternating runs of digits and non-digits.
//! Non-digit runs compare as strings, digit runs compare by numeric value of
//! any length, so `"a9" < "a10"` and `"u900" < "u1000"`.
//!
//! The combining reader uses this only to tell forward progress from a
//! backwards step in the input; it never reorders records.
//!
//! ```
//! use marc_combiner::natural_order::compare_natural;
//! use std::cmp::Ordering;
//!
//! assert_eq!(compare_natural("a9", "a10"), Ordering::Less);
//! assert_eq!(compare_natural("ocm100", "ocm20"), Ordering::Greater);
//! ```

use std::cmp::Ordering;

/// Compare two identifiers in natural order.
///
/// When every run compares equal (for example `"a01"` and `"a1"`), the whole
/// strings are compared lexicographically, so the result is `Equal` only for
/// identical strings.
#[must_use]
pub fn compare_natural(a: &str, b: &str) -> Ordering {
    let mut left = Runs::new(a);
    let mut right = Runs::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = match (l.numeric, r.numeric) {
                    (true, true) => compare_digit_runs(l.text, r.text),
                    _ => l.text.cmp(r.text),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            },
        }
    }
}

/// Sort key wrapper giving a string natural [`Ord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaturalKey<'a>(pub &'a str);

impl PartialOrd for NaturalKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NaturalKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_natural(self.0, other.0)
    }
}

/// Compare two ASCII digit runs by value without overflow.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, Copy)]
struct Run<'a> {
    text: &'a str,
    numeric: bool,
}

/// Iterator over the alternating digit / non-digit runs of a string.
#[derive(Debug)]
struct Runs<'a> {
    rest: &'a str,
}

impl<'a> Runs<'a> {
    fn new(s: &'a str) -> Self {
        Runs { rest: s }
    }
}

impl<'a> Iterator for Runs<'a> {
    type Item = Run<'a>;

    fn next(&mut self) -> Option<Run<'a>> {
        let first = self.rest.chars().next()?;
        let numeric = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != numeric)
            .map_or(self.rest.len(), |(i, _)| i);
        let (text, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(Run { text, numeric })
    }
}
