//! Byte utilities for key encoding and range queries.

use bytes::{Bytes, BytesMut};
use std::ops::Bound::{self, Excluded, Included, Unbounded};
use std::ops::RangeBounds;

/// Computes the lexicographic successor of a byte sequence.
///
/// Returns the smallest byte sequence that is strictly greater than every
/// sequence starting with `data`, or `None` when the input is empty or made
/// only of `0xFF` bytes.
///
/// - `[0x61]` ("a") → `Some([0x62])` ("b")
/// - `[0x61, 0xFF]` → `Some([0x62])`
/// - `[0xFF]` → `None`
pub fn lex_increment(data: &[u8]) -> Option<Bytes> {
    let mut result = BytesMut::from(data);

    while let Some(last) = result.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return Some(result.freeze());
        }
        result.truncate(result.len() - 1);
    }

    None
}

/// A range over byte sequences, used for key range queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BytesRange {
    pub start: Bound<Bytes>,
    pub end: Bound<Bytes>,
}

impl BytesRange {
    pub fn new(start: Bound<Bytes>, end: Bound<Bytes>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::new(Unbounded, Unbounded)
    }

    /// Creates a range that includes all keys with the given prefix.
    pub fn prefix(prefix: Bytes) -> Self {
        if prefix.is_empty() {
            return Self::unbounded();
        }
        match lex_increment(&prefix) {
            Some(end) => Self::new(Included(prefix), Excluded(end)),
            None => Self::new(Included(prefix), Unbounded),
        }
    }
}

impl RangeBounds<Bytes> for BytesRange {
    fn start_bound(&self) -> Bound<&Bytes> {
        self.start.as_ref()
    }

    fn end_bound(&self) -> Bound<&Bytes> {
        self.end.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(range: &BytesRange, key: &[u8]) -> bool {
        range.contains(&Bytes::copy_from_slice(key))
    }

    #[test]
    fn should_increment_last_byte() {
        assert_eq!(lex_increment(b"a"), Some(Bytes::from_static(b"b")));
        assert_eq!(lex_increment(b"t."), Some(Bytes::from_static(b"t/")));
    }

    #[test]
    fn should_carry_over_trailing_ff() {
        assert_eq!(lex_increment(&[0x61, 0xFF]), Some(Bytes::from_static(&[0x62])));
        assert_eq!(lex_increment(&[0xFF, 0xFF]), None);
        assert_eq!(lex_increment(&[]), None);
    }

    #[test]
    fn should_contain_only_prefixed_keys() {
        // given
        let range = BytesRange::prefix(Bytes::from_static(b"t."));

        // then
        assert!(contains(&range, b"t."));
        assert!(contains(&range, b"t.foo"));
        assert!(!contains(&range, b"t/"));
        assert!(!contains(&range, b"n.foo"));
        assert!(!contains(&range, b"t"));
    }

    #[test]
    fn should_treat_empty_prefix_as_unbounded() {
        let range = BytesRange::prefix(Bytes::new());

        assert_eq!(range, BytesRange::unbounded());
        assert!(contains(&range, b""));
        assert!(contains(&range, &[0xFF, 0xFF]));
    }
}
