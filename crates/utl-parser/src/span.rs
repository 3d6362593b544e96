//! Byte ranges in UTL source text.

use std::{
    fmt,
    ops::{Deref, Range},
};

/// A half-open byte range `[start, end)` into the source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Create a span from a byte range.
    pub fn new(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }

    /// An empty span at `offset`.
    pub fn empty_at(offset: usize) -> Self {
        Self::new(offset..offset)
    }

    /// The start byte offset.
    pub fn start(&self) -> usize {
        self.start
    }

    /// The end byte offset (exclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    /// The length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both `self` and `other`.
    pub fn union(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start)..self.end.max(other.end))
    }

    /// The span as a `Range<usize>`.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::new(range)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A value paired with the span it was read from.
///
/// Equality ignores the span, so two identifiers read from different places
/// compare equal when their text matches.
#[derive(Debug, Clone, Copy)]
pub struct Spanned<T> {
    value: T,
    span: Span,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn inner(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    /// Transform the inner value, keeping the span.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            value: f(self.value),
            span: self.span,
        }
    }
}

impl<T> Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T: PartialEq> PartialEq for Spanned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_basics() {
        let span = Span::new(3..7);
        assert_eq!(span.start(), 3);
        assert_eq!(span.end(), 7);
        assert_eq!(span.len(), 4);
        assert!(!span.is_empty());
        assert!(Span::empty_at(5).is_empty());
        assert_eq!(span.to_string(), "3..7");
    }

    #[test]
    fn test_span_union() {
        let left = Span::new(2..4);
        let right = Span::new(10..12);
        assert_eq!(left.union(right), Span::new(2..12));
        assert_eq!(right.union(left), Span::new(2..12));
    }

    #[test]
    fn test_spanned_equality_ignores_span() {
        let a = Spanned::new("fred", Span::new(0..4));
        let b = Spanned::new("fred", Span::new(10..14));
        assert_eq!(a, b);
        assert_eq!(a.map(str::len).into_inner(), 4);
        assert_eq!(*b, "fred");
    }
}
