//! Byte-offset source spans.
//!
//! Every tree node carries a `Span` so that any pass can report an
//! error against the original source without keeping a reference to
//! the text itself.

/// Half-open byte range `[start, end)` into the source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Sentinel used for end-of-input errors, where no token exists
    /// to point at.
    pub const EOF: Span = Span {
        start: u32::MAX,
        end: u32::MAX,
    };

    pub fn new(start: u32, end: u32) -> Span {
        Span { start, end }
    }

    pub fn is_eof(self) -> bool {
        self == Span::EOF
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        if self.is_eof() {
            return other;
        }
        if other.is_eof() {
            return self;
        }
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_overlapping_spans() {
        let merged = Span::new(2, 5).merge(Span::new(4, 9));
        assert_eq!(merged, Span::new(2, 9));
    }

    #[test]
    fn merge_ignores_eof_sentinel() {
        let span = Span::new(1, 3);
        assert_eq!(span.merge(Span::EOF), span);
        assert_eq!(Span::EOF.merge(span), span);
    }
}
