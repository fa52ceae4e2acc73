//! User-facing diagnostics.
//!
//! The compiler core only promises a message plus an in-bounds span;
//! locating the offending line and drawing the caret underline lives
//! here so that every front end (CLI, tests) renders failures the
//! same way.

use crate::span::Span;

/// A single reportable message anchored to a source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic {
            message: message.into(),
            span,
        }
    }

    /// Render the diagnostic against its source: the message, the line
    /// covering the span, and a caret underline.
    ///
    /// The `Span::EOF` sentinel points just past the last line.
    pub fn render(&self, source: &str) -> String {
        let (start, end) = if self.span.is_eof() {
            (source.len(), source.len())
        } else {
            (
                (self.span.start as usize).min(source.len()),
                (self.span.end as usize).min(source.len()),
            )
        };

        let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = source[start..]
            .find('\n')
            .map_or(source.len(), |i| start + i);
        let line_number = source[..start].matches('\n').count() + 1;
        let line = &source[line_start..line_end];

        let column = start - line_start;
        let width = end.saturating_sub(start).max(1).min(line.len().saturating_sub(column).max(1));

        let mut out = String::new();
        out.push_str(&format!("error: {}\n", self.message));
        out.push_str(&format!("  --> line {line_number}\n"));
        out.push_str(&format!("   | {line}\n"));
        out.push_str(&format!("   | {}{}\n", " ".repeat(column), "^".repeat(width)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_caret_under_span() {
        let source = "function f() = x\n";
        let diag = Diagnostic::error("unresolved name `x`", Span::new(15, 16));
        let rendered = diag.render(source);
        assert!(rendered.contains("error: unresolved name `x`"));
        assert!(rendered.contains("line 1"));
        assert!(rendered.contains("               ^"));
    }

    #[test]
    fn renders_eof_sentinel_past_last_line() {
        let source = "function f() =";
        let diag = Diagnostic::error("unexpected end of input", Span::EOF);
        let rendered = diag.render(source);
        assert!(rendered.contains("unexpected end of input"));
        assert!(rendered.contains("function f() ="));
    }
}
