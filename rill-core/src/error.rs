use thiserror::Error;

use crate::span::Span;

/// Every failure the pipeline can surface.
///
/// User errors (bad programs) always carry a span. `Internal` marks a
/// pipeline invariant violation (a compiler bug, never a program bug)
/// and is reported with as much context as the offending pass can give.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("lex error: {message}")]
    LexError { message: String, span: Span },
    #[error("parse error: {message}")]
    ParseError { message: String, span: Span },
    #[error("unresolved name `{name}`")]
    UnresolvedName { name: String, span: Span },
    #[error("arity mismatch: expected {expected} argument(s), found {found}")]
    ArityMismatch {
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("cannot construct the infinite type {var} = {ty}")]
    InfiniteType { var: String, ty: String, span: Span },
    #[error("operator `{operator}` is not recognized")]
    InvalidOperator { operator: String, span: Span },
    #[error("{message}")]
    Unsupported { message: String, span: Span },
    #[error("internal compiler invariant violated: {message}")]
    Internal { message: String },
}

impl CoreError {
    /// Span of the offending source, when the error is user-facing.
    pub fn span(&self) -> Option<Span> {
        match self {
            CoreError::LexError { span, .. }
            | CoreError::ParseError { span, .. }
            | CoreError::UnresolvedName { span, .. }
            | CoreError::ArityMismatch { span, .. }
            | CoreError::TypeMismatch { span, .. }
            | CoreError::InfiniteType { span, .. }
            | CoreError::InvalidOperator { span, .. }
            | CoreError::Unsupported { span, .. } => Some(*span),
            CoreError::SourceIo(_) | CoreError::Internal { .. } => None,
        }
    }

    pub fn internal(message: impl Into<String>) -> CoreError {
        CoreError::Internal {
            message: message.into(),
        }
    }
}
