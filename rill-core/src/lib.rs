//! Core compiler pipeline for the Rill language.
//!
//! Rill is a small expression language that compiles to WebAssembly.
//! The pipeline is:
//!
//!   source .rill
//!     -> lexer        (tokens)
//!     -> parser       (raw tree)
//!     -> resolve      (De Bruijn locals, item and builtin references)
//!     -> typecheck    (unification, types attached to the tree)
//!     -> codegen_wasm (wasm-encoder)
//!
//! Higher-level tools (CLI, embedders) should depend on this crate
//! rather than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Semantic layers: traversal, types, name resolution, type checking
// ---------------------------------------------------------------------

pub mod fold;
pub mod types;
pub mod resolve;
pub mod typecheck;

// ---------------------------------------------------------------------
// Builtins
// ---------------------------------------------------------------------

pub mod builtins;

// ---------------------------------------------------------------------
// Back-end: printing, code generation, compiler orchestration
// ---------------------------------------------------------------------

pub mod pretty;
pub mod codegen_wasm;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{CompilationArtifact, check, compile_wasm};
pub use diagnostic::Diagnostic;
pub use error::CoreError;
