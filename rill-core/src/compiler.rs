//! Pipeline orchestration.
//!
//! Runs source text through the full pipeline: lex/parse into the raw
//! tree, resolve names, check and attach types, then hand the checked
//! tree to the wasm backend. Each pass consumes the previous tree and
//! produces the next generation; a failed pass aborts the pipeline
//! with the first error.

use crate::ast::Program;
use crate::codegen_wasm::emit_program;
use crate::error::CoreError;
use crate::parser::parse;
use crate::resolve::resolve;
use crate::typecheck::typecheck;

/// Result of a successful compilation.
#[derive(Debug, PartialEq, Eq)]
pub struct CompilationArtifact {
    pub wasm: Vec<u8>,
    /// Names of the functions exported from the module, in declaration
    /// order. Duplicated names appear once.
    pub exports: Vec<String>,
}

/// Compile Rill source text to a wasm module.
pub fn compile_wasm(source: &str) -> Result<CompilationArtifact, CoreError> {
    let program = check(source)?;
    let wasm = emit_program(&program)?;

    let mut exports = Vec::new();
    for item in &program.items {
        let name = &item.name.name;
        if !exports.contains(name) {
            exports.push(name.clone());
        }
    }

    Ok(CompilationArtifact { wasm, exports })
}

/// Run the front half of the pipeline only: the returned tree is fully
/// resolved and typed but nothing is emitted.
pub fn check(source: &str) -> Result<Program, CoreError> {
    typecheck(resolve(parse(source)?)?)
}
