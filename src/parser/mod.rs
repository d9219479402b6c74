//! Parser for the Rill programming language
//!
//! This module provides:
//! - Lexer (tokenization)
//! - Parser (AST construction)
//! - AST definitions
//! - Span tracking

pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod span;

pub use ast::Crate;
pub use lexer::Lexer;
pub use parser::Parser;
pub use span::SourceFile;

use crate::diagnostics::{Diagnostic, DiagnosticBag};
use std::path::Path;

/// Parse a source file into an AST
pub fn parse_file(path: &Path) -> Result<Crate, DiagnosticBag> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DiagnosticBag::from(
            Diagnostic::error("E0100")
                .message(format!("could not read file: {}", e))
                .file(path)
                .build(),
        )
    })?;
    parse_source(&content, path)
}

/// Parse source code into an AST
pub fn parse_source(source: &str, path: &Path) -> Result<Crate, DiagnosticBag> {
    let source_file = SourceFile::new(path.to_path_buf(), source.to_string());
    let lexer = Lexer::new(&source_file);
    let mut parser = Parser::new(lexer, &source_file);
    parser.parse_crate()
}

#[cfg(test)]
mod tests;
