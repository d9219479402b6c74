//! Semantic error type
//!
//! Every rule violation in the analyzer is one of these kinds, carrying the
//! span of the offending node. The first error aborts the enclosing pass;
//! there is no recovery or best-effort continuation, so a pass either fully
//! annotates the tree or reports exactly one error.

use crate::diagnostics::{error_codes::semantic as codes, Diagnostic, Span};
use std::path::Path;
use thiserror::Error;

/// The kinds of semantic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticErrorKind {
    #[error("duplicate definition of `{0}`")]
    DuplicateDefinition(String),

    #[error("use of undeclared name `{0}`")]
    UndeclaredName(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    #[error("expression is not assignable")]
    NotAssignable,

    #[error("cannot assign to immutable binding")]
    NotMutable,

    #[error("expected {expected} argument(s), found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("expression is not a compile-time constant")]
    NotConstEvaluable,

    #[error("`{0}` outside of a loop")]
    BreakOrContinueOutsideLoop(&'static str),

    #[error("no member `{member}` on type `{ty}`")]
    InvalidMemberAccess { member: String, ty: String },

    #[error("cannot index into a value of type `{0}`")]
    InvalidIndexBase(String),
}

impl SemanticErrorKind {
    /// The stable diagnostic code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            SemanticErrorKind::DuplicateDefinition(_) => codes::DUPLICATE_DEFINITION,
            SemanticErrorKind::UndeclaredName(_) => codes::UNDECLARED_NAME,
            SemanticErrorKind::TypeMismatch(_) => codes::TYPE_MISMATCH,
            SemanticErrorKind::InvalidOperand(_) => codes::INVALID_OPERAND,
            SemanticErrorKind::NotAssignable => codes::NOT_ASSIGNABLE,
            SemanticErrorKind::NotMutable => codes::NOT_MUTABLE,
            SemanticErrorKind::ArityMismatch { .. } => codes::ARITY_MISMATCH,
            SemanticErrorKind::NotConstEvaluable => codes::NOT_CONST_EVALUABLE,
            SemanticErrorKind::BreakOrContinueOutsideLoop(_) => codes::BREAK_OUTSIDE_LOOP,
            SemanticErrorKind::InvalidMemberAccess { .. } => codes::INVALID_MEMBER_ACCESS,
            SemanticErrorKind::InvalidIndexBase(_) => codes::INVALID_INDEX_BASE,
        }
    }
}

/// A semantic error at a source position
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub span: Span,
}

impl SemanticError {
    pub fn new(kind: SemanticErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Convert into a renderable diagnostic
    pub fn into_diagnostic(self, file: &Path) -> Diagnostic {
        Diagnostic::error(self.kind.code())
            .message(self.kind.to_string())
            .file(file)
            .span(self.span)
            .build()
    }
}
