//! Semantic analysis for Rill
//!
//! The analyzer runs four passes over the AST, strictly in order, each a
//! full tree traversal:
//!
//! 1. [`collect`] builds the scope tree and registers skeleton symbols so
//!    forward references resolve.
//! 2. [`bind`] resolves struct field lists, function signatures and impl
//!    member tables against the skeletons.
//! 3. [`const_eval`] folds compile-time constant expressions bottom-up.
//! 4. [`check`] computes candidate type sets for every expression and
//!    enforces the static rules.
//!
//! Passes cannot be interleaved: each depends on bindings the previous pass
//! committed. The first rule violation aborts the current pass with a
//! [`SemanticError`]. After pass 4 the AST, scope tree and type arena are
//! read-only inputs to IR construction.

mod bind;
mod check;
mod collect;
mod const_eval;
mod errors;
mod scope;
mod types;

#[cfg(test)]
mod tests;

pub use errors::{SemanticError, SemanticErrorKind};
pub use scope::{Scope, ScopeId, ScopeTree, Symbol, SymbolKind};
pub use types::{
    ConstValue, FunctionSig, StructMember, TypeArena, TypeData, TypeId, TypeKind,
    INTEGER_PRIMITIVES,
};

use crate::parser::ast::{Crate, TypeNode, TypeNodeKind};

/// Everything the analyzer produced besides the annotated AST
#[derive(Debug)]
pub struct Analysis {
    pub scopes: ScopeTree,
    pub types: TypeArena,
}

/// Run all four passes over a crate, annotating it in place
pub fn analyze(krate: &mut Crate) -> Result<Analysis, SemanticError> {
    let mut types = TypeArena::new();
    let mut scopes = ScopeTree::new(&mut types);

    collect::SymbolCollector::new(&mut scopes, &mut types).run(krate)?;
    bind::TypeBinder::new(&mut scopes, &mut types).run(krate)?;
    const_eval::ConstEvaluator::new(&mut scopes, &mut types).run(krate)?;
    check::TypeChecker::new(&mut scopes, &mut types).run(krate)?;

    Ok(Analysis { scopes, types })
}

/// Resolve a syntactic type to a semantic one, writing the result into the
/// node's `resolved` slot
///
/// Array lengths are taken from the length expression's annotations when
/// pass 3 has already folded it, and from a literal fold otherwise; a length
/// that is neither is `NotConstEvaluable`.
pub(crate) fn resolve_type_node(
    scopes: &ScopeTree,
    types: &mut TypeArena,
    scope: ScopeId,
    node: &mut TypeNode,
) -> Result<TypeId, SemanticError> {
    let resolved = match &mut node.kind {
        TypeNodeKind::Path(name) => match scopes.lookup(scope, name) {
            Some(symbol) => symbol.ty,
            None => {
                return Err(SemanticError::new(
                    SemanticErrorKind::UndeclaredName(name.clone()),
                    node.span,
                ))
            }
        },
        TypeNodeKind::Unit => types.primitive("void"),
        TypeNodeKind::Tuple(elems) => {
            let mut ids = Vec::with_capacity(elems.len());
            for elem in elems {
                ids.push(resolve_type_node(scopes, types, scope, elem)?);
            }
            types.alloc(TypeKind::Tuple(ids))
        }
        TypeNodeKind::Array { elem, len } => {
            let elem_ty = resolve_type_node(scopes, types, scope, elem)?;
            if !len.is_compiler_known {
                const_eval::fold_pure(len);
            }
            let size = len
                .constant_value
                .as_ref()
                .and_then(|v| v.as_integer())
                .filter(|v| (0..=u32::MAX as i64).contains(v))
                .ok_or_else(|| {
                    SemanticError::new(SemanticErrorKind::NotConstEvaluable, len.span)
                })?;
            types.alloc(TypeKind::Array {
                elem: elem_ty,
                len: size as u32,
            })
        }
        TypeNodeKind::Slice(elem) => {
            let elem_ty = resolve_type_node(scopes, types, scope, elem)?;
            types.alloc(TypeKind::Slice(elem_ty))
        }
        TypeNodeKind::Reference { inner, is_mut } => {
            let is_mut = *is_mut;
            let inner_ty = resolve_type_node(scopes, types, scope, inner)?;
            types.alloc(TypeKind::Reference {
                inner: inner_ty,
                is_mut,
            })
        }
    };
    node.resolved = Some(resolved);
    Ok(resolved)
}
