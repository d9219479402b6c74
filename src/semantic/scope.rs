//! Lexical scope tree
//!
//! Scopes form a tree isomorphic to the nesting of crate root, impl blocks,
//! block expressions and match arms. The symbol collector builds the whole
//! tree in one pass and stores each scope's [`ScopeId`] on the owning AST
//! node, so the later passes re-enter a scope by dereferencing the stored
//! handle rather than replaying the traversal order that created it.

use crate::diagnostics::Span;
use crate::semantic::errors::{SemanticError, SemanticErrorKind};
use crate::semantic::types::{ConstValue, FunctionSig, TypeArena, TypeId, TypeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Handle to a scope in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

/// What kind of thing a name is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    /// A builtin type name
    Type,
    Constant,
    Enumeration,
    Struct,
}

/// A name binding
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: TypeId,
    pub kind: SymbolKind,
    pub is_mutable: bool,
    /// Whether the symbol is a compile-time constant of integer type
    pub is_const: bool,
    /// Whether the binding has been given a value yet; `let x: T;` starts
    /// unassigned and admits exactly one assignment even when immutable
    pub is_assigned: bool,
    pub span: Span,
}

impl Symbol {
    pub fn new(name: impl Into<String>, ty: TypeId, kind: SymbolKind, span: Span) -> Self {
        Self {
            name: name.into(),
            ty,
            kind,
            is_mutable: false,
            is_const: false,
            is_assigned: true,
            span,
        }
    }

    pub fn mutable(mut self, is_mutable: bool) -> Self {
        self.is_mutable = is_mutable;
        self
    }

    pub fn constant(mut self, is_const: bool) -> Self {
        self.is_const = is_const;
        self
    }

    pub fn assigned(mut self, is_assigned: bool) -> Self {
        self.is_assigned = is_assigned;
        self
    }
}

/// One lexical scope
#[derive(Debug, Default)]
pub struct Scope {
    pub symbols: HashMap<String, Symbol>,
    /// Evaluated values of constants declared in this scope
    pub constants: HashMap<String, ConstValue>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
}

/// The scope tree for one compilation unit
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    /// The root scope handle
    pub const ROOT: ScopeId = ScopeId(0);

    /// Create a tree containing only the root scope, with the builtin
    /// primitive types and runtime functions pre-registered
    pub fn new(types: &mut TypeArena) -> Self {
        let mut tree = Self {
            scopes: vec![Scope::default()],
        };
        tree.register_builtins(types);
        tree
    }

    fn register_builtins(&mut self, types: &mut TypeArena) {
        for name in [
            "i32", "u32", "isize", "usize", "bool", "char", "string", "cstring", "void", "never",
        ] {
            let ty = types.primitive(name);
            self.declare_builtin(Symbol::new(name, ty, SymbolKind::Type, Span::default()));
        }

        let i32_ty = types.primitive("i32");
        let u32_ty = types.primitive("u32");
        let usize_ty = types.primitive("usize");
        let string_ty = types.primitive("string");
        let void_ty = types.primitive("void");

        let builtins: [(&str, Vec<TypeId>, TypeId); 7] = [
            ("print", vec![string_ty], void_ty),
            ("println", vec![string_ty], void_ty),
            ("print_int", vec![i32_ty], void_ty),
            ("println_int", vec![i32_ty], void_ty),
            ("get_string", vec![], string_ty),
            ("get_int", vec![], i32_ty),
            ("exit", vec![i32_ty], void_ty),
        ];
        for (name, params, ret) in builtins {
            let fn_ty = types.alloc(TypeKind::Function(FunctionSig::free(params, ret)));
            self.declare_builtin(Symbol::new(name, fn_ty, SymbolKind::Function, Span::default()));
        }

        let to_string = types.alloc(TypeKind::Function(FunctionSig {
            params: vec![],
            ret: string_ty,
            has_receiver: true,
            receiver_is_ref: true,
            receiver_is_mut: false,
        }));
        types.add_method(i32_ty, "to_string", to_string);
        let to_string_u32 = types.alloc(TypeKind::Function(FunctionSig {
            params: vec![],
            ret: string_ty,
            has_receiver: true,
            receiver_is_ref: true,
            receiver_is_mut: false,
        }));
        types.add_method(u32_ty, "to_string", to_string_u32);
        let len = types.alloc(TypeKind::Function(FunctionSig {
            params: vec![],
            ret: usize_ty,
            has_receiver: true,
            receiver_is_ref: true,
            receiver_is_mut: false,
        }));
        types.add_method(string_ty, "len", len);
    }

    fn declare_builtin(&mut self, symbol: Symbol) {
        self.scopes[0].symbols.insert(symbol.name.clone(), symbol);
    }

    /// Append a new child scope and return its handle
    pub fn add_child(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            ..Scope::default()
        });
        self.scopes[parent.0 as usize].children.push(id);
        id
    }

    fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    /// Insert a symbol into the given scope
    ///
    /// Fails with `DuplicateDefinition` when the name is already bound in
    /// that scope, unless `allow_shadow` is set (used only for controlled
    /// re-declaration of builtins).
    pub fn declare(
        &mut self,
        scope: ScopeId,
        symbol: Symbol,
        allow_shadow: bool,
    ) -> Result<(), SemanticError> {
        let table = &mut self.scope_mut(scope).symbols;
        if !allow_shadow && table.contains_key(&symbol.name) {
            return Err(SemanticError::new(
                SemanticErrorKind::DuplicateDefinition(symbol.name.clone()),
                symbol.span,
            ));
        }
        table.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Find the nearest binding for a name, searching outward to the root
    pub fn lookup(&self, from: ScopeId, name: &str) -> Option<&Symbol> {
        let mut current = Some(from);
        while let Some(id) = current {
            if let Some(symbol) = self.scope(id).symbols.get(name) {
                return Some(symbol);
            }
            current = self.scope(id).parent;
        }
        None
    }

    /// Find the scope holding the nearest binding for a name
    pub fn lookup_scope_of(&self, from: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(from);
        while let Some(id) = current {
            if self.scope(id).symbols.contains_key(name) {
                return Some(id);
            }
            current = self.scope(id).parent;
        }
        None
    }

    /// Replace the type of the nearest binding for a name
    ///
    /// Used by the type binder to swap a skeleton type for the fully
    /// resolved one. Missing names are a programming error in the binder, so
    /// this is a no-op rather than a diagnostic.
    pub fn assign_type(&mut self, from: ScopeId, name: &str, ty: TypeId) {
        if let Some(id) = self.lookup_scope_of(from, name) {
            if let Some(symbol) = self.scope_mut(id).symbols.get_mut(name) {
                symbol.ty = ty;
            }
        }
    }

    /// Mark the nearest binding for a name as assigned
    pub fn mark_assigned(&mut self, from: ScopeId, name: &str) {
        if let Some(id) = self.lookup_scope_of(from, name) {
            if let Some(symbol) = self.scope_mut(id).symbols.get_mut(name) {
                symbol.is_assigned = true;
            }
        }
    }

    /// Record the evaluated value of a constant declared in `scope`
    pub fn add_constant(&mut self, scope: ScopeId, name: &str, value: ConstValue) {
        self.scope_mut(scope)
            .constants
            .insert(name.to_string(), value);
    }

    /// Find the value of the nearest constant with the given name
    pub fn lookup_constant(&self, from: ScopeId, name: &str) -> Option<&ConstValue> {
        let mut current = Some(from);
        while let Some(id) = current {
            if let Some(value) = self.scope(id).constants.get(name) {
                return Some(value);
            }
            current = self.scope(id).parent;
        }
        None
    }
}
