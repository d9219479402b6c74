//! Pass 2: type binding
//!
//! Fills in the skeletons pass 1 registered. Struct symbols get their member
//! lists, function symbols their parameter and return types, and impl blocks
//! their method, associated-function and associated-constant tables. Items
//! nested in blocks are bound the same way when the walk reaches their
//! block. Duplicate member names within one impl, and duplicate field names
//! within one struct, fail with `DuplicateDefinition`.

use crate::parser::ast::*;
use crate::semantic::errors::{SemanticError, SemanticErrorKind};
use crate::semantic::resolve_type_node;
use crate::semantic::scope::{ScopeId, ScopeTree, Symbol};
use crate::semantic::types::{FunctionSig, StructMember, TypeArena, TypeId, TypeKind};

pub struct TypeBinder<'a> {
    scopes: &'a mut ScopeTree,
    types: &'a mut TypeArena,
}

impl<'a> TypeBinder<'a> {
    pub fn new(scopes: &'a mut ScopeTree, types: &'a mut TypeArena) -> Self {
        Self { scopes, types }
    }

    pub fn run(&mut self, krate: &mut Crate) -> Result<(), SemanticError> {
        for item in &mut krate.items {
            self.bind_item(item, ScopeTree::ROOT)?;
        }
        // Second sweep for the bodies, now that every top-level signature is
        // known
        for item in &mut krate.items {
            self.walk_item(item, ScopeTree::ROOT)?;
        }
        Ok(())
    }

    fn resolve(&mut self, scope: ScopeId, node: &mut TypeNode) -> Result<TypeId, SemanticError> {
        resolve_type_node(self.scopes, self.types, scope, node)
    }

    /// Bind one item's declared surface (not its body)
    fn bind_item(&mut self, item: &mut Item, scope: ScopeId) -> Result<(), SemanticError> {
        match item {
            Item::Struct(s) => self.bind_struct(s, scope),
            Item::Function(f) => {
                let fn_ty = self.bind_signature(f, scope)?;
                self.scopes.assign_type(scope, &f.name, fn_ty);
                Ok(())
            }
            Item::Const(c) => {
                let ty = self.resolve(scope, &mut c.ty)?;
                self.scopes.assign_type(scope, &c.name, ty);
                Ok(())
            }
            // Enumerations were complete after pass 1
            Item::Enum(_) => Ok(()),
            Item::Impl(i) => self.bind_impl(i),
            Item::Trait(_) => Ok(()),
        }
    }

    fn bind_struct(&mut self, s: &mut StructItem, scope: ScopeId) -> Result<(), SemanticError> {
        let mut members: Vec<StructMember> = Vec::with_capacity(s.fields.len());
        for field in &mut s.fields {
            if members.iter().any(|m| m.name == field.name) {
                return Err(SemanticError::new(
                    SemanticErrorKind::DuplicateDefinition(field.name.clone()),
                    field.span,
                ));
            }
            let ty = self.resolve(scope, &mut field.ty)?;
            members.push(StructMember {
                name: field.name.clone(),
                ty,
            });
        }
        let Some(symbol) = self.scopes.lookup(scope, &s.name) else {
            return Err(SemanticError::new(
                SemanticErrorKind::UndeclaredName(s.name.clone()),
                s.span,
            ));
        };
        self.types.refine(
            symbol.ty,
            TypeKind::Struct {
                name: s.name.clone(),
                members,
            },
        );
        Ok(())
    }

    /// Resolve a function's parameter and return types into a signature
    fn bind_signature(
        &mut self,
        f: &mut FunctionItem,
        scope: ScopeId,
    ) -> Result<TypeId, SemanticError> {
        let mut params = Vec::with_capacity(f.params.len());
        for param in &mut f.params {
            params.push(self.resolve(scope, &mut param.ty)?);
        }
        let ret = match &mut f.ret {
            Some(node) => self.resolve(scope, node)?,
            None => self.types.primitive("void"),
        };
        let (has_receiver, receiver_is_ref, receiver_is_mut) = match &f.self_param {
            Some(sp) => (true, sp.is_ref, sp.is_mut),
            None => (false, false, false),
        };
        let sig = FunctionSig {
            params,
            ret,
            has_receiver,
            receiver_is_ref,
            receiver_is_mut,
        };
        // Refine the skeleton in place when one exists, so every earlier
        // reference to the symbol's type sees the real signature
        if let Some(symbol) = self.scopes.lookup(scope, &f.name) {
            if matches!(self.types.kind(symbol.ty), TypeKind::Function(_)) {
                let id = symbol.ty;
                self.types.refine(id, TypeKind::Function(sig));
                return Ok(id);
            }
        }
        Ok(self.types.alloc(TypeKind::Function(sig)))
    }

    fn bind_impl(&mut self, i: &mut ImplItem) -> Result<(), SemanticError> {
        let scope = i.scope.ok_or_else(|| {
            SemanticError::new(
                SemanticErrorKind::UndeclaredName(i.target_name.clone()),
                i.span,
            )
        })?;
        let Some(target) = self.scopes.lookup(scope, &i.target_name) else {
            return Err(SemanticError::new(
                SemanticErrorKind::UndeclaredName(i.target_name.clone()),
                i.span,
            ));
        };
        let target_ty = target.ty;
        let target_kind = target.kind;
        // `Self` aliases the implemented type inside the impl
        self.scopes.declare(
            scope,
            Symbol::new("Self", target_ty, target_kind, i.span),
            true,
        )?;

        for assoc in &mut i.items {
            match assoc {
                AssocItem::Const(c) => {
                    let ty = self.resolve(scope, &mut c.ty)?;
                    if !self.types.get_mut(target_ty).name_set.insert(c.name.clone()) {
                        return Err(SemanticError::new(
                            SemanticErrorKind::DuplicateDefinition(c.name.clone()),
                            c.span,
                        ));
                    }
                    self.types
                        .get_mut(target_ty)
                        .associated_constants
                        .push((c.name.clone(), ty));
                    self.scopes.assign_type(scope, &c.name, ty);
                }
                AssocItem::Function(f) => {
                    let fn_ty = self.bind_signature(f, scope)?;
                    if !self.types.get_mut(target_ty).name_set.insert(f.name.clone()) {
                        return Err(SemanticError::new(
                            SemanticErrorKind::DuplicateDefinition(f.name.clone()),
                            f.span,
                        ));
                    }
                    let table = if f.self_param.is_some() {
                        &mut self.types.get_mut(target_ty).methods
                    } else {
                        &mut self.types.get_mut(target_ty).associated_functions
                    };
                    table.push((f.name.clone(), fn_ty));
                    self.scopes.assign_type(scope, &f.name, fn_ty);
                }
            }
        }
        Ok(())
    }

    /// Walk into bodies looking for blocks that declare their own items
    fn walk_item(&mut self, item: &mut Item, scope: ScopeId) -> Result<(), SemanticError> {
        match item {
            Item::Function(f) => {
                if let Some(body) = &mut f.body {
                    self.walk_block(body)?;
                }
                Ok(())
            }
            Item::Impl(i) => {
                for assoc in &mut i.items {
                    if let AssocItem::Function(f) = assoc {
                        if let Some(body) = &mut f.body {
                            self.walk_block(body)?;
                        }
                    }
                }
                Ok(())
            }
            Item::Const(c) => self.walk_expr(&mut c.init, scope),
            Item::Struct(_) | Item::Enum(_) | Item::Trait(_) => Ok(()),
        }
    }

    fn walk_block(&mut self, block: &mut Block) -> Result<(), SemanticError> {
        let scope = block.scope.unwrap_or(ScopeTree::ROOT);
        // Bind nested item declarations first so the rest of the block can
        // reference them regardless of order
        for stmt in &mut block.stmts {
            if let Stmt::Item(item) = stmt {
                self.bind_item(item, scope)?;
            }
        }
        for stmt in &mut block.stmts {
            match stmt {
                Stmt::Item(item) => self.walk_item(item, scope)?,
                Stmt::Let(l) => {
                    if let Some(init) = &mut l.init {
                        self.walk_expr(init, scope)?;
                    }
                    if let Some(else_block) = &mut l.else_block {
                        self.walk_block(else_block)?;
                    }
                }
                Stmt::Expr { expr, .. } => self.walk_expr(expr, scope)?,
                Stmt::Empty { .. } => {}
            }
        }
        if let Some(tail) = &mut block.tail {
            self.walk_expr(tail, scope)?;
        }
        Ok(())
    }

    fn walk_expr(&mut self, expr: &mut Expr, scope: ScopeId) -> Result<(), SemanticError> {
        match &mut expr.kind {
            ExprKind::Block(block) => self.walk_block(block),
            ExprKind::If {
                cond,
                then_block,
                else_branch,
            } => {
                self.walk_expr(cond, scope)?;
                self.walk_block(then_block)?;
                if let Some(else_branch) = else_branch {
                    self.walk_expr(else_branch, scope)?;
                }
                Ok(())
            }
            ExprKind::While { cond, body } => {
                self.walk_expr(cond, scope)?;
                self.walk_block(body)
            }
            ExprKind::Loop { body } => self.walk_block(body),
            ExprKind::Match { scrutinee, arms } => {
                self.walk_expr(scrutinee, scope)?;
                for arm in arms {
                    if let Some(guard) = &mut arm.guard {
                        self.walk_expr(guard, scope)?;
                    }
                    self.walk_expr(&mut arm.body, scope)?;
                }
                Ok(())
            }
            ExprKind::ArrayLit { elems } | ExprKind::TupleLit { elems } => {
                for elem in elems {
                    self.walk_expr(elem, scope)?;
                }
                Ok(())
            }
            ExprKind::ArrayRepeat { elem, len } => {
                self.walk_expr(elem, scope)?;
                self.walk_expr(len, scope)
            }
            ExprKind::StructLit { fields, .. } => {
                for field in fields {
                    self.walk_expr(&mut field.value, scope)?;
                }
                Ok(())
            }
            ExprKind::Call { callee, args } => {
                self.walk_expr(callee, scope)?;
                for arg in args {
                    self.walk_expr(arg, scope)?;
                }
                Ok(())
            }
            ExprKind::Index { base, index } => {
                self.walk_expr(base, scope)?;
                self.walk_expr(index, scope)
            }
            ExprKind::Member { base, .. } => self.walk_expr(base, scope),
            ExprKind::Unary { operand, .. } => self.walk_expr(operand, scope),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Assign { lhs, rhs } => {
                self.walk_expr(lhs, scope)?;
                self.walk_expr(rhs, scope)
            }
            ExprKind::Cast { operand, .. } => self.walk_expr(operand, scope),
            ExprKind::Break { value } | ExprKind::Return { value } => {
                if let Some(value) = value {
                    self.walk_expr(value, scope)?;
                }
                Ok(())
            }
            ExprKind::IntLit { .. }
            | ExprKind::BoolLit { .. }
            | ExprKind::CharLit { .. }
            | ExprKind::StrLit { .. }
            | ExprKind::CStrLit { .. }
            | ExprKind::Unit
            | ExprKind::Path(_)
            | ExprKind::Continue => Ok(()),
        }
    }
}
