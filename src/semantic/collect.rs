//! Pass 1: symbol collection
//!
//! Walks the AST once, creates one scope per scope-introducing construct
//! (block expression, impl block, match arm) and registers skeleton symbols
//! for every item so that later passes resolve forward references. Function
//! symbols get an empty-parameter placeholder signature, structs an empty
//! member list; enums are complete already since their variant names are
//! syntactic. The shape of the scope tree is final when this pass returns.

use crate::parser::ast::*;
use crate::semantic::errors::{SemanticError, SemanticErrorKind};
use crate::semantic::scope::{ScopeId, ScopeTree, Symbol, SymbolKind};
use crate::semantic::types::{FunctionSig, TypeArena, TypeKind};

pub struct SymbolCollector<'a> {
    scopes: &'a mut ScopeTree,
    types: &'a mut TypeArena,
}

impl<'a> SymbolCollector<'a> {
    pub fn new(scopes: &'a mut ScopeTree, types: &'a mut TypeArena) -> Self {
        Self { scopes, types }
    }

    pub fn run(&mut self, krate: &mut Crate) -> Result<(), SemanticError> {
        krate.scope = Some(ScopeTree::ROOT);
        for item in &mut krate.items {
            self.collect_item(item, ScopeTree::ROOT)?;
        }
        Ok(())
    }

    fn collect_item(&mut self, item: &mut Item, scope: ScopeId) -> Result<(), SemanticError> {
        match item {
            Item::Function(f) => self.collect_function(f, scope),
            Item::Struct(s) => {
                let ty = self.types.alloc(TypeKind::Struct {
                    name: s.name.clone(),
                    members: Vec::new(),
                });
                self.scopes.declare(
                    scope,
                    Symbol::new(s.name.as_str(), ty, SymbolKind::Struct, s.span),
                    false,
                )
            }
            Item::Enum(e) => {
                let mut variants = Vec::with_capacity(e.variants.len());
                for variant in &e.variants {
                    if variants.contains(&variant.name) {
                        return Err(SemanticError::new(
                            SemanticErrorKind::DuplicateDefinition(variant.name.clone()),
                            variant.span,
                        ));
                    }
                    variants.push(variant.name.clone());
                }
                let ty = self.types.alloc(TypeKind::Enumeration {
                    name: e.name.clone(),
                    variants,
                });
                self.scopes.declare(
                    scope,
                    Symbol::new(e.name.as_str(), ty, SymbolKind::Enumeration, e.span),
                    false,
                )
            }
            Item::Const(c) => self.collect_const(c, scope),
            Item::Impl(i) => {
                let impl_scope = self.scopes.add_child(scope);
                i.scope = Some(impl_scope);
                for assoc in &mut i.items {
                    match assoc {
                        AssocItem::Function(f) => self.collect_function(f, impl_scope)?,
                        AssocItem::Const(c) => self.collect_const(c, impl_scope)?,
                    }
                }
                Ok(())
            }
            // Trait bodies are not analyzed
            Item::Trait(_) => Ok(()),
        }
    }

    fn collect_function(
        &mut self,
        f: &mut FunctionItem,
        scope: ScopeId,
    ) -> Result<(), SemanticError> {
        let void = self.types.primitive("void");
        let placeholder = self
            .types
            .alloc(TypeKind::Function(FunctionSig::free(Vec::new(), void)));
        self.scopes.declare(
            scope,
            Symbol::new(f.name.as_str(), placeholder, SymbolKind::Function, f.span),
            false,
        )?;
        for param in &mut f.params {
            self.collect_type_node(&mut param.ty, scope)?;
        }
        if let Some(ret) = &mut f.ret {
            self.collect_type_node(ret, scope)?;
        }
        if let Some(body) = &mut f.body {
            self.collect_block(body, scope)?;
        }
        Ok(())
    }

    fn collect_const(&mut self, c: &mut ConstItem, scope: ScopeId) -> Result<(), SemanticError> {
        // Only primitive-numeric constants participate in constant folding
        let is_const = c.ty.is_numeric_primitive();
        let void = self.types.primitive("void");
        self.scopes.declare(
            scope,
            Symbol::new(c.name.as_str(), void, SymbolKind::Constant, c.span).constant(is_const),
            false,
        )?;
        self.collect_type_node(&mut c.ty, scope)?;
        self.collect_expr(&mut c.init, scope)
    }

    fn collect_block(&mut self, block: &mut Block, parent: ScopeId) -> Result<(), SemanticError> {
        let scope = self.scopes.add_child(parent);
        block.scope = Some(scope);
        for stmt in &mut block.stmts {
            self.collect_stmt(stmt, scope)?;
        }
        if let Some(tail) = &mut block.tail {
            self.collect_expr(tail, scope)?;
        }
        Ok(())
    }

    fn collect_stmt(&mut self, stmt: &mut Stmt, scope: ScopeId) -> Result<(), SemanticError> {
        match stmt {
            Stmt::Item(item) => self.collect_item(item, scope),
            Stmt::Let(l) => {
                if let Some(ty) = &mut l.ty {
                    self.collect_type_node(ty, scope)?;
                }
                if let Some(init) = &mut l.init {
                    self.collect_expr(init, scope)?;
                }
                if let Some(else_block) = &mut l.else_block {
                    self.collect_block(else_block, scope)?;
                }
                Ok(())
            }
            Stmt::Expr { expr, .. } => self.collect_expr(expr, scope),
            Stmt::Empty { .. } => Ok(()),
        }
    }

    fn collect_expr(&mut self, expr: &mut Expr, scope: ScopeId) -> Result<(), SemanticError> {
        match &mut expr.kind {
            ExprKind::IntLit { .. }
            | ExprKind::BoolLit { .. }
            | ExprKind::CharLit { .. }
            | ExprKind::StrLit { .. }
            | ExprKind::CStrLit { .. }
            | ExprKind::Unit
            | ExprKind::Path(_)
            | ExprKind::Continue => Ok(()),
            ExprKind::ArrayLit { elems } | ExprKind::TupleLit { elems } => {
                for elem in elems {
                    self.collect_expr(elem, scope)?;
                }
                Ok(())
            }
            ExprKind::ArrayRepeat { elem, len } => {
                self.collect_expr(elem, scope)?;
                self.collect_expr(len, scope)
            }
            ExprKind::StructLit { fields, .. } => {
                for field in fields {
                    self.collect_expr(&mut field.value, scope)?;
                }
                Ok(())
            }
            ExprKind::Call { callee, args } => {
                self.collect_expr(callee, scope)?;
                for arg in args {
                    self.collect_expr(arg, scope)?;
                }
                Ok(())
            }
            ExprKind::Index { base, index } => {
                self.collect_expr(base, scope)?;
                self.collect_expr(index, scope)
            }
            ExprKind::Member { base, .. } => self.collect_expr(base, scope),
            ExprKind::Unary { operand, .. } => self.collect_expr(operand, scope),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Assign { lhs, rhs } => {
                self.collect_expr(lhs, scope)?;
                self.collect_expr(rhs, scope)
            }
            ExprKind::Cast { operand, ty } => {
                self.collect_expr(operand, scope)?;
                self.collect_type_node(ty, scope)
            }
            ExprKind::Block(block) => self.collect_block(block, scope),
            ExprKind::If {
                cond,
                then_block,
                else_branch,
            } => {
                self.collect_expr(cond, scope)?;
                self.collect_block(then_block, scope)?;
                if let Some(else_branch) = else_branch {
                    self.collect_expr(else_branch, scope)?;
                }
                Ok(())
            }
            ExprKind::While { cond, body } => {
                self.collect_expr(cond, scope)?;
                self.collect_block(body, scope)
            }
            ExprKind::Loop { body } => self.collect_block(body, scope),
            ExprKind::Match { scrutinee, arms } => {
                self.collect_expr(scrutinee, scope)?;
                for arm in arms {
                    let arm_scope = self.scopes.add_child(scope);
                    arm.scope = Some(arm_scope);
                    if let Some(guard) = &mut arm.guard {
                        self.collect_expr(guard, arm_scope)?;
                    }
                    self.collect_expr(&mut arm.body, arm_scope)?;
                }
                Ok(())
            }
            ExprKind::Break { value } | ExprKind::Return { value } => {
                if let Some(value) = value {
                    self.collect_expr(value, scope)?;
                }
                Ok(())
            }
        }
    }

    // Array length expressions can nest arbitrary expressions, so walk type
    // nodes too for any scopes they introduce.
    fn collect_type_node(&mut self, node: &mut TypeNode, scope: ScopeId) -> Result<(), SemanticError> {
        match &mut node.kind {
            TypeNodeKind::Path(_) | TypeNodeKind::Unit => Ok(()),
            TypeNodeKind::Tuple(elems) => {
                for elem in elems {
                    self.collect_type_node(elem, scope)?;
                }
                Ok(())
            }
            TypeNodeKind::Array { elem, len } => {
                self.collect_type_node(elem, scope)?;
                self.collect_expr(len, scope)
            }
            TypeNodeKind::Slice(elem) => self.collect_type_node(elem, scope),
            TypeNodeKind::Reference { inner, .. } => self.collect_type_node(inner, scope),
        }
    }
}
