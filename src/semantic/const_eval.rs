//! Pass 3: constant evaluation
//!
//! Bottom-up folding of compile-time constant expressions. Literals are
//! compiler-known by definition; arithmetic, bitwise and shift expressions
//! are compiler-known iff both operands are; unary negation propagates.
//! A path is compiler-known when it names a `const` of integer type (value
//! fetched from the scope's constant table) or an associated constant /
//! enum variant reached through `Type::name`. `const` item initializers
//! must be compiler-known, and the evaluated values feed array-length
//! resolution and enum discriminants in pass 4.
//!
//! Division and modulo by a folded zero are deliberately left unfolded
//! rather than rejected here; the expression simply stays unknown.

use crate::parser::ast::*;
use crate::semantic::errors::{SemanticError, SemanticErrorKind};
use crate::semantic::scope::{ScopeId, ScopeTree, SymbolKind};
use crate::semantic::types::{ConstValue, TypeArena, TypeKind};

/// Fold an expression that must be constant without any scope context:
/// integer literals, unary negation, casts and the binary integer operators.
/// Used by signature-level array lengths, which resolve before this pass
/// has run.
pub(crate) fn fold_pure(expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::IntLit { value, .. } => {
            expr.is_compiler_known = true;
            expr.constant_value = Some(ConstValue::Integer(*value));
        }
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => {
            fold_pure(operand);
            expr.is_compiler_known = operand.is_compiler_known;
            if let Some(v) = operand.constant_value.as_ref().and_then(|v| v.as_integer()) {
                expr.constant_value = Some(ConstValue::Integer(v.wrapping_neg()));
            }
        }
        ExprKind::Cast { operand, .. } => {
            fold_pure(operand);
            expr.is_compiler_known = operand.is_compiler_known;
            expr.constant_value = operand.constant_value.clone();
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let op = *op;
            fold_pure(lhs);
            fold_pure(rhs);
            if let Some(value) = folded_operands(lhs, rhs).and_then(|(l, r)| combine(op, l, r)) {
                expr.is_compiler_known = true;
                expr.constant_value = Some(ConstValue::Integer(value));
            }
        }
        _ => {}
    }
}

/// The integer values of two operands, when both are folded
fn folded_operands(lhs: &Expr, rhs: &Expr) -> Option<(i64, i64)> {
    if !lhs.is_compiler_known || !rhs.is_compiler_known {
        return None;
    }
    let l = lhs.constant_value.as_ref().and_then(|v| v.as_integer())?;
    let r = rhs.constant_value.as_ref().and_then(|v| v.as_integer())?;
    Some((l, r))
}

/// Combine two folded operands with two's-complement integer semantics.
/// Comparisons and logical operators are not folded, and neither is a
/// division or modulo whose divisor folded to zero.
fn combine(op: BinaryOp, l: i64, r: i64) -> Option<i64> {
    match op {
        BinaryOp::Add => Some(l.wrapping_add(r)),
        BinaryOp::Sub => Some(l.wrapping_sub(r)),
        BinaryOp::Mul => Some(l.wrapping_mul(r)),
        BinaryOp::Div => (r != 0).then(|| l.wrapping_div(r)),
        BinaryOp::Rem => (r != 0).then(|| l.wrapping_rem(r)),
        BinaryOp::BitAnd => Some(l & r),
        BinaryOp::BitOr => Some(l | r),
        BinaryOp::BitXor => Some(l ^ r),
        BinaryOp::Shl => Some(l.wrapping_shl(r as u32)),
        BinaryOp::Shr => Some(l.wrapping_shr(r as u32)),
        _ => None,
    }
}

pub struct ConstEvaluator<'a> {
    scopes: &'a mut ScopeTree,
    types: &'a mut TypeArena,
}

impl<'a> ConstEvaluator<'a> {
    pub fn new(scopes: &'a mut ScopeTree, types: &'a mut TypeArena) -> Self {
        Self { scopes, types }
    }

    pub fn run(&mut self, krate: &mut Crate) -> Result<(), SemanticError> {
        // Constant items first, so the other items of the scope can use
        // their values regardless of order
        for item in &mut krate.items {
            if let Item::Const(c) = item {
                self.eval_const_item(c, ScopeTree::ROOT)?;
            }
        }
        for item in &mut krate.items {
            if !matches!(item, Item::Const(_)) {
                self.eval_item(item, ScopeTree::ROOT)?;
            }
        }
        Ok(())
    }

    fn eval_item(&mut self, item: &mut Item, scope: ScopeId) -> Result<(), SemanticError> {
        match item {
            Item::Function(f) => self.eval_function(f, scope),
            Item::Struct(s) => {
                for field in &mut s.fields {
                    self.eval_type_node(&mut field.ty, scope)?;
                }
                Ok(())
            }
            Item::Enum(e) => self.eval_enum(e, scope),
            Item::Const(c) => self.eval_const_item(c, scope),
            Item::Impl(i) => self.eval_impl(i),
            Item::Trait(_) => Ok(()),
        }
    }

    fn eval_function(&mut self, f: &mut FunctionItem, scope: ScopeId) -> Result<(), SemanticError> {
        for param in &mut f.params {
            self.eval_type_node(&mut param.ty, scope)?;
        }
        if let Some(ret) = &mut f.ret {
            self.eval_type_node(ret, scope)?;
        }
        if let Some(body) = &mut f.body {
            self.eval_block(body)?;
        }
        Ok(())
    }

    /// Assign each variant its discriminant: an explicit one must fold, an
    /// implicit one is the previous value plus one
    fn eval_enum(&mut self, e: &mut EnumItem, scope: ScopeId) -> Result<(), SemanticError> {
        let Some(symbol) = self.scopes.lookup(scope, &e.name) else {
            return Ok(());
        };
        let enum_ty = symbol.ty;
        let mut next = 0i64;
        for variant in &mut e.variants {
            let value = match &mut variant.discriminant {
                Some(expr) => {
                    self.eval_expr(expr, scope)?;
                    if !expr.is_compiler_known {
                        return Err(SemanticError::new(
                            SemanticErrorKind::NotConstEvaluable,
                            expr.span,
                        ));
                    }
                    expr.constant_value
                        .as_ref()
                        .and_then(|v| v.as_integer())
                        .unwrap_or(next)
                }
                None => next,
            };
            next = value.wrapping_add(1);
            self.types
                .get_mut(enum_ty)
                .value_map
                .insert(variant.name.clone(), ConstValue::Integer(value));
        }
        Ok(())
    }

    fn eval_const_item(&mut self, c: &mut ConstItem, scope: ScopeId) -> Result<(), SemanticError> {
        self.eval_type_node(&mut c.ty, scope)?;
        self.eval_expr(&mut c.init, scope)?;
        if !c.init.is_compiler_known {
            return Err(SemanticError::new(
                SemanticErrorKind::NotConstEvaluable,
                c.init.span,
            ));
        }
        let is_const = self
            .scopes
            .lookup(scope, &c.name)
            .map(|s| s.is_const)
            .unwrap_or(false);
        if is_const {
            if let Some(value) = c.init.constant_value.clone() {
                self.scopes.add_constant(scope, &c.name, value);
            }
        }
        Ok(())
    }

    fn eval_impl(&mut self, i: &mut ImplItem) -> Result<(), SemanticError> {
        let Some(scope) = i.scope else { return Ok(()) };
        let target_ty = self
            .scopes
            .lookup(scope, &i.target_name)
            .map(|s| s.ty);
        for assoc in &mut i.items {
            match assoc {
                AssocItem::Const(c) => {
                    self.eval_const_item(c, scope)?;
                    // The folded value is reachable through `Type::NAME`
                    if let (Some(ty), Some(value)) = (target_ty, c.init.constant_value.clone()) {
                        self.types
                            .get_mut(ty)
                            .value_map
                            .insert(c.name.clone(), value);
                    }
                }
                AssocItem::Function(f) => self.eval_function(f, scope)?,
            }
        }
        Ok(())
    }

    /// Array lengths hide expressions inside type syntax; fold them too
    fn eval_type_node(&mut self, node: &mut TypeNode, scope: ScopeId) -> Result<(), SemanticError> {
        match &mut node.kind {
            TypeNodeKind::Path(_) | TypeNodeKind::Unit => Ok(()),
            TypeNodeKind::Tuple(elems) => {
                for elem in elems {
                    self.eval_type_node(elem, scope)?;
                }
                Ok(())
            }
            TypeNodeKind::Array { elem, len } => {
                self.eval_type_node(elem, scope)?;
                self.eval_expr(len, scope)
            }
            TypeNodeKind::Slice(elem) => self.eval_type_node(elem, scope),
            TypeNodeKind::Reference { inner, .. } => self.eval_type_node(inner, scope),
        }
    }

    fn eval_block(&mut self, block: &mut Block) -> Result<(), SemanticError> {
        let scope = block.scope.unwrap_or(ScopeTree::ROOT);
        for stmt in &mut block.stmts {
            if let Stmt::Item(Item::Const(c)) = stmt {
                self.eval_const_item(c, scope)?;
            }
        }
        for stmt in &mut block.stmts {
            match stmt {
                Stmt::Item(Item::Const(_)) => {}
                Stmt::Item(item) => self.eval_item(item, scope)?,
                Stmt::Let(l) => {
                    if let Some(ty) = &mut l.ty {
                        self.eval_type_node(ty, scope)?;
                    }
                    if let Some(init) = &mut l.init {
                        self.eval_expr(init, scope)?;
                    }
                    if let Some(else_block) = &mut l.else_block {
                        self.eval_block(else_block)?;
                    }
                }
                Stmt::Expr { expr, .. } => self.eval_expr(expr, scope)?,
                Stmt::Empty { .. } => {}
            }
        }
        if let Some(tail) = &mut block.tail {
            self.eval_expr(tail, scope)?;
        }
        Ok(())
    }

    fn eval_expr(&mut self, expr: &mut Expr, scope: ScopeId) -> Result<(), SemanticError> {
        if matches!(expr.kind, ExprKind::Path(_)) {
            self.eval_path(expr, scope);
            return Ok(());
        }
        match &mut expr.kind {
            ExprKind::IntLit { value, .. } => {
                let value = *value;
                expr.is_compiler_known = true;
                expr.constant_value = Some(ConstValue::Integer(value));
            }
            ExprKind::BoolLit { value } => {
                let value = *value;
                expr.is_compiler_known = true;
                expr.constant_value = Some(ConstValue::Integer(value as i64));
            }
            ExprKind::CharLit { value } => {
                let value = *value;
                expr.is_compiler_known = true;
                expr.constant_value = Some(ConstValue::Integer(value as i64));
            }
            ExprKind::StrLit { value } | ExprKind::CStrLit { value } => {
                let value = value.clone();
                expr.is_compiler_known = true;
                expr.constant_value = Some(ConstValue::Text(value));
            }
            ExprKind::Unit => {}
            ExprKind::ArrayLit { elems } => {
                for elem in elems.iter_mut() {
                    self.eval_expr(elem, scope)?;
                }
                expr.is_compiler_known = true;
            }
            ExprKind::ArrayRepeat { elem, len } => {
                self.eval_expr(elem, scope)?;
                self.eval_expr(len, scope)?;
                expr.is_compiler_known = true;
            }
            ExprKind::TupleLit { elems } => {
                for elem in elems.iter_mut() {
                    self.eval_expr(elem, scope)?;
                }
            }
            // Handled above
            ExprKind::Path(_) => {}
            ExprKind::StructLit { fields, .. } => {
                for field in fields.iter_mut() {
                    self.eval_expr(&mut field.value, scope)?;
                }
            }
            ExprKind::Call { callee, args } => {
                self.eval_expr(callee, scope)?;
                for arg in args.iter_mut() {
                    self.eval_expr(arg, scope)?;
                }
            }
            ExprKind::Index { base, index } => {
                self.eval_expr(base, scope)?;
                self.eval_expr(index, scope)?;
            }
            ExprKind::Member { base, .. } => self.eval_expr(base, scope)?,
            ExprKind::Unary { op, operand } => {
                let op = *op;
                self.eval_expr(operand, scope)?;
                if op == UnaryOp::Neg {
                    expr.is_compiler_known = operand.is_compiler_known;
                    if let Some(v) =
                        operand.constant_value.as_ref().and_then(|v| v.as_integer())
                    {
                        expr.constant_value = Some(ConstValue::Integer(v.wrapping_neg()));
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                self.eval_expr(lhs, scope)?;
                self.eval_expr(rhs, scope)?;
                if let Some(value) =
                    folded_operands(lhs, rhs).and_then(|(l, r)| combine(op, l, r))
                {
                    expr.is_compiler_known = true;
                    expr.constant_value = Some(ConstValue::Integer(value));
                }
            }
            ExprKind::Assign { lhs, rhs } => {
                self.eval_expr(lhs, scope)?;
                self.eval_expr(rhs, scope)?;
            }
            ExprKind::Cast { operand, ty: _ } => {
                self.eval_expr(operand, scope)?;
                expr.is_compiler_known = operand.is_compiler_known;
                expr.constant_value = operand.constant_value.clone();
            }
            ExprKind::Block(block) => self.eval_block(block)?,
            ExprKind::If {
                cond,
                then_block,
                else_branch,
            } => {
                self.eval_expr(cond, scope)?;
                self.eval_block(then_block)?;
                if let Some(else_branch) = else_branch {
                    self.eval_expr(else_branch, scope)?;
                }
            }
            ExprKind::While { cond, body } => {
                self.eval_expr(cond, scope)?;
                self.eval_block(body)?;
            }
            ExprKind::Loop { body } => self.eval_block(body)?,
            ExprKind::Match { scrutinee, arms } => {
                self.eval_expr(scrutinee, scope)?;
                for arm in arms.iter_mut() {
                    let arm_scope = arm.scope.unwrap_or(scope);
                    if let Some(guard) = &mut arm.guard {
                        self.eval_expr(guard, arm_scope)?;
                    }
                    self.eval_expr(&mut arm.body, arm_scope)?;
                }
            }
            ExprKind::Break { value } | ExprKind::Return { value } => {
                if let Some(value) = value {
                    self.eval_expr(value, scope)?;
                }
            }
            ExprKind::Continue => {}
        }
        Ok(())
    }

    /// Paths are compiler-known when they name a numeric `const` or an
    /// associated constant / variant of a type
    fn eval_path(&mut self, expr: &mut Expr, scope: ScopeId) {
        let ExprKind::Path(path) = &expr.kind else {
            return;
        };
        match path.segments.as_slice() {
            [name] => {
                if let Some(symbol) = self.scopes.lookup(scope, name) {
                    if symbol.is_const {
                        let name = name.clone();
                        expr.is_compiler_known = true;
                        expr.constant_value = self.scopes.lookup_constant(scope, &name).cloned();
                    }
                }
            }
            [type_name, member] => {
                let Some(symbol) = self.scopes.lookup(scope, type_name) else {
                    return;
                };
                let ty = symbol.ty;
                let is_enum = symbol.kind == SymbolKind::Enumeration;
                let data = self.types.get(ty);
                let known = if is_enum {
                    matches!(
                        self.types.kind(ty),
                        TypeKind::Enumeration { variants, .. } if variants.contains(member)
                    )
                } else {
                    data.associated_constants.iter().any(|(n, _)| n == member)
                };
                if known {
                    expr.is_compiler_known = true;
                    expr.constant_value = self.types.get(ty).value_map.get(member).cloned();
                }
            }
            _ => {}
        }
    }
}
