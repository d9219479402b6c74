//! Pass 4: type checking
//!
//! Computes, for every expression, the ordered set of candidate types it
//! could have, and enforces the static rules: operator and operand
//! legality, call-site arity and argument types, lvalue mutability, and
//! loop context for `break`/`continue`. Unsuffixed integer literals start
//! with the four-way candidate set `{i32, u32, isize, usize}` and are
//! narrowed by intersecting against whatever the surrounding context
//! expects; [`cap`] is that intersection.
//!
//! Diverging expressions type as `never`, the identity of `cap`, and set an
//! interrupt flag that skips the unreachable remainder of the enclosing
//! block.

use crate::parser::ast::*;
use crate::semantic::errors::{SemanticError, SemanticErrorKind};
use crate::semantic::resolve_type_node;
use crate::semantic::scope::{ScopeId, ScopeTree, Symbol, SymbolKind};
use crate::semantic::types::{TypeArena, TypeId, TypeKind};

/// Structural-equality intersection of two candidate sets
///
/// Returns the subsequence of `a` whose elements equal some element of `b`,
/// order-preserving, first match wins. `never` is the identity: if either
/// side contains it the other side is returned whole.
pub(crate) fn cap(types: &TypeArena, never: TypeId, a: &[TypeId], b: &[TypeId]) -> Vec<TypeId> {
    if a.iter().any(|t| types.equal(*t, never)) {
        return b.to_vec();
    }
    if b.iter().any(|t| types.equal(*t, never)) {
        return a.to_vec();
    }
    let mut out = Vec::new();
    for x in a {
        if b.iter().any(|y| types.equal(*x, *y)) {
            out.push(*x);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    Loop,
    While,
}

/// Per-loop state while checking its body
struct LoopCtx {
    kind: LoopKind,
    /// Accumulated `break` payload types, intersected across break sites
    break_types: Vec<TypeId>,
}

pub struct TypeChecker<'a> {
    scopes: &'a mut ScopeTree,
    types: &'a mut TypeArena,

    never: TypeId,
    void: TypeId,
    bool_ty: TypeId,
    usize_ty: TypeId,

    /// Intersection of the types of every `return` in the current function
    function_return: Vec<TypeId>,
    loops: Vec<LoopCtx>,
    /// Set when a diverging expression was checked; clears at the enclosing
    /// block boundary
    interrupt: bool,
}

impl<'a> TypeChecker<'a> {
    pub fn new(scopes: &'a mut ScopeTree, types: &'a mut TypeArena) -> Self {
        let never = types.primitive("never");
        let void = types.primitive("void");
        let bool_ty = types.primitive("bool");
        let usize_ty = types.primitive("usize");
        Self {
            scopes,
            types,
            never,
            void,
            bool_ty,
            usize_ty,
            function_return: Vec::new(),
            loops: Vec::new(),
            interrupt: false,
        }
    }

    pub fn run(&mut self, krate: &mut Crate) -> Result<(), SemanticError> {
        for item in &mut krate.items {
            self.check_item(item, ScopeTree::ROOT)?;
        }
        Ok(())
    }

    fn cap(&self, a: &[TypeId], b: &[TypeId]) -> Vec<TypeId> {
        cap(self.types, self.never, a, b)
    }

    fn resolve(&mut self, scope: ScopeId, node: &mut TypeNode) -> Result<TypeId, SemanticError> {
        resolve_type_node(self.scopes, self.types, scope, node)
    }

    fn err(&self, kind: SemanticErrorKind, span: crate::diagnostics::Span) -> SemanticError {
        SemanticError::new(kind, span)
    }

    fn check_item(&mut self, item: &mut Item, scope: ScopeId) -> Result<(), SemanticError> {
        match item {
            Item::Function(f) => self.check_function(f, scope, None),
            Item::Const(c) => self.check_const_item(c, scope),
            Item::Impl(i) => self.check_impl(i),
            Item::Struct(_) | Item::Enum(_) | Item::Trait(_) => Ok(()),
        }
    }

    fn check_const_item(&mut self, c: &mut ConstItem, scope: ScopeId) -> Result<(), SemanticError> {
        let ty = self.resolve(scope, &mut c.ty)?;
        self.check_expr(&mut c.init, scope)?;
        let capped = self.cap(&c.init.candidate_types, &[ty]);
        if capped.is_empty() {
            return Err(self.err(
                SemanticErrorKind::TypeMismatch(format!(
                    "constant `{}` declared as `{}` but initialized with `{}`",
                    c.name,
                    self.types.display(ty),
                    self.display_candidates(&c.init.candidate_types),
                )),
                c.init.span,
            ));
        }
        c.init.candidate_types = capped;
        Ok(())
    }

    fn check_impl(&mut self, i: &mut ImplItem) -> Result<(), SemanticError> {
        let Some(scope) = i.scope else { return Ok(()) };
        let Some(target) = self.scopes.lookup(scope, &i.target_name) else {
            return Err(SemanticError::new(
                SemanticErrorKind::UndeclaredName(i.target_name.clone()),
                i.span,
            ));
        };
        let target_ty = target.ty;
        for assoc in &mut i.items {
            match assoc {
                AssocItem::Const(c) => self.check_const_item(c, scope)?,
                AssocItem::Function(f) => {
                    let receiver = f.self_param.as_ref().map(|sp| (target_ty, sp.is_mut));
                    self.check_function(f, scope, receiver)?;
                }
            }
        }
        Ok(())
    }

    fn check_function(
        &mut self,
        f: &mut FunctionItem,
        scope: ScopeId,
        receiver: Option<(TypeId, bool)>,
    ) -> Result<(), SemanticError> {
        let ret = match &mut f.ret {
            Some(node) => self.resolve(scope, node)?,
            None => self.void,
        };
        let Some(body) = &mut f.body else {
            return Ok(());
        };
        let body_scope = body.scope.unwrap_or(scope);

        if let Some((self_ty, self_mut)) = receiver {
            if f.self_param.is_some() {
                self.scopes.declare(
                    body_scope,
                    Symbol::new("self", self_ty, SymbolKind::Variable, f.span).mutable(self_mut),
                    true,
                )?;
            }
        }
        for param in &mut f.params {
            // Re-resolve here: array lengths naming constants only became
            // known after pass 3
            let ty = self.resolve(scope, &mut param.ty)?;
            let is_mut = param.is_mut
                || matches!(param.ty.kind, TypeNodeKind::Reference { is_mut: true, .. });
            self.scopes.declare(
                body_scope,
                Symbol::new(param.name.as_str(), ty, SymbolKind::Variable, param.span).mutable(is_mut),
                false,
            )?;
        }

        // The function body is its own return/loop/interrupt context
        let saved_return = std::mem::take(&mut self.function_return);
        let saved_loops = std::mem::take(&mut self.loops);
        let saved_interrupt = std::mem::replace(&mut self.interrupt, false);

        let result = self.check_function_body(f, body_scope, ret);

        self.function_return = saved_return;
        self.loops = saved_loops;
        self.interrupt = saved_interrupt;
        result
    }

    fn check_function_body(
        &mut self,
        f: &mut FunctionItem,
        _body_scope: ScopeId,
        ret: TypeId,
    ) -> Result<(), SemanticError> {
        let Some(body) = &mut f.body else {
            return Ok(());
        };
        let body_types = self.check_block(body)?;

        let mut function_return = std::mem::take(&mut self.function_return);
        if function_return.is_empty() {
            function_return = body_types;
        } else {
            function_return = self.cap(&function_return, &body_types);
            if function_return.is_empty() {
                return Err(self.err(
                    SemanticErrorKind::TypeMismatch(format!(
                        "`return` type is not consistent in function `{}`",
                        f.name
                    )),
                    f.span,
                ));
            }
        }
        let check = self.cap(&function_return, &[ret]);
        if check.is_empty() {
            return Err(self.err(
                SemanticErrorKind::TypeMismatch(format!(
                    "function `{}` declared to return `{}` but its body has type `{}`",
                    f.name,
                    self.types.display(ret),
                    self.display_candidates(&function_return),
                )),
                f.span,
            ));
        }
        Ok(())
    }

    /// Check a block, returning its candidate types
    ///
    /// Statements after a diverging one are skipped, and a block whose
    /// control never falls through has type `never`.
    fn check_block(&mut self, block: &mut Block) -> Result<Vec<TypeId>, SemanticError> {
        let scope = block.scope.unwrap_or(ScopeTree::ROOT);
        let mut tail_types = None;
        for stmt in &mut block.stmts {
            self.check_stmt(stmt, scope)?;
            if self.interrupt {
                break;
            }
        }
        if !self.interrupt {
            if let Some(tail) = &mut block.tail {
                self.check_expr(tail, scope)?;
                tail_types = Some(tail.candidate_types.clone());
            }
        }
        if self.interrupt {
            self.interrupt = false;
            return Ok(vec![self.never]);
        }
        Ok(tail_types.unwrap_or_else(|| vec![self.void]))
    }

    fn check_stmt(&mut self, stmt: &mut Stmt, scope: ScopeId) -> Result<(), SemanticError> {
        match stmt {
            Stmt::Item(item) => self.check_item(item, scope),
            Stmt::Let(l) => self.check_let(l, scope),
            Stmt::Expr { expr, .. } => self.check_expr(expr, scope),
            Stmt::Empty { .. } => Ok(()),
        }
    }

    fn check_let(&mut self, l: &mut LetStmt, scope: ScopeId) -> Result<(), SemanticError> {
        let mut is_mut = l.is_mut;
        let mut declared = None;
        if let Some(node) = &mut l.ty {
            let ty = self.resolve(scope, node)?;
            // Binding a `&mut T` makes the place writable through the name
            if matches!(node.kind, TypeNodeKind::Reference { is_mut: true, .. }) {
                is_mut = true;
            }
            declared = Some(ty);
        }
        if let Some(init) = &mut l.init {
            self.check_expr(init, scope)?;
            match declared {
                Some(ty) => {
                    let capped = self.cap(&init.candidate_types, &[ty]);
                    if capped.is_empty() {
                        return Err(self.err(
                            SemanticErrorKind::TypeMismatch(format!(
                                "`{}` declared as `{}` but initialized with `{}`",
                                l.name,
                                self.types.display(ty),
                                self.display_candidates(&init.candidate_types),
                            )),
                            init.span,
                        ));
                    }
                    init.candidate_types = capped;
                }
                None => declared = Some(init.candidate_types[0]),
            }
        }
        if let Some(else_block) = &mut l.else_block {
            let block_types = self.check_block(else_block)?;
            match declared {
                Some(ty) => {
                    if self.cap(&block_types, &[ty]).is_empty() {
                        return Err(self.err(
                            SemanticErrorKind::TypeMismatch(format!(
                                "`else` block of `{}` has type `{}`, expected `{}`",
                                l.name,
                                self.display_candidates(&block_types),
                                self.types.display(ty),
                            )),
                            else_block.span,
                        ));
                    }
                }
                None => declared = Some(block_types[0]),
            }
        }
        let Some(ty) = declared else {
            return Err(self.err(
                SemanticErrorKind::TypeMismatch(format!("cannot infer a type for `{}`", l.name)),
                l.span,
            ));
        };
        self.scopes.declare(
            scope,
            Symbol::new(l.name.as_str(), ty, SymbolKind::Variable, l.span)
                .mutable(is_mut)
                .assigned(l.init.is_some()),
            false,
        )
    }

    fn check_expr(&mut self, expr: &mut Expr, scope: ScopeId) -> Result<(), SemanticError> {
        if matches!(expr.kind, ExprKind::Path(_)) {
            return self.check_path(expr, scope);
        }
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::IntLit { suffix, .. } => {
                let candidates = match suffix {
                    Some(s) => vec![self.suffix_type(*s)],
                    None => self.integer_candidates(),
                };
                expr.is_compiler_known = true;
                expr.candidate_types = candidates;
            }
            ExprKind::BoolLit { .. } => {
                expr.is_compiler_known = true;
                expr.candidate_types = vec![self.bool_ty];
            }
            ExprKind::CharLit { .. } => {
                expr.is_compiler_known = true;
                expr.candidate_types = vec![self.types.primitive("char")];
            }
            ExprKind::StrLit { .. } => {
                expr.is_compiler_known = true;
                expr.candidate_types = vec![self.types.primitive("string")];
            }
            ExprKind::CStrLit { .. } => {
                expr.is_compiler_known = true;
                expr.candidate_types = vec![self.types.primitive("cstring")];
            }
            ExprKind::Unit => {
                expr.candidate_types = vec![self.void];
            }
            ExprKind::ArrayLit { elems } => {
                let mut element_types: Option<Vec<TypeId>> = None;
                for elem in elems.iter_mut() {
                    self.check_expr(elem, scope)?;
                    element_types = Some(match element_types {
                        None => elem.candidate_types.clone(),
                        Some(acc) => self.cap(&acc, &elem.candidate_types),
                    });
                }
                let Some(element_types) = element_types else {
                    return Err(self.err(
                        SemanticErrorKind::TypeMismatch(
                            "cannot infer the element type of an empty array literal".to_string(),
                        ),
                        span,
                    ));
                };
                if element_types.is_empty() {
                    return Err(self.err(
                        SemanticErrorKind::TypeMismatch(
                            "array literal elements have incompatible types".to_string(),
                        ),
                        span,
                    ));
                }
                let len = elems.len() as u32;
                expr.candidate_types = element_types
                    .iter()
                    .map(|t| self.types.alloc(TypeKind::Array { elem: *t, len }))
                    .collect();
            }
            ExprKind::ArrayRepeat { elem, len } => {
                self.check_expr(elem, scope)?;
                if !len.is_compiler_known {
                    return Err(self.err(SemanticErrorKind::NotConstEvaluable, len.span));
                }
                let size = len
                    .constant_value
                    .as_ref()
                    .and_then(|v| v.as_integer())
                    .filter(|v| (0..=u32::MAX as i64).contains(v))
                    .ok_or_else(|| {
                        SemanticError::new(SemanticErrorKind::NotConstEvaluable, len.span)
                    })? as u32;
                expr.candidate_types = elem
                    .candidate_types
                    .iter()
                    .map(|t| self.types.alloc(TypeKind::Array { elem: *t, len: size }))
                    .collect();
            }
            ExprKind::TupleLit { elems } => {
                let mut ids = Vec::with_capacity(elems.len());
                for elem in elems.iter_mut() {
                    self.check_expr(elem, scope)?;
                    ids.push(elem.candidate_types[0]);
                }
                expr.candidate_types = vec![self.types.alloc(TypeKind::Tuple(ids))];
            }
            ExprKind::Path(_) => {}
            ExprKind::StructLit { name, fields } => {
                let Some(symbol) = self.scopes.lookup(scope, name) else {
                    return Err(SemanticError::new(
                        SemanticErrorKind::UndeclaredName(name.clone()),
                        span,
                    ));
                };
                let ty = symbol.ty;
                let TypeKind::Struct { members, .. } = self.types.kind(ty) else {
                    return Err(self.err(
                        SemanticErrorKind::TypeMismatch(format!("`{}` is not a struct", name)),
                        span,
                    ));
                };
                let members = members.clone();
                for field in fields.iter_mut() {
                    self.check_expr(&mut field.value, scope)?;
                }
                if members.len() != fields.len() {
                    return Err(self.err(
                        SemanticErrorKind::TypeMismatch(format!(
                            "struct `{}` has {} field(s), literal provides {}",
                            name,
                            members.len(),
                            fields.len()
                        )),
                        span,
                    ));
                }
                for member in &members {
                    let Some(field) = fields.iter_mut().find(|f| f.name == member.name) else {
                        return Err(self.err(
                            SemanticErrorKind::TypeMismatch(format!(
                                "missing field `{}` in struct literal `{}`",
                                member.name, name
                            )),
                            span,
                        ));
                    };
                    let capped = self.cap(&field.value.candidate_types, &[member.ty]);
                    if capped.is_empty() {
                        return Err(self.err(
                            SemanticErrorKind::TypeMismatch(format!(
                                "field `{}` of `{}` expects `{}`",
                                member.name,
                                name,
                                self.types.display(member.ty)
                            )),
                            field.value.span,
                        ));
                    }
                    field.value.candidate_types = capped;
                }
                expr.candidate_types = vec![ty];
            }
            ExprKind::Call { callee, args } => {
                self.check_expr(callee, scope)?;
                let callee_ty = callee.candidate_types[0];
                let TypeKind::Function(sig) = self.types.kind(callee_ty) else {
                    return Err(self.err(
                        SemanticErrorKind::InvalidOperand(format!(
                            "call target has non-function type `{}`",
                            self.types.display(callee_ty)
                        )),
                        callee.span,
                    ));
                };
                let sig = sig.clone();
                if sig.has_receiver && sig.receiver_is_mut && !callee.is_mutable {
                    return Err(self.err(SemanticErrorKind::NotMutable, callee.span));
                }
                if args.len() != sig.params.len() {
                    return Err(self.err(
                        SemanticErrorKind::ArityMismatch {
                            expected: sig.params.len(),
                            found: args.len(),
                        },
                        span,
                    ));
                }
                for (arg, formal) in args.iter_mut().zip(sig.params.iter()) {
                    self.check_expr(arg, scope)?;
                    let capped = self.cap(&arg.candidate_types, &[*formal]);
                    if capped.is_empty() {
                        return Err(self.err(
                            SemanticErrorKind::TypeMismatch(format!(
                                "argument has type `{}`, expected `{}`",
                                self.display_candidates(&arg.candidate_types),
                                self.types.display(*formal)
                            )),
                            arg.span,
                        ));
                    }
                    arg.candidate_types = capped;
                }
                expr.candidate_types = vec![sig.ret];
            }
            ExprKind::Index { base, index } => {
                self.check_expr(base, scope)?;
                if !base.is_assignable {
                    return Err(self.err(SemanticErrorKind::NotAssignable, base.span));
                }
                let is_mutable = base.is_mutable;
                // Auto-dereference down to the array
                let mut current = base.candidate_types[0];
                let elem = loop {
                    match self.types.kind(current) {
                        TypeKind::Array { elem, .. } => break *elem,
                        TypeKind::Reference { inner, .. } => current = *inner,
                        _ => {
                            return Err(self.err(
                                SemanticErrorKind::InvalidIndexBase(
                                    self.types.display(base.candidate_types[0]),
                                ),
                                base.span,
                            ))
                        }
                    }
                };
                self.check_expr(index, scope)?;
                let usize_ty = self.usize_ty;
                if !index
                    .candidate_types
                    .iter()
                    .any(|t| self.types.equal(*t, usize_ty))
                {
                    return Err(self.err(
                        SemanticErrorKind::TypeMismatch(format!(
                            "array index has type `{}`, expected `usize`",
                            self.display_candidates(&index.candidate_types)
                        )),
                        index.span,
                    ));
                }
                index.candidate_types = vec![usize_ty];
                expr.is_mutable = is_mutable;
                expr.candidate_types = vec![elem];
            }
            ExprKind::Member { base, name } => {
                self.check_expr(base, scope)?;
                let is_mutable = base.is_mutable;
                let mut current = base.candidate_types[0];
                let found = loop {
                    if let Some(ty) = self.member_or_method(current, name) {
                        break ty;
                    }
                    match self.types.kind(current) {
                        TypeKind::Reference { inner, .. } => current = *inner,
                        _ => {
                            return Err(self.err(
                                SemanticErrorKind::InvalidMemberAccess {
                                    member: name.clone(),
                                    ty: self.types.display(base.candidate_types[0]),
                                },
                                span,
                            ))
                        }
                    }
                };
                expr.is_mutable = is_mutable;
                expr.candidate_types = vec![found];
            }
            ExprKind::Unary { op, operand } => {
                let op = *op;
                self.check_expr(operand, scope)?;
                match op {
                    UnaryOp::Neg => {
                        let kept: Vec<TypeId> = operand
                            .candidate_types
                            .iter()
                            .copied()
                            .filter(|t| self.types.is_signed_integer(*t))
                            .collect();
                        if kept.is_empty() {
                            return Err(self.err(
                                SemanticErrorKind::InvalidOperand(
                                    "unary `-` requires a signed integer".to_string(),
                                ),
                                span,
                            ));
                        }
                        expr.candidate_types = kept;
                    }
                    UnaryOp::Not => {
                        let bool_ty = self.bool_ty;
                        let kept: Vec<TypeId> = operand
                            .candidate_types
                            .iter()
                            .copied()
                            .filter(|t| {
                                self.types.is_integer(*t) || self.types.equal(*t, bool_ty)
                            })
                            .collect();
                        if kept.is_empty() {
                            return Err(self.err(
                                SemanticErrorKind::InvalidOperand(
                                    "unary `!` requires an integer or `bool`".to_string(),
                                ),
                                span,
                            ));
                        }
                        expr.candidate_types = kept;
                    }
                    UnaryOp::Ref | UnaryOp::RefMut => {
                        let is_mut = op == UnaryOp::RefMut;
                        let mut out = Vec::with_capacity(operand.candidate_types.len());
                        for t in &operand.candidate_types {
                            out.push(self.types.alloc(TypeKind::Reference {
                                inner: *t,
                                is_mut,
                            }));
                        }
                        expr.candidate_types = out;
                    }
                    UnaryOp::Deref => {
                        let mut out = Vec::new();
                        for t in &operand.candidate_types {
                            if let TypeKind::Reference { inner, .. } = self.types.kind(*t) {
                                out.push(*inner);
                            }
                        }
                        if out.is_empty() {
                            return Err(self.err(
                                SemanticErrorKind::InvalidOperand(
                                    "cannot dereference a non-reference".to_string(),
                                ),
                                span,
                            ));
                        }
                        expr.is_assignable = true;
                        expr.is_mutable = operand.is_mutable;
                        expr.candidate_types = out;
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                self.check_expr(lhs, scope)?;
                self.check_expr(rhs, scope)?;
                let result = self.binary_result(op, lhs, rhs, span)?;
                expr.candidate_types = result;
            }
            ExprKind::Assign { lhs, rhs } => {
                self.check_expr(lhs, scope)?;
                if !lhs.is_assignable {
                    return Err(self.err(SemanticErrorKind::NotAssignable, lhs.span));
                }
                // A never-assigned immutable binding admits exactly one
                // assignment
                let simple_name = match &lhs.kind {
                    ExprKind::Path(path) => path.single().map(|s| s.to_string()),
                    _ => None,
                };
                let assigned = simple_name
                    .as_deref()
                    .and_then(|name| self.scopes.lookup(scope, name))
                    .map(|s| s.is_assigned)
                    .unwrap_or(true);
                if !lhs.is_mutable && assigned {
                    return Err(self.err(SemanticErrorKind::NotMutable, lhs.span));
                }
                self.check_expr(rhs, scope)?;
                if let Some(name) = simple_name {
                    self.scopes.mark_assigned(scope, &name);
                }
                expr.candidate_types = vec![self.void];
            }
            ExprKind::Cast { operand, ty } => {
                let target = self.resolve(scope, ty)?;
                self.check_expr(operand, scope)?;
                expr.candidate_types = vec![target];
            }
            ExprKind::Block(block) => {
                expr.candidate_types = self.check_block(block)?;
            }
            ExprKind::If {
                cond,
                then_block,
                else_branch,
            } => {
                self.check_condition(cond, scope)?;
                let then_types = self.check_block(then_block)?;
                match else_branch {
                    Some(else_branch) => {
                        self.check_expr(else_branch, scope)?;
                        let capped = self.cap(&then_types, &else_branch.candidate_types);
                        if capped.is_empty() {
                            return Err(self.err(
                                SemanticErrorKind::TypeMismatch(format!(
                                    "`if` has type `{}` but `else` has type `{}`",
                                    self.display_candidates(&then_types),
                                    self.display_candidates(&else_branch.candidate_types),
                                )),
                                span,
                            ));
                        }
                        expr.candidate_types = capped;
                    }
                    None => {
                        expr.candidate_types = vec![self.void];
                    }
                }
            }
            ExprKind::While { cond, body } => {
                self.check_condition(cond, scope)?;
                self.loops.push(LoopCtx {
                    kind: LoopKind::While,
                    break_types: Vec::new(),
                });
                self.check_block(body)?;
                self.loops.pop();
                expr.candidate_types = vec![self.void];
            }
            ExprKind::Loop { body } => {
                self.loops.push(LoopCtx {
                    kind: LoopKind::Loop,
                    break_types: Vec::new(),
                });
                self.check_block(body)?;
                let ctx = self.loops.pop();
                let break_types = ctx.map(|c| c.break_types).unwrap_or_default();
                expr.candidate_types = if break_types.is_empty() {
                    vec![self.never]
                } else {
                    break_types
                };
            }
            ExprKind::Match { scrutinee, arms } => {
                self.check_expr(scrutinee, scope)?;
                let scrutinee_ty = scrutinee.candidate_types[0];
                let mut result: Option<Vec<TypeId>> = None;
                let saved_interrupt = self.interrupt;
                for arm in arms.iter_mut() {
                    let arm_scope = arm.scope.unwrap_or(scope);
                    self.bind_pattern(&mut arm.pattern, scrutinee_ty, arm_scope)?;
                    if let Some(guard) = &mut arm.guard {
                        self.check_condition(guard, arm_scope)?;
                    }
                    self.check_expr(&mut arm.body, arm_scope)?;
                    self.interrupt = saved_interrupt;
                    result = Some(match result {
                        None => arm.body.candidate_types.clone(),
                        Some(acc) => {
                            let capped = self.cap(&acc, &arm.body.candidate_types);
                            if capped.is_empty() {
                                return Err(self.err(
                                    SemanticErrorKind::TypeMismatch(
                                        "match arms have incompatible types".to_string(),
                                    ),
                                    arm.span,
                                ));
                            }
                            capped
                        }
                    });
                }
                expr.candidate_types = result.unwrap_or_else(|| vec![self.void]);
            }
            ExprKind::Break { value } => {
                let Some(ctx) = self.loops.last() else {
                    return Err(
                        self.err(SemanticErrorKind::BreakOrContinueOutsideLoop("break"), span)
                    );
                };
                let kind = ctx.kind;
                let payload = match value {
                    Some(value) => {
                        if kind == LoopKind::While {
                            return Err(self.err(
                                SemanticErrorKind::InvalidOperand(
                                    "`break` with a value is only allowed inside `loop`"
                                        .to_string(),
                                ),
                                span,
                            ));
                        }
                        self.check_expr(value, scope)?;
                        value.candidate_types.clone()
                    }
                    None => vec![self.void],
                };
                let existing = self
                    .loops
                    .last()
                    .map(|c| c.break_types.clone())
                    .unwrap_or_default();
                let merged = if existing.is_empty() {
                    payload
                } else {
                    let capped = self.cap(&existing, &payload);
                    if capped.is_empty() {
                        return Err(self.err(
                            SemanticErrorKind::TypeMismatch(
                                "`break` values have incompatible types".to_string(),
                            ),
                            span,
                        ));
                    }
                    capped
                };
                if let Some(ctx) = self.loops.last_mut() {
                    ctx.break_types = merged;
                }
                self.interrupt = true;
                expr.candidate_types = vec![self.never];
            }
            ExprKind::Continue => {
                if self.loops.is_empty() {
                    return Err(self.err(
                        SemanticErrorKind::BreakOrContinueOutsideLoop("continue"),
                        span,
                    ));
                }
                self.interrupt = true;
                expr.candidate_types = vec![self.never];
            }
            ExprKind::Return { value } => {
                let payload = match value {
                    Some(value) => {
                        self.check_expr(value, scope)?;
                        value.candidate_types.clone()
                    }
                    None => vec![self.void],
                };
                let existing = std::mem::take(&mut self.function_return);
                self.function_return = if existing.is_empty() {
                    payload
                } else {
                    let capped = self.cap(&existing, &payload);
                    if capped.is_empty() {
                        return Err(self.err(
                            SemanticErrorKind::TypeMismatch(
                                "`return` type is not consistent in function".to_string(),
                            ),
                            span,
                        ));
                    }
                    capped
                };
                self.interrupt = true;
                expr.candidate_types = vec![self.never];
            }
        }
        Ok(())
    }

    /// Path expressions: bare names, `Type::assoc` and `Enum::Variant`
    fn check_path(&mut self, expr: &mut Expr, scope: ScopeId) -> Result<(), SemanticError> {
        let span = expr.span;
        let ExprKind::Path(path) = &expr.kind else {
            return Ok(());
        };
        match path.segments.as_slice() {
            [name] => {
                let Some(symbol) = self.scopes.lookup(scope, name) else {
                    return Err(SemanticError::new(
                        SemanticErrorKind::UndeclaredName(name.clone()),
                        span,
                    ));
                };
                let ty = symbol.ty;
                let is_mutable = symbol.is_mutable;
                let is_const = symbol.is_const;
                let name = name.clone();
                expr.candidate_types = vec![ty];
                expr.is_mutable = is_mutable;
                if is_const {
                    expr.is_compiler_known = true;
                    expr.constant_value = self.scopes.lookup_constant(scope, &name).cloned();
                }
            }
            [type_name, member] => {
                let Some(symbol) = self.scopes.lookup(scope, type_name) else {
                    return Err(SemanticError::new(
                        SemanticErrorKind::UndeclaredName(type_name.clone()),
                        span,
                    ));
                };
                let ty = symbol.ty;
                if let TypeKind::Enumeration { variants, .. } = self.types.kind(ty) {
                    if variants.contains(member) {
                        let value = self.types.get(ty).value_map.get(member).cloned();
                        expr.is_compiler_known = true;
                        expr.constant_value = value;
                        expr.candidate_types = vec![ty];
                        return Ok(());
                    }
                }
                if let Some(fn_ty) = self.types.associated_function(ty, member) {
                    expr.candidate_types = vec![fn_ty];
                    return Ok(());
                }
                if let Some(const_ty) = self.types.associated_constant(ty, member) {
                    let value = self.types.get(ty).value_map.get(member).cloned();
                    expr.is_compiler_known = true;
                    expr.constant_value = value;
                    expr.candidate_types = vec![const_ty];
                    return Ok(());
                }
                return Err(self.err(
                    SemanticErrorKind::InvalidMemberAccess {
                        member: member.clone(),
                        ty: self.types.display(ty),
                    },
                    span,
                ));
            }
            _ => {
                return Err(SemanticError::new(
                    SemanticErrorKind::UndeclaredName(path.join()),
                    span,
                ));
            }
        }
        Ok(())
    }

    /// Conditions of `if`, `while` and match guards must admit `bool`
    fn check_condition(&mut self, cond: &mut Expr, scope: ScopeId) -> Result<(), SemanticError> {
        self.check_expr(cond, scope)?;
        let bool_ty = self.bool_ty;
        if !cond
            .candidate_types
            .iter()
            .any(|t| self.types.equal(*t, bool_ty))
        {
            return Err(self.err(
                SemanticErrorKind::InvalidOperand(format!(
                    "condition has type `{}`, expected `bool`",
                    self.display_candidates(&cond.candidate_types)
                )),
                cond.span,
            ));
        }
        cond.candidate_types = vec![bool_ty];
        Ok(())
    }

    fn binary_result(
        &mut self,
        op: BinaryOp,
        lhs: &mut Expr,
        rhs: &mut Expr,
        span: crate::diagnostics::Span,
    ) -> Result<Vec<TypeId>, SemanticError> {
        let invalid = |this: &Self| {
            SemanticError::new(
                SemanticErrorKind::InvalidOperand(format!(
                    "`{}` cannot be applied to `{}` and `{}`",
                    op.symbol(),
                    this.display_candidates(&lhs.candidate_types),
                    this.display_candidates(&rhs.candidate_types),
                )),
                span,
            )
        };
        match op {
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => {
                let capped = self.cap(&lhs.candidate_types, &rhs.candidate_types);
                let comparable = capped.iter().any(|t| {
                    self.is_comparable_primitive(*t)
                        || (matches!(op, BinaryOp::Eq | BinaryOp::Ne)
                            && matches!(self.types.kind(*t), TypeKind::Enumeration { .. }))
                });
                if !comparable {
                    return Err(invalid(self));
                }
                Ok(vec![self.bool_ty])
            }
            BinaryOp::And | BinaryOp::Or => {
                let capped = self.cap(&lhs.candidate_types, &rhs.candidate_types);
                let bool_ty = self.bool_ty;
                if !capped.iter().any(|t| self.types.equal(*t, bool_ty)) {
                    return Err(invalid(self));
                }
                Ok(vec![bool_ty])
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                let capped = self.cap(&lhs.candidate_types, &rhs.candidate_types);
                let bool_ty = self.bool_ty;
                let kept: Vec<TypeId> = capped
                    .into_iter()
                    .filter(|t| self.types.is_integer(*t) || self.types.equal(*t, bool_ty))
                    .collect();
                if kept.is_empty() {
                    return Err(invalid(self));
                }
                Ok(kept)
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                // The two sides need not agree, each just has to be an
                // integer
                let kept: Vec<TypeId> = lhs
                    .candidate_types
                    .iter()
                    .copied()
                    .filter(|t| self.types.is_integer(*t))
                    .collect();
                if kept.is_empty() {
                    return Err(invalid(self));
                }
                if !rhs
                    .candidate_types
                    .iter()
                    .any(|t| self.types.is_integer(*t))
                {
                    return Err(invalid(self));
                }
                Ok(kept)
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                let capped = self.cap(&lhs.candidate_types, &rhs.candidate_types);
                let kept: Vec<TypeId> = capped
                    .into_iter()
                    .filter(|t| self.types.is_integer(*t))
                    .collect();
                if kept.is_empty() {
                    return Err(invalid(self));
                }
                Ok(kept)
            }
        }
    }

    /// Declare pattern bindings into the arm scope and validate constant
    /// patterns
    fn bind_pattern(
        &mut self,
        pattern: &mut Pattern,
        scrutinee_ty: TypeId,
        scope: ScopeId,
    ) -> Result<(), SemanticError> {
        match &mut pattern.kind {
            PatternKind::Wildcard => Ok(()),
            PatternKind::Binding { name, is_mut } => self.scopes.declare(
                scope,
                Symbol::new(name.as_str(), scrutinee_ty, SymbolKind::Variable, pattern.span)
                    .mutable(*is_mut),
                false,
            ),
            PatternKind::Literal(expr) => self.check_expr(expr, scope),
            PatternKind::Path(path) => {
                let span = pattern.span;
                match path.segments.as_slice() {
                    [type_name, member] => {
                        let Some(symbol) = self.scopes.lookup(scope, type_name) else {
                            return Err(SemanticError::new(
                                SemanticErrorKind::UndeclaredName(type_name.clone()),
                                span,
                            ));
                        };
                        let ty = symbol.ty;
                        if let TypeKind::Enumeration { variants, .. } = self.types.kind(ty) {
                            if variants.contains(member) {
                                return Ok(());
                            }
                        }
                        Err(self.err(
                            SemanticErrorKind::InvalidMemberAccess {
                                member: member.clone(),
                                ty: self.types.display(ty),
                            },
                            span,
                        ))
                    }
                    [name] => {
                        if self.scopes.lookup(scope, name).is_none() {
                            return Err(SemanticError::new(
                                SemanticErrorKind::UndeclaredName(name.clone()),
                                span,
                            ));
                        }
                        Ok(())
                    }
                    _ => Err(SemanticError::new(
                        SemanticErrorKind::UndeclaredName(path.join()),
                        span,
                    )),
                }
            }
        }
    }

    /// Struct fields take precedence over methods, matching member access
    fn member_or_method(&self, ty: TypeId, name: &str) -> Option<TypeId> {
        if let TypeKind::Struct { members, .. } = self.types.kind(ty) {
            if let Some(member) = members.iter().find(|m| m.name == name) {
                return Some(member.ty);
            }
        }
        self.types.method(ty, name)
    }

    fn is_comparable_primitive(&self, ty: TypeId) -> bool {
        matches!(
            self.types.kind(ty),
            TypeKind::Primitive(name)
                if matches!(
                    name.as_str(),
                    "i32" | "u32" | "isize" | "usize" | "char" | "string" | "cstring" | "bool"
                )
        )
    }

    fn suffix_type(&mut self, suffix: crate::parser::lexer::IntSuffix) -> TypeId {
        use crate::parser::lexer::IntSuffix;
        match suffix {
            IntSuffix::I32 => self.types.primitive("i32"),
            IntSuffix::U32 => self.types.primitive("u32"),
            IntSuffix::Isize => self.types.primitive("isize"),
            IntSuffix::Usize => self.types.primitive("usize"),
        }
    }

    /// The four-way candidate set of an unsuffixed integer literal
    fn integer_candidates(&mut self) -> Vec<TypeId> {
        vec![
            self.types.primitive("i32"),
            self.types.primitive("u32"),
            self.types.primitive("isize"),
            self.types.primitive("usize"),
        ]
    }

    fn display_candidates(&self, candidates: &[TypeId]) -> String {
        match candidates {
            [single] => self.types.display(*single),
            _ => {
                let names: Vec<String> =
                    candidates.iter().map(|t| self.types.display(*t)).collect();
                format!("{{{}}}", names.join(", "))
            }
        }
    }
}
