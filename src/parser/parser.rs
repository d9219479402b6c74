//! Recursive descent parser for Rill
#![allow(clippy::result_large_err)]

use crate::diagnostics::{error_codes, Diagnostic, DiagnosticBag, Span};
use crate::parser::ast::*;
use crate::parser::lexer::{Lexer, Token, TokenKind};
use crate::parser::span::SourceFile;
use std::collections::VecDeque;

/// Parser for Rill source code
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    source: &'a SourceFile,
    errors: DiagnosticBag,
    /// Tokens pulled from the lexer but not yet consumed
    lookahead: VecDeque<Token>,
    /// Span of the most recently consumed token
    last_span: Span,
}

impl<'a> Parser<'a> {
    /// Create a new parser
    pub fn new(lexer: Lexer<'a>, source: &'a SourceFile) -> Self {
        Self {
            lexer,
            source,
            errors: DiagnosticBag::new(),
            lookahead: VecDeque::new(),
            last_span: Span::default(),
        }
    }

    /// Parse a complete crate
    pub fn parse_crate(&mut self) -> Result<Crate, DiagnosticBag> {
        let start = self.current_span();
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Ok(token) if token.kind == TokenKind::Eof => break,
                Ok(_) => match self.parse_item() {
                    Ok(item) => items.push(item),
                    Err(diag) => {
                        self.errors.push(diag);
                        self.recover_to_next_item();
                    }
                },
                Err(diag) => {
                    self.errors.push(diag);
                    break;
                }
            }
        }

        if self.errors.has_errors() {
            return Err(self.errors.clone());
        }

        Ok(Crate {
            id: NodeId::new(),
            span: start.to(self.last_span),
            items,
            scope: None,
        })
    }

    fn parse_item(&mut self) -> Result<Item, Diagnostic> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Fn => self.parse_function().map(Item::Function),
            TokenKind::Struct => self.parse_struct().map(Item::Struct),
            TokenKind::Enum => self.parse_enum().map(Item::Enum),
            TokenKind::Const => self.parse_const().map(Item::Const),
            TokenKind::Impl => self.parse_impl().map(Item::Impl),
            TokenKind::Trait => self.parse_trait().map(Item::Trait),
            _ => Err(self.error_unexpected("an item")),
        }
    }

    fn parse_function(&mut self) -> Result<FunctionItem, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Fn)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;

        let self_param = self.parse_self_param()?;
        if self_param.is_some() && !self.check(TokenKind::RParen)? {
            self.expect(TokenKind::Comma)?;
        }

        let mut params = Vec::new();
        while !self.check(TokenKind::RParen)? {
            params.push(self.parse_param()?);
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let ret = if self.eat(TokenKind::Arrow)? {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.eat(TokenKind::Semi)? {
            None
        } else {
            Some(self.parse_block()?)
        };

        Ok(FunctionItem {
            id: NodeId::new(),
            span: start.to(self.last_span),
            name,
            self_param,
            params,
            ret,
            body,
        })
    }

    /// `self`, `&self` or `&mut self` at the head of a parameter list
    fn parse_self_param(&mut self) -> Result<Option<SelfParam>, Diagnostic> {
        let start = self.current_span();
        if self.check(TokenKind::SelfValue)? {
            self.advance()?;
            return Ok(Some(SelfParam {
                id: NodeId::new(),
                span: start.to(self.last_span),
                is_ref: false,
                is_mut: false,
            }));
        }
        if self.check(TokenKind::Amp)? {
            // Only commit once `self` is certain; `&T` params do not exist
            // in a free function head anyway, but peek carefully
            let after_amp = self.peek_second()?;
            let is_mut = after_amp == TokenKind::Mut;
            let is_self = after_amp == TokenKind::SelfValue
                || (is_mut && self.peek_third()? == TokenKind::SelfValue);
            if !is_self {
                return Ok(None);
            }
            self.advance()?;
            if is_mut {
                self.advance()?;
            }
            self.expect(TokenKind::SelfValue)?;
            return Ok(Some(SelfParam {
                id: NodeId::new(),
                span: start.to(self.last_span),
                is_ref: true,
                is_mut,
            }));
        }
        Ok(None)
    }

    fn parse_param(&mut self) -> Result<Param, Diagnostic> {
        let start = self.current_span();
        let is_mut = self.eat(TokenKind::Mut)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Ok(Param {
            id: NodeId::new(),
            span: start.to(self.last_span),
            name,
            is_mut,
            ty,
        })
    }

    fn parse_struct(&mut self) -> Result<StructItem, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Struct)?;
        let name = self.expect_ident()?;

        let mut fields = Vec::new();
        if !self.eat(TokenKind::Semi)? {
            self.expect(TokenKind::LBrace)?;
            while !self.check(TokenKind::RBrace)? {
                let field_start = self.current_span();
                let field_name = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                fields.push(FieldDef {
                    id: NodeId::new(),
                    span: field_start.to(self.last_span),
                    name: field_name,
                    ty,
                });
                if !self.eat(TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RBrace)?;
        }

        Ok(StructItem {
            id: NodeId::new(),
            span: start.to(self.last_span),
            name,
            fields,
        })
    }

    fn parse_enum(&mut self) -> Result<EnumItem, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Enum)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut variants = Vec::new();
        while !self.check(TokenKind::RBrace)? {
            let variant_start = self.current_span();
            let variant_name = self.expect_ident()?;
            let discriminant = if self.eat(TokenKind::Eq)? {
                Some(self.parse_expr(true)?)
            } else {
                None
            };
            variants.push(VariantDef {
                id: NodeId::new(),
                span: variant_start.to(self.last_span),
                name: variant_name,
                discriminant,
            });
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(EnumItem {
            id: NodeId::new(),
            span: start.to(self.last_span),
            name,
            variants,
        })
    }

    fn parse_const(&mut self) -> Result<ConstItem, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Const)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        self.expect(TokenKind::Eq)?;
        let init = self.parse_expr(false)?;
        self.expect(TokenKind::Semi)?;
        Ok(ConstItem {
            id: NodeId::new(),
            span: start.to(self.last_span),
            name,
            ty,
            init,
        })
    }

    fn parse_impl(&mut self) -> Result<ImplItem, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Impl)?;
        let target_name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let items = self.parse_assoc_items()?;
        self.expect(TokenKind::RBrace)?;
        Ok(ImplItem {
            id: NodeId::new(),
            span: start.to(self.last_span),
            target_name,
            items,
            scope: None,
        })
    }

    fn parse_trait(&mut self) -> Result<TraitItem, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Trait)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let items = self.parse_assoc_items()?;
        self.expect(TokenKind::RBrace)?;
        Ok(TraitItem {
            id: NodeId::new(),
            span: start.to(self.last_span),
            name,
            items,
        })
    }

    fn parse_assoc_items(&mut self) -> Result<Vec<AssocItem>, Diagnostic> {
        let mut items = Vec::new();
        loop {
            let token = self.peek()?;
            match token.kind {
                TokenKind::Fn => items.push(AssocItem::Function(self.parse_function()?)),
                TokenKind::Const => items.push(AssocItem::Const(self.parse_const()?)),
                _ => break,
            }
        }
        Ok(items)
    }

    fn parse_type(&mut self) -> Result<TypeNode, Diagnostic> {
        let start = self.current_span();
        let token = self.peek()?;
        let kind = match token.kind {
            TokenKind::LParen => {
                self.advance()?;
                if self.eat(TokenKind::RParen)? {
                    TypeNodeKind::Unit
                } else {
                    let first = self.parse_type()?;
                    if self.eat(TokenKind::Comma)? {
                        let mut elems = vec![first];
                        while !self.check(TokenKind::RParen)? {
                            elems.push(self.parse_type()?);
                            if !self.eat(TokenKind::Comma)? {
                                break;
                            }
                        }
                        self.expect(TokenKind::RParen)?;
                        TypeNodeKind::Tuple(elems)
                    } else {
                        self.expect(TokenKind::RParen)?;
                        return Ok(first);
                    }
                }
            }
            TokenKind::LBracket => {
                self.advance()?;
                let elem = self.parse_type()?;
                if self.eat(TokenKind::Semi)? {
                    let len = self.parse_expr(false)?;
                    self.expect(TokenKind::RBracket)?;
                    TypeNodeKind::Array {
                        elem: Box::new(elem),
                        len: Box::new(len),
                    }
                } else {
                    self.expect(TokenKind::RBracket)?;
                    TypeNodeKind::Slice(Box::new(elem))
                }
            }
            TokenKind::Amp => {
                self.advance()?;
                let is_mut = self.eat(TokenKind::Mut)?;
                let inner = self.parse_type()?;
                TypeNodeKind::Reference {
                    inner: Box::new(inner),
                    is_mut,
                }
            }
            TokenKind::Ident(name) => {
                self.advance()?;
                TypeNodeKind::Path(name)
            }
            _ => {
                return Err(self.error_with_code(
                    error_codes::syntax::INVALID_TYPE,
                    "expected a type",
                ))
            }
        };
        Ok(TypeNode::new(kind, start.to(self.last_span)))
    }

    fn parse_block(&mut self) -> Result<Block, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::LBrace)?;

        let mut stmts = Vec::new();
        let mut tail = None;
        while !self.check(TokenKind::RBrace)? {
            let token = self.peek()?;
            match token.kind {
                TokenKind::Semi => {
                    let span = self.current_span();
                    self.advance()?;
                    stmts.push(Stmt::Empty {
                        id: NodeId::new(),
                        span,
                    });
                }
                TokenKind::Fn
                | TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::Const
                | TokenKind::Impl
                | TokenKind::Trait => {
                    stmts.push(Stmt::Item(self.parse_item()?));
                }
                TokenKind::Let => {
                    stmts.push(Stmt::Let(self.parse_let()?));
                }
                _ => {
                    let stmt_start = self.current_span();
                    let expr = self.parse_expr(false)?;
                    if self.eat(TokenKind::Semi)? {
                        stmts.push(Stmt::Expr {
                            id: NodeId::new(),
                            span: stmt_start.to(self.last_span),
                            expr,
                            has_semi: true,
                        });
                    } else if self.check(TokenKind::RBrace)? {
                        tail = Some(Box::new(expr));
                    } else if expr_stands_alone(&expr) {
                        stmts.push(Stmt::Expr {
                            id: NodeId::new(),
                            span: stmt_start.to(self.last_span),
                            expr,
                            has_semi: false,
                        });
                    } else {
                        return Err(self.error_with_code(
                            error_codes::syntax::MISSING_SEMICOLON,
                            "expected `;` after expression",
                        ));
                    }
                }
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Block {
            id: NodeId::new(),
            span: start.to(self.last_span),
            stmts,
            tail,
            scope: None,
        })
    }

    fn parse_let(&mut self) -> Result<LetStmt, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Let)?;
        let is_mut = self.eat(TokenKind::Mut)?;
        let name = self.expect_ident()?;
        let ty = if self.eat(TokenKind::Colon)? {
            Some(self.parse_type()?)
        } else {
            None
        };
        let mut init = None;
        let mut else_block = None;
        if self.eat(TokenKind::Eq)? {
            init = Some(self.parse_expr(false)?);
            if self.eat(TokenKind::Else)? {
                else_block = Some(self.parse_block()?);
            }
        }
        self.expect(TokenKind::Semi)?;
        Ok(LetStmt {
            id: NodeId::new(),
            span: start.to(self.last_span),
            name,
            is_mut,
            ty,
            init,
            else_block,
        })
    }

    /// Parse an expression. `no_struct` suppresses struct literals, for the
    /// condition positions where `Name {` must read as a block start.
    fn parse_expr(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let lhs = self.parse_or(no_struct)?;
        if self.check(TokenKind::Eq)? {
            self.advance()?;
            // Right-associative, although chained assignment fails the
            // checker anyway
            let rhs = self.parse_expr(no_struct)?;
            return Ok(Expr::new(
                ExprKind::Assign {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                start.to(self.last_span),
            ));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut lhs = self.parse_and(no_struct)?;
        while self.eat(TokenKind::OrOr)? {
            let rhs = self.parse_and(no_struct)?;
            lhs = binary(BinaryOp::Or, lhs, rhs, start.to(self.last_span));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut lhs = self.parse_comparison(no_struct)?;
        while self.eat(TokenKind::AndAnd)? {
            let rhs = self.parse_comparison(no_struct)?;
            lhs = binary(BinaryOp::And, lhs, rhs, start.to(self.last_span));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut lhs = self.parse_bitor(no_struct)?;
        loop {
            let op = match self.peek()?.kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => break,
            };
            self.advance()?;
            let rhs = self.parse_bitor(no_struct)?;
            lhs = binary(op, lhs, rhs, start.to(self.last_span));
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut lhs = self.parse_bitxor(no_struct)?;
        while self.eat(TokenKind::Pipe)? {
            let rhs = self.parse_bitxor(no_struct)?;
            lhs = binary(BinaryOp::BitOr, lhs, rhs, start.to(self.last_span));
        }
        Ok(lhs)
    }

    fn parse_bitxor(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut lhs = self.parse_bitand(no_struct)?;
        while self.eat(TokenKind::Caret)? {
            let rhs = self.parse_bitand(no_struct)?;
            lhs = binary(BinaryOp::BitXor, lhs, rhs, start.to(self.last_span));
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut lhs = self.parse_shift(no_struct)?;
        while self.eat(TokenKind::Amp)? {
            let rhs = self.parse_shift(no_struct)?;
            lhs = binary(BinaryOp::BitAnd, lhs, rhs, start.to(self.last_span));
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut lhs = self.parse_addsub(no_struct)?;
        loop {
            let op = match self.peek()?.kind {
                TokenKind::Shl => BinaryOp::Shl,
                TokenKind::Shr => BinaryOp::Shr,
                _ => break,
            };
            self.advance()?;
            let rhs = self.parse_addsub(no_struct)?;
            lhs = binary(op, lhs, rhs, start.to(self.last_span));
        }
        Ok(lhs)
    }

    fn parse_addsub(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut lhs = self.parse_muldiv(no_struct)?;
        loop {
            let op = match self.peek()?.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance()?;
            let rhs = self.parse_muldiv(no_struct)?;
            lhs = binary(op, lhs, rhs, start.to(self.last_span));
        }
        Ok(lhs)
    }

    fn parse_muldiv(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut lhs = self.parse_cast(no_struct)?;
        loop {
            let op = match self.peek()?.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance()?;
            let rhs = self.parse_cast(no_struct)?;
            lhs = binary(op, lhs, rhs, start.to(self.last_span));
        }
        Ok(lhs)
    }

    fn parse_cast(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut expr = self.parse_unary(no_struct)?;
        while self.eat(TokenKind::As)? {
            let ty = self.parse_type()?;
            expr = Expr::new(
                ExprKind::Cast {
                    operand: Box::new(expr),
                    ty,
                },
                start.to(self.last_span),
            );
        }
        Ok(expr)
    }

    fn parse_unary(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let op = match self.peek()?.kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::Amp => {
                self.advance()?;
                let op = if self.eat(TokenKind::Mut)? {
                    UnaryOp::RefMut
                } else {
                    UnaryOp::Ref
                };
                let operand = self.parse_unary(no_struct)?;
                return Ok(Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    start.to(self.last_span),
                ));
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance()?;
                let operand = self.parse_unary(no_struct)?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    start.to(self.last_span),
                ))
            }
            None => self.parse_postfix(no_struct),
        }
    }

    fn parse_postfix(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut expr = self.parse_primary(no_struct)?;
        loop {
            let token = self.peek()?;
            match token.kind {
                TokenKind::LParen => {
                    self.advance()?;
                    let mut args = Vec::new();
                    while !self.check(TokenKind::RParen)? {
                        args.push(self.parse_expr(false)?);
                        if !self.eat(TokenKind::Comma)? {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        start.to(self.last_span),
                    );
                }
                TokenKind::LBracket => {
                    self.advance()?;
                    let index = self.parse_expr(false)?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::new(
                        ExprKind::Index {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                        start.to(self.last_span),
                    );
                }
                TokenKind::Dot => {
                    self.advance()?;
                    let name = self.expect_ident()?;
                    expr = Expr::new(
                        ExprKind::Member {
                            base: Box::new(expr),
                            name,
                        },
                        start.to(self.last_span),
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let token = self.peek()?;
        match token.kind {
            TokenKind::IntLit(lit) => {
                self.advance()?;
                Ok(Expr::new(
                    ExprKind::IntLit {
                        value: lit.value,
                        suffix: lit.suffix,
                    },
                    start,
                ))
            }
            TokenKind::True => {
                self.advance()?;
                Ok(Expr::new(ExprKind::BoolLit { value: true }, start))
            }
            TokenKind::False => {
                self.advance()?;
                Ok(Expr::new(ExprKind::BoolLit { value: false }, start))
            }
            TokenKind::CharLit(value) => {
                self.advance()?;
                Ok(Expr::new(ExprKind::CharLit { value }, start))
            }
            TokenKind::StrLit(value) => {
                self.advance()?;
                Ok(Expr::new(ExprKind::StrLit { value }, start))
            }
            TokenKind::CStrLit(value) => {
                self.advance()?;
                Ok(Expr::new(ExprKind::CStrLit { value }, start))
            }
            TokenKind::LParen => {
                self.advance()?;
                if self.eat(TokenKind::RParen)? {
                    return Ok(Expr::new(ExprKind::Unit, start.to(self.last_span)));
                }
                let first = self.parse_expr(false)?;
                if self.eat(TokenKind::Comma)? {
                    let mut elems = vec![first];
                    while !self.check(TokenKind::RParen)? {
                        elems.push(self.parse_expr(false)?);
                        if !self.eat(TokenKind::Comma)? {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    Ok(Expr::new(
                        ExprKind::TupleLit { elems },
                        start.to(self.last_span),
                    ))
                } else {
                    self.expect(TokenKind::RParen)?;
                    // Parentheses are only grouping; no node of their own
                    Ok(first)
                }
            }
            TokenKind::LBracket => {
                self.advance()?;
                if self.eat(TokenKind::RBracket)? {
                    return Ok(Expr::new(
                        ExprKind::ArrayLit { elems: Vec::new() },
                        start.to(self.last_span),
                    ));
                }
                let first = self.parse_expr(false)?;
                if self.eat(TokenKind::Semi)? {
                    let len = self.parse_expr(false)?;
                    self.expect(TokenKind::RBracket)?;
                    return Ok(Expr::new(
                        ExprKind::ArrayRepeat {
                            elem: Box::new(first),
                            len: Box::new(len),
                        },
                        start.to(self.last_span),
                    ));
                }
                let mut elems = vec![first];
                while self.eat(TokenKind::Comma)? {
                    if self.check(TokenKind::RBracket)? {
                        break;
                    }
                    elems.push(self.parse_expr(false)?);
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::new(
                    ExprKind::ArrayLit { elems },
                    start.to(self.last_span),
                ))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => {
                self.advance()?;
                let cond = self.parse_expr(true)?;
                let body = self.parse_block()?;
                Ok(Expr::new(
                    ExprKind::While {
                        cond: Box::new(cond),
                        body,
                    },
                    start.to(self.last_span),
                ))
            }
            TokenKind::Loop => {
                self.advance()?;
                let body = self.parse_block()?;
                Ok(Expr::new(
                    ExprKind::Loop { body },
                    start.to(self.last_span),
                ))
            }
            TokenKind::Match => self.parse_match(),
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                Ok(Expr::new(
                    ExprKind::Block(block),
                    start.to(self.last_span),
                ))
            }
            TokenKind::Break => {
                self.advance()?;
                let value = if self.at_expr_end()? {
                    None
                } else {
                    Some(Box::new(self.parse_expr(no_struct)?))
                };
                Ok(Expr::new(
                    ExprKind::Break { value },
                    start.to(self.last_span),
                ))
            }
            TokenKind::Continue => {
                self.advance()?;
                Ok(Expr::new(ExprKind::Continue, start))
            }
            TokenKind::Return => {
                self.advance()?;
                let value = if self.at_expr_end()? {
                    None
                } else {
                    Some(Box::new(self.parse_expr(no_struct)?))
                };
                Ok(Expr::new(
                    ExprKind::Return { value },
                    start.to(self.last_span),
                ))
            }
            TokenKind::SelfValue => {
                self.advance()?;
                Ok(Expr::new(
                    ExprKind::Path(PathExpr {
                        segments: vec!["self".to_string()],
                    }),
                    start,
                ))
            }
            TokenKind::Ident(_) => self.parse_path_or_struct(no_struct),
            _ => Err(self.error_unexpected("an expression")),
        }
    }

    fn parse_if(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr(true)?;
        let then_block = self.parse_block()?;
        let else_branch = if self.eat(TokenKind::Else)? {
            if self.check(TokenKind::If)? {
                Some(Box::new(self.parse_if()?))
            } else {
                let block_start = self.current_span();
                let block = self.parse_block()?;
                Some(Box::new(Expr::new(
                    ExprKind::Block(block),
                    block_start.to(self.last_span),
                )))
            }
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then_block,
                else_branch,
            },
            start.to(self.last_span),
        ))
    }

    fn parse_match(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Match)?;
        let scrutinee = self.parse_expr(true)?;
        self.expect(TokenKind::LBrace)?;

        let mut arms = Vec::new();
        while !self.check(TokenKind::RBrace)? {
            let arm_start = self.current_span();
            let pattern = self.parse_pattern()?;
            let guard = if self.eat(TokenKind::If)? {
                Some(self.parse_expr(true)?)
            } else {
                None
            };
            self.expect(TokenKind::FatArrow)?;
            let body = self.parse_expr(false)?;
            arms.push(MatchArm {
                id: NodeId::new(),
                span: arm_start.to(self.last_span),
                pattern,
                guard,
                body,
                scope: None,
            });
            if !self.eat(TokenKind::Comma)? && !self.check(TokenKind::RBrace)? {
                return Err(self.error_unexpected("`,` or `}` after match arm"));
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Expr::new(
            ExprKind::Match {
                scrutinee: Box::new(scrutinee),
                arms,
            },
            start.to(self.last_span),
        ))
    }

    fn parse_pattern(&mut self) -> Result<Pattern, Diagnostic> {
        let start = self.current_span();
        let token = self.peek()?;
        let kind = match token.kind {
            TokenKind::Minus => {
                self.advance()?;
                let token = self.peek()?;
                let TokenKind::IntLit(lit) = token.kind else {
                    return Err(self.error_with_code(
                        error_codes::syntax::INVALID_PATTERN,
                        "expected an integer literal after `-`",
                    ));
                };
                self.advance()?;
                PatternKind::Literal(Box::new(Expr::new(
                    ExprKind::IntLit {
                        value: -lit.value,
                        suffix: lit.suffix,
                    },
                    start.to(self.last_span),
                )))
            }
            TokenKind::IntLit(lit) => {
                self.advance()?;
                PatternKind::Literal(Box::new(Expr::new(
                    ExprKind::IntLit {
                        value: lit.value,
                        suffix: lit.suffix,
                    },
                    start,
                )))
            }
            TokenKind::True => {
                self.advance()?;
                PatternKind::Literal(Box::new(Expr::new(ExprKind::BoolLit { value: true }, start)))
            }
            TokenKind::False => {
                self.advance()?;
                PatternKind::Literal(Box::new(Expr::new(
                    ExprKind::BoolLit { value: false },
                    start,
                )))
            }
            TokenKind::CharLit(value) => {
                self.advance()?;
                PatternKind::Literal(Box::new(Expr::new(ExprKind::CharLit { value }, start)))
            }
            TokenKind::StrLit(value) => {
                self.advance()?;
                PatternKind::Literal(Box::new(Expr::new(ExprKind::StrLit { value }, start)))
            }
            TokenKind::Mut => {
                self.advance()?;
                let name = self.expect_ident()?;
                PatternKind::Binding { name, is_mut: true }
            }
            TokenKind::Ident(name) => {
                self.advance()?;
                if name == "_" {
                    PatternKind::Wildcard
                } else if self.check(TokenKind::PathSep)? {
                    let mut segments = vec![name];
                    while self.eat(TokenKind::PathSep)? {
                        segments.push(self.expect_ident()?);
                    }
                    PatternKind::Path(PathExpr { segments })
                } else {
                    PatternKind::Binding {
                        name,
                        is_mut: false,
                    }
                }
            }
            _ => {
                return Err(self.error_with_code(
                    error_codes::syntax::INVALID_PATTERN,
                    "expected a pattern",
                ))
            }
        };
        Ok(Pattern {
            id: NodeId::new(),
            span: start.to(self.last_span),
            kind,
        })
    }

    /// An identifier: a path, possibly followed by a struct literal body
    fn parse_path_or_struct(&mut self, no_struct: bool) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let first = self.expect_ident()?;
        let mut segments = vec![first];
        while self.eat(TokenKind::PathSep)? {
            segments.push(self.expect_ident()?);
        }

        if segments.len() == 1 && !no_struct && self.check(TokenKind::LBrace)? {
            let name = segments.into_iter().next().unwrap_or_default();
            self.advance()?;
            let mut fields = Vec::new();
            while !self.check(TokenKind::RBrace)? {
                let field_start = self.current_span();
                let field_name = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_expr(false)?;
                fields.push(StructLitField {
                    id: NodeId::new(),
                    span: field_start.to(self.last_span),
                    name: field_name,
                    value,
                });
                if !self.eat(TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RBrace)?;
            return Ok(Expr::new(
                ExprKind::StructLit { name, fields },
                start.to(self.last_span),
            ));
        }

        Ok(Expr::new(
            ExprKind::Path(PathExpr { segments }),
            start.to(self.last_span),
        ))
    }

    // ---- token helpers ----

    /// Pull tokens from the lexer until `n` are buffered
    fn fill(&mut self, n: usize) -> Result<(), Diagnostic> {
        while self.lookahead.len() < n {
            let token = self.lexer.next_token()?;
            self.lookahead.push_back(token);
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<Token, Diagnostic> {
        self.fill(1)?;
        Ok(self.lookahead[0].clone())
    }

    /// Kind of the token after the next one, for the `&self` lookahead
    fn peek_second(&mut self) -> Result<TokenKind, Diagnostic> {
        self.fill(2)?;
        Ok(self.lookahead[1].kind.clone())
    }

    fn peek_third(&mut self) -> Result<TokenKind, Diagnostic> {
        self.fill(3)?;
        Ok(self.lookahead[2].kind.clone())
    }

    fn advance(&mut self) -> Result<Token, Diagnostic> {
        self.fill(1)?;
        let token = self.lookahead.pop_front().ok_or_else(|| {
            Diagnostic::error(error_codes::syntax::UNEXPECTED_EOF)
                .message("unexpected end of input")
                .file(self.source.path())
                .span(self.last_span)
                .build()
        })?;
        if token.kind != TokenKind::Eof {
            self.last_span = token.span;
        }
        Ok(token)
    }

    fn check(&mut self, kind: TokenKind) -> Result<bool, Diagnostic> {
        Ok(self.peek()?.kind == kind)
    }

    fn eat(&mut self, kind: TokenKind) -> Result<bool, Diagnostic> {
        if self.check(kind)? {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, Diagnostic> {
        if self.check(kind.clone())? {
            return self.advance();
        }
        let found = self.peek()?;
        Err(Diagnostic::error(error_codes::syntax::UNEXPECTED_TOKEN)
            .message(format!(
                "expected {}, found {}",
                kind.describe(),
                found.kind.describe()
            ))
            .file(self.source.path())
            .span(found.span)
            .build())
    }

    fn expect_ident(&mut self) -> Result<String, Diagnostic> {
        let token = self.peek()?;
        if let TokenKind::Ident(name) = token.kind {
            self.advance()?;
            return Ok(name);
        }
        Err(Diagnostic::error(error_codes::syntax::UNEXPECTED_TOKEN)
            .message(format!(
                "expected an identifier, found {}",
                token.kind.describe()
            ))
            .file(self.source.path())
            .span(token.span)
            .build())
    }

    fn current_span(&mut self) -> Span {
        self.peek().map(|t| t.span).unwrap_or(self.last_span)
    }

    /// Whether the next token ends an optional-value position after
    /// `break` or `return`
    fn at_expr_end(&mut self) -> Result<bool, Diagnostic> {
        Ok(matches!(
            self.peek()?.kind,
            TokenKind::Semi
                | TokenKind::RBrace
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::Comma
                | TokenKind::Eof
        ))
    }

    fn error_unexpected(&mut self, expected: &str) -> Diagnostic {
        let (kind, span) = match self.peek() {
            Ok(token) => (token.kind.describe(), token.span),
            Err(diag) => return diag,
        };
        let code = if kind == "end of file" {
            error_codes::syntax::UNEXPECTED_EOF
        } else {
            error_codes::syntax::UNEXPECTED_TOKEN
        };
        Diagnostic::error(code)
            .message(format!("expected {}, found {}", expected, kind))
            .file(self.source.path())
            .span(span)
            .build()
    }

    fn error_with_code(&mut self, code: &str, message: &str) -> Diagnostic {
        let span = self.current_span();
        Diagnostic::error(code)
            .message(message.to_string())
            .file(self.source.path())
            .span(span)
            .build()
    }

    /// Skip tokens until something that can start an item
    fn recover_to_next_item(&mut self) {
        loop {
            match self.peek() {
                Ok(token) => match token.kind {
                    TokenKind::Fn
                    | TokenKind::Struct
                    | TokenKind::Enum
                    | TokenKind::Const
                    | TokenKind::Impl
                    | TokenKind::Trait
                    | TokenKind::Eof => break,
                    _ => {
                        if self.advance().is_err() {
                            break;
                        }
                    }
                },
                // A lexer error; the bad token was already dropped by the
                // failed peek, so just try again from the next one
                Err(_) => {
                    if self.lookahead.pop_front().is_none() {
                        break;
                    }
                }
            }
        }
    }
}

/// Construct a binary expression node
fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, span: Span) -> Expr {
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

/// Block-formed expressions may stand as statements without `;`
fn expr_stands_alone(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Block(_)
            | ExprKind::If { .. }
            | ExprKind::While { .. }
            | ExprKind::Loop { .. }
            | ExprKind::Match { .. }
    )
}
