//! Abstract Syntax Tree definitions for Rill
//!
//! Every node carries a unique id and a source span. Expression, type and
//! scope-introducing nodes additionally carry the annotation slots the
//! semantic passes fill in: candidate types, compiler-known constant values,
//! lvalue/mutability flags, resolved types and scope handles. The tree is
//! built once by the parser and then annotated in place.

use crate::diagnostics::Span;
use crate::parser::lexer::IntSuffix;
use crate::semantic::{ConstValue, ScopeId, TypeId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for AST nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Generate a new unique node ID
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A complete compilation unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crate {
    pub id: NodeId,
    pub span: Span,
    pub items: Vec<Item>,
    /// Root scope handle, written by the symbol collector
    pub scope: Option<ScopeId>,
}

/// Top-level (or block-nested) items
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Item {
    Function(FunctionItem),
    Struct(StructItem),
    Enum(EnumItem),
    Const(ConstItem),
    Impl(ImplItem),
    Trait(TraitItem),
}

impl Item {
    /// The declared name of the item
    pub fn name(&self) -> &str {
        match self {
            Item::Function(f) => &f.name,
            Item::Struct(s) => &s.name,
            Item::Enum(e) => &e.name,
            Item::Const(c) => &c.name,
            Item::Impl(i) => &i.target_name,
            Item::Trait(t) => &t.name,
        }
    }

    /// The span of the item header
    pub fn span(&self) -> Span {
        match self {
            Item::Function(f) => f.span,
            Item::Struct(s) => s.span,
            Item::Enum(e) => e.span,
            Item::Const(c) => c.span,
            Item::Impl(i) => i.span,
            Item::Trait(t) => t.span,
        }
    }
}

/// Function definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionItem {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    /// Shorthand self parameter, only meaningful inside an impl
    pub self_param: Option<SelfParam>,
    pub params: Vec<Param>,
    pub ret: Option<TypeNode>,
    /// Trait items may omit the body
    pub body: Option<Block>,
}

/// Shorthand self parameter (`self`, `&self`, `&mut self`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfParam {
    pub id: NodeId,
    pub span: Span,
    pub is_ref: bool,
    pub is_mut: bool,
}

/// Function parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub is_mut: bool,
    pub ty: TypeNode,
}

/// Struct definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructItem {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub fields: Vec<FieldDef>,
}

/// A field in a struct definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub ty: TypeNode,
}

/// Enum definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumItem {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub variants: Vec<VariantDef>,
}

/// Enum variant, optionally with an explicit discriminant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantDef {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub discriminant: Option<Expr>,
}

/// Constant item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstItem {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub ty: TypeNode,
    pub init: Expr,
}

/// Inherent impl block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplItem {
    pub id: NodeId,
    pub span: Span,
    /// Name of the implemented type
    pub target_name: String,
    pub items: Vec<AssocItem>,
    /// Scope handle for the impl body, written by the symbol collector
    pub scope: Option<ScopeId>,
}

/// An item inside an impl or trait block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssocItem {
    Function(FunctionItem),
    Const(ConstItem),
}

/// Trait definition (parsed but not analyzed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitItem {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub items: Vec<AssocItem>,
}

/// A block of statements with an optional trailing expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub span: Span,
    pub stmts: Vec<Stmt>,
    pub tail: Option<Box<Expr>>,
    /// Scope handle, written by the symbol collector
    pub scope: Option<ScopeId>,
}

/// Statement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Stmt {
    /// Nested item declaration
    Item(Item),
    /// Let binding
    Let(LetStmt),
    /// Expression statement
    Expr {
        id: NodeId,
        span: Span,
        expr: Expr,
        has_semi: bool,
    },
    /// Bare `;`
    Empty { id: NodeId, span: Span },
}

/// Let binding statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetStmt {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub is_mut: bool,
    pub ty: Option<TypeNode>,
    pub init: Option<Expr>,
    pub else_block: Option<Block>,
}

/// Expression, with the annotation slots the semantic passes fill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,

    /// Candidate types computed by the type checker. Non-empty after a
    /// successful check; more than one element means an integer literal
    /// whose type no context has narrowed yet.
    pub candidate_types: Vec<TypeId>,
    /// Whether the value is known at analysis time
    pub is_compiler_known: bool,
    /// The folded value, when compiler-known
    pub constant_value: Option<ConstValue>,
    /// Whether the expression is a place (lvalue)
    pub is_assignable: bool,
    /// Whether the place may be written through
    pub is_mutable: bool,
}

impl Expr {
    /// Create an unannotated expression node
    pub fn new(kind: ExprKind, span: Span) -> Self {
        let is_assignable = matches!(
            kind,
            ExprKind::Path(_) | ExprKind::Index { .. } | ExprKind::Member { .. }
        );
        Self {
            id: NodeId::new(),
            span,
            kind,
            candidate_types: Vec::new(),
            is_compiler_known: false,
            constant_value: None,
            is_assignable,
            is_mutable: false,
        }
    }
}

/// Expression kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExprKind {
    // Literals
    IntLit {
        value: i64,
        suffix: Option<IntSuffix>,
    },
    BoolLit {
        value: bool,
    },
    CharLit {
        value: char,
    },
    StrLit {
        value: String,
    },
    CStrLit {
        value: String,
    },
    /// `[a, b, c]`
    ArrayLit {
        elems: Vec<Expr>,
    },
    /// `[value; length]`
    ArrayRepeat {
        elem: Box<Expr>,
        len: Box<Expr>,
    },
    /// `(a, b)`
    TupleLit {
        elems: Vec<Expr>,
    },
    /// `()`
    Unit,

    /// `name` or `Type::assoc`
    Path(PathExpr),
    /// `Name { field: value, .. }`
    StructLit {
        name: String,
        fields: Vec<StructLitField>,
    },

    // Operations
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        base: Box<Expr>,
        name: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cast {
        operand: Box<Expr>,
        ty: TypeNode,
    },

    // Control flow
    Block(Block),
    If {
        cond: Box<Expr>,
        then_block: Block,
        /// Either a block or another `If`
        else_branch: Option<Box<Expr>>,
    },
    While {
        cond: Box<Expr>,
        body: Block,
    },
    Loop {
        body: Block,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    Break {
        value: Option<Box<Expr>>,
    },
    Continue,
    Return {
        value: Option<Box<Expr>>,
    },
}

/// A (possibly qualified) path expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathExpr {
    pub segments: Vec<String>,
}

impl PathExpr {
    /// The bare name, for single-segment paths
    pub fn single(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [name] => Some(name.as_str()),
            _ => None,
        }
    }

    /// Render the path with `::` separators
    pub fn join(&self) -> String {
        self.segments.join("::")
    }
}

/// A field in a struct literal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructLitField {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub value: Expr,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `!`
    Not,
    /// `&`
    Ref,
    /// `&mut`
    RefMut,
    /// `*`
    Deref,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Ref => "&",
            UnaryOp::RefMut => "&mut",
            UnaryOp::Deref => "*",
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    // Bitwise and shift
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    /// Whether this is `==`, `!=`, `<`, `<=`, `>` or `>=`
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Match arm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchArm {
    pub id: NodeId,
    pub span: Span,
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
    /// Scope handle for bindings introduced by the pattern
    pub scope: Option<ScopeId>,
}

/// Pattern for matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: NodeId,
    pub span: Span,
    pub kind: PatternKind,
}

/// Pattern kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PatternKind {
    /// `_`
    Wildcard,
    /// `name` or `mut name`
    Binding { name: String, is_mut: bool },
    /// A literal expression
    Literal(Box<Expr>),
    /// `Enum::Variant`
    Path(PathExpr),
}

/// Type expression, annotated with its resolved type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeNode {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeNodeKind,
    /// Resolved type handle, written by the type binder or checker
    pub resolved: Option<TypeId>,
}

impl TypeNode {
    /// Create an unresolved type node
    pub fn new(kind: TypeNodeKind, span: Span) -> Self {
        Self {
            id: NodeId::new(),
            span,
            kind,
            resolved: None,
        }
    }

    /// Whether this syntactically names one of the four integer primitives
    pub fn is_numeric_primitive(&self) -> bool {
        matches!(
            &self.kind,
            TypeNodeKind::Path(name) if matches!(name.as_str(), "i32" | "u32" | "isize" | "usize")
        )
    }
}

/// Type expression kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TypeNodeKind {
    /// A named type (`i32`, `Point`, `Self`)
    Path(String),
    /// `()`
    Unit,
    /// `(T, U)`
    Tuple(Vec<TypeNode>),
    /// `[T; N]`
    Array {
        elem: Box<TypeNode>,
        len: Box<Expr>,
    },
    /// `[T]`
    Slice(Box<TypeNode>),
    /// `&T` / `&mut T`
    Reference {
        inner: Box<TypeNode>,
        is_mut: bool,
    },
}
