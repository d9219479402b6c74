//! Error code definitions and documentation

/// Lexical errors (E0xxx)
pub mod lex {
    pub const UNEXPECTED_CHARACTER: &str = "E0001";
    pub const INVALID_INTEGER: &str = "E0002";
    pub const INVALID_ESCAPE: &str = "E0003";
}

/// Syntax/parsing errors (E1xxx)
pub mod syntax {
    pub const UNEXPECTED_TOKEN: &str = "E1001";
    pub const UNEXPECTED_EOF: &str = "E1002";
    pub const MISSING_SEMICOLON: &str = "E1003";
    pub const INVALID_PATTERN: &str = "E1004";
    pub const INVALID_TYPE: &str = "E1005";
    pub const MISPLACED_SELF: &str = "E1006";
}

/// Semantic errors (E2xxx)
pub mod semantic {
    pub const DUPLICATE_DEFINITION: &str = "E2001";
    pub const UNDECLARED_NAME: &str = "E2002";
    pub const TYPE_MISMATCH: &str = "E2003";
    pub const INVALID_OPERAND: &str = "E2004";
    pub const NOT_ASSIGNABLE: &str = "E2005";
    pub const NOT_MUTABLE: &str = "E2006";
    pub const ARITY_MISMATCH: &str = "E2007";
    pub const NOT_CONST_EVALUABLE: &str = "E2008";
    pub const BREAK_OUTSIDE_LOOP: &str = "E2009";
    pub const INVALID_MEMBER_ACCESS: &str = "E2010";
    pub const INVALID_INDEX_BASE: &str = "E2011";
}
