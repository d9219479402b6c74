//! Lexer for the Rill programming language

use crate::diagnostics::{error_codes, Diagnostic, Span};
use crate::parser::span::SourceFile;
use logos::Logos;
use serde::{Deserialize, Serialize};

/// Suffix on an integer literal, fixing its type up front
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntSuffix {
    I32,
    U32,
    Isize,
    Usize,
}

/// An integer literal with its optional type suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntLiteral {
    pub value: i64,
    pub suffix: Option<IntSuffix>,
}

fn lex_int(slice: &str) -> Option<IntLiteral> {
    let (digits, suffix) = if let Some(rest) = slice.strip_suffix("i32") {
        (rest, Some(IntSuffix::I32))
    } else if let Some(rest) = slice.strip_suffix("u32") {
        (rest, Some(IntSuffix::U32))
    } else if let Some(rest) = slice.strip_suffix("isize") {
        (rest, Some(IntSuffix::Isize))
    } else if let Some(rest) = slice.strip_suffix("usize") {
        (rest, Some(IntSuffix::Usize))
    } else {
        (slice, None)
    };

    let mut value: i64 = 0;
    for c in digits.chars().filter(|c| *c != '_') {
        value = value
            .checked_mul(10)?
            .checked_add(c.to_digit(10)? as i64)?;
    }
    Some(IntLiteral { value, suffix })
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            _ => return None,
        }
    }
    Some(out)
}

/// Token types for Rill
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum TokenKind {
    // Keywords
    #[token("as")]
    As,
    #[token("break")]
    Break,
    #[token("const")]
    Const,
    #[token("continue")]
    Continue,
    #[token("else")]
    Else,
    #[token("enum")]
    Enum,
    #[token("false")]
    False,
    #[token("fn")]
    Fn,
    #[token("if")]
    If,
    #[token("impl")]
    Impl,
    #[token("let")]
    Let,
    #[token("loop")]
    Loop,
    #[token("match")]
    Match,
    #[token("mut")]
    Mut,
    #[token("return")]
    Return,
    #[token("self")]
    SelfValue,
    #[token("struct")]
    Struct,
    #[token("trait")]
    Trait,
    #[token("true")]
    True,
    #[token("while")]
    While,

    // Literals
    #[regex(r"[0-9][0-9_]*(i32|u32|isize|usize)?", |lex| lex_int(lex.slice()))]
    IntLit(IntLiteral),

    #[regex(r"'([^'\\]|\\.)'", |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len()-1]).and_then(|s| s.chars().next())
    })]
    CharLit(char),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len()-1])
    })]
    StrLit(String),

    #[regex(r#"c"([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape(&s[2..s.len()-1])
    })]
    CStrLit(String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,

    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("::")]
    PathSep,
    #[token(";")]
    Semi,
    #[token("=")]
    Eq,
    #[token("->")]
    Arrow,
    #[token("=>")]
    FatArrow,
    #[token(".")]
    Dot,

    // End of file
    Eof,
}

impl TokenKind {
    /// Short human-readable description, used in parse error messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::IntLit(_) => "integer literal".to_string(),
            TokenKind::CharLit(_) => "char literal".to_string(),
            TokenKind::StrLit(_) => "string literal".to_string(),
            TokenKind::CStrLit(_) => "cstring literal".to_string(),
            TokenKind::Ident(name) => format!("`{}`", name),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("`{}`", other.text()),
        }
    }

    fn text(&self) -> &'static str {
        match self {
            TokenKind::As => "as",
            TokenKind::Break => "break",
            TokenKind::Const => "const",
            TokenKind::Continue => "continue",
            TokenKind::Else => "else",
            TokenKind::Enum => "enum",
            TokenKind::False => "false",
            TokenKind::Fn => "fn",
            TokenKind::If => "if",
            TokenKind::Impl => "impl",
            TokenKind::Let => "let",
            TokenKind::Loop => "loop",
            TokenKind::Match => "match",
            TokenKind::Mut => "mut",
            TokenKind::Return => "return",
            TokenKind::SelfValue => "self",
            TokenKind::Struct => "struct",
            TokenKind::Trait => "trait",
            TokenKind::True => "true",
            TokenKind::While => "while",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::PathSep => "::",
            TokenKind::Semi => ";",
            TokenKind::Eq => "=",
            TokenKind::Arrow => "->",
            TokenKind::FatArrow => "=>",
            TokenKind::Dot => ".",
            _ => "",
        }
    }
}

/// A token with its span
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Lexer for Rill source code
pub struct Lexer<'a> {
    source: &'a SourceFile,
    logos_lexer: logos::Lexer<'a, TokenKind>,
    at_eof: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source file
    pub fn new(source: &'a SourceFile) -> Self {
        Self {
            source,
            logos_lexer: TokenKind::lexer(source.content()),
            at_eof: false,
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, Diagnostic> {
        if self.at_eof {
            return Ok(Token::new(TokenKind::Eof, self.source.eof_span()));
        }

        match self.logos_lexer.next() {
            Some(Ok(kind)) => {
                let range = self.logos_lexer.span();
                Ok(Token::new(kind, self.source.span(range.start, range.end)))
            }
            Some(Err(())) => {
                let range = self.logos_lexer.span();
                let span = self.source.span(range.start, range.end);
                Err(self.lex_error(span))
            }
            None => {
                self.at_eof = true;
                Ok(Token::new(TokenKind::Eof, self.source.eof_span()))
            }
        }
    }

    fn lex_error(&self, span: Span) -> Diagnostic {
        let slice = self.logos_lexer.slice();
        let (code, message) = if slice.starts_with(|c: char| c.is_ascii_digit()) {
            (
                error_codes::lex::INVALID_INTEGER,
                format!("invalid integer literal `{}`", slice),
            )
        } else if slice.starts_with('\'') || slice.starts_with('"') || slice.starts_with("c\"") {
            (
                error_codes::lex::INVALID_ESCAPE,
                format!("invalid escape in literal `{}`", slice),
            )
        } else {
            (
                error_codes::lex::UNEXPECTED_CHARACTER,
                format!("unexpected character {:?}", slice),
            )
        };
        Diagnostic::error(code)
            .message(message)
            .file(self.source.path())
            .span(span)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn lex(source: &str) -> Vec<TokenKind> {
        let file = SourceFile::new(PathBuf::from("test.rl"), source.to_string());
        let mut lexer = Lexer::new(&file);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().expect("lex failed");
            if token.kind == TokenKind::Eof {
                break;
            }
            tokens.push(token.kind);
        }
        tokens
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            lex("fn let impl mut while"),
            vec![
                TokenKind::Fn,
                TokenKind::Let,
                TokenKind::Impl,
                TokenKind::Mut,
                TokenKind::While,
            ]
        );
    }

    #[test]
    fn test_int_suffixes() {
        assert_eq!(
            lex("42 7u32 3usize 1_000i32"),
            vec![
                TokenKind::IntLit(IntLiteral {
                    value: 42,
                    suffix: None
                }),
                TokenKind::IntLit(IntLiteral {
                    value: 7,
                    suffix: Some(IntSuffix::U32)
                }),
                TokenKind::IntLit(IntLiteral {
                    value: 3,
                    suffix: Some(IntSuffix::Usize)
                }),
                TokenKind::IntLit(IntLiteral {
                    value: 1000,
                    suffix: Some(IntSuffix::I32)
                }),
            ]
        );
    }

    #[test]
    fn test_string_kinds() {
        assert_eq!(
            lex(r#""hi" c"lo" 'x' '\n'"#),
            vec![
                TokenKind::StrLit("hi".to_string()),
                TokenKind::CStrLit("lo".to_string()),
                TokenKind::CharLit('x'),
                TokenKind::CharLit('\n'),
            ]
        );
    }

    #[test]
    fn test_path_sep_vs_colon() {
        assert_eq!(
            lex("a::b:c"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::PathSep,
                TokenKind::Ident("b".to_string()),
                TokenKind::Colon,
                TokenKind::Ident("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            lex("1 // line\n/* block */ 2"),
            vec![
                TokenKind::IntLit(IntLiteral {
                    value: 1,
                    suffix: None
                }),
                TokenKind::IntLit(IntLiteral {
                    value: 2,
                    suffix: None
                }),
            ]
        );
    }

    #[test]
    fn test_shift_and_compare() {
        assert_eq!(
            lex("<< >> <= >= < >"),
            vec![
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Lt,
                TokenKind::Gt,
            ]
        );
    }
}
