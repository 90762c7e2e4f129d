//! Token types for the rlang expression lexer.
//!
//! String tokens borrow from the source text except for quoted literals,
//! which own their unescaped contents. Every token carries the 1-based
//! source line it started on; compile errors quote it.

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// Quoted string literal, escapes already resolved.
    Str(String),
    Int(i64),
    /// `U`-suffixed integer literal.
    Uint(u64),
    Double(f64),
    Bool(bool),
    /// Bare identifier: field reference, `as`, or qualified name.
    /// May contain `_`, `.` and `:` (type tags, `this.`/`other.` prefixes).
    Ident(&'a str),
    /// Identifier immediately followed by `(`, reclassified.
    FunctionCall(&'a str),
    /// Binary operator, greedily matched against the registry.
    Operator(&'static str),
    /// Prefix operator: `-` (by context), `!`, `~`.
    UnaryOp(&'static str),
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
}

/// A token plus its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme<'a> {
    pub token: Token<'a>,
    pub line: u32,
}

impl Token<'_> {
    /// Whether a `-` after this token is a unary minus. Unary minus
    /// follows nothing, an operator, an open paren, or a comma.
    pub fn minus_after_is_unary(&self) -> bool {
        matches!(
            self,
            Token::Operator(_)
                | Token::UnaryOp(_)
                | Token::OpenParen
                | Token::Comma
                | Token::Semicolon
        )
    }
}
