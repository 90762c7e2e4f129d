//! # rlang Lexer
//!
//! Tokenizes infix expression text. Identifiers and operator spellings
//! borrow from the input; only quoted strings allocate (escapes must be
//! resolved somewhere).
//!
//! ## Token Categories
//!
//! - **Strings**: both quote styles (`'...'`, `"..."`) with backslash
//!   escapes (`\\`, `\'`, `\"`, `\n`, `\t`, `\r`, `\0`)
//! - **Numbers**: integer (`42`), unsigned (`42U`), double (`3.14`,
//!   `1e-9`, `2.5E+3`)
//! - **Booleans**: `true` / `false`
//! - **Identifiers**: alphanumeric plus `_`, `.`, `:`; the dot admits
//!   `this.`/`other.` qualifiers and dotted function names, the colon
//!   admits embedded type tags
//! - **Operators**: greedily matched against the registry spellings,
//!   longest valid prefix first
//! - **Punctuation**: parens, comma, semicolon
//! - **Comments**: `#` to end of line
//!
//! ## Reclassification
//!
//! Two context rules run as tokens are produced:
//! - an identifier immediately followed by `(` becomes a function call
//! - a `-` following nothing, an operator, an open paren, or a comma
//!   becomes unary minus
//!
//! `!` and `~` are always unary (`!=` wins by greedy matching first).

use eyre::{bail, Result};
use phf::phf_map;

use super::registry;
use super::token::{Lexeme, Token};

static KEYWORDS: phf::Map<&'static str, Token<'static>> = phf_map! {
    "true" => Token::Bool(true),
    "false" => Token::Bool(false),
};

/// Tokenizes a whole expression. Fails on unterminated strings, malformed
/// numbers, and bytes that fit no token class.
pub fn tokenize(input: &str) -> Result<Vec<Lexeme<'_>>> {
    let mut lexemes: Vec<Lexeme<'_>> = Vec::new();
    let bytes = input.as_bytes();
    let mut pos = 0;
    let mut line: u32 = 1;

    while pos < bytes.len() {
        let b = bytes[pos];

        if b == b'\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if b == b'#' {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }

        if b == b'\'' || b == b'"' {
            let (text, consumed) = lex_string(&input[pos..], line)?;
            lexemes.push(Lexeme {
                token: Token::Str(text),
                line,
            });
            pos += consumed;
            continue;
        }

        if b.is_ascii_digit() {
            let (token, consumed) = lex_number(&input[pos..], line)?;
            lexemes.push(Lexeme { token, line });
            pos += consumed;
            continue;
        }

        if b.is_ascii_alphabetic() || b == b'_' {
            let start = pos;
            while pos < bytes.len() && is_identifier_byte(bytes[pos]) {
                pos += 1;
            }
            let text = &input[start..pos];
            let token = match KEYWORDS.get(text) {
                Some(keyword) => keyword.clone(),
                None => Token::Ident(text),
            };
            lexemes.push(Lexeme { token, line });
            continue;
        }

        match b {
            b'(' => {
                // Identifier directly before '(' is a function call.
                if let Some(last) = lexemes.last_mut() {
                    if let Token::Ident(name) = last.token {
                        last.token = Token::FunctionCall(name);
                    }
                }
                lexemes.push(Lexeme {
                    token: Token::OpenParen,
                    line,
                });
                pos += 1;
            }
            b')' => {
                lexemes.push(Lexeme {
                    token: Token::CloseParen,
                    line,
                });
                pos += 1;
            }
            b',' => {
                lexemes.push(Lexeme {
                    token: Token::Comma,
                    line,
                });
                pos += 1;
            }
            b';' => {
                lexemes.push(Lexeme {
                    token: Token::Semicolon,
                    line,
                });
                pos += 1;
            }
            _ => match registry::match_operator(&input[pos..]) {
                Some(spelling) => {
                    let unary = match spelling {
                        "!" | "~" => true,
                        "-" => lexemes
                            .last()
                            .map_or(true, |l| l.token.minus_after_is_unary()),
                        _ => false,
                    };
                    let token = if unary {
                        Token::UnaryOp(spelling)
                    } else {
                        Token::Operator(spelling)
                    };
                    lexemes.push(Lexeme { token, line });
                    pos += spelling.len();
                }
                None => bail!(
                    "line {}: unexpected character '{}' in expression",
                    line,
                    &input[pos..].chars().next().unwrap_or('?')
                ),
            },
        }
    }

    Ok(lexemes)
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b':'
}

/// Lexes a quoted string starting at `input[0]`. Returns the unescaped
/// contents and the bytes consumed including both quotes.
fn lex_string(input: &str, line: u32) -> Result<(String, usize)> {
    let bytes = input.as_bytes();
    let quote = bytes[0];
    let mut text = String::new();
    let mut pos = 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => {
                let escape = match bytes.get(pos + 1) {
                    Some(b'\\') => '\\',
                    Some(b'\'') => '\'',
                    Some(b'"') => '"',
                    Some(b'n') => '\n',
                    Some(b't') => '\t',
                    Some(b'r') => '\r',
                    Some(b'0') => '\0',
                    Some(other) => bail!(
                        "line {}: unknown escape '\\{}' in string literal",
                        line,
                        *other as char
                    ),
                    None => bail!("line {}: string literal ends in a bare backslash", line),
                };
                text.push(escape);
                pos += 2;
            }
            b if b == quote => return Ok((text, pos + 1)),
            _ => {
                let ch = input[pos..].chars().next().unwrap_or('?');
                text.push(ch);
                pos += ch.len_utf8();
            }
        }
    }
    bail!("line {}: unterminated string literal", line)
}

/// Lexes a numeric literal starting at `input[0]`.
fn lex_number(input: &str, line: u32) -> Result<(Token<'static>, usize)> {
    let bytes = input.as_bytes();
    let mut pos = 0;
    let mut is_double = false;

    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        is_double = true;
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp_end = pos + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        if exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            is_double = true;
            pos = exp_end;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    let text = &input[..pos];
    if is_double {
        let value: f64 = text
            .parse()
            .map_err(|_| eyre::eyre!("line {}: malformed double literal '{}'", line, text))?;
        return Ok((Token::Double(value), pos));
    }

    if pos < bytes.len() && bytes[pos] == b'U' {
        let value: u64 = text.parse().map_err(|_| {
            eyre::eyre!("line {}: unsigned literal '{}U' out of range", line, text)
        })?;
        return Ok((Token::Uint(value), pos + 1));
    }

    let value: i64 = text
        .parse()
        .map_err(|_| eyre::eyre!("line {}: integer literal '{}' out of range", line, text))?;
    Ok((Token::Int(value), pos))
}
