//! # rlang Parser
//!
//! Shunting-yard conversion from the lexer's infix token stream to a
//! postfix item list. The parser is deliberately untyped: overloads,
//! field references and the `if`/`then`/`else` construct are resolved by
//! the compiler against the output produced here.
//!
//! ## Postfix Shape
//!
//! Operators and explicit calls both become applications in the output;
//! they differ only in what the compiler can assume about them. Explicit
//! calls carry `out_start`, the output index where their argument items
//! begin. `if (c) then (a) else (b)` parses as three juxtaposed
//! one-argument calls, and the compiler uses `out_start` adjacency to
//! verify the three actually chain (`then` starting exactly where `if`
//! ended, and so on). The parser therefore does not enforce operand
//! alternation; a stray juxtaposition surfaces as a compile error, not a
//! parse error.
//!
//! ## Precedence
//!
//! C-family table from the registry; lower binds tighter; binary
//! operators are left-associative, unary prefix operators bind tighter
//! than any binary operator.

use eyre::{bail, Result};

use super::registry;
use super::token::{Lexeme, Token};

/// One postfix output item.
#[derive(Debug, Clone, PartialEq)]
pub enum PostfixItem {
    Str(String),
    Int(i64),
    Uint(u64),
    Double(f64),
    Bool(bool),
    /// Field reference or qualified name; resolved by the compiler.
    Ident(String),
    /// Explicit `name(...)` call. `out_start` is the index in the postfix
    /// output where this call's argument items begin.
    Call {
        name: String,
        arity: usize,
        out_start: usize,
    },
    /// Binary or unary operator application.
    Op { name: &'static str, arity: usize },
}

/// A postfix item plus the source line of the token that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PostfixToken {
    pub item: PostfixItem,
    pub line: u32,
}

enum StackEntry {
    Binary {
        op: &'static str,
        prec: u8,
        line: u32,
    },
    Unary {
        op: &'static str,
        line: u32,
    },
    Paren {
        commas: usize,
        out_at_open: usize,
        line: u32,
    },
    Call {
        name: String,
        out_start: usize,
        line: u32,
    },
}

/// Converts one expression to postfix.
pub fn parse_expression(lexemes: &[Lexeme<'_>]) -> Result<Vec<PostfixToken>> {
    let mut output: Vec<PostfixToken> = Vec::with_capacity(lexemes.len());
    let mut stack: Vec<StackEntry> = Vec::new();

    for lexeme in lexemes {
        let line = lexeme.line;
        match &lexeme.token {
            Token::Str(s) => output.push(PostfixToken {
                item: PostfixItem::Str(s.clone()),
                line,
            }),
            Token::Int(v) => output.push(PostfixToken {
                item: PostfixItem::Int(*v),
                line,
            }),
            Token::Uint(v) => output.push(PostfixToken {
                item: PostfixItem::Uint(*v),
                line,
            }),
            Token::Double(v) => output.push(PostfixToken {
                item: PostfixItem::Double(*v),
                line,
            }),
            Token::Bool(v) => output.push(PostfixToken {
                item: PostfixItem::Bool(*v),
                line,
            }),
            Token::Ident(name) => output.push(PostfixToken {
                item: PostfixItem::Ident((*name).to_string()),
                line,
            }),
            Token::FunctionCall(name) => stack.push(StackEntry::Call {
                name: (*name).to_string(),
                out_start: output.len(),
                line,
            }),
            Token::UnaryOp(op) => stack.push(StackEntry::Unary { op, line }),
            Token::Operator(op) => {
                let prec = match registry::binary_precedence(op) {
                    Some(p) => p,
                    None => bail!("line {}: '{}' is not a binary operator", line, op),
                };
                // Left-associative: pop anything that binds at least as
                // tightly. Unary prefixes always bind tighter.
                while let Some(top) = stack.last() {
                    match top {
                        StackEntry::Binary { prec: top_prec, .. } if *top_prec <= prec => {
                            pop_operator(&mut stack, &mut output);
                        }
                        StackEntry::Unary { .. } => {
                            pop_operator(&mut stack, &mut output);
                        }
                        _ => break,
                    }
                }
                stack.push(StackEntry::Binary { op, prec, line });
            }
            Token::OpenParen => stack.push(StackEntry::Paren {
                commas: 0,
                out_at_open: output.len(),
                line,
            }),
            Token::Comma => {
                loop {
                    match stack.last_mut() {
                        Some(StackEntry::Paren { commas, .. }) => {
                            *commas += 1;
                            break;
                        }
                        Some(StackEntry::Binary { .. }) | Some(StackEntry::Unary { .. }) => {
                            pop_operator(&mut stack, &mut output);
                        }
                        _ => bail!("line {}: ',' outside parentheses", line),
                    }
                }
            }
            Token::CloseParen => {
                let (commas, out_at_open) = loop {
                    match stack.last() {
                        Some(StackEntry::Paren {
                            commas,
                            out_at_open,
                            ..
                        }) => {
                            let result = (*commas, *out_at_open);
                            stack.pop();
                            break result;
                        }
                        Some(StackEntry::Binary { .. }) | Some(StackEntry::Unary { .. }) => {
                            pop_operator(&mut stack, &mut output);
                        }
                        _ => bail!("line {}: unmatched ')'", line),
                    }
                };
                match stack.last() {
                    Some(StackEntry::Call { .. }) => {
                        let Some(StackEntry::Call {
                            name,
                            out_start,
                            line: call_line,
                        }) = stack.pop()
                        else {
                            unreachable!()
                        };
                        let arity = if output.len() == out_start && commas == 0 {
                            0
                        } else {
                            commas + 1
                        };
                        output.push(PostfixToken {
                            item: PostfixItem::Call {
                                name,
                                arity,
                                out_start,
                            },
                            line: call_line,
                        });
                    }
                    _ if commas > 0 => {
                        bail!("line {}: ',' in a parenthesized group that is not a call", line)
                    }
                    _ => {
                        if output.len() == out_at_open {
                            bail!("line {}: empty parentheses", line);
                        }
                    }
                }
            }
            Token::Semicolon => bail!("line {}: unexpected ';' inside an expression", line),
        }
    }

    while let Some(top) = stack.last() {
        match top {
            StackEntry::Binary { .. } | StackEntry::Unary { .. } => {
                pop_operator(&mut stack, &mut output);
            }
            StackEntry::Paren { line, .. } => bail!("line {}: unmatched '('", line),
            StackEntry::Call { name, line, .. } => {
                bail!("line {}: call to '{}' is missing its '('", line, name)
            }
        }
    }

    if output.is_empty() {
        bail!("empty expression");
    }
    Ok(output)
}

fn pop_operator(stack: &mut Vec<StackEntry>, output: &mut Vec<PostfixToken>) {
    match stack.pop() {
        Some(StackEntry::Binary { op, line, .. }) => output.push(PostfixToken {
            item: PostfixItem::Op { name: op, arity: 2 },
            line,
        }),
        Some(StackEntry::Unary { op, line }) => output.push(PostfixToken {
            item: PostfixItem::Op { name: op, arity: 1 },
            line,
        }),
        _ => unreachable!("pop_operator called with a non-operator on top"),
    }
}

/// Splits a lexeme stream on top-level semicolons. Select lists are one
/// expression per segment; empty segments are rejected.
pub fn split_expressions<'l, 'a>(lexemes: &'l [Lexeme<'a>]) -> Result<Vec<&'l [Lexeme<'a>]>> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (index, lexeme) in lexemes.iter().enumerate() {
        if lexeme.token == Token::Semicolon {
            if index == start {
                bail!("line {}: empty expression before ';'", lexeme.line);
            }
            segments.push(&lexemes[start..index]);
            start = index + 1;
        }
    }
    if start < lexemes.len() {
        segments.push(&lexemes[start..]);
    } else if !lexemes.is_empty() {
        // Trailing semicolon is tolerated; an entirely empty list is not.
        if segments.is_empty() {
            bail!("empty expression list");
        }
    }
    if segments.is_empty() {
        bail!("empty expression list");
    }
    Ok(segments)
}

/// Detects a trailing `as [type:]name` clause and returns the expression
/// lexemes without it plus the declared descriptor.
pub fn strip_as_clause<'l, 'a>(
    lexemes: &'l [Lexeme<'a>],
) -> Result<(&'l [Lexeme<'a>], Option<&'a str>)> {
    let n = lexemes.len();
    if n >= 2 {
        if let (Token::Ident("as"), Token::Ident(descriptor)) =
            (&lexemes[n - 2].token, &lexemes[n - 1].token)
        {
            if n == 2 {
                bail!(
                    "line {}: 'as {}' has no expression before it",
                    lexemes[n - 2].line,
                    descriptor
                );
            }
            return Ok((&lexemes[..n - 2], Some(descriptor)));
        }
    }
    // A dangling `as` with nothing after it is always malformed.
    if let Some(last) = lexemes.last() {
        if last.token == Token::Ident("as") {
            bail!("line {}: 'as' is missing its column name", last.line);
        }
    }
    Ok((lexemes, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lexer::tokenize;

    fn postfix(input: &str) -> Vec<PostfixItem> {
        parse_expression(&tokenize(input).unwrap())
            .unwrap()
            .into_iter()
            .map(|t| t.item)
            .collect()
    }

    #[test]
    fn precedence_orders_output() {
        assert_eq!(
            postfix("1 + 2 * 3"),
            vec![
                PostfixItem::Int(1),
                PostfixItem::Int(2),
                PostfixItem::Int(3),
                PostfixItem::Op { name: "*", arity: 2 },
                PostfixItem::Op { name: "+", arity: 2 },
            ]
        );
    }

    #[test]
    fn parens_override_precedence() {
        assert_eq!(
            postfix("(1 + 2) * 3"),
            vec![
                PostfixItem::Int(1),
                PostfixItem::Int(2),
                PostfixItem::Op { name: "+", arity: 2 },
                PostfixItem::Int(3),
                PostfixItem::Op { name: "*", arity: 2 },
            ]
        );
    }

    #[test]
    fn left_associativity() {
        assert_eq!(
            postfix("8 - 4 - 2"),
            vec![
                PostfixItem::Int(8),
                PostfixItem::Int(4),
                PostfixItem::Op { name: "-", arity: 2 },
                PostfixItem::Int(2),
                PostfixItem::Op { name: "-", arity: 2 },
            ]
        );
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        assert_eq!(
            postfix("-a * b"),
            vec![
                PostfixItem::Ident("a".into()),
                PostfixItem::Op { name: "-", arity: 1 },
                PostfixItem::Ident("b".into()),
                PostfixItem::Op { name: "*", arity: 2 },
            ]
        );
    }

    #[test]
    fn call_arity_and_out_start() {
        assert_eq!(
            postfix("f(a, b + 1)"),
            vec![
                PostfixItem::Ident("a".into()),
                PostfixItem::Ident("b".into()),
                PostfixItem::Int(1),
                PostfixItem::Op { name: "+", arity: 2 },
                PostfixItem::Call {
                    name: "f".into(),
                    arity: 2,
                    out_start: 0,
                },
            ]
        );
        assert_eq!(
            postfix("g()"),
            vec![PostfixItem::Call {
                name: "g".into(),
                arity: 0,
                out_start: 0,
            }]
        );
    }

    #[test]
    fn nested_calls_track_their_own_start() {
        assert_eq!(
            postfix("f(g(x), y)"),
            vec![
                PostfixItem::Ident("x".into()),
                PostfixItem::Call {
                    name: "g".into(),
                    arity: 1,
                    out_start: 0,
                },
                PostfixItem::Ident("y".into()),
                PostfixItem::Call {
                    name: "f".into(),
                    arity: 2,
                    out_start: 0,
                },
            ]
        );
    }

    #[test]
    fn if_then_else_is_three_adjacent_calls() {
        let items = postfix("if (a) then (1) else (2)");
        assert_eq!(
            items,
            vec![
                PostfixItem::Ident("a".into()),
                PostfixItem::Call {
                    name: "if".into(),
                    arity: 1,
                    out_start: 0,
                },
                PostfixItem::Int(1),
                PostfixItem::Call {
                    name: "then".into(),
                    arity: 1,
                    out_start: 2,
                },
                PostfixItem::Int(2),
                PostfixItem::Call {
                    name: "else".into(),
                    arity: 1,
                    out_start: 4,
                },
            ]
        );
    }

    #[test]
    fn structural_errors() {
        assert!(parse_expression(&tokenize("(a").unwrap()).is_err());
        assert!(parse_expression(&tokenize("a)").unwrap()).is_err());
        assert!(parse_expression(&tokenize("a, b").unwrap()).is_err());
        assert!(parse_expression(&tokenize("()").unwrap()).is_err());
        assert!(parse_expression(&tokenize("(a, b)").unwrap()).is_err());
        assert!(parse_expression(&tokenize("").unwrap()).is_err());
    }

    #[test]
    fn split_and_as_clause() {
        let lexemes = tokenize("a + 1 as int:b; name").unwrap();
        let segments = split_expressions(&lexemes).unwrap();
        assert_eq!(segments.len(), 2);

        let (expr, descriptor) = strip_as_clause(segments[0]).unwrap();
        assert_eq!(descriptor, Some("int:b"));
        assert_eq!(expr.len(), 3);

        let (expr, descriptor) = strip_as_clause(segments[1]).unwrap();
        assert_eq!(descriptor, None);
        assert_eq!(expr.len(), 1);

        assert!(strip_as_clause(&tokenize("a as").unwrap()).is_err());
        assert!(split_expressions(&tokenize("; a").unwrap()).is_err());
    }
}
