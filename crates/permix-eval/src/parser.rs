// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Recursive-descent parser over condition-expression tokens.
//!
//! Precedence, lowest to highest: `or`, `and`, comparison, primary. Every
//! binary is left-associative.

use crate::{
    ast::{CompareOp, Expr, Literal},
    lexer::{lex, Token},
};

/// A condition parse error, carrying enough text to surface directly as an
/// evaluation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError(pub String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseError {}

/// Parse a full condition expression string into an [`Expr`] tree.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = lex(source).map_err(ParseError)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek(), Token::Eof) {
            Ok(())
        } else {
            Err(ParseError(format!("unexpected trailing token {}", self.peek())))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_primary()?;
        let op = match self.peek() {
            Token::EqEq => CompareOp::Eq,
            Token::Neq => CompareOp::Neq,
            Token::Gt => CompareOp::Gt,
            Token::Gte => CompareOp::Gte,
            Token::Lt => CompareOp::Lt,
            Token::Lte => CompareOp::Lte,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_primary()?;
        Ok(Expr::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Token::LParen => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Token::RParen => Ok(inner),
                    other => Err(ParseError(format!("expected ')', found {other}"))),
                }
            }
            Token::Int(n) => Ok(Expr::Literal(Literal::Int(n))),
            Token::Float(n) => Ok(Expr::Literal(Literal::Float(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Ident(first) => {
                if matches!(self.peek(), Token::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Token::RParen) {
                        loop {
                            args.push(self.parse_or()?);
                            if matches!(self.peek(), Token::Comma) {
                                self.advance();
                                continue;
                            }
                            break;
                        }
                    }
                    match self.advance() {
                        Token::RParen => Ok(Expr::Call { name: first, args }),
                        other => Err(ParseError(format!("expected ')', found {other}"))),
                    }
                } else if matches!(self.peek(), Token::Dot) {
                    let mut segments = vec![first];
                    while matches!(self.peek(), Token::Dot) {
                        self.advance();
                        match self.advance() {
                            Token::Ident(seg) => segments.push(seg),
                            other => return Err(ParseError(format!("expected identifier after '.', found {other}"))),
                        }
                    }
                    if segments[0] == "request" {
                        Ok(Expr::Context {
                            path: segments[1..].to_vec(),
                        })
                    } else {
                        let name = segments.pop().unwrap();
                        Ok(Expr::Relation {
                            path: segments.join("."),
                            name,
                        })
                    }
                } else {
                    Ok(Expr::Relation {
                        path: String::new(),
                        name: first,
                    })
                }
            }
            other => Err(ParseError(format!("expected an expression, found {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_identifier_as_direct_relation() {
        assert_eq!(
            parse("owner").unwrap(),
            Expr::Relation {
                path: String::new(),
                name: "owner".into()
            }
        );
    }

    #[test]
    fn parses_dotted_path_as_indirect_relation() {
        assert_eq!(
            parse("org.admin").unwrap(),
            Expr::Relation {
                path: "org".into(),
                name: "admin".into()
            }
        );
    }

    #[test]
    fn parses_request_dotted_path_as_context() {
        assert_eq!(parse("request.amount").unwrap(), Expr::Context { path: vec!["amount".into()] });
    }

    #[test]
    fn parses_or_with_correct_left_associativity() {
        let expr = parse("a or b or c").unwrap();
        assert_eq!(
            expr,
            Expr::Or(
                Box::new(Expr::Or(
                    Box::new(Expr::Relation { path: "".into(), name: "a".into() }),
                    Box::new(Expr::Relation { path: "".into(), name: "b".into() }),
                )),
                Box::new(Expr::Relation { path: "".into(), name: "c".into() }),
            )
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("a or b and c").unwrap();
        match expr {
            Expr::Or(left, right) => {
                assert_eq!(*left, Expr::Relation { path: "".into(), name: "a".into() });
                assert!(matches!(*right, Expr::And(_, _)));
            }
            _ => panic!("expected Or at the root"),
        }
    }

    #[test]
    fn parses_rule_call_with_mixed_arguments() {
        let expr = parse("under_limit(request.amount, cap)").unwrap();
        match expr {
            Expr::Call { name, args } => {
                assert_eq!(name, "under_limit");
                assert_eq!(args.len(), 2);
                assert_eq!(args[0], Expr::Context { path: vec!["amount".into()] });
                assert_eq!(args[1], Expr::Relation { path: "".into(), name: "cap".into() });
            }
            _ => panic!("expected a call"),
        }
    }

    #[test]
    fn parses_comparison_with_numeric_literal() {
        let expr = parse("amount <= 150").unwrap();
        match expr {
            Expr::Comparison { op, right, .. } => {
                assert_eq!(op, CompareOp::Lte);
                assert_eq!(*right, Expr::Literal(Literal::Int(150)));
            }
            _ => panic!("expected a comparison"),
        }
    }

    #[test]
    fn parenthesised_group_overrides_precedence() {
        let expr = parse("(a or b) and c").unwrap();
        assert!(matches!(expr, Expr::And(_, _)));
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        assert!(parse("owner )").is_err());
    }
}
