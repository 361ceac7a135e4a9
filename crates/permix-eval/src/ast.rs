// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The condition expression tree.
//!
//! A bare identifier (`owner`) and a dotted non-`request` path
//! (`org.admin`) both parse to [`Expr::Relation`] — the grammar does not
//! syntactically distinguish "direct relation name" from "attribute name";
//! that distinction is resolved by the evaluator based on whether the node
//! is evaluated in boolean or value position (see `permix_eval::evaluator`).

use std::fmt;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        };
        write!(f, "{s}")
    }
}

/// A literal value. The grammar doesn't show a literal production on its
/// own, but comparisons against a constant need somewhere to land.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal.
    Int(i64),
    /// Floating-point literal.
    Float(f64),
    /// Quoted string literal.
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(n) => write!(f, "{n}"),
            Literal::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Short-circuiting conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuiting disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// `path == ""` is a direct relation named `name`; a non-empty `path`
    /// is an intermediate entity-type hop for an indirect relation.
    Relation {
        /// Intermediate hop type, or empty for a direct relation.
        path: String,
        /// Relation name.
        name: String,
    },
    /// A dotted `request.<segments>` lookup into the per-request context.
    Context {
        /// Path segments after `request`.
        path: Vec<String>,
    },
    /// A rule invocation.
    Call {
        /// Rule name.
        name: String,
        /// Argument expressions, in call order.
        args: Vec<Expr>,
    },
    /// A comparison between two value-position expressions.
    Comparison {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: CompareOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// A literal constant.
    Literal(Literal),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::And(l, r) => write!(f, "({l} and {r})"),
            Expr::Or(l, r) => write!(f, "({l} or {r})"),
            Expr::Relation { path, name } if path.is_empty() => write!(f, "{name}"),
            Expr::Relation { path, name } => write!(f, "{path}.{name}"),
            Expr::Context { path } => write!(f, "request.{}", path.join(".")),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Comparison { left, op, right } => write!(f, "{left} {op} {right}"),
            Expr::Literal(lit) => write!(f, "{lit}"),
        }
    }
}
