// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Hand-rolled lexer for the `.perm` schema DSL.
//!
//! Tokens carry `line`/`column` so the parser's diagnostics can point at the
//! exact offending source position.

use std::fmt;

/// A single lexical token, paired with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The token's kind and payload.
    pub kind: TokenKind,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
    /// Start offset, in `char`s from the start of the source.
    pub start: usize,
    /// End offset (exclusive), in `char`s from the start of the source.
    pub end: usize,
}

/// The kinds of lexemes the schema grammar defines.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `entity`
    KwEntity,
    /// `relation`
    KwRelation,
    /// `permission`
    KwPermission,
    /// `attribute`
    KwAttribute,
    /// `rule`
    KwRule,
    /// Case-insensitive `and`.
    KwAnd,
    /// Case-insensitive `or`.
    KwOr,
    /// An identifier: `[A-Za-z_][A-Za-z0-9_]*`, not matching a keyword.
    Ident(String),
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `@`
    At,
    /// `=`
    Eq,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `==`
    EqEq,
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
    /// End of input.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::KwEntity => write!(f, "'entity'"),
            TokenKind::KwRelation => write!(f, "'relation'"),
            TokenKind::KwPermission => write!(f, "'permission'"),
            TokenKind::KwAttribute => write!(f, "'attribute'"),
            TokenKind::KwRule => write!(f, "'rule'"),
            TokenKind::KwAnd => write!(f, "'and'"),
            TokenKind::KwOr => write!(f, "'or'"),
            TokenKind::Ident(s) => write!(f, "identifier '{s}'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::At => write!(f, "'@'"),
            TokenKind::Eq => write!(f, "'='"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Semicolon => write!(f, "';'"),
            TokenKind::EqEq => write!(f, "'=='"),
            TokenKind::Neq => write!(f, "'!='"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::Gte => write!(f, "'>='"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Lte => write!(f, "'<='"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A lexical error: an unexpected or unterminated character sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    /// Human-readable message.
    pub message: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
}

fn keyword(ident: &str) -> Option<TokenKind> {
    match ident {
        "entity" => Some(TokenKind::KwEntity),
        "relation" => Some(TokenKind::KwRelation),
        "permission" => Some(TokenKind::KwPermission),
        "attribute" => Some(TokenKind::KwAttribute),
        "rule" => Some(TokenKind::KwRule),
        _ if ident.eq_ignore_ascii_case("and") => Some(TokenKind::KwAnd),
        _ if ident.eq_ignore_ascii_case("or") => Some(TokenKind::KwOr),
        _ => None,
    }
}

/// Tokenise `source` in full, returning every token found and every lexical
/// error encountered along the way. Lexing never stops early: an
/// unrecognised character is reported and skipped so later tokens are still
/// produced, matching the parser's own error-recovering posture.
pub fn lex(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut line = 1;
    let mut column = 1;

    macro_rules! advance {
        () => {{
            if chars[i] == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
            i += 1;
        }};
    }

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            advance!();
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                advance!();
            }
            continue;
        }

        let (start_line, start_col, start_idx) = (line, column, i);

        if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                ident.push(chars[i]);
                advance!();
            }
            let kind = keyword(&ident).unwrap_or(TokenKind::Ident(ident));
            tokens.push(Token {
                kind,
                line: start_line,
                column: start_col,
                start: start_idx,
                end: i,
            });
            continue;
        }

        let single = |k: TokenKind| (k, 1usize);
        let two_char = |first: char, second: char, one: TokenKind, two: TokenKind| -> Option<(TokenKind, usize)> {
            if chars[i] == first {
                if chars.get(i + 1) == Some(&second) {
                    Some((two, 2))
                } else {
                    Some((one, 1))
                }
            } else {
                None
            }
        };

        let matched = match c {
            '{' => Some(single(TokenKind::LBrace)),
            '}' => Some(single(TokenKind::RBrace)),
            '(' => Some(single(TokenKind::LParen)),
            ')' => Some(single(TokenKind::RParen)),
            '[' => Some(single(TokenKind::LBracket)),
            ']' => Some(single(TokenKind::RBracket)),
            '@' => Some(single(TokenKind::At)),
            '.' => Some(single(TokenKind::Dot)),
            ',' => Some(single(TokenKind::Comma)),
            ';' => Some(single(TokenKind::Semicolon)),
            '=' => two_char('=', '=', TokenKind::Eq, TokenKind::EqEq),
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    Some((TokenKind::Neq, 2))
                } else {
                    None
                }
            }
            '>' => two_char('>', '=', TokenKind::Gt, TokenKind::Gte),
            '<' => two_char('<', '=', TokenKind::Lt, TokenKind::Lte),
            _ => None,
        };

        match matched {
            Some((kind, width)) => {
                for _ in 0..width {
                    advance!();
                }
                tokens.push(Token {
                    kind,
                    line: start_line,
                    column: start_col,
                    start: start_idx,
                    end: i,
                });
            }
            None => {
                errors.push(LexError {
                    message: format!("unexpected character '{c}'"),
                    line: start_line,
                    column: start_col,
                });
                advance!();
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
        column,
        start: chars.len(),
        end: chars.len(),
    });
    (tokens, errors)
}

/// Reconstruct the verbatim source text spanned by `[start, end)` char
/// indices, as produced by [`Token::start`]/[`Token::end`].
pub fn span_text(source: &str, start: usize, end: usize) -> String {
    source.chars().skip(start).take(end.saturating_sub(start)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_entity_block() {
        let (tokens, errors) = lex("entity document {\n  relation owner @user\n}");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::KwEntity);
        assert_eq!(tokens[1].kind, TokenKind::Ident("document".into()));
        assert_eq!(tokens[2].kind, TokenKind::LBrace);
        assert_eq!(tokens[3].kind, TokenKind::KwRelation);
    }

    #[test]
    fn and_or_are_case_insensitive() {
        let (tokens, _) = lex("AND Or and");
        assert_eq!(tokens[0].kind, TokenKind::KwAnd);
        assert_eq!(tokens[1].kind, TokenKind::KwOr);
        assert_eq!(tokens[2].kind, TokenKind::KwAnd);
    }

    #[test]
    fn comments_are_skipped() {
        let (tokens, errors) = lex("// a comment\nentity x {}");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::KwEntity);
    }

    #[test]
    fn unrecognised_character_is_recorded_and_skipped() {
        let (tokens, errors) = lex("entity x # { }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unexpected character '#'");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::LBrace));
    }

    #[test]
    fn two_char_operators_win_over_one_char() {
        let (tokens, _) = lex("a == b != c >= d <= e > f < g");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert!(kinds.contains(&TokenKind::EqEq));
        assert!(kinds.contains(&TokenKind::Neq));
        assert!(kinds.contains(&TokenKind::Gte));
        assert!(kinds.contains(&TokenKind::Lte));
        assert!(kinds.contains(&TokenKind::Gt));
        assert!(kinds.contains(&TokenKind::Lt));
    }

    #[test]
    fn tracks_line_and_column() {
        let (tokens, _) = lex("entity\n  x");
        let ident = tokens.iter().find(|t| matches!(t.kind, TokenKind::Ident(_))).unwrap();
        assert_eq!(ident.line, 2);
        assert_eq!(ident.column, 3);
    }
}
