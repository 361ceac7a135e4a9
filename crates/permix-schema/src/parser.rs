// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Recursive-descent parser for the `.perm` schema DSL.
//!
//! Error-recovering: a malformed construct is recorded as a [`Diagnostic`]
//! and the parser resynchronises at the next top-level or entity-body
//! keyword rather than aborting, so a single typo doesn't discard an entire
//! file's worth of otherwise-valid declarations.

use std::collections::BTreeMap;

use permix_core::model::{
    AttributeDataType, AttributeDeclaration, EntitySchema, Model, PermissionSource, RelationDeclaration,
    RuleDefinition, RuleParameter, ScalarType,
};

use crate::lexer::{lex, span_text, Token, TokenKind};

/// A single parser diagnostic: a recoverable syntax problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Human-readable message.
    pub message: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

/// Parse a complete `.perm` source file.
///
/// Returns `(None, diagnostics)` only for an unrecoverable failure — empty
/// input. Any other malformed construct is recorded as a diagnostic, and a
/// best-effort [`Model`] is still returned alongside it.
pub fn parse_file(source: &str, source_file: Option<&str>) -> (Option<Model>, Vec<Diagnostic>) {
    if source.trim().is_empty() {
        return (
            None,
            vec![Diagnostic {
                message: "empty schema source".into(),
                line: 1,
                column: 1,
            }],
        );
    }

    let (tokens, lex_errors) = lex(source);
    let mut diagnostics: Vec<Diagnostic> = lex_errors
        .into_iter()
        .map(|e| Diagnostic {
            message: e.message,
            line: e.line,
            column: e.column,
        })
        .collect();

    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        diagnostics: Vec::new(),
        nested_rules: Vec::new(),
    };
    let model = parser.parse_model(source_file);
    diagnostics.append(&mut parser.diagnostics);
    (Some(model), diagnostics)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    /// Rules declared inside an `entity { ... }` body. The grammar allows
    /// `rule` as a member of an entity body as well as at the
    /// top level; nested rules are hoisted into the model's global rule
    /// table, same as top-level ones.
    nested_rules: Vec<RuleDefinition>,
}

impl<'a> Parser<'a> {
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

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn error(&mut self, message: impl Into<String>) {
        let tok = self.peek();
        self.diagnostics.push(Diagnostic {
            message: message.into(),
            line: tok.line,
            column: tok.column,
        });
    }

    fn expect_ident(&mut self) -> Option<String> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Some(name)
            }
            other => {
                self.error(format!("expected identifier, found {other}"));
                None
            }
        }
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            true
        } else {
            let found = self.peek().kind.clone();
            self.error(format!("expected {kind}, found {found}"));
            false
        }
    }

    /// Skip tokens until one of `stop` is next, or EOF. Used to recover from
    /// a malformed top-level or entity-body declaration.
    fn resync(&mut self, stop: &[TokenKind]) {
        while !self.at_eof() && !stop.contains(&self.peek().kind) {
            self.advance();
        }
    }

    fn parse_model(&mut self, source_file: Option<&str>) -> Model {
        let mut entities: BTreeMap<String, EntitySchema> = BTreeMap::new();
        let mut rules: BTreeMap<String, RuleDefinition> = BTreeMap::new();

        while !self.at_eof() {
            match self.peek().kind {
                TokenKind::KwEntity => {
                    if let Some(schema) = self.parse_entity() {
                        entities.insert(schema.name.clone(), schema);
                    }
                }
                TokenKind::KwRule => {
                    if let Some(rule) = self.parse_rule() {
                        rules.insert(rule.name.clone(), rule);
                    }
                }
                _ => {
                    let found = self.peek().kind.clone();
                    self.error(format!("expected 'entity' or 'rule' at top level, found {found}"));
                    self.advance();
                    self.resync(&[TokenKind::KwEntity, TokenKind::KwRule]);
                }
            }
        }

        for rule in self.nested_rules.drain(..) {
            rules.insert(rule.name.clone(), rule);
        }

        Model {
            entities,
            rules,
            source_file: source_file.map(|s| s.to_string()),
        }
    }

    fn parse_entity(&mut self) -> Option<EntitySchema> {
        self.advance(); // 'entity'
        let name = self.expect_ident()?;
        if !self.expect(TokenKind::LBrace) {
            self.resync(&[TokenKind::KwEntity, TokenKind::KwRule]);
            return None;
        }

        let mut relations = Vec::new();
        let mut attributes = Vec::new();
        let mut permissions = BTreeMap::new();

        const BODY_STOP: &[TokenKind] = &[
            TokenKind::KwRelation,
            TokenKind::KwPermission,
            TokenKind::KwAttribute,
            TokenKind::KwRule,
            TokenKind::RBrace,
        ];

        loop {
            match self.peek().kind {
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    self.error("unterminated entity body, expected '}'");
                    break;
                }
                TokenKind::KwRelation => {
                    if let Some(decl) = self.parse_relation_decl() {
                        relations.push(decl);
                    } else {
                        self.resync(BODY_STOP);
                    }
                }
                TokenKind::KwAttribute => {
                    if let Some(decl) = self.parse_attribute_decl() {
                        attributes.push(decl);
                    } else {
                        self.resync(BODY_STOP);
                    }
                }
                TokenKind::KwPermission => {
                    if let Some((name, source)) = self.parse_permission_decl() {
                        permissions.insert(name, source);
                    } else {
                        self.resync(BODY_STOP);
                    }
                }
                TokenKind::KwRule => {
                    if let Some(rule) = self.parse_rule() {
                        // A nested rule declaration is scoped globally; the
                        // caller merges it into the model's rule table.
                        self.nested_rules.push(rule);
                    } else {
                        self.resync(BODY_STOP);
                    }
                }
                _ => {
                    let found = self.peek().kind.clone();
                    self.error(format!(
                        "expected 'relation', 'permission', 'attribute', 'rule', or '}}' in entity body, found {found}"
                    ));
                    self.advance();
                    self.resync(BODY_STOP);
                }
            }
        }

        Some(EntitySchema {
            name,
            relations,
            attributes,
            permissions,
        })
    }

    fn parse_relation_decl(&mut self) -> Option<RelationDeclaration> {
        self.advance(); // 'relation'
        let name = self.expect_ident()?;
        if !self.expect(TokenKind::At) {
            return None;
        }
        let target_type = self.expect_ident()?;
        Some(RelationDeclaration { name, target_type })
    }

    fn parse_attribute_decl(&mut self) -> Option<AttributeDeclaration> {
        self.advance(); // 'attribute'
        let name = self.expect_ident()?;
        let data_type = self.parse_data_type()?;
        Some(AttributeDeclaration { name, data_type })
    }

    fn parse_data_type(&mut self) -> Option<AttributeDataType> {
        let ident = self.expect_ident()?;
        let scalar = match ident.as_str() {
            "boolean" => ScalarType::Boolean,
            "string" => ScalarType::String,
            "integer" => ScalarType::Integer,
            "double" => ScalarType::Double,
            other => {
                self.error(format!("unknown scalar type '{other}', expected boolean/string/integer/double"));
                return None;
            }
        };
        if self.peek().kind == TokenKind::LBracket {
            self.advance();
            if !self.expect(TokenKind::RBracket) {
                return None;
            }
            Some(AttributeDataType::array_of(scalar))
        } else {
            Some(AttributeDataType::scalar(scalar))
        }
    }

    /// `permission IDENT '=' expr` — the body expression is captured
    /// verbatim as source text; the same applies to permission bodies,
    /// which the condition evaluator re-parses independently.
    fn parse_permission_decl(&mut self) -> Option<(String, PermissionSource)> {
        self.advance(); // 'permission'
        let name = self.expect_ident()?;
        if !self.expect(TokenKind::Eq) {
            return None;
        }
        let expression = self.parse_expr_span()?;
        Some((
            name,
            PermissionSource {
                expression,
                description: None,
            },
        ))
    }

    fn parse_rule(&mut self) -> Option<RuleDefinition> {
        self.advance(); // 'rule'
        let name = self.expect_ident()?;
        if !self.expect(TokenKind::LParen) {
            return None;
        }
        let mut parameters = Vec::new();
        if self.peek().kind != TokenKind::RParen {
            loop {
                let param_name = self.expect_ident()?;
                let data_type = self.parse_data_type()?;
                parameters.push(RuleParameter {
                    name: param_name,
                    data_type,
                });
                if self.peek().kind == TokenKind::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        if !self.expect(TokenKind::RParen) {
            return None;
        }
        if !self.expect(TokenKind::LBrace) {
            return None;
        }
        let expression = self.parse_expr_span()?;
        if !self.expect(TokenKind::RBrace) {
            return None;
        }
        Some(RuleDefinition {
            name,
            parameters,
            expression,
            description: None,
        })
    }

    /// Parse an `expr` against the condition grammar for validation
    /// purposes only (to know where the expression ends), returning the
    /// verbatim source text it spanned.
    fn parse_expr_span(&mut self) -> Option<String> {
        let start = self.peek().start;
        self.parse_or_expr()?;
        let end_tok_idx = self.pos.saturating_sub(1).min(self.tokens.len() - 1);
        let end = self.tokens[end_tok_idx].end;
        Some(span_text(self.source, start, end))
    }

    fn parse_or_expr(&mut self) -> Option<()> {
        self.parse_and_expr()?;
        while self.peek().kind == TokenKind::KwOr {
            self.advance();
            self.parse_and_expr()?;
        }
        Some(())
    }

    fn parse_and_expr(&mut self) -> Option<()> {
        self.parse_comparison()?;
        while self.peek().kind == TokenKind::KwAnd {
            self.advance();
            self.parse_comparison()?;
        }
        Some(())
    }

    fn parse_comparison(&mut self) -> Option<()> {
        self.parse_primary()?;
        if matches!(
            self.peek().kind,
            TokenKind::EqEq | TokenKind::Neq | TokenKind::Gt | TokenKind::Gte | TokenKind::Lt | TokenKind::Lte
        ) {
            self.advance();
            self.parse_primary()?;
        }
        Some(())
    }

    fn parse_primary(&mut self) -> Option<()> {
        match self.peek().kind.clone() {
            TokenKind::LParen => {
                self.advance();
                self.parse_or_expr()?;
                self.expect(TokenKind::RParen);
            }
            TokenKind::Ident(_) => {
                self.advance();
                if self.peek().kind == TokenKind::Dot {
                    self.advance();
                    self.expect_ident()?;
                } else if self.peek().kind == TokenKind::LParen {
                    self.advance();
                    if self.peek().kind != TokenKind::RParen {
                        loop {
                            self.parse_or_expr()?;
                            if self.peek().kind == TokenKind::Comma {
                                self.advance();
                                continue;
                            }
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen);
                }
            }
            other => {
                self.error(format!("expected an expression, found {other}"));
                return None;
            }
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_is_unrecoverable() {
        let (model, diagnostics) = parse_file("   \n  ", None);
        assert!(model.is_none());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn parses_direct_owner_schema() {
        let src = "entity document {\n  relation owner @user\n  permission read = owner\n}";
        let (model, diagnostics) = parse_file(src, Some("s1.perm"));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let model = model.unwrap();
        let doc = model.entities.get("document").unwrap();
        assert_eq!(doc.relations[0].name, "owner");
        assert_eq!(doc.relations[0].target_type, "user");
        assert_eq!(doc.permissions.get("read").unwrap().expression, "owner");
        assert_eq!(model.source_file.as_deref(), Some("s1.perm"));
    }

    #[test]
    fn parses_indirect_permission_via_dotted_path() {
        let src = "entity project {\n  relation org @organization\n  permission manage = org.admin\n}";
        let (model, diagnostics) = parse_file(src, None);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let project = model.unwrap().entities.remove("project").unwrap();
        assert_eq!(project.permissions.get("manage").unwrap().expression, "org.admin");
    }

    #[test]
    fn parses_rule_with_parameters_and_call_site() {
        let src = "rule under_limit(amount double, cap double) { amount <= cap }\n\
                   entity account {\n  attribute cap double\n  permission withdraw = under_limit(request.amount, cap)\n}";
        let (model, diagnostics) = parse_file(src, None);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let model = model.unwrap();
        let rule = model.rules.get("under_limit").unwrap();
        assert_eq!(rule.parameters.len(), 2);
        assert_eq!(rule.expression, "amount <= cap");
        let account = model.entities.get("account").unwrap();
        assert_eq!(
            account.permissions.get("withdraw").unwrap().expression,
            "under_limit(request.amount, cap)"
        );
    }

    #[test]
    fn array_attribute_type_parses() {
        let src = "entity user {\n  attribute tags string[]\n}";
        let (model, diagnostics) = parse_file(src, None);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let user = model.unwrap().entities.remove("user").unwrap();
        assert!(user.attributes[0].data_type.array);
    }

    #[test]
    fn recovers_after_malformed_entity_and_keeps_parsing_the_next_one() {
        let src = "entity broken {\n  relation !!! oops\n}\nentity document {\n  relation owner @user\n}";
        let (model, diagnostics) = parse_file(src, None);
        assert!(!diagnostics.is_empty());
        let model = model.unwrap();
        assert!(model.entities.contains_key("document"));
    }

    #[test]
    fn unknown_scalar_type_is_a_diagnostic_not_a_panic() {
        let src = "entity x {\n  attribute bad weird\n}";
        let (_model, diagnostics) = parse_file(src, None);
        assert!(diagnostics.iter().any(|d| d.message.contains("unknown scalar type")));
    }
}
