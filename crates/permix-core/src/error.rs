// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The engine's single error taxonomy.
//!
//! Every fallible boundary — schema parsing, condition parsing, evaluation,
//! storage, HTTP handling — ultimately produces an [`Error`]. Each variant
//! carries a stable `code` via [`Error::code`], which the HTTP layer uses to
//! build the `{code, message, details}` envelope.

use thiserror::Error;

/// The engine's error type.
///
/// # Policy
///
/// A permission check must never return `allowed: true` on any error path.
/// Handlers that construct a decision response must check for an `Error`
/// first and treat it as an authoritative non-decision.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed request body, missing required field, or otherwise invalid
    /// input that failed validation before any lookup was attempted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A required field was absent from the request body.
    #[error("missing required field(s): {0}")]
    MissingFields(String),

    /// Unique-constraint violation on create.
    #[error("entity already exists: {type_} / {external_id}")]
    EntityAlreadyExists {
        /// Entity type of the conflicting row.
        type_: String,
        /// External id of the conflicting row.
        external_id: String,
    },

    /// Requested entity does not exist.
    #[error("entity not found: {type_} / {external_id}")]
    EntityNotFound {
        /// Entity type that was looked up.
        type_: String,
        /// External id that was looked up.
        external_id: String,
    },

    /// No permission definition exists for `(object_type, permission)`.
    #[error("permission definition not found: {object_type}.{permission}")]
    PermissionDefinitionNotFound {
        /// Object type the permission was requested against.
        object_type: String,
        /// Permission name that was requested.
        permission: String,
    },

    /// No rule definition exists with the given name.
    #[error("rule not found: {0}")]
    RuleNotFound(String),

    /// The schema (`.perm`) source failed to tokenize or parse badly enough
    /// that no model could be produced at all (I/O error or empty input).
    #[error("schema parse failure: {0}")]
    SchemaParseFailure(String),

    /// A stored condition expression string failed to parse at evaluation
    /// time.
    #[error("condition parse failure: {0}")]
    ConditionParseFailure(String),

    /// The evaluator hit a condition it cannot resolve: a missing context
    /// path, an unresolvable rule, a type-incompatible comparison, or
    /// exceeded the rule-recursion depth cap.
    #[error("evaluation failure: {0}")]
    EvaluationFailure(String),

    /// The underlying catalog/database failed, or a request deadline was
    /// exceeded.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// A request exceeded its handler-scoped deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Catch-all for unexpected failures that do not fit another variant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable error code, used verbatim in the
    /// `{code, message, details}` envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::MissingFields(_) => "missing_fields",
            Error::EntityAlreadyExists { .. } => "entity_already_exists",
            Error::EntityNotFound { .. } => "entity_not_found",
            Error::PermissionDefinitionNotFound { .. } => "permission_definition_not_found",
            Error::RuleNotFound(_) => "rule_not_found",
            Error::SchemaParseFailure(_) => "schema_parse_failure",
            Error::ConditionParseFailure(_) => "condition_parse_failure",
            Error::EvaluationFailure(_) => "evaluation_failure",
            Error::StorageFailure(_) => "storage_failure",
            Error::DeadlineExceeded => "deadline_exceeded",
            Error::Internal(_) => "internal_error",
        }
    }

    /// The HTTP status this error maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidRequest(_) | Error::MissingFields(_) => 400,
            Error::EntityAlreadyExists { .. } => 409,
            Error::EntityNotFound { .. }
            | Error::PermissionDefinitionNotFound { .. }
            | Error::RuleNotFound(_) => 404,
            Error::DeadlineExceeded => 504,
            Error::SchemaParseFailure(_)
            | Error::ConditionParseFailure(_)
            | Error::EvaluationFailure(_)
            | Error::StorageFailure(_)
            | Error::Internal(_) => 500,
        }
    }
}

/// Convenience alias used throughout the engine's crates.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::MissingFields("x".into()).code(), "missing_fields");
        assert_eq!(
            Error::PermissionDefinitionNotFound {
                object_type: "document".into(),
                permission: "frobnicate".into(),
            }
            .code(),
            "permission_definition_not_found"
        );
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(
            Error::EntityNotFound {
                type_: "user".into(),
                external_id: "u1".into(),
            }
            .http_status(),
            404
        );
    }

    #[test]
    fn conflict_maps_to_409() {
        assert_eq!(
            Error::EntityAlreadyExists {
                type_: "user".into(),
                external_id: "u1".into(),
            }
            .http_status(),
            409
        );
    }
}
