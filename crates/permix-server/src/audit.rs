// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The audit sink contract.
//!
//! Handlers fire these calls after the response body has been prepared, in
//! a detached task bounded by [`AUDIT_DEADLINE`] — audit persistence never
//! blocks or fails the HTTP response.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as Json;
use sqlx::postgres::PgPool;
use uuid::Uuid;

/// Independent deadline for a single audit write: a 5-second bounded
/// context.
pub const AUDIT_DEADLINE: Duration = Duration::from_secs(5);

/// Caller/request metadata carried alongside every audit event.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub request_id: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// A `/check` (and `/api/permission-path`) decision, for
/// `log_permission_check`.
#[derive(Debug, Clone)]
pub struct PermissionCheckEvent {
    pub subject_type: String,
    pub subject_id: String,
    pub permission: String,
    pub object_type: String,
    pub object_id: String,
    pub context: Json,
    pub result: Option<bool>,
    pub meta: RequestMeta,
}

/// An entity create/delete, for `log_entity_create`/`log_entity_delete`.
#[derive(Debug, Clone)]
pub struct EntityEvent {
    pub entity_type: String,
    pub entity_id: String,
    pub meta: RequestMeta,
}

/// A relation create/delete, for `log_relation_create`/`log_relation_delete`.
#[derive(Debug, Clone)]
pub struct RelationEvent {
    pub subject_type: String,
    pub subject_id: String,
    pub relation: String,
    pub object_type: String,
    pub object_id: String,
    pub meta: RequestMeta,
}

/// A single row read back from the audit log, for `GET /api/audit/logs`.
/// The shape is acknowledged but not specified beyond this.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub timestamp: chrono::DateTime<Utc>,
    pub action_type: String,
    pub result: Option<bool>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub subject_type: Option<String>,
    pub subject_id: Option<String>,
    pub relation: Option<String>,
    pub permission: Option<String>,
    pub context: Option<Json>,
    pub request_id: Option<String>,
}

/// Query filter for `GET /api/audit/logs`.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub limit: i64,
}

/// External collaborator contract for audit persistence.
///
/// The engine makes no assumption about where logs end up; a no-op
/// implementation is the default, since audit-log persistence beyond this
/// interface is out of scope. `list_logs` and
/// `get_log` back `/api/audit/logs`; the no-op sink reports nothing stored.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log_permission_check(&self, event: PermissionCheckEvent) -> permix_core::Result<()>;
    async fn log_entity_create(&self, event: EntityEvent) -> permix_core::Result<()>;
    async fn log_entity_delete(&self, event: EntityEvent) -> permix_core::Result<()>;
    async fn log_relation_create(&self, event: RelationEvent) -> permix_core::Result<()>;
    async fn log_relation_delete(&self, event: RelationEvent) -> permix_core::Result<()>;

    async fn list_logs(&self, _filter: AuditLogFilter) -> permix_core::Result<Vec<AuditLogEntry>> {
        Ok(Vec::new())
    }

    async fn get_log(&self, _id: Uuid) -> permix_core::Result<Option<AuditLogEntry>> {
        Ok(None)
    }
}

/// Discards every event. The default sink when no catalog-backed audit
/// store is configured.
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn log_permission_check(&self, _event: PermissionCheckEvent) -> permix_core::Result<()> {
        Ok(())
    }

    async fn log_entity_create(&self, _event: EntityEvent) -> permix_core::Result<()> {
        Ok(())
    }

    async fn log_entity_delete(&self, _event: EntityEvent) -> permix_core::Result<()> {
        Ok(())
    }

    async fn log_relation_create(&self, _event: RelationEvent) -> permix_core::Result<()> {
        Ok(())
    }

    async fn log_relation_delete(&self, _event: RelationEvent) -> permix_core::Result<()> {
        Ok(())
    }
}

/// Persists events to `authz_audit_logs`.
pub struct PostgresAuditSink {
    pool: PgPool,
}

impl PostgresAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert(
        &self,
        action_type: &str,
        result: Option<bool>,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
        subject_type: Option<&str>,
        subject_id: Option<&str>,
        relation: Option<&str>,
        permission: Option<&str>,
        context: Option<&Json>,
        meta: &RequestMeta,
    ) -> permix_core::Result<()> {
        sqlx::query(
            "INSERT INTO authz_audit_logs \
             (id, timestamp, action_type, result, entity_type, entity_id, subject_type, subject_id, relation, permission, context, request_id, client_ip, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(Uuid::now_v7())
        .bind(Utc::now())
        .bind(action_type)
        .bind(result)
        .bind(entity_type)
        .bind(entity_id)
        .bind(subject_type)
        .bind(subject_id)
        .bind(relation)
        .bind(permission)
        .bind(context)
        .bind(meta.request_id.as_deref())
        .bind(meta.client_ip.as_deref())
        .bind(meta.user_agent.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| permix_core::error::Error::StorageFailure(format!("writing audit log: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn log_permission_check(&self, event: PermissionCheckEvent) -> permix_core::Result<()> {
        self.insert(
            "permission_check",
            event.result,
            Some(&event.object_type),
            Some(&event.object_id),
            Some(&event.subject_type),
            Some(&event.subject_id),
            None,
            Some(&event.permission),
            Some(&event.context),
            &event.meta,
        )
        .await
    }

    async fn log_entity_create(&self, event: EntityEvent) -> permix_core::Result<()> {
        self.insert(
            "entity_create",
            None,
            Some(&event.entity_type),
            Some(&event.entity_id),
            None,
            None,
            None,
            None,
            None,
            &event.meta,
        )
        .await
    }

    async fn log_entity_delete(&self, event: EntityEvent) -> permix_core::Result<()> {
        self.insert(
            "entity_delete",
            None,
            Some(&event.entity_type),
            Some(&event.entity_id),
            None,
            None,
            None,
            None,
            None,
            &event.meta,
        )
        .await
    }

    async fn log_relation_create(&self, event: RelationEvent) -> permix_core::Result<()> {
        self.insert(
            "relation_create",
            None,
            Some(&event.object_type),
            Some(&event.object_id),
            Some(&event.subject_type),
            Some(&event.subject_id),
            Some(&event.relation),
            None,
            None,
            &event.meta,
        )
        .await
    }

    async fn log_relation_delete(&self, event: RelationEvent) -> permix_core::Result<()> {
        self.insert(
            "relation_delete",
            None,
            Some(&event.object_type),
            Some(&event.object_id),
            Some(&event.subject_type),
            Some(&event.subject_id),
            Some(&event.relation),
            None,
            None,
            &event.meta,
        )
        .await
    }

    async fn list_logs(&self, filter: AuditLogFilter) -> permix_core::Result<Vec<AuditLogEntry>> {
        let limit = if filter.limit > 0 { filter.limit } else { 100 };
        let rows: Vec<AuditLogRow> = sqlx::query_as(
            "SELECT id, timestamp, action_type, result, entity_type, entity_id, subject_type, subject_id, relation, permission, context, request_id \
             FROM authz_audit_logs ORDER BY timestamp DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| permix_core::error::Error::StorageFailure(format!("listing audit logs: {e}")))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_log(&self, id: Uuid) -> permix_core::Result<Option<AuditLogEntry>> {
        let row: Option<AuditLogRow> = sqlx::query_as(
            "SELECT id, timestamp, action_type, result, entity_type, entity_id, subject_type, subject_id, relation, permission, context, request_id \
             FROM authz_audit_logs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| permix_core::error::Error::StorageFailure(format!("reading audit log: {e}")))?;
        Ok(row.map(Into::into))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditLogRow {
    id: Uuid,
    timestamp: chrono::DateTime<Utc>,
    action_type: String,
    result: Option<bool>,
    entity_type: Option<String>,
    entity_id: Option<String>,
    subject_type: Option<String>,
    subject_id: Option<String>,
    relation: Option<String>,
    permission: Option<String>,
    context: Option<Json>,
    request_id: Option<String>,
}

impl From<AuditLogRow> for AuditLogEntry {
    fn from(row: AuditLogRow) -> Self {
        Self {
            id: row.id,
            timestamp: row.timestamp,
            action_type: row.action_type,
            result: row.result,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            subject_type: row.subject_type,
            subject_id: row.subject_id,
            relation: row.relation,
            permission: row.permission,
            context: row.context,
            request_id: row.request_id,
        }
    }
}

/// Fire `fut` in a detached task, bounding it by [`AUDIT_DEADLINE`] and
/// logging (never propagating) any failure or timeout.
pub fn spawn_audit<F>(fut: F)
where
    F: Future<Output = permix_core::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::time::timeout(AUDIT_DEADLINE, fut).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "audit write failed"),
            Err(_) => tracing::warn!("audit write exceeded its deadline"),
        }
    });
}
