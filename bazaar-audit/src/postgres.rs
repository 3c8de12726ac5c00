//! PostgreSQL audit sink

use crate::query::QueryOptions;
use crate::sink::AuditSink;
use crate::types::{AuditAction, AuditError, AuditEvent, AuditTarget, Result};
use async_trait::async_trait;
use bazaar_domain::ActorSnapshot;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Audit sink backed by the `audit_events` table
pub struct PgAuditSink {
    pool: Arc<PgPool>,
}

impl PgAuditSink {
    /// Create a new sink
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, event: &AuditEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (
                id, order_id, target_model, target_id, action, status_from, status_to,
                actor_id, actor_name, actor_role, note, metadata, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(event.id)
        .bind(event.order_id)
        .bind(event.target.as_ref().map(|t| t.model.clone()))
        .bind(event.target.as_ref().map(|t| t.id))
        .bind(event.action.as_str())
        .bind(&event.status_from)
        .bind(&event.status_to)
        .bind(event.actor.id)
        .bind(&event.actor.name)
        .bind(&event.actor.role)
        .bind(&event.note)
        .bind(&event.metadata)
        .bind(event.created_at)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn query(&self, options: &QueryOptions) -> Result<Vec<AuditEvent>> {
        let mut query = String::from("SELECT * FROM audit_events WHERE TRUE");
        let mut bind_count = 0;

        // Build dynamic query based on filters
        if options.order_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND order_id = ${}", bind_count));
        }

        if options.target_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND target_id = ${}", bind_count));
        }

        if options.action.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND action = ${}", bind_count));
        }

        if options.from_time.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND created_at >= ${}", bind_count));
        }

        if options.to_time.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND created_at < ${}", bind_count));
        }

        let order = if options.descending { "DESC" } else { "ASC" };
        query.push_str(&format!(" ORDER BY created_at {}, id {}", order, order));

        if options.limit.is_some() {
            bind_count += 1;
            query.push_str(&format!(" LIMIT ${}", bind_count));
        }

        let mut q = sqlx::query_as::<_, AuditEventRow>(&query);
        if let Some(order_id) = options.order_id {
            q = q.bind(order_id);
        }
        if let Some(target_id) = options.target_id {
            q = q.bind(target_id);
        }
        if let Some(action) = options.action {
            q = q.bind(action.as_str());
        }
        if let Some(from_time) = options.from_time {
            q = q.bind(from_time);
        }
        if let Some(to_time) = options.to_time {
            q = q.bind(to_time);
        }
        if let Some(limit) = options.limit {
            q = q.bind(limit);
        }

        let rows = q.fetch_all(&*self.pool).await?;
        rows.into_iter().map(AuditEvent::try_from).collect()
    }
}

/// Database row mapping
#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: Uuid,
    order_id: Option<Uuid>,
    target_model: Option<String>,
    target_id: Option<Uuid>,
    action: String,
    status_from: Option<String>,
    status_to: Option<String>,
    actor_id: Uuid,
    actor_name: String,
    actor_role: String,
    note: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditEventRow> for AuditEvent {
    type Error = AuditError;

    fn try_from(row: AuditEventRow) -> Result<Self> {
        let action = AuditAction::parse(&row.action)
            .ok_or_else(|| AuditError::Unavailable(format!("unknown audit action {}", row.action)))?;
        let target = match (row.target_model, row.target_id) {
            (Some(model), Some(id)) => Some(AuditTarget { model, id }),
            _ => None,
        };

        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            target,
            action,
            status_from: row.status_from,
            status_to: row.status_to,
            actor: ActorSnapshot {
                id: row.actor_id,
                name: row.actor_name,
                role: row.actor_role,
            },
            note: row.note,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}
