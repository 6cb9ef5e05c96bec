//! Append-only audit trail for mutating operations.
//!
//! Handlers emit an [`AuditEvent`] after a mutation reaches the store; a
//! detached worker redacts sensitive fields and inserts the row. The write is
//! best-effort: a full channel, a closed channel, or a failed insert is logged
//! and never fails the operation that produced the event.

use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info_span};
use uuid::Uuid;

use crate::guard::{AuthPrincipal, Operation};

/// Redaction marker stored in place of sensitive values.
const REDACTED: &str = "[REDACTED]";

/// One audit entry, captured at the call site before redaction.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor: Uuid,
    pub action: &'static str,
    pub resource_type: &'static str,
    pub resource_id: Option<Uuid>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub details: Value,
}

impl AuditEvent {
    /// Build an event for a declared operation, pulling client metadata from
    /// the request headers.
    #[must_use]
    pub fn for_operation(
        operation: &Operation,
        principal: &AuthPrincipal,
        headers: &axum::http::HeaderMap,
        resource_id: Option<Uuid>,
        details: Value,
    ) -> Self {
        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self {
            actor: principal.id,
            action: operation.name,
            resource_type: operation.resource,
            resource_id,
            client_ip: crate::api::handlers::auth::utils::extract_client_ip(headers),
            user_agent,
            details,
        }
    }
}

/// Handle for emitting audit events. Cloned into every handler; the worker
/// owning the receiving end runs for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct AuditRecorder {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl AuditRecorder {
    /// Spawn the worker task and return the emitting handle.
    #[must_use]
    pub fn spawn(pool: PgPool) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEvent>();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(err) = insert_entry(&pool, event).await {
                    error!("failed to write audit entry: {err:#}");
                }
            }
        });

        Self { tx }
    }

    /// Emit an event without waiting for the write.
    pub fn record(&self, event: AuditEvent) {
        if self.tx.send(event).is_err() {
            error!("audit worker is gone, dropping entry");
        }
    }

    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<AuditEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

async fn insert_entry(pool: &PgPool, mut event: AuditEvent) -> anyhow::Result<()> {
    use anyhow::Context;

    redact(&mut event.details);

    let query = r"
        INSERT INTO audit_log
            (actor_id, action, resource_type, resource_id, client_ip, user_agent, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7::jsonb, NOW())
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let details =
        serde_json::to_string(&event.details).context("failed to serialize audit details")?;
    sqlx::query(query)
        .bind(event.actor)
        .bind(event.action)
        .bind(event.resource_type)
        .bind(event.resource_id)
        .bind(event.client_ip)
        .bind(event.user_agent)
        .bind(details)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert audit entry")?;

    Ok(())
}

/// Replace values under password/secret/token-like keys, recursing into
/// nested objects and arrays.
fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if is_sensitive_key(key) {
                    *entry = Value::String(REDACTED.to_string());
                } else {
                    redact(entry);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact(item);
            }
        }
        _ => {}
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    key.contains("password") || key.contains("secret") || key.contains("token")
}
