//! Audit trail of lifecycle transitions.
//!
//! The engine emits one [`AuditEntry`] per changed record after the
//! transition committed. Sinks must not fail the transition: the engine logs
//! a sink error and moves on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ResultEngine;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// Entry with pre/post images of `entity`. Images that fail to serialize
    /// are recorded as absent.
    pub fn new<T: Serialize>(
        actor: &str,
        action: &str,
        entity_type: &str,
        entity_id: impl ToString,
        before: Option<&T>,
        after: Option<&T>,
    ) -> Self {
        let image = |value: Option<&T>| value.and_then(|v| serde_json::to_value(v).ok());
        Self {
            actor: actor.to_string(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            before: image(before),
            after: image(after),
            at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> ResultEngine<()>;
}

/// Writes entries to the application log only.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> ResultEngine<()> {
        tracing::info!(
            actor = %entry.actor,
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            "audit"
        );
        Ok(())
    }
}

/// Persists entries in the `audit_logs` table.
#[derive(Clone, Debug)]
pub struct DatabaseAuditSink {
    database: DatabaseConnection,
}

impl DatabaseAuditSink {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl AuditSink for DatabaseAuditSink {
    async fn record(&self, entry: AuditEntry) -> ResultEngine<()> {
        ActiveModel::from(&entry).insert(&self.database).await?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&AuditEntry> for ActiveModel {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            actor: ActiveValue::Set(entry.actor.clone()),
            action: ActiveValue::Set(entry.action.clone()),
            entity_type: ActiveValue::Set(entry.entity_type.clone()),
            entity_id: ActiveValue::Set(entry.entity_id.clone()),
            before: ActiveValue::Set(entry.before.as_ref().map(ToString::to_string)),
            after: ActiveValue::Set(entry.after.as_ref().map(ToString::to_string)),
            created_at: ActiveValue::Set(entry.at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Thing {
        status: &'static str,
    }

    #[test]
    fn entry_keeps_both_images() {
        let before = Thing { status: "pending" };
        let after = Thing { status: "confirmed" };
        let entry = AuditEntry::new(
            "agent",
            "reservation:accept",
            "reservation",
            "r-1",
            Some(&before),
            Some(&after),
        );
        assert_eq!(entry.before, Some(serde_json::json!({ "status": "pending" })));
        assert_eq!(entry.after, Some(serde_json::json!({ "status": "confirmed" })));
    }
}
