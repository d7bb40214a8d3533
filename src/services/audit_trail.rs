//! Change log writer.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::domain::audit::changes_hash;
use crate::domain::{Actor, AuditEvent, AuditOperation};
use crate::interfaces::ledger_store::Result;
use crate::interfaces::AuditSink;

pub const CHECK_RUN_WORKFLOW_TABLE: &str = "CHECK_RUN_WORKFLOW";
pub const PROFIT_SHARE_CHECK_TABLE: &str = "PROFIT_SHARE_CHECK";
pub const DEMOGRAPHIC_TABLE: &str = "DEMOGRAPHIC";
pub const DISTRIBUTION_TABLE: &str = "DISTRIBUTION";

#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Serialize `changes`, hash them and append the event.
    pub async fn record<T: Serialize + ?Sized>(
        &self,
        table_name: &str,
        operation: AuditOperation,
        primary_key: &str,
        changes: &T,
        actor: &Actor,
    ) -> Result<AuditEvent> {
        let changes_json = serde_json::to_string(changes)?;
        let event = AuditEvent {
            id: Uuid::new_v4(),
            table_name: table_name.to_string(),
            operation,
            primary_key: primary_key.to_string(),
            user_name: actor.user_name().to_string(),
            changes_hash: changes_hash(&changes_json),
            changes_json,
            created_at: Utc::now(),
        };
        self.sink.append(&event).await?;
        debug!(table = table_name, key = primary_key, operation = %operation, "Recorded audit event");
        Ok(event)
    }

    pub async fn events_for(&self, table_name: &str, primary_key: &str) -> Result<Vec<AuditEvent>> {
        self.sink.events_for(table_name, primary_key).await
    }
}
