//! SQLite append-only logs: transfer audits, FTP operations, audit events.

use async_trait::async_trait;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{AuditEvent, AuditOperation, FileTransferAudit, FtpOperationLog, FtpOperationType};
use crate::interfaces::ledger_store::{Result, StorageError};
use crate::interfaces::{AuditSink, TransferAuditStore};
use crate::storage::helpers::{narrow, parse_timestamp, parse_uuid, timestamp_to_text};
use crate::storage::schema::{
    AuditEvent as Ae, FileTransferAudit as Fta, FtpOperationLog as Fol, CREATE_AUDIT_EVENT_TABLE,
    CREATE_TRANSFER_TABLES,
};

const AUDIT_TABLE: &str = "file_transfer_audit";
const OPERATION_TABLE: &str = "ftp_operation_log";
const EVENT_TABLE: &str = "audit_event";

pub struct SqliteTransferAuditStore {
    pool: SqlitePool,
}

impl SqliteTransferAuditStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_TRANSFER_TABLES).execute(&self.pool).await?;
        Ok(())
    }

    fn decode_audit(row: &SqliteRow) -> Result<FileTransferAudit> {
        let run_id: Option<String> = row.try_get("check_run_workflow_id")?;
        Ok(FileTransferAudit {
            id: parse_uuid(AUDIT_TABLE, &row.try_get::<String, _>("id")?)?,
            timestamp: parse_timestamp(AUDIT_TABLE, &row.try_get::<String, _>("timestamp")?)?,
            check_run_workflow_id: run_id.map(|id| parse_uuid(AUDIT_TABLE, &id)).transpose()?,
            file_name: row.try_get("file_name")?,
            destination: row.try_get("destination")?,
            file_size: narrow(AUDIT_TABLE, "file_size", row.try_get::<i64, _>("file_size")?)?,
            transfer_duration_ms: narrow(
                AUDIT_TABLE,
                "transfer_duration_ms",
                row.try_get::<i64, _>("transfer_duration_ms")?,
            )?,
            is_success: row.try_get("is_success")?,
            error_message: row.try_get("error_message")?,
            user_name: row.try_get("user_name")?,
            payload: row.try_get("payload")?,
            payload_digest: row.try_get("payload_digest")?,
        })
    }

    fn decode_operation(row: &SqliteRow) -> Result<FtpOperationLog> {
        let operation: String = row.try_get("operation_type")?;
        Ok(FtpOperationLog {
            id: parse_uuid(OPERATION_TABLE, &row.try_get::<String, _>("id")?)?,
            check_run_workflow_id: parse_uuid(OPERATION_TABLE, &row.try_get::<String, _>("check_run_workflow_id")?)?,
            operation_type: FtpOperationType::parse(&operation)
                .ok_or_else(|| StorageError::corrupt(OPERATION_TABLE, format!("operation_type {operation}")))?,
            file_name: row.try_get("file_name")?,
            destination: row.try_get("destination")?,
            is_success: row.try_get("is_success")?,
            error_message: row.try_get("error_message")?,
            duration_ms: narrow(OPERATION_TABLE, "duration_ms", row.try_get::<i64, _>("duration_ms")?)?,
            timestamp: parse_timestamp(OPERATION_TABLE, &row.try_get::<String, _>("timestamp")?)?,
            user_name: row.try_get("user_name")?,
        })
    }
}

#[async_trait]
impl TransferAuditStore for SqliteTransferAuditStore {
    async fn append_audit(&self, audit: &FileTransferAudit) -> Result<()> {
        let (sql, values) = Query::insert()
            .into_table(Fta::Table)
            .columns([
                Fta::Id,
                Fta::Timestamp,
                Fta::CheckRunWorkflowId,
                Fta::FileName,
                Fta::Destination,
                Fta::FileSize,
                Fta::TransferDurationMs,
                Fta::IsSuccess,
                Fta::ErrorMessage,
                Fta::UserName,
                Fta::Payload,
                Fta::PayloadDigest,
            ])
            .values_panic([
                audit.id.to_string().into(),
                timestamp_to_text(audit.timestamp).into(),
                audit.check_run_workflow_id.map(|id| id.to_string()).into(),
                audit.file_name.clone().into(),
                audit.destination.clone().into(),
                narrow::<u64, i64>(AUDIT_TABLE, "file_size", audit.file_size)?.into(),
                narrow::<u64, i64>(AUDIT_TABLE, "transfer_duration_ms", audit.transfer_duration_ms)?.into(),
                audit.is_success.into(),
                audit.error_message.clone().into(),
                audit.user_name.clone().into(),
                audit.payload.clone().into(),
                audit.payload_digest.clone().into(),
            ])
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&self.pool).await?;
        Ok(())
    }

    async fn append_operation(&self, operation: &FtpOperationLog) -> Result<()> {
        let (sql, values) = Query::insert()
            .into_table(Fol::Table)
            .columns([
                Fol::Id,
                Fol::CheckRunWorkflowId,
                Fol::OperationType,
                Fol::FileName,
                Fol::Destination,
                Fol::IsSuccess,
                Fol::ErrorMessage,
                Fol::DurationMs,
                Fol::Timestamp,
                Fol::UserName,
            ])
            .values_panic([
                operation.id.to_string().into(),
                operation.check_run_workflow_id.to_string().into(),
                operation.operation_type.as_str().into(),
                operation.file_name.clone().into(),
                operation.destination.clone().into(),
                operation.is_success.into(),
                operation.error_message.clone().into(),
                narrow::<u64, i64>(OPERATION_TABLE, "duration_ms", operation.duration_ms)?.into(),
                timestamp_to_text(operation.timestamp).into(),
                operation.user_name.clone().into(),
            ])
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&self.pool).await?;
        Ok(())
    }

    async fn audits_for(&self, run_id: Uuid) -> Result<Vec<FileTransferAudit>> {
        let (sql, values) = Query::select()
            .columns([
                Fta::Id,
                Fta::Timestamp,
                Fta::CheckRunWorkflowId,
                Fta::FileName,
                Fta::Destination,
                Fta::FileSize,
                Fta::TransferDurationMs,
                Fta::IsSuccess,
                Fta::ErrorMessage,
                Fta::UserName,
                Fta::Payload,
                Fta::PayloadDigest,
            ])
            .from(Fta::Table)
            .and_where(Expr::col(Fta::CheckRunWorkflowId).eq(run_id.to_string()))
            .order_by(Fta::Timestamp, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);
        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(Self::decode_audit).collect()
    }

    async fn operations_for(&self, run_id: Uuid) -> Result<Vec<FtpOperationLog>> {
        let (sql, values) = Query::select()
            .columns([
                Fol::Id,
                Fol::CheckRunWorkflowId,
                Fol::OperationType,
                Fol::FileName,
                Fol::Destination,
                Fol::IsSuccess,
                Fol::ErrorMessage,
                Fol::DurationMs,
                Fol::Timestamp,
                Fol::UserName,
            ])
            .from(Fol::Table)
            .and_where(Expr::col(Fol::CheckRunWorkflowId).eq(run_id.to_string()))
            .order_by(Fol::Timestamp, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);
        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(Self::decode_operation).collect()
    }
}

pub struct SqliteAuditSink {
    pool: SqlitePool,
}

impl SqliteAuditSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_AUDIT_EVENT_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    fn decode(row: &SqliteRow) -> Result<AuditEvent> {
        let operation: String = row.try_get("operation")?;
        Ok(AuditEvent {
            id: parse_uuid(EVENT_TABLE, &row.try_get::<String, _>("id")?)?,
            table_name: row.try_get("table_name")?,
            operation: AuditOperation::parse(&operation)
                .ok_or_else(|| StorageError::corrupt(EVENT_TABLE, format!("operation {operation}")))?,
            primary_key: row.try_get("primary_key")?,
            user_name: row.try_get("user_name")?,
            changes_json: row.try_get("changes_json")?,
            changes_hash: row.try_get("changes_hash")?,
            created_at: parse_timestamp(EVENT_TABLE, &row.try_get::<String, _>("created_at")?)?,
        })
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn append(&self, event: &AuditEvent) -> Result<()> {
        let (sql, values) = Query::insert()
            .into_table(Ae::Table)
            .columns([
                Ae::Id,
                Ae::TableName,
                Ae::Operation,
                Ae::PrimaryKey,
                Ae::UserName,
                Ae::ChangesJson,
                Ae::ChangesHash,
                Ae::CreatedAt,
            ])
            .values_panic([
                event.id.to_string().into(),
                event.table_name.clone().into(),
                event.operation.as_str().into(),
                event.primary_key.clone().into(),
                event.user_name.clone().into(),
                event.changes_json.clone().into(),
                event.changes_hash.clone().into(),
                timestamp_to_text(event.created_at).into(),
            ])
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&self.pool).await?;
        Ok(())
    }

    async fn events_for(&self, table_name: &str, primary_key: &str) -> Result<Vec<AuditEvent>> {
        let (sql, values) = Query::select()
            .columns([
                Ae::Id,
                Ae::TableName,
                Ae::Operation,
                Ae::PrimaryKey,
                Ae::UserName,
                Ae::ChangesJson,
                Ae::ChangesHash,
                Ae::CreatedAt,
            ])
            .from(Ae::Table)
            .and_where(Expr::col(Ae::TableName).eq(table_name))
            .and_where(Expr::col(Ae::PrimaryKey).eq(primary_key))
            .order_by(Ae::CreatedAt, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);
        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(Self::decode).collect()
    }
}
