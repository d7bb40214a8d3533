//! TransferAuditStore and AuditSink interface tests.

use chrono::{Duration, Utc};
use profitshare::domain::{payload_digest, AuditEvent, AuditOperation, FileTransferAudit, FtpOperationLog, FtpOperationType};
use profitshare::domain::audit::changes_hash;
use profitshare::interfaces::{AuditSink, TransferAuditStore};
use uuid::Uuid;

fn audit(run_id: Uuid, success: bool, payload: &[u8], offset_ms: i64) -> FileTransferAudit {
    FileTransferAudit {
        id: Uuid::new_v4(),
        timestamp: Utc::now() + Duration::milliseconds(offset_ms),
        check_run_workflow_id: Some(run_id),
        file_name: "PSCHECKS_2025_20251215_0.csv".into(),
        destination: "/production/OutBox/VENUS/".into(),
        file_size: payload.len() as u64,
        transfer_duration_ms: 42,
        is_success: success,
        error_message: (!success).then(|| "connection reset".to_string()),
        user_name: "transfer-test".into(),
        payload: Some(payload.to_vec()),
        payload_digest: payload_digest(payload),
    }
}

fn operation(run_id: Uuid, operation_type: FtpOperationType, offset_ms: i64) -> FtpOperationLog {
    FtpOperationLog {
        id: Uuid::new_v4(),
        check_run_workflow_id: run_id,
        operation_type,
        file_name: "PSCHECKS_2025_20251215_0.csv".into(),
        destination: "/production/OutBox/VENUS/".into(),
        is_success: true,
        error_message: None,
        duration_ms: 7,
        timestamp: Utc::now() + Duration::milliseconds(offset_ms),
        user_name: "transfer-test".into(),
    }
}

pub async fn test_audits_round_trip<S: TransferAuditStore + ?Sized>(store: &S) {
    let run_id = Uuid::new_v4();
    let failed = audit(run_id, false, b"first", 0);
    let sent = audit(run_id, true, b"second", 10);
    store.append_audit(&failed).await.expect("append should succeed");
    store.append_audit(&sent).await.unwrap();
    store.append_audit(&audit(Uuid::new_v4(), true, b"other", 20)).await.unwrap();

    let audits = store.audits_for(run_id).await.unwrap();
    assert_eq!(audits, vec![failed, sent]);
    assert_eq!(audits[1].payload.as_deref(), Some(&b"second"[..]));
}

pub async fn test_operations_round_trip<S: TransferAuditStore + ?Sized>(store: &S) {
    let run_id = Uuid::new_v4();
    let ops = [
        operation(run_id, FtpOperationType::Connect, 0),
        operation(run_id, FtpOperationType::Upload, 5),
        operation(run_id, FtpOperationType::Verify, 10),
        operation(run_id, FtpOperationType::Disconnect, 15),
    ];
    for op in &ops {
        store.append_operation(op).await.expect("append should succeed");
    }

    let stored = store.operations_for(run_id).await.unwrap();
    assert_eq!(stored, ops.to_vec());
    assert!(store.operations_for(Uuid::new_v4()).await.unwrap().is_empty());
}

pub async fn test_audit_sink_round_trip<S: AuditSink + ?Sized>(sink: &S) {
    let event = |key: &str, changes: &str, offset_ms: i64| AuditEvent {
        id: Uuid::new_v4(),
        table_name: "CHECK_RUN_WORKFLOW".into(),
        operation: AuditOperation::Update,
        primary_key: key.into(),
        user_name: "audit-test".into(),
        changes_json: changes.into(),
        changes_hash: changes_hash(changes),
        created_at: Utc::now() + Duration::milliseconds(offset_ms),
    };
    let first = event("run-a", r#"{"step":2}"#, 0);
    let second = event("run-a", r#"{"step":3}"#, 10);
    sink.append(&first).await.unwrap();
    sink.append(&second).await.unwrap();
    sink.append(&event("run-b", "{}", 20)).await.unwrap();

    let events = sink.events_for("CHECK_RUN_WORKFLOW", "run-a").await.unwrap();
    assert_eq!(events, vec![first, second]);
    assert!(events.iter().all(AuditEvent::verify));
    assert!(sink.events_for("DEMOGRAPHIC", "run-a").await.unwrap().is_empty());
}

/// Run all TransferAuditStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_transfer_audit_tests {
    ($store:expr) => {
        use $crate::storage::transfer_audit_tests::*;

        test_audits_round_trip($store).await;
        println!("  test_audits_round_trip: PASSED");

        test_operations_round_trip($store).await;
        println!("  test_operations_round_trip: PASSED");
    };
}

/// Run all AuditSink interface tests against a sink implementation.
#[macro_export]
macro_rules! run_audit_sink_tests {
    ($sink:expr) => {
        use $crate::storage::transfer_audit_tests::test_audit_sink_round_trip;

        test_audit_sink_round_trip($sink).await;
        println!("  test_audit_sink_round_trip: PASSED");
    };
}
