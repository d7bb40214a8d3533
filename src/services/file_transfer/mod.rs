//! Payment file transmission and its audit records.
//!
//! [`FileTransferAuditor`] only records outcomes. [`FileTransferService`]
//! owns the retry policy: every transport phase of every attempt becomes
//! an `FtpOperationLog` row and the final outcome one `FileTransferAudit`.

mod payment_file;
mod transport;

pub use payment_file::{file_name, PaymentFile, PAYMENT_FILE_HEADER};
pub use transport::{FilesystemTransport, PaymentFileTransport, TransportError};

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use backon::Retryable;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::TransferRetryConfig;
use crate::domain::{Actor, FileTransferAudit, FtpOperationLog, FtpOperationType};
use crate::interfaces::{StorageError, TransferAuditStore};
use crate::utils::retry::transfer_backoff;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Transfer of {file_name} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        file_name: String,
        attempts: usize,
        last_error: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Append-only writer and reader of transmission records.
#[derive(Clone)]
pub struct FileTransferAuditor {
    store: Arc<dyn TransferAuditStore>,
}

impl FileTransferAuditor {
    pub fn new(store: Arc<dyn TransferAuditStore>) -> Self {
        Self { store }
    }

    /// Record the outcome of sending `file`. The digest is taken from its
    /// contents.
    pub async fn record_attempt(
        &self,
        run_id: Option<Uuid>,
        file: &PaymentFile,
        destination: &str,
        duration: Duration,
        outcome: Result<(), &str>,
        actor: &Actor,
    ) -> Result<FileTransferAudit, StorageError> {
        let audit = FileTransferAudit {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            check_run_workflow_id: run_id,
            file_name: file.file_name.clone(),
            destination: destination.to_string(),
            file_size: file.size(),
            transfer_duration_ms: millis(duration),
            is_success: outcome.is_ok(),
            error_message: outcome.err().map(str::to_string),
            user_name: actor.user_name().to_string(),
            payload: Some(file.contents.clone()),
            payload_digest: file.digest.clone(),
        };
        self.store.append_audit(&audit).await?;
        Ok(audit)
    }

    pub async fn record_operation(
        &self,
        run_id: Uuid,
        operation_type: FtpOperationType,
        file_name: &str,
        destination: &str,
        duration: Duration,
        outcome: Result<(), &str>,
        actor: &Actor,
    ) -> Result<FtpOperationLog, StorageError> {
        let operation = FtpOperationLog {
            id: Uuid::new_v4(),
            check_run_workflow_id: run_id,
            operation_type,
            file_name: file_name.to_string(),
            destination: destination.to_string(),
            is_success: outcome.is_ok(),
            error_message: outcome.err().map(str::to_string),
            duration_ms: millis(duration),
            timestamp: Utc::now(),
            user_name: actor.user_name().to_string(),
        };
        self.store.append_operation(&operation).await?;
        Ok(operation)
    }

    /// True when a successful audit row for `run_id` carries `digest`.
    pub async fn has_successful_transfer(&self, run_id: Uuid, digest: &str) -> Result<bool, StorageError> {
        Ok(self
            .store
            .audits_for(run_id)
            .await?
            .iter()
            .any(|a| a.is_success && a.payload_digest == digest))
    }

    pub async fn attempts(&self, run_id: Uuid) -> Result<Vec<FileTransferAudit>, StorageError> {
        self.store.audits_for(run_id).await
    }

    pub async fn operations(&self, run_id: Uuid) -> Result<Vec<FtpOperationLog>, StorageError> {
        self.store.operations_for(run_id).await
    }
}

/// Result of a successful send.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub file_name: String,
    pub digest: String,
    pub attempts: usize,
    /// `None` when the audit row could not be written after the file went out.
    pub audit: Option<FileTransferAudit>,
}

#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Log(#[from] StorageError),
}

#[derive(Clone)]
pub struct FileTransferService {
    auditor: FileTransferAuditor,
    retry: TransferRetryConfig,
    destination: String,
}

impl FileTransferService {
    pub fn new(auditor: FileTransferAuditor, retry: TransferRetryConfig, destination: impl Into<String>) -> Self {
        Self {
            auditor,
            retry,
            destination: destination.into(),
        }
    }

    pub fn auditor(&self) -> &FileTransferAuditor {
        &self.auditor
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Send `file` for run `run_id`, retrying transport failures with back-off.
    pub async fn send(
        &self,
        run_id: Uuid,
        file: &PaymentFile,
        transport: &dyn PaymentFileTransport,
        actor: &Actor,
    ) -> Result<TransferOutcome, TransferError> {
        let started = Instant::now();
        let attempts = AtomicUsize::new(0);

        let result = (|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            self.attempt(run_id, file, transport, actor).await
        })
        .retry(transfer_backoff(&self.retry))
        .when(|e| matches!(e, AttemptError::Transport(_)))
        .notify(|err: &AttemptError, dur: Duration| {
            warn!(
                run_id = %run_id,
                file = %file.file_name,
                error = %err,
                delay = ?dur,
                "Payment file transfer failed, retrying"
            );
        })
        .await;

        let elapsed = started.elapsed();
        let attempts = attempts.load(Ordering::SeqCst);

        match result {
            Ok(()) => {
                let audit = match self
                    .auditor
                    .record_attempt(Some(run_id), file, &self.destination, elapsed, Ok(()), actor)
                    .await
                {
                    Ok(audit) => Some(audit),
                    Err(e) => {
                        error!(
                            run_id = %run_id,
                            file = %file.file_name,
                            error = %e,
                            "Payment file sent but transfer audit could not be written"
                        );
                        None
                    }
                };
                info!(
                    run_id = %run_id,
                    file = %file.file_name,
                    digest = %file.digest,
                    attempts,
                    "Payment file transferred"
                );
                Ok(TransferOutcome {
                    file_name: file.file_name.clone(),
                    digest: file.digest.clone(),
                    attempts,
                    audit,
                })
            }
            Err(AttemptError::Transport(e)) => {
                let last_error = e.to_string();
                self.auditor
                    .record_attempt(
                        Some(run_id),
                        file,
                        &self.destination,
                        elapsed,
                        Err(&last_error),
                        actor,
                    )
                    .await?;
                warn!(
                    run_id = %run_id,
                    file = %file.file_name,
                    attempts,
                    error = %last_error,
                    "Payment file transfer exhausted retries"
                );
                Err(TransferError::Exhausted {
                    file_name: file.file_name.clone(),
                    attempts,
                    last_error,
                })
            }
            Err(AttemptError::Log(e)) => Err(e.into()),
        }
    }

    async fn attempt(
        &self,
        run_id: Uuid,
        file: &PaymentFile,
        transport: &dyn PaymentFileTransport,
        actor: &Actor,
    ) -> Result<(), AttemptError> {
        let dest = self.destination.as_str();
        self.phase(run_id, FtpOperationType::Connect, file, actor, transport.connect(dest))
            .await?;

        let sent = match self
            .phase(
                run_id,
                FtpOperationType::Upload,
                file,
                actor,
                transport.upload(&file.file_name, dest, &file.contents),
            )
            .await
        {
            Ok(()) => {
                self.phase(
                    run_id,
                    FtpOperationType::Verify,
                    file,
                    actor,
                    transport.verify(&file.file_name, dest, &file.contents),
                )
                .await
            }
            Err(e) => Err(e),
        };

        let closed = self
            .phase(run_id, FtpOperationType::Disconnect, file, actor, transport.disconnect())
            .await;
        sent?;
        match closed {
            Err(AttemptError::Log(e)) => Err(e.into()),
            // A failed disconnect after a verified upload does not undo the send.
            _ => Ok(()),
        }
    }

    async fn phase(
        &self,
        run_id: Uuid,
        operation_type: FtpOperationType,
        file: &PaymentFile,
        actor: &Actor,
        op: impl Future<Output = Result<(), TransportError>>,
    ) -> Result<(), AttemptError> {
        let started = Instant::now();
        let result = op.await;
        let message = result.as_ref().err().map(|e| e.to_string());
        self.auditor
            .record_operation(
                run_id,
                operation_type,
                &file.file_name,
                &self.destination,
                started.elapsed(),
                message.as_deref().map_or(Ok(()), Err),
                actor,
            )
            .await?;
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CheckRunWorkflow;
    use crate::storage::MemoryTransferAuditStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    /// Fails the first `failures` uploads.
    struct FlakyTransport {
        failures: usize,
        uploads: AtomicUsize,
    }

    #[async_trait]
    impl PaymentFileTransport for FlakyTransport {
        async fn upload(&self, _file_name: &str, _destination: &str, _payload: &[u8]) -> Result<(), TransportError> {
            let n = self.uploads.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(TransportError::Unavailable("connection reset".into()));
            }
            Ok(())
        }
    }

    fn service() -> FileTransferService {
        FileTransferService::new(
            FileTransferAuditor::new(Arc::new(MemoryTransferAuditStore::new())),
            TransferRetryConfig::immediate(3),
            "/production/OutBox/VENUS/",
        )
    }

    fn file() -> (Uuid, PaymentFile) {
        let run = CheckRunWorkflow::new(2025, NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(), 2, &Actor::system());
        (run.id, PaymentFile::build(&run, &[]))
    }

    #[tokio::test]
    async fn test_send_retries_then_succeeds() {
        let svc = service();
        let (run_id, file) = file();
        let transport = FlakyTransport {
            failures: 2,
            uploads: AtomicUsize::new(0),
        };

        let outcome = svc.send(run_id, &file, &transport, &Actor::system()).await.unwrap();
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.audit.is_some());

        let ops = svc.auditor().operations(run_id).await.unwrap();
        // connect, upload, disconnect for two failures; connect, upload, verify, disconnect for the success
        assert_eq!(ops.len(), 10);
        assert_eq!(ops.iter().filter(|o| !o.is_success).count(), 2);

        let audits = svc.auditor().attempts(run_id).await.unwrap();
        assert_eq!(audits.len(), 1);
        assert!(svc.auditor().has_successful_transfer(run_id, &file.digest).await.unwrap());
        assert!(!svc.auditor().has_successful_transfer(run_id, "stale").await.unwrap());
    }

    #[tokio::test]
    async fn test_send_exhausts_retries() {
        let svc = service();
        let (run_id, file) = file();
        let transport = FlakyTransport {
            failures: usize::MAX,
            uploads: AtomicUsize::new(0),
        };

        let err = svc.send(run_id, &file, &transport, &Actor::system()).await.unwrap_err();
        assert!(matches!(err, TransferError::Exhausted { attempts: 3, .. }));

        let audits = svc.auditor().attempts(run_id).await.unwrap();
        assert_eq!(audits.len(), 1);
        assert!(!audits[0].is_success);
        assert_eq!(audits[0].error_message.as_deref(), Some("Destination unavailable: connection reset"));
        assert!(!svc.auditor().has_successful_transfer(run_id, &file.digest).await.unwrap());
    }
}
