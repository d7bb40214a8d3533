//! Banking partner transports.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::payload_digest;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Destination unavailable: {0}")]
    Unavailable(String),

    #[error("Verification failed for {file_name}: {reason}")]
    Verification { file_name: String, reason: String },
}

/// Moves a payment file to the banking partner.
///
/// Only `upload` is required; the other phases default to no-ops for
/// transports that have no session.
#[async_trait]
pub trait PaymentFileTransport: Send + Sync {
    async fn connect(&self, _destination: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn upload(&self, file_name: &str, destination: &str, payload: &[u8]) -> Result<(), TransportError>;

    async fn verify(&self, _file_name: &str, _destination: &str, _payload: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Writes payment files into a local outbox directory.
///
/// Files land under a temporary name and are renamed into place, so a
/// reader of the outbox never sees a partial file.
#[derive(Debug, Clone)]
pub struct FilesystemTransport {
    outbox: PathBuf,
}

impl FilesystemTransport {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self { outbox: outbox.into() }
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.outbox.join(file_name)
    }
}

#[async_trait]
impl PaymentFileTransport for FilesystemTransport {
    async fn connect(&self, _destination: &str) -> Result<(), TransportError> {
        tokio::fs::create_dir_all(&self.outbox).await?;
        Ok(())
    }

    async fn upload(&self, file_name: &str, destination: &str, payload: &[u8]) -> Result<(), TransportError> {
        let target = self.path_for(file_name);
        let staging = self.outbox.join(format!(".{file_name}.part"));
        tokio::fs::write(&staging, payload).await?;
        tokio::fs::rename(&staging, &target).await?;
        debug!(path = %target.display(), destination, bytes = payload.len(), "Wrote payment file");
        Ok(())
    }

    async fn verify(&self, file_name: &str, _destination: &str, payload: &[u8]) -> Result<(), TransportError> {
        let written = tokio::fs::read(self.path_for(file_name)).await?;
        if payload_digest(&written) != payload_digest(payload) {
            return Err(TransportError::Verification {
                file_name: file_name.to_string(),
                reason: "digest mismatch".to_string(),
            });
        }
        Ok(())
    }
}
