//! File-transfer audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// SHA-256 of `payload`, hex encoded.
pub fn payload_digest(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// One transmission outcome. Append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTransferAudit {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub check_run_workflow_id: Option<Uuid>,
    pub file_name: String,
    pub destination: String,
    pub file_size: u64,
    pub transfer_duration_ms: u64,
    pub is_success: bool,
    pub error_message: Option<String>,
    pub user_name: String,
    pub payload: Option<Vec<u8>>,
    pub payload_digest: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FtpOperationType {
    Connect,
    Upload,
    Verify,
    Disconnect,
}

impl FtpOperationType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Upload => "upload",
            Self::Verify => "verify",
            Self::Disconnect => "disconnect",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "connect" => Some(Self::Connect),
            "upload" => Some(Self::Upload),
            "verify" => Some(Self::Verify),
            "disconnect" => Some(Self::Disconnect),
            _ => None,
        }
    }
}

impl std::fmt::Display for FtpOperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One transport operation. Append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtpOperationLog {
    pub id: Uuid,
    pub check_run_workflow_id: Uuid,
    pub operation_type: FtpOperationType,
    pub file_name: String,
    pub destination: String,
    pub is_success: bool,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub user_name: String,
}
