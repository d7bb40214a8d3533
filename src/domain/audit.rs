use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Insert,
    Update,
    Delete,
}

impl AuditOperation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One change-log row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub table_name: String,
    pub operation: AuditOperation,
    pub primary_key: String,
    pub user_name: String,
    pub changes_json: String,
    pub changes_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Hex SHA-256 of the serialized change payload.
pub fn changes_hash(changes_json: &str) -> String {
    hex::encode(Sha256::digest(changes_json.as_bytes()))
}

impl AuditEvent {
    /// True when `changes_hash` still matches the payload.
    pub fn verify(&self) -> bool {
        changes_hash(&self.changes_json) == self.changes_hash
    }
}
