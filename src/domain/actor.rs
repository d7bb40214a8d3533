use serde::{Deserialize, Serialize};

/// Caller identity stamped on every write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    user_name: String,
}

impl Actor {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
        }
    }

    /// Identity used by batch jobs with no interactive user.
    pub fn system() -> Self {
        Self::new("SYSTEM")
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }
}
