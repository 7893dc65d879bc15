//! Conversation persistence.
//!
//! `ConversationStore` is the seam the orchestrator and the HTTP handlers
//! talk to; `SqliteConversationStore` is the production backend.

mod sqlite;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use sqlite::SqliteConversationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(StoreError::Corrupt(format!("unknown role '{}'", other))),
        }
    }
}

/// A stored conversation turn. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub session_id: String,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: i64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation store unavailable: {0}")]
    Unavailable(String),
    #[error("conversation store query failed: {0}")]
    Query(String),
    #[error("conversation store returned corrupt data: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends a message and records session activity. Retrying after a
    /// failure may store the message twice.
    async fn save_message(
        &self,
        session_id: &str,
        user_id: &str,
        role: Role,
        content: &str,
        metadata: Map<String, Value>,
    ) -> Result<String, StoreError>;

    /// The most recent `limit` messages, oldest first. `limit <= 0` returns all.
    async fn get_history(&self, session_id: &str, limit: i64) -> Result<Vec<Message>, StoreError>;

    /// Creates the session on first sight, otherwise refreshes its activity.
    async fn upsert_session_activity(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<(), StoreError>;

    /// Sessions of `user_id`, most recently active first.
    async fn list_sessions(&self, user_id: &str, limit: i64) -> Result<Vec<Session>, StoreError>;

    /// Removes the session record and all of its messages.
    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert!(matches!(
            "system".parse::<Role>(),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Role::Assistant).unwrap(), "assistant");
    }
}
