use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use super::{ConversationStore, Message, Role, Session, StoreError};

#[derive(Clone)]
pub struct SqliteConversationStore {
    pool: SqlitePool,
}

impl SqliteConversationStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid database url: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::Unavailable(format!("failed to connect to conversation db: {}", e))
            })?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn with_path(db_path: &Path) -> Result<Self, StoreError> {
        let url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        Self::connect(&url, 5).await
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_activity TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id TEXT NOT NULL UNIQUE,
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session_seq ON messages(session_id, seq)",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_user_activity ON sessions(user_id, last_activity)",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }
}

/// Single-statement upsert; the message count is recomputed so a retry
/// cannot inflate it.
async fn record_activity<'e, E>(
    executor: E,
    session_id: &str,
    user_id: &str,
    now: &str,
) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO sessions (session_id, user_id, created_at, last_activity, message_count) \
         VALUES (?, ?, ?, ?, (SELECT COUNT(*) FROM messages WHERE session_id = ?)) \
         ON CONFLICT(session_id) DO UPDATE SET \
             user_id = excluded.user_id, \
             last_activity = excluded.last_activity, \
             message_count = excluded.message_count",
    )
    .bind(session_id)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .bind(session_id)
    .execute(executor)
    .await
    .map_err(map_sqlx)?;
    Ok(())
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn save_message(
        &self,
        session_id: &str,
        user_id: &str,
        role: Role,
        content: &str,
        metadata: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let message_id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        let metadata = serde_json::to_string(&Value::Object(metadata))
            .map_err(|e| StoreError::Query(format!("unserializable metadata: {}", e)))?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            "INSERT INTO messages (message_id, session_id, user_id, role, content, timestamp, metadata) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message_id)
        .bind(session_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(content)
        .bind(&now)
        .bind(&metadata)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        record_activity(&mut *tx, session_id, user_id, &now).await?;

        tx.commit().await.map_err(map_sqlx)?;

        Ok(message_id)
    }

    async fn get_history(&self, session_id: &str, limit: i64) -> Result<Vec<Message>, StoreError> {
        // Insertion order (`seq`) is canonical; wall-clock timestamps may step back.
        // SQLite treats a negative LIMIT as unbounded.
        let limit = if limit > 0 { limit } else { -1 };
        let rows = sqlx::query(
            "SELECT * FROM ( \
                 SELECT seq, message_id, session_id, user_id, role, content, timestamp, metadata \
                 FROM messages WHERE session_id = ? \
                 ORDER BY seq DESC LIMIT ? \
             ) ORDER BY seq ASC",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(message_from_row).collect()
    }

    async fn upsert_session_activity(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<(), StoreError> {
        let now = format_timestamp(Utc::now());
        record_activity(&self.pool, session_id, user_id, &now).await
    }

    async fn list_sessions(&self, user_id: &str, limit: i64) -> Result<Vec<Session>, StoreError> {
        let limit = if limit > 0 { limit } else { -1 };
        let rows = sqlx::query(
            "SELECT session_id, user_id, created_at, last_activity, message_count \
             FROM sessions WHERE user_id = ? \
             ORDER BY last_activity DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(session_from_row).collect()
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let deleted = sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;

        tracing::debug!(
            session_id,
            messages = deleted.rows_affected(),
            "Deleted session"
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

fn message_from_row(row: &SqliteRow) -> Result<Message, StoreError> {
    let raw_metadata: String = row.try_get("metadata").map_err(corrupt)?;
    let metadata = match serde_json::from_str::<Value>(&raw_metadata) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => return Err(StoreError::Corrupt(format!("bad metadata: {}", e))),
    };
    let role: String = row.try_get("role").map_err(corrupt)?;
    let timestamp: String = row.try_get("timestamp").map_err(corrupt)?;

    Ok(Message {
        message_id: row.try_get("message_id").map_err(corrupt)?,
        session_id: row.try_get("session_id").map_err(corrupt)?,
        user_id: row.try_get("user_id").map_err(corrupt)?,
        role: role.parse()?,
        content: row.try_get("content").map_err(corrupt)?,
        timestamp: parse_timestamp(&timestamp)?,
        metadata,
    })
}

fn session_from_row(row: &SqliteRow) -> Result<Session, StoreError> {
    let created_at: String = row.try_get("created_at").map_err(corrupt)?;
    let last_activity: String = row.try_get("last_activity").map_err(corrupt)?;

    Ok(Session {
        session_id: row.try_get("session_id").map_err(corrupt)?,
        user_id: row.try_get("user_id").map_err(corrupt)?,
        created_at: parse_timestamp(&created_at)?,
        last_activity: parse_timestamp(&last_activity)?,
        message_count: row.try_get("message_count").map_err(corrupt)?,
    })
}

fn corrupt(err: sqlx::Error) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}
