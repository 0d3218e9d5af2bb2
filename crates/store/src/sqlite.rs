//! SQLite store — durable append-only turn logs.
//!
//! One `turns` table keyed by `(conversation_id, seq)`. The sequence key is
//! assigned inside the append transaction (`MAX(seq)+1`), so appends are
//! atomic and keys are strictly increasing per conversation regardless of
//! wall-clock resolution or concurrent writers.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use palaver_core::error::StoreError;
use palaver_core::message::Role;
use palaver_core::store::{ConversationMetadata, ConversationStore};
use palaver_core::turn::{ConversationId, Turn};

/// A durable SQLite-backed conversation store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite conversation store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                conversation_id TEXT NOT NULL,
                seq             INTEGER NOT NULL,
                role            TEXT NOT NULL,
                content         TEXT NOT NULL,
                user_id         TEXT,
                created_at      TEXT NOT NULL,
                PRIMARY KEY (conversation_id, seq)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("turns table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_turns_created_at ON turns(conversation_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("created_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn map_err(e: sqlx::Error) -> StoreError {
        match &e {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(e.to_string())
            }
            sqlx::Error::Database(db)
                if db.message().contains("locked")
                    // Two writers raced MAX(seq)+1; the loser retries.
                    || db.message().contains("UNIQUE constraint failed: turns") =>
            {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::QueryFailed(e.to_string()),
        }
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, StoreError> {
        let conversation_id: String = row
            .try_get("conversation_id")
            .map_err(|e| StoreError::QueryFailed(format!("conversation_id column: {e}")))?;
        let sequence_key: i64 = row
            .try_get("seq")
            .map_err(|e| StoreError::QueryFailed(format!("seq column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let user_id: Option<String> = row
            .try_get("user_id")
            .map_err(|e| StoreError::QueryFailed(format!("user_id column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let role = match role_str.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            other => return Err(StoreError::Corrupt(format!("unknown role '{other}'"))),
        };

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt(format!("created_at '{created_at_str}': {e}")))?;

        Ok(Turn {
            conversation_id: ConversationId(conversation_id),
            sequence_key,
            role,
            content,
            user_id,
            created_at,
        })
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(
        &self,
        conversation_id: &ConversationId,
        role: Role,
        content: &str,
        user_id: Option<&str>,
    ) -> Result<Turn, StoreError> {
        let created_at = Utc::now();

        // Assign the sequence key inside the transaction so concurrent
        // appends to the same conversation serialize on the insert.
        let mut tx = self.pool.begin().await.map_err(Self::map_err)?;

        let row = sqlx::query(
            "SELECT COALESCE(MAX(seq) + 1, 0) AS next_seq FROM turns WHERE conversation_id = ?",
        )
        .bind(conversation_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(Self::map_err)?;
        let sequence_key: i64 = row
            .try_get("next_seq")
            .map_err(|e| StoreError::QueryFailed(format!("next_seq: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO turns (conversation_id, seq, role, content, user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(conversation_id.as_str())
        .bind(sequence_key)
        .bind(role.to_string())
        .bind(content)
        .bind(user_id)
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(Self::map_err)?;

        tx.commit().await.map_err(Self::map_err)?;

        debug!(
            conversation_id = %conversation_id,
            sequence_key,
            role = %role,
            "Turn appended"
        );

        Ok(Turn {
            conversation_id: conversation_id.clone(),
            sequence_key,
            role,
            content: content.to_string(),
            user_id: user_id.map(str::to_string),
            created_at,
        })
    }

    async fn read(&self, conversation_id: &ConversationId) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query(
            "SELECT conversation_id, seq, role, content, user_id, created_at
             FROM turns WHERE conversation_id = ? ORDER BY seq ASC",
        )
        .bind(conversation_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_err)?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationId>, StoreError> {
        let rows = sqlx::query(
            "SELECT DISTINCT conversation_id FROM turns ORDER BY conversation_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_err)?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("conversation_id")
                    .map(ConversationId)
                    .map_err(|e| StoreError::QueryFailed(format!("conversation_id: {e}")))
            })
            .collect()
    }

    async fn metadata(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ConversationMetadata>, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS turn_count, MIN(created_at) AS first_at, MAX(created_at) AS last_at
             FROM turns WHERE conversation_id = ?",
        )
        .bind(conversation_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_err)?;

        let turn_count: i64 = row
            .try_get("turn_count")
            .map_err(|e| StoreError::QueryFailed(format!("turn_count: {e}")))?;
        if turn_count == 0 {
            return Ok(None);
        }

        let parse = |col: &str| -> Result<DateTime<Utc>, StoreError> {
            let s: String = row
                .try_get(col)
                .map_err(|e| StoreError::QueryFailed(format!("{col}: {e}")))?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoreError::Corrupt(format!("{col} '{s}': {e}")))
        };

        Ok(Some(ConversationMetadata {
            conversation_id: conversation_id.clone(),
            turn_count: turn_count as usize,
            created_at: parse("first_at")?,
            updated_at: parse("last_at")?,
        }))
    }
}
