use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::ChatMessage;
use crate::shared::AppError;

/// Persistence for chat messages.
///
/// Edits and deletes are scoped to a room so a connection can only touch messages of the
/// room it joined; `false` means no such message in that room.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(
        &self,
        content: &str,
        timestamp: DateTime<Utc>,
        user_id: Option<i64>,
        room_id: &str,
    ) -> Result<i64, AppError>;

    async fn update_message(
        &self,
        message_id: i64,
        room_id: &str,
        content: &str,
    ) -> Result<bool, AppError>;

    async fn delete_message(&self, message_id: i64, room_id: &str) -> Result<bool, AppError>;

    /// All messages of a room, ascending by id
    async fn list_by_room(&self, room_id: &str) -> Result<Vec<ChatMessage>, AppError>;
}

struct MessageTable {
    next_id: i64,
    rows: BTreeMap<i64, ChatMessage>,
}

/// In-memory implementation of MessageStore for development and testing
pub struct InMemoryMessageStore {
    table: Mutex<MessageTable>,
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(MessageTable {
                next_id: 1,
                rows: BTreeMap::new(),
            }),
        }
    }

    pub fn message_count(&self) -> usize {
        self.table.lock().map(|t| t.rows.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MessageTable>, AppError> {
        self.table
            .lock()
            .map_err(|_| AppError::DatabaseError("message table poisoned".to_string()))
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    #[instrument(skip(self, content))]
    async fn insert_message(
        &self,
        content: &str,
        timestamp: DateTime<Utc>,
        user_id: Option<i64>,
        room_id: &str,
    ) -> Result<i64, AppError> {
        let mut table = self.lock()?;
        let id = table.next_id;
        table.next_id += 1;
        table.rows.insert(
            id,
            ChatMessage {
                id,
                content: content.to_string(),
                user_id,
                room_id: room_id.to_string(),
                created_at: timestamp,
                edited: false,
            },
        );

        debug!(message_id = id, room_id = %room_id, "Message stored in memory");
        Ok(id)
    }

    #[instrument(skip(self, content))]
    async fn update_message(
        &self,
        message_id: i64,
        room_id: &str,
        content: &str,
    ) -> Result<bool, AppError> {
        let mut table = self.lock()?;
        match table.rows.get_mut(&message_id) {
            Some(row) if row.room_id == room_id => {
                row.content = content.to_string();
                row.edited = true;
                Ok(true)
            }
            _ => {
                debug!(message_id = message_id, room_id = %room_id, "No message to update");
                Ok(false)
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete_message(&self, message_id: i64, room_id: &str) -> Result<bool, AppError> {
        let mut table = self.lock()?;
        let in_room = table
            .rows
            .get(&message_id)
            .is_some_and(|row| row.room_id == room_id);
        if in_room {
            table.rows.remove(&message_id);
        }
        Ok(in_room)
    }

    #[instrument(skip(self))]
    async fn list_by_room(&self, room_id: &str) -> Result<Vec<ChatMessage>, AppError> {
        let table = self.lock()?;
        Ok(table
            .rows
            .values()
            .filter(|row| row.room_id == room_id)
            .cloned()
            .collect())
    }
}

/// PostgreSQL implementation of message store
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    #[instrument(skip(self, content))]
    async fn insert_message(
        &self,
        content: &str,
        timestamp: DateTime<Utc>,
        user_id: Option<i64>,
        room_id: &str,
    ) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO chat_messages (content, created_at, user_id, room_id, edited) \
             VALUES ($1, $2, $3, $4, FALSE) RETURNING id",
        )
        .bind(content)
        .bind(timestamp)
        .bind(user_id)
        .bind(room_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, room_id = %room_id, "Failed to insert message");
            AppError::DatabaseError(e.to_string())
        })
    }

    #[instrument(skip(self, content))]
    async fn update_message(
        &self,
        message_id: i64,
        room_id: &str,
        content: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE chat_messages SET content = $1, edited = TRUE WHERE id = $2 AND room_id = $3",
        )
        .bind(content)
        .bind(message_id)
        .bind(room_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, message_id = message_id, "Failed to update message");
            AppError::DatabaseError(e.to_string())
        })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_message(&self, message_id: i64, room_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE id = $1 AND room_id = $2")
            .bind(message_id)
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, message_id = message_id, "Failed to delete message");
                AppError::DatabaseError(e.to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_by_room(&self, room_id: &str) -> Result<Vec<ChatMessage>, AppError> {
        sqlx::query_as::<_, ChatMessage>(
            "SELECT id, content, user_id, room_id, created_at, edited \
             FROM chat_messages WHERE room_id = $1 ORDER BY id ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, room_id = %room_id, "Failed to list room messages");
            AppError::DatabaseError(e.to_string())
        })
    }
}
