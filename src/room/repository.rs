use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::RoomModel;
use crate::shared::AppError;

/// Read access to the chat rooms that connections may join
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError>;

    async fn room_exists(&self, room_id: &str) -> Result<bool, AppError> {
        Ok(self.get_room(room_id).await?.is_some())
    }
}

/// In-memory implementation of RoomRepository for development and testing
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<String, RoomModel>>,
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an in-memory repository with the given room ids, named after themselves
    pub fn with_rooms<I, S>(room_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rooms = room_ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                (id.clone(), RoomModel::new(id.clone(), id))
            })
            .collect();

        Self {
            rooms: Mutex::new(rooms),
        }
    }

    pub fn insert_room(&self, room: RoomModel) {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms.insert(room.id.clone(), room);
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self))]
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        let rooms = self
            .rooms
            .lock()
            .map_err(|_| AppError::DatabaseError("room map poisoned".to_string()))?;
        let room = rooms.get(room_id).cloned();

        match &room {
            Some(r) => debug!(room_id = %room_id, name = %r.name, "Room found in memory"),
            None => debug!(room_id = %room_id, "Room not found in memory"),
        }

        Ok(room)
    }
}

/// PostgreSQL implementation of room repository
pub struct PostgresRoomRepository {
    pool: PgPool,
}

impl PostgresRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PostgresRoomRepository {
    #[instrument(skip(self))]
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        debug!(room_id = %room_id, "Fetching room from database");

        sqlx::query_as::<_, RoomModel>("SELECT id, name FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, room_id = %room_id, "Failed to fetch room from database");
                AppError::DatabaseError(e.to_string())
            })
    }

    #[instrument(skip(self))]
    async fn room_exists(&self, room_id: &str) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM rooms WHERE id = $1)")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, room_id = %room_id, "Failed to check room existence");
                AppError::DatabaseError(e.to_string())
            })
    }
}
