use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::shared::AppError;

/// Room → set of usernames currently in a call.
///
/// Eventually consistent and never consulted for message delivery.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn add_member(&self, room_id: &str, username: &str) -> Result<(), AppError>;

    async fn remove_member(&self, room_id: &str, username: &str) -> Result<(), AppError>;

    async fn members_of(&self, room_id: &str) -> Result<BTreeSet<String>, AppError>;
}

/// In-memory implementation of PresenceStore for development and testing
#[derive(Default)]
pub struct InMemoryPresenceStore {
    rooms: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl InMemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn add_member(&self, room_id: &str, username: &str) -> Result<(), AppError> {
        self.rooms
            .write()
            .await
            .entry(room_id.to_string())
            .or_default()
            .insert(username.to_string());
        Ok(())
    }

    async fn remove_member(&self, room_id: &str, username: &str) -> Result<(), AppError> {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room_id) {
            members.remove(username);
            if members.is_empty() {
                rooms.remove(room_id);
            }
        }
        Ok(())
    }

    async fn members_of(&self, room_id: &str) -> Result<BTreeSet<String>, AppError> {
        Ok(self
            .rooms
            .read()
            .await
            .get(room_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Redis-backed presence: one set per room under `call_users:{room_id}`
#[derive(Clone)]
pub struct RedisPresenceStore {
    connection: ConnectionManager,
}

impl RedisPresenceStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Open a managed connection to `redis_url`
    pub async fn connect(redis_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url).map_err(presence_error)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(presence_error)?;
        Ok(Self::new(connection))
    }

    fn key(room_id: &str) -> String {
        format!("call_users:{}", room_id)
    }
}

fn presence_error(e: redis::RedisError) -> AppError {
    AppError::PresenceError(e.to_string())
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    #[instrument(skip(self))]
    async fn add_member(&self, room_id: &str, username: &str) -> Result<(), AppError> {
        let mut connection = self.connection.clone();
        let added: i64 = connection
            .sadd(Self::key(room_id), username)
            .await
            .map_err(presence_error)?;
        debug!(added = added, "Presence member added");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_member(&self, room_id: &str, username: &str) -> Result<(), AppError> {
        let mut connection = self.connection.clone();
        let removed: i64 = connection
            .srem(Self::key(room_id), username)
            .await
            .map_err(presence_error)?;
        debug!(removed = removed, "Presence member removed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn members_of(&self, room_id: &str) -> Result<BTreeSet<String>, AppError> {
        let mut connection = self.connection.clone();
        let raw: Vec<Vec<u8>> = connection
            .smembers(Self::key(room_id))
            .await
            .map_err(presence_error)?;

        Ok(raw
            .into_iter()
            .filter_map(|bytes| match String::from_utf8(bytes) {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!(room_id = %room_id, error = %e, "Skipping non UTF-8 presence entry");
                    None
                }
            })
            .collect())
    }
}
