use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::shared::AppError;

/// Looks up display data for a user id
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn username_of(&self, user_id: i64) -> Result<Option<String>, AppError>;

    async fn avatar_url_of(&self, user_id: i64) -> Result<Option<String>, AppError>;
}

#[derive(Debug, Clone)]
struct UserRecord {
    username: String,
    avatar_url: Option<String>,
}

/// In-memory implementation of IdentityResolver for development and testing
pub struct InMemoryIdentityResolver {
    users: Arc<RwLock<HashMap<i64, UserRecord>>>,
}

impl InMemoryIdentityResolver {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert_user(
        &self,
        user_id: i64,
        username: impl Into<String>,
        avatar_url: Option<String>,
    ) {
        let username = username.into();
        debug!(user_id = user_id, username = %username, "Registering user in memory");
        self.users.write().await.insert(
            user_id,
            UserRecord {
                username,
                avatar_url,
            },
        );
    }
}

impl Default for InMemoryIdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityResolver for InMemoryIdentityResolver {
    async fn username_of(&self, user_id: i64) -> Result<Option<String>, AppError> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).map(|u| u.username.clone()))
    }

    async fn avatar_url_of(&self, user_id: i64) -> Result<Option<String>, AppError> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).and_then(|u| u.avatar_url.clone()))
    }
}

/// PostgreSQL implementation backed by the `users` and `profile_pictures` tables
pub struct PostgresIdentityResolver {
    pool: PgPool,
}

impl PostgresIdentityResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityResolver for PostgresIdentityResolver {
    #[instrument(skip(self))]
    async fn username_of(&self, user_id: i64) -> Result<Option<String>, AppError> {
        sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, user_id = user_id, "Failed to fetch username");
                AppError::DatabaseError(e.to_string())
            })
    }

    #[instrument(skip(self))]
    async fn avatar_url_of(&self, user_id: i64) -> Result<Option<String>, AppError> {
        sqlx::query_scalar::<_, String>(
            "SELECT avatar_url FROM profile_pictures WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, user_id = user_id, "Failed to fetch avatar url");
            AppError::DatabaseError(e.to_string())
        })
    }
}
