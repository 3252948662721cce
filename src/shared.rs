use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::call::{call_command_router, CallContext, CallSignalingEngine, PresenceStore};
use crate::chat::{chat_command_router, ChatContext, ChatRoomEngine, MessageStore};
use crate::command::CommandRouter;
use crate::config::AppConfig;
use crate::identity::{IdentityResolver, TokenVerifier};
use crate::room::RoomRepository;
use crate::websockets::GroupRegistry;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<dyn GroupRegistry>,
    pub room_repository: Arc<dyn RoomRepository>,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub chat_engine: Arc<ChatRoomEngine>,
    pub chat_router: Arc<CommandRouter<ChatContext>>,
    pub call_engine: Arc<CallSignalingEngine>,
    pub call_router: Arc<CommandRouter<CallContext>>,
}

impl AppState {
    /// Wire engines and routers on top of the given collaborators
    pub fn new(
        config: AppConfig,
        registry: Arc<dyn GroupRegistry>,
        room_repository: Arc<dyn RoomRepository>,
        token_verifier: Arc<dyn TokenVerifier>,
        message_store: Arc<dyn MessageStore>,
        identities: Arc<dyn IdentityResolver>,
        presence: Arc<dyn PresenceStore>,
    ) -> Self {
        let chat_engine = Arc::new(ChatRoomEngine::new(
            registry.clone(),
            message_store,
            identities,
        ));
        let call_engine = Arc::new(CallSignalingEngine::new(
            registry.clone(),
            presence,
            config.presence_timeout,
        ));

        Self {
            chat_router: Arc::new(chat_command_router(chat_engine.clone())),
            call_router: Arc::new(call_command_router(call_engine.clone())),
            config: Arc::new(config),
            registry,
            room_repository,
            token_verifier,
            chat_engine,
            call_engine,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Presence error: {0}")]
    PresenceError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::JwtError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::PresenceError(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Presence error: {}", msg),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

/// In-memory wiring for unit and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;
    use crate::call::InMemoryPresenceStore;
    use crate::chat::InMemoryMessageStore;
    use crate::identity::{InMemoryIdentityResolver, JwtTokenVerifier};
    use crate::room::InMemoryRoomRepository;
    use crate::websockets::InMemoryGroupRegistry;

    pub const TEST_SECRET: &str = "test-secret";

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        config: AppConfig,
        registry: Option<Arc<dyn GroupRegistry>>,
        room_repository: Option<Arc<dyn RoomRepository>>,
        token_verifier: Option<Arc<dyn TokenVerifier>>,
        message_store: Option<Arc<dyn MessageStore>>,
        identities: Option<Arc<dyn IdentityResolver>>,
        presence: Option<Arc<dyn PresenceStore>>,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                config: AppConfig {
                    jwt_secret: TEST_SECRET.to_string(),
                    ..AppConfig::default()
                },
                registry: None,
                room_repository: None,
                token_verifier: None,
                message_store: None,
                identities: None,
                presence: None,
            }
        }

        pub fn with_config(mut self, config: AppConfig) -> Self {
            self.config = config;
            self
        }

        pub fn with_registry(mut self, registry: Arc<dyn GroupRegistry>) -> Self {
            self.registry = Some(registry);
            self
        }

        pub fn with_room_repository(mut self, repo: Arc<dyn RoomRepository>) -> Self {
            self.room_repository = Some(repo);
            self
        }

        pub fn with_token_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
            self.token_verifier = Some(verifier);
            self
        }

        pub fn with_message_store(mut self, store: Arc<dyn MessageStore>) -> Self {
            self.message_store = Some(store);
            self
        }

        pub fn with_identities(mut self, identities: Arc<dyn IdentityResolver>) -> Self {
            self.identities = Some(identities);
            self
        }

        pub fn with_presence(mut self, presence: Arc<dyn PresenceStore>) -> Self {
            self.presence = Some(presence);
            self
        }

        pub fn build(self) -> AppState {
            let room_repository = self.room_repository.unwrap_or_else(|| {
                Arc::new(InMemoryRoomRepository::with_rooms(
                    self.config.seed_rooms.clone(),
                ))
            });
            let secret = self.config.jwt_secret.clone();
            let token_verifier = self
                .token_verifier
                .unwrap_or_else(|| Arc::new(JwtTokenVerifier::new(secret, 1)));

            AppState::new(
                self.config,
                self.registry
                    .unwrap_or_else(|| Arc::new(InMemoryGroupRegistry::new())),
                room_repository,
                token_verifier,
                self.message_store
                    .unwrap_or_else(|| Arc::new(InMemoryMessageStore::new())),
                self.identities
                    .unwrap_or_else(|| Arc::new(InMemoryIdentityResolver::new())),
                self.presence
                    .unwrap_or_else(|| Arc::new(InMemoryPresenceStore::new())),
            )
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
