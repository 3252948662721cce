use chatrelay::app::{router, shutdown_signal};
use chatrelay::call::{InMemoryPresenceStore, PresenceStore, RedisPresenceStore};
use chatrelay::chat::{InMemoryMessageStore, MessageStore, PostgresMessageStore};
use chatrelay::config::AppConfig;
use chatrelay::identity::{
    IdentityResolver, InMemoryIdentityResolver, JwtTokenVerifier, PostgresIdentityResolver,
};
use chatrelay::room::{InMemoryRoomRepository, PostgresRoomRepository, RoomRepository};
use chatrelay::shared::AppState;
use chatrelay::websockets::InMemoryGroupRegistry;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatrelay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting chat relay");

    let config = AppConfig::from_env()?;

    // Postgres when configured, in-memory stores otherwise
    let (room_repository, message_store, identities): (
        Arc<dyn RoomRepository>,
        Arc<dyn MessageStore>,
        Arc<dyn IdentityResolver>,
    ) = match &config.database_url {
        Some(database_url) => {
            let pool = sqlx::PgPool::connect(database_url).await?;
            info!("Connected to PostgreSQL");
            (
                Arc::new(PostgresRoomRepository::new(pool.clone())),
                Arc::new(PostgresMessageStore::new(pool.clone())),
                Arc::new(PostgresIdentityResolver::new(pool)),
            )
        }
        None => {
            warn!(
                seed_rooms = ?config.seed_rooms,
                "DATABASE_URL not set, using in-memory stores"
            );
            (
                Arc::new(InMemoryRoomRepository::with_rooms(config.seed_rooms.clone())),
                Arc::new(InMemoryMessageStore::new()),
                Arc::new(InMemoryIdentityResolver::new()),
            )
        }
    };

    // Presence is optional: fall back to memory if redis is absent or unreachable
    let presence: Arc<dyn PresenceStore> = match &config.redis_url {
        Some(redis_url) => match RedisPresenceStore::connect(redis_url).await {
            Ok(store) => {
                info!("redis connection established");
                Arc::new(store)
            }
            Err(e) => {
                warn!(error = %e, "failed to connect to redis, using in-memory presence");
                Arc::new(InMemoryPresenceStore::new())
            }
        },
        None => Arc::new(InMemoryPresenceStore::new()),
    };

    let token_verifier = Arc::new(JwtTokenVerifier::new(config.jwt_secret.clone(), 7));
    let bind_addr = config.bind_addr;
    info!(
        chat_mode = ?config.chat_mode,
        call_lobby = %config.call_lobby,
        "Configuration loaded"
    );

    let app_state = AppState::new(
        config,
        Arc::new(InMemoryGroupRegistry::new()),
        room_repository,
        token_verifier,
        message_store,
        identities,
        presence,
    );

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Server running on http://{}", bind_addr);
    axum::serve(listener, router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
