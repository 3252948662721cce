use axum::{http::Method, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::shared::AppState;
use crate::websockets::{call_handler, call_room_handler, chat_room_handler, global_chat_handler};

/// All HTTP routes of the relay
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ws/chat", get(global_chat_handler))
        .route("/ws/chat/:room_id", get(chat_room_handler))
        .route("/ws/call", get(call_handler))
        .route("/ws/call/:room_id", get(call_room_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
