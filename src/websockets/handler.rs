use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::group_registry::Outbound;
use super::socket::{Connection, SocketWrapper};
use crate::call::CallContext;
use crate::chat::ChatContext;
use crate::command::RoutedHandler;
use crate::config::ChatMode;
use crate::identity::Identity;
use crate::shared::{AppError, AppState};

/// Query parameters accepted on every WebSocket endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// Where the token was found; a protocol header token has to be echoed back on upgrade
enum TokenSource {
    Query(String),
    Protocol(String),
}

fn find_token(params: &ConnectParams, headers: &HeaderMap) -> Option<TokenSource> {
    if let Some(token) = params.token.as_deref().filter(|t| !t.is_empty()) {
        return Some(TokenSource::Query(token.to_string()));
    }
    headers
        .get("sec-websocket-protocol")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| TokenSource::Protocol(t.to_string()))
}

/// Resolve the caller's identity. A bad token means an anonymous connection, not an error.
async fn resolve_identity(
    state: &AppState,
    params: &ConnectParams,
    headers: &HeaderMap,
    ws: WebSocketUpgrade,
) -> (Option<Identity>, WebSocketUpgrade) {
    let (token, ws) = match find_token(params, headers) {
        Some(TokenSource::Query(token)) => (token, ws),
        Some(TokenSource::Protocol(token)) => (token.clone(), ws.protocols([token])),
        None => return (None, ws),
    };

    match state.token_verifier.verify(&token).await {
        Ok(identity) => (Some(identity), ws),
        Err(e) => {
            warn!(error = %e, "Invalid connection token, continuing anonymously");
            (None, ws)
        }
    }
}

/// WebSocket endpoint for a room's chat
/// GET /ws/chat/:room_id?token=...
pub async fn chat_room_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    info!(room_id = %room_id, "Chat connection requested");
    chat_upgrade(ws, Some(room_id), params, headers, state).await
}

/// WebSocket endpoint for the shared chat
/// GET /ws/chat?token=...
pub async fn global_chat_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    info!("Global chat connection requested");
    chat_upgrade(ws, None, params, headers, state).await
}

async fn chat_upgrade(
    ws: WebSocketUpgrade,
    room_id: Option<String>,
    params: ConnectParams,
    headers: HeaderMap,
    state: AppState,
) -> Result<Response, AppError> {
    let (identity, ws) = resolve_identity(&state, &params, &headers, ws).await;

    let room_id = match state.config.chat_mode {
        ChatMode::Global => None,
        ChatMode::Rooms => {
            let room_id =
                room_id.ok_or_else(|| AppError::NotFound("Room id required".to_string()))?;

            if !state.room_repository.room_exists(&room_id).await? {
                warn!(room_id = %room_id, "Room not found, rejecting WebSocket connection");
                return Err(AppError::NotFound("Room not found".to_string()));
            }
            if identity.is_none() && state.config.chat_require_identity {
                warn!(room_id = %room_id, "Anonymous connection rejected");
                return Err(AppError::Unauthorized("Authentication required".to_string()));
            }
            Some(room_id)
        }
    };

    Ok(ws.on_upgrade(move |socket| {
        run_chat_connection(state, Box::new(socket), identity, room_id)
    }))
}

/// WebSocket endpoint for call signaling in the default lobby
/// GET /ws/call?token=...
pub async fn call_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let lobby = state.config.call_lobby.clone();
    call_upgrade(ws, lobby, params, headers, state).await
}

/// WebSocket endpoint for call signaling scoped to a room
/// GET /ws/call/:room_id?token=...
pub async fn call_room_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    call_upgrade(ws, room_id, params, headers, state).await
}

async fn call_upgrade(
    ws: WebSocketUpgrade,
    lobby: String,
    params: ConnectParams,
    headers: HeaderMap,
    state: AppState,
) -> Response {
    info!(room_id = %lobby, "Call signaling connection requested");
    let (identity, ws) = resolve_identity(&state, &params, &headers, ws).await;
    ws.on_upgrade(move |socket| run_call_connection(state, Box::new(socket), identity, lobby))
}

/// Drive one chat connection until it disconnects, then release everything it held.
/// `room_id: None` puts the connection in the shared chat.
pub async fn run_chat_connection(
    state: AppState,
    socket: Box<dyn SocketWrapper>,
    identity: Option<Identity>,
    room_id: Option<String>,
) {
    let connection_id = Uuid::new_v4();
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<Outbound>();
    state
        .registry
        .register(connection_id, outbound_sender)
        .await;

    let context = match room_id {
        Some(room_id) => ChatContext::for_room(connection_id, identity, room_id),
        None => ChatContext::global(connection_id, identity),
    };
    let username = context
        .identity
        .as_ref()
        .map(|i| i.username.clone())
        .unwrap_or_default();
    info!(
        connection_id = %connection_id,
        room_id = %context.room_id,
        username = %username,
        "Chat connection established"
    );

    let history = match state.chat_engine.join(&context).await {
        Ok(history) => history,
        Err(e) => {
            warn!(connection_id = %connection_id, error = %e, "Failed to join room");
            state.registry.leave_all(connection_id).await;
            return;
        }
    };

    let room_id = context.room_id.clone();
    let handler = Arc::new(RoutedHandler::new(
        state.chat_router.clone(),
        Arc::new(context),
    ));
    let connection =
        Connection::new(connection_id, socket, outbound_receiver, handler).with_preamble(history);

    match connection.run().await {
        Ok(()) => info!(
            connection_id = %connection_id,
            room_id = %room_id,
            "Chat connection closed cleanly"
        ),
        Err(e) => warn!(
            connection_id = %connection_id,
            room_id = %room_id,
            error = %e,
            "Chat connection error"
        ),
    }

    let left = state.registry.leave_all(connection_id).await;
    info!(connection_id = %connection_id, groups = ?left, "Chat connection torn down");
}

/// Drive one signaling connection until it disconnects, then release its groups and presence
pub async fn run_call_connection(
    state: AppState,
    socket: Box<dyn SocketWrapper>,
    identity: Option<Identity>,
    lobby: String,
) {
    let connection_id = Uuid::new_v4();
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<Outbound>();
    state
        .registry
        .register(connection_id, outbound_sender)
        .await;

    let context = Arc::new(CallContext::new(
        connection_id,
        identity,
        lobby,
        state.registry.clone(),
    ));
    if let Err(e) = state.call_engine.join(&context).await {
        warn!(connection_id = %connection_id, error = %e, "Failed to join call lobby");
        state.registry.leave_all(connection_id).await;
        return;
    }

    let handler = Arc::new(RoutedHandler::new(
        state.call_router.clone(),
        context.clone(),
    ));
    let connection = Connection::new(connection_id, socket, outbound_receiver, handler);

    match connection.run().await {
        Ok(()) => info!(connection_id = %connection_id, "Call connection closed cleanly"),
        Err(e) => warn!(connection_id = %connection_id, error = %e, "Call connection error"),
    }

    context.close();
    let left = state.registry.leave_all(connection_id).await;
    state.call_engine.teardown(&context).await;
    info!(connection_id = %connection_id, groups = ?left, "Call connection torn down");
}
