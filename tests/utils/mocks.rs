#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tokio::sync::mpsc;

use chatrelay::{
    chat::ChatMessage,
    websockets::{SocketError, SocketWrapper},
    AppError, MessageStore, PresenceStore,
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Socket driven through channels: the test pushes client frames in and reads server frames out.
/// Pushing `None` (or dropping the sender) is a client disconnect.
pub struct ChannelSocket {
    inbound: mpsc::UnboundedReceiver<Option<String>>,
    outbound: mpsc::UnboundedSender<String>,
}

impl ChannelSocket {
    pub fn new() -> (
        Self,
        mpsc::UnboundedSender<Option<String>>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                inbound: inbound_rx,
                outbound: outbound_tx,
            },
            inbound_tx,
            outbound_rx,
        )
    }
}

#[async_trait]
impl SocketWrapper for ChannelSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.outbound
            .send(message)
            .map_err(|_| SocketError::ConnectionClosed)
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        Ok(self.inbound.recv().await.flatten())
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        Ok(())
    }
}

/// Message store that is down
pub struct FailingMessageStore;

#[async_trait]
impl MessageStore for FailingMessageStore {
    async fn insert_message(
        &self,
        _content: &str,
        _timestamp: DateTime<Utc>,
        _user_id: Option<i64>,
        _room_id: &str,
    ) -> Result<i64, AppError> {
        Err(AppError::DatabaseError("database unavailable".into()))
    }

    async fn update_message(
        &self,
        _message_id: i64,
        _room_id: &str,
        _content: &str,
    ) -> Result<bool, AppError> {
        Err(AppError::DatabaseError("database unavailable".into()))
    }

    async fn delete_message(&self, _message_id: i64, _room_id: &str) -> Result<bool, AppError> {
        Err(AppError::DatabaseError("database unavailable".into()))
    }

    async fn list_by_room(&self, _room_id: &str) -> Result<Vec<ChatMessage>, AppError> {
        Ok(Vec::new())
    }
}

/// Presence store that is down
pub struct FailingPresenceStore;

#[async_trait]
impl PresenceStore for FailingPresenceStore {
    async fn add_member(&self, _room_id: &str, _username: &str) -> Result<(), AppError> {
        Err(AppError::PresenceError("redis unavailable".into()))
    }

    async fn remove_member(&self, _room_id: &str, _username: &str) -> Result<(), AppError> {
        Err(AppError::PresenceError("redis unavailable".into()))
    }

    async fn members_of(&self, _room_id: &str) -> Result<BTreeSet<String>, AppError> {
        Err(AppError::PresenceError("redis unavailable".into()))
    }
}
