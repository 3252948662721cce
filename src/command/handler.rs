use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::router::Envelope;
use crate::shared::AppError;
use crate::websockets::{ConnectionId, GroupEvent};

/// Errors that can occur while executing a single inbound command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] AppError),

    #[error("No active call")]
    NoActiveCall,

    #[error("Connection has been torn down")]
    Disconnected,
}

/// Per-connection state a command handler executes against
#[async_trait]
pub trait ConnectionContext: Send + Sync {
    fn connection_id(&self) -> ConnectionId;

    /// Interpret a group event delivered to this connection.
    /// Returns the frame to write to the client, if any.
    async fn on_group_event(&self, _event: &GroupEvent) -> Option<String> {
        None
    }
}

/// One command type's behaviour, registered into a `CommandRouter` under its type name
#[async_trait]
pub trait CommandHandler<C: ConnectionContext>: Send + Sync {
    async fn execute(&self, ctx: &C, envelope: &Envelope) -> Result<(), CommandError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

impl Envelope {
    /// Decode the payload fields into a command-specific type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CommandError> {
        Ok(serde_json::from_value(serde_json::Value::Object(
            self.payload.clone(),
        ))?)
    }
}
