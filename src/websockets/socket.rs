use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::group_registry::{ConnectionId, GroupEvent, Outbound};

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next text message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Handler for everything a single connection receives
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an incoming message from the client
    async fn handle_message(&self, message: String);

    /// Interpret a group event addressed to this connection.
    /// Returns the text to write to the socket, if any.
    async fn handle_event(&self, _event: &GroupEvent) -> Option<String> {
        None
    }
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Command worker stopped: {0}")]
    WorkerStopped(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                // Pings are answered by axum; binary frames are not part of the protocol
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Connection represents a managed WebSocket connection.
///
/// Outbound traffic arrives on the receiver registered with the group registry; inbound
/// text is queued to a dedicated worker task which runs commands one at a time, in order.
/// Keeping command execution off the socket loop means a disconnect is noticed right away
/// even while a slow command is still running.
pub struct Connection {
    pub id: ConnectionId,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<Outbound>,
    message_handler: Arc<dyn MessageHandler>,
    preamble: Vec<String>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<Outbound>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            id,
            socket,
            outbound_receiver,
            message_handler,
            preamble: Vec::new(),
        }
    }

    /// Frames written before anything queued on the outbound receiver (history replay)
    pub fn with_preamble(mut self, frames: Vec<String>) -> Self {
        self.preamble = frames;
        self
    }

    /// Run the connection - handles both sending and receiving until disconnect
    pub async fn run(mut self) -> Result<(), SocketError> {
        for frame in std::mem::take(&mut self.preamble) {
            self.socket.send_message(frame).await?;
        }

        let (inbound_sender, mut inbound_receiver) = mpsc::unbounded_channel::<String>();
        let handler = Arc::clone(&self.message_handler);
        let connection_id = self.id;
        let mut worker = tokio::spawn(async move {
            while let Some(message) = inbound_receiver.recv().await {
                handler.handle_message(message).await;
            }
            debug!(connection_id = %connection_id, "Command worker drained");
        });

        let result = loop {
            tokio::select! {
                // Handle outbound messages (from our app to client)
                msg = self.outbound_receiver.recv() => {
                    let text = match msg {
                        Some(Outbound::Frame(text)) => Some(text.to_string()),
                        Some(Outbound::Event(event)) => {
                            self.message_handler.handle_event(&event).await
                        }
                        None => break Ok(()), // Registry dropped us
                    };
                    if let Some(text) = text {
                        if let Err(e) = self.socket.send_message(text).await {
                            break Err(e);
                        }
                    }
                }

                // Handle inbound messages (from client to our app)
                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(message)) => {
                            if inbound_sender.send(message).is_err() {
                                let reason = "inbound queue closed".to_string();
                                break Err(SocketError::WorkerStopped(reason));
                            }
                        }
                        Ok(None) => break Ok(()), // Client disconnected
                        Err(e) => break Err(e),
                    }
                }

                // A panicking command takes the worker down; close this connection only
                joined = &mut worker => {
                    let reason = match joined {
                        Err(e) if e.is_panic() => "command handler panicked".to_string(),
                        Err(e) => e.to_string(),
                        Ok(()) => "worker exited".to_string(),
                    };
                    warn!(connection_id = %self.id, reason = %reason, "Command worker stopped");
                    break Err(SocketError::WorkerStopped(reason));
                }
            }
        };

        // Let the worker finish what it already accepted; its late sends are no-ops
        drop(inbound_sender);

        let _ = self.socket.close().await;
        result
    }
}
