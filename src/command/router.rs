use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::handler::{CommandError, CommandHandler, ConnectionContext};
use crate::websockets::{GroupEvent, MessageHandler};

/// A decoded inbound frame: the `type` discriminator plus every other field
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: String,
    pub payload: Map<String, Value>,
}

impl Envelope {
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| RouteError::Malformed(e.to_string()))?;

        let Value::Object(mut payload) = value else {
            return Err(RouteError::Malformed("frame is not a JSON object".into()));
        };

        let kind = match payload.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(_) => return Err(RouteError::Malformed("`type` is not a string".into())),
            None => return Err(RouteError::Malformed("missing `type` field".into())),
        };

        Ok(Self { kind, payload })
    }

    /// String field lookup, `None` when absent or not a string
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(Value::as_str)
    }

    /// The envelope as the client sent it, `type` included
    pub fn to_value(&self) -> Value {
        let mut object = self.payload.clone();
        object.insert("type".to_string(), Value::String(self.kind.clone()));
        Value::Object(object)
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Unknown command type: {0}")]
    UnknownType(String),

    #[error("Command {kind} failed: {source}")]
    Command {
        kind: String,
        #[source]
        source: CommandError,
    },
}

/// Dispatch table from command type to handler
pub struct CommandRouter<C: ConnectionContext> {
    handlers: HashMap<String, Arc<dyn CommandHandler<C>>>,
}

impl<C: ConnectionContext> CommandRouter<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a command type, replacing any previous one
    pub fn register(&mut self, kind: impl Into<String>, handler: Arc<dyn CommandHandler<C>>) {
        let kind = kind.into();
        debug!(kind = %kind, handler = handler.name(), "Registering command handler");
        self.handlers.insert(kind, handler);
    }

    pub fn command_types(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Decode a raw frame and run the matching handler against `ctx`
    pub async fn dispatch(&self, ctx: &C, raw: &str) -> Result<(), RouteError> {
        let envelope = Envelope::parse(raw)?;

        let handler = self
            .handlers
            .get(&envelope.kind)
            .ok_or_else(|| RouteError::UnknownType(envelope.kind.clone()))?;

        debug!(
            connection_id = %ctx.connection_id(),
            kind = %envelope.kind,
            handler = handler.name(),
            "Dispatching command"
        );

        handler
            .execute(ctx, &envelope)
            .await
            .map_err(|source| RouteError::Command {
                kind: envelope.kind.clone(),
                source,
            })
    }
}

impl<C: ConnectionContext> Default for CommandRouter<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Binds a shared router to one connection's context so the connection loop can drive it
pub struct RoutedHandler<C: ConnectionContext> {
    router: Arc<CommandRouter<C>>,
    context: Arc<C>,
}

impl<C: ConnectionContext> RoutedHandler<C> {
    pub fn new(router: Arc<CommandRouter<C>>, context: Arc<C>) -> Self {
        Self { router, context }
    }
}

#[async_trait]
impl<C: ConnectionContext + 'static> MessageHandler for RoutedHandler<C> {
    async fn handle_message(&self, message: String) {
        let connection_id = self.context.connection_id();
        match self.router.dispatch(&self.context, &message).await {
            Ok(()) => {}
            Err(RouteError::UnknownType(kind)) => {
                info!(connection_id = %connection_id, kind = %kind, "Unhandled message type");
            }
            Err(RouteError::Malformed(reason)) => {
                warn!(
                    connection_id = %connection_id,
                    error = %reason,
                    "Failed to parse WebSocket message"
                );
            }
            Err(RouteError::Command { kind, source }) => {
                warn!(
                    connection_id = %connection_id,
                    kind = %kind,
                    error = %source,
                    "Command failed"
                );
            }
        }
    }

    async fn handle_event(&self, event: &GroupEvent) -> Option<String> {
        self.context.on_group_event(event).await
    }
}
