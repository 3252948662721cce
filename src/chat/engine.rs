use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::models::{ChatEvent, ChatMessage, MessageFrame};
use super::repository::MessageStore;
use crate::command::{CommandError, ConnectionContext};
use crate::identity::{Identity, IdentityResolver};
use crate::shared::AppError;
use crate::websockets::{ConnectionId, GroupRegistry, Outbound, RegistryError};

/// Room id used for storage when every connection shares the single `chat` group
pub const GLOBAL_ROOM: &str = "global";

/// Registry group name used in global mode
pub const GLOBAL_GROUP: &str = "chat";

/// Display name for messages without a resolvable author
pub const ANONYMOUS: &str = "anonymous";

/// Per-connection chat state
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub connection_id: ConnectionId,
    pub identity: Option<Identity>,
    /// Room id messages are stored under
    pub room_id: String,
    /// Registry group fan-out goes to
    pub group: String,
}

impl ChatContext {
    /// Context for a connection bound to one room; the group is named after the room
    pub fn for_room(
        connection_id: ConnectionId,
        identity: Option<Identity>,
        room_id: impl Into<String>,
    ) -> Self {
        let room_id = room_id.into();
        Self {
            connection_id,
            identity,
            group: room_id.clone(),
            room_id,
        }
    }

    /// Context for a connection in the shared global chat
    pub fn global(connection_id: ConnectionId, identity: Option<Identity>) -> Self {
        Self {
            connection_id,
            identity,
            room_id: GLOBAL_ROOM.to_string(),
            group: GLOBAL_GROUP.to_string(),
        }
    }

    fn user_id(&self) -> Option<i64> {
        self.identity.as_ref().map(|i| i.user_id)
    }

    fn display_name(&self) -> &str {
        self.identity
            .as_ref()
            .map(|i| i.username.as_str())
            .unwrap_or(ANONYMOUS)
    }
}

impl ConnectionContext for ChatContext {
    fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

/// Chat room behaviour: join with history replay, persist-then-broadcast, edit and delete
pub struct ChatRoomEngine {
    registry: Arc<dyn GroupRegistry>,
    store: Arc<dyn MessageStore>,
    identities: Arc<dyn IdentityResolver>,
}

impl ChatRoomEngine {
    pub fn new(
        registry: Arc<dyn GroupRegistry>,
        store: Arc<dyn MessageStore>,
        identities: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            registry,
            store,
            identities,
        }
    }

    /// Join the connection's room group, then build the history frames it should see first.
    ///
    /// The join happens before the history read so nothing sent in between is lost; such a
    /// message may show up twice. A failed history read still leaves the connection joined
    /// and yields a single error frame instead of the history.
    #[instrument(
        skip(self, ctx),
        fields(connection_id = %ctx.connection_id, room_id = %ctx.room_id)
    )]
    pub async fn join(&self, ctx: &ChatContext) -> Result<Vec<String>, RegistryError> {
        self.registry.join(&ctx.group, ctx.connection_id).await?;

        match self.replay(&ctx.room_id).await {
            Ok(frames) => {
                info!(message_count = frames.len(), "Joined room, replaying history");
                Ok(frames.iter().filter_map(to_json).collect())
            }
            Err(e) => {
                warn!(error = %e, "History replay failed");
                Ok(error_frame("history", &e).into_iter().collect())
            }
        }
    }

    /// All stored messages of a room as outbound frames, ascending by id
    #[instrument(skip(self))]
    pub async fn replay(&self, room_id: &str) -> Result<Vec<MessageFrame>, AppError> {
        let messages = self.store.list_by_room(room_id).await?;

        // Lookups are cached for this replay only
        let mut authors: HashMap<i64, (String, Option<String>)> = HashMap::new();
        let mut frames = Vec::with_capacity(messages.len());

        for message in messages {
            let (user, avatar_url) = match message.user_id {
                Some(user_id) => {
                    if !authors.contains_key(&user_id) {
                        let author = self.resolve_author(user_id).await;
                        authors.insert(user_id, author);
                    }
                    authors.get(&user_id).cloned().unwrap_or_else(anonymous_author)
                }
                None => anonymous_author(),
            };
            frames.push(message_frame(&message, user, avatar_url));
        }

        Ok(frames)
    }

    /// Persist a new message then broadcast it to the whole room, sender included
    #[instrument(
        skip(self, ctx, content),
        fields(connection_id = %ctx.connection_id, room_id = %ctx.room_id)
    )]
    pub async fn handle_message(
        &self,
        ctx: &ChatContext,
        content: &str,
    ) -> Result<(), CommandError> {
        let now = Utc::now();
        let id = match self
            .store
            .insert_message(content, now, ctx.user_id(), &ctx.room_id)
            .await
        {
            Ok(id) => id,
            Err(e) => return Err(self.reject(ctx, "message", e).await),
        };

        let avatar_url = match ctx.user_id() {
            Some(user_id) => self.avatar_or_none(user_id).await,
            None => None,
        };

        let frame = MessageFrame {
            id,
            message: content.to_string(),
            user: ctx.display_name().to_string(),
            datetime: now,
            avatar_url,
            edited: false,
        };

        let delivered = self.broadcast(&ctx.group, &frame).await;
        debug!(message_id = id, delivered = delivered, "Message broadcast");
        Ok(())
    }

    /// Rewrite a message of this room and tell the room about it
    #[instrument(
        skip(self, ctx, new_text),
        fields(connection_id = %ctx.connection_id, room_id = %ctx.room_id)
    )]
    pub async fn handle_edit(
        &self,
        ctx: &ChatContext,
        message_id: i64,
        new_text: &str,
    ) -> Result<(), CommandError> {
        let updated = match self
            .store
            .update_message(message_id, &ctx.room_id, new_text)
            .await
        {
            Ok(updated) => updated,
            Err(e) => return Err(self.reject(ctx, "edit", e).await),
        };

        if !updated {
            debug!(message_id = message_id, "Edit target not in this room, ignoring");
            return Ok(());
        }

        let event = ChatEvent::Edit {
            message_id,
            new_text: new_text.to_string(),
        };
        self.broadcast(&ctx.group, &event).await;
        Ok(())
    }

    /// Delete a message of this room and tell the room about it
    #[instrument(
        skip(self, ctx),
        fields(connection_id = %ctx.connection_id, room_id = %ctx.room_id)
    )]
    pub async fn handle_delete(
        &self,
        ctx: &ChatContext,
        message_id: i64,
    ) -> Result<(), CommandError> {
        let deleted = match self.store.delete_message(message_id, &ctx.room_id).await {
            Ok(deleted) => deleted,
            Err(e) => return Err(self.reject(ctx, "delete", e).await),
        };

        if !deleted {
            debug!(message_id = message_id, "Delete target not in this room, ignoring");
            return Ok(());
        }

        self.broadcast(&ctx.group, &ChatEvent::Delete { message_id })
            .await;
        Ok(())
    }

    /// Unknown users and failed lookups both render as anonymous
    async fn resolve_author(&self, user_id: i64) -> (String, Option<String>) {
        let username = match self.identities.username_of(user_id).await {
            Ok(Some(username)) => username,
            Ok(None) => ANONYMOUS.to_string(),
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Username lookup failed");
                ANONYMOUS.to_string()
            }
        };
        let avatar_url = self.avatar_or_none(user_id).await;
        (username, avatar_url)
    }

    async fn avatar_or_none(&self, user_id: i64) -> Option<String> {
        match self.identities.avatar_url_of(user_id).await {
            Ok(url) => url,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Avatar lookup failed");
                None
            }
        }
    }

    async fn broadcast<T: Serialize>(&self, group: &str, body: &T) -> usize {
        match to_json(body) {
            Some(text) => self.registry.send(group, Outbound::frame(text), None).await,
            None => 0,
        }
    }

    /// Tell only the originator that its command failed
    async fn reject(&self, ctx: &ChatContext, command: &str, error: AppError) -> CommandError {
        warn!(command = command, error = %error, "Chat command rejected");
        if let Some(frame) = error_frame(command, &error) {
            self.registry
                .send_to(ctx.connection_id, Outbound::frame(frame))
                .await;
        }
        CommandError::Store(error)
    }
}

fn anonymous_author() -> (String, Option<String>) {
    (ANONYMOUS.to_string(), None)
}

fn message_frame(message: &ChatMessage, user: String, avatar_url: Option<String>) -> MessageFrame {
    MessageFrame {
        id: message.id,
        message: message.content.clone(),
        user,
        datetime: message.created_at,
        avatar_url,
        edited: message.edited,
    }
}

fn error_frame(command: &str, error: &AppError) -> Option<String> {
    to_json(&ChatEvent::Error {
        command: command.to_string(),
        message: error.to_string(),
    })
}

fn to_json<T: Serialize>(body: &T) -> Option<String> {
    match serde_json::to_string(body) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "Failed to serialize outbound frame");
            None
        }
    }
}
