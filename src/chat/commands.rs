use async_trait::async_trait;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, IntoStaticStr};

use super::engine::{ChatContext, ChatRoomEngine};
use super::models::{DeletePayload, EditPayload, NewMessagePayload};
use crate::command::{CommandError, CommandHandler, CommandRouter, Envelope};

/// Inbound chat command types, by their wire `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ChatCommandKind {
    Message,
    Edit,
    Delete,
}

impl ChatCommandKind {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

struct SaveMessageCommand {
    engine: Arc<ChatRoomEngine>,
}

#[async_trait]
impl CommandHandler<ChatContext> for SaveMessageCommand {
    async fn execute(&self, ctx: &ChatContext, envelope: &Envelope) -> Result<(), CommandError> {
        let payload: NewMessagePayload = envelope.decode()?;
        self.engine.handle_message(ctx, &payload.message).await
    }

    fn name(&self) -> &'static str {
        "SaveMessageCommand"
    }
}

struct EditCommand {
    engine: Arc<ChatRoomEngine>,
}

#[async_trait]
impl CommandHandler<ChatContext> for EditCommand {
    async fn execute(&self, ctx: &ChatContext, envelope: &Envelope) -> Result<(), CommandError> {
        let payload: EditPayload = envelope.decode()?;
        self.engine
            .handle_edit(ctx, payload.message_id, &payload.new_text)
            .await
    }

    fn name(&self) -> &'static str {
        "EditCommand"
    }
}

struct DeleteCommand {
    engine: Arc<ChatRoomEngine>,
}

#[async_trait]
impl CommandHandler<ChatContext> for DeleteCommand {
    async fn execute(&self, ctx: &ChatContext, envelope: &Envelope) -> Result<(), CommandError> {
        let payload: DeletePayload = envelope.decode()?;
        self.engine.handle_delete(ctx, payload.message_id).await
    }

    fn name(&self) -> &'static str {
        "DeleteCommand"
    }
}

/// Router with a handler for every chat command type
pub fn chat_command_router(engine: Arc<ChatRoomEngine>) -> CommandRouter<ChatContext> {
    let mut router = CommandRouter::new();
    for kind in ChatCommandKind::iter() {
        let engine = Arc::clone(&engine);
        let handler: Arc<dyn CommandHandler<ChatContext>> = match kind {
            ChatCommandKind::Message => Arc::new(SaveMessageCommand { engine }),
            ChatCommandKind::Edit => Arc::new(EditCommand { engine }),
            ChatCommandKind::Delete => Arc::new(DeleteCommand { engine }),
        };
        router.register(kind.as_str(), handler);
    }
    router
}
