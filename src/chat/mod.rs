// Room-scoped chat: history replay, persistence, edit/delete and broadcast

// Public API - what other modules can use
pub use commands::{chat_command_router, ChatCommandKind};
pub use engine::{ChatContext, ChatRoomEngine, ANONYMOUS, GLOBAL_GROUP, GLOBAL_ROOM};
pub use models::{ChatEvent, ChatMessage, MessageFrame};
pub use repository::{InMemoryMessageStore, MessageStore, PostgresMessageStore};

// Internal modules
mod commands;
mod engine;
mod models;
mod repository;
