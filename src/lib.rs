// Library crate for the chat relay
// This file exposes the public API for integration tests

pub mod app;
pub mod call;
pub mod chat;
pub mod command;
pub mod config;
pub mod identity;
pub mod room;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use call::{CallContext, CallSignalingEngine, PresenceStore};
pub use chat::{ChatContext, ChatRoomEngine, MessageStore};
pub use command::{CommandRouter, Envelope};
pub use config::{AppConfig, ChatMode};
pub use shared::{AppError, AppState};
pub use websockets::{GroupRegistry, InMemoryGroupRegistry, MessageHandler, SocketWrapper};
