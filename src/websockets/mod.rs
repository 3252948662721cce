// Public API
pub use group_registry::{
    ConnectionId, GroupEvent, GroupRegistry, InMemoryGroupRegistry, Outbound, OutboundSender,
    RegistryError,
};
pub use handler::{
    call_handler, call_room_handler, chat_room_handler, global_chat_handler, run_call_connection,
    run_chat_connection, ConnectParams,
};
pub use socket::{Connection, MessageHandler, SocketError, SocketWrapper};

// Internal modules
mod group_registry;
mod handler;
mod socket;
