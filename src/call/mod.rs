// WebRTC call signaling: ad-hoc call groups, invites, targeted relay and room presence

// Public API - what other modules can use
pub use commands::{call_command_router, CallCommandKind};
pub use engine::{CallContext, CallSignalingEngine, INVITE_EVENT, TARGETED_EVENT};
pub use presence::{InMemoryPresenceStore, PresenceStore, RedisPresenceStore};
pub use session::CallSession;

// Internal modules
mod commands;
mod engine;
mod presence;
mod session;
