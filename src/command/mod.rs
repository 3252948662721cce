// Inbound command routing
//
// Every connection type (chat, call signaling) registers its command handlers into a
// `CommandRouter` keyed by the envelope's `type` field.

// Public API - what other modules can use
pub use handler::{CommandError, CommandHandler, ConnectionContext};
pub use router::{CommandRouter, Envelope, RouteError, RoutedHandler};

// Internal modules
mod handler;
mod router;
