// Public API - what other modules can use
pub use models::RoomModel;
pub use repository::{InMemoryRoomRepository, PostgresRoomRepository, RoomRepository};

// Internal modules
mod models;
mod repository;
