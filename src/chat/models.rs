use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// Database model for the chat_messages table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub content: String,
    pub user_id: Option<i64>, // None for anonymous authors
    pub room_id: String,
    pub created_at: DateTime<Utc>,
    pub edited: bool,
}

/// Outbound frame for a stored or freshly sent message.
/// History replay and live broadcast use the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageFrame {
    pub id: i64,
    pub message: String,
    pub user: String,
    pub datetime: DateTime<Utc>,
    pub avatar_url: Option<String>,
    pub edited: bool,
}

/// Outbound frames other than full messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    Edit { message_id: i64, new_text: String },
    Delete { message_id: i64 },
    Error { command: String, message: String },
}

/// Client-to-Server message payloads
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessagePayload {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditPayload {
    #[serde(deserialize_with = "message_id")]
    pub message_id: i64,
    pub new_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletePayload {
    #[serde(deserialize_with = "message_id")]
    pub message_id: i64,
}

/// Clients send ids back as they received them, but some send them as strings
fn message_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
