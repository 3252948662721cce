use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// How chat connections map onto rooms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// One group per room id taken from the path; rooms must exist
    Rooms,
    /// Everyone shares a single chat group
    Global,
}

impl FromStr for ChatMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rooms" => Ok(ChatMode::Rooms),
            "global" => Ok(ChatMode::Global),
            _ => Err(ConfigError::Invalid {
                key: "CHAT_MODE",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Service configuration read from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub chat_mode: ChatMode,
    pub chat_require_identity: bool,
    pub call_lobby: String,
    pub presence_timeout: Duration,
    pub seed_rooms: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            redis_url: None,
            jwt_secret: "dev-secret-change-me".to_string(),
            chat_mode: ChatMode::Rooms,
            chat_require_identity: true,
            call_lobby: "general_group".to_string(),
            presence_timeout: Duration::from_millis(500),
            seed_rooms: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build from an explicit variable map; unset keys keep their defaults
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        if let Some(value) = get("BIND_ADDR") {
            config.bind_addr = parse("BIND_ADDR", value)?;
        }
        config.database_url = get("DATABASE_URL").map(String::from);
        config.redis_url = get("REDIS_URL").map(String::from);
        if let Some(value) = get("JWT_SECRET") {
            config.jwt_secret = value.to_string();
        }
        if let Some(value) = get("CHAT_MODE") {
            config.chat_mode = value.parse()?;
        }
        if let Some(value) = get("CHAT_REQUIRE_IDENTITY") {
            config.chat_require_identity = parse_bool("CHAT_REQUIRE_IDENTITY", value)?;
        }
        if let Some(value) = get("CALL_LOBBY") {
            config.call_lobby = value.to_string();
        }
        if let Some(value) = get("PRESENCE_TIMEOUT_MS") {
            config.presence_timeout = Duration::from_millis(parse("PRESENCE_TIMEOUT_MS", value)?);
        }
        if let Some(value) = get("SEED_ROOMS") {
            config.seed_rooms = value
                .split(',')
                .map(str::trim)
                .filter(|room| !room.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
