#![allow(dead_code)] // Test utilities may not all be used in every test

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use chatrelay::{
    call::InMemoryPresenceStore,
    chat::{InMemoryMessageStore, GLOBAL_GROUP},
    identity::{Identity, InMemoryIdentityResolver},
    room::InMemoryRoomRepository,
    shared::test_utils::AppStateBuilder,
    websockets::{run_call_connection, run_chat_connection},
    AppConfig, AppState, ChatMode, GroupRegistry, InMemoryGroupRegistry, MessageStore,
    PresenceStore,
};

use super::mocks::ChannelSocket;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub const CALL_LOBBY: &str = "general_group";

pub struct TestSetup {
    pub state: AppState,
    pub registry: Arc<InMemoryGroupRegistry>,
    pub messages: Arc<InMemoryMessageStore>,
    pub presence: Arc<InMemoryPresenceStore>,
    pub users: HashMap<String, Identity>,
}

/// One connected client, driven through a ChannelSocket
pub struct TestClient {
    pub name: String,
    pub inbound: mpsc::UnboundedSender<Option<String>>,
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub task: JoinHandle<()>,
}

pub struct TestSetupBuilder {
    rooms: Vec<String>,
    users: Vec<(String, Option<String>)>,
    chat_mode: ChatMode,
    message_store: Option<Arc<dyn MessageStore>>,
    presence: Option<Arc<dyn PresenceStore>>,
    presence_timeout: Duration,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            rooms: vec!["7".to_string(), "8".to_string()],
            users: vec![],
            chat_mode: ChatMode::Rooms,
            message_store: None,
            presence: None,
            presence_timeout: Duration::from_millis(500),
        }
    }

    pub fn with_users(mut self, users: Vec<&str>) -> Self {
        self.users = users.into_iter().map(|u| (u.to_string(), None)).collect();
        self
    }

    pub fn with_user_avatar(mut self, user: &str, avatar_url: &str) -> Self {
        self.users
            .push((user.to_string(), Some(avatar_url.to_string())));
        self
    }

    pub fn with_three_users(self) -> Self {
        self.with_users(vec!["alice", "bob", "carol"])
    }

    pub fn with_global_chat(mut self) -> Self {
        self.chat_mode = ChatMode::Global;
        self
    }

    pub fn with_message_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.message_store = Some(store);
        self
    }

    pub fn with_presence(mut self, presence: Arc<dyn PresenceStore>) -> Self {
        self.presence = Some(presence);
        self
    }

    pub async fn build(self) -> TestSetup {
        let registry = Arc::new(InMemoryGroupRegistry::new());
        let messages = Arc::new(InMemoryMessageStore::new());
        let presence = Arc::new(InMemoryPresenceStore::new());
        let identities = Arc::new(InMemoryIdentityResolver::new());

        let mut users = HashMap::new();
        for (index, (name, avatar_url)) in self.users.into_iter().enumerate() {
            let user_id = index as i64 + 1;
            identities.insert_user(user_id, name.clone(), avatar_url).await;
            users.insert(name.clone(), Identity::new(user_id, name));
        }

        let config = AppConfig {
            chat_mode: self.chat_mode,
            call_lobby: CALL_LOBBY.to_string(),
            presence_timeout: self.presence_timeout,
            seed_rooms: self.rooms.clone(),
            ..AppConfig::default()
        };

        let state = AppStateBuilder::new()
            .with_config(config)
            .with_registry(registry.clone())
            .with_room_repository(Arc::new(InMemoryRoomRepository::with_rooms(self.rooms)))
            .with_message_store(
                self.message_store
                    .unwrap_or_else(|| messages.clone() as Arc<dyn MessageStore>),
            )
            .with_identities(identities)
            .with_presence(
                self.presence
                    .unwrap_or_else(|| presence.clone() as Arc<dyn PresenceStore>),
            )
            .build();

        TestSetup {
            state,
            registry,
            messages,
            presence,
            users,
        }
    }
}

impl TestSetup {
    fn identity(&self, name: &str) -> Option<Identity> {
        self.users.get(name).cloned()
    }

    /// Connect `name` (anonymous if not a known user) to a room's chat.
    /// `None` joins the shared chat.
    pub async fn connect_chat(&self, name: &str, room_id: Option<&str>) -> TestClient {
        let group = match (self.state.config.chat_mode, room_id) {
            (ChatMode::Rooms, Some(room_id)) => room_id.to_string(),
            _ => GLOBAL_GROUP.to_string(),
        };
        let before = self.member_count(&group).await;

        let (socket, inbound, outbound) = ChannelSocket::new();
        let task = tokio::spawn(run_chat_connection(
            self.state.clone(),
            Box::new(socket),
            self.identity(name),
            match self.state.config.chat_mode {
                ChatMode::Rooms => room_id.map(String::from),
                ChatMode::Global => None,
            },
        ));
        let client = TestClient {
            name: name.to_string(),
            inbound,
            outbound,
            task,
        };
        assert!(
            self.wait_for_member_count(&group, before + 1).await,
            "{} never joined {}",
            name,
            group
        );
        client
    }

    /// Connect `name` to the call lobby
    pub async fn connect_call(&self, name: &str) -> TestClient {
        let before = self.member_count(CALL_LOBBY).await;
        let (socket, inbound, outbound) = ChannelSocket::new();
        let task = tokio::spawn(run_call_connection(
            self.state.clone(),
            Box::new(socket),
            self.identity(name),
            CALL_LOBBY.to_string(),
        ));
        let client = TestClient {
            name: name.to_string(),
            inbound,
            outbound,
            task,
        };
        assert!(
            self.wait_for_member_count(CALL_LOBBY, before + 1).await,
            "{} never joined the call lobby",
            name
        );
        client
    }

    pub async fn member_count(&self, group: &str) -> usize {
        self.registry.members(group).await.len()
    }

    /// Poll until `group` has exactly `expected` members or the timeout elapses
    pub async fn wait_for_member_count(&self, group: &str, expected: usize) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while tokio::time::Instant::now() < deadline {
            if self.member_count(group).await == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
