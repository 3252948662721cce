use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifier of one live client connection
pub type ConnectionId = Uuid;

/// Sending half of a connection's outbound queue
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// An event delivered to group members that the receiving connection interprets itself
/// (e.g. "join this call if you are the invite target") before anything reaches the socket.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEvent {
    pub kind: &'static str,
    pub payload: serde_json::Value,
}

/// What a group delivers into a member's outbound queue
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Written to the socket unchanged
    Frame(Arc<str>),
    /// Handed to the connection's context first
    Event(Arc<GroupEvent>),
}

impl Outbound {
    pub fn frame(text: impl Into<Arc<str>>) -> Self {
        Outbound::Frame(text.into())
    }

    pub fn event(kind: &'static str, payload: serde_json::Value) -> Self {
        Outbound::Event(Arc::new(GroupEvent { kind, payload }))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Connection {0} is not registered")]
    UnknownConnection(ConnectionId),
}

/// Tracks which connections belong to which groups and fans messages out to them.
///
/// Rooms and call sessions are both just groups here; a connection may be a member of
/// any number of them at once.
#[async_trait]
pub trait GroupRegistry: Send + Sync {
    /// Make a connection known to the registry so it can join groups
    async fn register(&self, connection: ConnectionId, sender: OutboundSender);

    /// Add a connection to a group. `Ok(false)` if it was already a member.
    async fn join(&self, group: &str, connection: ConnectionId) -> Result<bool, RegistryError>;

    /// Remove a connection from a group. Returns whether it was a member.
    async fn leave(&self, group: &str, connection: ConnectionId) -> bool;

    /// Deliver to every current member of `group` except `exclude`.
    /// Returns the number of members the payload was handed to.
    async fn send(&self, group: &str, outbound: Outbound, exclude: Option<ConnectionId>)
        -> usize;

    /// Deliver to a single registered connection
    async fn send_to(&self, connection: ConnectionId, outbound: Outbound) -> bool;

    /// Unregister a connection and remove it from every group it joined
    async fn leave_all(&self, connection: ConnectionId) -> Vec<String>;

    async fn members(&self, group: &str) -> Vec<ConnectionId>;

    async fn groups_of(&self, connection: ConnectionId) -> Vec<String>;
}

struct ConnectionEntry {
    sender: OutboundSender,
    groups: HashSet<String>,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    groups: HashMap<String, HashSet<ConnectionId>>,
}

impl RegistryState {
    fn remove_member(&mut self, group: &str, connection: ConnectionId) -> bool {
        let removed = match self.groups.get_mut(group) {
            Some(members) => {
                let removed = members.remove(&connection);
                if members.is_empty() {
                    self.groups.remove(group);
                    debug!(group = %group, "Group emptied, dropping it");
                }
                removed
            }
            None => false,
        };

        if let Some(entry) = self.connections.get_mut(&connection) {
            entry.groups.remove(group);
        }

        removed
    }
}

pub struct InMemoryGroupRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl InMemoryGroupRegistry {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
        }
    }

    /// Number of groups with at least one member
    pub async fn group_count(&self) -> usize {
        self.state.read().await.groups.len()
    }

    async fn prune(&self, group: &str, stale: Vec<ConnectionId>) {
        if stale.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        for connection in stale {
            warn!(
                group = %group,
                connection_id = %connection,
                "Delivery failed, pruning stale member"
            );
            state.remove_member(group, connection);
        }
    }
}

impl Default for InMemoryGroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GroupRegistry for InMemoryGroupRegistry {
    async fn register(&self, connection: ConnectionId, sender: OutboundSender) {
        let mut state = self.state.write().await;
        state.connections.insert(
            connection,
            ConnectionEntry {
                sender,
                groups: HashSet::new(),
            },
        );
        debug!(connection_id = %connection, "Connection registered");
    }

    async fn join(&self, group: &str, connection: ConnectionId) -> Result<bool, RegistryError> {
        let mut state = self.state.write().await;
        let entry = state
            .connections
            .get_mut(&connection)
            .ok_or(RegistryError::UnknownConnection(connection))?;

        if !entry.groups.insert(group.to_string()) {
            return Ok(false);
        }
        state
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(connection);

        debug!(group = %group, connection_id = %connection, "Joined group");
        Ok(true)
    }

    async fn leave(&self, group: &str, connection: ConnectionId) -> bool {
        let mut state = self.state.write().await;
        let removed = state.remove_member(group, connection);
        if removed {
            debug!(group = %group, connection_id = %connection, "Left group");
        }
        removed
    }

    async fn send(
        &self,
        group: &str,
        outbound: Outbound,
        exclude: Option<ConnectionId>,
    ) -> usize {
        // Snapshot the recipients so no lock is held while delivering
        let recipients: Vec<(ConnectionId, OutboundSender)> = {
            let state = self.state.read().await;
            match state.groups.get(group) {
                Some(members) => members
                    .iter()
                    .filter(|id| Some(**id) != exclude)
                    .filter_map(|id| {
                        state
                            .connections
                            .get(id)
                            .map(|entry| (*id, entry.sender.clone()))
                    })
                    .collect(),
                None => {
                    debug!(group = %group, "Send to unknown group, nothing delivered");
                    return 0;
                }
            }
        };

        let mut delivered = 0;
        let mut stale = Vec::new();
        for (id, sender) in recipients {
            match sender.send(outbound.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => stale.push(id),
            }
        }

        self.prune(group, stale).await;

        debug!(group = %group, delivered = delivered, "Group send complete");
        delivered
    }

    async fn send_to(&self, connection: ConnectionId, outbound: Outbound) -> bool {
        let sender = {
            let state = self.state.read().await;
            state
                .connections
                .get(&connection)
                .map(|entry| entry.sender.clone())
        };

        match sender {
            Some(sender) => sender.send(outbound).is_ok(),
            None => {
                debug!(connection_id = %connection, "Direct send to unregistered connection");
                false
            }
        }
    }

    async fn leave_all(&self, connection: ConnectionId) -> Vec<String> {
        let mut state = self.state.write().await;
        let groups: Vec<String> = match state.connections.remove(&connection) {
            Some(entry) => entry.groups.into_iter().collect(),
            None => return Vec::new(),
        };

        for group in &groups {
            state.remove_member(group, connection);
        }

        debug!(
            connection_id = %connection,
            group_count = groups.len(),
            "Connection removed from all groups"
        );
        groups
    }

    async fn members(&self, group: &str) -> Vec<ConnectionId> {
        let state = self.state.read().await;
        state
            .groups
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    async fn groups_of(&self, connection: ConnectionId) -> Vec<String> {
        let state = self.state.read().await;
        state
            .connections
            .get(&connection)
            .map(|entry| entry.groups.iter().cloned().collect())
            .unwrap_or_default()
    }
}
