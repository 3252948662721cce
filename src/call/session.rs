use tracing::debug;
use uuid::Uuid;

use crate::websockets::{ConnectionId, GroupRegistry, RegistryError};

/// One connection's membership in an ad-hoc call group.
///
/// The call id doubles as the registry group name. The group exists while at least one
/// session for it is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    pub call_id: String,
    pub inviter: Option<String>,
    pub target: Option<String>,
}

impl CallSession {
    /// Start a new call: allocate a fresh call id and join the creator to its group
    pub async fn open(
        registry: &dyn GroupRegistry,
        connection: ConnectionId,
        inviter: Option<String>,
        target: Option<String>,
    ) -> Result<Self, RegistryError> {
        let call_id = Uuid::new_v4().to_string();
        registry.join(&call_id, connection).await?;
        debug!(call_id = %call_id, connection_id = %connection, "Call opened");
        Ok(Self {
            call_id,
            inviter,
            target,
        })
    }

    /// Join an existing call this connection was invited to
    pub async fn accept(
        registry: &dyn GroupRegistry,
        connection: ConnectionId,
        call_id: impl Into<String>,
        inviter: Option<String>,
        target: Option<String>,
    ) -> Result<Self, RegistryError> {
        let call_id = call_id.into();
        registry.join(&call_id, connection).await?;
        debug!(call_id = %call_id, connection_id = %connection, "Call accepted");
        Ok(Self {
            call_id,
            inviter,
            target,
        })
    }

    /// Leave the call group. Returns whether the connection was still a member.
    pub async fn close(self, registry: &dyn GroupRegistry, connection: ConnectionId) -> bool {
        let left = registry.leave(&self.call_id, connection).await;
        debug!(call_id = %self.call_id, connection_id = %connection, left = left, "Call closed");
        left
    }
}
