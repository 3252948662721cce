use async_trait::async_trait;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::presence::PresenceStore;
use super::session::CallSession;
use crate::command::{CommandError, ConnectionContext, Envelope};
use crate::identity::Identity;
use crate::shared::AppError;
use crate::websockets::{ConnectionId, GroupEvent, GroupRegistry, Outbound, RegistryError};

/// Group event: "join the call if you are the target, then show the invite"
pub const INVITE_EVENT: &str = "call-invite";

/// Group event: "show this only if you are the target"
pub const TARGETED_EVENT: &str = "send-to-target";

/// Per-connection signaling state
pub struct CallContext {
    pub connection_id: ConnectionId,
    pub identity: Option<Identity>,
    /// Room-level group invites and participant notices go to
    pub room_id: String,
    registry: Arc<dyn GroupRegistry>,
    session: Mutex<Option<CallSession>>,
    in_presence: AtomicBool,
    closed: AtomicBool,
}

impl CallContext {
    pub fn new(
        connection_id: ConnectionId,
        identity: Option<Identity>,
        room_id: impl Into<String>,
        registry: Arc<dyn GroupRegistry>,
    ) -> Self {
        Self {
            connection_id,
            identity,
            room_id: room_id.into(),
            registry,
            session: Mutex::new(None),
            in_presence: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.username.as_str())
    }

    /// Id of the call this connection is currently in
    pub async fn call_id(&self) -> Option<String> {
        self.session.lock().await.as_ref().map(|s| s.call_id.clone())
    }

    pub fn in_presence(&self) -> bool {
        self.in_presence.load(Ordering::SeqCst)
    }

    /// Mark the connection as gone; commands still queued behind it become no-ops
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), CommandError> {
        if self.is_closed() {
            debug!(connection_id = %self.connection_id, "Command after teardown, ignoring");
            return Err(CommandError::Disconnected);
        }
        Ok(())
    }

    fn is_target(&self, payload: &Value) -> bool {
        match (self.username(), payload.get("target").and_then(Value::as_str)) {
            (Some(me), Some(target)) => me == target,
            _ => false,
        }
    }

    /// Replace the current session, leaving the previous call group if it differs
    async fn switch_session(&self, session: CallSession) {
        let previous = self.session.lock().await.replace(session.clone());
        if let Some(previous) = previous {
            if previous.call_id != session.call_id {
                previous
                    .close(self.registry.as_ref(), self.connection_id)
                    .await;
            }
        }
    }

    async fn accept_invite(&self, payload: &Value) -> Option<String> {
        let Some(call_id) = payload.get("callId").and_then(Value::as_str) else {
            warn!(connection_id = %self.connection_id, "Invite without callId, dropping");
            return None;
        };

        let inviter = payload.get("from").and_then(Value::as_str).map(String::from);
        let session = match CallSession::accept(
            self.registry.as_ref(),
            self.connection_id,
            call_id,
            inviter,
            self.username().map(String::from),
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    connection_id = %self.connection_id,
                    error = %e,
                    "Could not join invited call"
                );
                return None;
            }
        };

        info!(
            connection_id = %self.connection_id,
            call_id = %call_id,
            "Joined call from invite"
        );
        self.switch_session(session).await;
        Some(payload.to_string())
    }
}

#[async_trait]
impl ConnectionContext for CallContext {
    fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    async fn on_group_event(&self, event: &GroupEvent) -> Option<String> {
        match event.kind {
            INVITE_EVENT if self.is_target(&event.payload) => {
                self.accept_invite(&event.payload).await
            }
            TARGETED_EVENT if self.is_target(&event.payload) => Some(event.payload.to_string()),
            INVITE_EVENT | TARGETED_EVENT => None,
            other => {
                debug!(kind = other, "Ignoring unknown group event");
                None
            }
        }
    }
}

/// Call-group lifecycle, invites, targeted relay and the per-room participant roster
pub struct CallSignalingEngine {
    registry: Arc<dyn GroupRegistry>,
    presence: Arc<dyn PresenceStore>,
    presence_timeout: Duration,
}

impl CallSignalingEngine {
    pub fn new(
        registry: Arc<dyn GroupRegistry>,
        presence: Arc<dyn PresenceStore>,
        presence_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            presence,
            presence_timeout,
        }
    }

    pub fn registry(&self) -> Arc<dyn GroupRegistry> {
        Arc::clone(&self.registry)
    }

    /// Join the connection's room-level group
    pub async fn join(&self, ctx: &CallContext) -> Result<(), RegistryError> {
        self.registry.join(&ctx.room_id, ctx.connection_id).await?;
        info!(connection_id = %ctx.connection_id, room_id = %ctx.room_id, "Joined call lobby");
        Ok(())
    }

    /// Start a call and tell only the creator its id
    #[instrument(skip(self, ctx, envelope), fields(connection_id = %ctx.connection_id))]
    pub async fn create_call(
        &self,
        ctx: &CallContext,
        envelope: &Envelope,
    ) -> Result<(), CommandError> {
        ctx.ensure_open()?;
        let target = envelope.payload.get("target").cloned().unwrap_or(Value::Null);
        let from = envelope.payload.get("from").cloned().unwrap_or(Value::Null);

        let session = CallSession::open(
            self.registry.as_ref(),
            ctx.connection_id,
            from.as_str().map(String::from),
            target.as_str().map(String::from),
        )
        .await
        .map_err(|_| CommandError::Disconnected)?;
        let call_id = session.call_id.clone();
        ctx.switch_session(session).await;

        let reply = json!({
            "type": "call-created",
            "target": target,
            "from": from,
            "callId": call_id,
        });
        self.registry
            .send_to(ctx.connection_id, Outbound::frame(reply.to_string()))
            .await;
        info!(call_id = %call_id, "Call created");

        self.announce_self(ctx).await;
        Ok(())
    }

    /// Offer the call to the room; only the named target accepts it
    #[instrument(skip(self, ctx, envelope), fields(connection_id = %ctx.connection_id))]
    pub async fn invite(&self, ctx: &CallContext, envelope: &Envelope) -> Result<(), CommandError> {
        ctx.ensure_open()?;
        if envelope.str_field("callId").is_none() {
            warn!(kind = %envelope.kind, "Invite without callId, dropping");
            return Ok(());
        }

        let delivered = self
            .registry
            .send(&ctx.room_id, Outbound::event(INVITE_EVENT, envelope.to_value()), None)
            .await;
        debug!(
            delivered = delivered,
            target = ?envelope.str_field("target"),
            "Invite broadcast"
        );
        Ok(())
    }

    /// Relay to the call group; each member shows it only if it is the target
    #[instrument(
        skip(self, ctx, envelope),
        fields(connection_id = %ctx.connection_id, kind = %envelope.kind)
    )]
    pub async fn relay_to_target(
        &self,
        ctx: &CallContext,
        envelope: &Envelope,
    ) -> Result<(), CommandError> {
        ctx.ensure_open()?;
        let call_id = ctx.call_id().await.ok_or(CommandError::NoActiveCall)?;
        self.registry
            .send(&call_id, Outbound::event(TARGETED_EVENT, envelope.to_value()), None)
            .await;
        Ok(())
    }

    /// Relay unchanged to every member of the current call
    #[instrument(
        skip(self, ctx, envelope),
        fields(connection_id = %ctx.connection_id, kind = %envelope.kind)
    )]
    pub async fn relay_to_call(
        &self,
        ctx: &CallContext,
        envelope: &Envelope,
    ) -> Result<(), CommandError> {
        ctx.ensure_open()?;
        let call_id = ctx.call_id().await.ok_or(CommandError::NoActiveCall)?;
        self.registry
            .send(&call_id, Outbound::frame(envelope.to_value().to_string()), None)
            .await;
        Ok(())
    }

    #[instrument(skip(self, ctx, envelope), fields(connection_id = %ctx.connection_id))]
    pub async fn participant_joined(
        &self,
        ctx: &CallContext,
        envelope: &Envelope,
    ) -> Result<(), CommandError> {
        ctx.ensure_open()?;
        self.relay_to_room(ctx, envelope).await;
        self.announce_self(ctx).await;
        Ok(())
    }

    /// Relay to the room, then drop this connection's user from the roster.
    /// A connection can only take itself off the roster.
    #[instrument(skip(self, ctx, envelope), fields(connection_id = %ctx.connection_id))]
    pub async fn participant_left(
        &self,
        ctx: &CallContext,
        envelope: &Envelope,
    ) -> Result<(), CommandError> {
        ctx.ensure_open()?;
        self.relay_to_room(ctx, envelope).await;

        let Some(username) = ctx.username() else {
            debug!("Anonymous participant left, roster unchanged");
            return Ok(());
        };
        if let Some(from) = envelope.str_field("from").filter(|from| *from != username) {
            warn!(
                from = %from,
                username = %username,
                "participant-left names another user, roster unchanged"
            );
            return Ok(());
        }

        ctx.in_presence.store(false, Ordering::SeqCst);
        self.best_effort(
            "remove_member",
            self.presence.remove_member(&ctx.room_id, username),
        )
        .await;
        Ok(())
    }

    /// Reply to the requester with the room's roster
    #[instrument(
        skip(self, ctx),
        fields(connection_id = %ctx.connection_id, room_id = %ctx.room_id)
    )]
    pub async fn get_participants(&self, ctx: &CallContext) -> Result<(), CommandError> {
        ctx.ensure_open()?;
        let members = match tokio::time::timeout(
            self.presence_timeout,
            self.presence.members_of(&ctx.room_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::PresenceError("presence lookup timed out".into())),
        };

        let reply = match &members {
            Ok(members) => json!({"type": "participants", "participants": members}),
            Err(e) => {
                warn!(error = %e, "Participant lookup failed");
                json!({"type": "error", "command": "get-participants", "message": e.to_string()})
            }
        };
        self.registry
            .send_to(ctx.connection_id, Outbound::frame(reply.to_string()))
            .await;

        members.map(|_| ()).map_err(CommandError::Store)
    }

    /// Leave the current call and the roster
    #[instrument(skip(self, ctx), fields(connection_id = %ctx.connection_id))]
    pub async fn leave_call(&self, ctx: &CallContext) -> Result<(), CommandError> {
        ctx.ensure_open()?;
        let session = ctx.session.lock().await.take();
        let session = session.ok_or(CommandError::NoActiveCall)?;
        let call_id = session.call_id.clone();
        session.close(self.registry.as_ref(), ctx.connection_id).await;
        info!(call_id = %call_id, "Left call");

        self.withdraw_self(ctx).await;
        Ok(())
    }

    /// Clean up after the connection is gone; group membership is already released
    pub async fn teardown(&self, ctx: &CallContext) {
        ctx.close();
        ctx.session.lock().await.take();
        self.withdraw_self(ctx).await;
    }

    async fn relay_to_room(&self, ctx: &CallContext, envelope: &Envelope) {
        let delivered = self
            .registry
            .send(&ctx.room_id, Outbound::frame(envelope.to_value().to_string()), None)
            .await;
        debug!(kind = %envelope.kind, delivered = delivered, "Relayed to room");
    }

    async fn announce_self(&self, ctx: &CallContext) {
        let Some(username) = ctx.username() else {
            return;
        };
        ctx.in_presence.store(true, Ordering::SeqCst);
        self.best_effort("add_member", self.presence.add_member(&ctx.room_id, username))
            .await;

        // Teardown may have run while the add was in flight
        if ctx.is_closed() {
            self.best_effort(
                "remove_member",
                self.presence.remove_member(&ctx.room_id, username),
            )
            .await;
        }
    }

    async fn withdraw_self(&self, ctx: &CallContext) {
        if !ctx.in_presence.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(username) = ctx.username() {
            self.best_effort(
                "remove_member",
                self.presence.remove_member(&ctx.room_id, username),
            )
            .await;
        }
    }

    /// Run a presence mutation without letting it fail or stall the relay
    async fn best_effort<F>(&self, operation: &'static str, call: F)
    where
        F: Future<Output = Result<(), AppError>>,
    {
        match tokio::time::timeout(self.presence_timeout, call).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(operation = operation, error = %e, "Presence update failed"),
            Err(_) => warn!(
                operation = operation,
                timeout_ms = self.presence_timeout.as_millis() as u64,
                "Presence update timed out"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::presence::test_support::{FailingPresenceStore, StalledPresenceStore};
    use crate::call::presence::InMemoryPresenceStore;
    use crate::websockets::InMemoryGroupRegistry;
    use std::collections::BTreeSet;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    const LOBBY: &str = "general_group";

    struct Peer {
        ctx: CallContext,
        rx: mpsc::UnboundedReceiver<Outbound>,
    }

    impl Peer {
        /// What the client would see: frames as-is, events as the context filters them
        async fn received(&mut self) -> Vec<Value> {
            let mut seen = vec![];
            while let Ok(outbound) = self.rx.try_recv() {
                let text = match outbound {
                    Outbound::Frame(text) => Some(text.to_string()),
                    Outbound::Event(event) => self.ctx.on_group_event(&event).await,
                };
                if let Some(text) = text {
                    seen.push(serde_json::from_str(&text).unwrap());
                }
            }
            seen
        }
    }

    fn engine_with(
        presence: Arc<dyn PresenceStore>,
        timeout: Duration,
    ) -> (CallSignalingEngine, Arc<InMemoryGroupRegistry>) {
        let registry = Arc::new(InMemoryGroupRegistry::new());
        let engine = CallSignalingEngine::new(registry.clone(), presence, timeout);
        (engine, registry)
    }

    async fn peer(engine: &CallSignalingEngine, name: &str, user_id: i64) -> Peer {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let registry = engine.registry();
        registry.register(id, tx).await;
        let ctx = CallContext::new(id, Some(Identity::new(user_id, name)), LOBBY, registry);
        engine.join(&ctx).await.unwrap();
        Peer { ctx, rx }
    }

    fn envelope(value: Value) -> Envelope {
        Envelope::parse(&value.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_create_invite_ice_candidate_reaches_target_only() {
        let presence = Arc::new(InMemoryPresenceStore::new());
        let (engine, registry) = engine_with(presence.clone(), Duration::from_millis(500));
        let mut a = peer(&engine, "A", 1).await;
        let mut b = peer(&engine, "B", 2).await;
        let mut c = peer(&engine, "C", 3).await;

        engine
            .create_call(
                &a.ctx,
                &envelope(json!({"type": "create-call", "target": "B", "from": "A"})),
            )
            .await
            .unwrap();
        let created = a.received().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0]["type"], "call-created");
        assert_eq!(created[0]["target"], "B");
        assert_eq!(created[0]["from"], "A");
        let call_id = created[0]["callId"].as_str().unwrap().to_string();
        assert!(Uuid::parse_str(&call_id).is_ok());
        assert!(b.received().await.is_empty());

        engine
            .invite(
                &a.ctx,
                &envelope(json!({
                    "type": "call-invite",
                    "target": "B",
                    "from": "A",
                    "callId": call_id,
                    "sdp": "offer",
                })),
            )
            .await
            .unwrap();
        assert!(a.received().await.is_empty());
        let invite = b.received().await;
        assert_eq!(invite.len(), 1);
        assert_eq!(invite[0]["sdp"], "offer");
        assert!(c.received().await.is_empty());
        assert_eq!(b.ctx.call_id().await, Some(call_id.clone()));
        assert_eq!(registry.members(&call_id).await.len(), 2);

        engine
            .relay_to_target(
                &a.ctx,
                &envelope(json!({
                    "type": "ice-candidate",
                    "target": "B",
                    "from": "A",
                    "candidate": {"sdpMid": "0"},
                })),
            )
            .await
            .unwrap();
        let candidates = b.received().await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0]["candidate"]["sdpMid"], "0");
        assert!(a.received().await.is_empty());
        assert!(c.received().await.is_empty());

        assert_eq!(
            presence.members_of(LOBBY).await.unwrap(),
            BTreeSet::from(["A".to_string()])
        );
    }

    #[tokio::test]
    async fn test_invite_without_call_id_is_dropped() {
        let (engine, _) = engine_with(
            Arc::new(InMemoryPresenceStore::new()),
            Duration::from_millis(500),
        );
        let a = peer(&engine, "A", 1).await;
        let mut b = peer(&engine, "B", 2).await;

        engine
            .invite(&a.ctx, &envelope(json!({"type": "add-participant", "target": "B"})))
            .await
            .unwrap();

        assert!(b.received().await.is_empty());
        assert_eq!(b.ctx.call_id().await, None);
    }

    #[tokio::test]
    async fn test_targeted_relay_without_call_is_noop() {
        let (engine, _) = engine_with(
            Arc::new(InMemoryPresenceStore::new()),
            Duration::from_millis(500),
        );
        let a = peer(&engine, "A", 1).await;
        let mut b = peer(&engine, "B", 2).await;

        let result = engine
            .relay_to_target(&a.ctx, &envelope(json!({"type": "call-answer", "target": "B"})))
            .await;

        assert!(matches!(result, Err(CommandError::NoActiveCall)));
        assert!(b.received().await.is_empty());
    }

    #[tokio::test]
    async fn test_participants_after_two_joins_and_one_leave() {
        let (engine, _) = engine_with(
            Arc::new(InMemoryPresenceStore::new()),
            Duration::from_millis(500),
        );
        let mut a = peer(&engine, "alice", 1).await;
        let mut b = peer(&engine, "bob", 2).await;

        engine
            .participant_joined(
                &a.ctx,
                &envelope(json!({"type": "participant-joined", "from": "alice"})),
            )
            .await
            .unwrap();
        engine
            .participant_joined(
                &b.ctx,
                &envelope(json!({"type": "participant-joined", "from": "bob"})),
            )
            .await
            .unwrap();
        engine
            .participant_left(
                &a.ctx,
                &envelope(json!({"type": "participant-left", "from": "alice"})),
            )
            .await
            .unwrap();

        // Room-level notices reach everyone, sender included
        assert_eq!(b.received().await.len(), 3);
        a.received().await;

        engine.get_participants(&a.ctx).await.unwrap();
        assert_eq!(
            a.received().await,
            vec![json!({"type": "participants", "participants": ["bob"]})]
        );
        assert!(b.received().await.is_empty());
        assert!(!a.ctx.in_presence());
        assert!(b.ctx.in_presence());
    }

    #[tokio::test]
    async fn test_presence_failure_does_not_block_relay() {
        let (engine, _) = engine_with(Arc::new(FailingPresenceStore), Duration::from_millis(500));
        let a = peer(&engine, "A", 1).await;
        let mut b = peer(&engine, "B", 2).await;

        engine
            .participant_joined(
                &a.ctx,
                &envelope(json!({"type": "participant-joined", "from": "A"})),
            )
            .await
            .unwrap();
        assert_eq!(b.received().await[0]["type"], "participant-joined");

        let result = engine.get_participants(&b.ctx).await;
        assert!(matches!(result, Err(CommandError::Store(_))));
        let reply = b.received().await;
        assert_eq!(reply[0]["type"], "error");
        assert_eq!(reply[0]["command"], "get-participants");
    }

    #[tokio::test]
    async fn test_stalled_presence_is_bounded() {
        let (engine, _) = engine_with(Arc::new(StalledPresenceStore), Duration::from_millis(20));
        let mut a = peer(&engine, "A", 1).await;

        tokio::time::timeout(
            Duration::from_secs(5),
            engine.create_call(&a.ctx, &envelope(json!({"type": "create-call", "target": "B"}))),
        )
        .await
        .expect("create-call must not wait on presence")
        .unwrap();

        assert_eq!(a.received().await[0]["type"], "call-created");
    }

    #[tokio::test]
    async fn test_leave_call_and_teardown_release_presence() {
        let presence = Arc::new(InMemoryPresenceStore::new());
        let (engine, registry) = engine_with(presence.clone(), Duration::from_millis(500));
        let a = peer(&engine, "A", 1).await;
        let b = peer(&engine, "B", 2).await;

        engine
            .create_call(&a.ctx, &envelope(json!({"type": "create-call"})))
            .await
            .unwrap();
        let call_id = a.ctx.call_id().await.unwrap();
        engine.leave_call(&a.ctx).await.unwrap();
        assert!(registry.members(&call_id).await.is_empty());
        assert!(!presence.members_of(LOBBY).await.unwrap().contains("A"));

        engine
            .participant_joined(&b.ctx, &envelope(json!({"type": "participant-joined"})))
            .await
            .unwrap();
        registry.leave_all(b.ctx.connection_id).await;
        engine.teardown(&b.ctx).await;
        assert!(presence.members_of(LOBBY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_connection_is_never_a_target() {
        let (engine, registry) = engine_with(
            Arc::new(InMemoryPresenceStore::new()),
            Duration::from_millis(500),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        registry.register(id, tx).await;
        let mut anon = Peer {
            ctx: CallContext::new(id, None, LOBBY, engine.registry()),
            rx,
        };
        engine.join(&anon.ctx).await.unwrap();
        let a = peer(&engine, "A", 1).await;

        engine
            .invite(&a.ctx, &envelope(json!({"type": "call-invite", "callId": "x"})))
            .await
            .unwrap();

        assert!(anon.received().await.is_empty());
        assert_eq!(anon.ctx.call_id().await, None);
    }

    #[tokio::test]
    async fn test_commands_after_teardown_are_noops() {
        let presence = Arc::new(InMemoryPresenceStore::new());
        let (engine, registry) = engine_with(presence.clone(), Duration::from_millis(500));
        let a = peer(&engine, "A", 1).await;
        let mut b = peer(&engine, "B", 2).await;

        registry.leave_all(a.ctx.connection_id).await;
        engine.teardown(&a.ctx).await;

        let joined = engine
            .participant_joined(
                &a.ctx,
                &envelope(json!({"type": "participant-joined", "from": "A"})),
            )
            .await;
        let invited = engine
            .invite(
                &a.ctx,
                &envelope(json!({"type": "call-invite", "target": "B", "callId": "late"})),
            )
            .await;
        let left = engine
            .participant_left(
                &a.ctx,
                &envelope(json!({"type": "participant-left", "from": "A"})),
            )
            .await;

        assert!(matches!(joined, Err(CommandError::Disconnected)));
        assert!(matches!(invited, Err(CommandError::Disconnected)));
        assert!(matches!(left, Err(CommandError::Disconnected)));
        assert!(b.received().await.is_empty());
        assert!(presence.members_of(LOBBY).await.unwrap().is_empty());
        assert!(!a.ctx.in_presence());
    }

    #[tokio::test]
    async fn test_participant_left_cannot_remove_someone_else() {
        let presence = Arc::new(InMemoryPresenceStore::new());
        let (engine, _) = engine_with(presence.clone(), Duration::from_millis(500));
        let a = peer(&engine, "alice", 1).await;
        let mut b = peer(&engine, "bob", 2).await;

        engine
            .participant_joined(
                &b.ctx,
                &envelope(json!({"type": "participant-joined", "from": "bob"})),
            )
            .await
            .unwrap();
        engine
            .participant_left(
                &a.ctx,
                &envelope(json!({"type": "participant-left", "from": "bob"})),
            )
            .await
            .unwrap();

        assert_eq!(
            presence.members_of(LOBBY).await.unwrap(),
            BTreeSet::from(["bob".to_string()])
        );
        assert!(b.ctx.in_presence());
        assert_eq!(b.received().await.len(), 2);
    }
}
