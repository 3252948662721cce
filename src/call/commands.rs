use async_trait::async_trait;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, IntoStaticStr};

use super::engine::{CallContext, CallSignalingEngine};
use crate::command::{CommandError, CommandHandler, CommandRouter, Envelope};

/// Inbound signaling command types, by their wire `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum CallCommandKind {
    CreateCall,
    CallInvite,
    AddParticipant,
    IceCandidate,
    CallAnswer,
    CallRejected,
    ParticipantJoined,
    ParticipantLeft,
    CallParticipants,
    CallCreated,
    GetParticipants,
    LeaveCall,
}

impl CallCommandKind {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Routes one signaling command kind to the matching engine operation
struct SignalingCommand {
    kind: CallCommandKind,
    engine: Arc<CallSignalingEngine>,
}

#[async_trait]
impl CommandHandler<CallContext> for SignalingCommand {
    async fn execute(&self, ctx: &CallContext, envelope: &Envelope) -> Result<(), CommandError> {
        use CallCommandKind::*;

        match self.kind {
            CreateCall => self.engine.create_call(ctx, envelope).await,
            CallInvite | AddParticipant => self.engine.invite(ctx, envelope).await,
            IceCandidate | CallAnswer | CallRejected => {
                self.engine.relay_to_target(ctx, envelope).await
            }
            ParticipantJoined => self.engine.participant_joined(ctx, envelope).await,
            ParticipantLeft => self.engine.participant_left(ctx, envelope).await,
            CallParticipants | CallCreated => self.engine.relay_to_call(ctx, envelope).await,
            GetParticipants => self.engine.get_participants(ctx).await,
            LeaveCall => self.engine.leave_call(ctx).await,
        }
    }

    fn name(&self) -> &'static str {
        match self.kind {
            CallCommandKind::CreateCall => "CreateCallCommand",
            CallCommandKind::CallInvite | CallCommandKind::AddParticipant => "CallInviteCommand",
            CallCommandKind::IceCandidate
            | CallCommandKind::CallAnswer
            | CallCommandKind::CallRejected => "TargetedRelayCommand",
            CallCommandKind::ParticipantJoined => "ParticipantJoinedCommand",
            CallCommandKind::ParticipantLeft => "ParticipantLeftCommand",
            CallCommandKind::CallParticipants | CallCommandKind::CallCreated => {
                "CallRelayCommand"
            }
            CallCommandKind::GetParticipants => "GetParticipantsCommand",
            CallCommandKind::LeaveCall => "LeaveCallCommand",
        }
    }
}

/// Router with a handler for every signaling command type
pub fn call_command_router(engine: Arc<CallSignalingEngine>) -> CommandRouter<CallContext> {
    let mut router = CommandRouter::new();
    for kind in CallCommandKind::iter() {
        router.register(
            kind.as_str(),
            Arc::new(SignalingCommand {
                kind,
                engine: Arc::clone(&engine),
            }),
        );
    }
    router
}
