//! Routes a command request through authorization, cooldown, and delivery.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use vcwarden_core::{
    current_unix_timestamp_ms, local_datetime, GuildTransport, VcWardenConfig, VcWardenError,
};

use crate::{
    add_role_command, list_voice_command, move_route_command, night_command, CommandAccessPolicy,
    CommandReply, CommandRequest, CommandResponder, ADD_ROLE_COMMAND, LIST_VOICE_COMMAND,
    NIGHT_COMMAND,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
/// Enumerates supported `DispatchOutcome` values.
pub enum DispatchOutcome {
    /// Not a vcwarden command; nothing was sent.
    Ignored,
    Completed,
    Rejected { message: String },
    Failed { message: String },
}

pub struct CommandDispatcher {
    transport: Arc<dyn GuildTransport>,
    config: Arc<VcWardenConfig>,
    access: CommandAccessPolicy,
}

impl CommandDispatcher {
    pub fn new(transport: Arc<dyn GuildTransport>, config: Arc<VcWardenConfig>) -> Self {
        let access = CommandAccessPolicy::new(config.commands.clone());
        Self {
            transport,
            config,
            access,
        }
    }

    fn is_known(&self, name: &str) -> bool {
        matches!(name, NIGHT_COMMAND | LIST_VOICE_COMMAND | ADD_ROLE_COMMAND)
            || self.config.move_routes.iter().any(|route| route.command == name)
    }

    pub async fn dispatch(
        &self,
        request: &CommandRequest,
        responder: &dyn CommandResponder,
    ) -> DispatchOutcome {
        self.dispatch_at(request, responder, current_unix_timestamp_ms())
            .await
    }

    /// Same as [`Self::dispatch`] with an explicit clock reading.
    pub async fn dispatch_at(
        &self,
        request: &CommandRequest,
        responder: &dyn CommandResponder,
        now_ms: u64,
    ) -> DispatchOutcome {
        if !self.is_known(&request.name) {
            debug!(command = %request.name, "ignoring unknown command");
            return DispatchOutcome::Ignored;
        }

        let admitted = self.access.authorize(&request.caller).and_then(|()| {
            self.access
                .check_cooldown(&request.caller, &request.name, now_ms)
        });
        if let Err(error) = admitted {
            let message = error.user_message();
            info!(
                command = %request.name,
                user_id = %request.caller.user_id,
                reason = %message,
                "command rejected"
            );
            if let Err(error) = responder.reply_ephemeral(format!("❌ {message}")).await {
                warn!(command = %request.name, %error, "rejection reply failed");
            }
            return DispatchOutcome::Rejected { message };
        }

        if let Err(error) = responder.defer().await {
            warn!(command = %request.name, %error, "command defer failed");
            return DispatchOutcome::Failed {
                message: VcWardenError::from(error).user_message(),
            };
        }

        match self.execute(request, now_ms).await {
            Ok(reply) => {
                if let Err(error) = deliver(responder, reply).await {
                    warn!(command = %request.name, %error, "command reply delivery failed");
                }
                info!(
                    command = %request.name,
                    user_id = %request.caller.user_id,
                    "command completed"
                );
                DispatchOutcome::Completed
            }
            Err(error) => {
                let message = error.user_message();
                if error.is_caller_error() {
                    info!(command = %request.name, %error, "command refused");
                } else {
                    warn!(command = %request.name, %error, "command failed");
                }
                if let Err(error) = responder.edit_reply(format!("❌ {message}")).await {
                    warn!(command = %request.name, %error, "error reply failed");
                }
                DispatchOutcome::Failed { message }
            }
        }
    }

    async fn execute(
        &self,
        request: &CommandRequest,
        now_ms: u64,
    ) -> Result<CommandReply, VcWardenError> {
        let transport = self.transport.as_ref();
        match request.name.as_str() {
            NIGHT_COMMAND => {
                let now = local_datetime(now_ms, self.config.timezone).ok_or_else(|| {
                    VcWardenError::validation(format!("timestamp {now_ms} is out of range"))
                })?;
                night_command(request, &self.config.night_cycle, now)
            }
            LIST_VOICE_COMMAND => list_voice_command(request, transport).await,
            ADD_ROLE_COMMAND => add_role_command(request, transport).await,
            name => {
                let route = self
                    .config
                    .move_routes
                    .iter()
                    .find(|route| route.command == name)
                    .ok_or_else(|| VcWardenError::validation(format!("Unknown command '{name}'")))?;
                move_route_command(route, transport).await
            }
        }
    }
}

async fn deliver(
    responder: &dyn CommandResponder,
    reply: CommandReply,
) -> vcwarden_core::TransportResult<()> {
    match reply {
        CommandReply::Text(content) => responder.edit_reply(content).await,
        CommandReply::Card(card) => responder.edit_reply_card(card).await,
        CommandReply::Chunks(chunks) => {
            let mut chunks = chunks.into_iter();
            if let Some(first) = chunks.next() {
                responder.edit_reply(first).await?;
            }
            for chunk in chunks {
                responder.follow_up(chunk).await?;
            }
            Ok(())
        }
    }
}
