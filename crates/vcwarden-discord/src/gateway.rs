//! Gateway event routing and the bot run loop.

use std::sync::{Arc, OnceLock};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::all::{
    ActivityData, Client, CommandInteraction, ComponentInteraction, Context,
    CreateInteractionResponse, CreateInteractionResponseMessage, EventHandler, GatewayIntents,
    Interaction, Ready, ResolvedValue, VoiceState,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use vcwarden_commands::{
    CommandCaller, CommandDispatcher, CommandOptionValue, CommandRequest, DispatchOutcome,
};
use vcwarden_core::{ChannelId, GuildIdentity, GuildTransport, UserId, VcWardenConfig};
use vcwarden_scheduler::{configured_controllers, ControllerSet, SystemClock};
use vcwarden_voice::{
    reconcile_ownership, ChannelLifecycleManager, ControlAction, ControlSurfaceProtocol,
    LocationChange, OwnershipRegistry,
};

use crate::{channel_id, role_id, user_id, InteractionResponder, SerenityTransport};

/// Location change for one voice state update, if the member actually moved.
pub fn location_change(
    member: UserId,
    old_location: Option<ChannelId>,
    new_location: Option<ChannelId>,
) -> Option<LocationChange> {
    if old_location == new_location {
        return None;
    }
    Some(LocationChange {
        member,
        old_location,
        new_location,
    })
}

pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS | GatewayIntents::GUILD_VOICE_STATES
}

/// Services that need the bot's own identity, built on the first `ready`.
struct GatewayRuntime {
    transport: Arc<dyn GuildTransport>,
    lifecycle: ChannelLifecycleManager,
    surfaces: Arc<ControlSurfaceProtocol>,
    dispatcher: CommandDispatcher,
}

/// Routes serenity events to the voice lifecycle, control surfaces and commands.
pub struct VcWardenHandler {
    config: Arc<VcWardenConfig>,
    runtime: OnceLock<GatewayRuntime>,
    controllers: Mutex<Option<ControllerSet>>,
}

impl VcWardenHandler {
    pub fn new(config: Arc<VcWardenConfig>) -> Self {
        Self {
            config,
            runtime: OnceLock::new(),
            controllers: Mutex::new(None),
        }
    }

    fn runtime(&self) -> Option<&GatewayRuntime> {
        self.runtime.get()
    }

    fn build_runtime(&self, ctx: &Context, ready: &Ready) -> Result<GatewayRuntime> {
        let identity = GuildIdentity {
            guild_id: self.config.guild_id,
            bot_user_id: user_id(ready.user.id),
        };
        let transport: Arc<dyn GuildTransport> = Arc::new(
            SerenityTransport::new(ctx.http.clone(), ctx.cache.clone(), identity)
                .context("failed to build guild transport")?,
        );
        let registry = Arc::new(self.config.registry.clone());
        let ownership = Arc::new(OwnershipRegistry::new());
        let surfaces = Arc::new(ControlSurfaceProtocol::new(
            transport.clone(),
            registry.clone(),
            ownership.clone(),
            self.config.channel_creation.control_surface_lookback,
        ));
        let lifecycle = ChannelLifecycleManager::new(
            transport.clone(),
            registry,
            ownership,
            surfaces.clone(),
            self.config.channel_creation.clone(),
        );
        let dispatcher = CommandDispatcher::new(transport.clone(), self.config.clone());
        Ok(GatewayRuntime {
            transport,
            lifecycle,
            surfaces,
            dispatcher,
        })
    }

    /// Stops the window controllers, if they were started.
    pub async fn shutdown(&self) {
        let Some(controllers) = self.controllers.lock().await.take() else {
            return;
        };
        for (controller_id, summary) in controllers.shutdown().await {
            info!(
                controller_id = %controller_id,
                evaluations = summary.evaluations,
                transitions = summary.transitions,
                failed_records = summary.failed_records,
                "window controller summary"
            );
        }
    }

    async fn handle_command(
        &self,
        ctx: &Context,
        runtime: &GatewayRuntime,
        command: CommandInteraction,
    ) {
        let request = command_request(&command);
        let responder = InteractionResponder::new(ctx.http.clone(), command);
        match runtime.dispatcher.dispatch(&request, &responder).await {
            DispatchOutcome::Ignored | DispatchOutcome::Completed => {}
            DispatchOutcome::Rejected { message } => {
                debug!(command = %request.name, %message, "command rejected");
            }
            DispatchOutcome::Failed { message } => {
                warn!(command = %request.name, %message, "command failed");
            }
        }
    }

    async fn handle_component(
        &self,
        ctx: &Context,
        runtime: &GatewayRuntime,
        component: ComponentInteraction,
    ) {
        let Some((action, channel)) = ControlAction::parse_custom_id(&component.data.custom_id)
        else {
            debug!(custom_id = %component.data.custom_id, "ignoring unknown component");
            return;
        };
        let requester = user_id(component.user.id);
        let content = match runtime
            .surfaces
            .handle_action(action, channel, requester)
            .await
        {
            Ok(outcome) => outcome.confirmation,
            Err(error) => {
                debug!(channel_id = %channel, requester = %requester, %error, "control action refused");
                format!("❌ {}", error.user_message())
            }
        };
        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(content)
                .ephemeral(true),
        );
        if let Err(error) = component.create_response(&ctx.http, response).await {
            warn!(channel_id = %channel, %error, "failed to answer control action");
        }
    }
}

/// Typed request for a slash command interaction.
fn command_request(command: &CommandInteraction) -> CommandRequest {
    let caller = CommandCaller {
        user_id: user_id(command.user.id),
        role_ids: command
            .member
            .as_ref()
            .map(|member| member.roles.iter().copied().map(role_id).collect())
            .unwrap_or_default(),
    };
    command
        .data
        .options()
        .into_iter()
        .fold(
            CommandRequest::new(command.data.name.clone(), caller),
            |request, option| {
                let value = match option.value {
                    ResolvedValue::String(value) => CommandOptionValue::String(value.to_string()),
                    ResolvedValue::Boolean(value) => CommandOptionValue::Boolean(value),
                    ResolvedValue::Channel(channel) => {
                        CommandOptionValue::Channel(channel_id(channel.id))
                    }
                    ResolvedValue::Role(role) => CommandOptionValue::Role(role_id(role.id)),
                    _ => return request,
                };
                request.with_option(option.name, value)
            },
        )
}

#[async_trait]
impl EventHandler for VcWardenHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, "gateway ready");
        if let Some(activity) = &self.config.presence_activity {
            ctx.set_activity(Some(ActivityData::playing(activity.clone())));
        }

        if self.runtime.get().is_none() {
            match self.build_runtime(&ctx, &ready) {
                Ok(runtime) => {
                    let _ = self.runtime.set(runtime);
                }
                Err(error) => {
                    error!(error = %format!("{error:#}"), "failed to initialize gateway runtime");
                    return;
                }
            }
        }
        let Some(runtime) = self.runtime() else {
            return;
        };

        let reconcile = reconcile_ownership(&runtime.surfaces).await;
        info!(
            scanned = reconcile.scanned,
            recovered = reconcile.recovered,
            unmarked = reconcile.unmarked,
            failed = reconcile.failed,
            "ownership reconciled"
        );

        let mut controllers = self.controllers.lock().await;
        if controllers.is_none() {
            let set = ControllerSet::spawn(configured_controllers(
                &self.config,
                runtime.transport.clone(),
                Arc::new(SystemClock),
            ));
            info!(count = set.len(), "window controllers started");
            *controllers = Some(set);
        }
    }

    async fn voice_state_update(&self, _ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(runtime) = self.runtime() else {
            return;
        };
        if new.guild_id.map(|guild| guild.get()) != Some(self.config.guild_id.0) {
            return;
        }
        let Some(change) = location_change(
            user_id(new.user_id),
            old.and_then(|state| state.channel_id).map(channel_id),
            new.channel_id.map(channel_id),
        ) else {
            return;
        };
        match runtime.lifecycle.handle_location_change(change).await {
            Ok(report) => debug!(member = %change.member, ?report, "location change handled"),
            Err(error) => warn!(member = %change.member, %error, "location change failed"),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Some(runtime) = self.runtime() else {
            return;
        };
        match interaction {
            Interaction::Command(command) => self.handle_command(&ctx, runtime, command).await,
            Interaction::Component(component) => {
                self.handle_component(&ctx, runtime, component).await
            }
            _ => {}
        }
    }
}

/// Connects to the gateway and runs until Ctrl-C or a fatal client error.
pub async fn run_discord_gateway(config: VcWardenConfig, token: &str) -> Result<()> {
    let handler = Arc::new(VcWardenHandler::new(Arc::new(config)));
    let mut client = Client::builder(token, gateway_intents())
        .event_handler_arc(handler.clone())
        .await
        .context("failed to build discord client")?;
    let shard_manager = client.shard_manager.clone();

    let outcome = tokio::select! {
        result = client.start() => result.context("discord client stopped"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("shutdown requested");
            shard_manager.shutdown_all().await;
            Ok(())
        }
    };
    handler.shutdown().await;
    outcome
}
