//! Slash command catalog registration.

use anyhow::{Context, Result};
use serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption, Http, Permissions};
use tracing::info;
use vcwarden_commands::{CommandOptionKind, CommandOptionSpec, CommandSpec};
use vcwarden_core::GuildId;

use crate::{channel_type, discord_guild_id};

fn option_type(kind: CommandOptionKind) -> CommandOptionType {
    match kind {
        CommandOptionKind::String => CommandOptionType::String,
        CommandOptionKind::Channel => CommandOptionType::Channel,
        CommandOptionKind::Boolean => CommandOptionType::Boolean,
        CommandOptionKind::Role => CommandOptionType::Role,
    }
}

fn create_option(spec: &CommandOptionSpec) -> CreateCommandOption {
    let option = CreateCommandOption::new(option_type(spec.kind), &spec.name, &spec.description)
        .required(spec.required);
    let option = spec.choices.iter().fold(option, |option, choice| {
        option.add_string_choice(&choice.name, &choice.value)
    });
    let channel_types = spec
        .channel_kinds
        .iter()
        .filter_map(|kind| channel_type(*kind))
        .collect::<Vec<_>>();
    if channel_types.is_empty() {
        option
    } else {
        option.channel_types(channel_types)
    }
}

pub fn create_command(spec: &CommandSpec) -> CreateCommand {
    let command = spec
        .options
        .iter()
        .fold(CreateCommand::new(&spec.name).description(&spec.description), |command, option| {
            command.add_option(create_option(option))
        });
    if spec.staff_only {
        command.default_member_permissions(Permissions::empty())
    } else {
        command
    }
}

/// Replaces the guild's slash commands with `catalog`.
///
/// `http` must carry the application id (set automatically once the gateway is
/// ready, or with [`Http::set_application_id`]).
pub async fn register_guild_commands(
    http: &Http,
    guild_id: GuildId,
    catalog: &[CommandSpec],
) -> Result<usize> {
    let guild = discord_guild_id(guild_id).context("invalid guild id")?;
    let commands = catalog.iter().map(create_command).collect::<Vec<_>>();
    let registered = guild
        .set_commands(http, commands)
        .await
        .with_context(|| format!("failed to register commands for guild {guild_id}"))?;
    info!(guild_id = %guild_id, count = registered.len(), "slash commands registered");
    Ok(registered.len())
}
