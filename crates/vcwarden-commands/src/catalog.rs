//! Platform-neutral command catalog.

use serde::Serialize;
use vcwarden_core::{ChannelKind, VcWardenConfig};

pub const NIGHT_COMMAND: &str = "night";
pub const LIST_VOICE_COMMAND: &str = "listvc";
pub const ADD_ROLE_COMMAND: &str = "addrole";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `CommandOptionKind` values.
pub enum CommandOptionKind {
    String,
    Channel,
    Boolean,
    Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandChoice {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOptionSpec {
    pub name: String,
    pub description: String,
    pub kind: CommandOptionKind,
    pub required: bool,
    pub choices: Vec<CommandChoice>,
    /// Restricts channel options to these kinds; empty means any.
    pub channel_kinds: Vec<ChannelKind>,
}

impl CommandOptionSpec {
    fn new(name: &str, description: &str, kind: CommandOptionKind, required: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            required,
            choices: Vec::new(),
            channel_kinds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOptionSpec>,
    /// Hidden from members without explicit permission in the client UI.
    pub staff_only: bool,
}

fn night_spec() -> CommandSpec {
    let zone_choices = [
        ("Eastern (EST)", "EST"),
        ("Central (CST)", "CST"),
        ("Mountain (MST)", "MST"),
        ("Pacific (PST)", "PST"),
    ]
    .into_iter()
    .map(|(name, value)| CommandChoice {
        name: name.to_string(),
        value: value.to_string(),
    })
    .collect();
    CommandSpec {
        name: NIGHT_COMMAND.to_string(),
        description: "Check night cycle information".to_string(),
        options: vec![
            CommandOptionSpec::new(
                "time",
                "Check a specific time (e.g., 8:00 PM or 2000)",
                CommandOptionKind::String,
                false,
            ),
            CommandOptionSpec::new(
                "date",
                "Specific date (MM/DD/YY)",
                CommandOptionKind::String,
                false,
            ),
            CommandOptionSpec {
                choices: zone_choices,
                ..CommandOptionSpec::new(
                    "timezone",
                    "US timezone (EST, CST, MST, PST)",
                    CommandOptionKind::String,
                    false,
                )
            },
        ],
        staff_only: false,
    }
}

fn list_voice_spec() -> CommandSpec {
    CommandSpec {
        name: LIST_VOICE_COMMAND.to_string(),
        description: "List all users in a voice channel".to_string(),
        options: vec![CommandOptionSpec {
            channel_kinds: vec![ChannelKind::Voice, ChannelKind::Stage],
            ..CommandOptionSpec::new(
                "channel",
                "The voice channel to list users from",
                CommandOptionKind::Channel,
                true,
            )
        }],
        staff_only: true,
    }
}

fn add_role_spec() -> CommandSpec {
    CommandSpec {
        name: ADD_ROLE_COMMAND.to_string(),
        description: "Add or remove a role for every member holding another role".to_string(),
        options: vec![
            CommandOptionSpec::new(
                "filter_role",
                "Members with this role are updated",
                CommandOptionKind::Role,
                true,
            ),
            CommandOptionSpec::new(
                "target_role",
                "The role to add or remove",
                CommandOptionKind::Role,
                true,
            ),
            CommandOptionSpec::new(
                "remove",
                "Remove the target role instead of adding it",
                CommandOptionKind::Boolean,
                false,
            ),
        ],
        staff_only: true,
    }
}

/// Built-in commands followed by one command per configured move route.
pub fn command_catalog(config: &VcWardenConfig) -> Vec<CommandSpec> {
    let mut catalog = vec![night_spec(), list_voice_spec(), add_role_spec()];
    catalog.extend(config.move_routes.iter().map(|route| CommandSpec {
        name: route.command.clone(),
        description: route.description.clone(),
        options: Vec::new(),
        staff_only: true,
    }));
    catalog
}
