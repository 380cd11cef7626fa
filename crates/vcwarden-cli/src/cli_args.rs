use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "vcwarden",
    about = "Ephemeral voice channel and mention window bot for one Discord guild",
    version
)]
/// Public struct `Cli` used across vcwarden components.
pub struct Cli {
    #[arg(
        long,
        env = "VCWARDEN_CONFIG",
        default_value = "vcwarden.json",
        help = "Path to the vcwarden JSON config file"
    )]
    pub config: PathBuf,

    #[arg(
        long = "discord-token",
        env = "DISCORD_TOKEN",
        hide_env_values = true,
        help = "Bot token used for the gateway connection and command registration"
    )]
    pub discord_token: Option<String>,

    #[arg(
        long = "check-config",
        default_value_t = false,
        help = "Validate the config, print a summary with current window phases, and exit"
    )]
    pub check_config: bool,

    #[arg(
        long = "register-commands",
        default_value_t = false,
        conflicts_with = "check_config",
        help = "Register the slash command catalog for the configured guild and exit"
    )]
    pub register_commands: bool,

    #[arg(
        long = "log-filter",
        env = "VCWARDEN_LOG",
        help = "tracing filter directives; overrides RUST_LOG"
    )]
    pub log_filter: Option<String>,
}

impl Cli {
    pub fn require_token(&self) -> anyhow::Result<&str> {
        self.discord_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| anyhow::anyhow!("--discord-token (or DISCORD_TOKEN) is required"))
    }
}
