mod bootstrap_helpers;
mod cli_args;
mod config_report;

use anyhow::{Context, Result};
use clap::Parser;
use serenity::all::Http;
use tracing::info;
use vcwarden_commands::command_catalog;
use vcwarden_core::{current_unix_timestamp_ms, load_config_file, VcWardenConfig};
use vcwarden_discord::{register_guild_commands, run_discord_gateway};

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;
use crate::config_report::build_config_report;

async fn register_commands(config: &VcWardenConfig, token: &str) -> Result<()> {
    let http = Http::new(token);
    let application = http
        .get_current_application_info()
        .await
        .context("failed to fetch application info")?;
    http.set_application_id(application.id);
    let count = register_guild_commands(&http, config.guild_id, &command_catalog(config)).await?;
    println!("registered {count} commands for guild {}", config.guild_id);
    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    let config = load_config_file(&cli.config)?;
    info!(
        config = %cli.config.display(),
        guild_id = %config.guild_id,
        timezone = %config.timezone,
        voice_systems = config.registry.systems().count(),
        mention_windows = config.mention_windows.len(),
        reminders = config.reminders.len(),
        "config loaded"
    );

    if cli.check_config {
        let report = build_config_report(&config, current_unix_timestamp_ms())?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let token = cli.require_token()?;
    if cli.register_commands {
        return register_commands(&config, token).await;
    }
    run_discord_gateway(config, token).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_filter.as_deref());
    run_cli(cli).await
}
