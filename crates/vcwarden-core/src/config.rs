//! Config file loading and validation.
//!
//! The whole runtime configuration is one JSON document loaded at startup; there
//! is no runtime mutation surface.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{
    ChannelId, ChannelPolicyRegistry, ChannelSystemConfig, GuildId, NightCycle, NightCycleConfig,
    RoleId, TimeOfDay, UserId, WindowSchedule,
};

pub const VCWARDEN_CONFIG_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_TIMEZONE: &str = "America/New_York";
const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;
const DEFAULT_NAME_MAX_CHARS: usize = 12;
const DEFAULT_NAME_SUFFIX: &str = "'s Room";
const DEFAULT_CONTROL_SURFACE_LOOKBACK: usize = 50;
const MAX_CONTROL_SURFACE_LOOKBACK: usize = 100;
const DEFAULT_COOLDOWN_SECONDS: u64 = 300;
const DEFAULT_REMINDER_LEAD_MINUTES: u32 = 30;
const DEFAULT_REMINDER_TEMPLATE: &str = "War at {time} {relative} -- Start getting on to prep!";

fn default_schema_version() -> u32 {
    VCWARDEN_CONFIG_SCHEMA_VERSION
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_name_max_chars() -> usize {
    DEFAULT_NAME_MAX_CHARS
}

fn default_name_suffix() -> String {
    DEFAULT_NAME_SUFFIX.to_string()
}

fn default_control_surface_lookback() -> usize {
    DEFAULT_CONTROL_SURFACE_LOOKBACK
}

fn default_cooldown_seconds() -> u64 {
    DEFAULT_COOLDOWN_SECONDS
}

fn default_cooldown_exempt_commands() -> Vec<String> {
    vec!["night".to_string()]
}

fn default_reminder_lead_minutes() -> u32 {
    DEFAULT_REMINDER_LEAD_MINUTES
}

fn default_reminder_template() -> String {
    DEFAULT_REMINDER_TEMPLATE.to_string()
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `ChannelCreationConfig` used across vcwarden components.
pub struct ChannelCreationConfig {
    /// Pause between moving the owner in and posting the control surface.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_name_max_chars")]
    pub name_max_chars: usize,
    #[serde(default = "default_name_suffix")]
    pub name_suffix: String,
    /// How many recent messages to scan when the ownership record is missing.
    #[serde(default = "default_control_surface_lookback")]
    pub control_surface_lookback: usize,
}

impl Default for ChannelCreationConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            name_max_chars: DEFAULT_NAME_MAX_CHARS,
            name_suffix: default_name_suffix(),
            control_surface_lookback: DEFAULT_CONTROL_SURFACE_LOOKBACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Roles whose mentionable flag follows a daily window.
pub struct MentionWindowConfig {
    pub id: String,
    pub schedule: WindowSchedule,
    pub role_ids: Vec<RoleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Daily reminder posts announcing an event `lead_minutes` after each time.
pub struct ReminderConfig {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub channel_id: ChannelId,
    pub role_id: RoleId,
    pub times: Vec<TimeOfDay>,
    #[serde(default = "default_reminder_lead_minutes")]
    pub lead_minutes: u32,
    #[serde(default = "default_reminder_template")]
    pub message_template: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `CommandAccessConfig` used across vcwarden components.
pub struct CommandAccessConfig {
    #[serde(default)]
    pub staff_role_ids: BTreeSet<RoleId>,
    /// Users allowed every command and exempt from cooldowns.
    #[serde(default)]
    pub bypass_user_ids: BTreeSet<UserId>,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_cooldown_exempt_commands")]
    pub cooldown_exempt_commands: Vec<String>,
}

impl Default for CommandAccessConfig {
    fn default() -> Self {
        Self {
            staff_role_ids: BTreeSet::new(),
            bypass_user_ids: BTreeSet::new(),
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            cooldown_exempt_commands: default_cooldown_exempt_commands(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Named bulk move: everyone in the sources goes to the destination.
pub struct MoveRouteConfig {
    pub command: String,
    pub description: String,
    pub source_channel_ids: Vec<ChannelId>,
    pub destination_channel_id: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// On-disk shape of the vcwarden config file.
pub struct VcWardenConfigFile {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub guild_id: GuildId,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub presence_activity: Option<String>,
    #[serde(default)]
    pub voice_systems: BTreeMap<String, ChannelSystemConfig>,
    #[serde(default)]
    pub channel_creation: ChannelCreationConfig,
    #[serde(default)]
    pub mention_windows: Vec<MentionWindowConfig>,
    #[serde(default)]
    pub reminders: Vec<ReminderConfig>,
    #[serde(default)]
    pub commands: CommandAccessConfig,
    #[serde(default)]
    pub move_routes: Vec<MoveRouteConfig>,
    #[serde(default)]
    pub night_cycle: NightCycleConfig,
}

#[derive(Debug, Clone)]
/// Validated runtime configuration.
pub struct VcWardenConfig {
    pub guild_id: GuildId,
    pub timezone: Tz,
    pub presence_activity: Option<String>,
    pub registry: ChannelPolicyRegistry,
    pub channel_creation: ChannelCreationConfig,
    pub mention_windows: Vec<MentionWindowConfig>,
    pub reminders: Vec<ReminderConfig>,
    pub commands: CommandAccessConfig,
    pub move_routes: Vec<MoveRouteConfig>,
    pub night_cycle: NightCycle,
}

pub fn load_config_file(path: &Path) -> Result<VcWardenConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("failed to load config {}", path.display()))
}

pub fn parse_config(raw: &str) -> Result<VcWardenConfig> {
    let file =
        serde_json::from_str::<VcWardenConfigFile>(raw).context("failed to parse config json")?;
    validate_config_file(file)
}

pub fn validate_config_file(file: VcWardenConfigFile) -> Result<VcWardenConfig> {
    if file.schema_version != VCWARDEN_CONFIG_SCHEMA_VERSION {
        bail!(
            "unsupported config schema_version {} (expected {})",
            file.schema_version,
            VCWARDEN_CONFIG_SCHEMA_VERSION
        );
    }
    let timezone: Tz = file
        .timezone
        .trim()
        .parse()
        .map_err(|error| anyhow::anyhow!("invalid timezone '{}': {error}", file.timezone))?;

    let systems = file
        .voice_systems
        .into_iter()
        .map(|(system_id, system)| ChannelSystemConfig { system_id, ..system });
    let registry = ChannelPolicyRegistry::new(systems)?;

    let creation = &file.channel_creation;
    if creation.name_max_chars == 0 {
        bail!("channel_creation.name_max_chars must be greater than 0");
    }
    if creation.control_surface_lookback == 0
        || creation.control_surface_lookback > MAX_CONTROL_SURFACE_LOOKBACK
    {
        bail!(
            "channel_creation.control_surface_lookback must be in range 1..={}",
            MAX_CONTROL_SURFACE_LOOKBACK
        );
    }

    let mut window_ids = BTreeSet::new();
    for window in &file.mention_windows {
        window.schedule.validate()?;
        if !window_ids.insert(window.id.as_str()) {
            bail!("duplicate mention window id '{}'", window.id);
        }
        if window.role_ids.is_empty() {
            bail!("mention window '{}' must list at least one role", window.id);
        }
    }

    for reminder in &file.reminders {
        if reminder.times.is_empty() {
            bail!("reminder '{}' must list at least one time", reminder.id);
        }
        for time in &reminder.times {
            time.validate()?;
        }
        if reminder.lead_minutes == 0 || reminder.lead_minutes >= 24 * 60 {
            bail!(
                "reminder '{}' lead_minutes must be in range 1..1440",
                reminder.id
            );
        }
    }

    let mut route_commands = BTreeSet::new();
    for route in &file.move_routes {
        let command = route.command.trim();
        if command.is_empty() || !route_commands.insert(command.to_string()) {
            bail!("move route command '{}' is empty or duplicated", route.command);
        }
        if route.source_channel_ids.is_empty() {
            bail!("move route '{}' must list at least one source", route.command);
        }
    }

    let night_cycle = NightCycle::from_config(&file.night_cycle, timezone)?;

    Ok(VcWardenConfig {
        guild_id: file.guild_id,
        timezone,
        presence_activity: file
            .presence_activity
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        registry,
        channel_creation: file.channel_creation,
        mention_windows: file.mention_windows,
        reminders: file.reminders,
        commands: file.commands,
        move_routes: file.move_routes,
        night_cycle,
    })
}
