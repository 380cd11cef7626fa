//! `--check-config` summary.

use serde::Serialize;
use vcwarden_commands::command_catalog;
use vcwarden_core::{evaluate_window_at, VcWardenConfig, VcWardenError};
use vcwarden_scheduler::reminder_schedule;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowReport {
    pub id: String,
    pub phase: &'static str,
    pub next_boundary: String,
    pub ms_until_next_transition: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemReport {
    pub system_id: String,
    pub access: &'static str,
    pub trigger_channel_id: String,
    pub parent_group_id: String,
    pub protected_channels: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Validated config plus the phase of every window at one instant.
pub struct ConfigReport {
    pub guild_id: String,
    pub timezone: String,
    pub voice_systems: Vec<SystemReport>,
    pub mention_windows: Vec<WindowReport>,
    pub reminder_windows: Vec<WindowReport>,
    pub commands: Vec<String>,
}

pub fn build_config_report(
    config: &VcWardenConfig,
    now_unix_ms: u64,
) -> Result<ConfigReport, VcWardenError> {
    let voice_systems = config
        .registry
        .systems()
        .map(|system| SystemReport {
            system_id: system.system_id.clone(),
            access: system.access.as_str(),
            trigger_channel_id: system.trigger_channel_id.to_string(),
            parent_group_id: system.parent_group_id.to_string(),
            protected_channels: system.protected_channel_ids.len(),
        })
        .collect();

    let mention_windows = config
        .mention_windows
        .iter()
        .map(|window| {
            let evaluation = evaluate_window_at(now_unix_ms, config.timezone, &window.schedule)?;
            Ok(WindowReport {
                id: window.id.clone(),
                phase: evaluation.phase.as_str(),
                next_boundary: evaluation.next_boundary.to_string(),
                ms_until_next_transition: evaluation.ms_until_next_transition,
            })
        })
        .collect::<Result<Vec<_>, VcWardenError>>()?;

    let mut reminder_windows = Vec::new();
    for reminder in config.reminders.iter().filter(|reminder| reminder.enabled) {
        for time in &reminder.times {
            let schedule = reminder_schedule(*time, reminder.lead_minutes);
            let evaluation = evaluate_window_at(now_unix_ms, config.timezone, &schedule)?;
            reminder_windows.push(WindowReport {
                id: format!("{}@{time}", reminder.id),
                phase: evaluation.phase.as_str(),
                next_boundary: evaluation.next_boundary.to_string(),
                ms_until_next_transition: evaluation.ms_until_next_transition,
            });
        }
    }

    Ok(ConfigReport {
        guild_id: config.guild_id.to_string(),
        timezone: config.timezone.name().to_string(),
        voice_systems,
        mention_windows,
        reminder_windows,
        commands: command_catalog(config)
            .into_iter()
            .map(|spec| spec.name)
            .collect(),
    })
}
