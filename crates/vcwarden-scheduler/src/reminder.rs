//! Daily reminder posts.
//!
//! Each reminder time runs its own controller over the window
//! `[time, time + lead)`. Entering that window at a boundary posts the message;
//! a controller that starts inside the window stays quiet so restarts do not
//! repeat an announcement.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike};
use chrono_tz::Tz;
use tracing::{info, warn};
use vcwarden_core::{
    discord_timestamp, ChannelId, ChannelTransport, DiscordTimestampStyle, GuildTransport,
    ReminderConfig, RoleId, TimeOfDay, WindowPhase, WindowSchedule, MINUTES_PER_DAY,
};

use crate::{
    Clock, RecurringWindowController, SideEffectReport, TransitionTrigger, WindowSideEffect,
};

/// Window that opens at `time` and closes `lead_minutes` later.
pub fn reminder_schedule(time: TimeOfDay, lead_minutes: u32) -> WindowSchedule {
    WindowSchedule::new(time, time.plus_minutes(lead_minutes))
}

/// Renders `<@&role>` followed by the template with `{time}` and `{relative}` filled.
pub fn render_reminder_message(template: &str, role: RoleId, event_unix_seconds: i64) -> String {
    let body = template
        .replace(
            "{time}",
            &discord_timestamp(event_unix_seconds, DiscordTimestampStyle::ShortTime),
        )
        .replace(
            "{relative}",
            &discord_timestamp(event_unix_seconds, DiscordTimestampStyle::Relative),
        );
    format!("<@&{role}>\n\n{body}")
}

pub struct ReminderEffect {
    reminder_id: String,
    transport: Arc<dyn GuildTransport>,
    channel_id: ChannelId,
    role_id: RoleId,
    time: TimeOfDay,
    lead_minutes: u32,
    template: String,
}

impl ReminderEffect {
    pub fn new(config: &ReminderConfig, time: TimeOfDay, transport: Arc<dyn GuildTransport>) -> Self {
        Self {
            reminder_id: config.id.clone(),
            transport,
            channel_id: config.channel_id,
            role_id: config.role_id,
            time,
            lead_minutes: config.lead_minutes,
            template: config.message_template.clone(),
        }
    }

    /// Instant of the announced event: the reminder time plus the lead, on the day `now` falls in.
    fn event_instant(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let now_minute = now.hour() * 60 + now.minute();
        let since_reminder =
            (now_minute + MINUTES_PER_DAY - self.time.minute_of_day()) % MINUTES_PER_DAY;
        let truncated = now
            .with_second(0)
            .and_then(|value| value.with_nanosecond(0))
            .unwrap_or(*now);
        truncated + Duration::minutes(i64::from(self.lead_minutes) - i64::from(since_reminder))
    }
}

#[async_trait]
impl WindowSideEffect for ReminderEffect {
    fn name(&self) -> &str {
        "reminder"
    }

    async fn apply(
        &self,
        phase: WindowPhase,
        trigger: TransitionTrigger,
        now: &DateTime<Tz>,
    ) -> SideEffectReport {
        if !phase.is_active() || trigger == TransitionTrigger::Startup {
            return SideEffectReport::default();
        }
        let event = self.event_instant(now);
        let content = render_reminder_message(&self.template, self.role_id, event.timestamp());
        match self.transport.send_text(self.channel_id, content).await {
            Ok(message_id) => {
                info!(
                    reminder_id = %self.reminder_id,
                    channel_id = %self.channel_id,
                    message_id = %message_id,
                    reminder_time = %self.time,
                    "reminder posted"
                );
                SideEffectReport {
                    applied: 1,
                    failed: 0,
                }
            }
            Err(error) => {
                warn!(
                    reminder_id = %self.reminder_id,
                    channel_id = %self.channel_id,
                    %error,
                    "reminder post failed"
                );
                SideEffectReport {
                    applied: 0,
                    failed: 1,
                }
            }
        }
    }
}

/// One controller per configured time. Disabled reminders yield none.
pub fn reminder_controllers(
    config: &ReminderConfig,
    timezone: Tz,
    transport: Arc<dyn GuildTransport>,
    clock: Arc<dyn Clock>,
) -> Vec<RecurringWindowController> {
    if !config.enabled {
        return Vec::new();
    }
    config
        .times
        .iter()
        .map(|time| {
            RecurringWindowController::new(
                format!("{}@{time}", config.id),
                reminder_schedule(*time, config.lead_minutes),
                timezone,
                Arc::new(ReminderEffect::new(config, *time, transport.clone())),
                clock.clone(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use tokio::sync::watch;
    use vcwarden_core::{ChannelKind, GuildId, GuildIdentity, InMemoryGuild, UserId};

    use super::*;
    use crate::AnchoredClock;

    const CHANNEL: ChannelId = ChannelId(40);
    const ROLE: RoleId = RoleId(4000);

    fn guild() -> Arc<InMemoryGuild> {
        let guild = Arc::new(InMemoryGuild::new(GuildIdentity {
            guild_id: GuildId(1),
            bot_user_id: UserId(2),
        }));
        guild.add_channel(CHANNEL, "war-room", ChannelKind::Text, None);
        guild
    }

    fn config() -> ReminderConfig {
        ReminderConfig {
            id: "war".to_string(),
            enabled: true,
            channel_id: CHANNEL,
            role_id: ROLE,
            times: vec![
                TimeOfDay::new(14, 30).expect("time"),
                TimeOfDay::new(19, 30).expect("time"),
            ],
            lead_minutes: 30,
            message_template: "War at {time} {relative} -- Start getting on to prep!".to_string(),
        }
    }

    fn local(hour: u32, minute: u32, second: u32) -> DateTime<Tz> {
        New_York
            .with_ymd_and_hms(2025, 3, 3, hour, minute, second)
            .single()
            .expect("local time")
    }

    #[test]
    fn unit_render_reminder_message_fills_placeholders() {
        let message = render_reminder_message(
            "War at {time} {relative} -- Start getting on to prep!",
            RoleId(7),
            1_700_000_000,
        );
        assert_eq!(
            message,
            "<@&7>\n\nWar at <t:1700000000:t> <t:1700000000:R> -- Start getting on to prep!"
        );
    }

    #[test]
    fn unit_reminder_schedule_wraps_past_midnight() {
        let schedule = reminder_schedule(TimeOfDay::new(23, 45).expect("time"), 30);
        assert_eq!(schedule.end, TimeOfDay::new(0, 15).expect("time"));
        assert!(schedule.wraps_midnight());
    }

    #[tokio::test]
    async fn unit_reminder_posts_only_on_boundary_into_active() {
        let guild = guild();
        let effect = ReminderEffect::new(&config(), TimeOfDay::new(14, 30).expect("time"), guild.clone());
        let now = local(14, 30, 1);

        let startup = effect
            .apply(WindowPhase::Active, TransitionTrigger::Startup, &now)
            .await;
        assert_eq!(startup, SideEffectReport::default());
        let closing = effect
            .apply(WindowPhase::Inactive, TransitionTrigger::Boundary, &now)
            .await;
        assert_eq!(closing, SideEffectReport::default());
        assert!(guild.messages(CHANNEL).is_empty());

        let report = effect
            .apply(WindowPhase::Active, TransitionTrigger::Boundary, &now)
            .await;
        assert_eq!(report.applied, 1);
        let messages = guild.messages(CHANNEL);
        assert_eq!(messages.len(), 1);
        let war_time = local(15, 0, 0).timestamp();
        assert_eq!(
            messages[0].content,
            format!(
                "<@&4000>\n\nWar at <t:{war_time}:t> <t:{war_time}:R> -- Start getting on to prep!"
            )
        );
    }

    #[test]
    fn unit_disabled_reminder_starts_no_controllers() {
        let mut disabled = config();
        disabled.enabled = false;
        let controllers = reminder_controllers(
            &disabled,
            New_York,
            guild(),
            Arc::new(AnchoredClock::new(0)),
        );
        assert!(controllers.is_empty());
        assert_eq!(
            reminder_controllers(&config(), New_York, guild(), Arc::new(AnchoredClock::new(0)))
                .len(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn integration_reminder_controllers_post_once_per_time_per_day() {
        let guild = guild();
        let start = u64::try_from(local(14, 40, 0).timestamp_millis()).expect("timestamp");
        let clock: Arc<dyn Clock> = Arc::new(AnchoredClock::new(start));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = reminder_controllers(&config(), New_York, guild.clone(), clock)
            .into_iter()
            .map(|controller| tokio::spawn(controller.run(shutdown_rx.clone())))
            .collect::<Vec<_>>();

        // 14:40 until 13:40 the next day; the 14:30 window was already open at startup.
        tokio::time::sleep(StdDuration::from_secs(23 * 60 * 60)).await;
        shutdown_tx.send(true).expect("controllers alive");
        for task in tasks {
            task.await.expect("controller task");
        }

        let messages = guild.messages(CHANNEL);
        assert_eq!(messages.len(), 1, "only the 19:30 reminder fires: {messages:?}");
        let war_time = local(20, 0, 0).timestamp();
        assert!(messages[0].content.contains(&format!("<t:{war_time}:t>")));
    }

    #[tokio::test(start_paused = true)]
    async fn regression_reminder_fires_on_spring_forward_day() {
        let guild = guild();
        let on = |day: u32, hour: u32, minute: u32| {
            New_York
                .with_ymd_and_hms(2025, 3, day, hour, minute, 0)
                .single()
                .expect("local time")
        };
        let start = u64::try_from(on(8, 14, 35).timestamp_millis()).expect("timestamp");
        let clock: Arc<dyn Clock> = Arc::new(AnchoredClock::new(start));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = reminder_controllers(&config(), New_York, guild.clone(), clock)
            .into_iter()
            .map(|controller| tokio::spawn(controller.run(shutdown_rx.clone())))
            .collect::<Vec<_>>();

        // Saturday 14:35 EST until Sunday 14:45 EDT is 23h10m of real time.
        tokio::time::sleep(StdDuration::from_secs((23 * 60 + 10) * 60)).await;
        shutdown_tx.send(true).expect("controllers alive");
        for task in tasks {
            task.await.expect("controller task");
        }

        let messages = guild.messages(CHANNEL);
        assert_eq!(messages.len(), 2, "19:30 Saturday and 14:30 Sunday: {messages:?}");
        let sunday_war = on(9, 15, 0).timestamp();
        assert!(messages[1].content.contains(&format!("<t:{sunday_war}:t>")));
    }
}
