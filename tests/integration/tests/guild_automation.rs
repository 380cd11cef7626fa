use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::TimeZone;
use vcwarden_commands::{
    CommandCaller, CommandDispatcher, CommandRequest, CommandResponder,
    DispatchOutcome, InfoCard,
};
use vcwarden_core::{
    parse_config, ChannelId, ChannelKind, GuildIdentity, InMemoryGuild, RoleId, TransportResult,
    UserId, VcWardenConfig,
};
use vcwarden_scheduler::{configured_controllers, AnchoredClock, ControllerSet};

const AUTOMATION_CONFIG: &str = r#"{
    "schema_version": 1,
    "guild_id": "1",
    "mention_windows": [
        {
            "id": "ping-hours",
            "schedule": { "start": { "hour": 14, "minute": 0 }, "end": { "hour": 14, "minute": 45 } },
            "role_ids": ["3001", "3002"]
        }
    ],
    "reminders": [
        {
            "id": "war",
            "enabled": true,
            "channel_id": "40",
            "role_id": "4000",
            "times": [{ "hour": 14, "minute": 30 }]
        }
    ],
    "commands": { "staff_role_ids": ["5000"] },
    "move_routes": [
        {
            "command": "endwargames",
            "description": "Move everyone back",
            "source_channel_ids": ["71", "72"],
            "destination_channel_id": "70"
        }
    ]
}"#;

const REMINDER_CHANNEL: ChannelId = ChannelId(40);
const DESTINATION: ChannelId = ChannelId(70);
const STAGE: ChannelId = ChannelId(71);
const BREAKOUT: ChannelId = ChannelId(72);
const MENTION_ROLES: [RoleId; 2] = [RoleId(3001), RoleId(3002)];
const STAFF_ROLE: RoleId = RoleId(5000);

fn config() -> Arc<VcWardenConfig> {
    Arc::new(parse_config(AUTOMATION_CONFIG).expect("config"))
}

fn guild() -> Arc<InMemoryGuild> {
    let guild = Arc::new(InMemoryGuild::new(GuildIdentity {
        guild_id: vcwarden_core::GuildId(1),
        bot_user_id: UserId(2),
    }));
    guild.add_channel(REMINDER_CHANNEL, "announcements", ChannelKind::Text, None);
    guild.add_channel(DESTINATION, "War Games", ChannelKind::Voice, None);
    guild.add_channel(STAGE, "War Room", ChannelKind::Stage, None);
    guild.add_channel(BREAKOUT, "Breakout", ChannelKind::Voice, None);
    for role in MENTION_ROLES {
        guild.add_role(role, false);
    }
    guild.add_role(RoleId(4000), false);
    guild
}

fn local_unix_ms(hour: u32, minute: u32) -> u64 {
    let instant = chrono_tz::America::New_York
        .with_ymd_and_hms(2024, 3, 12, hour, minute, 0)
        .single()
        .expect("unambiguous local time");
    u64::try_from(instant.timestamp_millis()).expect("positive timestamp")
}

#[derive(Default)]
struct RecordingResponder {
    events: Mutex<Vec<String>>,
}

impl RecordingResponder {
    fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock").clone()
    }

    fn push(&self, event: String) {
        self.events.lock().expect("events lock").push(event);
    }
}

#[async_trait]
impl CommandResponder for RecordingResponder {
    async fn defer(&self) -> TransportResult<()> {
        self.push("defer".to_string());
        Ok(())
    }

    async fn edit_reply(&self, content: String) -> TransportResult<()> {
        self.push(format!("edit:{content}"));
        Ok(())
    }

    async fn edit_reply_card(&self, card: InfoCard) -> TransportResult<()> {
        self.push(format!("card:{}", card.title));
        Ok(())
    }

    async fn follow_up(&self, content: String) -> TransportResult<()> {
        self.push(format!("follow:{content}"));
        Ok(())
    }

    async fn reply_ephemeral(&self, content: String) -> TransportResult<()> {
        self.push(format!("ephemeral:{content}"));
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn integration_controllers_toggle_mentions_and_post_reminder_once() {
    let config = config();
    let guild = guild();
    let clock = Arc::new(AnchoredClock::new(local_unix_ms(14, 29)));
    let controllers = ControllerSet::spawn(configured_controllers(&config, guild.clone(), clock));
    assert_eq!(controllers.len(), 2);

    tokio::time::sleep(Duration::from_secs(5)).await;
    for role in MENTION_ROLES {
        assert_eq!(guild.role_mentionable(role), Some(true));
    }
    assert!(guild.messages(REMINDER_CHANNEL).is_empty());

    tokio::time::sleep(Duration::from_secs(2 * 60)).await;
    let posted = guild.messages(REMINDER_CHANNEL);
    assert_eq!(posted.len(), 1);
    assert!(posted[0].content.starts_with("<@&4000>\n\n"));
    assert!(posted[0].content.contains("<t:"));

    tokio::time::sleep(Duration::from_secs(15 * 60)).await;
    for role in MENTION_ROLES {
        assert_eq!(guild.role_mentionable(role), Some(false));
    }
    assert_eq!(guild.messages(REMINDER_CHANNEL).len(), 1);

    let summaries = controllers.shutdown().await;
    assert_eq!(summaries.len(), 2);
    let mention = summaries
        .iter()
        .find(|(id, _)| id == "ping-hours")
        .map(|(_, summary)| *summary)
        .expect("mention summary");
    assert_eq!(mention.transitions, 2);
    assert_eq!(mention.failed_records, 0);
}

#[tokio::test]
async fn integration_move_route_gathers_every_source_then_enforces_cooldown() {
    let guild = guild();
    for (index, source) in [STAGE, STAGE, BREAKOUT, DESTINATION].into_iter().enumerate() {
        let user = UserId(100 + index as u64);
        guild.add_member(user, &format!("user{index}"), "Member");
        guild.place_member(user, Some(source));
    }
    guild.fail_moves_for(UserId(102));
    let dispatcher = CommandDispatcher::new(guild.clone(), config());
    let caller = CommandCaller {
        user_id: UserId(7),
        role_ids: [STAFF_ROLE].into_iter().collect(),
    };
    let request = CommandRequest::new("endwargames", caller);
    let now = local_unix_ms(20, 0);

    let responder = RecordingResponder::default();
    assert_eq!(
        dispatcher.dispatch_at(&request, &responder, now).await,
        DispatchOutcome::Completed
    );
    assert_eq!(
        responder.events(),
        vec![
            "defer".to_string(),
            "edit:✅ Moved 2 members to <#70>\n- ⚠️ Failed to move 1 members".to_string(),
        ]
    );
    assert_eq!(guild.location_of(UserId(100)), Some(DESTINATION));
    assert_eq!(guild.location_of(UserId(102)), Some(BREAKOUT));

    let again = RecordingResponder::default();
    let outcome = dispatcher.dispatch_at(&request, &again, now + 1_000).await;
    let message =
        "This command was recently used. Please wait 4m 59s before using it again.".to_string();
    assert_eq!(
        outcome,
        DispatchOutcome::Rejected {
            message: message.clone()
        }
    );
    assert_eq!(again.events(), vec![format!("ephemeral:❌ {message}")]);
}

#[tokio::test]
async fn integration_night_command_is_exempt_from_cooldown() {
    let dispatcher = CommandDispatcher::new(guild(), config());
    let caller = CommandCaller {
        user_id: UserId(7),
        role_ids: [STAFF_ROLE].into_iter().collect(),
    };
    let request = CommandRequest::new("night", caller);
    let now = local_unix_ms(20, 0);
    for offset in [0, 1_000] {
        let responder = RecordingResponder::default();
        assert_eq!(
            dispatcher.dispatch_at(&request, &responder, now + offset).await,
            DispatchOutcome::Completed
        );
        assert_eq!(
            responder.events(),
            vec!["defer".to_string(), "card:🌙 Night Cycle Information".to_string()]
        );
    }
}
