use std::sync::Arc;

use vcwarden_core::{
    parse_config, ChannelId, ChannelKind, ChannelPermission, GuildIdentity, InMemoryGuild,
    OverwriteTarget, RoleId, UserId, VcWardenConfig, VcWardenError,
};
use vcwarden_voice::{
    reconcile_ownership, ChannelLifecycleManager, ControlAction, ControlSurfaceProtocol,
    LocationChange, OwnershipRegistry, ReclaimOutcome, TriggerOutcome,
};

const GUILD_CONFIG: &str = r#"{
    "schema_version": 1,
    "guild_id": "1",
    "channel_creation": { "settle_delay_ms": 0 },
    "voice_systems": {
        "public": {
            "trigger_channel_id": "11",
            "parent_group_id": "10",
            "protected_channel_ids": ["11", "12"],
            "access": { "mode": "open" }
        },
        "hazardous": {
            "trigger_channel_id": "21",
            "parent_group_id": "10",
            "protected_channel_ids": ["21"],
            "access": { "mode": "restricted", "gating_role_id": "77" }
        }
    }
}"#;

const BOT: UserId = UserId(2);
const OWNER: UserId = UserId(500);
const INTRUDER: UserId = UserId(501);
const GROUP: ChannelId = ChannelId(10);
const PUBLIC_TRIGGER: ChannelId = ChannelId(11);
const LOBBY: ChannelId = ChannelId(12);
const HAZARD_TRIGGER: ChannelId = ChannelId(21);
const GATE_ROLE: RoleId = RoleId(77);

struct Harness {
    guild: Arc<InMemoryGuild>,
    config: VcWardenConfig,
    surfaces: Arc<ControlSurfaceProtocol>,
    lifecycle: ChannelLifecycleManager,
}

fn protocol(
    guild: &Arc<InMemoryGuild>,
    config: &VcWardenConfig,
    ownership: Arc<OwnershipRegistry>,
) -> Arc<ControlSurfaceProtocol> {
    Arc::new(ControlSurfaceProtocol::new(
        guild.clone(),
        Arc::new(config.registry.clone()),
        ownership,
        config.channel_creation.control_surface_lookback,
    ))
}

fn harness() -> Harness {
    let config = parse_config(GUILD_CONFIG).expect("config");
    let guild = Arc::new(InMemoryGuild::new(GuildIdentity {
        guild_id: config.guild_id,
        bot_user_id: BOT,
    }));
    guild.add_channel(GROUP, "Voice", ChannelKind::Category, None);
    guild.add_channel(PUBLIC_TRIGGER, "➕ Public", ChannelKind::Voice, Some(GROUP));
    guild.add_channel(LOBBY, "Lobby", ChannelKind::Voice, Some(GROUP));
    guild.add_channel(HAZARD_TRIGGER, "➕ Hazardous", ChannelKind::Voice, Some(GROUP));
    guild.add_member(OWNER, "owner", "Owner");
    guild.add_member(INTRUDER, "intruder", "Intruder");

    let ownership = Arc::new(OwnershipRegistry::new());
    let surfaces = protocol(&guild, &config, ownership.clone());
    let lifecycle = ChannelLifecycleManager::new(
        guild.clone(),
        Arc::new(config.registry.clone()),
        ownership,
        surfaces.clone(),
        config.channel_creation.clone(),
    );
    Harness {
        guild,
        config,
        surfaces,
        lifecycle,
    }
}

async fn enter(
    harness: &Harness,
    member: UserId,
    from: Option<ChannelId>,
    to: ChannelId,
) -> ChannelId {
    harness.guild.place_member(member, Some(to));
    let report = harness
        .lifecycle
        .handle_location_change(LocationChange {
            member,
            old_location: from,
            new_location: Some(to),
        })
        .await
        .expect("location change");
    match report.trigger {
        Some(TriggerOutcome::Created { channel_id, .. }) => channel_id,
        other => panic!("expected a created channel, got {other:?}"),
    }
}

#[tokio::test]
async fn integration_owner_locks_and_unlocks_then_channel_is_reclaimed() {
    let harness = harness();
    let room = enter(&harness, OWNER, None, PUBLIC_TRIGGER).await;
    assert_eq!(harness.guild.location_of(OWNER), Some(room));

    for _ in 0..2 {
        let outcome = harness
            .surfaces
            .handle_action(ControlAction::Lock, room, OWNER)
            .await
            .expect("owner may lock");
        assert_eq!(outcome.confirmation, "🔒 Voice channel locked!");
    }
    let everyone = harness
        .guild
        .overwrite_for(room, OverwriteTarget::Role(RoleId(1)))
        .expect("everyone overwrite");
    assert_eq!(everyone.state(ChannelPermission::Connect), Some(false));
    assert_eq!(everyone.state(ChannelPermission::Send), Some(false));

    harness
        .surfaces
        .handle_action(ControlAction::Unlock, room, OWNER)
        .await
        .expect("owner may unlock");
    let everyone = harness
        .guild
        .overwrite_for(room, OverwriteTarget::Role(RoleId(1)))
        .expect("everyone overwrite");
    assert_eq!(everyone.state(ChannelPermission::Connect), Some(true));

    harness.guild.place_member(OWNER, None);
    let report = harness
        .lifecycle
        .handle_location_change(LocationChange {
            member: OWNER,
            old_location: Some(room),
            new_location: None,
        })
        .await
        .expect("leave");
    assert_eq!(report.reclaimed, Some(ReclaimOutcome::Deleted));
    assert!(harness.guild.channel(room).is_none());
    assert!(harness.surfaces.ownership().get(room).is_none());
}

#[tokio::test]
async fn integration_non_owner_cannot_touch_permissions() {
    let harness = harness();
    let room = enter(&harness, OWNER, None, HAZARD_TRIGGER).await;
    let before = harness
        .guild
        .overwrite_for(room, OverwriteTarget::Role(GATE_ROLE))
        .expect("gate overwrite");

    let error = harness
        .surfaces
        .handle_action(ControlAction::Lock, room, INTRUDER)
        .await
        .expect_err("intruder is refused");
    assert!(matches!(error, VcWardenError::Authorization(_)));
    assert_eq!(error.user_message(), "Only the VC creator can use these controls.");
    assert_eq!(
        harness
            .guild
            .overwrite_for(room, OverwriteTarget::Role(GATE_ROLE)),
        Some(before)
    );
}

#[tokio::test]
async fn integration_restricted_lock_targets_gating_role() {
    let harness = harness();
    let room = enter(&harness, OWNER, None, HAZARD_TRIGGER).await;

    harness
        .surfaces
        .handle_action(ControlAction::Lock, room, OWNER)
        .await
        .expect("lock");
    let gate = harness
        .guild
        .overwrite_for(room, OverwriteTarget::Role(GATE_ROLE))
        .expect("gate overwrite");
    assert_eq!(gate.state(ChannelPermission::Connect), Some(false));
    assert_eq!(gate.state(ChannelPermission::View), Some(true));
}

#[tokio::test]
async fn integration_restricted_lock_unlock_cycle_tracks_latest_action() {
    let harness = harness();
    let room = enter(&harness, OWNER, None, HAZARD_TRIGGER).await;
    let steps = [
        (ControlAction::Lock, "🔒 Voice channel locked!", false),
        (ControlAction::Unlock, "🔓 Voice channel unlocked!", true),
        (ControlAction::Lock, "🔒 Voice channel locked!", false),
        (ControlAction::Unlock, "🔓 Voice channel unlocked!", true),
    ];

    for (action, confirmation, connect) in steps {
        let outcome = harness
            .surfaces
            .handle_action(action, room, OWNER)
            .await
            .expect("owner may toggle");
        assert_eq!(outcome.confirmation, confirmation);
        let gate = harness
            .guild
            .overwrite_for(room, OverwriteTarget::Role(GATE_ROLE))
            .expect("gate overwrite");
        assert_eq!(
            gate.state(ChannelPermission::Connect),
            Some(connect),
            "connect after {action:?}"
        );
        assert_eq!(gate.state(ChannelPermission::View), Some(true));
    }
}

#[tokio::test]
async fn integration_restart_recovers_owner_from_control_surface() {
    let harness = harness();
    let room = enter(&harness, OWNER, None, HAZARD_TRIGGER).await;

    // A fresh protocol has no ownership records, as after a restart.
    let restarted = protocol(
        &harness.guild,
        &harness.config,
        Arc::new(OwnershipRegistry::new()),
    );
    let report = reconcile_ownership(&restarted).await;
    assert_eq!(report.recovered, 1);
    assert_eq!(report.failed, 0);
    let managed = restarted.ownership().get(room).expect("recovered record");
    assert_eq!(managed.owner_id, OWNER);
    assert_eq!(managed.system_id.as_deref(), Some("hazardous"));

    restarted
        .handle_action(ControlAction::Lock, room, OWNER)
        .await
        .expect("owner still recognised after restart");
    assert_eq!(
        harness
            .guild
            .overwrite_for(room, OverwriteTarget::Role(GATE_ROLE))
            .and_then(|overwrite| overwrite.state(ChannelPermission::Connect)),
        Some(false)
    );
}

#[tokio::test]
async fn integration_hopping_between_triggers_replaces_channel() {
    let harness = harness();
    let first = enter(&harness, OWNER, None, PUBLIC_TRIGGER).await;

    harness.guild.place_member(OWNER, Some(HAZARD_TRIGGER));
    let report = harness
        .lifecycle
        .handle_location_change(LocationChange {
            member: OWNER,
            old_location: Some(first),
            new_location: Some(HAZARD_TRIGGER),
        })
        .await
        .expect("hop");
    assert_eq!(report.reclaimed, Some(ReclaimOutcome::Deleted));
    let Some(TriggerOutcome::Created { channel_id, .. }) = report.trigger else {
        panic!("expected second channel, got {:?}", report.trigger);
    };
    assert_ne!(channel_id, first);
    assert!(harness.guild.channel(first).is_none());
    assert_eq!(harness.guild.location_of(OWNER), Some(channel_id));
}
