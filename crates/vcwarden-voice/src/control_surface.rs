//! Owner-only lock/unlock control surface.
//!
//! Every managed channel gets exactly one surface at creation: an embed whose
//! footer carries the owner marker `Creator:<ownerId> System:<systemId>` plus a
//! lock and an unlock button. Button ids are `lock_<channelId>` and
//! `unlock_<channelId>`.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};
use vcwarden_core::{
    ChannelId, ChannelInfo, ChannelPermission, ChannelPolicyRegistry, ChannelSystemConfig,
    ChannelTransport, GuildTransport, MessageId, OverwriteTarget, PermissionOverwrite, RoleId,
    SurfaceAction, SurfaceActionStyle, SurfaceMessage, UserId, VcWardenError,
};

use crate::{ManagedChannel, OwnershipRegistry};

pub const CONTROL_SURFACE_TITLE: &str = "🎤 Voice Channel Controls";
pub const CONTROL_SURFACE_COLOR: u32 = 0x5865F2;

static OWNER_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Creator:(\d+)(?:\s+System:([A-Za-z0-9_-]+))?").expect("owner marker regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ControlAction` values.
pub enum ControlAction {
    Lock,
    Unlock,
}

impl ControlAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "lock" => Some(Self::Lock),
            "unlock" => Some(Self::Unlock),
            _ => None,
        }
    }

    pub fn custom_id(self, channel: ChannelId) -> String {
        format!("{}_{channel}", self.as_str())
    }

    /// Splits a button id such as `lock_123` into its action and channel.
    pub fn parse_custom_id(custom_id: &str) -> Option<(Self, ChannelId)> {
        let (action, channel) = custom_id.split_once('_')?;
        let action = Self::parse(action)?;
        let channel = channel.parse::<ChannelId>().ok()?;
        Some((action, channel))
    }

    pub fn confirmation(self) -> &'static str {
        match self {
            Self::Lock => "🔒 Voice channel locked!",
            Self::Unlock => "🔓 Voice channel unlocked!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Owner marker embedded in a control surface footer.
pub struct OwnerMarker {
    pub owner_id: UserId,
    pub system_id: Option<String>,
}

impl OwnerMarker {
    pub fn render(&self) -> String {
        match &self.system_id {
            Some(system_id) => format!("Creator:{} System:{system_id}", self.owner_id),
            None => format!("Creator:{}", self.owner_id),
        }
    }

    /// Parses a footer. Older surfaces carry only `Creator:<id>`.
    pub fn parse(footer: &str) -> Option<Self> {
        let captures = OWNER_MARKER_REGEX.captures(footer)?;
        let owner_id = captures.get(1)?.as_str().parse::<UserId>().ok()?;
        Some(Self {
            owner_id,
            system_id: captures.get(2).map(|value| value.as_str().to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Public struct `ControlActionOutcome` used across vcwarden components.
pub struct ControlActionOutcome {
    pub action: ControlAction,
    pub channel_id: ChannelId,
    pub system_id: String,
    pub confirmation: String,
}

pub fn build_control_surface(channel: ChannelId, marker: &OwnerMarker) -> SurfaceMessage {
    SurfaceMessage {
        title: CONTROL_SURFACE_TITLE.to_string(),
        description: format!("Only <@{}> can use these controls.", marker.owner_id),
        footer: marker.render(),
        color: CONTROL_SURFACE_COLOR,
        actions: vec![
            SurfaceAction {
                custom_id: ControlAction::Lock.custom_id(channel),
                label: "🔒 Lock VC".to_string(),
                style: SurfaceActionStyle::Danger,
            },
            SurfaceAction {
                custom_id: ControlAction::Unlock.custom_id(channel),
                label: "🔓 Unlock VC".to_string(),
                style: SurfaceActionStyle::Success,
            },
        ],
    }
}

/// Permission patch that locks or unlocks `system`'s gated audience on a channel.
///
/// Restricted systems toggle their gating role and re-assert view; open systems
/// toggle `@everyone` connect and leave every other bit alone.
pub fn lock_patch(
    system: &ChannelSystemConfig,
    everyone: RoleId,
    action: ControlAction,
) -> PermissionOverwrite {
    let (target, keep_view) = match system.access.gating_role() {
        Some(role) => (OverwriteTarget::Role(role), true),
        None => (OverwriteTarget::Role(everyone), false),
    };
    let mut patch = PermissionOverwrite::new(target);
    if keep_view {
        patch = patch.allowing(&[ChannelPermission::View]);
    }
    match action {
        ControlAction::Lock => patch.denying(&[ChannelPermission::Connect]),
        ControlAction::Unlock => patch.allowing(&[ChannelPermission::Connect]),
    }
}

/// Attaches control surfaces and authorizes lock/unlock requests.
pub struct ControlSurfaceProtocol {
    transport: Arc<dyn GuildTransport>,
    registry: Arc<ChannelPolicyRegistry>,
    ownership: Arc<OwnershipRegistry>,
    lookback: usize,
}

impl ControlSurfaceProtocol {
    pub fn new(
        transport: Arc<dyn GuildTransport>,
        registry: Arc<ChannelPolicyRegistry>,
        ownership: Arc<OwnershipRegistry>,
        lookback: usize,
    ) -> Self {
        Self {
            transport,
            registry,
            ownership,
            lookback: lookback.max(1),
        }
    }

    pub fn transport(&self) -> &dyn GuildTransport {
        self.transport.as_ref()
    }

    pub fn registry(&self) -> &ChannelPolicyRegistry {
        &self.registry
    }

    pub fn ownership(&self) -> &OwnershipRegistry {
        &self.ownership
    }

    /// Posts the surface for a freshly created channel.
    pub async fn attach(
        &self,
        channel: ChannelId,
        owner: UserId,
        system_id: &str,
    ) -> Result<MessageId, VcWardenError> {
        let marker = OwnerMarker {
            owner_id: owner,
            system_id: Some(system_id.to_string()),
        };
        let message_id = self
            .transport
            .post_surface(channel, build_control_surface(channel, &marker))
            .await?;
        info!(channel_id = %channel, owner_id = %owner, system_id, "control surface attached");
        Ok(message_id)
    }

    /// Scans the last `lookback` messages for the newest surface posted by the bot.
    pub async fn find_owner_marker(
        &self,
        channel: ChannelId,
    ) -> Result<Option<OwnerMarker>, VcWardenError> {
        let bot = self.transport.identity().bot_user_id;
        let messages = self
            .transport
            .recent_messages(channel, self.lookback)
            .await?;
        Ok(messages
            .iter()
            .filter(|message| message.author_id == bot)
            .filter(|message| message.embed_title.as_deref() == Some(CONTROL_SURFACE_TITLE))
            .find_map(|message| message.embed_footer.as_deref().and_then(OwnerMarker::parse)))
    }

    /// Reads the surface of `channel` and records its owner. `None` when absent.
    pub async fn recover_from_surface(
        &self,
        channel: &ChannelInfo,
    ) -> Result<Option<ManagedChannel>, VcWardenError> {
        let Some(parent_group_id) = channel.parent_id else {
            return Ok(None);
        };
        let Some(marker) = self.find_owner_marker(channel.id).await? else {
            return Ok(None);
        };
        let managed = ManagedChannel {
            channel_id: channel.id,
            parent_group_id,
            owner_id: marker.owner_id,
            system_id: marker.system_id,
        };
        self.ownership.record(managed.clone());
        Ok(Some(managed))
    }

    /// Ownership record first, history scan as fallback.
    async fn resolve_owner(
        &self,
        channel: &ChannelInfo,
    ) -> Result<ManagedChannel, VcWardenError> {
        if let Some(managed) = self.ownership.get(channel.id) {
            return Ok(managed);
        }
        self.recover_from_surface(channel)
            .await?
            .ok_or_else(|| VcWardenError::not_found("Control panel not found."))
    }

    fn governing_system(&self, managed: &ManagedChannel) -> Option<&ChannelSystemConfig> {
        managed
            .system_id
            .as_deref()
            .and_then(|system_id| self.registry.system(system_id))
            .filter(|system| system.parent_group_id == managed.parent_group_id)
            .or_else(|| self.registry.system_for_group(managed.parent_group_id))
    }

    /// Applies a lock/unlock request if `requester` owns the channel.
    ///
    /// A rejected request makes no permission change.
    pub async fn handle_action(
        &self,
        action: ControlAction,
        channel_id: ChannelId,
        requester: UserId,
    ) -> Result<ControlActionOutcome, VcWardenError> {
        let channel = match self.transport.channel_info(channel_id).await {
            Ok(Some(channel)) => channel,
            Ok(None) => return Err(VcWardenError::not_found("Voice channel not found.")),
            Err(error) if error.is_not_found() => {
                return Err(VcWardenError::not_found("Voice channel not found."))
            }
            Err(error) => return Err(error.into()),
        };

        let managed = self.resolve_owner(&channel).await?;
        if managed.owner_id != requester {
            info!(
                channel_id = %channel_id,
                requester_id = %requester,
                action = action.as_str(),
                "control action rejected for non-owner"
            );
            return Err(VcWardenError::authorization(
                "Only the VC creator can use these controls.",
            ));
        }

        let system = self.governing_system(&managed).ok_or_else(|| {
            VcWardenError::validation("This channel is not managed by a voice system.")
        })?;
        let everyone = self.transport.identity().everyone_role();
        let patch = lock_patch(system, everyone, action);
        if let Err(error) = self.transport.edit_permission(channel_id, patch).await {
            warn!(channel_id = %channel_id, action = action.as_str(), %error, "control action failed");
            return Err(error.into());
        }
        info!(
            channel_id = %channel_id,
            system_id = %system.system_id,
            action = action.as_str(),
            "control action applied"
        );
        Ok(ControlActionOutcome {
            action,
            channel_id,
            system_id: system.system_id.clone(),
            confirmation: action.confirmation().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use vcwarden_core::{AccessMode, ChannelKind, GuildId, GuildIdentity, InMemoryGuild};

    use super::*;

    const BOT: UserId = UserId(2);
    const OWNER: UserId = UserId(500);
    const INTRUDER: UserId = UserId(501);
    const GROUP: ChannelId = ChannelId(10);
    const ROOM: ChannelId = ChannelId(15);
    const GATE_ROLE: RoleId = RoleId(77);

    fn fixture(access: AccessMode) -> (Arc<InMemoryGuild>, ControlSurfaceProtocol) {
        let guild = Arc::new(InMemoryGuild::new(GuildIdentity {
            guild_id: GuildId(1),
            bot_user_id: BOT,
        }));
        guild.add_channel(GROUP, "category", ChannelKind::Category, None);
        guild.add_channel(ROOM, "Owner's Room", ChannelKind::Voice, Some(GROUP));
        let registry = ChannelPolicyRegistry::new([ChannelSystemConfig {
            system_id: "hailstorm".to_string(),
            trigger_channel_id: ChannelId(11),
            parent_group_id: GROUP,
            protected_channel_ids: [ChannelId(11)].into_iter().collect(),
            access,
        }])
        .expect("registry");
        let protocol = ControlSurfaceProtocol::new(
            guild.clone(),
            Arc::new(registry),
            Arc::new(OwnershipRegistry::new()),
            10,
        );
        (guild, protocol)
    }

    #[test]
    fn unit_custom_id_round_trip_and_rejects_foreign_ids() {
        let id = ControlAction::Lock.custom_id(ChannelId(42));
        assert_eq!(id, "lock_42");
        assert_eq!(
            ControlAction::parse_custom_id(&id),
            Some((ControlAction::Lock, ChannelId(42)))
        );
        assert_eq!(ControlAction::parse_custom_id("kick_42"), None);
        assert_eq!(ControlAction::parse_custom_id("unlock_abc"), None);
    }

    #[test]
    fn unit_owner_marker_parses_legacy_and_current_footers() {
        assert_eq!(
            OwnerMarker::parse("Creator:123"),
            Some(OwnerMarker {
                owner_id: UserId(123),
                system_id: None
            })
        );
        let marker = OwnerMarker {
            owner_id: UserId(9),
            system_id: Some("gw2".to_string()),
        };
        assert_eq!(OwnerMarker::parse(&marker.render()), Some(marker));
        assert_eq!(OwnerMarker::parse("Creator:"), None);
    }

    #[tokio::test]
    async fn functional_attach_then_owner_locks_restricted_channel() {
        let (guild, protocol) = fixture(AccessMode::Restricted {
            gating_role_id: GATE_ROLE,
        });
        protocol.attach(ROOM, OWNER, "hailstorm").await.expect("attach");
        assert_eq!(guild.surfaces(ROOM).len(), 1);

        let outcome = protocol
            .handle_action(ControlAction::Lock, ROOM, OWNER)
            .await
            .expect("owner may lock");
        assert_eq!(outcome.confirmation, "🔒 Voice channel locked!");

        let overwrite = guild
            .overwrite_for(ROOM, OverwriteTarget::Role(GATE_ROLE))
            .expect("gating role overwrite");
        assert_eq!(overwrite.state(ChannelPermission::Connect), Some(false));
        assert_eq!(overwrite.state(ChannelPermission::View), Some(true));
    }

    #[tokio::test]
    async fn unit_non_owner_is_rejected_without_permission_change() {
        let (guild, protocol) = fixture(AccessMode::Open);
        protocol.attach(ROOM, OWNER, "hailstorm").await.expect("attach");

        let error = protocol
            .handle_action(ControlAction::Lock, ROOM, INTRUDER)
            .await
            .expect_err("intruder must be rejected");
        assert!(matches!(error, VcWardenError::Authorization(_)));
        assert!(guild
            .overwrite_for(ROOM, OverwriteTarget::Role(RoleId(1)))
            .is_none());
        assert!(!guild
            .call_log()
            .iter()
            .any(|entry| entry.starts_with("permission:")));
    }

    #[tokio::test]
    async fn unit_open_system_toggles_everyone_connect() {
        let (guild, protocol) = fixture(AccessMode::Open);
        protocol.attach(ROOM, OWNER, "hailstorm").await.expect("attach");
        protocol
            .handle_action(ControlAction::Lock, ROOM, OWNER)
            .await
            .expect("lock");
        protocol
            .handle_action(ControlAction::Unlock, ROOM, OWNER)
            .await
            .expect("unlock");
        let everyone = guild
            .overwrite_for(ROOM, OverwriteTarget::Role(RoleId(1)))
            .expect("everyone overwrite");
        assert_eq!(everyone.state(ChannelPermission::Connect), Some(true));
        assert_eq!(everyone.state(ChannelPermission::View), None);
    }

    #[tokio::test]
    async fn regression_owner_recovered_from_surface_when_record_missing() {
        let (guild, protocol) = fixture(AccessMode::Open);
        let marker = OwnerMarker {
            owner_id: OWNER,
            system_id: None,
        };
        guild
            .post_surface(ROOM, build_control_surface(ROOM, &marker))
            .await
            .expect("legacy surface");
        guild.push_message(ROOM, UserId(900), "chatter");
        assert!(protocol.ownership().get(ROOM).is_none());

        protocol
            .handle_action(ControlAction::Lock, ROOM, OWNER)
            .await
            .expect("fallback scan finds owner");
        assert_eq!(
            protocol.ownership().get(ROOM).map(|entry| entry.owner_id),
            Some(OWNER)
        );
    }

    #[tokio::test]
    async fn regression_surface_outside_lookback_is_not_found() {
        let (guild, protocol) = fixture(AccessMode::Open);
        protocol.attach(ROOM, OWNER, "hailstorm").await.expect("attach");
        protocol.ownership().remove(ROOM);
        for index in 0..10 {
            guild.push_message(ROOM, UserId(900), &format!("message {index}"));
        }
        let error = protocol
            .handle_action(ControlAction::Unlock, ROOM, OWNER)
            .await
            .expect_err("surface is beyond lookback");
        assert_eq!(error.to_string(), "Control panel not found.");
    }

    #[tokio::test]
    async fn unit_missing_channel_reports_not_found() {
        let (_guild, protocol) = fixture(AccessMode::Open);
        let error = protocol
            .handle_action(ControlAction::Lock, ChannelId(999), OWNER)
            .await
            .expect_err("missing channel");
        assert_eq!(error.to_string(), "Voice channel not found.");
    }
}
