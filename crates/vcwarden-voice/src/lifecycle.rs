//! Trigger-driven creation and empty-channel reclamation.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use vcwarden_core::{
    AccessMode, ChannelCreationConfig, ChannelId, ChannelPermission, ChannelPolicyRegistry,
    ChannelSystemConfig, ChannelTransport, CreateVoiceChannel, GuildIdentity, GuildTransport,
    MembershipTransport, OverwriteTarget, PermissionOverwrite, UserId, VcWardenError,
};

use crate::{ControlSurfaceProtocol, ManagedChannel, OwnershipRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
/// A member's voice location moved from `old_location` to `new_location`.
pub struct LocationChange {
    pub member: UserId,
    pub old_location: Option<ChannelId>,
    pub new_location: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
/// Enumerates supported `TriggerOutcome` values.
pub enum TriggerOutcome {
    NotTrigger,
    /// The member was no longer in the trigger channel when re-checked.
    MemberLeft,
    Created {
        channel_id: ChannelId,
        surface_attached: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ReclaimOutcome` values.
pub enum ReclaimOutcome {
    AlreadyGone,
    NotManaged,
    Protected,
    NotEmpty,
    Deleted,
    DeleteFailed,
}

impl ReclaimOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyGone => "already_gone",
            Self::NotManaged => "not_managed",
            Self::Protected => "protected",
            Self::NotEmpty => "not_empty",
            Self::Deleted => "deleted",
            Self::DeleteFailed => "delete_failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocationChangeReport {
    pub reclaimed: Option<ReclaimOutcome>,
    pub trigger: Option<TriggerOutcome>,
}

/// Builds the display name `<first N chars of preferred name><suffix>`.
pub fn managed_channel_name(display_name: &str, config: &ChannelCreationConfig) -> String {
    let base = display_name
        .trim()
        .chars()
        .take(config.name_max_chars)
        .collect::<String>();
    format!("{base}{}", config.name_suffix)
}

/// Overwrites installed on a freshly created managed channel.
pub fn build_channel_overwrites(
    identity: GuildIdentity,
    owner: UserId,
    access: &AccessMode,
) -> Vec<PermissionOverwrite> {
    use ChannelPermission::{Connect, Manage, Send, View};

    let everyone = OverwriteTarget::Role(identity.everyone_role());
    let mut overwrites = vec![
        PermissionOverwrite::new(OverwriteTarget::Member(identity.bot_user_id))
            .allowing(&[Send, View]),
        PermissionOverwrite::new(OverwriteTarget::Member(owner))
            .allowing(&[Manage, Connect, View]),
    ];
    match access {
        AccessMode::Restricted { gating_role_id } => {
            overwrites.push(PermissionOverwrite::new(everyone).denying(&[Connect, Send, View]));
            overwrites.push(
                PermissionOverwrite::new(OverwriteTarget::Role(*gating_role_id))
                    .allowing(&[Connect, View]),
            );
        }
        AccessMode::Open => {
            overwrites.push(
                PermissionOverwrite::new(everyone)
                    .denying(&[Send])
                    .allowing(&[Connect, View]),
            );
        }
    }
    overwrites
}

/// Reacts to voice location changes for every configured voice system.
pub struct ChannelLifecycleManager {
    transport: Arc<dyn GuildTransport>,
    registry: Arc<ChannelPolicyRegistry>,
    ownership: Arc<OwnershipRegistry>,
    surfaces: Arc<ControlSurfaceProtocol>,
    creation: ChannelCreationConfig,
}

impl ChannelLifecycleManager {
    pub fn new(
        transport: Arc<dyn GuildTransport>,
        registry: Arc<ChannelPolicyRegistry>,
        ownership: Arc<OwnershipRegistry>,
        surfaces: Arc<ControlSurfaceProtocol>,
        creation: ChannelCreationConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            ownership,
            surfaces,
            creation,
        }
    }

    /// Reclaims the old location, then evaluates the new one as a trigger.
    ///
    /// Reclamation failures are logged and never block the trigger path.
    pub async fn handle_location_change(
        &self,
        change: LocationChange,
    ) -> Result<LocationChangeReport, VcWardenError> {
        let mut report = LocationChangeReport::default();
        if let Some(old) = change.old_location {
            if change.new_location != Some(old) {
                let outcome = self.on_location_emptied(old).await;
                debug!(
                    channel_id = %old,
                    member_id = %change.member,
                    outcome = outcome.as_str(),
                    "vacated location checked for reclaim"
                );
                report.reclaimed = Some(outcome);
            }
        }
        if let Some(new) = change.new_location {
            if change.old_location != Some(new) {
                report.trigger = Some(self.on_enter_trigger(change.member, new).await?);
            }
        }
        Ok(report)
    }

    pub async fn on_enter_trigger(
        &self,
        member: UserId,
        location: ChannelId,
    ) -> Result<TriggerOutcome, VcWardenError> {
        let Some(system) = self.registry.system_for_trigger(location) else {
            return Ok(TriggerOutcome::NotTrigger);
        };

        let current = self.transport.member_location(member).await?;
        if current != Some(location) {
            debug!(
                member_id = %member,
                trigger_channel_id = %location,
                "member left trigger before channel creation"
            );
            return Ok(TriggerOutcome::MemberLeft);
        }

        let display_name = self.transport.member_display_name(member).await?;
        let name = managed_channel_name(&display_name, &self.creation);
        let identity = self.transport.identity();
        let request = CreateVoiceChannel {
            name: name.clone(),
            parent_id: system.parent_group_id,
            overwrites: build_channel_overwrites(identity, member, &system.access),
        };
        let channel_id = match self.transport.create_voice_channel(request).await {
            Ok(channel_id) => channel_id,
            Err(error) => {
                warn!(
                    system_id = %system.system_id,
                    member_id = %member,
                    %error,
                    "managed channel creation failed"
                );
                return Err(error.into());
            }
        };

        if let Err(error) = self.transport.move_member(member, channel_id).await {
            warn!(
                channel_id = %channel_id,
                member_id = %member,
                %error,
                "owner move failed; removing new channel"
            );
            self.rollback(channel_id).await;
            return Err(error.into());
        }

        self.ownership.record(ManagedChannel {
            channel_id,
            parent_group_id: system.parent_group_id,
            owner_id: member,
            system_id: Some(system.system_id.clone()),
        });
        info!(
            channel_id = %channel_id,
            system_id = %system.system_id,
            owner_id = %member,
            channel_name = %name,
            access = system.access.as_str(),
            "managed channel created"
        );

        if self.creation.settle_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.creation.settle_delay_ms)).await;
        }
        let surface_attached = self.attach_surface(channel_id, member, system).await;
        Ok(TriggerOutcome::Created {
            channel_id,
            surface_attached,
        })
    }

    async fn attach_surface(
        &self,
        channel_id: ChannelId,
        owner: UserId,
        system: &ChannelSystemConfig,
    ) -> bool {
        match self
            .surfaces
            .attach(channel_id, owner, &system.system_id)
            .await
        {
            Ok(_) => true,
            Err(error) => {
                warn!(
                    channel_id = %channel_id,
                    owner_id = %owner,
                    %error,
                    "control surface attach failed; owner cannot lock or unlock"
                );
                false
            }
        }
    }

    async fn rollback(&self, channel_id: ChannelId) {
        match self.transport.delete_channel(channel_id).await {
            Ok(()) => {}
            Err(error) if error.is_not_found() => {}
            Err(error) => {
                warn!(channel_id = %channel_id, %error, "rollback delete failed");
            }
        }
    }

    /// Deletes `location` if it is an empty, non-protected channel in a managed group.
    pub async fn on_location_emptied(&self, location: ChannelId) -> ReclaimOutcome {
        let channel = match self.transport.channel_info(location).await {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                self.ownership.remove(location);
                return ReclaimOutcome::AlreadyGone;
            }
            Err(error) if error.is_not_found() => {
                self.ownership.remove(location);
                return ReclaimOutcome::AlreadyGone;
            }
            Err(error) => {
                warn!(channel_id = %location, %error, "could not read channel for reclaim");
                return ReclaimOutcome::DeleteFailed;
            }
        };
        let managed_group = channel
            .parent_id
            .is_some_and(|group| self.registry.is_managed_group(group));
        if !managed_group || !channel.kind.is_occupiable() {
            return ReclaimOutcome::NotManaged;
        }
        if self.registry.is_protected(location) {
            return ReclaimOutcome::Protected;
        }
        if channel.member_count > 0 {
            return ReclaimOutcome::NotEmpty;
        }

        match self.transport.delete_channel(location).await {
            Ok(()) => {
                self.ownership.remove(location);
                info!(channel_id = %location, channel_name = %channel.name, "managed channel reclaimed");
                ReclaimOutcome::Deleted
            }
            Err(error) if error.is_not_found() => {
                self.ownership.remove(location);
                debug!(channel_id = %location, "channel already deleted during reclaim");
                ReclaimOutcome::AlreadyGone
            }
            Err(error) => {
                warn!(channel_id = %location, %error, "managed channel delete failed");
                ReclaimOutcome::DeleteFailed
            }
        }
    }
}
