//! Transport seams between vcwarden logic and the chat platform.
//!
//! Channel and membership state is owned by the platform; nothing here caches
//! it. Every lookup goes back through these traits so callers can re-validate
//! right before an irreversible action.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ChannelId, GuildId, MessageId, RoleId, TransportError, UserId};

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ChannelKind` values.
pub enum ChannelKind {
    Voice,
    Stage,
    Text,
    Category,
    Other,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Stage => "stage",
            Self::Text => "text",
            Self::Category => "category",
            Self::Other => "other",
        }
    }

    /// Voice and stage channels are the only kinds members can occupy.
    pub fn is_occupiable(self) -> bool {
        matches!(self, Self::Voice | Self::Stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Point-in-time view of a channel read from the platform.
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<ChannelId>,
    pub member_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceMember {
    pub user_id: UserId,
    pub username: String,
    pub deafened: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Identity of the acting bot inside one guild.
pub struct GuildIdentity {
    pub guild_id: GuildId,
    pub bot_user_id: UserId,
}

impl GuildIdentity {
    pub fn everyone_role(&self) -> RoleId {
        self.guild_id.everyone_role()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Channel permission bits vcwarden reads or writes.
pub enum ChannelPermission {
    View,
    Connect,
    Send,
    Manage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverwriteTarget {
    Role(RoleId),
    Member(UserId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Allow/deny entry for one role or member on one channel.
///
/// Used both as a full overwrite (channel creation) and as a patch: when
/// applied through [`ChannelTransport::edit_permission`] only the listed bits
/// change and every other bit of the existing entry is kept.
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    pub allow: BTreeSet<ChannelPermission>,
    pub deny: BTreeSet<ChannelPermission>,
}

impl PermissionOverwrite {
    pub fn new(target: OverwriteTarget) -> Self {
        Self {
            target,
            allow: BTreeSet::new(),
            deny: BTreeSet::new(),
        }
    }

    pub fn allowing(mut self, permissions: &[ChannelPermission]) -> Self {
        for permission in permissions {
            self.deny.remove(permission);
            self.allow.insert(*permission);
        }
        self
    }

    pub fn denying(mut self, permissions: &[ChannelPermission]) -> Self {
        for permission in permissions {
            self.allow.remove(permission);
            self.deny.insert(*permission);
        }
        self
    }

    /// `Some(true)` when allowed, `Some(false)` when denied, `None` when inherited.
    pub fn state(&self, permission: ChannelPermission) -> Option<bool> {
        if self.allow.contains(&permission) {
            Some(true)
        } else if self.deny.contains(&permission) {
            Some(false)
        } else {
            None
        }
    }

    /// Applies `patch` on top of this entry; bits the patch does not mention are kept.
    pub fn merge(&mut self, patch: &PermissionOverwrite) {
        for permission in &patch.allow {
            self.deny.remove(permission);
            self.allow.insert(*permission);
        }
        for permission in &patch.deny {
            self.allow.remove(permission);
            self.deny.insert(*permission);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVoiceChannel {
    pub name: String,
    pub parent_id: ChannelId,
    pub overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceActionStyle {
    Danger,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceAction {
    pub custom_id: String,
    pub label: String,
    pub style: SurfaceActionStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Embed-style message with buttons, posted as a channel's control surface.
pub struct SurfaceMessage {
    pub title: String,
    pub description: String,
    pub footer: String,
    pub color: u32,
    pub actions: Vec<SurfaceAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Message read back from a channel's history.
pub struct PostedMessage {
    pub id: MessageId,
    pub author_id: UserId,
    pub content: String,
    pub embed_title: Option<String>,
    pub embed_footer: Option<String>,
}

#[async_trait]
/// Trait contract for member location reads and relocation.
pub trait MembershipTransport: Send + Sync {
    /// Current voice location of `member`, re-read from the platform.
    async fn member_location(&self, member: UserId) -> TransportResult<Option<ChannelId>>;

    async fn channel_members(&self, channel: ChannelId) -> TransportResult<Vec<VoiceMember>>;

    /// Preferred display name (nickname, then global name, then username).
    async fn member_display_name(&self, member: UserId) -> TransportResult<String>;

    async fn move_member(&self, member: UserId, destination: ChannelId) -> TransportResult<()>;
}

#[async_trait]
/// Trait contract for channel lifecycle, permission, and message operations.
pub trait ChannelTransport: Send + Sync {
    fn identity(&self) -> GuildIdentity;

    async fn channel_info(&self, channel: ChannelId) -> TransportResult<Option<ChannelInfo>>;

    async fn channels_in_group(&self, parent: ChannelId) -> TransportResult<Vec<ChannelInfo>>;

    async fn create_voice_channel(&self, request: CreateVoiceChannel)
        -> TransportResult<ChannelId>;

    async fn delete_channel(&self, channel: ChannelId) -> TransportResult<()>;

    /// Merges `patch` into the channel's existing entry for `patch.target`.
    async fn edit_permission(
        &self,
        channel: ChannelId,
        patch: PermissionOverwrite,
    ) -> TransportResult<()>;

    async fn post_surface(
        &self,
        channel: ChannelId,
        message: SurfaceMessage,
    ) -> TransportResult<MessageId>;

    /// Most recent `limit` messages, newest first.
    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> TransportResult<Vec<PostedMessage>>;

    async fn send_text(&self, channel: ChannelId, content: String) -> TransportResult<MessageId>;
}

#[async_trait]
/// Trait contract for guild role reads and edits.
pub trait RoleTransport: Send + Sync {
    async fn set_role_mentionable(&self, role: RoleId, mentionable: bool) -> TransportResult<()>;

    async fn members_with_role(&self, role: RoleId) -> TransportResult<Vec<UserId>>;

    async fn add_member_role(&self, member: UserId, role: RoleId) -> TransportResult<()>;

    async fn remove_member_role(&self, member: UserId, role: RoleId) -> TransportResult<()>;
}

/// Full guild transport: everything vcwarden needs from the platform.
pub trait GuildTransport: MembershipTransport + ChannelTransport + RoleTransport {}

impl<T> GuildTransport for T where T: MembershipTransport + ChannelTransport + RoleTransport + ?Sized {}
