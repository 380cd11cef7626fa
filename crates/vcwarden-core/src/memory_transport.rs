//! In-process guild model implementing every transport trait.
//!
//! Backs unit and integration tests and the `--check-config` dry run. Failure
//! injection hooks let callers exercise per-member and per-role error paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::{
    ChannelId, ChannelInfo, ChannelKind, ChannelTransport, CreateVoiceChannel, GuildIdentity,
    MembershipTransport, MessageId, OverwriteTarget, PermissionOverwrite, PostedMessage, RoleId,
    RoleTransport, SurfaceMessage, TransportError, TransportResult, UserId, VoiceMember,
};

const FIRST_GENERATED_ID: u64 = 9_000_000_000;

#[derive(Debug, Clone)]
struct MemoryChannel {
    name: String,
    kind: ChannelKind,
    parent_id: Option<ChannelId>,
    overwrites: Vec<PermissionOverwrite>,
    messages: Vec<PostedMessage>,
    surfaces: Vec<SurfaceMessage>,
}

#[derive(Debug, Clone)]
struct MemoryMember {
    username: String,
    display_name: String,
    deafened: bool,
    roles: BTreeSet<RoleId>,
}

#[derive(Debug, Default)]
struct MemoryGuildState {
    channels: BTreeMap<ChannelId, MemoryChannel>,
    members: BTreeMap<UserId, MemoryMember>,
    locations: BTreeMap<UserId, ChannelId>,
    mentionable: BTreeMap<RoleId, bool>,
    next_id: u64,
    failing_moves: BTreeSet<UserId>,
    failing_roles: BTreeSet<RoleId>,
    failing_role_members: BTreeSet<UserId>,
    fail_channel_creation: bool,
    fail_surface_post: bool,
    fail_deletes: bool,
    call_log: Vec<String>,
}

impl MemoryGuildState {
    fn generate_id(&mut self) -> u64 {
        if self.next_id == 0 {
            self.next_id = FIRST_GENERATED_ID;
        }
        self.next_id += 1;
        self.next_id
    }

    fn member_count(&self, channel: ChannelId) -> usize {
        self.locations
            .values()
            .filter(|location| **location == channel)
            .count()
    }

    fn channel_info(&self, id: ChannelId) -> Option<ChannelInfo> {
        self.channels.get(&id).map(|channel| ChannelInfo {
            id,
            name: channel.name.clone(),
            kind: channel.kind,
            parent_id: channel.parent_id,
            member_count: self.member_count(id),
        })
    }
}

/// Thread-safe in-memory guild.
pub struct InMemoryGuild {
    identity: GuildIdentity,
    state: Mutex<MemoryGuildState>,
}

impl InMemoryGuild {
    pub fn new(identity: GuildIdentity) -> Self {
        Self {
            identity,
            state: Mutex::new(MemoryGuildState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryGuildState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_channel(
        &self,
        id: ChannelId,
        name: &str,
        kind: ChannelKind,
        parent_id: Option<ChannelId>,
    ) {
        self.lock().channels.insert(
            id,
            MemoryChannel {
                name: name.to_string(),
                kind,
                parent_id,
                overwrites: Vec::new(),
                messages: Vec::new(),
                surfaces: Vec::new(),
            },
        );
    }

    pub fn add_member(&self, id: UserId, username: &str, display_name: &str) {
        self.lock().members.insert(
            id,
            MemoryMember {
                username: username.to_string(),
                display_name: display_name.to_string(),
                deafened: false,
                roles: BTreeSet::new(),
            },
        );
    }

    pub fn set_deafened(&self, id: UserId, deafened: bool) {
        if let Some(member) = self.lock().members.get_mut(&id) {
            member.deafened = deafened;
        }
    }

    /// Places `member` in `location`, or disconnects them when `None`.
    pub fn place_member(&self, member: UserId, location: Option<ChannelId>) {
        let mut state = self.lock();
        match location {
            Some(channel) => state.locations.insert(member, channel),
            None => state.locations.remove(&member),
        };
    }

    pub fn add_role(&self, role: RoleId, mentionable: bool) {
        self.lock().mentionable.insert(role, mentionable);
    }

    pub fn grant_role(&self, member: UserId, role: RoleId) {
        if let Some(entry) = self.lock().members.get_mut(&member) {
            entry.roles.insert(role);
        }
    }

    /// Appends a message authored by `author` to a channel's history.
    pub fn push_message(&self, channel: ChannelId, author: UserId, content: &str) -> MessageId {
        let mut state = self.lock();
        let id = MessageId(state.generate_id());
        if let Some(entry) = state.channels.get_mut(&channel) {
            entry.messages.push(PostedMessage {
                id,
                author_id: author,
                content: content.to_string(),
                embed_title: None,
                embed_footer: None,
            });
        }
        id
    }

    pub fn fail_moves_for(&self, member: UserId) {
        self.lock().failing_moves.insert(member);
    }

    pub fn fail_role_updates_for(&self, role: RoleId) {
        self.lock().failing_roles.insert(role);
    }

    pub fn fail_member_role_edits_for(&self, member: UserId) {
        self.lock().failing_role_members.insert(member);
    }

    pub fn fail_channel_creation(&self, fail: bool) {
        self.lock().fail_channel_creation = fail;
    }

    pub fn fail_surface_posts(&self, fail: bool) {
        self.lock().fail_surface_post = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    pub fn channel(&self, id: ChannelId) -> Option<ChannelInfo> {
        self.lock().channel_info(id)
    }

    pub fn channels_named(&self, name: &str) -> Vec<ChannelInfo> {
        let state = self.lock();
        state
            .channels
            .iter()
            .filter(|(_, channel)| channel.name == name)
            .filter_map(|(id, _)| state.channel_info(*id))
            .collect()
    }

    pub fn channel_count(&self) -> usize {
        self.lock().channels.len()
    }

    pub fn overwrite_for(
        &self,
        channel: ChannelId,
        target: OverwriteTarget,
    ) -> Option<PermissionOverwrite> {
        self.lock().channels.get(&channel).and_then(|entry| {
            entry
                .overwrites
                .iter()
                .find(|overwrite| overwrite.target == target)
                .cloned()
        })
    }

    pub fn surfaces(&self, channel: ChannelId) -> Vec<SurfaceMessage> {
        self.lock()
            .channels
            .get(&channel)
            .map(|entry| entry.surfaces.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self, channel: ChannelId) -> Vec<PostedMessage> {
        self.lock()
            .channels
            .get(&channel)
            .map(|entry| entry.messages.clone())
            .unwrap_or_default()
    }

    pub fn location_of(&self, member: UserId) -> Option<ChannelId> {
        self.lock().locations.get(&member).copied()
    }

    pub fn role_mentionable(&self, role: RoleId) -> Option<bool> {
        self.lock().mentionable.get(&role).copied()
    }

    pub fn member_has_role(&self, member: UserId, role: RoleId) -> bool {
        self.lock()
            .members
            .get(&member)
            .is_some_and(|entry| entry.roles.contains(&role))
    }

    /// Mutating calls in the order they were received, e.g. `create:<name>`.
    pub fn call_log(&self) -> Vec<String> {
        self.lock().call_log.clone()
    }
}

#[async_trait]
impl MembershipTransport for InMemoryGuild {
    async fn member_location(&self, member: UserId) -> TransportResult<Option<ChannelId>> {
        Ok(self.lock().locations.get(&member).copied())
    }

    async fn channel_members(&self, channel: ChannelId) -> TransportResult<Vec<VoiceMember>> {
        let state = self.lock();
        if !state.channels.contains_key(&channel) {
            return Err(TransportError::NotFound(format!("channel {channel}")));
        }
        Ok(state
            .locations
            .iter()
            .filter(|(_, location)| **location == channel)
            .filter_map(|(user_id, _)| {
                state.members.get(user_id).map(|member| VoiceMember {
                    user_id: *user_id,
                    username: member.username.clone(),
                    deafened: member.deafened,
                })
            })
            .collect())
    }

    async fn member_display_name(&self, member: UserId) -> TransportResult<String> {
        self.lock()
            .members
            .get(&member)
            .map(|entry| entry.display_name.clone())
            .ok_or_else(|| TransportError::NotFound(format!("member {member}")))
    }

    async fn move_member(&self, member: UserId, destination: ChannelId) -> TransportResult<()> {
        let mut state = self.lock();
        state.call_log.push(format!("move:{member}->{destination}"));
        if state.failing_moves.contains(&member) {
            return Err(TransportError::Rejected(format!(
                "member {member} cannot be moved"
            )));
        }
        if !state.channels.contains_key(&destination) {
            return Err(TransportError::NotFound(format!("channel {destination}")));
        }
        if !state.locations.contains_key(&member) {
            return Err(TransportError::Rejected(format!(
                "member {member} is not connected to voice"
            )));
        }
        state.locations.insert(member, destination);
        Ok(())
    }
}

#[async_trait]
impl ChannelTransport for InMemoryGuild {
    fn identity(&self) -> GuildIdentity {
        self.identity
    }

    async fn channel_info(&self, channel: ChannelId) -> TransportResult<Option<ChannelInfo>> {
        Ok(self.lock().channel_info(channel))
    }

    async fn channels_in_group(&self, parent: ChannelId) -> TransportResult<Vec<ChannelInfo>> {
        let state = self.lock();
        Ok(state
            .channels
            .iter()
            .filter(|(_, channel)| channel.parent_id == Some(parent))
            .filter_map(|(id, _)| state.channel_info(*id))
            .collect())
    }

    async fn create_voice_channel(
        &self,
        request: CreateVoiceChannel,
    ) -> TransportResult<ChannelId> {
        let mut state = self.lock();
        state.call_log.push(format!("create:{}", request.name));
        if state.fail_channel_creation {
            return Err(TransportError::Failed("channel creation unavailable".to_string()));
        }
        let id = ChannelId(state.generate_id());
        state.channels.insert(
            id,
            MemoryChannel {
                name: request.name,
                kind: ChannelKind::Voice,
                parent_id: Some(request.parent_id),
                overwrites: request.overwrites,
                messages: Vec::new(),
                surfaces: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn delete_channel(&self, channel: ChannelId) -> TransportResult<()> {
        let mut state = self.lock();
        state.call_log.push(format!("delete:{channel}"));
        if state.fail_deletes {
            return Err(TransportError::Failed(format!("delete {channel} failed")));
        }
        if state.channels.remove(&channel).is_none() {
            return Err(TransportError::NotFound(format!("channel {channel}")));
        }
        state.locations.retain(|_, location| *location != channel);
        Ok(())
    }

    async fn edit_permission(
        &self,
        channel: ChannelId,
        patch: PermissionOverwrite,
    ) -> TransportResult<()> {
        let mut state = self.lock();
        state.call_log.push(format!("permission:{channel}"));
        let entry = state
            .channels
            .get_mut(&channel)
            .ok_or_else(|| TransportError::NotFound(format!("channel {channel}")))?;
        match entry
            .overwrites
            .iter_mut()
            .find(|overwrite| overwrite.target == patch.target)
        {
            Some(existing) => existing.merge(&patch),
            None => entry.overwrites.push(patch),
        }
        Ok(())
    }

    async fn post_surface(
        &self,
        channel: ChannelId,
        message: SurfaceMessage,
    ) -> TransportResult<MessageId> {
        let mut state = self.lock();
        state.call_log.push(format!("surface:{channel}"));
        if state.fail_surface_post {
            return Err(TransportError::Failed(
                "channel messaging not ready".to_string(),
            ));
        }
        let id = MessageId(state.generate_id());
        let author_id = self.identity.bot_user_id;
        let entry = state
            .channels
            .get_mut(&channel)
            .ok_or_else(|| TransportError::NotFound(format!("channel {channel}")))?;
        entry.messages.push(PostedMessage {
            id,
            author_id,
            content: String::new(),
            embed_title: Some(message.title.clone()),
            embed_footer: Some(message.footer.clone()),
        });
        entry.surfaces.push(message);
        Ok(id)
    }

    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> TransportResult<Vec<PostedMessage>> {
        let state = self.lock();
        let entry = state
            .channels
            .get(&channel)
            .ok_or_else(|| TransportError::NotFound(format!("channel {channel}")))?;
        Ok(entry.messages.iter().rev().take(limit).cloned().collect())
    }

    async fn send_text(&self, channel: ChannelId, content: String) -> TransportResult<MessageId> {
        let author = self.identity.bot_user_id;
        let mut state = self.lock();
        state.call_log.push(format!("text:{channel}"));
        if !state.channels.contains_key(&channel) {
            return Err(TransportError::NotFound(format!("channel {channel}")));
        }
        drop(state);
        Ok(self.push_message(channel, author, &content))
    }
}

#[async_trait]
impl RoleTransport for InMemoryGuild {
    async fn set_role_mentionable(&self, role: RoleId, mentionable: bool) -> TransportResult<()> {
        let mut state = self.lock();
        state.call_log.push(format!("mentionable:{role}={mentionable}"));
        if state.failing_roles.contains(&role) {
            return Err(TransportError::Rejected(format!("role {role} is above the bot")));
        }
        match state.mentionable.get_mut(&role) {
            Some(entry) => {
                *entry = mentionable;
                Ok(())
            }
            None => Err(TransportError::NotFound(format!("role {role}"))),
        }
    }

    async fn members_with_role(&self, role: RoleId) -> TransportResult<Vec<UserId>> {
        Ok(self
            .lock()
            .members
            .iter()
            .filter(|(_, member)| member.roles.contains(&role))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn add_member_role(&self, member: UserId, role: RoleId) -> TransportResult<()> {
        self.edit_member_role(member, role, true)
    }

    async fn remove_member_role(&self, member: UserId, role: RoleId) -> TransportResult<()> {
        self.edit_member_role(member, role, false)
    }
}

impl InMemoryGuild {
    fn edit_member_role(&self, member: UserId, role: RoleId, add: bool) -> TransportResult<()> {
        let mut state = self.lock();
        if state.failing_role_members.contains(&member) {
            return Err(TransportError::Rejected(format!(
                "member {member} outranks the bot"
            )));
        }
        let entry = state
            .members
            .get_mut(&member)
            .ok_or_else(|| TransportError::NotFound(format!("member {member}")))?;
        if add {
            entry.roles.insert(role);
        } else {
            entry.roles.remove(&role);
        }
        Ok(())
    }
}
