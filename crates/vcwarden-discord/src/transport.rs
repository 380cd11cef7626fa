//! vcwarden transport traits over serenity's HTTP client and gateway cache.
//!
//! Voice locations and member names come from the cache, which the gateway keeps
//! current. Everything else is an HTTP call.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    ButtonStyle, Cache, Channel, CreateActionRow, CreateButton, CreateChannel, CreateEmbed,
    CreateEmbedFooter, CreateMessage, EditRole, GetMessages, GuildChannel, Http,
};
use vcwarden_core::{
    ChannelId, ChannelInfo, ChannelTransport, CreateVoiceChannel, GuildIdentity,
    MembershipTransport, MessageId, PermissionOverwrite, PostedMessage, RoleId, RoleTransport,
    SurfaceActionStyle, SurfaceMessage, TransportError, TransportResult, UserId, VoiceMember,
};

use crate::{
    channel_id, channel_kind, discord_channel_id, discord_guild_id, discord_overwrite,
    discord_role_id, discord_user_id, merge_discord_overwrite, message_id, overwrite_target,
    transport_error, user_id,
};

const MEMBER_PAGE_SIZE: u64 = 1_000;
const MAX_MESSAGE_FETCH: usize = 100;

#[derive(Clone)]
pub struct SerenityTransport {
    http: Arc<Http>,
    cache: Arc<Cache>,
    identity: GuildIdentity,
    guild: serenity::all::GuildId,
}

impl SerenityTransport {
    pub fn new(
        http: Arc<Http>,
        cache: Arc<Cache>,
        identity: GuildIdentity,
    ) -> TransportResult<Self> {
        let guild = discord_guild_id(identity.guild_id)?;
        Ok(Self {
            http,
            cache,
            identity,
            guild,
        })
    }

    /// Voice channel of every connected member, read from the cache.
    fn voice_locations(&self) -> Vec<(UserId, ChannelId, bool)> {
        self.cache
            .guild(self.guild)
            .map(|guild| {
                guild
                    .voice_states
                    .values()
                    .filter_map(|state| {
                        state.channel_id.map(|channel| {
                            (
                                user_id(state.user_id),
                                channel_id(channel),
                                state.deaf || state.self_deaf,
                            )
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn cached_username(&self, member: UserId) -> Option<String> {
        let discord_member = discord_user_id(member).ok()?;
        let guild = self.cache.guild(self.guild)?;
        let entry = guild.members.get(&discord_member)?;
        Some(entry.user.name.clone())
    }

    async fn guild_channel(&self, channel: ChannelId) -> TransportResult<Option<GuildChannel>> {
        let id = discord_channel_id(channel)?;
        match id.to_channel(&self.http).await {
            Ok(Channel::Guild(channel)) => Ok(Some(channel)),
            Ok(_) => Ok(None),
            Err(error) => {
                let error = transport_error("fetch channel", error);
                if error.is_not_found() {
                    Ok(None)
                } else {
                    Err(error)
                }
            }
        }
    }

    fn channel_info_from(&self, channel: &GuildChannel) -> ChannelInfo {
        let id = channel_id(channel.id);
        let member_count = self
            .voice_locations()
            .into_iter()
            .filter(|(_, location, _)| *location == id)
            .count();
        ChannelInfo {
            id,
            name: channel.name.clone(),
            kind: channel_kind(channel.kind),
            parent_id: channel.parent_id.map(channel_id),
            member_count,
        }
    }
}

fn surface_message(message: SurfaceMessage) -> CreateMessage {
    let embed = CreateEmbed::new()
        .title(message.title)
        .description(message.description)
        .color(message.color)
        .footer(CreateEmbedFooter::new(message.footer));
    let buttons = message
        .actions
        .into_iter()
        .map(|action| {
            let style = match action.style {
                SurfaceActionStyle::Danger => ButtonStyle::Danger,
                SurfaceActionStyle::Success => ButtonStyle::Success,
            };
            CreateButton::new(action.custom_id)
                .label(action.label)
                .style(style)
        })
        .collect::<Vec<_>>();
    CreateMessage::new()
        .embed(embed)
        .components(vec![CreateActionRow::Buttons(buttons)])
}

#[async_trait]
impl MembershipTransport for SerenityTransport {
    async fn member_location(&self, member: UserId) -> TransportResult<Option<ChannelId>> {
        Ok(self
            .voice_locations()
            .into_iter()
            .find(|(user, _, _)| *user == member)
            .map(|(_, channel, _)| channel))
    }

    async fn channel_members(&self, channel: ChannelId) -> TransportResult<Vec<VoiceMember>> {
        if self.guild_channel(channel).await?.is_none() {
            return Err(TransportError::NotFound(format!("channel {channel}")));
        }
        Ok(self
            .voice_locations()
            .into_iter()
            .filter(|(_, location, _)| *location == channel)
            .map(|(user, _, deafened)| VoiceMember {
                user_id: user,
                username: self
                    .cached_username(user)
                    .unwrap_or_else(|| user.to_string()),
                deafened,
            })
            .collect())
    }

    async fn member_display_name(&self, member: UserId) -> TransportResult<String> {
        let discord_member = discord_user_id(member)?;
        let member = self
            .guild
            .member(&self.http, discord_member)
            .await
            .map_err(|error| transport_error("fetch member", error))?;
        Ok(member.display_name().to_string())
    }

    async fn move_member(&self, member: UserId, destination: ChannelId) -> TransportResult<()> {
        self.guild
            .move_member(
                &self.http,
                discord_user_id(member)?,
                discord_channel_id(destination)?,
            )
            .await
            .map(|_| ())
            .map_err(|error| transport_error("move member", error))
    }
}

#[async_trait]
impl ChannelTransport for SerenityTransport {
    fn identity(&self) -> GuildIdentity {
        self.identity
    }

    async fn channel_info(&self, channel: ChannelId) -> TransportResult<Option<ChannelInfo>> {
        Ok(self
            .guild_channel(channel)
            .await?
            .map(|channel| self.channel_info_from(&channel)))
    }

    async fn channels_in_group(&self, parent: ChannelId) -> TransportResult<Vec<ChannelInfo>> {
        let parent = discord_channel_id(parent)?;
        let channels = self
            .guild
            .channels(&self.http)
            .await
            .map_err(|error| transport_error("list channels", error))?;
        Ok(channels
            .values()
            .filter(|channel| channel.parent_id == Some(parent))
            .map(|channel| self.channel_info_from(channel))
            .collect())
    }

    async fn create_voice_channel(
        &self,
        request: CreateVoiceChannel,
    ) -> TransportResult<ChannelId> {
        let overwrites = request
            .overwrites
            .iter()
            .map(discord_overwrite)
            .collect::<TransportResult<Vec<_>>>()?;
        let builder = CreateChannel::new(request.name)
            .kind(serenity::all::ChannelType::Voice)
            .category(discord_channel_id(request.parent_id)?)
            .permissions(overwrites);
        let channel = self
            .guild
            .create_channel(&self.http, builder)
            .await
            .map_err(|error| transport_error("create channel", error))?;
        Ok(channel_id(channel.id))
    }

    async fn delete_channel(&self, channel: ChannelId) -> TransportResult<()> {
        discord_channel_id(channel)?
            .delete(&self.http)
            .await
            .map(|_| ())
            .map_err(|error| transport_error("delete channel", error))
    }

    async fn edit_permission(
        &self,
        channel: ChannelId,
        patch: PermissionOverwrite,
    ) -> TransportResult<()> {
        let current = self
            .guild_channel(channel)
            .await?
            .ok_or_else(|| TransportError::NotFound(format!("channel {channel}")))?;
        let existing = current
            .permission_overwrites
            .iter()
            .find(|entry| overwrite_target(&entry.kind) == Some(patch.target));
        let merged = merge_discord_overwrite(existing, &patch)?;
        current
            .id
            .create_permission(&self.http, merged)
            .await
            .map_err(|error| transport_error("edit permission", error))
    }

    async fn post_surface(
        &self,
        channel: ChannelId,
        message: SurfaceMessage,
    ) -> TransportResult<MessageId> {
        let posted = discord_channel_id(channel)?
            .send_message(&self.http, surface_message(message))
            .await
            .map_err(|error| transport_error("post control surface", error))?;
        Ok(message_id(posted.id))
    }

    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> TransportResult<Vec<PostedMessage>> {
        let limit = u8::try_from(limit.clamp(1, MAX_MESSAGE_FETCH)).unwrap_or(u8::MAX);
        let messages = discord_channel_id(channel)?
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(|error| transport_error("fetch messages", error))?;
        Ok(messages
            .into_iter()
            .map(|message| {
                let embed = message.embeds.first();
                PostedMessage {
                    id: message_id(message.id),
                    author_id: user_id(message.author.id),
                    embed_title: embed.and_then(|embed| embed.title.clone()),
                    embed_footer: embed
                        .and_then(|embed| embed.footer.as_ref())
                        .map(|footer| footer.text.clone()),
                    content: message.content,
                }
            })
            .collect())
    }

    async fn send_text(&self, channel: ChannelId, content: String) -> TransportResult<MessageId> {
        let posted = discord_channel_id(channel)?
            .say(&self.http, content)
            .await
            .map_err(|error| transport_error("send message", error))?;
        Ok(message_id(posted.id))
    }
}

#[async_trait]
impl RoleTransport for SerenityTransport {
    async fn set_role_mentionable(&self, role: RoleId, mentionable: bool) -> TransportResult<()> {
        self.guild
            .edit_role(
                &self.http,
                discord_role_id(role)?,
                EditRole::new()
                    .mentionable(mentionable)
                    .audit_log_reason("Automatic ping permission update"),
            )
            .await
            .map(|_| ())
            .map_err(|error| transport_error("edit role", error))
    }

    async fn members_with_role(&self, role: RoleId) -> TransportResult<Vec<UserId>> {
        let role = discord_role_id(role)?;
        let mut holders = Vec::new();
        let mut after = None;
        loop {
            let page = self
                .guild
                .members(&self.http, Some(MEMBER_PAGE_SIZE), after)
                .await
                .map_err(|error| transport_error("list members", error))?;
            let page_len = page.len();
            after = page.last().map(|member| member.user.id);
            holders.extend(
                page.iter()
                    .filter(|member| member.roles.contains(&role))
                    .map(|member| user_id(member.user.id)),
            );
            if (page_len as u64) < MEMBER_PAGE_SIZE || after.is_none() {
                break;
            }
        }
        Ok(holders)
    }

    async fn add_member_role(&self, member: UserId, role: RoleId) -> TransportResult<()> {
        self.http
            .add_member_role(
                self.guild,
                discord_user_id(member)?,
                discord_role_id(role)?,
                None,
            )
            .await
            .map_err(|error| transport_error("add member role", error))
    }

    async fn remove_member_role(&self, member: UserId, role: RoleId) -> TransportResult<()> {
        self.http
            .remove_member_role(
                self.guild,
                discord_user_id(member)?,
                discord_role_id(role)?,
                None,
            )
            .await
            .map_err(|error| transport_error("remove member role", error))
    }
}

impl std::fmt::Debug for SerenityTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerenityTransport")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
