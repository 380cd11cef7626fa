//! Conversions between vcwarden and serenity model types.

use std::collections::BTreeSet;
use std::num::NonZeroU64;

use serenity::all::{
    ChannelType, PermissionOverwrite as SerenityOverwrite, PermissionOverwriteType, Permissions,
};
use vcwarden_core::{
    ChannelId, ChannelKind, ChannelPermission, GuildId, MessageId, OverwriteTarget,
    PermissionOverwrite, RoleId, TransportError, UserId,
};

const DISCORD_PERMISSIONS: [(ChannelPermission, Permissions); 4] = [
    (ChannelPermission::View, Permissions::VIEW_CHANNEL),
    (ChannelPermission::Connect, Permissions::CONNECT),
    (ChannelPermission::Send, Permissions::SEND_MESSAGES),
    (ChannelPermission::Manage, Permissions::MANAGE_CHANNELS),
];

fn non_zero(raw: u64, kind: &str) -> Result<NonZeroU64, TransportError> {
    NonZeroU64::new(raw)
        .ok_or_else(|| TransportError::Rejected(format!("{kind} id 0 is not a valid snowflake")))
}

pub fn discord_channel_id(id: ChannelId) -> Result<serenity::all::ChannelId, TransportError> {
    non_zero(id.get(), "channel").map(serenity::all::ChannelId::from)
}

pub fn discord_user_id(id: UserId) -> Result<serenity::all::UserId, TransportError> {
    non_zero(id.get(), "user").map(serenity::all::UserId::from)
}

pub fn discord_role_id(id: RoleId) -> Result<serenity::all::RoleId, TransportError> {
    non_zero(id.get(), "role").map(serenity::all::RoleId::from)
}

pub fn discord_guild_id(id: GuildId) -> Result<serenity::all::GuildId, TransportError> {
    non_zero(id.get(), "guild").map(serenity::all::GuildId::from)
}

pub fn channel_id(id: serenity::all::ChannelId) -> ChannelId {
    ChannelId(id.get())
}

pub fn user_id(id: serenity::all::UserId) -> UserId {
    UserId(id.get())
}

pub fn role_id(id: serenity::all::RoleId) -> RoleId {
    RoleId(id.get())
}

pub fn message_id(id: serenity::all::MessageId) -> MessageId {
    MessageId(id.get())
}

pub fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Voice => ChannelKind::Voice,
        ChannelType::Stage => ChannelKind::Stage,
        ChannelType::Text | ChannelType::News => ChannelKind::Text,
        ChannelType::Category => ChannelKind::Category,
        _ => ChannelKind::Other,
    }
}

pub fn channel_type(kind: ChannelKind) -> Option<ChannelType> {
    match kind {
        ChannelKind::Voice => Some(ChannelType::Voice),
        ChannelKind::Stage => Some(ChannelType::Stage),
        ChannelKind::Text => Some(ChannelType::Text),
        ChannelKind::Category => Some(ChannelType::Category),
        ChannelKind::Other => None,
    }
}

pub fn permission_bits(permissions: &BTreeSet<ChannelPermission>) -> Permissions {
    DISCORD_PERMISSIONS
        .iter()
        .filter(|(permission, _)| permissions.contains(permission))
        .fold(Permissions::empty(), |bits, (_, flag)| bits | *flag)
}

pub fn overwrite_kind(target: OverwriteTarget) -> Result<PermissionOverwriteType, TransportError> {
    Ok(match target {
        OverwriteTarget::Role(role) => PermissionOverwriteType::Role(discord_role_id(role)?),
        OverwriteTarget::Member(member) => {
            PermissionOverwriteType::Member(discord_user_id(member)?)
        }
    })
}

pub fn overwrite_target(kind: &PermissionOverwriteType) -> Option<OverwriteTarget> {
    match kind {
        PermissionOverwriteType::Role(role) => Some(OverwriteTarget::Role(role_id(*role))),
        PermissionOverwriteType::Member(member) => Some(OverwriteTarget::Member(user_id(*member))),
        _ => None,
    }
}

pub fn discord_overwrite(overwrite: &PermissionOverwrite) -> Result<SerenityOverwrite, TransportError> {
    Ok(SerenityOverwrite {
        allow: permission_bits(&overwrite.allow),
        deny: permission_bits(&overwrite.deny),
        kind: overwrite_kind(overwrite.target)?,
    })
}

/// Applies `patch` to an existing overwrite; bits the patch does not mention,
/// including ones vcwarden does not model, are kept.
pub fn merge_discord_overwrite(
    existing: Option<&SerenityOverwrite>,
    patch: &PermissionOverwrite,
) -> Result<SerenityOverwrite, TransportError> {
    let patch_allow = permission_bits(&patch.allow);
    let patch_deny = permission_bits(&patch.deny);
    let (allow, deny) = existing
        .map(|entry| (entry.allow, entry.deny))
        .unwrap_or((Permissions::empty(), Permissions::empty()));
    Ok(SerenityOverwrite {
        allow: (allow | patch_allow) & !patch_deny,
        deny: (deny | patch_deny) & !patch_allow,
        kind: overwrite_kind(patch.target)?,
    })
}

/// Maps a serenity failure onto the transport taxonomy by HTTP status.
pub fn transport_error(action: &str, error: serenity::Error) -> TransportError {
    let status = match &error {
        serenity::Error::Http(http_error) => http_error.status_code().map(|code| code.as_u16()),
        _ => None,
    };
    match status {
        Some(404) => TransportError::NotFound(format!("{action}: {error}")),
        Some(400 | 403) => TransportError::Rejected(format!("{action}: {error}")),
        _ => TransportError::Failed(format!("{action}: {error}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_permission_bits_cover_modelled_permissions() {
        let all = [
            ChannelPermission::View,
            ChannelPermission::Connect,
            ChannelPermission::Send,
            ChannelPermission::Manage,
        ]
        .into_iter()
        .collect::<BTreeSet<_>>();
        assert_eq!(
            permission_bits(&all),
            Permissions::VIEW_CHANNEL
                | Permissions::CONNECT
                | Permissions::SEND_MESSAGES
                | Permissions::MANAGE_CHANNELS
        );
        assert_eq!(permission_bits(&BTreeSet::new()), Permissions::empty());
    }

    #[test]
    fn regression_merge_keeps_unmodelled_bits() {
        let existing = SerenityOverwrite {
            allow: Permissions::VIEW_CHANNEL | Permissions::SPEAK,
            deny: Permissions::SEND_MESSAGES,
            kind: PermissionOverwriteType::Role(serenity::all::RoleId::new(77)),
        };
        let patch = PermissionOverwrite::new(OverwriteTarget::Role(RoleId(77)))
            .denying(&[ChannelPermission::Connect])
            .allowing(&[ChannelPermission::View]);
        let merged = merge_discord_overwrite(Some(&existing), &patch).expect("merge");
        assert_eq!(merged.allow, Permissions::VIEW_CHANNEL | Permissions::SPEAK);
        assert_eq!(merged.deny, Permissions::SEND_MESSAGES | Permissions::CONNECT);
    }

    #[test]
    fn unit_zero_ids_are_rejected_not_panicking() {
        assert!(discord_channel_id(ChannelId(0)).is_err());
        assert_eq!(
            discord_channel_id(ChannelId(42)).map(channel_id),
            Ok(ChannelId(42))
        );
    }

    #[test]
    fn unit_channel_kind_round_trip_for_modelled_kinds() {
        for kind in [
            ChannelKind::Voice,
            ChannelKind::Stage,
            ChannelKind::Text,
            ChannelKind::Category,
        ] {
            assert_eq!(channel_type(kind).map(channel_kind), Some(kind));
        }
        assert_eq!(channel_kind(ChannelType::Forum), ChannelKind::Other);
    }
}
