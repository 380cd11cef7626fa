//! Command bodies. Each returns a reply or a caller-displayable error.

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::warn;
use vcwarden_core::{
    format_cycle_duration, parse_time_input, zone_for_label, ChannelKind, ChannelTransport,
    GuildTransport, MembershipTransport, MoveRouteConfig, NightCycle, RoleTransport,
    VcWardenError,
};
use vcwarden_voice::{collect_occupants, move_members};

use crate::{chunk_names, CommandReply, CommandRequest, InfoCard, InfoField, MESSAGE_CHUNK_LIMIT};

const NIGHT_CARD_TITLE: &str = "🌙 Night Cycle Information";
const NIGHT_COLOR: u32 = 0x2B2D31;
const DAY_COLOR: u32 = 0xFEE75C;

/// `night [time] [date] [timezone]`.
pub fn night_command(
    request: &CommandRequest,
    cycle: &NightCycle,
    now: DateTime<Tz>,
) -> Result<CommandReply, VcWardenError> {
    let label = request
        .string("timezone")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("EST")
        .to_ascii_uppercase();
    let zone = zone_for_label(&label);
    let time = request.string("time").map(str::trim).filter(|value| !value.is_empty());
    let date = request.string("date").map(str::trim).filter(|value| !value.is_empty());
    let target = parse_time_input(time, date, zone, now)?;
    let status = cycle.status_at(&target);

    let field = |name: &str, value: String| InfoField {
        name: name.to_string(),
        value,
    };
    let mut fields = Vec::new();
    if time.is_none() {
        fields.push(field(
            "Current Status",
            if status.is_night {
                "🌙 Night Cycle Active".to_string()
            } else {
                "☀️ Day Cycle Active".to_string()
            },
        ));
        fields.push(field(
            "Time Until Next Night",
            format_cycle_duration(status.seconds_until_next_night),
        ));
        if let Some(left) = status.seconds_left_in_night {
            fields.push(field(
                "Time Remaining in Night Cycle",
                format_cycle_duration(left),
            ));
        }
    } else {
        let on_date = date
            .map(|_| format!(" on {}", target.format("%m/%d/%y")))
            .unwrap_or_default();
        fields.push(field(
            "Specified Time",
            format!("{} {label}{on_date}", target.format("%-I:%M %p")),
        ));
        fields.push(field(
            "Status",
            if status.is_night {
                "🌙 Night Cycle Active".to_string()
            } else {
                "☀️ No Night Cycle Active".to_string()
            },
        ));
        fields.push(field(
            "Previous Night Cycle",
            status
                .previous_night_start
                .with_timezone(&zone)
                .format("%-I:%M %p")
                .to_string(),
        ));
        fields.push(field(
            "Next Night Cycle",
            status
                .next_night_start
                .with_timezone(&zone)
                .format("%-I:%M %p")
                .to_string(),
        ));
    }

    Ok(CommandReply::Card(InfoCard {
        title: NIGHT_CARD_TITLE.to_string(),
        color: if status.is_night { NIGHT_COLOR } else { DAY_COLOR },
        fields,
    }))
}

/// `listvc channel`: names of non-deafened members, chunked.
pub async fn list_voice_command(
    request: &CommandRequest,
    transport: &dyn GuildTransport,
) -> Result<CommandReply, VcWardenError> {
    let channel_id = request.required_channel("channel")?;
    let channel = transport
        .channel_info(channel_id)
        .await?
        .filter(|channel| matches!(channel.kind, ChannelKind::Voice | ChannelKind::Stage))
        .ok_or_else(|| VcWardenError::validation("Please select a voice or stage channel"))?;

    let usernames = transport
        .channel_members(channel.id)
        .await?
        .into_iter()
        .filter(|member| !member.deafened)
        .map(|member| member.username)
        .collect::<Vec<_>>();
    if usernames.is_empty() {
        return Ok(CommandReply::Text(format!("{} is empty", channel.name)));
    }
    Ok(CommandReply::Chunks(chunk_names(
        &usernames,
        MESSAGE_CHUNK_LIMIT,
    )))
}

/// `addrole filter_role target_role [remove]`.
pub async fn add_role_command(
    request: &CommandRequest,
    transport: &dyn GuildTransport,
) -> Result<CommandReply, VcWardenError> {
    let filter_role = request.required_role("filter_role")?;
    let target_role = request.required_role("target_role")?;
    let remove = request.boolean("remove").unwrap_or(false);

    let members = transport.members_with_role(filter_role).await?;
    if members.is_empty() {
        return Ok(CommandReply::Text(format!(
            "No members found with the role <@&{filter_role}>"
        )));
    }

    let mut succeeded = 0_usize;
    let mut failed = 0_usize;
    for member in members {
        let result = if remove {
            transport.remove_member_role(member, target_role).await
        } else {
            transport.add_member_role(member, target_role).await
        };
        match result {
            Ok(()) => succeeded += 1,
            Err(error) => {
                failed += 1;
                warn!(
                    member_id = %member,
                    role_id = %target_role,
                    remove,
                    %error,
                    "member role update failed"
                );
            }
        }
    }

    let action = if remove { "removed from" } else { "added to" };
    let mut reply = format!(
        "✅ Role update complete:\n- <@&{target_role}> {action} {succeeded} members with <@&{filter_role}>"
    );
    if failed > 0 {
        reply.push_str(&format!("\n- ⚠️ Failed for {failed} members"));
    }
    Ok(CommandReply::Text(reply))
}

/// Moves everyone in the route's sources to its destination.
pub async fn move_route_command(
    route: &MoveRouteConfig,
    transport: &dyn GuildTransport,
) -> Result<CommandReply, VcWardenError> {
    let destination = route.destination_channel_id;
    if transport.channel_info(destination).await?.is_none() {
        return Err(VcWardenError::not_found(format!(
            "Destination channel not found (ID: {destination})"
        )));
    }
    let members =
        collect_occupants(transport, &route.source_channel_ids, Some(destination)).await?;
    let report = move_members(transport, &members, destination).await?;
    let mut reply = format!("✅ Moved {} members to <#{destination}>", report.moved);
    if report.failed > 0 {
        reply.push_str(&format!("\n- ⚠️ Failed to move {} members", report.failed));
    }
    Ok(CommandReply::Text(reply))
}
