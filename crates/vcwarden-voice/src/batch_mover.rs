use std::collections::BTreeSet;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use vcwarden_core::{ChannelId, MembershipTransport, UserId, VcWardenError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
/// Outcome counts of one batch relocation.
pub struct BatchMoveReport {
    pub moved: usize,
    pub failed: usize,
}

impl BatchMoveReport {
    pub fn attempted(&self) -> usize {
        self.moved + self.failed
    }
}

/// Moves every member in `members` to `destination` concurrently.
///
/// Individual failures are logged and counted; they never abort siblings and
/// never turn into an aggregate error. Duplicate ids are moved once.
pub async fn move_members<T>(
    transport: &T,
    members: &[UserId],
    destination: ChannelId,
) -> Result<BatchMoveReport, VcWardenError>
where
    T: MembershipTransport + ?Sized,
{
    let unique = members.iter().copied().collect::<BTreeSet<_>>();
    if unique.is_empty() {
        return Err(VcWardenError::validation("No members to move"));
    }

    let outcomes = join_all(unique.into_iter().map(|member| async move {
        match transport.move_member(member, destination).await {
            Ok(()) => true,
            Err(error) => {
                warn!(member_id = %member, destination = %destination, %error, "failed to move member");
                false
            }
        }
    }))
    .await;

    let moved = outcomes.iter().filter(|moved| **moved).count();
    let report = BatchMoveReport {
        moved,
        failed: outcomes.len() - moved,
    };
    info!(
        destination = %destination,
        moved = report.moved,
        failed = report.failed,
        "batch move finished"
    );
    Ok(report)
}

/// Collects everyone currently in any of `sources`, skipping `exclude`.
pub async fn collect_occupants<T>(
    transport: &T,
    sources: &[ChannelId],
    exclude: Option<ChannelId>,
) -> Result<Vec<UserId>, VcWardenError>
where
    T: MembershipTransport + ?Sized,
{
    let mut occupants = BTreeSet::new();
    for source in sources {
        if Some(*source) == exclude {
            continue;
        }
        match transport.channel_members(*source).await {
            Ok(members) => occupants.extend(members.into_iter().map(|member| member.user_id)),
            Err(error) if error.is_not_found() => {
                return Err(VcWardenError::not_found(format!(
                    "channel not found (ID: {source})"
                )));
            }
            Err(error) => return Err(error.into()),
        }
    }
    Ok(occupants.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use vcwarden_core::{ChannelKind, GuildId, GuildIdentity, InMemoryGuild};

    use super::*;

    const LOBBY: ChannelId = ChannelId(100);
    const STAGE: ChannelId = ChannelId(200);

    fn guild_with_members(count: u64) -> InMemoryGuild {
        let guild = InMemoryGuild::new(GuildIdentity {
            guild_id: GuildId(1),
            bot_user_id: UserId(2),
        });
        guild.add_channel(LOBBY, "lobby", ChannelKind::Voice, None);
        guild.add_channel(STAGE, "stage", ChannelKind::Stage, None);
        for id in 0..count {
            let user = UserId(1_000 + id);
            guild.add_member(user, &format!("user{id}"), &format!("User {id}"));
            guild.place_member(user, Some(STAGE));
        }
        guild
    }

    #[tokio::test]
    async fn unit_move_members_counts_partial_failures_without_error() {
        let guild = guild_with_members(6);
        guild.fail_moves_for(UserId(1_001));
        guild.fail_moves_for(UserId(1_004));
        let members = (0..6).map(|id| UserId(1_000 + id)).collect::<Vec<_>>();

        let report = move_members(&guild, &members, LOBBY)
            .await
            .expect("partial failure is not an error");

        assert_eq!(report, BatchMoveReport { moved: 4, failed: 2 });
        assert_eq!(guild.location_of(UserId(1_000)), Some(LOBBY));
        assert_eq!(guild.location_of(UserId(1_001)), Some(STAGE));
    }

    #[tokio::test]
    async fn unit_move_members_rejects_empty_input_before_any_call() {
        let guild = guild_with_members(0);
        let error = move_members(&guild, &[], LOBBY)
            .await
            .expect_err("empty input must fail");
        assert!(matches!(error, VcWardenError::Validation(_)));
        assert_eq!(error.to_string(), "No members to move");
        assert!(guild.call_log().is_empty());
    }

    #[tokio::test]
    async fn regression_move_members_deduplicates_ids() {
        let guild = guild_with_members(2);
        let report = move_members(&guild, &[UserId(1_000), UserId(1_000), UserId(1_001)], LOBBY)
            .await
            .expect("move");
        assert_eq!(report.attempted(), 2);
        assert_eq!(guild.call_log().len(), 2);
    }

    #[tokio::test]
    async fn unit_collect_occupants_skips_destination() {
        let guild = guild_with_members(3);
        guild.place_member(UserId(1_000), Some(LOBBY));
        let occupants = collect_occupants(&guild, &[STAGE, LOBBY], Some(LOBBY))
            .await
            .expect("occupants");
        assert_eq!(occupants, vec![UserId(1_001), UserId(1_002)]);
    }
}
