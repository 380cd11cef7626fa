//! Explicit channel ownership record.
//!
//! The control surface embeds an owner marker, but reading it back needs a
//! bounded history scan that can miss on busy channels. This registry keeps the
//! owner in memory, keyed by channel, and is rebuilt at startup by
//! [`reconcile_ownership`].

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};
use vcwarden_core::{ChannelId, ChannelTransport, UserId};

use crate::ControlSurfaceProtocol;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Public struct `ManagedChannel` used across vcwarden components.
pub struct ManagedChannel {
    pub channel_id: ChannelId,
    pub parent_group_id: ChannelId,
    pub owner_id: UserId,
    /// Voice system that spawned the channel, when known.
    pub system_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct OwnershipRegistry {
    entries: RwLock<HashMap<ChannelId, ManagedChannel>>,
}

impl OwnershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, channel: ManagedChannel) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.channel_id, channel);
    }

    pub fn get(&self, channel: ChannelId) -> Option<ManagedChannel> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .cloned()
    }

    pub fn remove(&self, channel: ChannelId) -> Option<ManagedChannel> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&channel)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
/// Public struct `ReconcileReport` used across vcwarden components.
pub struct ReconcileReport {
    pub scanned: usize,
    pub recovered: usize,
    pub unmarked: usize,
    pub failed: usize,
}

/// Rebuilds ownership records from the control surfaces of every managed channel.
///
/// Trigger and protected channels are skipped; so are channels whose surface
/// cannot be found within the lookback window.
pub async fn reconcile_ownership(protocol: &ControlSurfaceProtocol) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let registry = protocol.registry();
    for group in registry.parent_groups() {
        let channels = match protocol.transport().channels_in_group(group).await {
            Ok(channels) => channels,
            Err(error) => {
                warn!(parent_group_id = %group, %error, "ownership reconcile could not list group");
                report.failed += 1;
                continue;
            }
        };
        for channel in channels {
            if !channel.kind.is_occupiable() || registry.is_protected(channel.id) {
                continue;
            }
            report.scanned += 1;
            match protocol.recover_from_surface(&channel).await {
                Ok(Some(_)) => report.recovered += 1,
                Ok(None) => {
                    debug!(channel_id = %channel.id, "no control surface found during reconcile");
                    report.unmarked += 1;
                }
                Err(error) => {
                    warn!(channel_id = %channel.id, %error, "ownership reconcile failed for channel");
                    report.failed += 1;
                }
            }
        }
    }
    info!(
        scanned = report.scanned,
        recovered = report.recovered,
        unmarked = report.unmarked,
        failed = report.failed,
        "ownership reconcile finished"
    );
    report
}
