//! Static voice-system policy table.
//!
//! Each voice system owns one trigger channel and one parent group (category).
//! Entering the trigger spawns a managed channel inside the group with the
//! system's access mode. Several systems may share a parent group, but a
//! trigger channel belongs to at most one system.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{ChannelId, RoleId, VcWardenError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
/// Enumerates supported `AccessMode` values.
pub enum AccessMode {
    /// Everyone can see and join; text is muted for the general population.
    Open,
    /// Only holders of `gating_role_id` can see and join.
    Restricted { gating_role_id: RoleId },
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Restricted { .. } => "restricted",
        }
    }

    pub fn gating_role(&self) -> Option<RoleId> {
        match self {
            Self::Open => None,
            Self::Restricted { gating_role_id } => Some(*gating_role_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `ChannelSystemConfig` used across vcwarden components.
pub struct ChannelSystemConfig {
    #[serde(default)]
    pub system_id: String,
    pub trigger_channel_id: ChannelId,
    pub parent_group_id: ChannelId,
    #[serde(default)]
    pub protected_channel_ids: BTreeSet<ChannelId>,
    pub access: AccessMode,
}

#[derive(Debug, Clone, Default)]
/// Immutable lookup over all configured voice systems.
pub struct ChannelPolicyRegistry {
    systems: BTreeMap<String, ChannelSystemConfig>,
    by_trigger: BTreeMap<ChannelId, String>,
}

impl ChannelPolicyRegistry {
    pub fn new(
        systems: impl IntoIterator<Item = ChannelSystemConfig>,
    ) -> Result<Self, VcWardenError> {
        let mut registry = Self::default();
        for system in systems {
            let system_id = system.system_id.trim().to_string();
            if system_id.is_empty() {
                return Err(VcWardenError::Config(
                    "voice system id must be non-empty".to_string(),
                ));
            }
            if registry.systems.contains_key(&system_id) {
                return Err(VcWardenError::Config(format!(
                    "duplicate voice system id '{system_id}'"
                )));
            }
            if let Some(existing) = registry.by_trigger.get(&system.trigger_channel_id) {
                return Err(VcWardenError::Config(format!(
                    "trigger channel {} is claimed by both '{existing}' and '{system_id}'",
                    system.trigger_channel_id
                )));
            }
            if system.trigger_channel_id == system.parent_group_id {
                return Err(VcWardenError::Config(format!(
                    "voice system '{system_id}' uses its parent group as trigger channel"
                )));
            }
            registry
                .by_trigger
                .insert(system.trigger_channel_id, system_id.clone());
            registry.systems.insert(
                system_id.clone(),
                ChannelSystemConfig {
                    system_id,
                    ..system
                },
            );
        }
        Ok(registry)
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn systems(&self) -> impl Iterator<Item = &ChannelSystemConfig> {
        self.systems.values()
    }

    pub fn system(&self, system_id: &str) -> Option<&ChannelSystemConfig> {
        self.systems.get(system_id)
    }

    pub fn system_for_trigger(&self, channel: ChannelId) -> Option<&ChannelSystemConfig> {
        self.by_trigger
            .get(&channel)
            .and_then(|system_id| self.systems.get(system_id))
    }

    /// First system (by id) whose parent group is `group`.
    pub fn system_for_group(&self, group: ChannelId) -> Option<&ChannelSystemConfig> {
        self.systems
            .values()
            .find(|system| system.parent_group_id == group)
    }

    pub fn is_managed_group(&self, group: ChannelId) -> bool {
        self.system_for_group(group).is_some()
    }

    /// Protected in any system, not only the one owning the channel's group.
    pub fn is_protected(&self, channel: ChannelId) -> bool {
        self.systems
            .values()
            .any(|system| system.protected_channel_ids.contains(&channel))
    }

    pub fn parent_groups(&self) -> BTreeSet<ChannelId> {
        self.systems
            .values()
            .map(|system| system.parent_group_id)
            .collect()
    }
}
