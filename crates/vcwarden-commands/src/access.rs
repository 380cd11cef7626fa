//! Staff authorization and per-caller cooldowns.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use vcwarden_core::{format_remaining_wait, CommandAccessConfig, VcWardenError};

use crate::CommandCaller;

pub const PERMISSION_DENIED_MESSAGE: &str = "You don't have permission to use this command";

/// Decides who may run commands and how often.
#[derive(Debug)]
pub struct CommandAccessPolicy {
    config: CommandAccessConfig,
    cooldowns: CooldownTracker,
}

impl CommandAccessPolicy {
    pub fn new(config: CommandAccessConfig) -> Self {
        Self {
            config,
            cooldowns: CooldownTracker::default(),
        }
    }

    pub fn is_bypass(&self, caller: &CommandCaller) -> bool {
        self.config.bypass_user_ids.contains(&caller.user_id)
    }

    pub fn authorize(&self, caller: &CommandCaller) -> Result<(), VcWardenError> {
        if self.is_bypass(caller)
            || caller
                .role_ids
                .iter()
                .any(|role| self.config.staff_role_ids.contains(role))
        {
            Ok(())
        } else {
            Err(VcWardenError::authorization(PERMISSION_DENIED_MESSAGE))
        }
    }

    /// Rejects a repeat within the cooldown, otherwise starts a new cooldown.
    pub fn check_cooldown(
        &self,
        caller: &CommandCaller,
        command: &str,
        now_ms: u64,
    ) -> Result<(), VcWardenError> {
        if self.is_bypass(caller)
            || self.config.cooldown_seconds == 0
            || self
                .config
                .cooldown_exempt_commands
                .iter()
                .any(|exempt| exempt == command)
        {
            return Ok(());
        }
        let key = format!("{}-{command}", caller.user_id);
        self.cooldowns
            .check_and_start(&key, now_ms, self.config.cooldown_seconds * 1_000)
    }
}

#[derive(Debug, Default)]
/// Expiry instant per `<user>-<command>` key.
pub struct CooldownTracker {
    expiries: Mutex<HashMap<String, u64>>,
}

impl CooldownTracker {
    pub fn check_and_start(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
    ) -> Result<(), VcWardenError> {
        let mut expiries = self
            .expiries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(expiry) = expiries.get(key).copied() {
            if now_ms < expiry {
                return Err(VcWardenError::validation(format!(
                    "This command was recently used. Please wait {} before using it again.",
                    format_remaining_wait(expiry - now_ms)
                )));
            }
        }
        expiries.retain(|_, expiry| *expiry > now_ms);
        expiries.insert(key.to_string(), now_ms.saturating_add(window_ms));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use vcwarden_core::{RoleId, UserId};

    use super::*;

    fn policy() -> CommandAccessPolicy {
        CommandAccessPolicy::new(CommandAccessConfig {
            staff_role_ids: [RoleId(5000)].into_iter().collect(),
            bypass_user_ids: [UserId(6000)].into_iter().collect(),
            ..CommandAccessConfig::default()
        })
    }

    fn caller(user: u64, roles: &[u64]) -> CommandCaller {
        CommandCaller {
            user_id: UserId(user),
            role_ids: roles.iter().copied().map(RoleId).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn unit_authorize_requires_staff_role_or_bypass() {
        let policy = policy();
        assert!(policy.authorize(&caller(1, &[5000])).is_ok());
        assert!(policy.authorize(&caller(6000, &[])).is_ok());
        let error = policy
            .authorize(&caller(2, &[42]))
            .expect_err("non-staff rejected");
        assert!(matches!(error, VcWardenError::Authorization(_)));
        assert_eq!(error.to_string(), PERMISSION_DENIED_MESSAGE);
    }

    #[test]
    fn functional_cooldown_blocks_repeat_then_expires() {
        let policy = policy();
        let staff = caller(1, &[5000]);
        policy
            .check_cooldown(&staff, "listvc", 1_000)
            .expect("first use");
        let error = policy
            .check_cooldown(&staff, "listvc", 2_000)
            .expect_err("repeat within window");
        assert_eq!(
            error.to_string(),
            "This command was recently used. Please wait 4m 59s before using it again."
        );
        policy
            .check_cooldown(&staff, "addrole", 2_000)
            .expect("other command has its own key");
        policy
            .check_cooldown(&staff, "listvc", 301_000)
            .expect("cooldown expired");
    }

    #[test]
    fn unit_exempt_commands_and_bypass_users_skip_cooldown() {
        let policy = policy();
        let staff = caller(1, &[5000]);
        for now in [0, 10, 20] {
            policy.check_cooldown(&staff, "night", now).expect("exempt");
            policy
                .check_cooldown(&caller(6000, &[]), "listvc", now)
                .expect("bypass");
        }
    }
}
