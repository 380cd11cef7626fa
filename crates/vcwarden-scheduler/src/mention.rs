//! Role mentionability that follows a daily window.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use tracing::warn;
use vcwarden_core::{GuildTransport, MentionWindowConfig, RoleId, RoleTransport, WindowPhase};

use crate::{
    Clock, RecurringWindowController, SideEffectReport, TransitionTrigger, WindowSideEffect,
};

/// Sets each role mentionable while the window is active and unmentionable otherwise.
pub struct MentionToggleEffect {
    window_id: String,
    transport: Arc<dyn GuildTransport>,
    role_ids: Vec<RoleId>,
}

impl MentionToggleEffect {
    pub fn new(
        window_id: impl Into<String>,
        transport: Arc<dyn GuildTransport>,
        role_ids: Vec<RoleId>,
    ) -> Self {
        Self {
            window_id: window_id.into(),
            transport,
            role_ids,
        }
    }

    pub fn from_config(config: &MentionWindowConfig, transport: Arc<dyn GuildTransport>) -> Self {
        Self::new(config.id.clone(), transport, config.role_ids.clone())
    }
}

#[async_trait]
impl WindowSideEffect for MentionToggleEffect {
    fn name(&self) -> &str {
        "mention_toggle"
    }

    async fn apply(
        &self,
        phase: WindowPhase,
        _trigger: TransitionTrigger,
        _now: &DateTime<Tz>,
    ) -> SideEffectReport {
        let mentionable = phase.is_active();
        let mut report = SideEffectReport::default();
        for role in &self.role_ids {
            match self.transport.set_role_mentionable(*role, mentionable).await {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        window_id = %self.window_id,
                        role_id = %role,
                        mentionable,
                        %error,
                        "role mention toggle failed"
                    );
                }
            }
        }
        report
    }
}

pub fn mention_controller(
    config: &MentionWindowConfig,
    timezone: Tz,
    transport: Arc<dyn GuildTransport>,
    clock: Arc<dyn Clock>,
) -> RecurringWindowController {
    RecurringWindowController::new(
        config.id.clone(),
        config.schedule,
        timezone,
        Arc::new(MentionToggleEffect::from_config(config, transport)),
        clock,
    )
}
