use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use vcwarden_core::WindowPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `TransitionTrigger` values.
pub enum TransitionTrigger {
    /// First evaluation after the controller starts.
    Startup,
    /// A computed boundary elapsed.
    Boundary,
}

impl TransitionTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Boundary => "boundary",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
/// Per-record outcome counts of one side-effect application.
pub struct SideEffectReport {
    pub applied: usize,
    pub failed: usize,
}

#[async_trait]
/// Trait contract for window side-effect behavior.
///
/// Implementations must be idempotent for a repeated phase and must attempt every
/// record even when some fail.
pub trait WindowSideEffect: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(
        &self,
        phase: WindowPhase,
        trigger: TransitionTrigger,
        now: &DateTime<Tz>,
    ) -> SideEffectReport;
}
