//! Sleep-until-boundary loop driving one window schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vcwarden_core::{
    current_unix_timestamp_ms, evaluate_window, local_datetime, GuildTransport, VcWardenConfig,
    WindowPhase, WindowSchedule,
};

use crate::{mention_controller, reminder_controllers, TransitionTrigger, WindowSideEffect};

const CLOCK_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Trait contract for wall-clock reads used by controllers.
pub trait Clock: Send + Sync {
    fn now_unix_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_ms(&self) -> u64 {
        current_unix_timestamp_ms()
    }
}

#[derive(Debug, Clone, Copy)]
/// Wall clock that starts at `anchor_unix_ms` and advances with tokio time.
///
/// Follows paused and auto-advanced tokio time, so timed loops can be driven
/// deterministically.
pub struct AnchoredClock {
    anchor_unix_ms: u64,
    origin: tokio::time::Instant,
}

impl AnchoredClock {
    pub fn new(anchor_unix_ms: u64) -> Self {
        Self {
            anchor_unix_ms,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now_unix_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.anchor_unix_ms.saturating_add(elapsed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
/// Counters reported when a controller loop exits.
pub struct ControllerSummary {
    pub evaluations: u64,
    pub transitions: u64,
    pub failed_records: u64,
}

/// One schedule, one side effect, one timezone.
pub struct RecurringWindowController {
    id: String,
    schedule: WindowSchedule,
    timezone: Tz,
    effect: Arc<dyn WindowSideEffect>,
    clock: Arc<dyn Clock>,
}

impl RecurringWindowController {
    pub fn new(
        id: impl Into<String>,
        schedule: WindowSchedule,
        timezone: Tz,
        effect: Arc<dyn WindowSideEffect>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id: id.into(),
            schedule,
            timezone,
            effect,
            clock,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn schedule(&self) -> &WindowSchedule {
        &self.schedule
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The side effect is applied once at startup for the computed phase and then
    /// once per observed phase change. A wake-up that finds the phase unchanged
    /// (clock skew, DST shifts) only reschedules.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> ControllerSummary {
        let mut summary = ControllerSummary::default();
        let mut last_phase: Option<WindowPhase> = None;
        info!(
            controller_id = %self.id,
            effect = self.effect.name(),
            start = %self.schedule.start,
            end = %self.schedule.end,
            "window controller started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            let now_ms = self.clock.now_unix_ms();
            let delay = match local_datetime(now_ms, self.timezone) {
                Some(now) => {
                    let evaluation = evaluate_window(&now, &self.schedule);
                    summary.evaluations += 1;
                    if last_phase != Some(evaluation.phase) {
                        let trigger = if last_phase.is_none() {
                            TransitionTrigger::Startup
                        } else {
                            TransitionTrigger::Boundary
                        };
                        let report = self.effect.apply(evaluation.phase, trigger, &now).await;
                        summary.transitions += 1;
                        summary.failed_records += report.failed as u64;
                        if report.failed > 0 {
                            warn!(
                                controller_id = %self.id,
                                phase = evaluation.phase.as_str(),
                                trigger = trigger.as_str(),
                                applied = report.applied,
                                failed = report.failed,
                                "window side effect partially failed"
                            );
                        } else {
                            info!(
                                controller_id = %self.id,
                                phase = evaluation.phase.as_str(),
                                trigger = trigger.as_str(),
                                applied = report.applied,
                                "window side effect applied"
                            );
                        }
                        last_phase = Some(evaluation.phase);
                    } else {
                        debug!(
                            controller_id = %self.id,
                            phase = evaluation.phase.as_str(),
                            "woke without phase change; rescheduling"
                        );
                    }
                    debug!(
                        controller_id = %self.id,
                        next_boundary = %evaluation.next_boundary,
                        delay_ms = evaluation.ms_until_next_transition,
                        "window controller sleeping"
                    );
                    Duration::from_millis(evaluation.ms_until_next_transition)
                }
                None => {
                    warn!(controller_id = %self.id, now_ms, "clock out of range; retrying");
                    CLOCK_RETRY_DELAY
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(
            controller_id = %self.id,
            evaluations = summary.evaluations,
            transitions = summary.transitions,
            "window controller stopped"
        );
        summary
    }
}

/// Every mention window plus one controller per enabled reminder time.
pub fn configured_controllers(
    config: &VcWardenConfig,
    transport: Arc<dyn GuildTransport>,
    clock: Arc<dyn Clock>,
) -> Vec<RecurringWindowController> {
    let mut controllers = config
        .mention_windows
        .iter()
        .map(|window| {
            mention_controller(window, config.timezone, transport.clone(), clock.clone())
        })
        .collect::<Vec<_>>();
    for reminder in &config.reminders {
        controllers.extend(reminder_controllers(
            reminder,
            config.timezone,
            transport.clone(),
            clock.clone(),
        ));
    }
    controllers
}

/// Running controllers sharing one shutdown signal.
pub struct ControllerSet {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<ControllerSummary>)>,
}

impl ControllerSet {
    /// Spawns every controller onto the current tokio runtime.
    pub fn spawn(controllers: impl IntoIterator<Item = RecurringWindowController>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = controllers
            .into_iter()
            .map(|controller| {
                let id = controller.id().to_string();
                let task = tokio::spawn(controller.run(shutdown_rx.clone()));
                (id, task)
            })
            .collect();
        Self { shutdown_tx, tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Signals every controller to stop and waits for them.
    pub async fn shutdown(self) -> Vec<(String, ControllerSummary)> {
        let _ = self.shutdown_tx.send(true);
        let mut summaries = Vec::with_capacity(self.tasks.len());
        for (id, task) in self.tasks {
            match task.await {
                Ok(summary) => summaries.push((id, summary)),
                Err(error) => warn!(controller_id = %id, %error, "window controller task failed"),
            }
        }
        summaries
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use chrono_tz::America::New_York;
    use vcwarden_core::TimeOfDay;

    use super::*;
    use crate::SideEffectReport;

    #[derive(Default)]
    struct RecordingEffect {
        calls: Mutex<Vec<(WindowPhase, TransitionTrigger, String)>>,
    }

    impl RecordingEffect {
        fn calls(&self) -> Vec<(WindowPhase, TransitionTrigger, String)> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl WindowSideEffect for RecordingEffect {
        fn name(&self) -> &str {
            "recording"
        }

        async fn apply(
            &self,
            phase: WindowPhase,
            trigger: TransitionTrigger,
            now: &DateTime<Tz>,
        ) -> SideEffectReport {
            self.calls
                .lock()
                .expect("calls lock")
                .push((phase, trigger, now.format("%H:%M:%S").to_string()));
            SideEffectReport {
                applied: 1,
                failed: 0,
            }
        }
    }

    fn anchor(hour: u32, minute: u32) -> u64 {
        let instant = New_York
            .with_ymd_and_hms(2025, 3, 3, hour, minute, 0)
            .single()
            .expect("unambiguous local time");
        u64::try_from(instant.timestamp_millis()).expect("positive timestamp")
    }

    fn ping_window() -> WindowSchedule {
        WindowSchedule::new(
            TimeOfDay::new(16, 30).expect("start"),
            TimeOfDay::new(1, 0).expect("end"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn functional_controller_applies_startup_then_each_boundary() {
        let effect = Arc::new(RecordingEffect::default());
        let controller = RecurringWindowController::new(
            "ping-hours",
            ping_window(),
            New_York,
            effect.clone(),
            Arc::new(AnchoredClock::new(anchor(23, 0))),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(controller.run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(18 * 60 * 60)).await;
        shutdown_tx.send(true).expect("controller alive");
        let summary = task.await.expect("controller task");

        assert_eq!(
            effect.calls(),
            vec![
                (
                    WindowPhase::Active,
                    TransitionTrigger::Startup,
                    "23:00:00".to_string()
                ),
                (
                    WindowPhase::Inactive,
                    TransitionTrigger::Boundary,
                    "01:00:01".to_string()
                ),
                (
                    WindowPhase::Active,
                    TransitionTrigger::Boundary,
                    "16:30:01".to_string()
                ),
            ]
        );
        assert_eq!(summary.transitions, 3);
        assert_eq!(summary.failed_records, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unit_empty_window_stays_inactive() {
        let effect = Arc::new(RecordingEffect::default());
        let noon = TimeOfDay::new(12, 0).expect("noon");
        let controller = RecurringWindowController::new(
            "never",
            WindowSchedule::new(noon, noon),
            New_York,
            effect.clone(),
            Arc::new(AnchoredClock::new(anchor(11, 0))),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(controller.run(shutdown_rx));
        tokio::time::sleep(Duration::from_secs(3 * 24 * 60 * 60)).await;
        shutdown_tx.send(true).expect("controller alive");
        let summary = task.await.expect("controller task");

        let calls = effect.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, WindowPhase::Inactive);
        assert!(summary.evaluations >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unit_controller_set_shutdown_stops_sleeping_controllers() {
        let effect = Arc::new(RecordingEffect::default());
        let set = ControllerSet::spawn([RecurringWindowController::new(
            "ping-hours",
            ping_window(),
            New_York,
            effect.clone(),
            Arc::new(AnchoredClock::new(anchor(2, 0))),
        )]);
        assert_eq!(set.len(), 1);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let summaries = set.shutdown().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].0, "ping-hours");
        assert_eq!(
            effect.calls(),
            vec![(
                WindowPhase::Inactive,
                TransitionTrigger::Startup,
                "02:00:00".to_string()
            )]
        );
    }
}
