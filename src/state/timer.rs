//! Timer entity: a single countdown and its state machine
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |
//!           v
//!       Completed --reset--> Idle
//! ```
//!
//! Every transition is total: calls that make no sense in the current state
//! are ignored. A running timer owns exactly one [`CountdownHandle`]; the
//! handle is cancelled before a new one is installed and whenever the timer
//! leaves `Running`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tracing::debug;

use super::snapshot::TimerSnapshot;

/// Lifecycle status of a timer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Completed => "completed",
        }
    }
}

/// Owned handle to the recurring one-second task driving a running timer
///
/// Dropping the handle aborts the task. The generation lets the tick path
/// reject a tick delivered by a task that has already been replaced.
#[derive(Debug)]
pub struct CountdownHandle {
    generation: u64,
    task: Option<AbortHandle>,
}

impl CountdownHandle {
    pub fn new(generation: u64, task: AbortHandle) -> Self {
        Self { generation, task: Some(task) }
    }

    /// A handle with no task behind it, for callers that tick manually
    pub fn detached(generation: u64) -> Self {
        Self { generation, task: None }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Installs countdown tasks on behalf of a timer
pub trait Scheduler {
    /// Begin delivering one tick per second to the timer with `timer_id`
    fn schedule(&self, timer_id: &str) -> CountdownHandle;
}

/// What a single tick did to the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The timer was not running; nothing changed
    Ignored,
    /// One second was taken off the remaining time
    Decremented,
    /// The timer ran out and is now completed
    Completed,
}

/// A single named countdown
#[derive(Debug)]
pub struct Timer {
    id: String,
    name: String,
    duration: u64,
    remaining_time: u64,
    category: String,
    status: TimerStatus,
    is_halfway_alert_enabled: bool,
    halfway_alert_triggered: bool,
    completion_acknowledged: bool,
    created_at: DateTime<Utc>,
    countdown: Option<CountdownHandle>,
}

impl Timer {
    /// Create an idle timer with its full duration remaining
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        duration: u64,
        category: impl Into<String>,
        halfway_alert: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            duration,
            remaining_time: duration,
            category: category.into(),
            status: TimerStatus::Idle,
            is_halfway_alert_enabled: halfway_alert,
            halfway_alert_triggered: false,
            completion_acknowledged: false,
            created_at: Utc::now(),
            countdown: None,
        }
    }

    /// Rebuild a timer from an already-validated snapshot
    ///
    /// Runtime state is not restored: the result is always idle with its full
    /// duration remaining.
    pub fn from_snapshot(snapshot: TimerSnapshot) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name,
            duration: snapshot.duration,
            remaining_time: snapshot.duration,
            category: snapshot.category,
            status: TimerStatus::Idle,
            is_halfway_alert_enabled: snapshot.is_halfway_alert_enabled,
            halfway_alert_triggered: false,
            completion_acknowledged: false,
            created_at: snapshot.created_at,
            countdown: None,
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            duration: self.duration,
            category: self.category.clone(),
            remaining_time: self.remaining_time,
            status: self.status,
            is_halfway_alert_enabled: self.is_halfway_alert_enabled,
            halfway_alert_triggered: self.halfway_alert_triggered,
            completion_acknowledged: self.completion_acknowledged,
            created_at: self.created_at,
        }
    }

    // Queries

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn remaining_time(&self) -> u64 {
        self.remaining_time
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn is_halfway_alert_enabled(&self) -> bool {
        self.is_halfway_alert_enabled
    }

    pub fn halfway_alert_triggered(&self) -> bool {
        self.halfway_alert_triggered
    }

    pub fn completion_acknowledged(&self) -> bool {
        self.completion_acknowledged
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Generation of the active countdown, if any
    pub fn countdown_generation(&self) -> Option<u64> {
        self.countdown.as_ref().map(CountdownHandle::generation)
    }

    /// Fraction of the duration already elapsed, 0.0 ..= 1.0
    pub fn progress(&self) -> f64 {
        progress(self.duration, self.remaining_time)
    }

    /// Remaining time as zero-padded `MM:SS`
    pub fn formatted_remaining_time(&self) -> String {
        format_mm_ss(self.remaining_time)
    }

    // Transitions

    /// Start or resume the countdown
    pub fn start(&mut self, scheduler: &dyn Scheduler) {
        if matches!(self.status, TimerStatus::Running | TimerStatus::Completed) {
            return;
        }
        if self.status == TimerStatus::Idle {
            self.remaining_time = self.duration;
            self.halfway_alert_triggered = false;
        }
        self.status = TimerStatus::Running;
        self.cancel_countdown();
        self.countdown = Some(scheduler.schedule(&self.id));
        debug!("Timer {} started with {}s remaining", self.id, self.remaining_time);
    }

    pub fn pause(&mut self) {
        if self.status != TimerStatus::Running {
            return;
        }
        self.status = TimerStatus::Paused;
        self.cancel_countdown();
        debug!("Timer {} paused with {}s remaining", self.id, self.remaining_time);
    }

    /// Return to idle with the full duration; valid from any state
    pub fn reset(&mut self) {
        self.cancel_countdown();
        self.status = TimerStatus::Idle;
        self.remaining_time = self.duration;
        self.halfway_alert_triggered = false;
        self.completion_acknowledged = false;
    }

    /// Apply one second of countdown
    ///
    /// A tick that takes the remaining time to zero completes the timer, as
    /// does a tick that finds nothing left to count down.
    pub fn tick(&mut self) -> TickOutcome {
        if self.status != TimerStatus::Running {
            return TickOutcome::Ignored;
        }
        if self.remaining_time == 0 {
            self.complete();
            return TickOutcome::Completed;
        }

        self.remaining_time -= 1;
        if self.is_halfway_alert_enabled
            && !self.halfway_alert_triggered
            && self.remaining_time > 0
            && self.remaining_time <= self.duration - self.remaining_time
        {
            self.halfway_alert_triggered = true;
            debug!("Timer {} passed its halfway mark", self.id);
        }

        if self.remaining_time == 0 {
            self.complete();
            return TickOutcome::Completed;
        }
        TickOutcome::Decremented
    }

    fn complete(&mut self) {
        self.cancel_countdown();
        if self.status != TimerStatus::Completed {
            self.status = TimerStatus::Completed;
            self.remaining_time = 0;
            self.completion_acknowledged = false;
            debug!("Timer {} completed", self.id);
        }
    }

    pub fn acknowledge_completion(&mut self) {
        if self.status == TimerStatus::Completed {
            self.completion_acknowledged = true;
        }
    }

    pub fn toggle_halfway_alert(&mut self, enabled: bool) {
        self.is_halfway_alert_enabled = enabled;
        if !enabled {
            self.halfway_alert_triggered = false;
        }
    }

    /// Cancel the countdown ahead of removal; the timer is never ticked again
    pub fn destroy(&mut self) {
        self.cancel_countdown();
    }

    // Edits

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
    }

    /// Change the duration, keeping `remaining_time` within bounds
    pub fn set_duration(&mut self, seconds: u64) {
        if seconds == 0 {
            return;
        }
        self.duration = seconds;
        match self.status {
            TimerStatus::Idle => self.remaining_time = seconds,
            TimerStatus::Running | TimerStatus::Paused => {
                self.remaining_time = self.remaining_time.min(seconds)
            }
            TimerStatus::Completed => {}
        }
    }

    fn cancel_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.cancel();
        }
    }
}

/// Fraction of `duration` already elapsed; zero for a zero duration
pub fn progress(duration: u64, remaining_time: u64) -> f64 {
    if duration == 0 {
        return 0.0;
    }
    (duration.saturating_sub(remaining_time)) as f64 / duration as f64
}

/// Render seconds as `MM:SS`; minutes are not wrapped into hours
pub fn format_mm_ss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    /// Hands out detached handles and counts how many were requested
    #[derive(Default)]
    pub(crate) struct ManualScheduler {
        pub scheduled: Cell<u64>,
    }

    impl Scheduler for ManualScheduler {
        fn schedule(&self, _timer_id: &str) -> CountdownHandle {
            let generation = self.scheduled.get() + 1;
            self.scheduled.set(generation);
            CountdownHandle::detached(generation)
        }
    }

    fn tea(duration: u64, halfway: bool) -> Timer {
        Timer::new("t1", "Tea", duration, "Break", halfway)
    }

    fn tick_n(timer: &mut Timer, n: usize) {
        for _ in 0..n {
            timer.tick();
        }
    }

    #[test]
    fn default_status_is_idle() {
        assert_eq!(TimerStatus::default(), TimerStatus::Idle);
        assert_eq!(TimerStatus::default().as_str(), "idle");
    }

    #[test]
    fn new_timer_is_idle_with_full_duration() {
        let timer = tea(10, false);
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.remaining_time(), 10);
        assert_eq!(timer.countdown_generation(), None);
    }

    #[test]
    fn counts_down_to_completion() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(10, false);
        timer.start(&scheduler);

        tick_n(&mut timer, 5);
        assert_eq!(timer.remaining_time(), 5);
        assert_eq!(timer.status(), TimerStatus::Running);

        tick_n(&mut timer, 5);
        assert_eq!(timer.status(), TimerStatus::Completed);
        assert_eq!(timer.remaining_time(), 0);
        assert!(!timer.completion_acknowledged());
        assert_eq!(timer.countdown_generation(), None);
    }

    #[test]
    fn start_while_running_keeps_single_countdown() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(10, false);
        timer.start(&scheduler);
        timer.tick();
        timer.start(&scheduler);

        assert_eq!(scheduler.scheduled.get(), 1);
        assert_eq!(timer.remaining_time(), 9);
    }

    #[test]
    fn pause_preserves_remaining_and_resume_continues() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(10, false);
        timer.start(&scheduler);
        tick_n(&mut timer, 3);
        timer.pause();

        assert_eq!(timer.status(), TimerStatus::Paused);
        assert_eq!(timer.countdown_generation(), None);
        assert_eq!(timer.tick(), TickOutcome::Ignored);
        assert_eq!(timer.remaining_time(), 7);

        timer.start(&scheduler);
        assert_eq!(timer.remaining_time(), 7);
        assert_eq!(timer.countdown_generation(), Some(2));
    }

    #[test]
    fn completed_timer_ignores_start_and_pause() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(1, false);
        timer.start(&scheduler);
        timer.tick();
        assert_eq!(timer.status(), TimerStatus::Completed);

        timer.start(&scheduler);
        timer.pause();
        assert_eq!(timer.status(), TimerStatus::Completed);
        assert_eq!(scheduler.scheduled.get(), 1);
    }

    #[test]
    fn halfway_triggers_once_and_reset_clears_it() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(10, true);
        timer.start(&scheduler);

        tick_n(&mut timer, 4);
        assert!(!timer.halfway_alert_triggered());
        timer.tick();
        assert!(timer.halfway_alert_triggered());

        timer.reset();
        assert!(!timer.halfway_alert_triggered());
    }

    #[test]
    fn halfway_uses_exact_midpoint_for_odd_durations() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(9, true);
        timer.start(&scheduler);

        // 5 remaining is above 4.5
        tick_n(&mut timer, 4);
        assert!(!timer.halfway_alert_triggered());
        timer.tick();
        assert_eq!(timer.remaining_time(), 4);
        assert!(timer.halfway_alert_triggered());
    }

    #[test]
    fn halfway_check_handles_huge_durations() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(u64::MAX, true);
        timer.start(&scheduler);

        assert_eq!(timer.tick(), TickOutcome::Decremented);
        assert_eq!(timer.remaining_time(), u64::MAX - 1);
        assert!(!timer.halfway_alert_triggered());
    }

    #[test]
    fn halfway_never_triggers_when_disabled() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(4, false);
        timer.start(&scheduler);
        tick_n(&mut timer, 3);
        assert!(!timer.halfway_alert_triggered());
    }

    #[test]
    fn disabling_halfway_alert_clears_trigger() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(2, true);
        timer.start(&scheduler);
        timer.tick();
        assert!(timer.halfway_alert_triggered());

        timer.toggle_halfway_alert(false);
        assert!(!timer.halfway_alert_triggered());
        timer.toggle_halfway_alert(true);
        assert!(!timer.halfway_alert_triggered());
    }

    #[test]
    fn reset_restores_idle_from_any_state() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(3, true);
        timer.start(&scheduler);
        tick_n(&mut timer, 3);
        timer.acknowledge_completion();
        assert!(timer.completion_acknowledged());

        timer.reset();
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.remaining_time(), 3);
        assert!(!timer.halfway_alert_triggered());
        assert!(!timer.completion_acknowledged());
    }

    #[test]
    fn acknowledge_only_applies_to_completed() {
        let mut timer = tea(3, false);
        timer.acknowledge_completion();
        assert!(!timer.completion_acknowledged());
    }

    #[test]
    fn start_from_idle_restores_full_duration() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(10, false);
        timer.set_duration(20);
        timer.start(&scheduler);
        assert_eq!(timer.remaining_time(), 20);
    }

    #[test]
    fn set_duration_clamps_active_timers() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(10, false);
        timer.start(&scheduler);
        timer.tick();
        timer.set_duration(5);
        assert_eq!(timer.remaining_time(), 5);
        timer.set_duration(0);
        assert_eq!(timer.duration(), 5);
    }

    #[test]
    fn destroy_cancels_countdown() {
        let scheduler = ManualScheduler::default();
        let mut timer = tea(10, false);
        timer.start(&scheduler);
        timer.destroy();
        assert_eq!(timer.countdown_generation(), None);
    }

    #[test]
    fn derived_views() {
        assert_eq!(progress(0, 0), 0.0);
        assert_eq!(progress(10, 5), 0.5);
        assert_eq!(format_mm_ss(0), "00:00");
        assert_eq!(format_mm_ss(65), "01:05");
        assert_eq!(format_mm_ss(6000), "100:00");
    }
}
