//! Edge detection for completion and halfway notifications
//!
//! The bridge remembers what it saw last time and reports only transitions:
//! a timer entering `Completed`, or a running timer whose halfway flag has
//! been raised. Each edge is reported once until the underlying state clears.

use std::collections::HashSet;

use super::timer::{Timer, TimerStatus};

/// Edges found by one observation, in timer order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Transitions {
    /// Ids of timers that have newly completed
    pub completed: Vec<String>,
    /// Ids of timers whose halfway alert is newly due
    pub halfway: Vec<String>,
}

impl Transitions {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.halfway.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct NotificationBridge {
    completed: HashSet<String>,
    halfway_notified: HashSet<String>,
}

impl NotificationBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `timers` against the previous observation
    pub fn observe(&mut self, timers: &[Timer]) -> Transitions {
        let mut transitions = Transitions::default();

        let current: HashSet<String> = timers
            .iter()
            .filter(|t| t.status() == TimerStatus::Completed && t.remaining_time() == 0)
            .map(|t| t.id().to_string())
            .collect();

        for timer in timers {
            if current.contains(timer.id()) && !self.completed.contains(timer.id()) {
                transitions.completed.push(timer.id().to_string());
            }

            if !timer.halfway_alert_triggered() {
                self.halfway_notified.remove(timer.id());
                continue;
            }
            let due = timer.is_halfway_alert_enabled()
                && timer.status() == TimerStatus::Running
                && timer.remaining_time() > 0;
            if due && self.halfway_notified.insert(timer.id().to_string()) {
                transitions.halfway.push(timer.id().to_string());
            }
        }

        self.completed = current;
        self.halfway_notified
            .retain(|id| timers.iter().any(|t| t.id() == id.as_str()));

        transitions
    }

    /// Forget everything, e.g. after the collection was replaced wholesale
    pub fn prime(&mut self, timers: &[Timer]) {
        self.completed.clear();
        self.halfway_notified.clear();
        self.observe(timers);
    }
}
