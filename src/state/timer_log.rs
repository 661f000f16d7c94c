//! Completion history entries

use chrono::{DateTime, Utc};

use super::{
    snapshot::{new_id, TimerLogSnapshot},
    timer::Timer,
};

/// Immutable record of one completed run
///
/// The timer name is copied at completion time; renaming or deleting the
/// timer later does not touch its history.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerLog {
    id: String,
    timer_name: String,
    completed_at: DateTime<Utc>,
    duration: u64,
}

impl TimerLog {
    /// Record that `timer` has just completed
    pub fn for_completed(timer: &Timer) -> Self {
        Self {
            id: new_id(),
            timer_name: timer.name().to_string(),
            completed_at: Utc::now(),
            duration: timer.duration(),
        }
    }

    pub fn from_snapshot(snapshot: TimerLogSnapshot) -> Self {
        Self {
            id: snapshot.id,
            timer_name: snapshot.timer_name,
            completed_at: snapshot.completed_at,
            duration: snapshot.duration,
        }
    }

    pub fn snapshot(&self) -> TimerLogSnapshot {
        TimerLogSnapshot {
            id: self.id.clone(),
            timer_name: self.timer_name.clone(),
            completed_at: self.completed_at,
            duration: self.duration,
        }
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}
