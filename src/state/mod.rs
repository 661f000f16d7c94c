//! State management module
//!
//! This module contains the timer entity, its history records, and the
//! store that owns and persists them.

pub mod notification_bridge;
pub mod snapshot;
pub mod store;
pub mod timer;
pub mod timer_log;

// Re-export main types
pub use notification_bridge::{NotificationBridge, Transitions};
pub use snapshot::{
    validate_log, validate_timer, RecordSource, Rejection, TimerLogSnapshot, TimerSnapshot,
};
pub use store::{StoreEvent, StoreSummary, TimerStore, DEFAULT_CATEGORIES};
pub use timer::{format_mm_ss, progress, CountdownHandle, Scheduler, TickOutcome, Timer, TimerStatus};
pub use timer_log::TimerLog;
