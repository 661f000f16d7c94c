//! Background tasks module
//!
//! This module contains the tasks that run alongside the store: per-timer
//! countdowns, the persistence writer and the notification forwarder.

pub mod countdown;
pub mod notifier;
pub mod persistence;

// Re-export main functions
pub use countdown::{spawn_countdown, TICK_INTERVAL};
pub use notifier::{notification_task, LogNotifier, TimerNotifier};
pub use persistence::PersistenceWriter;
