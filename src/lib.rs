//! Timer Tracker - Personal countdown timers with categories, alerts and history
//!
//! This library provides the timer state machine, the store that owns and
//! persists timers, and an HTTP API to drive them.

pub mod config;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::{StoreEvent, TimerStore};
pub use api::{create_router, ApiState};
pub use services::{FileStorage, MemoryStorage, Storage};
pub use utils::signals::shutdown_signal;
