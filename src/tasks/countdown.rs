//! Per-timer countdown task

use std::{sync::Weak, time::Duration};
use tokio::{
    task::AbortHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, trace};

use crate::state::TimerStore;

/// Period between two ticks of a running timer
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn the recurring one-second tick for `timer_id`
///
/// The task holds only a weak reference to the store and stops on its own
/// once the store is gone or the timer no longer accepts ticks from this
/// generation. The returned handle aborts it.
pub fn spawn_countdown(store: Weak<TimerStore>, timer_id: String, generation: u64) -> AbortHandle {
    debug!("Starting countdown task for timer {} (generation {})", timer_id, generation);

    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let Some(store) = store.upgrade() else {
                debug!("Store dropped, stopping countdown for timer {}", timer_id);
                break;
            };
            if !store.tick_timer(&timer_id, generation) {
                trace!("Countdown for timer {} (generation {}) finished", timer_id, generation);
                break;
            }
        }
    })
    .abort_handle()
}
