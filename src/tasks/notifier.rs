//! Delivers completion and halfway events to the user-facing collaborator

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::state::{StoreEvent, TimerSnapshot};

/// Receiver of user-facing timer alerts
pub trait TimerNotifier: Send + Sync {
    fn on_complete(&self, timer: &TimerSnapshot);
    fn on_halfway(&self, timer_name: &str);
}

/// Notifier that only writes alerts to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl TimerNotifier for LogNotifier {
    fn on_complete(&self, timer: &TimerSnapshot) {
        info!("Timer \"{}\" has completed!", timer.name);
    }

    fn on_halfway(&self, timer_name: &str) {
        info!("Timer \"{}\" has reached its halfway mark.", timer_name);
    }
}

/// Background task forwarding store events to `notifier`
pub async fn notification_task(
    mut events: broadcast::Receiver<StoreEvent>,
    notifier: Arc<dyn TimerNotifier>,
) {
    info!("Starting notification task");

    loop {
        match events.recv().await {
            Ok(StoreEvent::TimerCompleted { timer }) => notifier.on_complete(&timer),
            Ok(StoreEvent::HalfwayReached { timer_name, .. }) => notifier.on_halfway(&timer_name),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("Notification task lagged, {} events skipped", skipped);
            }
            Err(RecvError::Closed) => {
                debug!("Event channel closed, stopping notification task");
                break;
            }
        }
    }
}
