//! Background persistence writer
//!
//! Commands hand snapshots to the writer and return immediately. Writes are
//! applied one at a time in submission order, so a later snapshot of a key
//! can never be overwritten by an earlier one.

use std::sync::Arc;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::services::Storage;

#[derive(Debug)]
enum WriteRequest {
    Save { key: &'static str, value: Value },
    Clear,
    Flush(oneshot::Sender<()>),
}

/// Handle used by the store to queue writes
#[derive(Debug, Clone)]
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<WriteRequest>,
}

impl PersistenceWriter {
    /// Spawn the writer task; must be called inside a tokio runtime
    pub fn spawn(storage: Arc<dyn Storage>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(persistence_task(storage, rx));
        Self { tx }
    }

    /// Queue `value` to be written under `key`
    pub fn save(&self, key: &'static str, value: Value) {
        if self.tx.send(WriteRequest::Save { key, value }).is_err() {
            warn!("Persistence writer stopped, dropping write for {}", key);
        }
    }

    /// Queue removal of every stored key
    pub fn clear(&self) {
        if self.tx.send(WriteRequest::Clear).is_err() {
            warn!("Persistence writer stopped, dropping clear request");
        }
    }

    /// Wait until every write queued so far has been attempted
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriteRequest::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

async fn persistence_task(storage: Arc<dyn Storage>, mut rx: mpsc::UnboundedReceiver<WriteRequest>) {
    debug!("Persistence writer started");

    while let Some(request) = rx.recv().await {
        match request {
            WriteRequest::Save { key, value } => {
                if let Err(e) = storage.save(key, value).await {
                    // In-memory state stays authoritative until the next successful write
                    error!("Failed to persist {}: {}", key, e);
                }
            }
            WriteRequest::Clear => match storage.clear().await {
                Ok(()) => info!("Cleared all stored data"),
                Err(e) => error!("Failed to clear stored data: {}", e),
            },
            WriteRequest::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("Persistence writer stopped");
}
