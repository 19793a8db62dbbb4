//! Debounced draft writer.
//!
//! The controller pushes a session snapshot on every change; a background
//! task writes only the latest one once changes stop for the debounce
//! period. Store failures are logged and never reach the wizard.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::store::DraftStore;

enum DraftCommand {
    Save(serde_json::Value),
    Clear(oneshot::Sender<()>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the draft writer task for one persistence key.
///
/// Dropping the handle lets the task write any pending snapshot and exit.
pub struct DraftAutosave {
    key: String,
    tx: mpsc::UnboundedSender<DraftCommand>,
    _task: JoinHandle<()>,
}

impl DraftAutosave {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn DraftStore>, key: impl Into<String>, debounce: Duration) -> Self {
        let key = key.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, key.clone(), debounce, rx));
        Self {
            key,
            tx,
            _task: task,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Queue a snapshot; replaces any snapshot still waiting out the debounce.
    pub fn schedule(&self, snapshot: serde_json::Value) {
        if self.tx.send(DraftCommand::Save(snapshot)).is_err() {
            warn!(key = %self.key, "Draft writer stopped; snapshot dropped");
        }
    }

    /// Write any pending snapshot now and wait for it.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(DraftCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Drop any pending snapshot and delete the stored draft.
    pub async fn clear(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(DraftCommand::Clear(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn run(
    store: Arc<dyn DraftStore>,
    key: String,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<DraftCommand>,
) {
    let mut pending: Option<serde_json::Value> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let command = match deadline {
            Some(at) => {
                tokio::select! {
                    command = rx.recv() => command,
                    _ = tokio::time::sleep_until(at) => {
                        deadline = None;
                        if let Some(snapshot) = pending.take() {
                            write(store.as_ref(), &key, &snapshot).await;
                        }
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };

        match command {
            Some(DraftCommand::Save(snapshot)) => {
                pending = Some(snapshot);
                deadline = Some(Instant::now() + debounce);
            }
            Some(DraftCommand::Flush(ack)) => {
                deadline = None;
                if let Some(snapshot) = pending.take() {
                    write(store.as_ref(), &key, &snapshot).await;
                }
                let _ = ack.send(());
            }
            Some(DraftCommand::Clear(ack)) => {
                deadline = None;
                pending = None;
                match store.clear(&key).await {
                    Ok(removed) => debug!(key = %key, removed, "Draft cleared"),
                    Err(e) => warn!(key = %key, error = %e, "Failed to clear draft"),
                }
                let _ = ack.send(());
            }
            None => {
                if let Some(snapshot) = pending.take() {
                    write(store.as_ref(), &key, &snapshot).await;
                }
                break;
            }
        }
    }
}

async fn write(store: &dyn DraftStore, key: &str, snapshot: &serde_json::Value) {
    match store.save(key, snapshot).await {
        Ok(()) => debug!(key = %key, "Draft saved"),
        Err(e) => warn!(key = %key, error = %e, "Failed to save draft"),
    }
}
