//! Debounced persistence of the open project
//!
//! Each `schedule` aborts the pending timer and starts a new one. The timer
//! snapshots the workspace state when it fires, so the write always carries
//! the latest project.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::state::WorkspaceState;
use crate::db::ProjectStore;

pub struct AutoSave {
    store: Arc<ProjectStore>,
    state: Arc<Mutex<WorkspaceState>>,
    delay: Duration,
    pending: std::sync::Mutex<Option<JoinHandle<()>>>,
    scheduled: Arc<AtomicU64>,
    saved: Arc<AtomicU64>,
}

impl AutoSave {
    pub fn new(
        store: Arc<ProjectStore>,
        state: Arc<Mutex<WorkspaceState>>,
        delay: Duration,
    ) -> Self {
        Self {
            store,
            state,
            delay,
            pending: std::sync::Mutex::new(None),
            scheduled: Arc::new(AtomicU64::new(0)),
            saved: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Restart the debounce timer
    pub fn schedule(&self) {
        let generation = self.scheduled.fetch_add(1, Ordering::SeqCst) + 1;

        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);
        let saved = Arc::clone(&self.saved);
        let delay = self.delay;

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = persist(&store, &state, &saved, generation).await {
                error!("Auto-save failed: {:#}", e);
            }
        });

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// True while a scheduled change has not reached storage
    pub fn is_saving(&self) -> bool {
        self.saved.load(Ordering::SeqCst) < self.scheduled.load(Ordering::SeqCst)
    }

    /// Write any pending change now
    ///
    /// Must not be called while holding the workspace state lock.
    pub async fn flush(&self) -> Result<()> {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = pending {
            task.abort();
        }

        if self.is_saving() {
            let generation = self.scheduled.load(Ordering::SeqCst);
            persist(&self.store, &self.state, &self.saved, generation).await?;
        }
        Ok(())
    }
}

impl Drop for AutoSave {
    fn drop(&mut self) {
        if self.is_saving() {
            tracing::warn!("Dropping workspace with unsaved changes");
        }
    }
}

async fn persist(
    store: &ProjectStore,
    state: &Mutex<WorkspaceState>,
    saved: &AtomicU64,
    generation: u64,
) -> Result<()> {
    let project = state.lock().await.project.clone();
    store.save(&project).await?;
    saved.fetch_max(generation, Ordering::SeqCst);
    debug!("Auto-saved project {} (generation {})", project.id, generation);
    Ok(())
}
