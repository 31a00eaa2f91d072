//! Background narrative requests for the interactive dashboard.
//!
//! Requests run on a tokio runtime while the UI keeps drawing. Results come
//! back over a channel and are applied to the store in the order they resolve,
//! so when two requests for one task overlap the later result wins. Results
//! for a task deleted in the meantime are dropped.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::runtime::Handle;
use tracing::debug;

use super::{narrate, NarrativeOutcome, NarrativeService};
use crate::models::{Task, TaskId};
use crate::storage::TaskStore;

struct Resolved {
    task_id: TaskId,
    outcome: NarrativeOutcome,
}

/// What happened to one resolved request.
#[derive(Debug)]
pub struct Applied {
    pub task_id: TaskId,
    /// `false` when the task was deleted before the result arrived.
    pub stored: bool,
    /// Set when the local fallback was used.
    pub notice: Option<String>,
}

pub struct NarrativeDispatcher {
    runtime: Handle,
    service: Option<Arc<dyn NarrativeService>>,
    timeout: Duration,
    tx: Sender<Resolved>,
    rx: Receiver<Resolved>,
    in_flight: HashMap<TaskId, usize>,
}

impl NarrativeDispatcher {
    pub fn new(runtime: Handle, service: Option<Arc<dyn NarrativeService>>, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { runtime, service, timeout, tx, rx, in_flight: HashMap::new() }
    }

    /// Starts a request for `task` without waiting for it.
    pub fn request(&mut self, task: &Task, user_update: Option<String>, today: NaiveDate) {
        *self.in_flight.entry(task.id).or_insert(0) += 1;
        let task = task.clone();
        let service = self.service.clone();
        let timeout = self.timeout;
        let tx = self.tx.clone();
        debug!(task = %task.id, "narrative request dispatched");
        self.runtime.spawn(async move {
            let outcome = narrate(service.as_deref(), &task, user_update, today, timeout).await;
            // The receiver only goes away when the dashboard closes.
            let _ = tx.send(Resolved { task_id: task.id, outcome });
        });
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.in_flight.contains_key(&id)
    }

    pub fn pending(&self) -> usize {
        self.in_flight.values().sum()
    }

    /// Applies every result that has already arrived. Never blocks.
    pub fn apply_ready(&mut self, store: &mut TaskStore) -> Vec<Applied> {
        let mut applied = Vec::new();
        while let Ok(resolved) = self.rx.try_recv() {
            applied.push(self.apply(store, resolved));
        }
        applied
    }

    /// Waits up to `wait` for the next result and applies it.
    pub fn apply_next(&mut self, store: &mut TaskStore, wait: Duration) -> Option<Applied> {
        match self.rx.recv_timeout(wait) {
            Ok(resolved) => Some(self.apply(store, resolved)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn apply(&mut self, store: &mut TaskStore, resolved: Resolved) -> Applied {
        if let Some(n) = self.in_flight.get_mut(&resolved.task_id) {
            *n -= 1;
            if *n == 0 {
                self.in_flight.remove(&resolved.task_id);
            }
        }
        let stored = store.set_narrative(resolved.task_id, &resolved.outcome.narrative);
        if !stored {
            debug!(task = %resolved.task_id, "narrative for deleted task dropped");
        }
        Applied {
            task_id: resolved.task_id,
            stored,
            notice: resolved.outcome.notice(),
        }
    }
}
