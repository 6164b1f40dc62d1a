//! State shared between the lane, handles and timers.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::code::NO_EVENT;
use crate::config::MachineConfig;
use crate::error::PostError;
use crate::event::Event;
use crate::history::{History, HistoryEntry, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Created { queued: usize },
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// Who posted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    External,
    /// An action or hook on the lane. Still accepted while draining.
    Lane,
    /// A state timeout armed on state entry number `entry`.
    Timer { entry: u64 },
}

pub(crate) struct Envelope {
    pub(crate) event: Event,
    pub(crate) epoch: u64,
    pub(crate) origin: Origin,
}

pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) id: u64,
    pub(crate) config: MachineConfig,
    gate: Mutex<Lifecycle>,
    epoch: AtomicU64,
    depth: AtomicUsize,
    history: Mutex<History>,
    tx: mpsc::UnboundedSender<Envelope>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    pub(crate) fn new(
        name: String,
        id: u64,
        config: MachineConfig,
        tx: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        let history = History::new(config.history_capacity);
        Self {
            name,
            id,
            config,
            gate: Mutex::new(Lifecycle::Created { queued: 0 }),
            epoch: AtomicU64::new(0),
            depth: AtomicUsize::new(0),
            history: Mutex::new(history),
            tx,
        }
    }

    /// Enqueues `events` contiguously, or none of them.
    pub(crate) fn post(&self, events: Vec<Event>, origin: Origin) -> Result<(), PostError> {
        if let Some(bad) = events.iter().find(|e| e.code() == NO_EVENT) {
            error!(
                machine = %self.name,
                id = self.id,
                mnemonic = %bad.mnemonic(),
                "refusing to post reserved event code 0"
            );
            return Err(PostError::ReservedCode);
        }

        let mut gate = lock(&self.gate);
        match (*gate, origin) {
            (Lifecycle::Created { queued }, _) => {
                let limit = self.config.prestart_queue_limit;
                if queued + events.len() > limit {
                    error!(
                        machine = %self.name,
                        id = self.id,
                        limit,
                        "pre-start queue full; was start() forgotten?"
                    );
                    return Err(PostError::PreStartQueueFull { limit });
                }
                *gate = Lifecycle::Created {
                    queued: queued + events.len(),
                };
            }
            (Lifecycle::Running, _) | (Lifecycle::Stopping, Origin::Lane) => {}
            (Lifecycle::Stopping | Lifecycle::Stopped, _) => {
                warn!(machine = %self.name, id = self.id, "post after stop rejected");
                return Err(PostError::Stopped);
            }
            (Lifecycle::Failed, _) => {
                warn!(machine = %self.name, id = self.id, "post to failed machine rejected");
                return Err(PostError::Failed);
            }
        }

        let epoch = self.epoch.load(Ordering::Acquire);
        for event in events {
            self.depth.fetch_add(1, Ordering::AcqRel);
            let envelope = Envelope {
                event,
                epoch,
                origin,
            };
            if self.tx.send(envelope).is_err() {
                self.depth.fetch_sub(1, Ordering::AcqRel);
                return Err(PostError::Closed);
            }
        }
        Ok(())
    }

    /// Opens the gate for dispatch. Returns how many events were queued
    /// before start.
    pub(crate) fn open(&self) -> usize {
        let mut gate = lock(&self.gate);
        match *gate {
            Lifecycle::Created { queued } => {
                *gate = Lifecycle::Running;
                queued
            }
            _ => 0,
        }
    }

    /// Stops accepting external posts. A failed machine stays failed.
    pub(crate) fn close(&self) {
        let mut gate = lock(&self.gate);
        if !matches!(*gate, Lifecycle::Failed | Lifecycle::Stopped) {
            *gate = Lifecycle::Stopping;
        }
    }

    pub(crate) fn mark(&self, lifecycle: Lifecycle) {
        *lock(&self.gate) = lifecycle;
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        *lock(&self.gate)
    }

    /// Invalidates everything queued so far. Before start this also frees
    /// the pre-start allowance those events used.
    pub(crate) fn cancel_pending(&self) {
        let mut gate = lock(&self.gate);
        self.epoch.fetch_add(1, Ordering::AcqRel);
        if let Lifecycle::Created { queued } = &mut *gate {
            *queued = 0;
        }
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub(crate) fn dequeued(&self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub(crate) fn record(&self, entry: HistoryEntry) {
        lock(&self.history).record(entry);
    }

    pub(crate) fn resolve(&self, seq: u64, to: Option<u32>, outcome: Outcome) {
        lock(&self.history).resolve(seq, to, outcome);
    }

    pub(crate) fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.history).snapshot()
    }
}
