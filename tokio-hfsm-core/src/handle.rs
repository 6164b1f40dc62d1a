use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::code::Code;
use crate::error::PostError;
use crate::event::Event;
use crate::history::HistoryEntry;
use crate::shared::{Lifecycle, Origin, Shared};

/// A handle to a machine for event submission and state observation.
///
/// Cheap to clone and usable from any thread. Posting never waits for the
/// dispatch lane.
#[derive(Clone)]
pub struct MachineHandle {
    pub(crate) shared: Arc<Shared>,
    pub(crate) state_rx: watch::Receiver<u32>,
}

impl MachineHandle {
    /// Queues an event for dispatch.
    pub fn post(&self, event: Event) -> Result<(), PostError> {
        self.shared.post(vec![event], Origin::External)
    }

    pub fn post_event(
        &self,
        code: impl Code,
        mnemonic: impl Into<Cow<'static, str>>,
    ) -> Result<(), PostError> {
        self.post(Event::new(code, mnemonic))
    }

    /// Queues an event carrying a payload for the action to take.
    pub fn post_with<T: Any + Send>(
        &self,
        code: impl Code,
        mnemonic: impl Into<Cow<'static, str>>,
        arg: T,
    ) -> Result<(), PostError> {
        self.post(Event::new(code, mnemonic).with_arg(arg))
    }

    /// Queues `events` back to back; nothing posted concurrently lands in
    /// between. Either all are queued or none.
    pub fn post_sequence(&self, events: impl IntoIterator<Item = Event>) -> Result<(), PostError> {
        self.shared.post(events.into_iter().collect(), Origin::External)
    }

    /// Posts `event` once `delay` has elapsed. The returned task resolves to
    /// the outcome of that post; aborting it cancels the timer.
    pub fn post_after(&self, delay: Duration, event: Event) -> JoinHandle<Result<(), PostError>> {
        let shared = Arc::clone(&self.shared);
        debug!(
            machine = %shared.name,
            id = shared.id,
            event = event.code(),
            delay = %humantime::format_duration(delay),
            "scheduling delayed post"
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.post(vec![event], Origin::External)
        })
    }

    /// Discards every event queued before this call. An action already
    /// running is not interrupted.
    pub fn cancel_pending(&self) {
        self.shared.cancel_pending();
    }

    /// Returns the last committed state. May be stale by the time it is read.
    pub fn current_state(&self) -> u32 {
        *self.state_rx.borrow()
    }

    /// Waits for the machine to reach the specified state.
    pub async fn wait_for_state(&self, target: impl Code) -> Result<(), watch::error::RecvError> {
        let target = target.code();
        let mut rx = self.state_rx.clone();
        while *rx.borrow_and_update() != target {
            rx.changed().await?;
        }
        Ok(())
    }

    /// Snapshot of the dispatch history, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.shared.history()
    }

    /// Events queued but not yet taken by the lane.
    pub fn queue_depth(&self) -> usize {
        self.shared.depth()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lifecycle() == Lifecycle::Running
    }

    pub fn is_failed(&self) -> bool {
        self.shared.lifecycle() == Lifecycle::Failed
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }
}

impl std::fmt::Debug for MachineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineHandle")
            .field("name", &self.shared.name)
            .field("id", &self.shared.id)
            .field("state", &self.current_state())
            .finish_non_exhaustive()
    }
}
