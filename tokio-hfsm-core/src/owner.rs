//! The contract between a machine and the component that owns it.

use crate::error::{ActionFailure, TaskError, Unhandled};
use crate::history::HistoryEntry;

/// Callbacks from the dispatch lane into the machine's context.
///
/// All methods run on the lane, between events, with exclusive access to
/// the context. The defaults do nothing, so an owner only overrides what it
/// reacts to. A callback that panics halts the machine with
/// [`Phase::Owner`](crate::Phase::Owner).
pub trait Owner: Send + 'static {
    /// A transition committed.
    fn on_transition(&mut self, _entry: &HistoryEntry) {}

    /// The committed transition changed the current state.
    fn on_state_change(&mut self, _from: u32, _to: u32) {}

    /// An event had no transition in the current state or any ancestor, or
    /// was declared invalid. The machine keeps running.
    fn on_unhandled(&mut self, _unhandled: &Unhandled) {}

    /// An action or hook failed. The machine stops dispatching.
    fn on_failure(&mut self, _failure: &ActionFailure) {}
}

impl Owner for () {}

/// What a stopped machine hands back.
#[derive(Debug)]
pub struct Finished<C> {
    pub context: C,
    /// The last committed state.
    pub state: u32,
    /// Set when the machine halted on a failed action or hook.
    pub failure: Option<ActionFailure>,
    /// Events that were queued but never dispatched.
    pub discarded: usize,
}

impl<C> Finished<C> {
    /// The context, or the failure that halted the machine.
    pub fn into_result(self) -> Result<C, TaskError> {
        match self.failure {
            Some(failure) => Err(TaskError::Failed(failure)),
            None => Ok(self.context),
        }
    }
}
