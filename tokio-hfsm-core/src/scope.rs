//! What actions and hooks see while they run on the lane.

use std::any::Any;
use std::borrow::Cow;

use crate::code::Code;
use crate::error::PostError;
use crate::event::Event;
use crate::node::Target;
use crate::shared::{Origin, Shared};

/// Access for an action: its triggering event, the machine context, and a
/// way to post follow-up events.
///
/// Events posted here are queued behind everything already waiting and are
/// never dispatched before the current action returns and its transition
/// commits.
pub struct Scope<'a, C> {
    pub(crate) context: &'a mut C,
    pub(crate) event: &'a mut Event,
    pub(crate) shared: &'a Shared,
    pub(crate) state: u32,
    pub(crate) handled_by: u32,
    pub(crate) target: Target,
    pub(crate) chosen: Option<u32>,
}

impl<C> Scope<'_, C> {
    pub fn context(&self) -> &C {
        self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        self.context
    }

    pub fn event(&self) -> &Event {
        self.event
    }

    pub fn code(&self) -> u32 {
        self.event.code()
    }

    pub fn mnemonic(&self) -> &str {
        self.event.mnemonic()
    }

    /// Moves the event's payload out if it is a `T`.
    pub fn take_arg<T: Any>(&mut self) -> Option<T> {
        self.event.take_arg()
    }

    pub fn arg_ref<T: Any>(&self) -> Option<&T> {
        self.event.arg_ref()
    }

    /// The state being left. Unchanged until the action returns.
    pub fn state(&self) -> u32 {
        self.state
    }

    /// The node whose transition is running: the current state or the
    /// ancestor it was inherited from.
    pub fn handled_by(&self) -> u32 {
        self.handled_by
    }

    /// The state the machine moves to if the action succeeds, if known yet.
    pub fn next_state(&self) -> Option<u32> {
        match self.target {
            Target::State(state) => Some(state),
            Target::Decided => self.chosen,
        }
    }

    /// Picks the next state on a decided transition. Calling this on a
    /// transition with a fixed target fails the action.
    pub fn goto(&mut self, state: impl Code) {
        self.chosen = Some(state.code());
    }

    pub fn post(&self, event: Event) -> Result<(), PostError> {
        self.shared.post(vec![event], Origin::Lane)
    }

    pub fn post_event(
        &self,
        code: impl Code,
        mnemonic: impl Into<Cow<'static, str>>,
    ) -> Result<(), PostError> {
        self.post(Event::new(code, mnemonic))
    }

    pub fn post_sequence(&self, events: impl IntoIterator<Item = Event>) -> Result<(), PostError> {
        self.shared.post(events.into_iter().collect(), Origin::Lane)
    }

    /// Discards every event queued so far, including ones this action
    /// posted.
    pub fn clear_queue(&self) {
        self.shared.cancel_pending();
    }

    pub fn queue_depth(&self) -> usize {
        self.shared.depth()
    }

    pub fn machine(&self) -> &str {
        &self.shared.name
    }
}

/// Access for entry and exit hooks.
pub struct HookScope<'a, C> {
    pub(crate) context: &'a mut C,
    pub(crate) shared: &'a Shared,
    pub(crate) state: u32,
    pub(crate) from: u32,
    pub(crate) to: u32,
    pub(crate) trigger: Option<u32>,
}

impl<C> HookScope<'_, C> {
    pub fn context(&self) -> &C {
        self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        self.context
    }

    /// The node the hook belongs to.
    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn from(&self) -> u32 {
        self.from
    }

    pub fn to(&self) -> u32 {
        self.to
    }

    /// The event code that caused the transition; `None` for the initial
    /// entry on start.
    pub fn trigger(&self) -> Option<u32> {
        self.trigger
    }

    pub fn post(&self, event: Event) -> Result<(), PostError> {
        self.shared.post(vec![event], Origin::Lane)
    }

    pub fn post_event(
        &self,
        code: impl Code,
        mnemonic: impl Into<Cow<'static, str>>,
    ) -> Result<(), PostError> {
        self.post(Event::new(code, mnemonic))
    }

    pub fn clear_queue(&self) {
        self.shared.cancel_pending();
    }

    pub fn machine(&self) -> &str {
        &self.shared.name
    }
}
