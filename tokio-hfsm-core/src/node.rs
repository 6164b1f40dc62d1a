//! Static configuration: state nodes and their transitions.

use std::sync::Arc;
use std::time::Duration;

use crate::code::Code;
use crate::scope::{HookScope, Scope};

/// An action bound to a transition. Runs on the dispatch lane.
pub type Action<C> = Arc<dyn Fn(&mut Scope<'_, C>) -> anyhow::Result<()> + Send + Sync>;

/// An entry or exit hook bound to a node.
pub type Hook<C> = Arc<dyn Fn(&mut HookScope<'_, C>) -> anyhow::Result<()> + Send + Sync>;

/// Where a transition leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A fixed next state.
    State(u32),
    /// The action picks the next state with [`Scope::goto`].
    Decided,
}

/// Binding of one event to an action and a resulting state, scoped to a node.
pub struct Trans<C> {
    pub(crate) event: u32,
    pub(crate) event_label: Option<&'static str>,
    pub(crate) target: Target,
    pub(crate) action: Option<Action<C>>,
}

impl<C> Trans<C> {
    pub fn event(&self) -> u32 {
        self.event
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn event_label(&self) -> Option<&'static str> {
        self.event_label
    }
}

impl<C> Clone for Trans<C> {
    fn clone(&self) -> Self {
        Self {
            event: self.event,
            event_label: self.event_label,
            target: self.target,
            action: self.action.clone(),
        }
    }
}

impl<C> std::fmt::Debug for Trans<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trans")
            .field("event", &self.event)
            .field("target", &self.target)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

/// The complete configuration of one state.
///
/// ```rust
/// # use tokio_hfsm_core::{Node, SmEvent};
/// const IDLE: u32 = 10;
/// const BUSY: u32 = 11;
///
/// let node = Node::<()>::new(BUSY)
///     .parent(IDLE)
///     .on(SmEvent::Success, IDLE, |scope| {
///         tracing::debug!(from = scope.state(), "work finished");
///         Ok(())
///     })
///     .drop_events([SmEvent::TempFail]);
/// ```
pub struct Node<C> {
    pub(crate) state: u32,
    pub(crate) label: Option<&'static str>,
    pub(crate) parent: Option<u32>,
    pub(crate) transitions: Vec<Trans<C>>,
    pub(crate) drop: Vec<u32>,
    pub(crate) invalid: Vec<u32>,
    pub(crate) on_entry: Option<Hook<C>>,
    pub(crate) on_exit: Option<Hook<C>>,
    pub(crate) state_timeout: Option<Duration>,
    pub(crate) terminal: bool,
}

impl<C> Node<C> {
    pub fn new(state: impl Code) -> Self {
        Self {
            state: state.code(),
            label: state.label(),
            parent: None,
            transitions: Vec::new(),
            drop: Vec::new(),
            invalid: Vec::new(),
            on_entry: None,
            on_exit: None,
            state_timeout: None,
            terminal: false,
        }
    }

    /// Delegates events this node does not handle to `parent`.
    #[must_use]
    pub fn parent(mut self, parent: impl Code) -> Self {
        self.parent = Some(parent.code());
        self
    }

    /// Adds a transition to `next` running `action` first.
    #[must_use]
    pub fn on<F>(mut self, event: impl Code, next: impl Code, action: F) -> Self
    where
        F: Fn(&mut Scope<'_, C>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.transitions.push(Trans {
            event: event.code(),
            event_label: event.label(),
            target: Target::State(next.code()),
            action: Some(Arc::new(action)),
        });
        self
    }

    /// Adds a transition to `next` with no action.
    #[must_use]
    pub fn goto(mut self, event: impl Code, next: impl Code) -> Self {
        self.transitions.push(Trans {
            event: event.code(),
            event_label: event.label(),
            target: Target::State(next.code()),
            action: None,
        });
        self
    }

    /// Adds a transition whose action picks the next state.
    #[must_use]
    pub fn on_decided<F>(mut self, event: impl Code, action: F) -> Self
    where
        F: Fn(&mut Scope<'_, C>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.transitions.push(Trans {
            event: event.code(),
            event_label: event.label(),
            target: Target::Decided,
            action: Some(Arc::new(action)),
        });
        self
    }

    /// Adds a prebuilt transition, e.g. one shared between several nodes.
    #[must_use]
    pub fn with(mut self, trans: Trans<C>) -> Self {
        self.transitions.push(trans);
        self
    }

    /// Events ignored in this state (logged, state unchanged).
    #[must_use]
    pub fn drop_events<E: Code>(mut self, events: impl IntoIterator<Item = E>) -> Self {
        self.drop.extend(events.into_iter().map(Code::code));
        self
    }

    /// Events that must never arrive in this state. They are reported like
    /// unhandled events.
    #[must_use]
    pub fn invalid_events<E: Code>(mut self, events: impl IntoIterator<Item = E>) -> Self {
        self.invalid.extend(events.into_iter().map(Code::code));
        self
    }

    #[must_use]
    pub fn on_entry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookScope<'_, C>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_entry = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_exit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookScope<'_, C>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_exit = Some(Arc::new(hook));
        self
    }

    /// Posts [`SmEvent::Timeout`](crate::SmEvent::Timeout) if the machine is
    /// still in this state entry after `duration`.
    #[must_use]
    pub fn state_timeout(mut self, duration: Duration) -> Self {
        self.state_timeout = Some(duration);
        self
    }

    /// Drops every event this node does not list itself. Ancestors are not
    /// consulted from here.
    #[must_use]
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn label(&self) -> Option<&'static str> {
        self.label
    }

    pub fn parent_state(&self) -> Option<u32> {
        self.parent
    }

    pub fn transitions(&self) -> &[Trans<C>] {
        &self.transitions
    }

    pub(crate) fn transition(&self, event: u32) -> Option<&Trans<C>> {
        self.transitions.iter().find(|t| t.event == event)
    }

    pub(crate) fn drops(&self, event: u32) -> bool {
        self.drop.contains(&event)
    }

    pub(crate) fn rejects(&self, event: u32) -> bool {
        self.invalid.contains(&event)
    }
}

impl<C> Trans<C> {
    /// A standalone transition, for reuse across nodes with [`Node::with`].
    pub fn new<F>(event: impl Code, next: impl Code, action: F) -> Self
    where
        F: Fn(&mut Scope<'_, C>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            event: event.code(),
            event_label: event.label(),
            target: Target::State(next.code()),
            action: Some(Arc::new(action)),
        }
    }
}
