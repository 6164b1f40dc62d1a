//! Core runtime for tokio-hfsm.
//!
//! A machine is a validated [`TransitionTable`] of [`Node`]s plus a context
//! value. Events are posted from anywhere through a [`MachineHandle`] and
//! dispatched one at a time on a dedicated Tokio task. A state that does not
//! bind an event defers to its parent, and the nearest ancestor wins.

mod code;
mod config;
mod dispatch;
mod error;
mod event;
mod handle;
mod history;
mod machine;
mod node;
mod owner;
mod scope;
mod shared;
mod table;

pub use crate::code::{Code, NO_EVENT, SmEvent};
pub use crate::config::{MachineConfig, ShutdownMode};
pub use crate::error::{
    ActionFailure, ConfigError, FailureCause, Phase, PostError, TableIssue, TaskError, Unhandled,
    UnhandledReason,
};
pub use crate::event::Event;
pub use crate::handle::MachineHandle;
pub use crate::history::{HistoryEntry, Outcome};
pub use crate::machine::StateMachine;
pub use crate::node::{Action, Hook, Node, Target, Trans};
pub use crate::owner::{Finished, Owner};
pub use crate::scope::{HookScope, Scope};
pub use crate::table::{Resolution, TransitionTable};
