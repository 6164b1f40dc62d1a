//! # tokio-hfsm
//!
//! Table-driven hierarchical state machines for protocol control flow,
//! dispatched on a single Tokio task per machine.
//!
//! States and events are `u32` codes. A [`Node`] binds events to
//! transitions; a node that does not bind an event defers to its parent.
//! Events can be posted from any thread, including from inside actions,
//! and are always dispatched one at a time in arrival order.
//!
//! ## Example
//!
//! ```rust
//! use tokio_hfsm::prelude::*;
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
//! enum Door {
//!     Closed,
//!     Open,
//! }
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
//! #[codes(after = SmEvent)]
//! enum Push {
//!     Handle,
//! }
//!
//! #[derive(Default)]
//! struct Opened(u32);
//!
//! impl Owner for Opened {}
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let nodes = vec![
//!     Node::<Opened>::new(Door::Closed).on(Push::Handle, Door::Open, |scope| {
//!         scope.context_mut().0 += 1;
//!         Ok(())
//!     }),
//!     Node::new(Door::Open).goto(Push::Handle, Door::Closed),
//! ];
//!
//! let mut door = StateMachine::new("door", nodes, Door::Closed, Opened::default())?;
//! let handle = door.handle();
//! door.start();
//!
//! handle.post(Event::of(Push::Handle))?;
//! handle.wait_for_state(Door::Open).await?;
//!
//! let finished = door.stop(ShutdownMode::Graceful).await?;
//! assert_eq!(finished.context.0, 1);
//! # Ok(())
//! # }
//! ```

#[doc(inline)]
pub use tokio_hfsm_core::*;
#[doc(inline)]
pub use tokio_hfsm_macros::Codes;

/// The types most machines need.
pub mod prelude {
    pub use crate::{
        Code, Codes, Event, Finished, HookScope, MachineConfig, MachineHandle, Node, Owner,
        Scope, ShutdownMode, SmEvent, StateMachine,
    };
}
