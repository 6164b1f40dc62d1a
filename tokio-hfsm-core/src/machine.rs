use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::code::Code;
use crate::config::{MachineConfig, ShutdownMode};
use crate::dispatch::Lane;
use crate::error::{ConfigError, TableIssue, TaskError};
use crate::handle::MachineHandle;
use crate::node::Node;
use crate::owner::{Finished, Owner};
use crate::shared::{Envelope, Shared};
use crate::table::TransitionTable;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct Idle<C> {
    lane: Lane<C>,
    events: mpsc::UnboundedReceiver<Envelope>,
    shutdown: watch::Receiver<Option<ShutdownMode>>,
}

/// Closes the gate and tells the lane to stop once the machine goes away.
struct ShutdownGuard {
    shared: Arc<Shared>,
    tx: watch::Sender<Option<ShutdownMode>>,
}

impl ShutdownGuard {
    fn signal(&self, mode: ShutdownMode) {
        self.shared.close();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(mode);
            true
        });
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.signal(ShutdownMode::Immediate);
    }
}

/// One instance of a hierarchical state machine.
///
/// The machine owns its context `C` and the dispatch lane that runs the
/// transition table against it. Events are posted through a
/// [`MachineHandle`]; the machine itself only controls the lifecycle.
///
/// # Example
///
/// ```rust
/// use tokio_hfsm_core::{Node, SmEvent, StateMachine, ShutdownMode};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> anyhow::Result<()> {
/// let nodes = vec![
///     Node::<()>::new(0u32).goto(SmEvent::Launch, 1u32),
///     Node::new(1u32),
/// ];
/// let mut machine = StateMachine::new("doc", nodes, 0u32, ())?;
/// let handle = machine.handle();
/// handle.post(tokio_hfsm_core::Event::of(SmEvent::Launch))?;
/// machine.start();
/// handle.wait_for_state(1u32).await?;
/// let finished = machine.stop(ShutdownMode::Graceful).await?;
/// assert_eq!(finished.state, 1);
/// # Ok(())
/// # }
/// ```
pub struct StateMachine<C> {
    handle: MachineHandle,
    table: Arc<TransitionTable<C>>,
    idle: Option<Idle<C>>,
    task: Option<JoinHandle<Finished<C>>>,
    guard: ShutdownGuard,
}

impl<C: Owner> StateMachine<C> {
    /// Validates `nodes` and builds a machine with the default
    /// configuration.
    pub fn new(
        name: impl Into<String>,
        nodes: impl IntoIterator<Item = Node<C>>,
        initial: impl Code,
        context: C,
    ) -> Result<Self, ConfigError> {
        let table = TransitionTable::build(nodes)?;
        Self::with_table(name, Arc::new(table), initial, context, MachineConfig::default())
    }

    /// Builds a machine over an already validated table. Many machines may
    /// share one table.
    pub fn with_table(
        name: impl Into<String>,
        table: Arc<TransitionTable<C>>,
        initial: impl Code,
        context: C,
        config: MachineConfig,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let initial = initial.code();
        if !table.contains(initial) {
            let issue = TableIssue::UnknownInitialState { state: initial };
            error!(machine = %name, %issue, "transition table needs to be rectified");
            return Err(issue.into());
        }
        for state in table.unreachable_from(initial) {
            warn!(
                machine = %name,
                state = %table.name(state),
                "state is unreachable from the initial state"
            );
        }

        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let (event_tx, events) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(initial);
        let (shutdown_tx, shutdown) = watch::channel(None);
        let shared = Arc::new(Shared::new(name, id, config, event_tx));
        let lane = Lane::new(
            Arc::clone(&table),
            context,
            initial,
            Arc::clone(&shared),
            state_tx,
        );

        Ok(Self {
            handle: MachineHandle {
                shared: Arc::clone(&shared),
                state_rx,
            },
            table,
            idle: Some(Idle {
                lane,
                events,
                shutdown,
            }),
            task: None,
            guard: ShutdownGuard {
                shared,
                tx: shutdown_tx,
            },
        })
    }

    pub fn handle(&self) -> MachineHandle {
        self.handle.clone()
    }

    pub fn table(&self) -> &Arc<TransitionTable<C>> {
        &self.table
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn id(&self) -> u64 {
        self.handle.id()
    }

    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }

    /// Spawns the dispatch lane. Events posted before this call are
    /// dispatched first, in order.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&mut self) {
        let Some(Idle {
            lane,
            events,
            shutdown,
        }) = self.idle.take()
        else {
            warn!(
                machine = %self.name(),
                id = self.id(),
                "start called on a running machine; ignoring"
            );
            return;
        };

        let queued = self.guard.shared.open();
        info!(machine = %self.name(), id = self.id(), queued, "starting machine");
        self.task = Some(tokio::spawn(lane.run(events, shutdown)));
    }

    /// Stops the machine and hands back its context.
    ///
    /// External posts are refused from this point on. With
    /// [`ShutdownMode::Graceful`] everything already queued is still
    /// dispatched; with [`ShutdownMode::Immediate`] it is discarded.
    pub async fn stop(self, mode: ShutdownMode) -> Result<Finished<C>, TaskError> {
        let Self {
            idle, task, guard, ..
        } = self;
        guard.signal(mode);

        match (task, idle) {
            (Some(task), _) => Ok(task.await?),
            (None, Some(Idle {
                lane, mut events, ..
            })) => {
                info!(
                    machine = %guard.shared.name,
                    id = guard.shared.id,
                    "stopping a machine that was never started"
                );
                Ok(lane.discard_unstarted(&mut events))
            }
            (None, None) => unreachable!("start() moves the idle lane into the task"),
        }
    }
}

impl<C> std::fmt::Debug for StateMachine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("handle", &self.handle)
            .field("started", &self.task.is_some())
            .finish_non_exhaustive()
    }
}
