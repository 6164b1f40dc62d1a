//! Error and failure types.

use std::borrow::Cow;
use std::fmt;

/// One problem found while validating a transition table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableIssue {
    #[error("table has no nodes")]
    EmptyTable,
    #[error("state {state} is declared by more than one node")]
    DuplicateState { state: u32 },
    #[error("state {state} lists event {event} more than once")]
    DuplicateEvent { state: u32, event: u32 },
    #[error("state {state} names parent {parent}, which is not in the table")]
    UnknownParent { state: u32, parent: u32 },
    #[error("parent chain loops: {}", render_path(.path))]
    ParentCycle { path: Vec<u32> },
    #[error("state {state}, event {event} targets state {target}, which is not in the table")]
    UnknownTarget { state: u32, event: u32, target: u32 },
    #[error("state {state} uses the reserved event code 0")]
    ReservedEvent { state: u32 },
    #[error("state {state} lists event {event} in more than one of transitions, drop and invalid")]
    ConflictingDisposition { state: u32, event: u32 },
    #[error("state {state} has a state timeout but nothing in its chain handles Timeout")]
    UnhandledTimeout { state: u32 },
    #[error("initial state {state} is not in the table")]
    UnknownInitialState { state: u32 },
    #[error("state {state} neither handles, drops nor rejects event {event}")]
    UncoveredEvent { state: u32, event: u32 },
}

fn render_path(path: &[u32]) -> String {
    path.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn render_issues(issues: &[TableIssue]) -> String {
    issues.iter().map(|issue| format!("; {issue}")).collect()
}

/// A malformed transition table. Always fatal at construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transition table needs to be rectified{}", render_issues(.issues))]
pub struct ConfigError {
    issues: Vec<TableIssue>,
}

impl ConfigError {
    pub(crate) fn new(issues: Vec<TableIssue>) -> Self {
        debug_assert!(!issues.is_empty());
        Self { issues }
    }

    pub fn issues(&self) -> &[TableIssue] {
        &self.issues
    }

    /// Whether any issue matches `pred`.
    pub fn has(&self, pred: impl Fn(&TableIssue) -> bool) -> bool {
        self.issues.iter().any(pred)
    }
}

impl From<TableIssue> for ConfigError {
    fn from(issue: TableIssue) -> Self {
        Self::new(vec![issue])
    }
}

/// Why a post was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PostError {
    #[error("event code 0 is reserved and cannot be posted")]
    ReservedCode,
    #[error("machine not started and {limit} events are already queued")]
    PreStartQueueFull { limit: usize },
    #[error("machine is stopping or stopped")]
    Stopped,
    #[error("machine failed and accepts no more events")]
    Failed,
    #[error("dispatch lane is gone")]
    Closed,
}

/// Why an event found no transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnhandledReason {
    /// Neither the state nor any ancestor mentions the event.
    NoTransition,
    /// A node in the chain lists the event as invalid.
    DeclaredInvalid { by: u32 },
}

/// An event the machine has no transition for. The state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unhandled {
    pub machine: String,
    pub state: u32,
    pub event: u32,
    pub mnemonic: Cow<'static, str>,
    pub reason: UnhandledReason,
}

impl fmt::Display for Unhandled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.reason {
            UnhandledReason::NoTransition => "no transition",
            UnhandledReason::DeclaredInvalid { .. } => "invalid event",
        };
        write!(
            f,
            "{}: S={} & E={}/{} => {}",
            self.machine, self.state, self.event, self.mnemonic, what
        )
    }
}

/// Where in a transition a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Action,
    Exit,
    Entry,
    /// An [`Owner`](crate::Owner) callback.
    Owner,
}

#[derive(Debug, thiserror::Error)]
pub enum FailureCause {
    #[error(transparent)]
    Error(#[from] anyhow::Error),
    #[error("panicked: {0}")]
    Panic(String),
    #[error("transition leaves the next state to the action, but it picked none")]
    MissingNextState,
    #[error("action picked state {requested} on a transition with a fixed target")]
    UnexpectedGoto { requested: u32 },
    #[error("next state {state} is not in the table")]
    UnknownNextState { state: u32 },
}

/// A failed action or hook. Fatal for the machine instance: the state stays
/// at its pre-transition value and no further events are dispatched.
#[derive(Debug, thiserror::Error)]
#[error("{machine}: {phase:?} failed in state {state} on {event}/{mnemonic}: {cause}")]
pub struct ActionFailure {
    pub machine: String,
    pub state: u32,
    pub event: u32,
    pub mnemonic: Cow<'static, str>,
    pub phase: Phase,
    #[source]
    pub cause: FailureCause,
}

/// Error returned when joining the dispatch lane.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// An action or hook failed and the machine stopped.
    #[error("machine failed: {0}")]
    Failed(#[from] ActionFailure),
    /// The lane task panicked outside an action or was cancelled.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
