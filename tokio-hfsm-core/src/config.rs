//! Per-machine configuration.

/// Shutdown mode for [`StateMachine::stop`](crate::StateMachine::stop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Graceful shutdown: the lane dispatches every event already queued,
    /// including events posted by actions during the drain, before
    /// terminating and returning the context.
    Graceful,
    /// Immediate shutdown: the lane terminates after the in-flight action,
    /// discarding (and logging) every unprocessed event.
    Immediate,
}

/// Tuning knobs for one machine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Entries kept in the dispatch history ring (default: 64).
    pub history_capacity: usize,
    /// Events accepted before [`start`](crate::StateMachine::start)
    /// (default: 256).
    pub prestart_queue_limit: usize,
    /// Dispatch [`SmEvent::Launch`](crate::SmEvent::Launch) as the first
    /// event after start (default: false).
    pub launch_on_start: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            prestart_queue_limit: default_prestart_queue_limit(),
            launch_on_start: false,
        }
    }
}

fn default_history_capacity() -> usize {
    64
}

fn default_prestart_queue_limit() -> usize {
    256
}

impl MachineConfig {
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_prestart_queue_limit(mut self, limit: usize) -> Self {
        self.prestart_queue_limit = limit;
        self
    }

    #[must_use]
    pub fn with_launch_on_start(mut self, launch: bool) -> Self {
        self.launch_on_start = launch;
        self
    }
}
