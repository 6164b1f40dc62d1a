#![allow(dead_code)]

use tokio_hfsm::{ActionFailure, HistoryEntry, Owner, Unhandled, UnhandledReason};
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Owner that records every callback for later assertions.
#[derive(Debug, Default)]
pub struct Recorder {
    pub log: Vec<&'static str>,
    pub transitions: Vec<(u32, u32, u32)>,
    pub changes: Vec<(u32, u32)>,
    pub unhandled: Vec<(u32, u32, UnhandledReason)>,
    pub failures: Vec<String>,
}

impl Owner for Recorder {
    fn on_transition(&mut self, entry: &HistoryEntry) {
        if let Some(triple) = entry.transition() {
            self.transitions.push(triple);
        }
    }

    fn on_state_change(&mut self, from: u32, to: u32) {
        self.changes.push((from, to));
    }

    fn on_unhandled(&mut self, unhandled: &Unhandled) {
        self.unhandled
            .push((unhandled.state, unhandled.event, unhandled.reason));
    }

    fn on_failure(&mut self, failure: &ActionFailure) {
        self.failures.push(failure.to_string());
    }
}
