//! Bounded dispatch history for diagnostics.

use std::borrow::Cow;
use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// What became of a dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Recorded, lookup or action still running.
    Pending,
    Transitioned { handled_by: u32 },
    Dropped { by: u32 },
    Invalid { by: u32 },
    Unhandled,
    Failed,
}

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub event: u32,
    pub mnemonic: Cow<'static, str>,
    pub message: Option<String>,
    pub from: u32,
    /// The state after the event, when it was committed.
    pub to: Option<u32>,
    pub outcome: Outcome,
}

impl HistoryEntry {
    /// `(from, event, to)` for committed transitions.
    pub fn transition(&self) -> Option<(u32, u32, u32)> {
        match self.outcome {
            Outcome::Transitioned { .. } => self.to.map(|to| (self.from, self.event, to)),
            _ => None,
        }
    }
}

impl HistoryEntry {
    pub(crate) fn pending(
        seq: u64,
        event: u32,
        mnemonic: Cow<'static, str>,
        message: Option<String>,
        from: u32,
    ) -> Self {
        Self {
            seq,
            at: Utc::now(),
            event,
            mnemonic,
            message,
            from,
            to: None,
            outcome: Outcome::Pending,
        }
    }
}

#[derive(Debug)]
pub(crate) struct History {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub(crate) fn record(&mut self, entry: HistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Resolves the pending entry `seq` if it is still held.
    pub(crate) fn resolve(&mut self, seq: u64, to: Option<u32>, outcome: Outcome) {
        if let Some(entry) = self.entries.iter_mut().rev().find(|e| e.seq == seq) {
            entry.to = to;
            entry.outcome = outcome;
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}
