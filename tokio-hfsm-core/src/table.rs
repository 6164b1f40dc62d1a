//! Transition table validation and hierarchical lookup.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use tracing::error;

use crate::code::{Code, NO_EVENT, SmEvent};
use crate::error::{ConfigError, TableIssue};
use crate::node::{Node, Target, Trans};

/// Outcome of looking an event up from a state.
#[derive(Debug)]
pub enum Resolution<'a, C> {
    /// `handled_by` is the state itself or the nearest ancestor that binds
    /// the event.
    Transition { handled_by: u32, trans: &'a Trans<C> },
    /// The nearest node that mentions the event drops it.
    Dropped { by: u32 },
    /// The nearest node that mentions the event declares it invalid.
    Invalid { by: u32 },
    /// Nothing in the chain mentions the event.
    Unhandled,
}

/// An immutable, validated set of state nodes.
pub struct TransitionTable<C> {
    nodes: HashMap<u32, Node<C>>,
    order: Vec<u32>,
}

impl<C> TransitionTable<C> {
    /// Validates `nodes` and builds the lookup structure.
    ///
    /// Every problem is collected and logged; the table is refused if there
    /// is at least one.
    pub fn build(nodes: impl IntoIterator<Item = Node<C>>) -> Result<Self, ConfigError> {
        Self::validate(nodes, &[])
    }

    /// Like [`build`](Self::build), but every state must also handle, drop
    /// or reject each of `events` itself or through an ancestor.
    ///
    /// ```rust
    /// # use tokio_hfsm_core::{Code, Node, SmEvent, TableIssue, TransitionTable};
    /// let err = TransitionTable::<()>::build_exhaustive(
    ///     [Node::new(1u32).goto(SmEvent::Launch, 1u32)],
    ///     [SmEvent::Launch, SmEvent::Cancel],
    /// )
    /// .unwrap_err();
    /// let cancel = SmEvent::Cancel.code();
    /// assert!(err.has(|i| *i == TableIssue::UncoveredEvent { state: 1, event: cancel }));
    /// ```
    pub fn build_exhaustive<E: Code>(
        nodes: impl IntoIterator<Item = Node<C>>,
        events: impl IntoIterator<Item = E>,
    ) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let events: Vec<u32> = events
            .into_iter()
            .map(Code::code)
            .filter(|&e| e != NO_EVENT && seen.insert(e))
            .collect();
        Self::validate(nodes, &events)
    }

    fn validate(
        nodes: impl IntoIterator<Item = Node<C>>,
        required: &[u32],
    ) -> Result<Self, ConfigError> {
        let mut issues = Vec::new();
        let mut map = HashMap::new();
        let mut order = Vec::new();

        for node in nodes {
            if map.contains_key(&node.state) {
                issues.push(TableIssue::DuplicateState { state: node.state });
                continue;
            }
            order.push(node.state);
            map.insert(node.state, node);
        }

        if map.is_empty() {
            issues.push(TableIssue::EmptyTable);
        }

        let table = Self { nodes: map, order };
        for state in &table.order {
            table.check_node(&table.nodes[state], &mut issues);
        }
        let cycles = table.check_parent_cycles(&mut issues);
        if !cycles {
            table.check_timeouts(&mut issues);
            table.check_coverage(required, &mut issues);
        }

        if issues.is_empty() {
            Ok(table)
        } else {
            for issue in &issues {
                error!(%issue, "invalid transition table");
            }
            Err(ConfigError::new(issues))
        }
    }

    fn check_node(&self, node: &Node<C>, issues: &mut Vec<TableIssue>) {
        let state = node.state;

        let mut mentions = node
            .transitions
            .iter()
            .map(|t| t.event)
            .chain(node.drop.iter().copied())
            .chain(node.invalid.iter().copied());
        if mentions.any(|e| e == NO_EVENT) {
            issues.push(TableIssue::ReservedEvent { state });
        }

        let lists: [Vec<u32>; 3] = [
            node.transitions.iter().map(|t| t.event).collect(),
            node.drop.clone(),
            node.invalid.clone(),
        ];
        let mut seen_in: HashMap<u32, usize> = HashMap::new();
        for (list_index, list) in lists.iter().enumerate() {
            let mut seen = HashSet::new();
            for &event in list {
                if !seen.insert(event) {
                    issues.push(TableIssue::DuplicateEvent { state, event });
                    continue;
                }
                match seen_in.get(&event) {
                    Some(&other) if other != list_index => {
                        issues.push(TableIssue::ConflictingDisposition { state, event });
                    }
                    Some(_) => {}
                    None => {
                        seen_in.insert(event, list_index);
                    }
                }
            }
        }

        if let Some(parent) = node.parent
            && !self.nodes.contains_key(&parent)
        {
            issues.push(TableIssue::UnknownParent { state, parent });
        }

        for trans in &node.transitions {
            if let Target::State(target) = trans.target
                && !self.nodes.contains_key(&target)
            {
                issues.push(TableIssue::UnknownTarget {
                    state,
                    event: trans.event,
                    target,
                });
            }
        }
    }

    /// Walks every parent chain with a visited set. Returns whether any cycle
    /// was found; each cycle is reported once.
    fn check_parent_cycles(&self, issues: &mut Vec<TableIssue>) -> bool {
        let mut reported: HashSet<Vec<u32>> = HashSet::new();
        for &start in &self.order {
            let mut path = vec![start];
            let mut visited = HashSet::from([start]);
            let mut current = start;
            while let Some(parent) = self.nodes.get(&current).and_then(|n| n.parent) {
                if !self.nodes.contains_key(&parent) {
                    break;
                }
                if !visited.insert(parent) {
                    let begin = path.iter().position(|s| *s == parent).unwrap_or(0);
                    let mut cycle: Vec<u32> = path[begin..].to_vec();
                    let pivot = cycle
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, s)| **s)
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    cycle.rotate_left(pivot);
                    if reported.insert(cycle.clone()) {
                        let first = cycle[0];
                        cycle.push(first);
                        issues.push(TableIssue::ParentCycle { path: cycle });
                    }
                    break;
                }
                path.push(parent);
                current = parent;
            }
        }
        !reported.is_empty()
    }

    fn check_timeouts(&self, issues: &mut Vec<TableIssue>) {
        let timeout = SmEvent::Timeout.code();
        for state in &self.order {
            let node = &self.nodes[state];
            if node.state_timeout.is_none() {
                continue;
            }
            match self.resolve(node.state, timeout) {
                Resolution::Transition { .. } | Resolution::Dropped { .. } => {}
                Resolution::Invalid { .. } | Resolution::Unhandled => {
                    issues.push(TableIssue::UnhandledTimeout { state: node.state });
                }
            }
        }
    }

    fn check_coverage(&self, required: &[u32], issues: &mut Vec<TableIssue>) {
        for &state in &self.order {
            for &event in required {
                if matches!(self.resolve(state, event), Resolution::Unhandled) {
                    issues.push(TableIssue::UncoveredEvent { state, event });
                }
            }
        }
    }

    /// Looks `event` up starting at `state` and walking to ancestors. The
    /// nearest node that mentions the event decides; siblings and
    /// descendants are never searched.
    pub fn resolve(&self, state: u32, event: u32) -> Resolution<'_, C> {
        let mut current = self.nodes.get(&state);
        let mut hops = 0;
        while let Some(node) = current {
            if let Some(trans) = node.transition(event) {
                return Resolution::Transition {
                    handled_by: node.state,
                    trans,
                };
            }
            if node.drops(event) {
                return Resolution::Dropped { by: node.state };
            }
            if node.rejects(event) {
                return Resolution::Invalid { by: node.state };
            }
            if node.terminal {
                return Resolution::Dropped { by: node.state };
            }
            hops += 1;
            if hops > self.order.len() {
                break;
            }
            current = node.parent.and_then(|p| self.nodes.get(&p));
        }
        Resolution::Unhandled
    }

    pub fn node(&self, state: u32) -> Option<&Node<C>> {
        self.nodes.get(&state)
    }

    pub fn contains(&self, state: u32) -> bool {
        self.nodes.contains_key(&state)
    }

    /// State codes in declaration order.
    pub fn states(&self) -> &[u32] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn label(&self, state: u32) -> Option<&'static str> {
        self.nodes.get(&state).and_then(|n| n.label)
    }

    pub(crate) fn name(&self, state: u32) -> StateName {
        StateName {
            code: state,
            label: self.label(state),
        }
    }

    /// States reachable from `initial` through fixed targets, counting
    /// transitions inherited from ancestors. Returns `None` when a reachable
    /// node has a decided transition, since its targets are unknown.
    pub fn reachable_from(&self, initial: u32) -> Option<HashSet<u32>> {
        let mut graph = DiGraphMap::<u32, ()>::new();
        let mut opaque = HashSet::new();
        for &state in &self.order {
            graph.add_node(state);
            let mut shadowed = HashSet::new();
            let mut hops = 0;
            let mut current = self.nodes.get(&state);
            while let Some(node) = current {
                for trans in &node.transitions {
                    if !shadowed.insert(trans.event) {
                        continue;
                    }
                    match trans.target {
                        Target::State(target) => {
                            graph.add_edge(state, target, ());
                        }
                        Target::Decided => {
                            opaque.insert(state);
                        }
                    }
                }
                shadowed.extend(node.drop.iter().copied());
                shadowed.extend(node.invalid.iter().copied());
                if node.terminal {
                    break;
                }
                hops += 1;
                if hops > self.order.len() {
                    break;
                }
                current = node.parent.and_then(|p| self.nodes.get(&p));
            }
        }

        if !graph.contains_node(initial) {
            return Some(HashSet::new());
        }
        let mut reached = HashSet::new();
        let mut dfs = Dfs::new(&graph, initial);
        while let Some(state) = dfs.next(&graph) {
            if opaque.contains(&state) {
                return None;
            }
            reached.insert(state);
        }
        Some(reached)
    }

    /// Leaf states (not a parent of anything) that can never become current
    /// when starting from `initial`. Empty when the analysis is inconclusive.
    pub fn unreachable_from(&self, initial: u32) -> Vec<u32> {
        let Some(reached) = self.reachable_from(initial) else {
            return Vec::new();
        };
        let parents: HashSet<u32> = self.nodes.values().filter_map(|n| n.parent).collect();
        self.order
            .iter()
            .copied()
            .filter(|s| !reached.contains(s) && !parents.contains(s))
            .collect()
    }
}

impl<C> fmt::Debug for TransitionTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionTable")
            .field("states", &self.order)
            .finish()
    }
}

/// A state code rendered with its label, e.g. `Sending(1)`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StateName {
    code: u32,
    label: Option<&'static str>,
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            Some(label) => write!(f, "{label}({})", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}
