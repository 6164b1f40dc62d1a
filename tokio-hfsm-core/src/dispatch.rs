//! The dispatch lane: one task per machine that processes events strictly
//! in arrival order.

use std::any::Any;
use std::borrow::Cow;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::code::SmEvent;
use crate::config::ShutdownMode;
use crate::error::{ActionFailure, FailureCause, Phase, Unhandled, UnhandledReason};
use crate::event::Event;
use crate::history::{HistoryEntry, Outcome};
use crate::node::{Target, Trans};
use crate::owner::{Finished, Owner};
use crate::scope::{HookScope, Scope};
use crate::shared::{Envelope, Lifecycle, Origin, Shared};
use crate::table::{Resolution, TransitionTable};

pub(crate) struct Lane<C> {
    table: Arc<TransitionTable<C>>,
    context: C,
    state: u32,
    shared: Arc<Shared>,
    state_tx: watch::Sender<u32>,
    seq: u64,
    /// Bumped on every state change; stale state timeouts compare against it.
    entry: u64,
    timer: Option<JoinHandle<()>>,
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn stop_requested(shutdown: &watch::Receiver<Option<ShutdownMode>>) -> bool {
    *shutdown.borrow() == Some(ShutdownMode::Immediate)
}

impl<C: Owner> Lane<C> {
    pub(crate) fn new(
        table: Arc<TransitionTable<C>>,
        context: C,
        initial: u32,
        shared: Arc<Shared>,
        state_tx: watch::Sender<u32>,
    ) -> Self {
        Self {
            table,
            context,
            state: initial,
            shared,
            state_tx,
            seq: 0,
            entry: 0,
            timer: None,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<Envelope>,
        mut shutdown: watch::Receiver<Option<ShutdownMode>>,
    ) -> Finished<C> {
        info!(
            machine = %self.shared.name,
            id = self.shared.id,
            state = %self.table.name(self.state),
            "dispatch lane started"
        );

        if stop_requested(&shutdown) {
            return self.shut_down(ShutdownMode::Immediate, &mut events);
        }
        let initial = self.state;
        if let Err(failure) = self.run_hook(Phase::Entry, initial, initial, None) {
            error!(
                machine = %self.shared.name,
                id = self.shared.id,
                state = %self.table.name(initial),
                reason = %failure.cause,
                "initial entry hook failed, halting machine"
            );
            self.notify_failure(&failure);
            return self.fail(failure, &mut events);
        }
        self.arm_timer();

        if self.shared.config.launch_on_start {
            if stop_requested(&shutdown) {
                return self.shut_down(ShutdownMode::Immediate, &mut events);
            }
            if let Err(failure) = self.dispatch(Event::of(SmEvent::Launch)) {
                return self.fail(failure, &mut events);
            }
        }

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    let mode = match changed {
                        Ok(()) => *shutdown.borrow_and_update(),
                        // The owning machine was dropped without stop().
                        Err(_) => Some(ShutdownMode::Immediate),
                    };
                    if let Some(mode) = mode {
                        return self.shut_down(mode, &mut events);
                    }
                }
                Some(envelope) = events.recv() => {
                    if let Err(failure) = self.step(envelope) {
                        return self.fail(failure, &mut events);
                    }
                }
            }
        }
    }

    /// Tears down a machine that was never started.
    pub(crate) fn discard_unstarted(
        self,
        events: &mut mpsc::UnboundedReceiver<Envelope>,
    ) -> Finished<C> {
        let discarded = self.discard_queue(events, "discarding event queued before start");
        self.shared.mark(Lifecycle::Stopped);
        self.finish(discarded)
    }

    fn step(&mut self, envelope: Envelope) -> Result<(), ActionFailure> {
        self.shared.dequeued();
        let Envelope {
            event,
            epoch,
            origin,
        } = envelope;

        if epoch < self.shared.epoch() {
            warn!(
                machine = %self.shared.name,
                id = self.shared.id,
                event = event.code(),
                mnemonic = %event.mnemonic(),
                "event cancelled before dispatch"
            );
            return Ok(());
        }
        if let Origin::Timer { entry } = origin
            && entry != self.entry
        {
            debug!(
                machine = %self.shared.name,
                id = self.shared.id,
                "ignoring state timeout from an earlier state entry"
            );
            return Ok(());
        }
        self.dispatch(event)
    }

    fn dispatch(&mut self, mut event: Event) -> Result<(), ActionFailure> {
        let from = self.state;
        let code = event.code();
        let seq = self.seq;
        self.seq += 1;

        let mut entry = HistoryEntry::pending(
            seq,
            code,
            event.mnemonic_cow(),
            event.message().map(str::to_owned),
            from,
        );
        self.shared.record(entry.clone());

        let table = Arc::clone(&self.table);
        match table.resolve(from, code) {
            Resolution::Transition { handled_by, trans } => {
                match self.transition(&mut event, handled_by, trans) {
                    Ok(to) => {
                        entry.to = Some(to);
                        entry.outcome = Outcome::Transitioned { handled_by };
                        self.shared.resolve(seq, entry.to, entry.outcome);
                        info!(
                            machine = %self.shared.name,
                            id = self.shared.id,
                            event = code,
                            mnemonic = %event.mnemonic(),
                            message = event.message(),
                            from = %table.name(from),
                            to = %table.name(to),
                            "transition"
                        );
                        self.notify(&event, |owner| owner.on_transition(&entry))?;
                        if from != to {
                            self.notify(&event, |owner| owner.on_state_change(from, to))?;
                        }
                        Ok(())
                    }
                    Err(failure) => {
                        self.shared.resolve(seq, None, Outcome::Failed);
                        error!(
                            machine = %self.shared.name,
                            id = self.shared.id,
                            event = code,
                            mnemonic = %event.mnemonic(),
                            state = %table.name(from),
                            phase = ?failure.phase,
                            reason = %failure.cause,
                            "action failed, halting machine"
                        );
                        self.notify_failure(&failure);
                        Err(failure)
                    }
                }
            }
            Resolution::Dropped { by } => {
                self.shared.resolve(seq, Some(from), Outcome::Dropped { by });
                info!(
                    machine = %self.shared.name,
                    id = self.shared.id,
                    event = code,
                    mnemonic = %event.mnemonic(),
                    state = %table.name(from),
                    by = %table.name(by),
                    "event dropped"
                );
                Ok(())
            }
            Resolution::Invalid { by } => {
                self.shared.resolve(seq, Some(from), Outcome::Invalid { by });
                error!(
                    machine = %self.shared.name,
                    id = self.shared.id,
                    event = code,
                    mnemonic = %event.mnemonic(),
                    message = event.message(),
                    state = %table.name(from),
                    by = %table.name(by),
                    "invalid event"
                );
                self.report_unhandled(&event, UnhandledReason::DeclaredInvalid { by })
            }
            Resolution::Unhandled => {
                self.shared.resolve(seq, Some(from), Outcome::Unhandled);
                error!(
                    machine = %self.shared.name,
                    id = self.shared.id,
                    event = code,
                    mnemonic = %event.mnemonic(),
                    message = event.message(),
                    state = %table.name(from),
                    "no transition for event"
                );
                self.report_unhandled(&event, UnhandledReason::NoTransition)
            }
        }
    }

    /// Runs the action and hooks of `trans`, then commits the new state.
    fn transition(
        &mut self,
        event: &mut Event,
        handled_by: u32,
        trans: &Trans<C>,
    ) -> Result<u32, ActionFailure> {
        let from = self.state;
        let mut chosen = None;

        if let Some(action) = &trans.action {
            let mut scope = Scope {
                context: &mut self.context,
                event: &mut *event,
                shared: &self.shared,
                state: from,
                handled_by,
                target: trans.target,
                chosen: None,
            };
            let result = catch_unwind(AssertUnwindSafe(|| action(&mut scope)));
            chosen = scope.chosen;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    return Err(self.failure(Some(&*event), Phase::Action, FailureCause::Error(err)));
                }
                Err(panic) => {
                    let cause = FailureCause::Panic(panic_message(panic.as_ref()));
                    return Err(self.failure(Some(&*event), Phase::Action, cause));
                }
            }
        }

        let to = match (trans.target, chosen) {
            (Target::State(state), None) => state,
            (Target::State(_), Some(requested)) => {
                let cause = FailureCause::UnexpectedGoto { requested };
                return Err(self.failure(Some(&*event), Phase::Action, cause));
            }
            (Target::Decided, Some(state)) if self.table.contains(state) => state,
            (Target::Decided, Some(state)) => {
                let cause = FailureCause::UnknownNextState { state };
                return Err(self.failure(Some(&*event), Phase::Action, cause));
            }
            (Target::Decided, None) => {
                return Err(self.failure(Some(&*event), Phase::Action, FailureCause::MissingNextState));
            }
        };

        if to != from {
            self.run_hook(Phase::Exit, from, to, Some(&*event))?;
            self.run_hook(Phase::Entry, from, to, Some(&*event))?;
        }
        self.commit(from, to);
        Ok(to)
    }

    fn run_hook(
        &mut self,
        phase: Phase,
        from: u32,
        to: u32,
        trigger: Option<&Event>,
    ) -> Result<(), ActionFailure> {
        let owner = if phase == Phase::Exit { from } else { to };
        let table = Arc::clone(&self.table);
        let hook = table.node(owner).and_then(|node| match phase {
            Phase::Exit => node.on_exit.as_ref(),
            _ => node.on_entry.as_ref(),
        });
        let Some(hook) = hook else {
            return Ok(());
        };

        let mut scope = HookScope {
            context: &mut self.context,
            shared: &self.shared,
            state: owner,
            from,
            to,
            trigger: trigger.map(Event::code),
        };
        match catch_unwind(AssertUnwindSafe(|| hook(&mut scope))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(self.failure(trigger, phase, FailureCause::Error(err))),
            Err(panic) => {
                let cause = FailureCause::Panic(panic_message(panic.as_ref()));
                Err(self.failure(trigger, phase, cause))
            }
        }
    }

    fn commit(&mut self, from: u32, to: u32) {
        self.state = to;
        let _ = self.state_tx.send(to);
        if from != to {
            self.entry += 1;
            self.arm_timer();
        }
    }

    fn arm_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        let Some(duration) = self.table.node(self.state).and_then(|n| n.state_timeout) else {
            return;
        };
        debug!(
            machine = %self.shared.name,
            id = self.shared.id,
            state = %self.table.name(self.state),
            timeout = %humantime::format_duration(duration),
            "arming state timeout"
        );
        let shared = Arc::clone(&self.shared);
        let entry = self.entry;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = shared.post(vec![Event::of(SmEvent::Timeout)], Origin::Timer { entry });
        }));
    }

    fn failure(&self, event: Option<&Event>, phase: Phase, cause: FailureCause) -> ActionFailure {
        ActionFailure {
            machine: self.shared.name.clone(),
            state: self.state,
            event: event.map_or(0, Event::code),
            mnemonic: event.map_or(Cow::Borrowed("start"), Event::mnemonic_cow),
            phase,
            cause,
        }
    }

    fn report_unhandled(
        &mut self,
        event: &Event,
        reason: UnhandledReason,
    ) -> Result<(), ActionFailure> {
        let unhandled = Unhandled {
            machine: self.shared.name.clone(),
            state: self.state,
            event: event.code(),
            mnemonic: event.mnemonic_cow(),
            reason,
        };
        self.notify(event, |owner| owner.on_unhandled(&unhandled))
    }

    /// Runs an owner callback. A panic halts the machine like a failed
    /// action, but the state it reports on stays committed.
    fn notify(&mut self, event: &Event, call: impl FnOnce(&mut C)) -> Result<(), ActionFailure> {
        let Err(panic) = catch_unwind(AssertUnwindSafe(|| call(&mut self.context))) else {
            return Ok(());
        };
        let cause = FailureCause::Panic(panic_message(panic.as_ref()));
        let failure = self.failure(Some(event), Phase::Owner, cause);
        error!(
            machine = %self.shared.name,
            id = self.shared.id,
            event = failure.event,
            mnemonic = %failure.mnemonic,
            state = %self.table.name(self.state),
            reason = %failure.cause,
            "owner callback panicked, halting machine"
        );
        self.notify_failure(&failure);
        Err(failure)
    }

    fn notify_failure(&mut self, failure: &ActionFailure) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.context.on_failure(failure))) {
            error!(
                machine = %self.shared.name,
                id = self.shared.id,
                reason = %panic_message(panic.as_ref()),
                "owner on_failure panicked"
            );
        }
    }

    fn shut_down(
        mut self,
        mode: ShutdownMode,
        events: &mut mpsc::UnboundedReceiver<Envelope>,
    ) -> Finished<C> {
        self.stop_timer();
        let discarded = match mode {
            ShutdownMode::Graceful => {
                info!(
                    machine = %self.shared.name,
                    id = self.shared.id,
                    queued = self.shared.depth(),
                    "draining queued events"
                );
                while let Ok(envelope) = events.try_recv() {
                    if let Err(failure) = self.step(envelope) {
                        return self.fail(failure, events);
                    }
                    // Actions may have re-armed the timer while draining.
                    self.stop_timer();
                }
                0
            }
            ShutdownMode::Immediate => {
                self.discard_queue(events, "discarding queued event on shutdown")
            }
        };
        self.shared.mark(Lifecycle::Stopped);
        info!(
            machine = %self.shared.name,
            id = self.shared.id,
            state = %self.table.name(self.state),
            discarded,
            "dispatch lane stopped"
        );
        self.finish(discarded)
    }

    fn fail(
        mut self,
        failure: ActionFailure,
        events: &mut mpsc::UnboundedReceiver<Envelope>,
    ) -> Finished<C> {
        self.shared.mark(Lifecycle::Failed);
        self.stop_timer();
        let discarded = self.discard_queue(events, "discarding queued event after failure");
        let mut finished = self.finish(discarded);
        finished.failure = Some(failure);
        finished
    }

    fn discard_queue(
        &self,
        events: &mut mpsc::UnboundedReceiver<Envelope>,
        what: &'static str,
    ) -> usize {
        let mut discarded = 0;
        while let Ok(envelope) = events.try_recv() {
            self.shared.dequeued();
            discarded += 1;
            warn!(
                machine = %self.shared.name,
                id = self.shared.id,
                event = envelope.event.code(),
                mnemonic = %envelope.event.mnemonic(),
                "{what}"
            );
        }
        discarded
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn finish(mut self, discarded: usize) -> Finished<C> {
        self.stop_timer();
        Finished {
            context: self.context,
            state: self.state,
            failure: None,
            discarded,
        }
    }
}
