use tokio_hfsm::prelude::*;
use tokio_hfsm::{Outcome, UnhandledReason};

mod common;

use common::Recorder;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
enum Conn {
    Session,
    Authed,
    Streaming,
    Idle,
    Closed,
    Elsewhere,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
#[codes(after = SmEvent)]
enum Wire {
    Chunk,
    Reset,
    Only,
    Noise,
    Corrupt,
}

/// Streaming -> Authed -> Session, plus unrelated siblings.
fn nodes() -> Vec<Node<Recorder>> {
    vec![
        Node::<Recorder>::new(Conn::Session)
            .on(SmEvent::Cancel, Conn::Closed, |scope| {
                scope.context_mut().log.push("session cancel");
                Ok(())
            })
            .on(Wire::Reset, Conn::Idle, |scope| {
                scope.context_mut().log.push("session reset");
                Ok(())
            })
            .drop_events([Wire::Noise]),
        Node::<Recorder>::new(Conn::Authed)
            .parent(Conn::Session)
            .on(Wire::Reset, Conn::Closed, |scope| {
                scope.context_mut().log.push("authed reset");
                Ok(())
            })
            .invalid_events([Wire::Corrupt]),
        Node::new(Conn::Streaming)
            .parent(Conn::Authed)
            .goto(Wire::Chunk, Conn::Streaming),
        Node::new(Conn::Idle).goto(Wire::Chunk, Conn::Streaming),
        Node::new(Conn::Closed),
        Node::new(Conn::Elsewhere).goto(Wire::Only, Conn::Closed),
    ]
}

async fn run_from(initial: Conn, events: &[Wire]) -> (Finished<Recorder>, MachineHandle) {
    common::init_tracing();
    let mut machine = StateMachine::new("conn", nodes(), initial, Recorder::default()).unwrap();
    let handle = machine.handle();
    for event in events {
        handle.post(Event::of(*event)).unwrap();
    }
    machine.start();
    let finished = machine.stop(ShutdownMode::Graceful).await.unwrap();
    (finished, handle)
}

#[tokio::test]
async fn test_grandparent_transition_applies_to_grandchild() {
    common::init_tracing();
    let mut machine =
        StateMachine::new("conn", nodes(), Conn::Streaming, Recorder::default()).unwrap();
    let handle = machine.handle();
    machine.start();
    handle.post(Event::of(SmEvent::Cancel)).unwrap();
    handle.wait_for_state(Conn::Closed).await.unwrap();

    let finished = machine.stop(ShutdownMode::Graceful).await.unwrap();
    assert_eq!(finished.context.log, vec!["session cancel"]);
    assert_eq!(
        handle.history()[0].outcome,
        Outcome::Transitioned {
            handled_by: Conn::Session.code()
        }
    );
}

#[tokio::test]
async fn test_nearest_ancestor_wins() {
    let (finished, _) = run_from(Conn::Streaming, &[Wire::Reset]).await;
    assert_eq!(finished.state, Conn::Closed.code());
    assert_eq!(finished.context.log, vec!["authed reset"]);

    let (finished, _) = run_from(Conn::Session, &[Wire::Reset]).await;
    assert_eq!(finished.state, Conn::Idle.code());
    assert_eq!(finished.context.log, vec!["session reset"]);
}

#[tokio::test]
async fn test_own_transition_shadows_ancestors() {
    let (finished, handle) = run_from(Conn::Streaming, &[Wire::Chunk, Wire::Chunk]).await;
    assert_eq!(finished.state, Conn::Streaming.code());
    assert!(finished.context.log.is_empty());
    assert!(handle.history().iter().all(|e| e.outcome
        == Outcome::Transitioned {
            handled_by: Conn::Streaming.code()
        }));
}

#[tokio::test]
async fn test_event_of_unrelated_state_is_unhandled() {
    let (finished, handle) = run_from(Conn::Streaming, &[Wire::Only]).await;
    let owner = finished.context;
    assert_eq!(finished.state, Conn::Streaming.code());
    assert_eq!(
        owner.unhandled,
        vec![(
            Conn::Streaming.code(),
            Wire::Only.code(),
            UnhandledReason::NoTransition
        )]
    );
    assert!(owner.transitions.is_empty());

    let history = handle.history();
    let entry = &history[0];
    assert_eq!(entry.outcome, Outcome::Unhandled);
    assert_eq!(entry.to, Some(Conn::Streaming.code()));
    assert_eq!(entry.transition(), None);
}

#[tokio::test]
async fn test_unhandled_event_leaves_machine_usable() {
    let (finished, _) = run_from(Conn::Idle, &[Wire::Reset, Wire::Chunk]).await;
    assert_eq!(finished.state, Conn::Streaming.code());
    assert_eq!(finished.context.unhandled.len(), 1);
    assert!(finished.failure.is_none());
}

#[tokio::test]
async fn test_inherited_drop_is_silent() {
    let (finished, handle) = run_from(Conn::Streaming, &[Wire::Noise]).await;
    assert_eq!(finished.state, Conn::Streaming.code());
    assert!(finished.context.unhandled.is_empty());
    assert_eq!(
        handle.history()[0].outcome,
        Outcome::Dropped {
            by: Conn::Session.code()
        }
    );
}

#[tokio::test]
async fn test_declared_invalid_is_reported_with_its_node() {
    let (finished, handle) = run_from(Conn::Streaming, &[Wire::Corrupt]).await;
    assert_eq!(finished.state, Conn::Streaming.code());
    assert_eq!(
        finished.context.unhandled,
        vec![(
            Conn::Streaming.code(),
            Wire::Corrupt.code(),
            UnhandledReason::DeclaredInvalid {
                by: Conn::Authed.code()
            }
        )]
    );
    assert_eq!(
        handle.history()[0].outcome,
        Outcome::Invalid {
            by: Conn::Authed.code()
        }
    );
}

#[tokio::test]
async fn test_terminal_state_drops_everything_else() {
    common::init_tracing();
    let nodes = vec![
        Node::<Recorder>::new(Conn::Session).goto(Wire::Reset, Conn::Idle),
        Node::new(Conn::Idle).goto(Wire::Chunk, Conn::Closed),
        Node::new(Conn::Closed)
            .parent(Conn::Session)
            .terminal()
            .goto(Wire::Only, Conn::Idle),
    ];
    let mut machine = StateMachine::new("stop", nodes, Conn::Idle, Recorder::default()).unwrap();
    let handle = machine.handle();
    for event in [Wire::Chunk, Wire::Reset, Wire::Noise, Wire::Only] {
        handle.post(Event::of(event)).unwrap();
    }
    machine.start();
    let finished = machine.stop(ShutdownMode::Graceful).await.unwrap();

    assert_eq!(finished.state, Conn::Idle.code());
    assert!(finished.context.unhandled.is_empty());
    let outcomes: Vec<_> = handle.history().iter().map(|e| e.outcome).collect();
    let closed = Conn::Closed.code();
    assert_eq!(outcomes[1], Outcome::Dropped { by: closed });
    assert_eq!(outcomes[2], Outcome::Dropped { by: closed });
    assert!(matches!(outcomes[3], Outcome::Transitioned { handled_by } if handled_by == closed));
}
