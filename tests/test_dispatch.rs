use std::sync::{Arc, Mutex};
use std::thread;

use tokio_hfsm::prelude::*;
use tokio_hfsm::{Outcome, TransitionTable};

mod common;

#[derive(Debug, Default)]
struct Flags {
    launched: bool,
    finished: bool,
}

impl Owner for Flags {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
enum Stage {
    Start,
    Sending,
    Done,
}

#[tokio::test]
async fn test_launch_then_success_reaches_done() {
    common::init_tracing();

    let nodes = vec![
        Node::<Flags>::new(Stage::Start).on(SmEvent::Launch, Stage::Sending, |scope| {
            scope.context_mut().launched = true;
            Ok(())
        }),
        Node::<Flags>::new(Stage::Sending).on(SmEvent::Success, Stage::Done, |scope| {
            scope.context_mut().finished = true;
            Ok(())
        }),
        Node::new(Stage::Done),
    ];
    let mut machine = StateMachine::new("eg", nodes, Stage::Start, Flags::default()).unwrap();
    let handle = machine.handle();
    assert_eq!(handle.current_state(), 0);

    machine.start();
    handle.post(Event::of(SmEvent::Launch)).unwrap();
    handle.post(Event::of(SmEvent::Success)).unwrap();

    let finished = machine.stop(ShutdownMode::Graceful).await.unwrap();
    assert_eq!(finished.state, 2);
    assert!(finished.context.launched);
    assert!(finished.context.finished);
    assert!(finished.failure.is_none());

    let history = handle.history();
    let triples: Vec<_> = history.iter().filter_map(|e| e.transition()).collect();
    assert_eq!(history.len(), 2);
    assert_eq!(triples, vec![(0, 1, 1), (1, 2, 2)]);
    assert_eq!(history[0].mnemonic, "Launch");
    assert_eq!(handle.current_state(), Stage::Done.code());
}

#[derive(Debug, Default)]
struct Nesting {
    first_returned: bool,
    state_seen_by_second: Option<u32>,
    first_returned_before_second: Option<bool>,
    depth_inside_first: usize,
}

impl Owner for Nesting {}

#[tokio::test]
async fn test_posting_from_an_action_is_queued_not_nested() {
    common::init_tracing();

    let first = SmEvent::NEXT_CODE;
    let second = SmEvent::NEXT_CODE + 1;
    let nodes = vec![
        Node::<Nesting>::new(0u32).on(first, 1u32, move |scope| {
            scope.post_event(second, "second")?;
            scope.context_mut().depth_inside_first = scope.queue_depth();
            scope.context_mut().first_returned = true;
            Ok(())
        }),
        Node::<Nesting>::new(1u32).on(second, 2u32, |scope| {
            let state = scope.state();
            let ctx = scope.context_mut();
            ctx.state_seen_by_second = Some(state);
            ctx.first_returned_before_second = Some(ctx.first_returned);
            Ok(())
        }),
        Node::new(2u32),
    ];
    let mut machine = StateMachine::new("nest", nodes, 0u32, Nesting::default()).unwrap();
    let handle = machine.handle();
    machine.start();
    handle.post_event(first, "first").unwrap();

    handle.wait_for_state(2u32).await.unwrap();
    let finished = machine.stop(ShutdownMode::Graceful).await.unwrap();
    let ctx = finished.context;
    assert_eq!(ctx.depth_inside_first, 1);
    assert_eq!(ctx.state_seen_by_second, Some(1));
    assert_eq!(ctx.first_returned_before_second, Some(true));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_history_follows_enqueue_order_across_threads() {
    common::init_tracing();

    const THREADS: u32 = 4;
    const PER_THREAD: u32 = 50;
    let base = SmEvent::NEXT_CODE;

    // Two states; every event flips between them so each triple depends on
    // everything dispatched before it.
    let mut a = Node::<()>::new(0u32);
    let mut b = Node::<()>::new(1u32);
    for t in 0..THREADS {
        a = a.goto(base + t, 1u32);
        b = b.goto(base + t, 0u32);
    }
    let table = Arc::new(TransitionTable::build([a, b]).unwrap());
    let config = MachineConfig::default().with_history_capacity((THREADS * PER_THREAD) as usize);
    let mut machine = StateMachine::with_table("order", table, 0u32, (), config).unwrap();
    let handle = machine.handle();
    machine.start();

    // Posting under the ticket lock makes the ticket order the enqueue order.
    let tickets = Arc::new(Mutex::new(Vec::new()));
    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let handle = handle.clone();
            let tickets = Arc::clone(&tickets);
            thread::spawn(move || {
                for n in 0..PER_THREAD {
                    let mut tickets = tickets.lock().unwrap();
                    handle
                        .post(Event::new(base + t, "tick").with_message(format!("{t}/{n}")))
                        .unwrap();
                    tickets.push(base + t);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let finished = machine.stop(ShutdownMode::Graceful).await.unwrap();
    let tickets = tickets.lock().unwrap().clone();
    let history = handle.history();
    assert_eq!(history.len(), tickets.len());

    let mut expected = Vec::with_capacity(tickets.len());
    let mut state = 0;
    for event in &tickets {
        let next = 1 - state;
        expected.push((state, *event, next));
        state = next;
    }
    let actual: Vec<_> = history.iter().filter_map(|e| e.transition()).collect();
    assert_eq!(actual, expected);
    assert_eq!(finished.state, state);
    assert!(history.windows(2).all(|w| w[0].seq + 1 == w[1].seq));
}

#[tokio::test]
async fn test_owner_sees_transitions_and_state_changes() {
    common::init_tracing();

    let go = SmEvent::NEXT_CODE;
    let stay = SmEvent::NEXT_CODE + 1;
    let nodes = vec![
        Node::<common::Recorder>::new(0u32).goto(go, 1u32),
        Node::new(1u32).goto(stay, 1u32),
    ];
    let mut machine =
        StateMachine::new("owner", nodes, 0u32, common::Recorder::default()).unwrap();
    let handle = machine.handle();
    handle.post_sequence([Event::of(go), Event::of(stay)]).unwrap();
    machine.start();

    let finished = machine.stop(ShutdownMode::Graceful).await.unwrap();
    let owner = finished.context;
    assert_eq!(owner.transitions, vec![(0, go, 1), (1, stay, 1)]);
    // A self-transition commits but does not change the state.
    assert_eq!(owner.changes, vec![(0, 1)]);
    assert!(owner.unhandled.is_empty());

    let outcomes: Vec<_> = handle.history().iter().map(|e| e.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            Outcome::Transitioned { handled_by: 0 },
            Outcome::Transitioned { handled_by: 1 }
        ]
    );
}

#[tokio::test]
async fn test_action_takes_payload_and_message() {
    common::init_tracing();

    #[derive(Default)]
    struct Inbox {
        got: Option<String>,
        message: Option<String>,
        left_in_place: bool,
    }
    impl Owner for Inbox {}

    let deliver = SmEvent::NEXT_CODE;
    let nodes = vec![
        Node::<Inbox>::new(0u32).on(deliver, 1u32, |scope| {
            // A mismatched type leaves the payload where it is.
            let wrong = scope.take_arg::<u64>();
            let body = scope.take_arg::<String>();
            let message = scope.event().message().map(str::to_owned);
            let ctx = scope.context_mut();
            ctx.left_in_place = wrong.is_none() && body.is_some();
            ctx.got = body;
            ctx.message = message;
            Ok(())
        }),
        Node::new(1u32),
    ];
    let mut machine = StateMachine::new("inbox", nodes, 0u32, Inbox::default()).unwrap();
    let handle = machine.handle();
    machine.start();
    handle
        .post(
            Event::new(deliver, "deliver")
                .with_arg(String::from("hello"))
                .with_message("from test"),
        )
        .unwrap();

    let ctx = machine.stop(ShutdownMode::Graceful).await.unwrap().context;
    assert_eq!(ctx.got.as_deref(), Some("hello"));
    assert_eq!(ctx.message.as_deref(), Some("from test"));
    assert!(ctx.left_in_place);
    assert_eq!(handle.history()[0].message.as_deref(), Some("from test"));
}
