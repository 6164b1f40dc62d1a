use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use tokio_hfsm::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
enum Worker {
    Busy,
    Idle,
    Processing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
#[codes(after = SmEvent)]
enum Work {
    Job,
    Done,
}

#[derive(Debug, Default)]
struct Counter {
    count: u64,
}

impl Owner for Counter {}

fn nodes() -> Vec<Node<Counter>> {
    vec![
        Node::<Counter>::new(Worker::Busy).drop_events([SmEvent::Cancel]),
        Node::new(Worker::Idle)
            .parent(Worker::Busy)
            .goto(Work::Job, Worker::Processing),
        Node::<Counter>::new(Worker::Processing)
            .parent(Worker::Busy)
            .on(Work::Done, Worker::Idle, |scope| {
                scope.context_mut().count += 1;
                Ok(())
            }),
    ]
}

fn benchmark_dispatch_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("dispatch_1000_cycles", |b| {
        b.to_async(&rt).iter(|| async {
            let mut machine =
                StateMachine::new("bench", nodes(), Worker::Idle, Counter::default()).unwrap();
            let handle = machine.handle();
            machine.start();

            for _ in 0..1000 {
                handle.post(Event::of(Work::Job)).unwrap();
                handle.post(Event::of(Work::Done)).unwrap();
            }

            let finished = machine.stop(ShutdownMode::Graceful).await.unwrap();
            assert_eq!(finished.context.count, 1000);
        })
    });
}

fn benchmark_inherited_lookup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("inherited_drop");

    for events in [100u64, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(events), &events, |b, &events| {
            b.to_async(&rt).iter(|| async move {
                let mut machine =
                    StateMachine::new("bench", nodes(), Worker::Idle, Counter::default()).unwrap();
                let handle = machine.handle();
                machine.start();
                for _ in 0..events {
                    handle.post(Event::of(SmEvent::Cancel)).unwrap();
                }
                machine.stop(ShutdownMode::Graceful).await.unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_dispatch_throughput, benchmark_inherited_lookup);
criterion_main!(benches);
