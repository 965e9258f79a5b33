use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::time::Duration;
use taskloop_core::{HandlerError, Scheduler, SchedulerConfig};

fn unthrottled(queue_size: usize) -> Scheduler {
    let config = SchedulerConfig::default()
        .with_processing_rate(0)
        .with_max_queue_size(queue_size);
    let scheduler = Scheduler::new(config).expect("valid config");
    scheduler.register_fn("echo", |payload, _ctx| async move {
        Ok::<_, HandlerError>(payload)
    });
    scheduler
}

fn benchmark_enqueue_and_drain(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("queue_throughput");
    group.measurement_time(Duration::from_secs(10));

    for tasks in [10_usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("echo_drain", tasks), &tasks, |b, &tasks| {
            b.to_async(&runtime).iter(|| async move {
                let scheduler = unthrottled(tasks);
                for n in 0..tasks {
                    scheduler.enqueue("echo", json!(n)).expect("enqueue");
                }
                scheduler.wait_idle().await;
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_enqueue_and_drain);
criterion_main!(benches);
