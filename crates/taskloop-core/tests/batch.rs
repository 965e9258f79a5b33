mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use helpers::{fast_config, register_echo, scheduler};
use serde_json::{json, Value};
use taskloop_core::{BatchOptions, HandlerError, SchedulerCtx, SchedulerError};

#[tokio::test(start_paused = true)]
async fn test_batch_collects_results_in_item_order() {
    let s = scheduler(fast_config());
    register_echo(&s);

    let items: Vec<Value> = (0..5).map(|n| json!({"n": n})).collect();
    let report = s
        .batch_process("echo", items.clone(), BatchOptions::default().with_batch_size(2))
        .await
        .expect("batch");

    assert!(report.is_success());
    assert_eq!(report.total(), 5);
    let indices: Vec<usize> = report.results.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    let results: Vec<Value> = report.results.into_iter().map(|r| r.result).collect();
    assert_eq!(results, items);
}

#[tokio::test(start_paused = true)]
async fn test_batch_unknown_workflow_enqueues_nothing() {
    let s = scheduler(fast_config());
    let err = s
        .batch_process("missing", vec![json!(1)], BatchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, SchedulerError::UnknownWorkflow("missing".to_string()));
    assert_eq!(s.stats().history_len, 0);
}

#[tokio::test(start_paused = true)]
async fn test_batch_reports_failed_items() {
    let s = scheduler(fast_config().with_max_retry_attempts(1));
    s.register_fn("non-negative", |payload, _ctx| async move {
        match payload.as_i64() {
            Some(n) if n < 0 => Err(HandlerError::failed(format!("{n} is negative"))),
            _ => Ok(payload),
        }
    });

    let report = s
        .batch_process(
            "non-negative",
            vec![json!(1), json!(-2), json!(3), json!(-4)],
            BatchOptions::default().with_batch_size(3),
        )
        .await
        .expect("batch");

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.failures.len(), 2);
    let failed: Vec<(usize, String)> = report
        .failures
        .iter()
        .map(|f| (f.index, f.error.clone()))
        .collect();
    assert_eq!(
        failed,
        vec![
            (1, "-2 is negative".to_string()),
            (3, "-4 is negative".to_string())
        ]
    );
    assert!(report.failures.iter().all(|f| f.task_id.is_some()));
}

#[tokio::test(start_paused = true)]
async fn test_next_chunk_waits_for_current_one() {
    let s = scheduler(fast_config());
    let max_queued = Arc::new(AtomicUsize::new(0));
    let observed = max_queued.clone();
    s.register_fn("observe", move |payload, ctx: SchedulerCtx| {
        let observed = observed.clone();
        async move {
            let queued = ctx.scheduler().stats().queue_len;
            observed.fetch_max(queued, Ordering::SeqCst);
            Ok::<_, HandlerError>(payload)
        }
    });

    let items: Vec<Value> = (0..9).map(|n| json!(n)).collect();
    let report = s
        .batch_process(
            "observe",
            items,
            BatchOptions::default().with_batch_size(3).with_parallelism(4),
        )
        .await
        .expect("batch");

    assert_eq!(report.results.len(), 9);
    // while the first task of a chunk runs, only the rest of that chunk waits
    assert_eq!(max_queued.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_batch_items_rejected_by_full_queue() {
    let s = scheduler(fast_config().with_max_queue_size(1));
    register_echo(&s);

    let report = s
        .batch_process(
            "echo",
            vec![json!("a"), json!("b"), json!("c")],
            BatchOptions::default().with_batch_size(3),
        )
        .await
        .expect("batch");

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].result, json!("a"));
    assert_eq!(report.failures.len(), 2);
    for failure in &report.failures {
        assert!(failure.task_id.is_none());
        assert_eq!(
            failure.error,
            SchedulerError::QueueFull { capacity: 1 }.to_string()
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_items_count_as_failures() {
    let s = scheduler(fast_config());
    s.register_fn("clear-rest", |payload, ctx: SchedulerCtx| async move {
        if payload == json!(0) {
            ctx.scheduler().clear_queue();
        }
        Ok::<_, HandlerError>(payload)
    });

    let report = s
        .batch_process(
            "clear-rest",
            vec![json!(0), json!(1), json!(2), json!(3)],
            BatchOptions::default().with_batch_size(2),
        )
        .await
        .expect("batch");

    // item 1 is cleared from the first chunk; the second chunk runs normally
    let done: Vec<usize> = report.results.iter().map(|r| r.index).collect();
    assert_eq!(done, vec![0, 2, 3]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 1);
    assert_eq!(report.failures[0].error, "task was cancelled");
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch() {
    let s = scheduler(fast_config());
    register_echo(&s);
    let report = s
        .batch_process("echo", Vec::new(), BatchOptions::default().with_batch_size(0))
        .await
        .expect("batch");
    assert_eq!(report.total(), 0);
}
