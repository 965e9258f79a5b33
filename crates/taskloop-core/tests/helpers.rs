#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use serde_json::Value;
use taskloop_core::{HandlerError, Scheduler, SchedulerConfig};
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Config without pacing so tests only wait on what they exercise.
pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_processing_rate(0)
        .with_retry_delay(std::time::Duration::from_millis(10))
}

pub fn scheduler(config: SchedulerConfig) -> Scheduler {
    init_tracing();
    Scheduler::new(config).expect("valid config")
}

pub fn register_echo(scheduler: &Scheduler) {
    scheduler.register_fn("echo", |payload, _ctx| async move {
        Ok::<_, HandlerError>(payload)
    });
}

pub fn register_fail_always(scheduler: &Scheduler) {
    scheduler.register_fn("fail-always", |_payload, _ctx| async move {
        Err::<Value, _>(HandlerError::failed("always fails"))
    });
}

/// Shared log of payloads in the order handlers saw them.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Value>>>);

impl Recorder {
    pub fn push(&self, value: Value) {
        self.0.lock().unwrap().push(value);
    }

    pub fn seen(&self) -> Vec<Value> {
        self.0.lock().unwrap().clone()
    }
}
