//! End-to-end tests for the scope ordering contract: cleanup runs in the
//! exact reverse of construction order, and no owned argument's
//! destructor fires before the last cleanup hook has completed.

use std::sync::{Arc, Mutex};

use taskscope::test_utils::{block_on, init_test_logging, yield_once};
use taskscope::{Cleanup, InnerTask, Outcome, ScopeBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
struct MagicError(u32);

type EventLog = Arc<Mutex<Vec<String>>>;

/// Records its construction, cleanup, and destruction into a shared log.
struct OrderTracker {
    id: usize,
    log: EventLog,
}

impl OrderTracker {
    fn new(id: usize, log: &EventLog) -> Self {
        log.lock().unwrap().push(format!("ctor:{id}"));
        Self {
            id,
            log: Arc::clone(log),
        }
    }
}

impl Cleanup<MagicError> for OrderTracker {
    async fn cleanup(&mut self, error: Option<&MagicError>) {
        // Cross a real suspension point: ordering must hold across awaits.
        yield_once().await;
        let tag = error.map_or_else(|| "ok".to_string(), |e| format!("err{}", e.0));
        self.log
            .lock()
            .unwrap()
            .push(format!("cleanup:{}:{tag}", self.id));
    }
}

impl Drop for OrderTracker {
    fn drop(&mut self) {
        self.log.lock().unwrap().push(format!("drop:{}", self.id));
    }
}

fn events_with_prefix(log: &EventLog, prefix: &str) -> Vec<usize> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|event| {
            event
                .strip_prefix(prefix)
                .map(|rest| rest.split(':').next().unwrap().parse().unwrap())
        })
        .collect()
}

#[test]
fn cleanup_and_destruction_reverse_construction_order() {
    init_test_logging();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));

    let mut scope: ScopeBuilder<MagicError> = ScopeBuilder::new();
    let c1 = scope.bind(OrderTracker::new(1, &log)).cleanup().finish();
    let c2 = scope.bind(OrderTracker::new(2, &log)).cleanup().finish();
    let c3 = scope.bind(OrderTracker::new(3, &log)).cleanup().finish();
    let c4 = scope.bind(OrderTracker::new(4, &log)).cleanup().finish();

    let task = scope
        .build(InnerTask::new(async move {
            assert_eq!(c1.with(|t| t.id), 1);
            assert_eq!(c2.with(|t| t.id), 2);
            assert_eq!(c3.with(|t| t.id), 3);
            assert_eq!(c4.with(|t| t.id), 4);
            Outcome::<_, MagicError>::Value(())
        }))
        .release()
        .expect("owned arguments pass the gate");
    assert!(task.used_arena());

    let outcome = block_on(task);
    assert_eq!(outcome, Outcome::Value(()));

    assert_eq!(events_with_prefix(&log, "ctor:"), vec![1, 2, 3, 4]);
    assert_eq!(events_with_prefix(&log, "cleanup:"), vec![4, 3, 2, 1]);
    assert_eq!(events_with_prefix(&log, "drop:"), vec![4, 3, 2, 1]);

    // No destructor fires before the last cleanup completes.
    let events = log.lock().unwrap();
    let last_cleanup = events
        .iter()
        .rposition(|e| e.starts_with("cleanup:"))
        .unwrap();
    let first_drop = events.iter().position(|e| e.starts_with("drop:")).unwrap();
    assert!(last_cleanup < first_drop, "events: {events:?}");
}

#[test]
fn cleanup_still_reverses_after_inner_failure() {
    init_test_logging();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));

    let mut scope: ScopeBuilder<MagicError> = ScopeBuilder::new();
    let a = scope.bind(OrderTracker::new(1, &log)).cleanup().finish();
    let b = scope.bind(OrderTracker::new(2, &log)).cleanup().finish();

    let task = scope
        .build(InnerTask::new(async move {
            // Handles ride along with the inner computation and are
            // released with it, before cleanup starts.
            drop((a, b));
            Outcome::<(), _>::Error(MagicError(111))
        }))
        .release()
        .expect("gate passes");

    let outcome = block_on(task);
    assert_eq!(outcome, Outcome::Error(MagicError(111)));
    assert_eq!(events_with_prefix(&log, "cleanup:"), vec![2, 1]);
    assert_eq!(events_with_prefix(&log, "drop:"), vec![2, 1]);
}

#[test]
fn cleanup_still_reverses_after_cancellation() {
    init_test_logging();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));

    let mut scope: ScopeBuilder<MagicError> = ScopeBuilder::new();
    let _a = scope.bind(OrderTracker::new(1, &log)).cleanup().finish();
    let _b = scope.bind(OrderTracker::new(2, &log)).cleanup().finish();

    let task = scope
        .build(InnerTask::new(async move {
            Outcome::<(), MagicError>::Cancelled(taskscope::CancelReason::timeout())
        }))
        .release()
        .expect("gate passes");

    let outcome = block_on(task);
    assert!(outcome.is_cancelled());
    assert_eq!(events_with_prefix(&log, "cleanup:"), vec![2, 1]);
}

#[test]
fn single_argument_scope_cleans_up_exactly_once() {
    init_test_logging();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));

    let mut scope: ScopeBuilder<MagicError> = ScopeBuilder::new();
    let c = scope.bind(OrderTracker::new(1, &log)).cleanup().finish();
    let outcome = block_on(
        scope
            .build(InnerTask::new(async move {
                assert_eq!(c.with(|t| t.id), 1);
                Outcome::<_, MagicError>::Value(5)
            }))
            .release()
            .expect("gate passes"),
    );
    assert_eq!(outcome, Outcome::Value(5));
    assert_eq!(events_with_prefix(&log, "cleanup:"), vec![1]);
    assert_eq!(events_with_prefix(&log, "drop:"), vec![1]);
}
