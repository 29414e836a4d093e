//! Dispatcher behaviour under repeated, uneven batches
//!
//! Units implemented outside the crate, batches of varying size across
//! several pool sizes, and two pools alive at once the way an engine runs
//! its compute and output pools.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dambreak::thread_pool::work_unit;
use dambreak::{DispatcherConfig, WorkDispatcher, WorkUnit};

struct SlotUnit {
    slots: Arc<Vec<AtomicUsize>>,
    index: usize,
}

impl WorkUnit for SlotUnit {
    fn execute(&self) {
        self.slots[self.index].fetch_add(1, Ordering::SeqCst);
    }

    fn label(&self) -> &'static str {
        "slot"
    }
}

fn slot_batch(slots: &Arc<Vec<AtomicUsize>>) -> Vec<Box<dyn WorkUnit>> {
    (0..slots.len())
        .map(|index| {
            Box::new(SlotUnit {
                slots: Arc::clone(slots),
                index,
            }) as Box<dyn WorkUnit>
        })
        .collect()
}

#[test]
fn test_varying_batches_run_each_unit_once() {
    for workers in [1, 2, 4, 7] {
        let mut pool = WorkDispatcher::start(DispatcherConfig::named("stress", workers))
            .expect("Failed to start dispatcher for test");
        for size in [0usize, 1, 2, 3, 31, 64, 1000] {
            let slots = Arc::new((0..size).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
            pool.run(slot_batch(&slots)).expect("Failed to run batch for test");
            assert!(
                slots.iter().all(|s| s.load(Ordering::SeqCst) == 1),
                "{} units on {} workers",
                size,
                workers
            );
        }
        assert_eq!(pool.worker_count(), workers);
    }
}

#[test]
fn test_await_blocks_until_slow_units_finish() {
    let mut pool = WorkDispatcher::start(DispatcherConfig::named("slow", 3))
        .expect("Failed to start dispatcher for test");
    let finished = Arc::new(AtomicUsize::new(0));
    let batch = (0..6)
        .map(|_| {
            let finished = Arc::clone(&finished);
            work_unit("sleep", move || {
                std::thread::sleep(Duration::from_millis(20));
                finished.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    pool.submit(batch).expect("Failed to submit for test");
    assert!(pool.is_busy());
    pool.await_completion().expect("Failed to await for test");
    assert_eq!(finished.load(Ordering::SeqCst), 6);
    assert!(!pool.is_busy());
}

#[test]
fn test_compute_and_output_pools_overlap() {
    let mut compute = WorkDispatcher::start(DispatcherConfig::named("compute", 4))
        .expect("Failed to start compute pool for test");
    let mut output = WorkDispatcher::start(DispatcherConfig::named("output", 1))
        .expect("Failed to start output pool for test");

    let rendered = Arc::new(AtomicUsize::new(0));
    let computed = Arc::new(Vec::from_iter((0..16).map(|_| AtomicUsize::new(0))));

    for _ in 0..50 {
        compute.run(slot_batch(&computed)).expect("Failed to run compute batch for test");
        output.await_completion().expect("Failed to await output for test");
        let rendered = Arc::clone(&rendered);
        output
            .submit(vec![work_unit("render", move || {
                rendered.fetch_add(1, Ordering::SeqCst);
            })])
            .expect("Failed to submit render for test");
    }
    output.await_completion().expect("Failed to await output for test");

    assert_eq!(rendered.load(Ordering::SeqCst), 50);
    assert!(computed.iter().all(|s| s.load(Ordering::SeqCst) == 50));
    assert_eq!(output.stats().units_executed, 50);
}

#[test]
fn test_submit_waits_for_outstanding_batch() {
    let mut pool = WorkDispatcher::start(DispatcherConfig::named("resubmit", 2))
        .expect("Failed to start dispatcher for test");
    let slots = Arc::new((0..32).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
    pool.submit(slot_batch(&slots)).expect("Failed to submit for test");
    pool.submit(slot_batch(&slots)).expect("Failed to resubmit for test");
    pool.await_completion().expect("Failed to await for test");
    assert!(slots.iter().all(|s| s.load(Ordering::SeqCst) == 2));
}
