//! Barrier-synchronized persistent worker pool
//!
//! Workers are spawned once and reused for every batch:
//! - `submit` installs a batch and advances a generation counter
//! - each worker wakes on the new generation and claims unit indices from a
//!   shared atomic counter until it runs past the end of the batch
//! - running past the end bumps a completion counter and puts the worker
//!   back to sleep until the next generation
//! - `await_completion` returns once every worker has reported in
//!
//! No thread is created per batch and there is no task queue beyond the
//! claim counter.

use super::WorkUnit;
use crate::error::{SimResult, SimulationError};
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Configuration for a dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Pool name, used for thread names and logs
    pub name: String,
    /// Number of persistent worker threads
    pub worker_count: usize,
    /// Enable thread naming
    pub enable_thread_names: bool,
    /// Stack size for worker threads (in bytes)
    pub stack_size: Option<usize>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: "compute".to_string(),
            worker_count: num_cpus::get().max(1),
            enable_thread_names: true,
            stack_size: Some(2 * 1024 * 1024), // 2MB stack per thread
        }
    }
}

impl DispatcherConfig {
    pub fn named(name: impl Into<String>, worker_count: usize) -> Self {
        Self {
            name: name.into(),
            worker_count,
            ..Default::default()
        }
    }
}

/// Lock-free statistics counters
#[derive(Debug, Default)]
struct PoolCounters {
    batches_submitted: AtomicU64,
    units_executed: AtomicU64,
    units_panicked: AtomicU64,
    total_execution_time_ns: AtomicU64,
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatcherStats {
    pub batches_submitted: u64,
    pub units_executed: u64,
    pub units_panicked: u64,
    pub average_unit_time_us: f64,
}

/// Generation-guarded state workers sleep on
struct Epoch {
    generation: u64,
    batch: Option<Arc<[Box<dyn WorkUnit>]>>,
    stop: bool,
}

struct DispatcherShared {
    name: String,
    epoch: Mutex<Epoch>,
    generation_changed: Condvar,
    claim: AtomicUsize,
    completions: Mutex<usize>,
    all_completed: Condvar,
    panicked_in_batch: AtomicUsize,
    counters: PoolCounters,
}

/// Persistent fan-out/fan-in worker pool
pub struct WorkDispatcher {
    shared: Arc<DispatcherShared>,
    workers: Vec<JoinHandle<()>>,
    worker_count: usize,
    outstanding: bool,
    shut_down: bool,
}

impl WorkDispatcher {
    /// Spawn `config.worker_count` persistent workers
    pub fn start(config: DispatcherConfig) -> SimResult<Self> {
        if config.worker_count == 0 {
            return Err(SimulationError::Config {
                message: format!("pool '{}' needs at least one worker", config.name),
            });
        }

        let shared = Arc::new(DispatcherShared {
            name: config.name.clone(),
            epoch: Mutex::new(Epoch {
                generation: 0,
                batch: None,
                stop: false,
            }),
            generation_changed: Condvar::new(),
            claim: AtomicUsize::new(0),
            completions: Mutex::new(0),
            all_completed: Condvar::new(),
            panicked_in_batch: AtomicUsize::new(0),
            counters: PoolCounters::default(),
        });

        let mut dispatcher = Self {
            shared: shared.clone(),
            workers: Vec::with_capacity(config.worker_count),
            worker_count: config.worker_count,
            outstanding: false,
            shut_down: false,
        };

        for idx in 0..config.worker_count {
            let mut builder = std::thread::Builder::new();
            if config.enable_thread_names {
                builder = builder.name(format!("{}-{}", config.name, idx));
            }
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let worker_shared = shared.clone();
            match builder.spawn(move || worker_loop(worker_shared)) {
                Ok(handle) => dispatcher.workers.push(handle),
                Err(e) => {
                    // Workers already spawned are joined by shutdown
                    dispatcher.worker_count = dispatcher.workers.len();
                    dispatcher.shutdown();
                    return Err(SimulationError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to spawn worker for pool '{}': {}", config.name, e),
                    )));
                }
            }
        }

        log::info!(
            "[WorkDispatcher] Pool '{}' started with {} worker(s)",
            config.name,
            config.worker_count
        );
        Ok(dispatcher)
    }

    /// Install a new batch and wake every worker. Returns without waiting
    /// for the batch; a batch still outstanding from an earlier submit is
    /// awaited first so no unit of it can be claimed twice.
    pub fn submit(&mut self, batch: Vec<Box<dyn WorkUnit>>) -> SimResult<()> {
        if self.shut_down {
            return Err(SimulationError::DispatcherShutdown);
        }
        if self.outstanding {
            log::debug!(
                "[WorkDispatcher] Pool '{}' still busy, waiting before submit",
                self.shared.name
            );
            self.await_completion()?;
        }

        let batch: Arc<[Box<dyn WorkUnit>]> = Arc::from(batch);
        log::trace!(
            "[WorkDispatcher] Pool '{}' dispatching {} unit(s)",
            self.shared.name,
            batch.len()
        );

        // No worker touches these while no batch is outstanding
        self.shared.claim.store(0, Ordering::SeqCst);
        *self.shared.completions.lock() = 0;
        self.shared.panicked_in_batch.store(0, Ordering::SeqCst);

        {
            let mut epoch = self.shared.epoch.lock();
            epoch.batch = Some(batch);
            epoch.generation += 1;
        }
        self.shared.generation_changed.notify_all();

        self.shared
            .counters
            .batches_submitted
            .fetch_add(1, Ordering::Relaxed);
        self.outstanding = true;
        Ok(())
    }

    /// Block until every worker has drained the current batch. No-op when
    /// nothing is outstanding.
    pub fn await_completion(&mut self) -> SimResult<()> {
        if !self.outstanding {
            return Ok(());
        }

        {
            let mut done = self.shared.completions.lock();
            while *done < self.worker_count {
                self.shared.all_completed.wait(&mut done);
            }
        }
        self.outstanding = false;

        // Release the units (and whatever state they reference)
        self.shared.epoch.lock().batch = None;

        let panicked = self.shared.panicked_in_batch.swap(0, Ordering::SeqCst);
        if panicked > 0 {
            return Err(SimulationError::WorkUnitPanicked {
                pool: self.shared.name.clone(),
                count: panicked,
            });
        }
        Ok(())
    }

    /// Submit a batch and wait for it
    pub fn run(&mut self, batch: Vec<Box<dyn WorkUnit>>) -> SimResult<()> {
        self.submit(batch)?;
        self.await_completion()
    }

    /// Stop and join every worker. The dispatcher cannot be reused.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.shared.epoch.lock().stop = true;
        self.shared.generation_changed.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!(
                    "[WorkDispatcher] Worker of pool '{}' terminated abnormally",
                    self.shared.name
                );
            }
        }
        self.outstanding = false;
        log::info!("[WorkDispatcher] Pool '{}' shut down", self.shared.name);
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Whether a batch was submitted and not yet awaited
    pub fn is_busy(&self) -> bool {
        self.outstanding
    }

    /// Get usage statistics
    pub fn stats(&self) -> DispatcherStats {
        let counters = &self.shared.counters;
        let executed = counters.units_executed.load(Ordering::Relaxed);
        let total_ns = counters.total_execution_time_ns.load(Ordering::Relaxed);
        DispatcherStats {
            batches_submitted: counters.batches_submitted.load(Ordering::Relaxed),
            units_executed: executed,
            units_panicked: counters.units_panicked.load(Ordering::Relaxed),
            average_unit_time_us: if executed > 0 {
                total_ns as f64 / executed as f64 / 1_000.0
            } else {
                0.0
            },
        }
    }
}

impl Drop for WorkDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<DispatcherShared>) {
    let mut observed_generation = 0u64;

    loop {
        let batch = {
            let mut epoch = shared.epoch.lock();
            while epoch.generation == observed_generation && !epoch.stop {
                shared.generation_changed.wait(&mut epoch);
            }
            if epoch.stop {
                break;
            }
            observed_generation = epoch.generation;
            epoch.batch.clone()
        };

        if let Some(batch) = batch {
            drain_batch(&shared, &batch);
        }

        let mut done = shared.completions.lock();
        *done += 1;
        shared.all_completed.notify_all();
    }
}

fn drain_batch(shared: &DispatcherShared, batch: &[Box<dyn WorkUnit>]) {
    loop {
        let index = shared.claim.fetch_add(1, Ordering::SeqCst);
        // Claiming past the end is the termination signal
        let Some(unit) = batch.get(index) else {
            return;
        };

        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| unit.execute()));
        let elapsed_ns = start.elapsed().as_nanos() as u64;

        shared
            .counters
            .total_execution_time_ns
            .fetch_add(elapsed_ns, Ordering::Relaxed);
        shared.counters.units_executed.fetch_add(1, Ordering::Relaxed);

        if outcome.is_err() {
            log::error!(
                "[WorkDispatcher] Unit '{}' #{} panicked in pool '{}'",
                unit.label(),
                index,
                shared.name
            );
            shared.counters.units_panicked.fetch_add(1, Ordering::Relaxed);
            shared.panicked_in_batch.fetch_add(1, Ordering::SeqCst);
        }
    }
}
