//! The worker pool that runs blocking database work for async callers.
//!
//! Drivers talk to their databases through blocking calls. The service
//! queues those calls as tasks, runs them on dedicated worker threads, and
//! hands each result back through a oneshot channel so the caller's runtime
//! is never blocked.

use crate::arch::{CpuInfo, RuntimeMode, ThreadBuilder, WorkerThread};
use crate::error::{Error, Result};
use crossbeam_utils::CachePadded;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tokio::sync::{mpsc, oneshot};

/// Configuration for the database service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Number of worker threads. `None` runs one per logical core.
    pub worker_threads: Option<usize>,

    /// Whether to pin worker threads to CPU cores.
    pub pin_threads: bool,

    /// Prefix of worker thread names.
    pub thread_name: String,

    /// Number of tasks that may wait in the queue before submitters wait.
    pub queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            pin_threads: false,
            thread_name: "adio-worker".to_string(),
            queue_capacity: 1024,
        }
    }
}

/// Snapshot of the service's task counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    /// Tasks accepted into the queue.
    pub submitted: u64,
    /// Tasks that finished running, including ones that panicked.
    pub completed: u64,
    /// Tasks that panicked.
    pub panicked: u64,
}

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Counters {
    submitted: CachePadded<AtomicU64>,
    completed: CachePadded<AtomicU64>,
    panicked: CachePadded<AtomicU64>,
}

struct Pool {
    /// `None` once the service has shut down.
    tx: Option<mpsc::Sender<Task>>,
    /// Held until the first task starts the workers.
    rx: Option<mpsc::Receiver<Task>>,
    workers: Vec<WorkerThread>,
}

struct Shared {
    config: ServiceConfig,
    mode: RuntimeMode,
    cpu_info: CpuInfo,
    pool: Mutex<Pool>,
    counters: Arc<Counters>,
}

/// A handle to a pool of database worker threads.
///
/// Handles are cheap to clone and share one pool. Workers start on the first
/// submitted task. When the last handle is dropped the queue closes, the
/// workers finish what was already queued, and the dropping thread joins them.
#[derive(Clone)]
pub struct DatabaseService {
    shared: Arc<Shared>,
}

impl DatabaseService {
    /// Creates a service. No threads are started until work arrives.
    pub fn new(config: ServiceConfig) -> Self {
        let cpu_info = CpuInfo::detect();
        let mode = match config.worker_threads {
            Some(n) => RuntimeMode::with_workers(n, &cpu_info, config.pin_threads),
            None => RuntimeMode::select_for_system(&cpu_info, config.pin_threads),
        };
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

        Self {
            shared: Arc::new(Shared {
                config,
                mode,
                cpu_info,
                pool: Mutex::new(Pool {
                    tx: Some(tx),
                    rx: Some(rx),
                    workers: Vec::new(),
                }),
                counters: Arc::default(),
            }),
        }
    }

    /// The configuration this service was built with.
    pub fn config(&self) -> &ServiceConfig {
        &self.shared.config
    }

    /// The worker layout in use.
    pub fn mode(&self) -> &RuntimeMode {
        &self.shared.mode
    }

    /// Number of workers the pool runs once started.
    pub fn worker_count(&self) -> usize {
        self.shared.mode.worker_count()
    }

    /// Whether the worker threads have been started.
    pub fn is_started(&self) -> bool {
        !self.shared.lock_pool().workers.is_empty()
    }

    /// Current task counters.
    pub fn stats(&self) -> ServiceStats {
        let counters = &self.shared.counters;
        ServiceStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
        }
    }

    /// Runs `task` on a worker thread and resolves with its result.
    ///
    /// Fails with [`Error::ServiceShutdown`] when the service no longer
    /// accepts work, and with [`Error::WorkerPanicked`] when `task` panics.
    pub async fn spawn<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.shared.sender()?;
        let (result_tx, result_rx) = oneshot::channel();
        let job: Task = Box::new(move || {
            // The caller may have stopped waiting
            let _ = result_tx.send(task());
        });

        // Counted only once a queue slot is held, so a dropped caller leaves no trace
        let permit = sender.reserve().await.map_err(|_| Error::ServiceShutdown)?;
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        permit.send(job);

        result_rx.await.map_err(|_| Error::WorkerPanicked)
    }

    /// Stops accepting work. Queued tasks still run.
    pub fn shutdown(&self) {
        if self.shared.lock_pool().tx.take().is_some() {
            tracing::debug!("database service shutting down");
        }
    }
}

impl Default for DatabaseService {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}

impl fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseService")
            .field("mode", &self.shared.mode)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Shared {
    fn lock_pool(&self) -> std::sync::MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue sender, starting the workers on first use.
    fn sender(&self) -> Result<mpsc::Sender<Task>> {
        let mut pool = self.lock_pool();
        let sender = pool.tx.clone().ok_or(Error::ServiceShutdown)?;
        if let Some(rx) = pool.rx.take() {
            self.start_workers(&mut pool, rx)?;
        }
        Ok(sender)
    }

    fn start_workers(&self, pool: &mut Pool, rx: mpsc::Receiver<Task>) -> Result<()> {
        let count = self.mode.worker_count();
        tracing::debug!(
            workers = count,
            mode = %self.mode.description(),
            "starting database workers"
        );

        let queue = Arc::new(Mutex::new(rx));
        let mut builder =
            ThreadBuilder::new(self.mode.clone(), &self.cpu_info, &self.config.thread_name);
        for _ in 0..count {
            let worker_queue = Arc::clone(&queue);
            let counters = Arc::clone(&self.counters);
            match builder.build(move || worker_loop(&worker_queue, &counters)) {
                Ok(worker) => pool.workers.push(worker),
                Err(e) if pool.workers.is_empty() => {
                    // Nothing is running yet, so the next submission retries
                    if let Ok(queue) = Arc::try_unwrap(queue) {
                        pool.rx = Some(queue.into_inner().unwrap_or_else(PoisonError::into_inner));
                    }
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        started = pool.workers.len(),
                        requested = count,
                        "could not start every database worker"
                    );
                    break;
                }
            }
        }
        Ok(())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let pool = self.pool.get_mut().unwrap_or_else(PoisonError::into_inner);
        pool.tx.take();

        let current = thread::current().id();
        for worker in pool.workers.drain(..) {
            let index = worker.index();
            let handle = worker.into_handle();
            // A task that held the last handle can't join its own thread
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!(worker = index, "database worker exited abnormally");
            }
        }
    }
}

fn worker_loop(queue: &Mutex<mpsc::Receiver<Task>>, counters: &Counters) {
    loop {
        let task = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .blocking_recv();
        let Some(task) = task else {
            break;
        };

        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            counters.panicked.fetch_add(1, Ordering::Relaxed);
            tracing::error!("database task panicked");
        }
        counters.completed.fetch_add(1, Ordering::Relaxed);
    }
    tracing::debug!("database worker exiting");
}
