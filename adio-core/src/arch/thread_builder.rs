//! Spawning database worker threads, pinned to cores when the mode asks for it.

use core_affinity::CoreId;
use std::io;
use std::thread::{self, JoinHandle};

use crate::arch::{CpuInfo, RuntimeMode};

/// Result of attempting to pin a thread to a specific core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinningResult {
    /// Pinned to the requested core
    Success,
    /// Pinned, but to a different core than requested
    SuccessDifferentCore(usize),
    /// Pinning is not supported on this platform or was not requested
    Unsupported,
    /// Pinning failed for some other reason
    Failed,
}

/// A spawned worker thread
#[derive(Debug)]
pub struct WorkerThread {
    handle: JoinHandle<()>,
    index: usize,
    core_id: Option<usize>,
}

impl WorkerThread {
    /// Position of this worker in the pool
    pub fn index(&self) -> usize {
        self.index
    }

    /// The core this worker was asked to run on, if any
    pub fn core_id(&self) -> Option<usize> {
        self.core_id
    }

    /// Take ownership of the thread's join handle
    pub fn into_handle(self) -> JoinHandle<()> {
        self.handle
    }
}

/// Builder for database worker threads
pub struct ThreadBuilder {
    mode: RuntimeMode,
    cpu_info: CpuInfo,
    /// Prefix for thread names, followed by the worker index
    name_prefix: String,
    /// Incremented for each thread created
    worker_idx: usize,
}

impl ThreadBuilder {
    /// Create a new thread builder
    pub fn new(mode: RuntimeMode, cpu_info: &CpuInfo, name_prefix: impl Into<String>) -> Self {
        Self {
            mode,
            cpu_info: cpu_info.clone(),
            name_prefix: name_prefix.into(),
            worker_idx: 0,
        }
    }

    /// Spawn the next worker running `f`
    pub fn build<F>(&mut self, f: F) -> io::Result<WorkerThread>
    where
        F: FnOnce() + Send + 'static,
    {
        let index = self.worker_idx;
        let core_id = self
            .mode
            .supports_pinning()
            .then(|| self.cpu_info.core_for_worker(index));

        let handle = thread::Builder::new()
            .name(format!("{}-{}", self.name_prefix, index))
            .spawn(move || {
                if let Some(core) = core_id {
                    match pin_thread_to_core(core) {
                        PinningResult::Success => tracing::trace!(core, "worker pinned"),
                        result => tracing::warn!(core, ?result, "could not pin worker to core"),
                    }
                }
                f();
            })?;

        self.worker_idx += 1;
        Ok(WorkerThread {
            handle,
            index,
            core_id,
        })
    }
}

/// Attempt to pin the current thread to a specific CPU core
fn pin_thread_to_core(core_id: usize) -> PinningResult {
    let Some(allowed) = core_affinity::get_core_ids() else {
        return PinningResult::Unsupported;
    };

    match select_core(&allowed, core_id) {
        Some((core, exact)) if core_affinity::set_for_current(core) => {
            if exact {
                PinningResult::Success
            } else {
                PinningResult::SuccessDifferentCore(core.id)
            }
        }
        _ => PinningResult::Failed,
    }
}

/// Picks the affinity target for logical CPU `core_id` among the cores this
/// process may run on. Falls back to one of them when `core_id` is not allowed.
fn select_core(allowed: &[CoreId], core_id: usize) -> Option<(CoreId, bool)> {
    if let Some(core) = allowed.iter().find(|core| core.id == core_id) {
        return Some((*core, true));
    }
    if allowed.is_empty() {
        None
    } else {
        Some((allowed[core_id % allowed.len()], false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_select_core_by_cpu_number() {
        // A restricted affinity mask: only CPUs 2 and 5 are usable
        let allowed = [CoreId { id: 2 }, CoreId { id: 5 }];
        assert_eq!(select_core(&allowed, 5), Some((CoreId { id: 5 }, true)));
        assert_eq!(select_core(&allowed, 2), Some((CoreId { id: 2 }, true)));
        assert_eq!(select_core(&allowed, 1), Some((CoreId { id: 5 }, false)));
        assert_eq!(select_core(&[], 0), None);
    }

    #[test]
    fn test_thread_builder_single() {
        let cpu_info = CpuInfo::detect();
        let mut builder = ThreadBuilder::new(RuntimeMode::SingleThread, &cpu_info, "test-worker");

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let worker = builder
            .build(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(worker.index(), 0);
        assert_eq!(worker.core_id(), None);
        worker.into_handle().join().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_thread_builder_pinned() {
        let cpu_info = CpuInfo::mock(4, 1);
        let mode = RuntimeMode::PinnedSharded {
            worker_count: 2,
            numa_aware: true,
        };
        let mut builder = ThreadBuilder::new(mode, &cpu_info, "test-pinned");

        for i in 0..2 {
            let worker = builder
                .build(move || {
                    let name = thread::current().name().map(str::to_owned);
                    assert_eq!(name, Some(format!("test-pinned-{i}")));
                })
                .unwrap();

            // Pinning may not take effect on CI, but a core is always chosen
            assert_eq!(worker.index(), i);
            assert!(worker.core_id().unwrap() < cpu_info.logical_cores());
            worker.into_handle().join().unwrap();
        }
    }
}
