//! Worker pool layouts.
//!
//! Decides how many database workers the service runs and whether they are
//! pinned to cores.

use crate::arch::cpu_info::CpuInfo;
use std::fmt;

/// How the database service lays out its worker threads
#[derive(Clone, PartialEq, Eq)]
pub enum RuntimeMode {
    /// One unpinned worker. Every operation runs in submission order.
    SingleThread,

    /// Unpinned workers scheduled freely by the OS
    Pooled {
        /// Number of worker threads to create
        worker_count: usize,
    },

    /// Workers pinned to specific cores, optionally filling NUMA nodes in order
    PinnedSharded {
        /// Number of worker threads to create
        worker_count: usize,
        /// Whether to keep workers grouped by NUMA node
        numa_aware: bool,
    },
}

impl fmt::Debug for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleThread => write!(f, "SingleThread"),
            Self::Pooled { worker_count } => write!(f, "Pooled(workers={worker_count})"),
            Self::PinnedSharded {
                worker_count,
                numa_aware,
            } => write!(f, "PinnedSharded(workers={worker_count}, numa={numa_aware})"),
        }
    }
}

impl RuntimeMode {
    /// Picks a layout for this host.
    ///
    /// One worker per logical core. Pinning is opt-in since database work
    /// spends most of its time blocked on file I/O.
    pub fn select_for_system(cpu_info: &CpuInfo, pin_threads: bool) -> Self {
        Self::with_workers(cpu_info.logical_cores(), cpu_info, pin_threads)
    }

    /// Layout with an explicit worker count
    pub fn with_workers(worker_count: usize, cpu_info: &CpuInfo, pin_threads: bool) -> Self {
        match worker_count {
            0 | 1 if !pin_threads => Self::SingleThread,
            _ if pin_threads => Self::PinnedSharded {
                worker_count: worker_count.max(1),
                numa_aware: cpu_info.is_numa_available(),
            },
            _ => Self::Pooled { worker_count },
        }
    }

    /// Returns the number of worker threads for this mode
    pub fn worker_count(&self) -> usize {
        match self {
            Self::SingleThread => 1,
            Self::Pooled { worker_count } | Self::PinnedSharded { worker_count, .. } => {
                *worker_count
            }
        }
    }

    /// Checks if this mode groups workers by NUMA node
    pub fn is_numa_aware(&self) -> bool {
        matches!(self, Self::PinnedSharded { numa_aware: true, .. })
    }

    /// Checks if workers are pinned to cores
    pub fn supports_pinning(&self) -> bool {
        matches!(self, Self::PinnedSharded { .. })
    }

    /// Returns a human-readable description of this mode
    pub fn description(&self) -> String {
        match self {
            Self::SingleThread => "single worker".to_string(),
            Self::Pooled { worker_count } => format!("pool of {worker_count} workers"),
            Self::PinnedSharded {
                worker_count,
                numa_aware,
            } => format!(
                "{} workers pinned to cores (NUMA-aware: {})",
                worker_count,
                if *numa_aware { "yes" } else { "no" }
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_runtime_mode() {
        let cpu_info = CpuInfo::mock(1, 0);
        assert_eq!(
            RuntimeMode::select_for_system(&cpu_info, false),
            RuntimeMode::SingleThread
        );

        let cpu_info = CpuInfo::mock(8, 0);
        assert_eq!(
            RuntimeMode::select_for_system(&cpu_info, false),
            RuntimeMode::Pooled { worker_count: 8 }
        );

        let cpu_info = CpuInfo::mock(8, 2);
        match RuntimeMode::select_for_system(&cpu_info, true) {
            RuntimeMode::PinnedSharded {
                worker_count,
                numa_aware,
            } => {
                assert_eq!(worker_count, 8);
                assert!(numa_aware);
            }
            other => panic!("Expected PinnedSharded mode, got {other:?}"),
        }
    }

    #[test]
    fn test_with_workers() {
        let cpu_info = CpuInfo::mock(4, 0);
        assert_eq!(
            RuntimeMode::with_workers(0, &cpu_info, false),
            RuntimeMode::SingleThread
        );
        assert_eq!(
            RuntimeMode::with_workers(3, &cpu_info, false),
            RuntimeMode::Pooled { worker_count: 3 }
        );
        assert_eq!(
            RuntimeMode::with_workers(0, &cpu_info, true),
            RuntimeMode::PinnedSharded {
                worker_count: 1,
                numa_aware: false
            }
        );
    }

    #[test]
    fn test_runtime_mode_properties() {
        let single = RuntimeMode::SingleThread;
        assert_eq!(single.worker_count(), 1);
        assert!(!single.is_numa_aware());
        assert!(!single.supports_pinning());

        let pooled = RuntimeMode::Pooled { worker_count: 6 };
        assert_eq!(pooled.worker_count(), 6);
        assert!(!pooled.supports_pinning());

        let pinned = RuntimeMode::PinnedSharded {
            worker_count: 4,
            numa_aware: true,
        };
        assert_eq!(pinned.worker_count(), 4);
        assert!(pinned.is_numa_aware());
        assert!(pinned.supports_pinning());
    }

    #[test]
    fn test_runtime_mode_description() {
        assert!(RuntimeMode::SingleThread.description().contains("single"));

        let desc = RuntimeMode::PinnedSharded {
            worker_count: 4,
            numa_aware: true,
        }
        .description();
        assert!(desc.contains("4 workers pinned"));
        assert!(desc.contains("NUMA-aware: yes"));
    }
}
