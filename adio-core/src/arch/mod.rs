//! Host topology and worker thread placement
//!
//! This module is responsible for:
//! - Detecting the CPU topology (cores, NUMA nodes)
//! - Choosing how many database workers to run
//! - Building and pinning worker threads

pub mod cpu_info;
pub mod runtime_mode;
pub mod thread_builder;

pub use cpu_info::{CpuInfo, NumaNode};
pub use runtime_mode::RuntimeMode;
pub use thread_builder::{PinningResult, ThreadBuilder, WorkerThread};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_mode_matches_cores() {
        let cpu_info = CpuInfo::detect();
        let mode = RuntimeMode::select_for_system(&cpu_info, false);

        if cpu_info.logical_cores() > 1 {
            assert_eq!(mode.worker_count(), cpu_info.logical_cores());
        } else {
            assert!(matches!(mode, RuntimeMode::SingleThread));
        }
    }
}
