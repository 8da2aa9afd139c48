use adio_core::arch::{CpuInfo, RuntimeMode};
use adio_core::{DatabaseService, ServiceConfig};

fn main() {
    let cpu_info = CpuInfo::detect();
    println!("Detected {} logical cores", cpu_info.logical_cores());
    println!("Detected {} NUMA nodes", cpu_info.numa_nodes().len());
    println!("NUMA available: {}", cpu_info.is_numa_available());

    for node in cpu_info.numa_nodes() {
        println!(
            "NUMA Node {}: {} cores ({:?})",
            node.id,
            node.cores.len(),
            node.cores
        );
    }

    for pin_threads in [false, true] {
        let mode = RuntimeMode::select_for_system(&cpu_info, pin_threads);
        println!("\nWorker layout with pinning {}:", if pin_threads { "on" } else { "off" });
        println!("  Mode: {:?}", mode);
        println!("  Description: {}", mode.description());
        println!("  Worker count: {}", mode.worker_count());
        if mode.supports_pinning() {
            for worker in 0..mode.worker_count() {
                println!("  Worker {} -> core {}", worker, cpu_info.core_for_worker(worker));
            }
        }
    }

    let service = DatabaseService::new(ServiceConfig::default());
    println!("\nDefault service: {:?}", service);
}
