//! CPU topology used to size and place database workers.

use std::fmt;

/// A NUMA node and the logical cores that belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumaNode {
    /// NUMA node ID
    pub id: usize,
    /// Logical CPU cores in this node
    pub cores: Vec<usize>,
}

impl NumaNode {
    /// Create a node with the given ID and core list
    pub fn new(id: usize, cores: Vec<usize>) -> Self {
        Self { id, cores }
    }
}

/// Logical cores and NUMA layout of the host.
#[derive(Clone)]
pub struct CpuInfo {
    logical_cores: usize,
    numa_nodes: Vec<NumaNode>,
    numa_available: bool,
}

impl fmt::Debug for CpuInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuInfo")
            .field("logical_cores", &self.logical_cores)
            .field("numa_nodes", &self.numa_nodes.len())
            .field("numa_available", &self.numa_available)
            .finish()
    }
}

impl CpuInfo {
    /// Detect the topology of the current host
    pub fn detect() -> Self {
        let logical_cores = num_cpus::get().max(1);
        let numa_nodes = detect_numa_nodes();

        if numa_nodes.is_empty() {
            Self::flat(logical_cores)
        } else {
            Self {
                logical_cores,
                numa_nodes,
                numa_available: true,
            }
        }
    }

    /// A topology with `logical_cores` cores in one node and no NUMA awareness
    pub fn flat(logical_cores: usize) -> Self {
        let logical_cores = logical_cores.max(1);
        Self {
            logical_cores,
            numa_nodes: vec![NumaNode::new(0, (0..logical_cores).collect())],
            numa_available: false,
        }
    }

    /// Total number of logical cores
    pub fn logical_cores(&self) -> usize {
        self.logical_cores
    }

    /// All NUMA nodes, or one synthetic node when NUMA is unavailable
    pub fn numa_nodes(&self) -> &[NumaNode] {
        &self.numa_nodes
    }

    /// Whether the NUMA layout came from the host
    pub fn is_numa_available(&self) -> bool {
        self.numa_available
    }

    /// Core a worker should run on.
    ///
    /// Workers fill one NUMA node before moving on to the next, and wrap
    /// around within a node once its cores are used up.
    pub fn core_for_worker(&self, worker_idx: usize) -> usize {
        if !self.numa_available {
            return worker_idx % self.logical_cores;
        }

        let mut seen = 0;
        for node in self.numa_nodes.iter().filter(|n| !n.cores.is_empty()) {
            if worker_idx < seen + node.cores.len() {
                return node.cores[worker_idx - seen];
            }
            seen += node.cores.len();
        }

        match self.numa_nodes.iter().find(|n| !n.cores.is_empty()) {
            Some(first) if seen > 0 => first.cores[(worker_idx - seen) % first.cores.len()],
            _ => worker_idx % self.logical_cores,
        }
    }

    #[cfg(test)]
    pub(crate) fn mock(logical_cores: usize, numa_nodes_count: usize) -> Self {
        if numa_nodes_count == 0 {
            return Self::flat(logical_cores);
        }

        let per_node = logical_cores / numa_nodes_count;
        let mut extra = logical_cores % numa_nodes_count;
        let mut next_core = 0;
        let mut numa_nodes = Vec::with_capacity(numa_nodes_count);
        for id in 0..numa_nodes_count {
            let count = per_node + usize::from(extra > 0);
            extra = extra.saturating_sub(1);
            numa_nodes.push(NumaNode::new(id, (next_core..next_core + count).collect()));
            next_core += count;
        }

        Self {
            logical_cores,
            numa_nodes,
            numa_available: true,
        }
    }
}

#[cfg(target_os = "linux")]
fn detect_numa_nodes() -> Vec<NumaNode> {
    use std::fs;

    let Ok(entries) = fs::read_dir("/sys/devices/system/node") else {
        return Vec::new();
    };

    let mut nodes: Vec<NumaNode> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let id = name.to_str()?.strip_prefix("node")?.parse().ok()?;
            let cpulist = fs::read_to_string(entry.path().join("cpulist")).ok()?;
            Some(NumaNode::new(id, parse_cpu_list(&cpulist)))
        })
        .collect();
    nodes.sort_by_key(|n| n.id);
    nodes
}

#[cfg(not(target_os = "linux"))]
fn detect_numa_nodes() -> Vec<NumaNode> {
    Vec::new()
}

/// Parse a sysfs CPU list such as "0-2,4,6-8"
fn parse_cpu_list(cpulist: &str) -> Vec<usize> {
    let mut cores = Vec::new();
    for part in cpulist.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                if let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) {
                    cores.extend(start..=end);
                }
            }
            None => cores.extend(part.parse::<usize>().ok()),
        }
    }
    cores
}
