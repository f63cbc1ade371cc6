use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{PowerflowError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentClass {
    Cpu,
    Gpu,
}

/// Logical CPUs grouped as `[socket][core][thread]`
pub type CpuLayout = Vec<Vec<Vec<u32>>>;

/// Node-wide socket, physical core and logical thread counts
///
/// When built from an enumerated layout, CPU lookups follow that layout.
/// Otherwise logical CPUs are assumed to be numbered socket-major with
/// hyperthread siblings after all physical cores:
/// `cpu = thread * ncores + socket * cores_per_socket + core`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub nsockets: u32,
    pub ncores: u32,
    pub nthreads: u32,
    layout: Option<Arc<CpuLayout>>,
}

impl Topology {
    pub fn new(nsockets: u32, ncores: u32, nthreads: u32) -> Self {
        Self {
            nsockets,
            ncores,
            nthreads,
            layout: None,
        }
    }

    /// Topology whose CPU lookups come from an enumerated layout
    pub fn from_layout(layout: CpuLayout) -> Self {
        let ncores: usize = layout.iter().map(Vec::len).sum();
        let nthreads: usize = layout.iter().flatten().map(Vec::len).sum();
        Self {
            nsockets: layout.len() as u32,
            ncores: ncores as u32,
            nthreads: nthreads as u32,
            layout: Some(Arc::new(layout)),
        }
    }

    /// Reject empty or non-uniform layouts before any socket iteration
    pub fn validate(&self) -> Result<()> {
        if self.nsockets == 0 {
            return Err(PowerflowError::InvalidTopology(
                "no sockets reported".into(),
            ));
        }
        if self.ncores == 0 || self.ncores % self.nsockets != 0 {
            return Err(PowerflowError::InvalidTopology(format!(
                "{} cores cannot be split evenly across {} sockets",
                self.ncores, self.nsockets
            )));
        }
        if self.nthreads == 0 || self.nthreads % self.ncores != 0 {
            return Err(PowerflowError::InvalidTopology(format!(
                "{} threads cannot be split evenly across {} cores",
                self.nthreads, self.ncores
            )));
        }
        if let Some(layout) = &self.layout {
            let cores = self.cores_per_socket() as usize;
            let threads = self.threads_per_core() as usize;
            for (socket, socket_cores) in layout.iter().enumerate() {
                if socket_cores.len() != cores
                    || socket_cores.iter().any(|core| core.len() != threads)
                {
                    return Err(PowerflowError::InvalidTopology(format!(
                        "socket {socket} does not have {cores} cores of {threads} threads"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn cores_per_socket(&self) -> u32 {
        self.ncores / self.nsockets
    }

    pub fn threads_per_core(&self) -> u32 {
        self.nthreads / self.ncores
    }

    pub fn cpu_id(&self, socket: u32, core: u32, thread: u32) -> u32 {
        self.layout
            .as_ref()
            .and_then(|layout| {
                layout
                    .get(socket as usize)?
                    .get(core as usize)?
                    .get(thread as usize)
                    .copied()
            })
            .unwrap_or_else(|| thread * self.ncores + socket * self.cores_per_socket() + core)
    }

    /// CPU used for package-scoped registers
    pub fn first_cpu(&self, socket: u32) -> u32 {
        self.cpu_id(socket, 0, 0)
    }

    /// Physical cores of `socket` (first hyperthread of each)
    pub fn socket_cores(&self, socket: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.cores_per_socket()).map(move |core| (core, self.cpu_id(socket, core, 0)))
    }

    /// Every logical CPU of `socket`
    pub fn socket_threads(&self, socket: u32) -> Vec<u32> {
        let mut cpus = Vec::new();
        for thread in 0..self.threads_per_core() {
            for core in 0..self.cores_per_socket() {
                cpus.push(self.cpu_id(socket, core, thread));
            }
        }
        cpus
    }
}

/// Supplies socket/core/thread counts for a component class
pub trait TopologyProvider: Send + Sync {
    fn topology(&self, class: ComponentClass) -> Result<Topology>;
}

/// Topology from `/sys/devices/system/cpu`
pub struct SysfsTopology {
    root: PathBuf,
}

impl Default for SysfsTopology {
    fn default() -> Self {
        Self::new("/sys/devices/system/cpu")
    }
}

impl SysfsTopology {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_id(&self, cpu: u32, name: &str) -> Option<u32> {
        let path = self.root.join(format!("cpu{cpu}/topology/{name}"));
        std::fs::read_to_string(&path).ok()?.trim().parse().ok()
    }

    /// Parse CPU list like "0-3,8-11" into Vec<u32>
    fn parse_cpu_list(s: &str) -> Option<Vec<u32>> {
        let mut cpus = Vec::new();
        for part in s.trim().split(',') {
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start.parse().ok()?;
                let end: u32 = end.parse().ok()?;
                cpus.extend(start..=end);
            } else {
                cpus.push(part.parse().ok()?);
            }
        }
        Some(cpus)
    }

    fn detect_cpu(&self) -> Result<Topology> {
        let online_path = self.root.join("online");
        let online = std::fs::read_to_string(&online_path)?;
        let cpus = Self::parse_cpu_list(&online).ok_or_else(|| {
            PowerflowError::InvalidTopology(format!(
                "cannot parse {}: {:?}",
                online_path.display(),
                online.trim()
            ))
        })?;

        // package id -> core id -> logical CPUs, all ascending
        let mut packages: BTreeMap<u32, BTreeMap<u32, Vec<u32>>> = BTreeMap::new();
        for &cpu in &cpus {
            match (
                self.read_id(cpu, "physical_package_id"),
                self.read_id(cpu, "core_id"),
            ) {
                (Some(package), Some(core)) => packages
                    .entry(package)
                    .or_default()
                    .entry(core)
                    .or_default()
                    .push(cpu),
                _ => tracing::warn!("No topology information for CPU {cpu}"),
            }
        }

        let layout: CpuLayout = packages
            .into_values()
            .map(|cores| cores.into_values().collect())
            .collect();
        let topology = Topology::from_layout(layout);
        tracing::info!(
            "Detected {} sockets, {} cores, {} threads",
            topology.nsockets,
            topology.ncores,
            topology.nthreads
        );

        Ok(topology)
    }
}

impl TopologyProvider for SysfsTopology {
    fn topology(&self, class: ComponentClass) -> Result<Topology> {
        match class {
            ComponentClass::Cpu => self.detect_cpu(),
            ComponentClass::Gpu => Err(PowerflowError::InvalidTopology(
                "GPU enumeration is not provided by the sysfs CPU topology".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_numbering() {
        // 2 sockets x 8 cores x 2 threads
        let topology = Topology::new(2, 16, 32);
        assert!(topology.validate().is_ok());
        assert_eq!(topology.first_cpu(0), 0);
        assert_eq!(topology.first_cpu(1), 8);
        assert_eq!(topology.cpu_id(1, 3, 1), 16 + 8 + 3);
        assert_eq!(topology.socket_threads(1).len(), 16);
        assert_eq!(topology.socket_cores(1).last(), Some((7, 15)));
    }

    #[test]
    fn test_layout_overrides_numbering() {
        let topology = Topology::from_layout(vec![
            vec![vec![0, 4], vec![2, 6]],
            vec![vec![1, 5], vec![3, 7]],
        ]);
        assert!(topology.validate().is_ok());
        assert_eq!(topology.first_cpu(1), 1);
        assert_eq!(topology.socket_cores(1).collect::<Vec<_>>(), vec![(0, 1), (1, 3)]);
        assert_eq!(topology.socket_threads(0), vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_ragged_layout_is_invalid() {
        let topology = Topology::from_layout(vec![vec![vec![0, 2], vec![1]], vec![vec![3, 4]]]);
        assert!(matches!(
            topology.validate(),
            Err(PowerflowError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_invalid_topologies() {
        assert!(matches!(
            Topology::new(0, 0, 0).validate(),
            Err(PowerflowError::InvalidTopology(_))
        ));
        assert!(Topology::new(2, 7, 14).validate().is_err());
        assert!(Topology::new(2, 8, 12).validate().is_err());
    }

    #[test]
    fn test_parse_cpu_list() {
        assert_eq!(
            SysfsTopology::parse_cpu_list("0-3,8-9\n"),
            Some(vec![0, 1, 2, 3, 8, 9])
        );
        assert_eq!(SysfsTopology::parse_cpu_list("x"), None);
    }

    #[test]
    fn test_sysfs_tree() {
        let root = std::env::temp_dir().join(format!("powerflow-topology-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("online"), "0-3\n").unwrap();
        for (cpu, package, core) in [(0, 0, 0), (1, 1, 0), (2, 0, 0), (3, 1, 0)] {
            let dir = root.join(format!("cpu{cpu}/topology"));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("physical_package_id"), format!("{package}\n")).unwrap();
            std::fs::write(dir.join("core_id"), format!("{core}\n")).unwrap();
        }

        let topology = SysfsTopology::new(&root)
            .topology(ComponentClass::Cpu)
            .unwrap();
        assert!(topology.validate().is_ok());
        assert_eq!(
            (topology.nsockets, topology.ncores, topology.nthreads),
            (2, 2, 4)
        );
        // Packages interleave: odd CPUs belong to socket 1
        assert_eq!(topology.first_cpu(0), 0);
        assert_eq!(topology.first_cpu(1), 1);
        assert_eq!(topology.socket_threads(0), vec![0, 2]);
        assert_eq!(topology.socket_threads(1), vec![1, 3]);
        assert!(SysfsTopology::new(&root)
            .topology(ComponentClass::Gpu)
            .is_err());

        std::fs::remove_dir_all(&root).unwrap();
    }
}
