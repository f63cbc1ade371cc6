//! In-memory collaborators for backend and engine tests

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::common::RegisterAccess;
use crate::error::{PowerflowError, Result};
use crate::topology::{ComponentClass, Topology, TopologyProvider};

/// Register file keyed by (cpu, address); unset registers read as zero
#[derive(Default)]
pub struct FakeMsr {
    values: Mutex<HashMap<(u32, u64), u64>>,
    denied: Mutex<HashSet<u64>>,
    writes: Mutex<Vec<(u32, u64, u64)>>,
    reads: AtomicUsize,
}

impl FakeMsr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, cpu: u32, addr: u64, value: u64) {
        self.values.lock().insert((cpu, addr), value);
    }

    pub fn set_all(&self, cpus: impl IntoIterator<Item = u32>, addr: u64, value: u64) {
        for cpu in cpus {
            self.set(cpu, addr, value);
        }
    }

    pub fn get(&self, cpu: u32, addr: u64) -> u64 {
        self.values.lock().get(&(cpu, addr)).copied().unwrap_or(0)
    }

    /// Make every access to `addr` fail like a privileged or missing register
    pub fn deny(&self, addr: u64) {
        self.denied.lock().insert(addr);
    }

    pub fn allow(&self, addr: u64) {
        self.denied.lock().remove(&addr);
    }

    pub fn writes(&self) -> Vec<(u32, u64, u64)> {
        self.writes.lock().clone()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check(&self, cpu: u32, addr: u64) -> Result<()> {
        if self.denied.lock().contains(&addr) {
            return Err(PowerflowError::RegisterAccess(format!(
                "Failed to read MSR 0x{addr:X} on CPU {cpu}: Permission denied"
            )));
        }
        Ok(())
    }
}

impl RegisterAccess for FakeMsr {
    fn read(&self, cpu: u32, addr: u64) -> Result<u64> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check(cpu, addr)?;
        Ok(self.get(cpu, addr))
    }

    fn write(&self, cpu: u32, addr: u64, value: u64) -> Result<()> {
        self.check(cpu, addr)?;
        self.writes.lock().push((cpu, addr, value));
        self.set(cpu, addr, value);
        Ok(())
    }
}

pub struct FixedTopology(pub Topology);

impl TopologyProvider for FixedTopology {
    fn topology(&self, _class: ComponentClass) -> Result<Topology> {
        Ok(self.0.clone())
    }
}
