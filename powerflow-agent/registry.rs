//! Architecture dispatch
//!
//! Maps an [`ArchitectureId`] to the capability table for that processor. The
//! entry list is a static built from the enabled architecture features and is
//! never mutated after startup.

use std::sync::Arc;

use powerflow_raw::RegisterMap;

use crate::backend::{Capabilities, IntelCpu};
use crate::common::{ArchitectureId, RegisterAccess, Vendor};
use crate::error::{PowerflowError, Result};
use crate::topology::TopologyProvider;

#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub name: &'static str,
    pub vendor: Vendor,
    pub family: u32,
    pub model: u32,
    pub registers: &'static RegisterMap,
}

impl RegistryEntry {
    fn matches(&self, id: &ArchitectureId) -> bool {
        self.vendor == id.vendor && self.family == id.family && self.model == id.model
    }
}

static ENTRIES: &[RegistryEntry] = &[
    #[cfg(feature = "ivybridge-ep")]
    RegistryEntry {
        name: "Ivy Bridge-EP",
        vendor: Vendor::Intel,
        family: powerflow_raw::arch::ivybridge_ep::FAMILY,
        model: powerflow_raw::arch::ivybridge_ep::MODEL,
        registers: &powerflow_raw::arch::ivybridge_ep::REGISTERS,
    },
    #[cfg(feature = "skylake-sp")]
    RegistryEntry {
        name: "Skylake-SP",
        vendor: Vendor::Intel,
        family: powerflow_raw::arch::skylake_sp::FAMILY,
        model: powerflow_raw::arch::skylake_sp::MODEL,
        registers: &powerflow_raw::arch::skylake_sp::REGISTERS,
    },
];

/// Architectures this build can drive
pub fn supported() -> &'static [RegistryEntry] {
    ENTRIES
}

pub fn lookup(id: &ArchitectureId) -> Option<&'static RegistryEntry> {
    ENTRIES.iter().find(|entry| entry.matches(id))
}

/// Select the capability table for `id`
///
/// Resolution performs no register access; an unknown architecture fails
/// before the access provider is ever used.
pub fn resolve(
    id: &ArchitectureId,
    access: Arc<dyn RegisterAccess>,
    topology: Arc<dyn TopologyProvider>,
) -> Result<Arc<dyn Capabilities>> {
    let entry = lookup(id).ok_or_else(|| {
        let known: Vec<&str> = ENTRIES.iter().map(|e| e.name).collect();
        PowerflowError::ArchitectureUnsupported(format!("{id} (supported: {})", known.join(", ")))
    })?;

    tracing::info!("Using {} capability table for {}", entry.name, id);

    let backend = IntelCpu::new(*id, entry.registers, access, topology);
    Ok(Arc::new(backend.with_detected_perfmon_counters()))
}

#[cfg(all(test, feature = "ivybridge-ep", feature = "skylake-sp"))]
mod tests {
    use super::*;
    use crate::backend::testing::{FakeMsr, FixedTopology};
    use crate::topology::Topology;

    fn id(vendor: Vendor, family: u32, model: u32) -> ArchitectureId {
        ArchitectureId {
            vendor,
            family,
            model,
            stepping: 4,
        }
    }

    fn collaborators() -> (Arc<FakeMsr>, Arc<FixedTopology>) {
        (
            Arc::new(FakeMsr::new()),
            Arc::new(FixedTopology(Topology::new(2, 4, 8))),
        )
    }

    #[test]
    fn test_resolve_is_pure() {
        let (msr, topo) = collaborators();
        let ivb = id(Vendor::Intel, 0x06, 0x3E);

        let first = resolve(&ivb, msr.clone(), topo.clone()).unwrap();
        let second = resolve(&ivb, msr.clone(), topo).unwrap();

        assert_eq!(first.arch(), second.arch());
        assert_eq!(first.features().unwrap(), second.features().unwrap());
        assert_eq!(msr.read_count(), 0);
    }

    #[test]
    fn test_unknown_architecture_touches_no_register() {
        let (msr, topo) = collaborators();

        for unknown in [
            id(Vendor::Intel, 0x06, 0x4F),
            id(Vendor::Amd, 0x06, 0x3E),
            id(Vendor::Other, 0x17, 0x31),
        ] {
            let err = resolve(&unknown, msr.clone(), topo.clone()).err().unwrap();
            assert!(matches!(err, PowerflowError::ArchitectureUnsupported(_)));
        }

        assert_eq!(msr.read_count(), 0);
        assert!(msr.writes().is_empty());
    }

    #[test]
    fn test_stepping_does_not_affect_dispatch() {
        let mut skx = id(Vendor::Intel, 0x06, 0x55);
        assert!(lookup(&skx).is_some());
        skx.stepping = 7;
        assert_eq!(lookup(&skx).map(|e| e.name), Some("Skylake-SP"));
    }

    #[test]
    fn test_resolved_table_reports_unimplemented_capability() {
        let (msr, topo) = collaborators();
        let table = resolve(&id(Vendor::Intel, 0x06, 0x55), msr, topo).unwrap();
        assert!(matches!(
            table.gpu_power_ratio(),
            Err(PowerflowError::CapabilityUnimplemented { .. })
        ));
    }

    #[test]
    fn test_supported_entries_are_distinct() {
        let entries = supported();
        assert_eq!(entries.len(), 2);
        assert_ne!(entries[0].model, entries[1].model);
    }
}
