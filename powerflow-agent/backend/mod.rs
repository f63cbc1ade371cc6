//! Capability tables
//!
//! A [`Capabilities`] implementation is the full set of telemetry and control
//! operations for one architecture. Methods return decoded readings; text and
//! structured rendering happen in [`crate::output`].

pub mod intel;

#[cfg(test)]
pub(crate) mod testing;

use crate::common::ArchitectureId;
use crate::error::{PowerflowError, Result};
use crate::readings::{
    ClockReading, ClockScope, Counters, EnergyReading, FrequencyReading, GpuPowerRatio,
    PowerDomainInfo, PowerLimits, ThermalReading, TurboStatus,
};
use crate::topology::Topology;

pub use intel::IntelCpu;

pub trait Capabilities: Send + Sync {
    fn arch(&self) -> ArchitectureId;

    /// Validated topology driving socket iteration
    fn topology(&self) -> Result<Topology>;

    /// Named register addresses of the active map
    fn features(&self) -> Result<Vec<(String, u64)>>;

    fn power_limits(&self) -> Result<PowerLimits>;

    /// Program `watts` as the package PL1 limit on every socket
    fn cap_package_power_limit(&self, watts: u32) -> Result<()>;

    fn power_domain_info(&self) -> Result<PowerDomainInfo>;

    fn energy(&self) -> Result<Vec<EnergyReading>>;

    fn thermals(&self) -> Result<Vec<ThermalReading>>;

    fn clocks(&self, scope: ClockScope) -> Result<Vec<ClockReading>>;

    fn counters(&self) -> Result<Counters>;

    fn enable_fixed_counters(&self) -> Result<()>;

    fn frequencies(&self) -> Result<Vec<FrequencyReading>>;

    fn enable_turbo(&self) -> Result<()>;

    fn disable_turbo(&self) -> Result<()>;

    fn turbo_status(&self) -> Result<Vec<TurboStatus>>;

    fn gpu_power_ratio(&self) -> Result<Vec<GpuPowerRatio>>;
}

/// Error for a capability the recognized architecture does not provide
pub fn unimplemented(capability: &'static str, arch: &ArchitectureId) -> PowerflowError {
    PowerflowError::CapabilityUnimplemented {
        capability,
        arch: arch.to_string(),
    }
}
