//! Architecture-specific register maps
//!
//! Each supported CPU model contributes one immutable [`RegisterMap`]. The
//! decoding logic in this crate is shared; an architecture only supplies
//! addresses, bit positions and the few platform constants that differ
//! between generations.
//!
//! ## Supported Architectures
//!
//! - **Ivy Bridge-EP** (`ivybridge-ep` feature) - family 06, model 3E
//! - **Skylake-SP** (`skylake-sp` feature) - family 06, model 55

use crate::pmu::{FIXED_COUNTERS, PCU_EVENT_SELECTS, PERFMON_COUNTERS};
use crate::register::BitField;

#[cfg(feature = "ivybridge-ep")]
pub mod ivybridge_ep;

#[cfg(feature = "skylake-sp")]
pub mod skylake_sp;

/// Named MSR addresses and platform constants for one CPU model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    pub msr_platform_info: u64,
    pub ia32_time_stamp_counter: u64,
    pub ia32_perf_ctl: u64,
    pub ia32_perf_status: u64,
    pub ia32_therm_interrupt: u64,
    pub ia32_therm_status: u64,
    pub msr_therm2_ctl: u64,
    pub ia32_misc_enable: u64,
    pub msr_temperature_target: u64,
    pub msr_turbo_ratio_limit: u64,
    /// Second turbo ratio register (cores 9-16); absent where the address holds core counts
    pub msr_turbo_ratio_limit1: Option<u64>,
    pub ia32_package_therm_status: u64,
    pub ia32_package_therm_interrupt: u64,
    pub ia32_fixed_counters: [u64; FIXED_COUNTERS],
    pub ia32_fixed_ctr_ctrl: u64,
    pub ia32_perf_global_status: u64,
    pub ia32_perf_global_ctrl: u64,
    pub ia32_perf_global_ovf_ctrl: u64,
    pub msr_rapl_power_unit: u64,
    pub msr_pkg_power_limit: u64,
    pub msr_pkg_energy_status: u64,
    pub msr_pkg_perf_status: u64,
    pub msr_pkg_power_info: u64,
    pub msr_dram_power_limit: u64,
    pub msr_dram_energy_status: u64,
    pub msr_dram_perf_status: u64,
    pub msr_dram_power_info: u64,
    pub msr_turbo_activation_ratio: u64,
    pub ia32_mperf: u64,
    pub ia32_aperf: u64,
    pub ia32_perfmon_counters: [u64; PERFMON_COUNTERS],
    pub ia32_perfevtsel_counters: [u64; PERFMON_COUNTERS],
    pub msrs_pcu_pmon_evtsel: [u64; PCU_EVENT_SELECTS],

    /// Turbo-disable bit inside IA32_MISC_ENABLE
    pub turbo_mode_disable: BitField,
    /// Fixed DRAM energy exponent on platforms that ignore the unit register for DRAM
    pub dram_energy_unit_exp: Option<u8>,
    pub bus_clock_mhz: u32,
}

impl RegisterMap {
    /// Every named address in the map, in declaration order
    pub fn entries(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = vec![
            ("msr_platform_info".into(), self.msr_platform_info),
            ("ia32_time_stamp_counter".into(), self.ia32_time_stamp_counter),
            ("ia32_perf_ctl".into(), self.ia32_perf_ctl),
            ("ia32_perf_status".into(), self.ia32_perf_status),
            ("ia32_therm_interrupt".into(), self.ia32_therm_interrupt),
            ("ia32_therm_status".into(), self.ia32_therm_status),
            ("msr_therm2_ctl".into(), self.msr_therm2_ctl),
            ("ia32_misc_enable".into(), self.ia32_misc_enable),
            ("msr_temperature_target".into(), self.msr_temperature_target),
            ("msr_turbo_ratio_limit".into(), self.msr_turbo_ratio_limit),
        ];
        if let Some(addr) = self.msr_turbo_ratio_limit1 {
            entries.push(("msr_turbo_ratio_limit1".into(), addr));
        }
        entries.extend([
            ("ia32_package_therm_status".into(), self.ia32_package_therm_status),
            ("ia32_package_therm_interrupt".into(), self.ia32_package_therm_interrupt),
        ]);
        entries.extend(indexed("ia32_fixed_counters", &self.ia32_fixed_counters));
        entries.extend([
            ("ia32_fixed_ctr_ctrl".into(), self.ia32_fixed_ctr_ctrl),
            ("ia32_perf_global_status".into(), self.ia32_perf_global_status),
            ("ia32_perf_global_ctrl".into(), self.ia32_perf_global_ctrl),
            ("ia32_perf_global_ovf_ctrl".into(), self.ia32_perf_global_ovf_ctrl),
            ("msr_rapl_power_unit".into(), self.msr_rapl_power_unit),
            ("msr_pkg_power_limit".into(), self.msr_pkg_power_limit),
            ("msr_pkg_energy_status".into(), self.msr_pkg_energy_status),
            ("msr_pkg_perf_status".into(), self.msr_pkg_perf_status),
            ("msr_pkg_power_info".into(), self.msr_pkg_power_info),
            ("msr_dram_power_limit".into(), self.msr_dram_power_limit),
            ("msr_dram_energy_status".into(), self.msr_dram_energy_status),
            ("msr_dram_perf_status".into(), self.msr_dram_perf_status),
            ("msr_dram_power_info".into(), self.msr_dram_power_info),
            ("msr_turbo_activation_ratio".into(), self.msr_turbo_activation_ratio),
            ("ia32_mperf".into(), self.ia32_mperf),
            ("ia32_aperf".into(), self.ia32_aperf),
        ]);
        entries.extend(indexed("ia32_perfmon_counters", &self.ia32_perfmon_counters));
        entries.extend(indexed("ia32_perfevtsel_counters", &self.ia32_perfevtsel_counters));
        entries.extend(indexed("msrs_pcu_pmon_evtsel", &self.msrs_pcu_pmon_evtsel));
        entries
    }
}

fn indexed<'a>(name: &'a str, addrs: &'a [u64]) -> impl Iterator<Item = (String, u64)> + 'a {
    addrs
        .iter()
        .enumerate()
        .map(move |(i, &addr)| (format!("{name}[{i}]"), addr))
}

/// Consecutive MSR addresses starting at `base`
pub(crate) const fn consecutive<const N: usize>(base: u64) -> [u64; N] {
    let mut addrs = [0u64; N];
    let mut i = 0;
    while i < N {
        addrs[i] = base + i as u64;
        i += 1;
    }
    addrs
}
