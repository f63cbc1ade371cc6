//! Intel Ivy Bridge-EP (family 06, model 3E) register map
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 4
//! - Table 2-24: MSRs in Intel Xeon Processor E5 v2 Family

use super::{consecutive, RegisterMap};
use crate::register::BitField;

pub const FAMILY: u32 = 0x06;
pub const MODEL: u32 = 0x3E;

pub const REGISTERS: RegisterMap = RegisterMap {
    msr_platform_info: 0xCE,
    ia32_time_stamp_counter: 0x10,
    ia32_perf_ctl: 0x199,
    ia32_perf_status: 0x198,
    ia32_therm_interrupt: 0x19B,
    ia32_therm_status: 0x19C,
    msr_therm2_ctl: 0x19D,
    ia32_misc_enable: 0x1A0,
    msr_temperature_target: 0x1A2,
    msr_turbo_ratio_limit: 0x1AD,
    msr_turbo_ratio_limit1: Some(0x1AE),
    ia32_package_therm_status: 0x1B1,
    ia32_package_therm_interrupt: 0x1B2,
    ia32_fixed_counters: consecutive(0x309),
    ia32_fixed_ctr_ctrl: 0x38D,
    ia32_perf_global_status: 0x38E,
    ia32_perf_global_ctrl: 0x38F,
    ia32_perf_global_ovf_ctrl: 0x390,
    msr_rapl_power_unit: 0x606,
    msr_pkg_power_limit: 0x610,
    msr_pkg_energy_status: 0x611,
    msr_pkg_perf_status: 0x613,
    msr_pkg_power_info: 0x614,
    msr_dram_power_limit: 0x618,
    msr_dram_energy_status: 0x619,
    msr_dram_perf_status: 0x61B,
    msr_dram_power_info: 0x61C,
    msr_turbo_activation_ratio: 0x64C,
    ia32_mperf: 0xE7,
    ia32_aperf: 0xE8,
    ia32_perfmon_counters: consecutive(0xC1),
    ia32_perfevtsel_counters: consecutive(0x186),
    msrs_pcu_pmon_evtsel: consecutive(0xC30),

    turbo_mode_disable: BitField::bit(38),
    dram_energy_unit_exp: None,
    bus_clock_mhz: 100,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_slot_registers() {
        assert_eq!(REGISTERS.ia32_fixed_counters, [0x309, 0x30A, 0x30B]);
        assert_eq!(REGISTERS.ia32_perfmon_counters[7], 0xC8);
        assert_eq!(REGISTERS.ia32_perfevtsel_counters[7], 0x18D);
        assert_eq!(REGISTERS.msrs_pcu_pmon_evtsel, [0xC30, 0xC31, 0xC32, 0xC33]);
    }

    #[test]
    fn test_entries_cover_every_register() {
        let entries = REGISTERS.entries();
        assert_eq!(entries.len(), 52);
        assert!(entries.contains(&("msr_rapl_power_unit".to_string(), 0x606)));
        assert!(entries.contains(&("msrs_pcu_pmon_evtsel[3]".to_string(), 0xC33)));
    }
}
