//! Decoded, physically-scaled readings produced by the capability backends

use powerflow_raw::ScalingUnits;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLimitReading {
    pub socket: u32,
    pub raw: u64,
    pub pl1_watts: f64,
    pub pl1_seconds: f64,
    pub pl1_enabled: bool,
    pub pl1_clamped: bool,
    pub pl2_watts: f64,
    pub pl2_seconds: f64,
    pub pl2_enabled: bool,
    pub pl2_clamped: bool,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DramPowerLimitReading {
    pub socket: u32,
    pub raw: u64,
    pub watts: f64,
    pub seconds: f64,
    pub enabled: bool,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerInfoReading {
    pub socket: u32,
    pub raw: u64,
    pub tdp_watts: f64,
    pub min_watts: f64,
    pub max_watts: f64,
    pub max_time_window_sec: f64,
}

/// Everything `get_power_limits` reports for the node
#[derive(Debug, Clone, PartialEq)]
pub struct PowerLimits {
    pub units_raw: u64,
    pub units: ScalingUnits,
    pub package: Vec<PowerLimitReading>,
    pub dram: Vec<DramPowerLimitReading>,
    pub package_info: Vec<PowerInfoReading>,
    pub dram_info: Vec<PowerInfoReading>,
}

/// Node power-domain description (socket 0 registers)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerDomainInfo {
    pub units: ScalingUnits,
    pub package_info: PowerInfoReading,
    pub dram_info: PowerInfoReading,
    pub package_limit: PowerLimitReading,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyReading {
    pub socket: u32,
    pub pkg_raw: u64,
    pub dram_raw: u64,
    pub pkg_energy_exp: u8,
    pub dram_energy_exp: u8,
    pub pkg_joules: f64,
    pub dram_joules: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    pub socket: u32,
    pub pkg_watts: f64,
    pub dram_watts: f64,
    pub elapsed_sec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreTemperature {
    pub core: u32,
    pub cpu: u32,
    pub celsius: i32,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalReading {
    pub socket: u32,
    pub tjmax_celsius: u8,
    pub package_celsius: i32,
    pub cores: Vec<CoreTemperature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockScope {
    /// First CPU of every socket
    Socket,
    /// First hyperthread of every physical core
    Core,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockReading {
    pub socket: u32,
    pub core: Option<u32>,
    pub cpu: u32,
    pub aperf: u64,
    pub mperf: u64,
    pub tsc: u64,
    pub current_mhz: u32,
    pub average_mhz: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterReading {
    pub socket: u32,
    pub cpu: u32,
    pub fixed: [u64; powerflow_raw::pmu::FIXED_COUNTERS],
    pub perfevtsel: Vec<u64>,
    pub pmc: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcuReading {
    pub socket: u32,
    pub evtsel: [u64; powerflow_raw::pmu::PCU_EVENT_SELECTS],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counters {
    pub threads: Vec<CounterReading>,
    pub pcu: Vec<PcuReading>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyReading {
    pub socket: u32,
    pub min_mhz: u32,
    pub efficient_mhz: u32,
    pub base_mhz: u32,
    /// P1 down to Pn in bus-clock steps
    pub non_turbo_mhz: Vec<u32>,
    /// Distinct turbo frequencies, highest first
    pub turbo_mhz: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurboStatus {
    pub socket: u32,
    pub raw: u64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuPowerRatio {
    pub socket: u32,
    pub ratio_percent: f64,
}
