//! Frequency and ratio register layouts
//!
//! Ratios are multiples of the architecture's bus clock (100 MHz since Sandy Bridge).

use crate::register::{BitField, RegisterLayout};

/// IA32_PERF_STATUS current operating ratio
pub const CURRENT_RATIO: BitField = BitField::new(8, 15);

/// MSR_PLATFORM_INFO layout
///
/// | Bits   | Field                  | Description                   |
/// |--------|------------------------|-------------------------------|
/// | 8-15   | max_non_turbo_ratio    | P1, guaranteed base ratio     |
/// | 40-47  | max_efficiency_ratio   | Pn, lowest efficient ratio    |
/// | 48-55  | min_operating_ratio    | Pm, minimum supported ratio   |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformInfo {
    pub max_non_turbo_ratio: u8,
    pub max_efficiency_ratio: u8,
    pub min_operating_ratio: u8,
}

pub mod platform_info {
    use crate::register::BitField;

    pub const MAX_NON_TURBO_RATIO: BitField = BitField::new(8, 15);
    pub const MAX_EFFICIENCY_RATIO: BitField = BitField::new(40, 47);
    pub const MIN_OPERATING_RATIO: BitField = BitField::new(48, 55);
}

impl RegisterLayout for PlatformInfo {
    fn to_msr_value(&self) -> u64 {
        use platform_info::*;

        let value = MAX_NON_TURBO_RATIO.insert(0, u64::from(self.max_non_turbo_ratio));
        let value = MAX_EFFICIENCY_RATIO.insert(value, u64::from(self.max_efficiency_ratio));
        MIN_OPERATING_RATIO.insert(value, u64::from(self.min_operating_ratio))
    }

    fn from_msr_value(value: u64) -> Self {
        use platform_info::*;

        Self {
            max_non_turbo_ratio: MAX_NON_TURBO_RATIO.extract(value) as u8,
            max_efficiency_ratio: MAX_EFFICIENCY_RATIO.extract(value) as u8,
            min_operating_ratio: MIN_OPERATING_RATIO.extract(value) as u8,
        }
    }
}

/// MSR_TURBO_RATIO_LIMIT: one ratio byte per active-core group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurboRatioLimit {
    pub ratios: [u8; 8],
}

impl RegisterLayout for TurboRatioLimit {
    fn to_msr_value(&self) -> u64 {
        u64::from_le_bytes(self.ratios)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            ratios: value.to_le_bytes(),
        }
    }
}

/// Current frequency from IA32_PERF_STATUS
pub fn current_frequency_mhz(perf_status: u64, bus_clock_mhz: u32) -> u32 {
    CURRENT_RATIO.extract(perf_status) as u32 * bus_clock_mhz
}

/// Average effective frequency over the APERF/MPERF accumulation window
///
/// Returns 0.0 when MPERF has not advanced.
pub fn average_frequency_mhz(aperf: u64, mperf: u64, base_ratio: u8, bus_clock_mhz: u32) -> f64 {
    if mperf == 0 {
        return 0.0;
    }
    f64::from(base_ratio) * f64::from(bus_clock_mhz) * (aperf as f64 / mperf as f64)
}
