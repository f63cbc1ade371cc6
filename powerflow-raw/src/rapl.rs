//! RAPL (Running Average Power Limit) register layouts
//!
//! Layouts are architecture-agnostic; each architecture module supplies the
//! addresses these layouts are read from.
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B
//! - Section 14.10: Platform Specific Power Management Support

use crate::register::{BitField, RegisterLayout};

/// Energy status counters are 32 bits wide and wrap silently
pub const ENERGY_COUNTER: BitField = BitField::new(0, 31);

/// Difference between two energy counter samples, accounting for one wraparound
///
/// ```
/// use powerflow_raw::rapl::energy_delta;
///
/// assert_eq!(energy_delta(100, 250), 150);
/// assert_eq!(energy_delta(0xFFFF_FFF0, 0x10), 0x20);
/// ```
pub fn energy_delta(previous: u64, current: u64) -> u64 {
    let previous = ENERGY_COUNTER.extract(previous);
    let current = ENERGY_COUNTER.extract(current);
    if current >= previous {
        current - previous
    } else {
        current + (ENERGY_COUNTER.mask() + 1) - previous
    }
}

/// Package RAPL Power Limit register layout
///
/// ## Register Format
///
/// | Bits   | Field          | Description                        |
/// |--------|----------------|------------------------------------|
/// | 0-14   | power_limit_1  | Power limit 1 (power units)        |
/// | 15     | enable_1       | Enable power limit 1               |
/// | 16     | clamp_1        | Clamp to power limit 1             |
/// | 17-23  | time_window_1  | Time window 1 (Y: 17-21, Z: 22-23) |
/// | 24-31  | reserved       |                                    |
/// | 32-46  | power_limit_2  | Power limit 2 (power units)        |
/// | 47     | enable_2       | Enable power limit 2               |
/// | 48     | clamp_2        | Clamp to power limit 2             |
/// | 49-55  | time_window_2  | Time window 2 (Y: 49-53, Z: 54-55) |
/// | 56-62  | reserved       |                                    |
/// | 63     | lock           | Lock register                      |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaplPowerLimit {
    pub power_limit_1: u16,
    pub enable_1: bool,
    pub clamp_1: bool,
    pub time_window_1: u8,
    pub power_limit_2: u16,
    pub enable_2: bool,
    pub clamp_2: bool,
    pub time_window_2: u8,
    /// Lock register (prevents further writes until reset)
    pub lock: bool,
}

pub mod pkg_limit {
    use crate::register::BitField;

    pub const POWER_LIMIT_1: BitField = BitField::new(0, 14);
    pub const ENABLE_1: BitField = BitField::bit(15);
    pub const CLAMP_1: BitField = BitField::bit(16);
    pub const TIME_WINDOW_1: BitField = BitField::new(17, 23);
    pub const POWER_LIMIT_2: BitField = BitField::new(32, 46);
    pub const ENABLE_2: BitField = BitField::bit(47);
    pub const CLAMP_2: BitField = BitField::bit(48);
    pub const TIME_WINDOW_2: BitField = BitField::new(49, 55);
    pub const LOCK: BitField = BitField::bit(63);
}

impl RegisterLayout for RaplPowerLimit {
    fn to_msr_value(&self) -> u64 {
        use pkg_limit::*;

        let mut value = POWER_LIMIT_1.insert(0, u64::from(self.power_limit_1));
        value = ENABLE_1.insert(value, u64::from(self.enable_1));
        value = CLAMP_1.insert(value, u64::from(self.clamp_1));
        value = TIME_WINDOW_1.insert(value, u64::from(self.time_window_1));
        value = POWER_LIMIT_2.insert(value, u64::from(self.power_limit_2));
        value = ENABLE_2.insert(value, u64::from(self.enable_2));
        value = CLAMP_2.insert(value, u64::from(self.clamp_2));
        value = TIME_WINDOW_2.insert(value, u64::from(self.time_window_2));
        LOCK.insert(value, u64::from(self.lock))
    }

    fn from_msr_value(value: u64) -> Self {
        use pkg_limit::*;

        Self {
            power_limit_1: POWER_LIMIT_1.extract(value) as u16,
            enable_1: ENABLE_1.is_set(value),
            clamp_1: CLAMP_1.is_set(value),
            time_window_1: TIME_WINDOW_1.extract(value) as u8,
            power_limit_2: POWER_LIMIT_2.extract(value) as u16,
            enable_2: ENABLE_2.is_set(value),
            clamp_2: CLAMP_2.is_set(value),
            time_window_2: TIME_WINDOW_2.extract(value) as u8,
            lock: LOCK.is_set(value),
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if !pkg_limit::POWER_LIMIT_1.fits(u64::from(self.power_limit_1)) {
            return Err("Power limit 1 must be <= 0x7FFF (15 bits)");
        }
        if !pkg_limit::TIME_WINDOW_1.fits(u64::from(self.time_window_1)) {
            return Err("Time window 1 must be <= 127 (7 bits)");
        }
        if !pkg_limit::POWER_LIMIT_2.fits(u64::from(self.power_limit_2)) {
            return Err("Power limit 2 must be <= 0x7FFF (15 bits)");
        }
        if !pkg_limit::TIME_WINDOW_2.fits(u64::from(self.time_window_2)) {
            return Err("Time window 2 must be <= 127 (7 bits)");
        }
        Ok(())
    }
}

/// DRAM RAPL Power Limit register layout
///
/// | Bits   | Field        | Description                        |
/// |--------|--------------|------------------------------------|
/// | 0-14   | power_limit  | Power limit (power units)          |
/// | 15     | enable       | Enable power limit                 |
/// | 17-23  | time_window  | Time window (Y: 17-21, Z: 22-23)   |
/// | 31     | lock         | Lock register                      |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DramPowerLimit {
    pub power_limit: u16,
    pub enable: bool,
    pub time_window: u8,
    pub lock: bool,
}

pub mod dram_limit {
    use crate::register::BitField;

    pub const POWER_LIMIT: BitField = BitField::new(0, 14);
    pub const ENABLE: BitField = BitField::bit(15);
    pub const TIME_WINDOW: BitField = BitField::new(17, 23);
    pub const LOCK: BitField = BitField::bit(31);
}

impl RegisterLayout for DramPowerLimit {
    fn to_msr_value(&self) -> u64 {
        use dram_limit::*;

        let mut value = POWER_LIMIT.insert(0, u64::from(self.power_limit));
        value = ENABLE.insert(value, u64::from(self.enable));
        value = TIME_WINDOW.insert(value, u64::from(self.time_window));
        LOCK.insert(value, u64::from(self.lock))
    }

    fn from_msr_value(value: u64) -> Self {
        use dram_limit::*;

        Self {
            power_limit: POWER_LIMIT.extract(value) as u16,
            enable: ENABLE.is_set(value),
            time_window: TIME_WINDOW.extract(value) as u8,
            lock: LOCK.is_set(value),
        }
    }
}

/// RAPL Power Info register layout (package and DRAM share it)
///
/// | Bits   | Field           | Description                     |
/// |--------|-----------------|---------------------------------|
/// | 0-14   | thermal_spec    | Thermal design power            |
/// | 16-30  | min_power       | Minimum power                   |
/// | 32-46  | max_power       | Maximum power                   |
/// | 48-53  | max_time_window | Maximum time window (time units)|
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaplPowerInfo {
    pub thermal_spec_power: u16,
    pub min_power: u16,
    pub max_power: u16,
    pub max_time_window: u8,
}

pub mod power_info {
    use crate::register::BitField;

    pub const THERMAL_SPEC_POWER: BitField = BitField::new(0, 14);
    pub const MIN_POWER: BitField = BitField::new(16, 30);
    pub const MAX_POWER: BitField = BitField::new(32, 46);
    pub const MAX_TIME_WINDOW: BitField = BitField::new(48, 53);
}

impl RegisterLayout for RaplPowerInfo {
    fn to_msr_value(&self) -> u64 {
        use power_info::*;

        let mut value = THERMAL_SPEC_POWER.insert(0, u64::from(self.thermal_spec_power));
        value = MIN_POWER.insert(value, u64::from(self.min_power));
        value = MAX_POWER.insert(value, u64::from(self.max_power));
        MAX_TIME_WINDOW.insert(value, u64::from(self.max_time_window))
    }

    fn from_msr_value(value: u64) -> Self {
        use power_info::*;

        Self {
            thermal_spec_power: THERMAL_SPEC_POWER.extract(value) as u16,
            min_power: MIN_POWER.extract(value) as u16,
            max_power: MAX_POWER.extract(value) as u16,
            max_time_window: MAX_TIME_WINDOW.extract(value) as u8,
        }
    }
}
