//! Core performance-monitoring register layouts
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B
//! - Chapter 18: Performance Monitoring

use crate::register::{BitField, RegisterLayout};

/// Number of fixed-function performance counters
pub const FIXED_COUNTERS: usize = 3;

/// Number of general-purpose counters tracked per logical CPU
pub const PERFMON_COUNTERS: usize = 8;

/// Number of PCU uncore event-select registers per package
pub const PCU_EVENT_SELECTS: usize = 4;

/// Fixed and general-purpose counters are 48 bits wide
pub const COUNTER_VALUE: BitField = BitField::new(0, 47);

/// IA32_PERF_GLOBAL_CTRL enable bits for fixed counters 0-2
pub const GLOBAL_FIXED_ENABLE: BitField = BitField::new(32, 34);

/// Performance Event Select register layout
///
/// | Bits   | Field       | Description                    |
/// |--------|-------------|--------------------------------|
/// | 0-7    | event_select| Event select                   |
/// | 8-15   | umask       | Unit mask                      |
/// | 16     | usr         | User mode                      |
/// | 17     | os          | OS mode                        |
/// | 22     | enable      | Enable counter                 |
/// | 24-31  | cmask       | Counter mask                   |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfEvtSel {
    pub event_select: u8,
    pub umask: u8,
    pub usr: bool,
    pub os: bool,
    pub enable: bool,
    pub cmask: u8,
}

pub mod evtsel {
    use crate::register::BitField;

    pub const EVENT_SELECT: BitField = BitField::new(0, 7);
    pub const UMASK: BitField = BitField::new(8, 15);
    pub const USR: BitField = BitField::bit(16);
    pub const OS: BitField = BitField::bit(17);
    pub const ENABLE: BitField = BitField::bit(22);
    pub const CMASK: BitField = BitField::new(24, 31);
}

impl RegisterLayout for PerfEvtSel {
    fn to_msr_value(&self) -> u64 {
        use evtsel::*;

        let mut value = EVENT_SELECT.insert(0, u64::from(self.event_select));
        value = UMASK.insert(value, u64::from(self.umask));
        value = USR.insert(value, u64::from(self.usr));
        value = OS.insert(value, u64::from(self.os));
        value = ENABLE.insert(value, u64::from(self.enable));
        CMASK.insert(value, u64::from(self.cmask))
    }

    fn from_msr_value(value: u64) -> Self {
        use evtsel::*;

        Self {
            event_select: EVENT_SELECT.extract(value) as u8,
            umask: UMASK.extract(value) as u8,
            usr: USR.is_set(value),
            os: OS.is_set(value),
            enable: ENABLE.is_set(value),
            cmask: CMASK.extract(value) as u8,
        }
    }
}

/// Fixed Counter Control Register layout
///
/// Each counter uses 4 bits: [enable_os, enable_usr, any_thread, pmi]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedCtrCtrl {
    pub os: [bool; FIXED_COUNTERS],
    pub usr: [bool; FIXED_COUNTERS],
}

impl FixedCtrCtrl {
    /// Count in both ring 0 and user mode on all three fixed counters
    pub fn all_rings() -> Self {
        Self {
            os: [true; FIXED_COUNTERS],
            usr: [true; FIXED_COUNTERS],
        }
    }
}

impl RegisterLayout for FixedCtrCtrl {
    fn to_msr_value(&self) -> u64 {
        (0..FIXED_COUNTERS).fold(0u64, |value, i| {
            let shift = 4 * i as u32;
            let value = BitField::bit(shift).insert(value, u64::from(self.os[i]));
            BitField::bit(shift + 1).insert(value, u64::from(self.usr[i]))
        })
    }

    fn from_msr_value(value: u64) -> Self {
        let mut ctrl = Self::default();
        for i in 0..FIXED_COUNTERS {
            let shift = 4 * i as u32;
            ctrl.os[i] = BitField::bit(shift).is_set(value);
            ctrl.usr[i] = BitField::bit(shift + 1).is_set(value);
        }
        ctrl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_evtsel_round_trip() {
        let sel = PerfEvtSel {
            event_select: 0x3C,
            umask: 0x01,
            usr: true,
            os: true,
            enable: true,
            cmask: 0,
        };

        let value = sel.to_msr_value();
        assert_eq!(value, 0x0043_013C);
        assert_eq!(PerfEvtSel::from_msr_value(value), sel);
    }

    #[test]
    fn test_fixed_ctr_ctrl_all_rings() {
        let ctrl = FixedCtrCtrl::all_rings();
        assert_eq!(ctrl.to_msr_value(), 0x333);
        assert_eq!(FixedCtrCtrl::from_msr_value(0x333), ctrl);
    }

    #[test]
    fn test_counter_value_is_48_bits() {
        assert_eq!(COUNTER_VALUE.extract(u64::MAX), (1 << 48) - 1);
        assert_eq!(GLOBAL_FIXED_ENABLE.insert(0, 0x7), 0x7 << 32);
    }
}
