//! Digital thermal sensor register layouts
//!
//! Temperatures are reported as an offset below TjMax (the PROCHOT
//! activation temperature held in `MSR_TEMPERATURE_TARGET`).

use crate::register::{BitField, RegisterLayout};

pub const DIGITAL_READOUT: BitField = BitField::new(16, 22);
pub const READING_VALID: BitField = BitField::bit(31);
pub const TEMPERATURE_TARGET: BitField = BitField::new(16, 23);

/// IA32_THERM_STATUS (per core) and IA32_PACKAGE_THERM_STATUS (per package)
///
/// | Bits   | Field           | Description                          |
/// |--------|-----------------|--------------------------------------|
/// | 16-22  | digital_readout | Degrees below TjMax                  |
/// | 31     | reading_valid   | Readout valid (core register only)   |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThermStatus {
    pub digital_readout: u8,
    pub reading_valid: bool,
}

impl RegisterLayout for ThermStatus {
    fn to_msr_value(&self) -> u64 {
        let value = DIGITAL_READOUT.insert(0, u64::from(self.digital_readout));
        READING_VALID.insert(value, u64::from(self.reading_valid))
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            digital_readout: DIGITAL_READOUT.extract(value) as u8,
            reading_valid: READING_VALID.is_set(value),
        }
    }
}

/// TjMax in degrees Celsius from MSR_TEMPERATURE_TARGET
pub fn tjmax_celsius(temperature_target: u64) -> u8 {
    TEMPERATURE_TARGET.extract(temperature_target) as u8
}

/// Absolute temperature for a thermal status readout
pub fn temperature_celsius(tjmax: u8, status: &ThermStatus) -> i32 {
    i32::from(tjmax) - i32::from(status.digital_readout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_from_readout() {
        let status = ThermStatus::from_msr_value(0x8839_0000);
        assert!(status.reading_valid);
        assert_eq!(status.digital_readout, 0x39);

        let tjmax = tjmax_celsius(0x0064_0000);
        assert_eq!(tjmax, 100);
        assert_eq!(temperature_celsius(tjmax, &status), 100 - 0x39);
    }

    #[test]
    fn test_therm_status_round_trip() {
        let status = ThermStatus {
            digital_readout: 42,
            reading_valid: true,
        };
        assert_eq!(ThermStatus::from_msr_value(status.to_msr_value()), status);
    }
}
