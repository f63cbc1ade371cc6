//! RAPL unit register decoding and scaling algebra
//!
//! Every RAPL quantity is stored as an integer field scaled by a power of two
//! taken from `MSR_RAPL_POWER_UNIT`:
//!
//! ```text
//! physical = raw_field * 2^(-unit_exp)
//! ```
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B
//! - Section 14.10: Platform Specific Power Management Support

use crate::register::{BitField, RegisterLayout};

/// Field positions inside the RAPL unit register
pub mod fields {
    use crate::register::BitField;

    pub const POWER_UNITS: BitField = BitField::new(0, 3);
    pub const ENERGY_UNITS: BitField = BitField::new(8, 12);
    pub const TIME_UNITS: BitField = BitField::new(16, 19);
}

/// RAPL time-window encoding used by the power-limit registers: `2^Y * (1 + Z/4)`
pub const TIME_WINDOW_Y: BitField = BitField::new(0, 4);
pub const TIME_WINDOW_Z: BitField = BitField::new(5, 6);

/// Convert a raw field to a physical value: `raw_field * 2^(-unit_exp)`
///
/// Computed in `f64` by multiplying with an exact power of two, so the result
/// is exact for every `unit_exp` in `0..=31` and every field below 2^53.
///
/// ```
/// use powerflow_raw::scale;
///
/// assert_eq!(scale(65536, 16), 1.0);
/// assert_eq!(scale(3, 1), 1.5);
/// ```
pub fn scale(raw_field: u64, unit_exp: u8) -> f64 {
    raw_field as f64 * 2f64.powi(-i32::from(unit_exp))
}

/// Inverse of [`scale`], truncating towards zero
pub fn unscale(value: f64, unit_exp: u8) -> u64 {
    if value <= 0.0 {
        return 0;
    }
    (value * 2f64.powi(i32::from(unit_exp))) as u64
}

/// Scaling exponents decoded from the RAPL unit register
///
/// ## Register Format
///
/// | Bits   | Field           | Description                    |
/// |--------|-----------------|--------------------------------|
/// | 0-3    | power_unit_exp  | Power unit (1/2^PU watts)      |
/// | 4-7    | reserved        |                                |
/// | 8-12   | energy_unit_exp | Energy unit (1/2^ESU joules)   |
/// | 13-15  | reserved        |                                |
/// | 16-19  | time_unit_exp   | Time unit (1/2^TU seconds)     |
/// | 20-63  | reserved        |                                |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScalingUnits {
    pub power_unit_exp: u8,
    pub energy_unit_exp: u8,
    pub time_unit_exp: u8,
}

impl RegisterLayout for ScalingUnits {
    fn to_msr_value(&self) -> u64 {
        let value = fields::POWER_UNITS.insert(0, u64::from(self.power_unit_exp));
        let value = fields::ENERGY_UNITS.insert(value, u64::from(self.energy_unit_exp));
        fields::TIME_UNITS.insert(value, u64::from(self.time_unit_exp))
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            power_unit_exp: fields::POWER_UNITS.extract(value) as u8,
            energy_unit_exp: fields::ENERGY_UNITS.extract(value) as u8,
            time_unit_exp: fields::TIME_UNITS.extract(value) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if !fields::POWER_UNITS.fits(u64::from(self.power_unit_exp)) {
            return Err("Power units must be <= 15 (4 bits)");
        }
        if !fields::ENERGY_UNITS.fits(u64::from(self.energy_unit_exp)) {
            return Err("Energy units must be <= 31 (5 bits)");
        }
        if !fields::TIME_UNITS.fits(u64::from(self.time_unit_exp)) {
            return Err("Time units must be <= 15 (4 bits)");
        }
        Ok(())
    }
}

/// Decode the three scaling exponents from a raw unit register value
pub fn decode_units(raw_unit_register: u64) -> ScalingUnits {
    ScalingUnits::from_msr_value(raw_unit_register)
}

impl ScalingUnits {
    /// Replace the energy exponent, for domains whose energy unit is fixed by the platform
    pub fn with_energy_unit_exp(self, energy_unit_exp: u8) -> Self {
        Self {
            energy_unit_exp,
            ..self
        }
    }

    pub fn watts(&self, raw: u64) -> f64 {
        scale(raw, self.power_unit_exp)
    }

    pub fn joules(&self, raw: u64) -> f64 {
        scale(raw, self.energy_unit_exp)
    }

    pub fn seconds(&self, raw: u64) -> f64 {
        scale(raw, self.time_unit_exp)
    }

    /// Raw power-limit field for `watts`, truncated
    pub fn power_raw(&self, watts: f64) -> u64 {
        unscale(watts, self.power_unit_exp)
    }

    /// Decode a 7-bit `Y/Z` time window field into seconds
    pub fn time_window_seconds(&self, window: u8) -> f64 {
        let y = TIME_WINDOW_Y.extract(u64::from(window));
        let z = TIME_WINDOW_Z.extract(u64::from(window));
        let multiplier = (1u64 << y) as f64 * (1.0 + z as f64 / 4.0);
        multiplier * self.seconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling_units_round_trip() {
        let units = ScalingUnits {
            power_unit_exp: 3,
            energy_unit_exp: 14,
            time_unit_exp: 10,
        };

        let value = units.to_msr_value();
        assert_eq!(value, 0x000A_0E03);
        assert_eq!(decode_units(value), units);
        assert!(units.validate().is_ok());
    }

    #[test]
    fn test_decode_units_ignores_reserved_bits() {
        let units = decode_units(0xFFFF_FFFF_FFF5_E0F3);
        assert_eq!(units.power_unit_exp, 3);
        assert_eq!(units.energy_unit_exp, 0);
        assert_eq!(units.time_unit_exp, 5);
    }

    #[test]
    fn test_energy_scaling_one_joule() {
        let units = ScalingUnits {
            energy_unit_exp: 16,
            ..Default::default()
        };
        assert_eq!(units.joules(65536), 1.0);
    }

    #[test]
    fn test_scale_monotonic_in_raw_field() {
        for exp in 0..=31u8 {
            let mut previous = scale(0, exp);
            for raw in [1u64, 2, 3, 1000, 65535, 65536, 1 << 31, u32::MAX as u64] {
                let current = scale(raw, exp);
                assert!(current >= previous, "exp {exp} raw {raw}");
                previous = current;
            }
        }
    }

    #[test]
    fn test_scale_strictly_decreasing_in_exponent() {
        for raw in [1u64, 7, 65536, u32::MAX as u64] {
            for exp in 0..31u8 {
                assert!(scale(raw, exp) > scale(raw, exp + 1), "raw {raw} exp {exp}");
            }
        }
    }

    #[test]
    fn test_scale_is_exact_up_to_exponent_31() {
        for exp in 0..=31u8 {
            let raw = 0xDEAD_BEEFu64;
            let value = scale(raw, exp);
            assert_eq!(unscale(value, exp), raw);
        }
    }

    #[test]
    fn test_time_window_decoding() {
        let units = ScalingUnits {
            time_unit_exp: 10,
            ..Default::default()
        };

        // Y = 10, Z = 0 -> 2^10 time units = 1 second
        assert_eq!(units.time_window_seconds(10), 1.0);
        // Y = 10, Z = 2 -> 1.5 seconds
        assert_eq!(units.time_window_seconds(10 | (2 << 5)), 1.5);
    }
}
