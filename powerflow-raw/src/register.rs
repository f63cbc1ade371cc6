//! Generic register abstractions: typed layouts and bit-field extraction

pub type Result<T> = std::result::Result<T, FieldError>;

/// Errors raised by bit-field specifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("Malformed bit field [{high}:{low}] (low must be <= high and high <= 63)")]
    Malformed { low: u32, high: u32 },
}

/// An inclusive `[high:low]` bit range inside a 64-bit register
///
/// Constants built with [`BitField::new`] are validated at compile time, so a
/// malformed layout never reaches a running binary.
///
/// # Example
///
/// ```
/// use powerflow_raw::BitField;
///
/// const ENERGY_UNITS: BitField = BitField::new(8, 12);
///
/// assert_eq!(ENERGY_UNITS.extract(0x000A_0E03), 0x0E);
/// assert_eq!(ENERGY_UNITS.width(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitField {
    low: u32,
    high: u32,
}

impl BitField {
    pub const fn new(low: u32, high: u32) -> Self {
        assert!(low <= high && high < 64, "malformed bit field");
        Self { low, high }
    }

    /// Single-bit field
    pub const fn bit(index: u32) -> Self {
        Self::new(index, index)
    }

    pub const fn low(&self) -> u32 {
        self.low
    }

    pub const fn high(&self) -> u32 {
        self.high
    }

    pub const fn width(&self) -> u32 {
        self.high - self.low + 1
    }

    /// Right-aligned mask covering the field width
    pub const fn mask(&self) -> u64 {
        if self.width() == 64 {
            u64::MAX
        } else {
            (1u64 << self.width()) - 1
        }
    }

    pub const fn extract(&self, raw: u64) -> u64 {
        (raw >> self.low) & self.mask()
    }

    pub const fn is_set(&self, raw: u64) -> bool {
        self.extract(raw) != 0
    }

    /// Replace the field inside `raw` with `value`, truncated to the field width
    pub const fn insert(&self, raw: u64, value: u64) -> u64 {
        (raw & !(self.mask() << self.low)) | ((value & self.mask()) << self.low)
    }

    pub const fn fits(&self, value: u64) -> bool {
        value <= self.mask()
    }
}

/// Extract bits `[high_bit:low_bit]` from `raw`, right-aligned
///
/// # Errors
///
/// Returns [`FieldError::Malformed`] if `low_bit > high_bit` or `high_bit > 63`.
pub fn extract_field(raw: u64, low_bit: u32, high_bit: u32) -> Result<u64> {
    if low_bit > high_bit || high_bit > 63 {
        return Err(FieldError::Malformed {
            low: low_bit,
            high: high_bit,
        });
    }

    Ok(BitField {
        low: low_bit,
        high: high_bit,
    }
    .extract(raw))
}

/// Trait for register layouts that can be converted to/from raw MSR values
///
/// # Example
///
/// ```ignore
/// use powerflow_raw::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct MyControl {
///     enable: bool,
///     threshold: u8,
/// }
///
/// impl RegisterLayout for MyControl {
///     fn to_msr_value(&self) -> u64 {
///         (if self.enable { 1 } else { 0 })
///             | ((self.threshold as u64) << 8)
///     }
///
///     fn from_msr_value(value: u64) -> Self {
///         Self {
///             enable: (value & 1) != 0,
///             threshold: ((value >> 8) & 0xFF) as u8,
///         }
///     }
/// }
/// ```
pub trait RegisterLayout: Sized {
    /// Convert this register layout to a raw MSR value
    fn to_msr_value(&self) -> u64;

    /// Parse a raw MSR value into this register layout
    fn from_msr_value(value: u64) -> Self;

    /// Validate that the register values are within acceptable ranges
    fn validate(&self) -> std::result::Result<(), &'static str> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_field() {
        assert_eq!(extract_field(0xABCD, 4, 11).unwrap(), 0xBC);
        assert_eq!(extract_field(u64::MAX, 0, 63).unwrap(), u64::MAX);
        assert_eq!(extract_field(1 << 63, 63, 63).unwrap(), 1);
    }

    #[test]
    fn test_extract_field_malformed() {
        assert_eq!(
            extract_field(0, 9, 3),
            Err(FieldError::Malformed { low: 9, high: 3 })
        );
        assert!(extract_field(0, 0, 64).is_err());
    }

    #[test]
    fn test_bit_field_insert() {
        const LIMIT: BitField = BitField::new(0, 14);
        const LOCK: BitField = BitField::bit(63);

        let raw = LOCK.insert(0, 1);
        let raw = LIMIT.insert(raw, 0x7FFF);
        assert_eq!(raw, 0x8000_0000_0000_7FFF);

        // Truncated to width, neighbours untouched
        let raw = LIMIT.insert(raw, 0x1_0001);
        assert_eq!(raw, 0x8000_0000_0000_0001);
        assert!(LOCK.is_set(raw));
    }

    #[test]
    fn test_bit_field_fits() {
        let field = BitField::new(16, 22);
        assert_eq!(field.width(), 7);
        assert!(field.fits(127));
        assert!(!field.fits(128));
    }
}
