//! # powerflow-raw
//!
//! Register maps and decoding for CPU power, energy, thermal, clock and
//! counter telemetry.
//!
//! This crate is pure: it never touches hardware. It turns raw 64-bit MSR
//! values into physical quantities (watts, joules, seconds, °C, MHz) and
//! provides the per-architecture register maps the agent dispatches on.
//!
//! ## Features
//!
//! Select the architectures compiled in via feature flags (both on by default):
//! - `ivybridge-ep` - Ivy Bridge-EP (06_3E) register map
//! - `skylake-sp` - Skylake-SP (06_55) register map
//!
//! ## Usage
//!
//! ```
//! use powerflow_raw::rapl::RaplPowerLimit;
//! use powerflow_raw::{decode_units, RegisterLayout};
//!
//! let units = decode_units(0x000A_0E03);
//! let limit = RaplPowerLimit::from_msr_value(0x0000_0000_0015_83C0);
//!
//! assert_eq!(units.watts(u64::from(limit.power_limit_1)), 120.0);
//! assert_eq!(units.time_window_seconds(limit.time_window_1), 1.0);
//! ```

pub mod arch;
pub mod clocks;
pub mod pmu;
pub mod rapl;
pub mod register;
pub mod thermal;
pub mod units;

// Re-export for convenience
pub use arch::RegisterMap;
pub use register::{extract_field, BitField, FieldError, RegisterLayout};
pub use units::{decode_units, scale, ScalingUnits};
