pub mod arch;
pub mod cpuid;
pub mod msr;

pub use arch::{identify, ArchitectureId, Vendor};
pub use msr::{Msr, MsrHandle, RegisterAccess};
