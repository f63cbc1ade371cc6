// CPU architecture identification

use std::fmt;

use crate::common::cpuid;
use crate::error::{PowerflowError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Intel,
    Amd,
    Other,
}

impl Vendor {
    pub fn from_vendor_string(vendor: &str) -> Self {
        match vendor {
            "GenuineIntel" => Vendor::Intel,
            "AuthenticAMD" => Vendor::Amd,
            _ => Vendor::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Vendor::Intel => "Intel",
            Vendor::Amd => "AMD",
            Vendor::Other => "Unknown",
        }
    }
}

/// Immutable discriminant of the installed processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchitectureId {
    pub vendor: Vendor,
    pub family: u32,
    pub model: u32,
    pub stepping: u32,
}

impl ArchitectureId {
    /// Decode display family/model/stepping from a CPUID leaf 1 EAX signature
    pub fn from_signature(vendor: Vendor, eax: u32) -> Self {
        let stepping = eax & 0xF;
        let model = (eax >> 4) & 0xF;
        let family = (eax >> 8) & 0xF;
        let extended_model = (eax >> 16) & 0xF;
        let extended_family = (eax >> 20) & 0xFF;

        let display_family = if family == 0xF {
            family + extended_family
        } else {
            family
        };

        let display_model = if family == 0x6 || family == 0xF {
            (extended_model << 4) + model
        } else {
            model
        };

        Self {
            vendor,
            family: display_family,
            model: display_model,
            stepping,
        }
    }
}

impl fmt::Display for ArchitectureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02X}_{:02X} (stepping {})",
            self.vendor.name(),
            self.family,
            self.model,
            self.stepping
        )
    }
}

/// Probe the installed processor via CPUID leaves 0 and 1
pub fn identify() -> Result<ArchitectureId> {
    let (max_leaf, ebx, ecx, edx) = cpuid::cpuid(0, 0).ok_or_else(|| {
        PowerflowError::ArchitectureDetection("CPUID is not available on this target".into())
    })?;

    if max_leaf < 1 {
        return Err(PowerflowError::ArchitectureDetection(format!(
            "CPUID leaf 1 not supported (max leaf {max_leaf})"
        )));
    }

    let vendor = Vendor::from_vendor_string(&cpuid::vendor_string(ebx, ecx, edx));
    let (eax, _ebx, _ecx, _edx) = cpuid::cpuid(1, 0).ok_or_else(|| {
        PowerflowError::ArchitectureDetection("CPUID leaf 1 unavailable".into())
    })?;

    let id = ArchitectureId::from_signature(vendor, eax);
    tracing::info!("Detected CPU architecture: {}", id);

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ivybridge_ep_signature() {
        // E5-2695 v2: family 6, model 0x3E, stepping 4
        let id = ArchitectureId::from_signature(Vendor::Intel, 0x0003_06E4);
        assert_eq!(id.family, 0x06);
        assert_eq!(id.model, 0x3E);
        assert_eq!(id.stepping, 4);
        assert_eq!(id.to_string(), "Intel 06_3E (stepping 4)");
    }

    #[test]
    fn test_skylake_sp_signature() {
        let id = ArchitectureId::from_signature(Vendor::Intel, 0x0005_0654);
        assert_eq!((id.family, id.model, id.stepping), (0x06, 0x55, 4));
    }

    #[test]
    fn test_extended_family_folding() {
        // AMD Zen 2: base family 0xF, extended family 0x8
        let id = ArchitectureId::from_signature(Vendor::Amd, 0x0083_0F10);
        assert_eq!(id.family, 0x17);
        assert_eq!(id.model, 0x31);
    }

    #[test]
    fn test_vendor_strings() {
        assert_eq!(Vendor::from_vendor_string("GenuineIntel"), Vendor::Intel);
        assert_eq!(Vendor::from_vendor_string("AuthenticAMD"), Vendor::Amd);
        assert_eq!(Vendor::from_vendor_string("HygonGenuine"), Vendor::Other);
    }
}
