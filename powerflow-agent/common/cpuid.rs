/// Raw CPUID output registers: (eax, ebx, ecx, edx)
pub type CpuidRegisters = (u32, u32, u32, u32);

#[cfg(target_arch = "x86_64")]
pub fn cpuid(eax: u32, ecx: u32) -> Option<CpuidRegisters> {
    let mut ebx: u32;
    let mut edx: u32;
    let mut eax_out = eax;
    let mut ecx_out = ecx;

    unsafe {
        std::arch::asm!(
            "mov {0:r}, rbx",
            "cpuid",
            "xchg {0:r}, rbx",
            out(reg) ebx,
            inout("eax") eax_out,
            inout("ecx") ecx_out,
            out("edx") edx,
            options(nostack, preserves_flags)
        );
    }

    Some((eax_out, ebx, ecx_out, edx))
}

#[cfg(not(target_arch = "x86_64"))]
pub fn cpuid(_eax: u32, _ecx: u32) -> Option<CpuidRegisters> {
    None
}

/// Vendor identification string from leaf 0, assembled in EBX, EDX, ECX order
pub fn vendor_string(ebx: u32, ecx: u32, edx: u32) -> String {
    let mut bytes = Vec::with_capacity(12);
    bytes.extend_from_slice(&ebx.to_le_bytes());
    bytes.extend_from_slice(&edx.to_le_bytes());
    bytes.extend_from_slice(&ecx.to_le_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// General-purpose performance counters per logical CPU (leaf 0xA, EAX[15:8])
pub fn perfmon_counter_count() -> Option<usize> {
    let (max_leaf, _ebx, _ecx, _edx) = cpuid(0, 0)?;
    if max_leaf < 0xA {
        return None;
    }
    let (eax, _ebx, _ecx, _edx) = cpuid(0xA, 0)?;
    Some(((eax >> 8) & 0xFF) as usize)
}
