use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use crate::error::{PowerflowError, Result};

/// Reads and writes raw 64-bit registers on a logical CPU
///
/// The production implementation is [`Msr`]; tests substitute an in-memory map.
pub trait RegisterAccess: Send + Sync {
    fn read(&self, cpu: u32, addr: u64) -> Result<u64>;

    fn write(&self, cpu: u32, addr: u64, value: u64) -> Result<()>;
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &T {
    fn read(&self, cpu: u32, addr: u64) -> Result<u64> {
        (**self).read(cpu, addr)
    }

    fn write(&self, cpu: u32, addr: u64, value: u64) -> Result<()> {
        (**self).write(cpu, addr, value)
    }
}

pub struct MsrHandle {
    file: File,
    writable: bool,
    cpu_id: u32,
}

impl MsrHandle {
    pub fn new(cpu: u32) -> Result<Self> {
        let path = format!("/dev/cpu/{cpu}/msr");
        let (file, writable) = match OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&path)
        {
            Ok(file) => (file, true),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                tracing::warn!("{path} is not writable, opening read-only");
                let file = File::open(&path).map_err(|e| {
                    PowerflowError::RegisterAccess(format!(
                        "Failed to open {path} for CPU {cpu}: {e}"
                    ))
                })?;
                (file, false)
            }
            Err(e) => {
                return Err(PowerflowError::RegisterAccess(format!(
                    "Failed to open {path} for CPU {cpu}: {e}"
                )))
            }
        };

        tracing::info!("Opened MSR handle {} for core {}", file.as_raw_fd(), cpu);

        Ok(Self {
            file,
            writable,
            cpu_id: cpu,
        })
    }

    pub fn read(&self, addr: u64) -> Result<u64> {
        let mut buffer = [0u8; 8];
        self.file.read_exact_at(&mut buffer, addr).map_err(|e| {
            PowerflowError::RegisterAccess(format!(
                "Failed to read MSR 0x{:X} on CPU {}: {}",
                addr, self.cpu_id, e
            ))
        })?;

        let value = u64::from_ne_bytes(buffer);
        tracing::debug!(
            "MSR read: CPU {} MSR 0x{:08x} = 0x{:016x}",
            self.cpu_id,
            addr,
            value
        );
        Ok(value)
    }

    pub fn write(&self, addr: u64, value: u64) -> Result<()> {
        if !self.writable {
            return Err(PowerflowError::RegisterAccess(format!(
                "MSR device for CPU {} was opened read-only; cannot write 0x{:X}",
                self.cpu_id, addr
            )));
        }

        self.file
            .write_all_at(&value.to_ne_bytes(), addr)
            .map_err(|e| {
                PowerflowError::RegisterAccess(format!(
                    "Failed to write MSR 0x{:X} on CPU {}: {}",
                    addr, self.cpu_id, e
                ))
            })?;

        tracing::debug!(
            "MSR write: CPU {} MSR 0x{:08x} = 0x{:016x}",
            self.cpu_id,
            addr,
            value
        );
        Ok(())
    }
}

/// Process-wide cache of `/dev/cpu/*/msr` handles
pub struct Msr {
    handles: RwLock<HashMap<u32, Arc<MsrHandle>>>,
}

impl Msr {
    fn new() -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
        }
    }

    pub fn instance() -> &'static Msr {
        static INSTANCE: Lazy<Msr> = Lazy::new(Msr::new);
        &INSTANCE
    }

    fn get_handle(&self, cpu: u32) -> Result<Arc<MsrHandle>> {
        {
            let handles = self.handles.read();
            if let Some(handle) = handles.get(&cpu) {
                return Ok(Arc::clone(handle));
            }
        }

        let mut handles = self.handles.write();
        if let Some(handle) = handles.get(&cpu) {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(MsrHandle::new(cpu)?);
        handles.insert(cpu, Arc::clone(&handle));
        Ok(handle)
    }
}

impl RegisterAccess for Msr {
    fn read(&self, cpu: u32, addr: u64) -> Result<u64> {
        let handle = self.get_handle(cpu)?;
        handle.read(addr)
    }

    fn write(&self, cpu: u32, addr: u64, value: u64) -> Result<()> {
        let handle = self.get_handle(cpu)?;
        handle.write(addr, value)
    }
}

/// Check the msr driver is loaded and readable before any capability runs
pub fn check_permissions() -> Result<()> {
    let msr_path = "/dev/cpu/0/msr";
    if std::fs::metadata(msr_path).is_err() {
        return Err(PowerflowError::RegisterAccess(format!(
            "Cannot access {msr_path}; the msr kernel module may not be loaded (sudo modprobe msr)"
        )));
    }

    if let Err(e) = File::open(msr_path) {
        if e.kind() == ErrorKind::PermissionDenied {
            return Err(PowerflowError::RegisterAccess(format!(
                "Permission denied accessing {msr_path}; run as root or grant CAP_SYS_RAWIO"
            )));
        }
    }

    Ok(())
}
