use std::io;
use thiserror::Error;

use once_cell::sync::Lazy;

#[derive(Error, Debug)]
pub enum PowerflowError {
    #[error("Architecture detection failed: {0}")]
    ArchitectureDetection(String),

    #[error("Unsupported architecture: {0}")]
    ArchitectureUnsupported(String),

    #[error("Capability not implemented on {arch}: {capability}")]
    CapabilityUnimplemented {
        capability: &'static str,
        arch: String,
    },

    #[error("Register access failed: {0}")]
    RegisterAccess(String),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Output serialization failed: {0}")]
    OutputSerialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Malformed register field: {0}")]
    Field(#[from] powerflow_raw::FieldError),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, PowerflowError>;

impl PowerflowError {
    /// Stable nonzero status code for the call surface
    pub fn code(&self) -> i32 {
        match self {
            PowerflowError::ArchitectureDetection(_) => 1,
            PowerflowError::ArchitectureUnsupported(_) => 2,
            PowerflowError::CapabilityUnimplemented { .. } => 3,
            PowerflowError::RegisterAccess(_) => 4,
            PowerflowError::InvalidTopology(_) => 5,
            PowerflowError::OutputSerialization(_) => 6,
            PowerflowError::InvalidArgument(_) => 7,
            PowerflowError::Field(_) => 8,
            PowerflowError::IoError(_) => 9,
        }
    }
}

/// Map a call result onto the `0` / nonzero return convention
pub fn status<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}

pub static HOSTNAME: Lazy<String> = Lazy::new(|| {
    nix::unistd::gethostname()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
});

/// Central error sink: every failure surfaced by the engine passes through here once
pub fn report_error(err: &PowerflowError, call_site: &'static str) {
    tracing::error!(
        code = err.code(),
        host = HOSTNAME.as_str(),
        call_site,
        "{err}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_nonzero_and_distinct() {
        let errors = [
            PowerflowError::ArchitectureDetection(String::new()),
            PowerflowError::ArchitectureUnsupported(String::new()),
            PowerflowError::CapabilityUnimplemented {
                capability: "get_gpu_power_ratio",
                arch: String::new(),
            },
            PowerflowError::RegisterAccess(String::new()),
            PowerflowError::InvalidTopology(String::new()),
            PowerflowError::OutputSerialization(String::new()),
            PowerflowError::InvalidArgument(String::new()),
        ];

        let mut codes: Vec<i32> = errors.iter().map(PowerflowError::code).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_status_convention() {
        let ok: Result<()> = Ok(());
        let err: Result<()> = Err(PowerflowError::InvalidTopology("0 sockets".into()));
        assert_eq!(status(&ok), 0);
        assert_eq!(status(&err), 5);
    }

    #[test]
    fn test_unimplemented_display() {
        let err = PowerflowError::CapabilityUnimplemented {
            capability: "get_gpu_power_ratio",
            arch: "Intel 06_3E".into(),
        };
        assert!(err.to_string().contains("get_gpu_power_ratio"));
    }
}
