// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod backend;
pub mod common;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod readings;
pub mod registry;
pub mod topology;

pub use backend::Capabilities;
pub use config::Config;
pub use engine::{Capability, Powerflow};
pub use error::{report_error, status, PowerflowError, Result};
pub use output::StructuredValue;
