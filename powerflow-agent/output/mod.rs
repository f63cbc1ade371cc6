//! Rendering of decoded readings
//!
//! Text and structured output are two views of the same readings; neither
//! performs register access.

pub mod schema;
pub mod structured;
pub mod text;

use std::time::{SystemTime, UNIX_EPOCH};

pub use structured::{ObjectBuilder, StructuredValue};

pub fn socket_key(socket: u32) -> String {
    format!("socket_{socket}")
}

pub fn timestamp_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

/// Top-level object with the fields every structured result carries
pub fn envelope(host: &str) -> ObjectBuilder {
    StructuredValue::builder()
        .field("host", host)
        .field("timestamp_us", timestamp_us())
}
