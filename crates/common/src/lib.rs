//! Switchboard common library
//!
//! This crate contains shared code used across Switchboard components.

pub mod config;
pub mod error;
pub mod metrics;
pub mod net;
pub mod telemetry;

// Re-export commonly used types
pub use config::SwitchboardConfig;
pub use error::{Result, SwitchboardError};
pub use metrics::{MetricsRegistry, METRICS};
