//! Switchboard routing authority
//!
//! Keeps the registry of connected workers and hands each client the first
//! worker that reports itself free.

pub mod registry;
pub mod server;

pub use registry::{Registry, WorkerRecord, WorkerSnapshot};
pub use server::Authority;
