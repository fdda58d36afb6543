//! Common error types for Switchboard
//!
//! This module defines the error type shared by the authority, workers and
//! the client. Network failures are mostly handled where they happen; the
//! variants here are what escapes to a caller or to `main`.

use std::net::AddrParseError;
use switchboard_proto::ProtocolError;
use thiserror::Error;

/// Main error type for Switchboard
#[derive(Error, Debug)]
pub enum SwitchboardError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed messages on the wire
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Rejected worker registration
    #[error("Registration rejected: {0}")]
    Registration(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AddrParseError> for SwitchboardError {
    fn from(err: AddrParseError) -> Self {
        SwitchboardError::Parse(err.to_string())
    }
}

impl SwitchboardError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        SwitchboardError::Config(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        SwitchboardError::Connection(msg.into())
    }

    /// Create a registration error
    pub fn registration(msg: impl Into<String>) -> Self {
        SwitchboardError::Registration(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        SwitchboardError::Timeout(msg.into())
    }

    /// Whether the error means the peer is gone rather than misbehaving
    pub fn is_disconnect(&self) -> bool {
        match self {
            SwitchboardError::Connection(_) => true,
            SwitchboardError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// Result type alias for Switchboard operations
pub type Result<T> = std::result::Result<T, SwitchboardError>;
