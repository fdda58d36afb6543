//! Switchboard wire protocol
//!
//! Plain-text messages exchanged between workers, clients and the routing
//! authority. There is no framing: every message is written with a single
//! write and read back with a single read into a fixed-size buffer, so the
//! buffer sizes below are part of the protocol.

use std::fmt;
use thiserror::Error;

/// Port the routing authority listens on unless configured otherwise.
pub const DEFAULT_AUTHORITY_PORT: u16 = 9000;

/// Probe request sent by the authority on a worker's registration connection.
pub const PING: &[u8] = b"PING";

/// Marker a worker answers with while a client session is attached.
pub const BUSY: &[u8] = b"BUSY";

/// Marker a worker answers with while idle.
pub const FREE: &[u8] = b"FREE";

/// Assignment request a client sends to the authority.
pub const CLIENT_REQUEST: &[u8] = b"CLIENT";

const REGISTRATION_TAG: &str = "SERVER";
const CONNECT_TAG: &str = "CONNECT";
const NO_SERVERS_AVAILABLE: &str = "NO_SERVERS_AVAILABLE";
const CLIENT_TAG: &str = "CLIENT";

/// Read size for the first message on a connection accepted by the authority.
pub const REQUEST_BUFFER_SIZE: usize = 127;

/// Read size for a worker's answer to a probe.
pub const PROBE_REPLY_BUFFER_SIZE: usize = 16;

/// Read size for probe requests arriving at a worker.
pub const PING_BUFFER_SIZE: usize = 16;

/// Read size for the authority's answer to an assignment request.
pub const ASSIGNMENT_BUFFER_SIZE: usize = 64;

/// Read size for one chunk of a client session.
pub const SESSION_BUFFER_SIZE: usize = 256;

/// Errors raised while decoding protocol messages
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Registration without a port
    #[error("registration is missing a port")]
    MissingPort,

    /// Registration whose port is not in 1..=65535
    #[error("registration carries an invalid port: {0:?}")]
    InvalidPort(String),

    /// Message that is neither a registration nor an assignment request
    #[error("unrecognized request: {0:?}")]
    UnknownRequest(String),

    /// Authority reply that is neither CONNECT nor NO_SERVERS_AVAILABLE
    #[error("unrecognized assignment response: {0:?}")]
    UnknownResponse(String),
}

/// Availability of a worker, as reported by the worker itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Availability {
    /// No client attached
    #[default]
    Free,

    /// Exactly one client attached
    Busy,
}

impl Availability {
    /// Bytes a worker writes in answer to a probe
    pub fn as_reply(self) -> &'static [u8] {
        match self {
            Availability::Free => FREE,
            Availability::Busy => BUSY,
        }
    }

    pub fn is_free(self) -> bool {
        self == Availability::Free
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Free => f.write_str("FREE"),
            Availability::Busy => f.write_str("BUSY"),
        }
    }
}

/// First message received by the authority on a freshly accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityRequest {
    /// A worker announcing its client-facing port
    Register { port: u16 },

    /// A client asking for a worker
    Assign,
}

impl AuthorityRequest {
    /// Decode a request.
    ///
    /// Surrounding whitespace is ignored. A registration must lead with
    /// `SERVER`; anything else containing `CLIENT` is treated as an
    /// assignment request, which keeps older clients that pad or prefix the
    /// keyword working.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim();

        if let Some(rest) = text.strip_prefix(REGISTRATION_TAG) {
            let port = rest.trim();
            if port.is_empty() {
                return Err(ProtocolError::MissingPort);
            }
            return match port.parse::<u16>() {
                Ok(port) if port > 0 => Ok(AuthorityRequest::Register { port }),
                _ => Err(ProtocolError::InvalidPort(port.to_string())),
            };
        }

        if text.contains(CLIENT_TAG) {
            return Ok(AuthorityRequest::Assign);
        }

        Err(ProtocolError::UnknownRequest(text.to_string()))
    }

    /// Encode for the wire
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AuthorityRequest::Register { port } => {
                format!("{} {}", REGISTRATION_TAG, port).into_bytes()
            }
            AuthorityRequest::Assign => CLIENT_REQUEST.to_vec(),
        }
    }
}

/// Authority's answer to an assignment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentResponse {
    /// Connect to the worker listening on this port
    Connect(u16),

    /// Every registered worker is busy, or none is registered
    NoServersAvailable,
}

impl AssignmentResponse {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AssignmentResponse::Connect(port) => format!("{} {}", CONNECT_TAG, port).into_bytes(),
            AssignmentResponse::NoServersAvailable => NO_SERVERS_AVAILABLE.as_bytes().to_vec(),
        }
    }

    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

        if text.contains(NO_SERVERS_AVAILABLE) {
            return Ok(AssignmentResponse::NoServersAvailable);
        }

        if let Some(rest) = text.strip_prefix(CONNECT_TAG) {
            return match rest.trim().parse::<u16>() {
                Ok(port) if port > 0 => Ok(AssignmentResponse::Connect(port)),
                _ => Err(ProtocolError::UnknownResponse(text.to_string())),
            };
        }

        Err(ProtocolError::UnknownResponse(text.to_string()))
    }
}

/// Classification of a worker's answer to a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeReply {
    Busy,
    Free,
    /// Neither marker was present
    Unrecognized,
}

impl ProbeReply {
    /// Classify a reply by the marker it contains. `BUSY` wins over `FREE`
    /// when a reply carries both.
    pub fn classify(raw: &[u8]) -> Self {
        if contains(raw, BUSY) {
            ProbeReply::Busy
        } else if contains(raw, FREE) {
            ProbeReply::Free
        } else {
            ProbeReply::Unrecognized
        }
    }

    /// Availability recorded for this reply. Unrecognized replies count as
    /// free: the worker answered, so it is alive, and only an explicit BUSY
    /// takes it out of rotation.
    pub fn availability(self) -> Availability {
        match self {
            ProbeReply::Busy => Availability::Busy,
            ProbeReply::Free | ProbeReply::Unrecognized => Availability::Free,
        }
    }
}

/// Whether a chunk read from the probe channel carries a probe request
pub fn is_ping(raw: &[u8]) -> bool {
    contains(raw, PING)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}
