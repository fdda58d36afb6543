//! Switchboard client
//!
//! Asks the routing authority for a worker, then talks to that worker over a
//! separate connection.

use std::net::SocketAddr;
use switchboard_common::error::{Result, SwitchboardError};
use switchboard_common::net::read_message;
use switchboard_proto::{
    AssignmentResponse, AuthorityRequest, ASSIGNMENT_BUFFER_SIZE, SESSION_BUFFER_SIZE,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Outcome of an assignment request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Open a session with the worker at this address
    Connect(SocketAddr),

    /// Every worker is busy; try again later
    NoServersAvailable,
}

/// Ask the authority at `authority` (host:port) for a free worker.
///
/// The authority only reports a port; the worker is assumed to live on the
/// host the authority was reached on.
pub async fn request_assignment(authority: &str) -> Result<Assignment> {
    let mut stream = TcpStream::connect(authority).await.map_err(|e| {
        SwitchboardError::connection(format!("Failed to connect to authority {}: {}", authority, e))
    })?;
    let authority_addr = stream.peer_addr()?;

    stream.write_all(&AuthorityRequest::Assign.encode()).await?;
    let reply = read_message(&mut stream, ASSIGNMENT_BUFFER_SIZE).await?;
    debug!("Authority replied {:?}", String::from_utf8_lossy(&reply));

    let assignment = match AssignmentResponse::parse(&reply)? {
        AssignmentResponse::Connect(port) => {
            Assignment::Connect(SocketAddr::new(authority_addr.ip(), port))
        }
        AssignmentResponse::NoServersAvailable => Assignment::NoServersAvailable,
    };
    Ok(assignment)
}

/// Direct session with an assigned worker
pub struct ChatSession {
    stream: TcpStream,
    peer: SocketAddr,
}

impl ChatSession {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            SwitchboardError::connection(format!("Failed to connect to worker {}: {}", addr, e))
        })?;
        info!("Connected to worker at {}", addr);
        Ok(Self { stream, peer: addr })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Send one message and read the worker's reply.
    ///
    /// There is no framing, so the reply is whatever a single read returns;
    /// payloads larger than the worker's read size come back split.
    pub async fn exchange(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.is_empty() {
            return Ok(Vec::new());
        }

        self.stream.write_all(payload).await?;
        read_message(&mut self.stream, SESSION_BUFFER_SIZE).await
    }

    /// End the session. The worker becomes free once it sees the close.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
