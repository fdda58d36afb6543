//! Rendezvous listener
//!
//! Workers and clients both connect to the same port. The first message on a
//! connection decides what it is: a registration keeps the connection in the
//! registry, an assignment request gets one answer and is closed. Connections
//! are handled one at a time, in accept order.

use crate::registry::Registry;
use std::net::SocketAddr;
use std::time::Duration;
use switchboard_common::config::CoordinatorConfig;
use switchboard_common::error::Result;
use switchboard_common::net::{read_message, within};
use switchboard_common::METRICS;
use switchboard_proto::{AssignmentResponse, AuthorityRequest, ProtocolError, REQUEST_BUFFER_SIZE};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Pause after a failed accept before accepting again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// The routing authority
pub struct Authority {
    listener: TcpListener,
    registry: Registry<TcpStream>,
    handshake_timeout: Option<Duration>,
}

impl Authority {
    /// Bind the rendezvous port
    pub async fn bind(addr: SocketAddr, config: &CoordinatorConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Routing authority listening on {}", listener.local_addr()?);

        if config.probe_timeout().is_none() {
            warn!("Probe timeout disabled; a worker that never answers will stall every assignment");
        }

        Ok(Self {
            listener,
            registry: Registry::new(config.probe_timeout()),
            handshake_timeout: config.handshake_timeout(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &Registry<TcpStream> {
        &self.registry
    }

    /// Accept and handle connections until the task is dropped
    pub async fn serve(&mut self) -> Result<()> {
        loop {
            let result = self.accept_one().await;
            back_off_on_error(result).await;
        }
    }

    /// Accept one connection and handle it to completion.
    ///
    /// Only an accept failure is returned; problems with the connection
    /// itself are logged and the connection dropped.
    pub async fn accept_one(&mut self) -> Result<()> {
        let (stream, peer) = self.listener.accept().await?;
        self.handle_connection(stream, peer).await;
        Ok(())
    }

    async fn handle_connection(&mut self, mut stream: TcpStream, peer: SocketAddr) {
        let message = match within(
            self.handshake_timeout,
            "first message",
            read_message(&mut stream, REQUEST_BUFFER_SIZE),
        )
        .await
        {
            Ok(message) => message,
            Err(e) => {
                debug!("Dropping connection from {}: {}", peer, e);
                return;
            }
        };

        match AuthorityRequest::parse(&message) {
            Ok(AuthorityRequest::Register { port }) => {
                if let Err(e) = self.registry.register(stream, peer.ip(), port) {
                    warn!("Rejected registration from {}: {}", peer, e);
                }
            }
            Ok(AuthorityRequest::Assign) => {
                info!("Client request from {}, probing {} workers", peer, self.registry.len());
                let response = self.assign().await;
                if let Err(e) = stream.write_all(&response.encode()).await {
                    warn!("Failed to answer client {}: {}", peer, e);
                }
                // the client connection closes on drop
            }
            Err(e) => {
                if matches!(e, ProtocolError::MissingPort | ProtocolError::InvalidPort(_)) {
                    METRICS.authority.registrations_rejected.inc();
                }
                warn!("Rejected connection from {}: {}", peer, e);
            }
        }
    }

    /// Probe every worker and answer with the first free one
    pub async fn assign(&mut self) -> AssignmentResponse {
        match self.registry.assign().await {
            Some(address) => AssignmentResponse::Connect(address.port()),
            None => AssignmentResponse::NoServersAvailable,
        }
    }
}

async fn back_off_on_error(result: Result<()>) {
    if let Err(e) = result {
        error!("Accept failed: {}", e);
        tokio::time::sleep(ACCEPT_BACKOFF).await;
    }
}
