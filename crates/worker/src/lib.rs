//! Switchboard Worker
//!
//! Backend that serves one chat client at a time and tells the routing
//! authority, on request, whether it is currently serving one.

pub mod probe;
pub mod registration;
pub mod session;
pub mod state;

pub use state::{SessionGuard, SessionState};

use std::net::SocketAddr;
use std::sync::Arc;
use switchboard_common::error::Result;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

/// A registered worker, ready to run
pub struct Worker {
    listener: TcpListener,
    probe_channel: TcpStream,
    state: Arc<SessionState>,
}

impl Worker {
    /// Bind the client-facing listener, then register with the authority.
    ///
    /// Binding first means the authority never learns about a port that is
    /// not listening yet. Port 0 binds an ephemeral port and registers the
    /// one the OS picked.
    pub async fn start(authority: &str, bind: SocketAddr) -> Result<Self> {
        let listener = session::bind_listener(bind)?;
        let local = listener.local_addr()?;
        info!("Worker listening for clients on {}", local);

        let probe_channel = registration::register(authority, local.port()).await?;

        Ok(Self {
            listener,
            probe_channel,
            state: Arc::new(SessionState::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> Arc<SessionState> {
        Arc::clone(&self.state)
    }

    /// Serve sessions and probes.
    ///
    /// Losing the authority only ends the probe task: the worker is no longer
    /// assignable but keeps serving the session in progress and anyone who
    /// still connects directly. Returns only if the session loop fails.
    pub async fn run(self) -> Result<()> {
        let Worker {
            listener,
            mut probe_channel,
            state,
        } = self;

        let probe_state = Arc::clone(&state);
        let probes = tokio::spawn(async move {
            if let Err(e) = probe::respond_to_probes(&mut probe_channel, &probe_state).await {
                warn!("{}; no longer assignable, still serving clients", e);
            }
        });

        let result = session::serve_sessions(&listener, &state).await;
        probes.abort();

        if let Err(e) = &result {
            error!("Worker stopped: {}", e);
        }
        result
    }
}
