//! Client sessions
//!
//! The worker serves one client at a time: the listener has a backlog of one
//! and each accepted session runs to completion before the next accept. The
//! worker reads BUSY from the moment a client is accepted until its
//! disconnect is observed.

use crate::state::SessionState;
use std::net::SocketAddr;
use switchboard_common::error::Result;
use switchboard_common::METRICS;
use switchboard_proto::SESSION_BUFFER_SIZE;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};
use tracing::{debug, info, warn};

/// Bind the client-facing listener with a single-slot backlog
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(1)?)
}

/// Accept clients forever, one session at a time
pub async fn serve_sessions(listener: &TcpListener, state: &SessionState) -> Result<()> {
    loop {
        info!("Waiting for a client");

        let (mut stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept client: {}", e);
                continue;
            }
        };

        let _busy = state.begin_session();
        info!("Client {} connected", peer);

        let echoed = echo(&mut stream).await;
        info!("Client {} disconnected after {} bytes", peer, echoed);
    }
}

/// Echo every chunk back until the client disconnects. Returns the number of
/// bytes echoed.
pub async fn echo<S>(stream: &mut S) -> u64
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = [0u8; SESSION_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match stream.read(&mut buffer).await {
            Ok(0) => return total,
            Ok(n) => n,
            Err(e) => {
                debug!("Session read failed: {}", e);
                return total;
            }
        };

        debug!("[CLIENT]: {}", String::from_utf8_lossy(&buffer[..n]));

        if let Err(e) = stream.write_all(&buffer[..n]).await {
            debug!("Session write failed: {}", e);
            return total;
        }

        total += n as u64;
        METRICS.worker.bytes_echoed.inc_by(n as u64);
    }
}
