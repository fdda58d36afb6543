//! Registration with the routing authority

use switchboard_common::error::{Result, SwitchboardError};
use switchboard_proto::AuthorityRequest;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::info;

/// Connect to the authority and announce the client-facing `port`.
///
/// The returned connection stays open for the life of the worker; the
/// authority probes availability over it.
pub async fn register(authority: &str, port: u16) -> Result<TcpStream> {
    let mut stream = TcpStream::connect(authority).await.map_err(|e| {
        SwitchboardError::connection(format!("Failed to connect to authority {}: {}", authority, e))
    })?;

    stream
        .write_all(&AuthorityRequest::Register { port }.encode())
        .await?;

    info!("Registered with routing authority at {} as port {}", authority, port);
    Ok(stream)
}
