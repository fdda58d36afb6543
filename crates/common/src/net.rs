//! Socket helpers shared by every role
//!
//! The protocol has no framing: one write on one side maps to one read on the
//! other. These helpers perform exactly one read and optionally bound an
//! operation in time.

use crate::error::{Result, SwitchboardError};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read a single message of at most `capacity` bytes.
///
/// A zero-length read means the peer closed the connection and is reported
/// as a connection error.
pub async fn read_message<R>(reader: &mut R, capacity: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; capacity];
    let n = reader.read(&mut buffer).await?;
    if n == 0 {
        return Err(SwitchboardError::connection("peer closed the connection"));
    }
    buffer.truncate(n);
    Ok(buffer)
}

/// Run `fut`, failing with a timeout error after `limit`. `None` waits forever.
pub async fn within<F, T>(limit: Option<Duration>, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SwitchboardError::timeout(format!("{} after {:?}", what, limit)))?,
        None => fut.await,
    }
}
