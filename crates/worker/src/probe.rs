//! Probe responder
//!
//! Answers every PING arriving on the registration connection with the
//! worker's current availability.

use crate::state::SessionState;
use switchboard_common::error::{Result, SwitchboardError};
use switchboard_common::net::read_message;
use switchboard_common::METRICS;
use switchboard_proto::{is_ping, PING_BUFFER_SIZE};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Serve probes until the authority closes the channel.
///
/// Anything that is not a PING is ignored. The only way out is an error: once
/// the authority has dropped the channel this worker is no longer registered
/// and will never be assigned again.
pub async fn respond_to_probes<S>(channel: &mut S, state: &SessionState) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let message = read_message(channel, PING_BUFFER_SIZE).await.map_err(|e| {
            SwitchboardError::connection(format!("probe channel to authority lost: {}", e))
        })?;

        if !is_ping(&message) {
            trace!("Ignoring {} bytes on probe channel", message.len());
            continue;
        }

        let availability = state.observe();
        channel.write_all(availability.as_reply()).await?;
        METRICS.worker.pings_answered.inc();
        debug!("Authority probe -> {}", availability);
    }
}
