//! Worker registry and assignment
//!
//! The registry holds one record per registered worker, in registration
//! order. Each record owns the connection the worker registered on; that
//! connection doubles as the probe channel. A failed probe drops the record
//! and with it the connection.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use switchboard_common::error::{Result, SwitchboardError};
use switchboard_common::net::{read_message, within};
use switchboard_common::METRICS;
use switchboard_proto::{Availability, ProbeReply, PING, PROBE_REPLY_BUFFER_SIZE};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A registered worker
#[derive(Debug)]
pub struct WorkerRecord<S> {
    /// Identifier used in logs
    pub id: Uuid,

    /// Where clients reach the worker
    pub address: SocketAddr,

    /// Availability as of the last successful probe
    pub availability: Availability,

    /// When the worker registered
    pub registered_at: Instant,

    /// When the worker last answered a probe
    pub last_probe: Option<Instant>,

    connection: S,
}

/// Read-only view of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub id: Uuid,
    pub address: SocketAddr,
    pub availability: Availability,
    /// Time since registration
    pub registered_for: Duration,
}

impl<S> WorkerRecord<S> {
    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            id: self.id,
            address: self.address,
            availability: self.availability,
            registered_for: self.registered_at.elapsed(),
        }
    }
}

/// Registry of connected workers.
///
/// Owned by the authority's accept loop, which is its only writer, so it
/// carries no lock.
pub struct Registry<S = TcpStream> {
    workers: Vec<WorkerRecord<S>>,
    probe_timeout: Option<Duration>,
}

impl<S> Registry<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create an empty registry. `probe_timeout` of `None` lets a probe
    /// block until the worker answers or disconnects.
    pub fn new(probe_timeout: Option<Duration>) -> Self {
        Self {
            workers: Vec::new(),
            probe_timeout,
        }
    }

    /// Register a worker reachable at `host:port`, keeping `connection` as
    /// its probe channel. The record starts out free.
    pub fn register(&mut self, connection: S, host: IpAddr, port: u16) -> Result<&WorkerRecord<S>> {
        if port == 0 {
            METRICS.authority.registrations_rejected.inc();
            return Err(SwitchboardError::registration(format!(
                "worker at {} claimed port 0",
                host
            )));
        }

        let record = WorkerRecord {
            id: Uuid::new_v4(),
            address: SocketAddr::new(host, port),
            availability: Availability::Free,
            registered_at: Instant::now(),
            last_probe: None,
            connection,
        };

        info!("Worker registered: {} at {}", record.id, record.address);

        self.workers.push(record);
        METRICS.authority.registrations_total.inc();
        METRICS.authority.registered_workers.set(self.workers.len() as i64);

        let index = self.workers.len() - 1;
        Ok(&self.workers[index])
    }

    /// Probe every worker in registration order.
    ///
    /// Workers whose probe fails (send error, receive error, end of stream or
    /// timeout) are removed. One slow worker delays every worker after it.
    pub async fn probe_all(&mut self) {
        let mut index = 0;

        while index < self.workers.len() {
            let limit = self.probe_timeout;
            let record = &mut self.workers[index];

            match probe(&mut record.connection, limit).await {
                Ok(reply) => {
                    if reply == ProbeReply::Unrecognized {
                        warn!(
                            "Worker {} at {} sent an unrecognized probe reply, treating as FREE",
                            record.id, record.address
                        );
                    }
                    record.availability = reply.availability();
                    record.last_probe = Some(Instant::now());
                    debug!("Worker {} at {} -> {}", record.id, record.address, record.availability);
                    index += 1;
                }
                Err(e) => {
                    let evicted = self.workers.remove(index);
                    METRICS.authority.probe_evictions.inc();
                    let age = evicted.registered_at.elapsed();
                    if e.is_disconnect() {
                        info!(
                            "Worker {} at {} disconnected after {:?}, removing",
                            evicted.id, evicted.address, age
                        );
                    } else {
                        warn!(
                            "Worker {} at {} failed its probe after {:?} registered, removing: {}",
                            evicted.id, evicted.address, age, e
                        );
                    }
                }
            }
        }

        METRICS.authority.registered_workers.set(self.workers.len() as i64);
    }

    /// Probe every worker, then pick the first free one in registration
    /// order.
    ///
    /// Nothing is reserved: until the chosen worker sees its client connect
    /// it keeps answering FREE, so a second call in that window returns the
    /// same address.
    pub async fn assign(&mut self) -> Option<SocketAddr> {
        self.probe_all().await;

        let selected = self.first_free();
        match selected {
            Some(address) => {
                METRICS.authority.assignments_total.inc();
                info!("Assigned worker at {}", address);
            }
            None => {
                METRICS.authority.no_workers_available.inc();
                info!("No free workers among {} registered", self.workers.len());
            }
        }
        selected
    }

    /// First worker whose cached availability is free, without probing
    pub fn first_free(&self) -> Option<SocketAddr> {
        self.workers
            .iter()
            .find(|w| w.availability.is_free())
            .map(|w| w.address)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Current records in registration order
    pub fn snapshot(&self) -> Vec<WorkerSnapshot> {
        self.workers.iter().map(WorkerRecord::snapshot).collect()
    }
}

/// Send one probe and classify the answer
async fn probe<S>(connection: &mut S, limit: Option<Duration>) -> Result<ProbeReply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    METRICS.authority.probes_total.inc();
    let timer = METRICS.authority.probe_duration.start_timer();

    let reply = within(limit, "probe", async {
        connection.write_all(PING).await?;
        let reply = read_message(connection, PROBE_REPLY_BUFFER_SIZE).await?;
        Ok::<_, SwitchboardError>(ProbeReply::classify(&reply))
    })
    .await;

    timer.observe_duration();
    reply
}
