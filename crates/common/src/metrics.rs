//! Metrics collection for Switchboard
//!
//! This module provides Prometheus metrics for observability. The authority
//! and the worker share one registry type; each process only touches its own
//! half.

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics registry for Switchboard
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub authority: AuthorityMetrics,
    pub worker: WorkerMetrics,
}

/// Routing authority metrics
#[derive(Debug, Clone)]
pub struct AuthorityMetrics {
    /// Accepted worker registrations
    pub registrations_total: IntCounter,

    /// Registrations rejected for a missing or invalid port
    pub registrations_rejected: IntCounter,

    /// Probes sent
    pub probes_total: IntCounter,

    /// Records evicted after a failed probe
    pub probe_evictions: IntCounter,

    /// Probe round-trip time
    pub probe_duration: Histogram,

    /// Clients handed a worker
    pub assignments_total: IntCounter,

    /// Clients turned away with NO_SERVERS_AVAILABLE
    pub no_workers_available: IntCounter,

    /// Workers currently in the registry
    pub registered_workers: IntGauge,
}

/// Worker-side metrics
#[derive(Debug, Clone)]
pub struct WorkerMetrics {
    /// Client sessions accepted
    pub sessions_total: IntCounter,

    /// 1 while a session is attached
    pub session_active: IntGauge,

    /// Probes answered
    pub pings_answered: IntCounter,

    /// Payload bytes echoed back to clients
    pub bytes_echoed: IntCounter,
}

lazy_static! {
    /// Global metrics registry instance
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid counter definition");
    registry
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

fn gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("valid gauge definition");
    registry
        .register(Box::new(gauge.clone()))
        .expect("gauge registered once");
    gauge
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let probe_duration = Histogram::with_opts(
            HistogramOpts::new(
                "authority_probe_duration_seconds",
                "Round-trip time of one worker probe",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )
        .expect("valid histogram definition");
        registry
            .register(Box::new(probe_duration.clone()))
            .expect("histogram registered once");

        let authority = AuthorityMetrics {
            registrations_total: counter(
                &registry,
                "authority_registrations_total",
                "Total number of accepted worker registrations",
            ),
            registrations_rejected: counter(
                &registry,
                "authority_registrations_rejected_total",
                "Total number of rejected worker registrations",
            ),
            probes_total: counter(
                &registry,
                "authority_probes_total",
                "Total number of probes sent to workers",
            ),
            probe_evictions: counter(
                &registry,
                "authority_probe_evictions_total",
                "Total number of workers evicted after a failed probe",
            ),
            probe_duration,
            assignments_total: counter(
                &registry,
                "authority_assignments_total",
                "Total number of clients assigned to a worker",
            ),
            no_workers_available: counter(
                &registry,
                "authority_no_workers_available_total",
                "Total requests rejected due to no free workers",
            ),
            registered_workers: gauge(
                &registry,
                "authority_registered_workers",
                "Current number of registered workers",
            ),
        };

        let worker = WorkerMetrics {
            sessions_total: counter(
                &registry,
                "worker_sessions_total",
                "Total number of client sessions accepted",
            ),
            session_active: gauge(
                &registry,
                "worker_session_active",
                "Whether a client session is currently attached",
            ),
            pings_answered: counter(
                &registry,
                "worker_pings_answered_total",
                "Total number of probes answered",
            ),
            bytes_echoed: counter(
                &registry,
                "worker_bytes_echoed_total",
                "Total number of payload bytes echoed to clients",
            ),
        };

        MetricsRegistry {
            registry,
            authority,
            worker,
        }
    }

    /// Gather all metrics as text
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            return format!("# failed to encode metrics: {}\n", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
