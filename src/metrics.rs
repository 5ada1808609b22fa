//! Metrics instrumentation for failover-dns.
//!
//! All metrics are prefixed with `failover_dns.`

use hickory_proto::op::ResponseCode;
use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a served DNS query.
pub fn record_query(handler: &'static str, response_code: ResponseCode, duration: Duration) {
    let result = QueryResult::from(response_code).as_str();

    counter!("failover_dns.query.count", "handler" => handler, "result" => result).increment(1);
    histogram!("failover_dns.query.duration.seconds", "handler" => handler)
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// Answered with NOERROR.
    Success,
    /// Upstream reported the name does not exist.
    NxDomain,
    /// Answered with SERVFAIL.
    ServFail,
    /// Any other response code.
    Other,
}

impl QueryResult {
    fn as_str(self) -> &'static str {
        match self {
            QueryResult::Success => "success",
            QueryResult::NxDomain => "nxdomain",
            QueryResult::ServFail => "servfail",
            QueryResult::Other => "other",
        }
    }
}

impl From<ResponseCode> for QueryResult {
    fn from(code: ResponseCode) -> Self {
        match code {
            ResponseCode::NoError => QueryResult::Success,
            ResponseCode::NXDomain => QueryResult::NxDomain,
            ResponseCode::ServFail => QueryResult::ServFail,
            _ => QueryResult::Other,
        }
    }
}

/// Record a failed upstream exchange.
pub fn record_upstream_failure() {
    counter!("failover_dns.upstream.failure.count").increment(1);
}

/// Record the outcome of one liveness probe.
pub fn record_probe(result: ProbeResult) {
    let result_str = match result {
        ProbeResult::Healthy => "healthy",
        ProbeResult::Unhealthy => "unhealthy",
        ProbeResult::Error => "error",
    };

    counter!("failover_dns.probe.count", "result" => result_str).increment(1);
}

/// Probe outcomes.
#[derive(Debug, Clone, Copy)]
pub enum ProbeResult {
    /// Echo reply received.
    Healthy,
    /// No reply within the timeout.
    Unhealthy,
    /// Probe could not be run.
    Error,
}

/// Record a change of the published answer for a zone.
pub fn record_zone_change(kind: ZoneChangeKind) {
    let kind_str = match kind {
        ZoneChangeKind::Switched => "switched",
        ZoneChangeKind::Withdrawn => "withdrawn",
    };

    counter!("failover_dns.zone.change.count", "kind" => kind_str).increment(1);
}

/// Kinds of zone changes.
#[derive(Debug, Clone, Copy)]
pub enum ZoneChangeKind {
    /// A (new) healthy candidate is now published.
    Switched,
    /// No candidate is healthy; the zone was deregistered.
    Withdrawn,
}

/// Record registry size and write serial (call periodically or on change).
pub fn record_registry(zones: usize, serial: u32) {
    gauge!("failover_dns.registry.zones").set(zones as f64);
    gauge!("failover_dns.registry.serial").set(serial as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
