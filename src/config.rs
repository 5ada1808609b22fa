//! Configuration types for failover-dns.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listener and default upstream settings.
    pub global: GlobalConfig,

    /// Liveness probe settings.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Zones to forward or watch, in evaluation order.
    #[serde(default)]
    pub entries: Vec<EntryConfig>,
}

/// Global section: where to listen and where unmatched queries go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default upstream nameserver (`ip` or `ip:port`) used by the fallback path.
    pub forward: String,

    /// Port for the UDP and TCP listeners.
    pub port: u16,

    /// Address the listeners bind to.
    #[serde(default = "default_listen_ip")]
    pub listen_ip: IpAddr,

    /// Upper bound for a single upstream exchange, in milliseconds.
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,
}

impl GlobalConfig {
    /// Socket address the listeners bind to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_ip, self.port)
    }
}

/// Liveness probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Seconds to wait for each echo reply.
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,

    /// Echo requests sent per probe.
    #[serde(default = "default_probe_count")]
    pub count: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout_secs(),
            count: default_probe_count(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "failover_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

/// Raw entry as written in the configuration file.
///
/// Validated into an [`Entry`](crate::entry::Entry) before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    /// "forward" or "ping".
    pub method: String,

    /// Zone this entry answers for.
    pub domain: String,

    /// Upstream (forward) or ordered candidates (ping).
    #[serde(default)]
    pub servers: Vec<String>,

    /// Seconds between probes; ignored for forward entries.
    #[serde(default)]
    pub interval: u32,
}

fn default_listen_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_upstream_timeout_ms() -> u64 {
    2000
}

fn default_probe_timeout_secs() -> u64 {
    1
}

fn default_probe_count() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}
