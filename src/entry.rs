//! Typed zone entries, validated once at startup.
//!
//! An entry either forwards a zone verbatim to one upstream, or answers it with
//! the first healthy address out of an ordered candidate list.

use hickory_proto::rr::Name;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;

use crate::config::EntryConfig;
use crate::error::DnsError;
use crate::router::fqdn;

/// Port assumed for upstream addresses written without one.
pub const DNS_PORT: u16 = 53;

/// How a zone is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Relay queries to an upstream resolver.
    Forward,
    /// Answer with the first candidate that replies to ICMP echo.
    Ping,
}

/// A validated, immutable zone entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Queries for `domain` are relayed to `upstream`.
    Forward {
        /// Lower-cased FQDN.
        domain: String,
        /// Upstream nameserver.
        upstream: SocketAddr,
    },
    /// Queries for `domain` are answered with the first live server.
    Ping {
        /// Lower-cased FQDN.
        domain: String,
        /// Candidates in preference order; never empty.
        servers: Vec<Ipv4Addr>,
        /// Seconds between evaluations.
        interval: NonZeroU32,
    },
}

impl Entry {
    /// The zone this entry answers for.
    pub fn domain(&self) -> &str {
        match self {
            Entry::Forward { domain, .. } | Entry::Ping { domain, .. } => domain,
        }
    }

    /// How this entry is answered.
    pub fn method(&self) -> Method {
        match self {
            Entry::Forward { .. } => Method::Forward,
            Entry::Ping { .. } => Method::Ping,
        }
    }

    /// Validate one configured entry.
    pub fn from_config(config: &EntryConfig) -> Result<Self, DnsError> {
        let domain = config.domain.trim();
        if domain.is_empty() {
            return Err(DnsError::Config("entry has an empty domain".to_string()));
        }
        let domain = canonical_domain(domain)?;

        match config.method.to_ascii_lowercase().as_str() {
            "forward" => {
                let [server] = config.servers.as_slice() else {
                    return Err(DnsError::Config(format!(
                        "forward entry {} needs exactly one server, got {}",
                        domain,
                        config.servers.len()
                    )));
                };
                let upstream = parse_upstream(server)?;
                Ok(Entry::Forward { domain, upstream })
            }
            "ping" => {
                if config.servers.is_empty() {
                    return Err(DnsError::Config(format!(
                        "ping entry {} has no servers",
                        domain
                    )));
                }
                let interval = NonZeroU32::new(config.interval).ok_or_else(|| {
                    DnsError::Config(format!("ping entry {} has a zero interval", domain))
                })?;
                let servers = config
                    .servers
                    .iter()
                    .map(|s| {
                        s.trim()
                            .parse::<Ipv4Addr>()
                            .map_err(|_| DnsError::InvalidAddress(s.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Entry::Ping {
                    domain,
                    servers,
                    interval,
                })
            }
            other => Err(DnsError::Config(format!(
                "entry {} has unknown method {:?}",
                domain, other
            ))),
        }
    }
}

/// Parse `domain` as a DNS name and return its lower-case ASCII FQDN.
///
/// This is the form the router keys zones by and the form queries are routed
/// on, so IDN zones must be written in punycode.
fn canonical_domain(domain: &str) -> Result<String, DnsError> {
    let name = Name::from_ascii(fqdn(domain))
        .map_err(|e| DnsError::Config(format!("entry domain {:?} is invalid: {}", domain, e)))?;
    Ok(name.to_lowercase().to_ascii())
}

/// Validate all configured entries, keeping configuration order.
pub fn load_entries(configs: &[EntryConfig]) -> Result<Vec<Entry>, DnsError> {
    configs.iter().map(Entry::from_config).collect()
}

/// Parse an upstream written as `ip` or `ip:port`.
pub fn parse_upstream(s: &str) -> Result<SocketAddr, DnsError> {
    let s = s.trim();
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    s.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| DnsError::InvalidAddress(s.to_string()))
}
