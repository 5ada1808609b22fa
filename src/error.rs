//! Error types for failover-dns.

use thiserror::Error;

/// Errors that can occur in the DNS failover responder.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration (fatal at startup).
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Failed to parse address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Upstream exchange failed or timed out
    #[error("Upstream exchange failed: {0}")]
    Upstream(String),

    /// Liveness probe could not be run
    #[error("Probe failed: {0}")]
    Probe(String),
}
