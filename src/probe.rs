//! Liveness probes for candidate servers.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::config::ProbeConfig;
use crate::error::DnsError;

/// System binary used for ICMP echo.
const PING_BIN: &str = "ping";

/// Slack added on top of the echo timeouts before the child is killed.
const PROBE_GRACE: Duration = Duration::from_secs(1);

/// Decides whether a candidate server is alive.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Returns `Ok(true)` when `ip` answered, `Ok(false)` when it did not.
    async fn probe(&self, ip: Ipv4Addr) -> Result<bool, DnsError>;
}

/// ICMP echo probe backed by the system `ping` utility.
///
/// Each probe is bounded: a child that outlives its deadline is killed and the
/// candidate is reported as down.
#[derive(Debug, Clone)]
pub struct PingProbe {
    timeout: Duration,
    count: u32,
}

impl PingProbe {
    /// Create a probe from configuration.
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            count: config.count.max(1),
        }
    }

    fn args(&self, ip: Ipv4Addr) -> Vec<String> {
        vec![
            "-n".to_string(),
            "-q".to_string(),
            "-c".to_string(),
            self.count.to_string(),
            "-W".to_string(),
            self.timeout.as_secs().to_string(),
            ip.to_string(),
        ]
    }

    fn deadline(&self) -> Duration {
        self.timeout * self.count + PROBE_GRACE
    }
}

#[async_trait]
impl Probe for PingProbe {
    async fn probe(&self, ip: Ipv4Addr) -> Result<bool, DnsError> {
        let mut child = Command::new(PING_BIN)
            .args(self.args(ip))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DnsError::Probe(format!("failed to run {}: {}", PING_BIN, e)))?;

        match tokio::time::timeout(self.deadline(), child.wait()).await {
            Ok(Ok(status)) => {
                trace!(%ip, %status, "ping finished");
                Ok(status.success())
            }
            Ok(Err(e)) => Err(DnsError::Probe(format!("waiting for {}: {}", PING_BIN, e))),
            Err(_) => {
                debug!(%ip, deadline = ?self.deadline(), "ping exceeded its deadline");
                Ok(false)
            }
        }
    }
}
