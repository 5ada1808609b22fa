//! DNS server setup and lifecycle management.

use hickory_server::ServerFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::controller::FailoverController;
use crate::entry::{load_entries, parse_upstream};
use crate::error::DnsError;
use crate::probe::{PingProbe, Probe};
use crate::responder::FailoverResponder;
use crate::router::ZoneRouter;
use crate::upstream::Forwarder;

/// Interval for emitting registry metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Idle timeout for TCP connections.
const TCP_TIMEOUT: Duration = Duration::from_secs(30);

/// Periodically emit registry metrics.
async fn metrics_loop(router: ZoneRouter, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                router.emit_metrics();
                debug!(
                    zones = router.len(),
                    serial = router.serial(),
                    "emitted registry metrics"
                );
            }
            _ = cancel.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// DNS failover responder.
pub struct DnsServer {
    config: Config,
    router: ZoneRouter,
    probe: Arc<dyn Probe>,
}

impl DnsServer {
    /// Create a new DNS server probing with ICMP echo.
    pub fn new(config: Config) -> Self {
        let probe = Arc::new(PingProbe::new(&config.probe));
        Self::with_probe(config, probe)
    }

    /// Create a new DNS server with a custom probe.
    pub fn with_probe(config: Config, probe: Arc<dyn Probe>) -> Self {
        Self {
            config,
            router: ZoneRouter::new(),
            probe,
        }
    }

    /// Get a handle to the zone router.
    pub fn router(&self) -> &ZoneRouter {
        &self.router
    }

    /// Run the DNS server until `cancel` fires or a listener fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), DnsError> {
        let listen_addr = self.config.global.listen_addr();
        info!(
            listen_addr = %listen_addr,
            forward = %self.config.global.forward,
            entries = self.config.entries.len(),
            "Starting failover-dns server"
        );

        // Invalid configuration must stop us before anything is served.
        let entries = load_entries(&self.config.entries)?;
        let default_upstream = parse_upstream(&self.config.global.forward)?;
        let forwarder = Forwarder::new(
            default_upstream,
            Duration::from_millis(self.config.global.upstream_timeout_ms),
        );

        let mut controller =
            FailoverController::new(entries, self.router.clone(), Arc::clone(&self.probe));
        info!("Running initial health evaluation...");
        controller.initialize().await;
        info!(zones = self.router.len(), "Initial health evaluation complete");

        let responder = FailoverResponder::new(self.router.clone(), forwarder);
        let mut server = ServerFuture::new(responder);

        // Bind UDP
        let udp_socket = UdpSocket::bind(listen_addr).await?;
        info!(addr = %listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        // Bind TCP
        let tcp_listener = TcpListener::bind(listen_addr).await?;
        info!(addr = %listen_addr, "DNS TCP listening");
        server.register_listener(tcp_listener, TCP_TIMEOUT);

        info!("DNS server ready to serve queries");

        let controller_handle = tokio::spawn(controller.run(cancel.clone()));
        let metrics_handle = tokio::spawn(metrics_loop(self.router.clone(), cancel.clone()));

        // Emit initial metrics
        self.router.emit_metrics();

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                info!("DNS server shutdown requested");
                Ok(())
            }
            result = server.block_until_done() => {
                if let Err(ref e) = result {
                    error!("DNS server error: {}", e);
                }
                result.map_err(DnsError::from)
            }
        };

        // Stop background loops if the server ended on its own.
        cancel.cancel();
        let _ = controller_handle.await;
        let _ = metrics_handle.await;

        info!("DNS server stopped");
        result
    }
}
