//! failover-dns binary entry point.

use clap::Parser;
use failover_dns::{telemetry, Config, DnsServer};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// DNS responder that fails zones over between ICMP-probed servers.
#[derive(Parser, Debug)]
#[command(name = "failover-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML or YAML).
    #[arg(short, long, default_value = "failover-dns.toml")]
    config: PathBuf,
}

/// Cancel `cancel` on SIGINT or SIGTERM.
async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("SIGINT received, stopping"),
        _ = terminate => info!("SIGTERM received, stopping"),
    }
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()))
        .add_source(
            config::Environment::with_prefix("FAILOVER_DNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        listen_addr = %config.global.listen_addr(),
        forward = %config.global.forward,
        entries = config.entries.len(),
        "Starting failover-dns"
    );

    // Setup graceful shutdown
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    // Run DNS server
    let server = DnsServer::new(config);
    let result = server.run(cancel).await;

    if let Err(e) = result {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("failover-dns shutdown complete");
    Ok(())
}
