//! Failover DNS - a DNS responder that switches zones between servers by liveness.
//!
//! Every configured zone is either forwarded verbatim to an upstream resolver,
//! or answered with an A record for the first server in an ordered candidate
//! list that currently replies to ICMP echo. When the preferred server stops
//! replying, the zone is re-pointed at the next live candidate; when none reply,
//! the zone is withdrawn and its queries take the forwarding fallback path.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         failover-dns                            │
//! │                                                                 │
//! │  ┌──────────────────┐  register/  ┌──────────────────┐          │
//! │  │ Failover         │ deregister  │   Zone Router    │          │
//! │  │ Controller       │────────────▶│   (RwLock map)   │          │
//! │  │ (1s ticker)      │             └────────┬─────────┘          │
//! │  └────────┬─────────┘                      │ resolve            │
//! │           │ probe                          ▼                    │
//! │           ▼                        ┌──────────────────┐         │
//! │     ICMP echo (ping)               │  Hickory DNS     │◀── UDP/TCP
//! │                                    │  Server          │         │
//! │                                    └────────┬─────────┘         │
//! │                                             │ forward/fallback  │
//! │                                             ▼                   │
//! │                                        upstream DNS             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Query routing
//!
//! ```text
//! www.svc.example.com  A
//!   → longest registered suffix: svc.example.com.
//!   → StaticA → "svc.example.com. 3600 IN A <first healthy server>"
//!
//! unknown.example.net  A
//!   → no zone, no root zone
//!   → Fallback → relay to global.forward, SERVFAIL on error
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use failover_dns::{Config, DnsServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config: Config = load_config();
//!     let cancel = CancellationToken::new();
//!
//!     let server = DnsServer::new(config);
//!     server.run(cancel).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod controller;
pub mod entry;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod probe;
pub mod responder;
pub mod router;
pub mod server;
pub mod telemetry;
pub mod upstream;

// Re-export main types
pub use config::{Config, EntryConfig, GlobalConfig, ProbeConfig, TelemetryConfig};
pub use controller::{FailoverController, TickCounter, ZoneChange, ZoneState};
pub use entry::Entry;
pub use error::DnsError;
pub use handler::Handler;
pub use probe::{PingProbe, Probe};
pub use responder::FailoverResponder;
pub use router::ZoneRouter;
pub use server::DnsServer;
pub use upstream::Forwarder;
