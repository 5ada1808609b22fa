//! Failover controller: keeps each ping zone pointed at a live server.
//!
//! A single one-second ticker drives all probing. A counter runs down from
//! [`TICK_CEILING`] to 1 and wraps; an entry is re-evaluated on every tick whose
//! counter value is a multiple of its interval. Evaluation probes candidates in
//! order and publishes the first healthy one, so earlier servers are preferred.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::entry::Entry;
use crate::handler::Handler;
use crate::metrics::{self, ProbeResult, ZoneChangeKind};
use crate::probe::Probe;
use crate::router::{fqdn, ZoneRouter};

/// Counter value the schedule starts from and wraps back to (one hour + 1s).
pub const TICK_CEILING: u32 = 3601;

/// Period of the scheduling ticker.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Run-down counter shared by every entry's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickCounter {
    current: u32,
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TickCounter {
    /// Start at the ceiling.
    pub fn new() -> Self {
        Self {
            current: TICK_CEILING,
        }
    }

    /// Current counter value, always in `1..=TICK_CEILING`.
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Whether an entry with `interval` is due on this tick.
    pub fn is_due(&self, interval: NonZeroU32) -> bool {
        self.current % interval.get() == 0
    }

    /// Step to the next tick, wrapping to the ceiling after 1.
    pub fn advance(&mut self) {
        self.current -= 1;
        if self.current == 0 {
            self.current = TICK_CEILING;
        }
    }
}

/// Last decision taken for one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneState {
    /// Zone name (FQDN).
    pub domain: String,
    /// Published address, `None` while no candidate is healthy.
    pub current: Option<Ipv4Addr>,
    /// When the zone was last evaluated.
    pub last_checked: Option<Instant>,
}

impl ZoneState {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            current: None,
            last_checked: None,
        }
    }
}

/// Outcome of evaluating one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneChange {
    /// Same answer as before; the registry was not touched.
    Unchanged,
    /// A new address is published.
    Switched {
        /// Previously published address, if any.
        from: Option<Ipv4Addr>,
        /// Newly published address.
        to: Ipv4Addr,
    },
    /// No candidate is healthy; the zone was deregistered.
    Withdrawn {
        /// Address that was published until now.
        from: Ipv4Addr,
    },
}

/// Drives probing and keeps the router in sync with the health decisions.
pub struct FailoverController {
    entries: Arc<[Entry]>,
    router: ZoneRouter,
    probe: Arc<dyn Probe>,
    /// domain -> state; only touched from the ticker task.
    zones: HashMap<String, ZoneState>,
    counter: TickCounter,
}

impl FailoverController {
    /// Create a controller for `entries`, publishing into `router`.
    pub fn new(entries: Vec<Entry>, router: ZoneRouter, probe: Arc<dyn Probe>) -> Self {
        Self {
            entries: entries.into(),
            router,
            probe,
            zones: HashMap::new(),
            counter: TickCounter::new(),
        }
    }

    /// Router this controller publishes into.
    pub fn router(&self) -> &ZoneRouter {
        &self.router
    }

    /// Current schedule counter.
    pub fn counter(&self) -> TickCounter {
        self.counter
    }

    /// Last recorded state for `domain`.
    pub fn zone_state(&self, domain: &str) -> Option<&ZoneState> {
        self.zones.get(&fqdn(domain))
    }

    /// Register forward zones and evaluate every ping zone once.
    ///
    /// Runs before the listeners start so the first query already sees a
    /// decided answer.
    pub async fn initialize(&mut self) {
        let entries = Arc::clone(&self.entries);
        for entry in entries.iter() {
            match entry {
                Entry::Forward { domain, upstream } => {
                    info!(domain = %domain, upstream = %upstream, "forwarding zone");
                    self.router.register(domain, Handler::Forward(*upstream));
                }
                Entry::Ping { .. } => {
                    self.evaluate(entry).await;
                }
            }
        }
    }

    /// Evaluate the entries due on the current counter value, then advance it.
    ///
    /// Returns how many entries were evaluated.
    pub async fn tick(&mut self) -> usize {
        let entries = Arc::clone(&self.entries);
        let mut evaluated = 0;
        for entry in entries.iter() {
            if let Entry::Ping { interval, .. } = entry {
                if self.counter.is_due(*interval) {
                    self.evaluate(entry).await;
                    evaluated += 1;
                }
            }
        }
        self.counter.advance();
        evaluated
    }

    /// Probe `entry`'s candidates and publish the result if it changed.
    pub async fn evaluate(&mut self, entry: &Entry) -> ZoneChange {
        let Entry::Ping {
            domain, servers, ..
        } = entry
        else {
            return ZoneChange::Unchanged;
        };

        let healthy = self.first_healthy(domain, servers).await;

        let state = self
            .zones
            .entry(domain.clone())
            .or_insert_with(|| ZoneState::new(domain));
        let previous = state.current;
        state.current = healthy;
        state.last_checked = Some(Instant::now());

        match (previous, healthy) {
            (from, Some(to)) if from != Some(to) => {
                info!(domain = %domain, from = ?from, to = %to, "publishing healthy server");
                self.router.register(
                    domain,
                    Handler::StaticA {
                        domain: domain.clone(),
                        ip: to,
                    },
                );
                metrics::record_zone_change(ZoneChangeKind::Switched);
                ZoneChange::Switched { from, to }
            }
            (Some(from), None) => {
                warn!(domain = %domain, from = %from, "no healthy server, withdrawing zone");
                self.router.deregister(domain);
                metrics::record_zone_change(ZoneChangeKind::Withdrawn);
                ZoneChange::Withdrawn { from }
            }
            _ => {
                debug!(domain = %domain, current = ?healthy, "zone unchanged");
                ZoneChange::Unchanged
            }
        }
    }

    /// First candidate, in configured order, that passes its probe.
    async fn first_healthy(&self, domain: &str, servers: &[Ipv4Addr]) -> Option<Ipv4Addr> {
        for &ip in servers {
            match self.probe.probe(ip).await {
                Ok(true) => {
                    debug!(domain, %ip, "candidate healthy");
                    metrics::record_probe(ProbeResult::Healthy);
                    return Some(ip);
                }
                Ok(false) => {
                    debug!(domain, %ip, "candidate unhealthy");
                    metrics::record_probe(ProbeResult::Unhealthy);
                }
                Err(e) => {
                    warn!(domain, %ip, error = %e, "probe failed, treating candidate as down");
                    metrics::record_probe(ProbeResult::Error);
                }
            }
        }
        None
    }

    /// Tick once per second until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let start = tokio::time::Instant::now() + TICK_PERIOD;
        let mut ticker = tokio::time::interval_at(start, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("failover controller shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }
}
