//! Zone router: maps a query name to the handler of its closest registered zone.
//!
//! Matching walks the query name label by label toward the root and returns the
//! most specific registered zone. DS queries are the exception: the record
//! lives at the parent side of a delegation, so the walk continues and the
//! top-most registered ancestor wins. The root zone `"."` is consulted last.

use hickory_proto::rr::RecordType;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::handler::Handler;
use crate::metrics;

/// The root zone, used as the wildcard of last resort.
pub const ROOT: &str = ".";

/// Lower-case `name` and make it fully qualified.
pub fn fqdn(name: &str) -> String {
    let mut name = name.to_ascii_lowercase();
    if !is_fqdn(&name) {
        name.push('.');
    }
    name
}

/// A name is fully qualified when it ends in an unescaped dot.
fn is_fqdn(name: &str) -> bool {
    let Some(rest) = name.strip_suffix('.') else {
        return false;
    };
    let escapes = rest.bytes().rev().take_while(|b| *b == b'\\').count();
    escapes % 2 == 0
}

/// Offset of the label following the one starting at `offset`, or `None` when
/// the label at `offset` is the last one before the root.
fn next_label(name: &str, offset: usize) -> Option<usize> {
    let bytes = name.as_bytes();
    let mut i = offset;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'.' => {
                let next = i + 1;
                return (next < bytes.len()).then_some(next);
            }
            _ => i += 1,
        }
    }
    None
}

/// Thread-safe registry of zone handlers.
///
/// Cloning yields another handle to the same registry. Reads take a shared lock
/// and never block each other; registrations take the exclusive lock.
#[derive(Debug, Clone, Default)]
pub struct ZoneRouter {
    inner: Arc<RwLock<ZoneRouterInner>>,
}

#[derive(Debug, Default)]
struct ZoneRouterInner {
    /// fqdn -> handler
    zones: HashMap<String, Handler>,

    /// Incremented on every write.
    serial: u32,
}

impl ZoneRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handler` for `pattern`, replacing any previous registration.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is empty.
    pub fn register(&self, pattern: &str, handler: Handler) {
        assert!(!pattern.is_empty(), "dns: invalid empty zone pattern");
        let zone = fqdn(pattern);
        let mut inner = self.inner.write();
        debug!(zone = %zone, handler = ?handler, "registering zone");
        inner.zones.insert(zone, handler);
        inner.serial = inner.serial.wrapping_add(1);
    }

    /// Remove the registration for `pattern`, returning the old handler.
    pub fn deregister(&self, pattern: &str) -> Option<Handler> {
        let zone = fqdn(pattern);
        let mut inner = self.inner.write();
        let removed = inner.zones.remove(&zone);
        if removed.is_some() {
            debug!(zone = %zone, "deregistered zone");
            inner.serial = inner.serial.wrapping_add(1);
        }
        removed
    }

    /// Find the handler for a query, or `None` if no zone covers it.
    pub fn resolve(&self, qname: &str, qtype: RecordType) -> Option<Handler> {
        let name = fqdn(qname);
        let inner = self.inner.read();

        let mut matched: Option<&Handler> = None;
        let mut offset = 0;
        loop {
            if let Some(handler) = inner.zones.get(&name[offset..]) {
                if qtype != RecordType::DS {
                    trace!(name = %name, zone = &name[offset..], "zone match");
                    return Some(handler.clone());
                }
                // DS belongs to the parent side; keep walking up.
                matched = Some(handler);
            }
            match next_label(&name, offset) {
                Some(next) => offset = next,
                None => break,
            }
        }

        matched.or_else(|| inner.zones.get(ROOT)).cloned()
    }

    /// Current handler registered exactly at `pattern`.
    pub fn get(&self, pattern: &str) -> Option<Handler> {
        self.inner.read().zones.get(&fqdn(pattern)).cloned()
    }

    /// Number of writes applied so far.
    pub fn serial(&self) -> u32 {
        self.inner.read().serial
    }

    /// Number of registered zones.
    pub fn len(&self) -> usize {
        self.inner.read().zones.len()
    }

    /// True when no zone is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().zones.is_empty()
    }

    /// Emit current registry metrics.
    pub fn emit_metrics(&self) {
        let inner = self.inner.read();
        metrics::record_registry(inner.zones.len(), inner.serial);
    }
}
