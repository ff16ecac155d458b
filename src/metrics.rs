//! Best-effort transfer diagnostics.
//!
//! The dispatcher accumulates elapsed time and bytes moved into a
//! [`TransferCounters`] entry when the caller supplies one. Counters are
//! purely additive and never read back by the data-movement code; they
//! exist for external reporting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Accumulated cost of one operation identity.
#[derive(Debug, Default)]
pub struct TransferCounters {
    calls: AtomicU64,
    nanos: AtomicU64,
    bytes: AtomicU64,
}

impl TransferCounters {
    pub fn record(&self, elapsed: Duration, bytes: u64) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn nanos(&self) -> u64 {
        self.nanos.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// Counters keyed by operation identity.
#[derive(Debug, Default)]
pub struct CounterRegistry {
    entries: Mutex<HashMap<String, Arc<TransferCounters>>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The counters entry for `name`, created on first use.
    pub fn handle(&self, name: &str) -> Arc<TransferCounters> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(TransferCounters::default()))
            .clone()
    }

    /// Existing entry for `name`, if any operation has used it.
    pub fn get(&self, name: &str) -> Option<Arc<TransferCounters>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}
