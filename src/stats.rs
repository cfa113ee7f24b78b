//! Counters exposed through `RoutingCore::stats()` (spec §7).
//!
//! Every counter is an `AtomicU64` so the receive path, the scheduler
//! tasks, and an external reader (e.g. `stats_server`) can touch them
//! without taking the route table lock.

use crate::error::DropReason;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters. Cheap to share: wrap in `Arc`, never clone the struct
/// itself (cloning would create a second, independent set of counters).
#[derive(Debug, Default)]
pub struct Stats {
    rx_hello: AtomicU64,
    rx_data: AtomicU64,
    tx: AtomicU64,
    forwarded: AtomicU64,
    delivered_local: AtomicU64,
    dropped_malformed: AtomicU64,
    dropped_table_full: AtomicU64,
    dropped_no_route: AtomicU64,
    dropped_ttl_expired: AtomicU64,
    dropped_duplicate: AtomicU64,
    faults: AtomicU64,
    recoveries: AtomicU64,
    replacements: AtomicU64,
    safety_hellos: AtomicU64,
}

impl Stats {
    /// New, zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rx_hello(&self) {
        self.rx_hello.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rx_data(&self) {
        self.rx_data.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tx(&self) {
        self.tx.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered_local(&self) {
        self.delivered_local.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Malformed => &self.dropped_malformed,
            DropReason::TableFull => &self.dropped_table_full,
            DropReason::NoRoute => &self.dropped_no_route,
            DropReason::TtlExpired => &self.dropped_ttl_expired,
            DropReason::Duplicate => &self.dropped_duplicate,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recovery(&self) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replacement(&self) {
        self.replacements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_safety_hello(&self) {
        self.safety_hellos.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot suitable for logging or JSON export.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_hello: self.rx_hello.load(Ordering::Relaxed),
            rx_data: self.rx_data.load(Ordering::Relaxed),
            tx: self.tx.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            delivered_local: self.delivered_local.load(Ordering::Relaxed),
            dropped_malformed: self.dropped_malformed.load(Ordering::Relaxed),
            dropped_table_full: self.dropped_table_full.load(Ordering::Relaxed),
            dropped_no_route: self.dropped_no_route.load(Ordering::Relaxed),
            dropped_ttl_expired: self.dropped_ttl_expired.load(Ordering::Relaxed),
            dropped_duplicate: self.dropped_duplicate.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            replacements: self.replacements.load(Ordering::Relaxed),
            safety_hellos: self.safety_hellos.load(Ordering::Relaxed),
        }
    }
}

/// Serializable point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatsSnapshot {
    pub rx_hello: u64,
    pub rx_data: u64,
    pub tx: u64,
    pub forwarded: u64,
    pub delivered_local: u64,
    pub dropped_malformed: u64,
    pub dropped_table_full: u64,
    pub dropped_no_route: u64,
    pub dropped_ttl_expired: u64,
    pub dropped_duplicate: u64,
    pub faults: u64,
    pub recoveries: u64,
    pub replacements: u64,
    pub safety_hellos: u64,
}
