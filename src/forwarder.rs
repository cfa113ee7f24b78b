//! Local delivery and relaying of DATA frames (spec §4.7).

use crate::address::{Address, BROADCAST, NO_ROUTE};
use crate::duplicate_cache::{DuplicateCache, DuplicateCacheConfig};
use crate::error::{DropReason, SendOutcome};
use crate::radio_io::{RadioIo, TxOutcome, TxPriority};
use crate::stats::Stats;
use crate::route_table::RouteTable;
use crate::wire::{DataPacket, DataType};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Outcome of handling one inbound DATA frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    DeliveredLocal(Vec<u8>),
    Forwarded,
    /// The radio could not accept the relay right now; the packet was not
    /// retried or queued — callers that need retry build that on top.
    Backpressure,
    Dropped(DropReason),
}

pub struct Forwarder {
    local_address: Address,
    route_table: Arc<RouteTable>,
    radio: Arc<dyn RadioIo>,
    stats: Arc<Stats>,
    duplicate_cache: Mutex<DuplicateCache>,
    default_ttl: u8,
    /// P1 pure-flooding mode: every packet (not just broadcast) is deduped
    /// and relayed to all neighbors instead of following a route.
    flooding_mode: bool,
    next_seq: AtomicU16,
}

impl Forwarder {
    pub fn new(
        local_address: Address,
        route_table: Arc<RouteTable>,
        radio: Arc<dyn RadioIo>,
        stats: Arc<Stats>,
        duplicate_cache_config: DuplicateCacheConfig,
        default_ttl: u8,
        flooding_mode: bool,
    ) -> Self {
        Self {
            local_address,
            route_table,
            radio,
            stats,
            duplicate_cache: Mutex::new(DuplicateCache::new(duplicate_cache_config)),
            default_ttl,
            flooding_mode,
            next_seq: AtomicU16::new(0),
        }
    }

    /// Send a locally-originated payload to `dst` (may be [`BROADCAST`]).
    pub fn send(&self, dst: Address, kind: DataType, payload: Vec<u8>) -> SendOutcome {
        let via = self.route_table.next_hop(dst);
        if via == NO_ROUTE {
            self.stats.record_drop(DropReason::NoRoute);
            return SendOutcome::NoRoute;
        }

        let packet = DataPacket {
            src: self.local_address,
            dst,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            ttl: self.default_ttl,
            kind,
            payload,
        };

        match self.radio.try_send(&packet.to_bytes(), TxPriority::Data) {
            Ok(TxOutcome::Accepted) => {
                self.stats.record_tx();
                SendOutcome::Accepted
            }
            Ok(TxOutcome::Busy) | Err(_) => SendOutcome::Backpressure,
        }
    }

    /// Handle one inbound DATA frame: deliver locally, relay, or drop.
    pub fn handle_inbound(&self, mut packet: DataPacket, now: Instant) -> ForwardOutcome {
        self.stats.record_rx_data();

        let is_broadcast = packet.dst == BROADCAST;
        if is_broadcast || self.flooding_mode {
            let mut cache = self.duplicate_cache.lock().unwrap();
            if !cache.observe((packet.src, packet.seq), now) {
                self.stats.record_drop(DropReason::Duplicate);
                return ForwardOutcome::Dropped(DropReason::Duplicate);
            }
        }

        if packet.dst == self.local_address || is_broadcast {
            self.stats.record_delivered_local();
            let payload = packet.payload.clone();

            if is_broadcast && packet.ttl > 0 {
                packet.ttl -= 1;
                if self.relay(&packet).is_ok() {
                    self.stats.record_forwarded();
                }
            }

            return ForwardOutcome::DeliveredLocal(payload);
        }

        packet.ttl = packet.ttl.saturating_sub(1);
        if packet.ttl == 0 {
            self.stats.record_drop(DropReason::TtlExpired);
            return ForwardOutcome::Dropped(DropReason::TtlExpired);
        }

        let next_via = self.route_table.next_hop(packet.dst);
        if next_via == NO_ROUTE {
            self.stats.record_drop(DropReason::NoRoute);
            return ForwardOutcome::Dropped(DropReason::NoRoute);
        }

        match self.relay(&packet) {
            Ok(()) => {
                self.stats.record_forwarded();
                ForwardOutcome::Forwarded
            }
            Err(()) => ForwardOutcome::Backpressure,
        }
    }

    fn relay(&self, packet: &DataPacket) -> Result<(), ()> {
        match self.radio.try_send(&packet.to_bytes(), TxPriority::Data) {
            Ok(TxOutcome::Accepted) => Ok(()),
            Ok(TxOutcome::Busy) | Err(_) => Err(()),
        }
    }
}
