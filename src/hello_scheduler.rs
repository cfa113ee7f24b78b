//! Periodic task that owns Trickle and turns its decisions into HELLO
//! transmissions, plus the safety-HELLO floor Trickle itself doesn't know
//! about (spec §4.5).

use crate::address::{Address, Role};
use crate::events::RoutingEvent;
use crate::radio_io::{RadioIo, TxOutcome, TxPriority};
use crate::route_table::RouteTable;
use crate::stats::Stats;
use crate::trickle::{ConsistencyHandle, Trickle};
use crate::wire::{RoutePacket, MAX_NODES_PER_HELLO};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Reports the advertised gateway-load byte for this node. `255` (unknown)
/// for any node that isn't a gateway.
pub type GatewayLoadProvider = Arc<dyn Fn() -> u8 + Send + Sync>;

pub struct HelloScheduler {
    local_address: Address,
    local_role: Role,
    safety_interval: Duration,
    trickle: Mutex<Trickle>,
    route_table: Arc<RouteTable>,
    radio: Arc<dyn RadioIo>,
    stats: Arc<Stats>,
    gateway_load: GatewayLoadProvider,
    last_tx_time: Mutex<Option<Instant>>,
}

impl HelloScheduler {
    pub fn new(
        local_address: Address,
        local_role: Role,
        safety_interval: Duration,
        trickle: Trickle,
        route_table: Arc<RouteTable>,
        radio: Arc<dyn RadioIo>,
        stats: Arc<Stats>,
        gateway_load: GatewayLoadProvider,
    ) -> Self {
        Self {
            local_address,
            local_role,
            safety_interval,
            trickle: Mutex::new(trickle),
            route_table,
            radio,
            stats,
            gateway_load,
            last_tx_time: Mutex::new(None),
        }
    }

    /// A lock-free handle the receive-decoding context can call into
    /// whenever a HELLO arrives, without blocking on anything `tick` does.
    pub fn consistency_handle(&self) -> ConsistencyHandle {
        self.trickle.lock().unwrap().consistency_handle()
    }

    /// Reset Trickle — called on topology change (route table size or
    /// via-change) and on neighbor FAULT.
    pub fn reset_trickle(&self, now: Instant) {
        self.trickle.lock().unwrap().reset(now);
    }

    fn compose_hello(&self) -> RoutePacket {
        let mut nodes = self.route_table.snapshot_network_nodes();
        nodes.truncate(MAX_NODES_PER_HELLO);
        RoutePacket {
            sender_address: self.local_address,
            sender_role: self.local_role,
            sender_gateway_load: (self.gateway_load)(),
            node_list: nodes,
        }
    }

    /// Advance Trickle and, if it (or the safety floor) calls for a
    /// transmission, compose and send one HELLO.
    pub fn tick(&self, now: Instant) -> Option<RoutingEvent> {
        let (mut should_tx, interval_secs) = {
            let mut trickle = self.trickle.lock().unwrap();
            let decision = trickle.tick(now);
            (decision.should_tx, trickle.current_interval().as_secs())
        };

        let last = *self.last_tx_time.lock().unwrap();
        let forced = !should_tx
            && last.map_or(true, |last| now.saturating_duration_since(last) >= self.safety_interval);
        if forced {
            should_tx = true;
        }

        if !should_tx {
            return None;
        }

        let packet = self.compose_hello();
        let bytes = match packet.to_bytes() {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };

        match self.radio.try_send(&bytes, TxPriority::Control) {
            Ok(TxOutcome::Accepted) => {
                self.stats.record_tx();
                *self.last_tx_time.lock().unwrap() = Some(now);
                if forced {
                    self.trickle.lock().unwrap().note_forced_tx(now);
                    self.stats.record_safety_hello();
                    Some(RoutingEvent::SafetyTx)
                } else {
                    Some(RoutingEvent::TrickleTx { interval_secs })
                }
            }
            _ => None,
        }
    }
}
