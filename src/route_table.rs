//! Route table: the single source of truth for "how do I reach X" (spec §4.1).
//!
//! One entry per destination, guarded by one mutex. Any operation that
//! needs a [`CostFunction`](crate::cost::CostFunction) verdict copies the
//! candidates it needs out from under the lock, drops the lock, then calls
//! the function — the callback is allowed to read the table again, and
//! nested acquisition of the same mutex would deadlock (spec §5).

use crate::address::Address;
use crate::config::Limits;
use crate::cost::{is_better, CostFunction, CostInputs};
use crate::link_metrics::LinkMetrics;
use crate::wire::NetworkNode;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One installed route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEntry {
    pub destination: Address,
    pub via: Address,
    pub metric: u8,
    pub role: crate::address::Role,
    /// 255 = unknown.
    pub gateway_load: u8,
    pub timeout: Instant,
    /// SNR observed on the link to `via`, from the most recent HELLO
    /// heard directly from `via`.
    pub received_snr: Option<i8>,
}

/// Route table, keyed by destination address.
pub struct RouteTable {
    local_address: Address,
    limits: Limits,
    entries: Mutex<HashMap<Address, RouteEntry>>,
}

impl RouteTable {
    pub fn new(local_address: Address, limits: Limits) -> Self {
        Self {
            local_address,
            limits,
            entries: Mutex::new(HashMap::with_capacity(limits.max_routes)),
        }
    }

    pub fn size(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn find(&self, addr: Address) -> Option<RouteEntry> {
        self.entries.lock().unwrap().get(&addr).copied()
    }

    /// Next hop for `dst`, or [`crate::address::NO_ROUTE`] on miss.
    pub fn next_hop(&self, dst: Address) -> Address {
        if dst.is_broadcast() {
            return crate::address::BROADCAST;
        }
        self.find(dst).map(|e| e.via).unwrap_or(crate::address::NO_ROUTE)
    }

    /// Hop count to `dst`, or 0 on miss.
    pub fn hops(&self, dst: Address) -> u8 {
        self.find(dst).map(|e| e.metric).unwrap_or(0)
    }

    /// The best entry whose role contains every bit of `role_mask`.
    ///
    /// Without a cost function, "best" means lowest metric. With one, it's
    /// the lowest `CostFunction` score evaluated over a snapshot of
    /// candidates taken before the lock is released.
    pub fn best_by_role(
        &self,
        role_mask: crate::address::Role,
        cost: Option<&dyn CostFunction>,
        link_metrics: &LinkMetrics,
        avg_gateway_load: Option<f32>,
    ) -> Option<RouteEntry> {
        let candidates: Vec<RouteEntry> = {
            let table = self.entries.lock().unwrap();
            table
                .values()
                .filter(|e| e.role.contains(role_mask))
                .copied()
                .collect()
        };

        match cost {
            None => candidates.into_iter().min_by_key(|e| e.metric),
            Some(cost_fn) => {
                let mut best: Option<(RouteEntry, f32)> = None;
                for entry in candidates {
                    let link = link_metrics.snapshot(entry.via);
                    let gateway_load = if entry.role.is_gateway() && entry.gateway_load != 255 {
                        Some(entry.gateway_load)
                    } else {
                        None
                    };
                    let inputs = CostInputs {
                        hops: entry.metric,
                        link,
                        destination_gateway_load: gateway_load,
                        avg_gateway_load,
                    };
                    let score = cost_fn.cost(&inputs);
                    best = match best {
                        None => Some((entry, score)),
                        Some((_, best_score)) if is_better(score, best_score).is_lt() => {
                            Some((entry, score))
                        }
                        other => other,
                    };
                }
                best.map(|(entry, _)| entry)
            }
        }
    }

    /// Ordered copy of every entry as a wire `NetworkNode`, suitable for
    /// embedding into an outgoing HELLO.
    pub fn snapshot_network_nodes(&self) -> Vec<NetworkNode> {
        let table = self.entries.lock().unwrap();
        let mut nodes: Vec<NetworkNode> = table
            .values()
            .map(|e| NetworkNode {
                address: e.destination,
                metric: e.metric,
                role: e.role,
                gateway_load: e.gateway_load,
            })
            .collect();
        nodes.sort_by_key(|n| n.address.value());
        nodes
    }

    /// True if the table has no free slot for a brand-new destination.
    pub fn is_full(&self) -> bool {
        self.entries.lock().unwrap().len() >= self.limits.max_routes
    }

    /// Install a brand-new entry. Caller (RouteProcessor) is responsible
    /// for the admission rule (§4.2); this only refuses a destination that
    /// already exists or is the local address.
    pub fn install(&self, entry: RouteEntry) -> bool {
        if entry.destination == self.local_address {
            return false;
        }
        let mut table = self.entries.lock().unwrap();
        if table.contains_key(&entry.destination) {
            return false;
        }
        table.insert(entry.destination, entry);
        true
    }

    /// Overwrite an existing entry's via/metric/gatewayLoad and refresh its
    /// timeout. No-op if the destination has no entry.
    pub fn replace(&self, destination: Address, via: Address, metric: u8, now: Instant) {
        let mut table = self.entries.lock().unwrap();
        if let Some(entry) = table.get_mut(&destination) {
            entry.via = via;
            entry.metric = metric;
            entry.timeout = now + self.limits.route_ttl;
        }
    }

    /// Reset `destination`'s timeout without touching via/metric (a refresh).
    pub fn refresh_timeout(&self, destination: Address, now: Instant) {
        let mut table = self.entries.lock().unwrap();
        if let Some(entry) = table.get_mut(&destination) {
            entry.timeout = now + self.limits.route_ttl;
        }
    }

    pub fn update_gateway_load(&self, destination: Address, gateway_load: u8) {
        let mut table = self.entries.lock().unwrap();
        if let Some(entry) = table.get_mut(&destination) {
            entry.gateway_load = gateway_load;
        }
    }

    /// Role update, gated by the caller on `next_hop(destination) == via`
    /// per spec §4.2 — this method just performs the write.
    pub fn update_role(&self, destination: Address, role: crate::address::Role) {
        let mut table = self.entries.lock().unwrap();
        if let Some(entry) = table.get_mut(&destination) {
            entry.role = role;
        }
    }

    pub fn update_received_snr(&self, destination: Address, snr: i8) {
        let mut table = self.entries.lock().unwrap();
        if let Some(entry) = table.get_mut(&destination) {
            entry.received_snr = Some(snr);
        }
    }

    /// Remove one destination's entry. Returns `true` if it existed.
    pub fn remove(&self, destination: Address) -> bool {
        self.entries.lock().unwrap().remove(&destination).is_some()
    }

    /// Remove the direct entry for `neighbor` plus every entry routed
    /// through it (spec §4.6 FAULT side effect). Returns the removed
    /// destinations.
    pub fn remove_neighbor_and_dependents(&self, neighbor: Address) -> Vec<Address> {
        let mut table = self.entries.lock().unwrap();
        let to_remove: Vec<Address> = table
            .values()
            .filter(|e| e.destination == neighbor || e.via == neighbor)
            .map(|e| e.destination)
            .collect();
        for dest in &to_remove {
            table.remove(dest);
        }
        to_remove
    }

    /// Evict every entry whose timeout has passed `now`. Returns the
    /// removed destinations so callers can drop their LinkMetrics too.
    pub fn sweep_expired(&self, now: Instant) -> Vec<Address> {
        let mut table = self.entries.lock().unwrap();
        let expired: Vec<Address> = table
            .values()
            .filter(|e| e.timeout <= now)
            .map(|e| e.destination)
            .collect();
        for dest in &expired {
            table.remove(dest);
        }
        expired
    }

    /// Find the current worst-scoring entry by a plain metric comparison,
    /// used by the table-full eviction path in RouteProcessor's admission
    /// rule. Not cost-aware: callers that need cost-aware eviction collect
    /// candidates via `best_by_role`-style snapshotting themselves.
    pub fn worst_by_metric(&self) -> Option<RouteEntry> {
        self.entries.lock().unwrap().values().max_by_key(|e| e.metric).copied()
    }

    pub fn route_ttl(&self) -> Duration {
        self.limits.route_ttl
    }
}
