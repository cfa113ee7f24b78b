//! Applies an incoming HELLO to the route table (spec §4.2).
//!
//! This is the busiest piece of the core: every HELLO passes through
//! here, and the install/replace/refresh decisions it makes are what
//! make P3 behave differently from plain hop-count DV.

use crate::address::Address;
use crate::cost::{CostFunction, CostInputs};
use crate::error::DropReason;
use crate::events::RoutingEvent;
use crate::link_metrics::LinkMetrics;
use crate::route_table::{RouteEntry, RouteTable};
use crate::stats::Stats;
use crate::wire::{NetworkNode, RoutePacket};
use std::sync::Arc;
use std::time::Instant;

/// Hysteresis used when the proposed path has the same or fewer hops
/// than the current one (spec §4.2, normal replace rule).
const REPLACE_HYSTERESIS: f32 = 0.85;
/// Stricter hysteresis required when the proposed path has *more* hops
/// than the current one but still claims a better cost — the "two-hop
/// strong link beats one-hop marginal link" admission rule.
const MORE_HOPS_HYSTERESIS: f32 = 0.80;

pub struct RouteProcessor {
    local_address: Address,
    hop_max: u8,
    route_table: Arc<RouteTable>,
    link_metrics: Arc<LinkMetrics>,
    cost: Option<Arc<dyn CostFunction>>,
    stats: Arc<Stats>,
}

impl RouteProcessor {
    pub fn new(
        local_address: Address,
        hop_max: u8,
        route_table: Arc<RouteTable>,
        link_metrics: Arc<LinkMetrics>,
        cost: Option<Arc<dyn CostFunction>>,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            local_address,
            hop_max,
            route_table,
            link_metrics,
            cost,
            stats,
        }
    }

    /// Process one decoded HELLO. `frame_rssi`/`frame_snr`/`frame_seq` are
    /// the physical-layer measurements RadioIO attaches to the received
    /// frame (spec's LinkMetrics contract needs all three; the HELLO
    /// payload itself carries none of them).
    pub fn on_hello(
        &self,
        packet: &RoutePacket,
        frame_rssi: f32,
        frame_snr: f32,
        frame_seq: u16,
        now: Instant,
    ) -> Vec<RoutingEvent> {
        if packet.sender_address == self.local_address || packet.sender_address.is_broadcast() {
            self.stats.record_drop(DropReason::Malformed);
            return Vec::new();
        }
        self.stats.record_rx_hello();

        let mut events = Vec::new();

        let sender_node = NetworkNode {
            address: packet.sender_address,
            metric: 1,
            role: packet.sender_role,
            gateway_load: packet.sender_gateway_load,
        };
        if let Some(event) = self.process_node(packet.sender_address, sender_node, now) {
            events.push(event);
        }

        self.link_metrics
            .update(packet.sender_address, frame_rssi, frame_snr, frame_seq);
        self.route_table
            .update_received_snr(packet.sender_address, frame_snr.round() as i8);

        for node in &packet.node_list {
            let metric = match node.metric.checked_add(1) {
                Some(m) if m <= self.hop_max => m,
                _ => continue,
            };
            let adjusted = NetworkNode { metric, ..*node };
            if let Some(event) = self.process_node(packet.sender_address, adjusted, now) {
                events.push(event);
            }
        }

        events
    }

    fn process_node(&self, via: Address, node: NetworkNode, now: Instant) -> Option<RoutingEvent> {
        if node.address == self.local_address {
            return None;
        }

        match self.route_table.find(node.address) {
            None => {
                if self.route_table.is_full() {
                    self.stats.record_drop(DropReason::TableFull);
                    return None;
                }
                let entry = RouteEntry {
                    destination: node.address,
                    via,
                    metric: node.metric,
                    role: node.role,
                    gateway_load: node.gateway_load,
                    timeout: now + self.route_table.route_ttl(),
                    received_snr: None,
                };
                if self.route_table.install(entry) {
                    Some(RoutingEvent::RouteInstalled {
                        destination: node.address,
                        via,
                        metric: node.metric,
                    })
                } else {
                    None
                }
            }
            Some(entry) => {
                let is_refresh_candidate = node.metric == entry.metric && via == entry.via;

                let should_replace = match &self.cost {
                    Some(cost_fn) => {
                        let avg_load = self.average_gateway_load();
                        let new_cost = cost_fn.cost(&self.cost_inputs(
                            node.metric,
                            via,
                            node.role,
                            node.gateway_load,
                            avg_load,
                        ));
                        let current_cost = cost_fn.cost(&self.cost_inputs(
                            entry.metric,
                            entry.via,
                            entry.role,
                            entry.gateway_load,
                            avg_load,
                        ));
                        let threshold = if node.metric > entry.metric {
                            MORE_HOPS_HYSTERESIS
                        } else {
                            REPLACE_HYSTERESIS
                        };
                        new_cost < current_cost * threshold
                    }
                    None => node.metric < entry.metric,
                };

                let mut event = None;
                if should_replace {
                    self.route_table.replace(node.address, via, node.metric, now);
                    self.stats.record_replacement();
                    event = Some(RoutingEvent::RouteReplaced {
                        destination: node.address,
                        old_via: entry.via,
                        old_metric: entry.metric,
                        new_via: via,
                        new_metric: node.metric,
                    });
                } else if is_refresh_candidate {
                    self.route_table.refresh_timeout(node.address, now);
                }

                if node.gateway_load != 255 && node.gateway_load != entry.gateway_load {
                    self.route_table.update_gateway_load(node.address, node.gateway_load);
                }

                let current_via = self.route_table.next_hop(node.address);
                if current_via == via {
                    if let Some(current) = self.route_table.find(node.address) {
                        if current.role != node.role {
                            self.route_table.update_role(node.address, node.role);
                        }
                    }
                }

                event
            }
        }
    }

    fn average_gateway_load(&self) -> Option<f32> {
        let loads: Vec<f32> = self
            .route_table
            .snapshot_network_nodes()
            .into_iter()
            .filter(|n| n.role.is_gateway() && n.gateway_load != 255)
            .map(|n| n.gateway_load as f32)
            .collect();
        if loads.is_empty() {
            None
        } else {
            Some(loads.iter().sum::<f32>() / loads.len() as f32)
        }
    }

    fn cost_inputs(
        &self,
        hops: u8,
        via: Address,
        dest_role: crate::address::Role,
        dest_gateway_load: u8,
        avg_gateway_load: Option<f32>,
    ) -> CostInputs {
        let link = self.link_metrics.snapshot(via);
        let destination_gateway_load = if dest_role.is_gateway() && dest_gateway_load != 255 {
            Some(dest_gateway_load)
        } else {
            None
        };
        CostInputs {
            hops,
            link,
            destination_gateway_load,
            avg_gateway_load,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Role;
    use crate::config::Limits;
    use crate::cost::{CostWeights, WeightedCost};
    use loramesh_macros::esp32_test;

    fn processor(
        local: u16,
        cost: Option<Arc<dyn CostFunction>>,
    ) -> (RouteProcessor, Arc<RouteTable>, Arc<LinkMetrics>) {
        let route_table = Arc::new(RouteTable::new(Address(local), Limits::default()));
        let link_metrics = Arc::new(LinkMetrics::new(8));
        let stats = Arc::new(Stats::new());
        let processor = RouteProcessor::new(
            Address(local),
            15,
            route_table.clone(),
            link_metrics.clone(),
            cost,
            stats,
        );
        (processor, route_table, link_metrics)
    }

    fn hello(sender: u16, nodes: Vec<NetworkNode>) -> RoutePacket {
        RoutePacket {
            sender_address: Address(sender),
            sender_role: Role::ROUTER,
            sender_gateway_load: 255,
            node_list: nodes,
        }
    }

    #[esp32_test]
    fn test_first_hello_installs_implicit_sender_route() {
        let (processor, route_table, _) = processor(1, None);
        let events = processor.on_hello(&hello(2, vec![]), -70.0, 6.0, 0, Instant::now());
        assert!(events.iter().any(|e| matches!(e, RoutingEvent::RouteInstalled { destination: Address(2), via: Address(2), metric: 1 })));
        assert_eq!(route_table.next_hop(Address(2)), Address(2));
    }

    #[esp32_test]
    fn test_advertised_node_metric_incremented() {
        let (processor, route_table, _) = processor(1, None);
        let node = NetworkNode { address: Address(3), metric: 1, role: Role::ROUTER, gateway_load: 255 };
        processor.on_hello(&hello(2, vec![node]), -70.0, 6.0, 0, Instant::now());
        assert_eq!(route_table.hops(Address(3)), 2);
        assert_eq!(route_table.next_hop(Address(3)), Address(2));
    }

    #[esp32_test]
    fn test_self_address_never_installed() {
        let (processor, route_table, _) = processor(1, None);
        let node = NetworkNode { address: Address(1), metric: 1, role: Role::ROUTER, gateway_load: 255 };
        processor.on_hello(&hello(2, vec![node]), -70.0, 6.0, 0, Instant::now());
        assert_eq!(route_table.find(Address(1)), None);
    }

    #[esp32_test]
    fn test_no_cost_mode_replaces_only_on_strictly_better_metric() {
        let (processor, route_table, _) = processor(1, None);
        let now = Instant::now();
        let node3_via4 = NetworkNode { address: Address(3), metric: 2, role: Role::ROUTER, gateway_load: 255 };
        processor.on_hello(&hello(4, vec![node3_via4]), -70.0, 6.0, 0, now);
        assert_eq!(route_table.hops(Address(3)), 3);

        // worse-or-equal via a different neighbor should not replace
        let node3_via5 = NetworkNode { address: Address(3), metric: 2, role: Role::ROUTER, gateway_load: 255 };
        processor.on_hello(&hello(5, vec![node3_via5]), -70.0, 6.0, 0, now);
        assert_eq!(route_table.next_hop(Address(3)), Address(4));

        // strictly better should replace
        let node3_better = NetworkNode { address: Address(3), metric: 1, role: Role::ROUTER, gateway_load: 255 };
        processor.on_hello(&hello(6, vec![node3_better]), -70.0, 6.0, 0, now);
        assert_eq!(route_table.next_hop(Address(3)), Address(6));
    }

    #[esp32_test]
    fn test_same_via_same_metric_refreshes_not_replaces() {
        let (processor, route_table, _) = processor(1, None);
        let now = Instant::now();
        let node = NetworkNode { address: Address(3), metric: 1, role: Role::ROUTER, gateway_load: 255 };
        processor.on_hello(&hello(2, vec![node]), -70.0, 6.0, 0, now);
        let before = route_table.find(Address(3)).unwrap();
        let events = processor.on_hello(&hello(2, vec![node]), -70.0, 6.0, 1, now + std::time::Duration::from_secs(5));
        let after = route_table.find(Address(3)).unwrap();
        assert!(after.timeout > before.timeout);
        assert!(!events.iter().any(|e| matches!(e, RoutingEvent::RouteReplaced { .. })));
    }

    #[esp32_test]
    fn test_gateway_load_updates_when_known() {
        let (processor, route_table, _) = processor(1, None);
        let now = Instant::now();
        let node = NetworkNode { address: Address(3), metric: 1, role: Role::GATEWAY, gateway_load: 40 };
        processor.on_hello(&hello(2, vec![node]), -70.0, 6.0, 0, now);
        let node_updated = NetworkNode { address: Address(3), metric: 1, role: Role::GATEWAY, gateway_load: 90 };
        processor.on_hello(&hello(2, vec![node_updated]), -70.0, 6.0, 1, now);
        assert_eq!(route_table.find(Address(3)).unwrap().gateway_load, 90);
    }

    #[esp32_test]
    fn test_table_full_drops_new_destination() {
        let mut limits = Limits::default();
        limits.max_routes = 1;
        let route_table = Arc::new(RouteTable::new(Address(1), limits));
        let link_metrics = Arc::new(LinkMetrics::new(8));
        let stats = Arc::new(Stats::new());
        let processor = RouteProcessor::new(Address(1), 15, route_table.clone(), link_metrics, None, stats);
        let now = Instant::now();
        processor.on_hello(&hello(2, vec![]), -70.0, 6.0, 0, now);
        assert_eq!(route_table.size(), 1);
        processor.on_hello(&hello(3, vec![]), -70.0, 6.0, 0, now);
        assert_eq!(route_table.size(), 1);
        assert!(route_table.find(Address(3)).is_none());
    }

    #[esp32_test]
    fn test_cost_mode_two_hop_strong_link_replaces_one_hop_marginal() {
        let cost: Arc<dyn CostFunction> = Arc::new(WeightedCost::new(CostWeights::default()));
        let (processor, route_table, link_metrics) = processor(1, Some(cost));
        let now = Instant::now();

        // one-hop marginal path via neighbor 2
        link_metrics.update(Address(2), -130.0, -15.0, 0);
        let node_via2 = NetworkNode { address: Address(9), metric: 1, role: Role::ROUTER, gateway_load: 255 };
        processor.on_hello(&hello(2, vec![node_via2]), -130.0, -15.0, 0, now);
        assert_eq!(route_table.next_hop(Address(9)), Address(2));

        // two-hop strong path via neighbor 3
        link_metrics.update(Address(3), -60.0, 8.0, 0);
        let node_via3 = NetworkNode { address: Address(9), metric: 1, role: Role::ROUTER, gateway_load: 255 };
        processor.on_hello(&hello(3, vec![node_via3]), -60.0, 8.0, 0, now);

        assert_eq!(route_table.next_hop(Address(9)), Address(3));
    }

    #[esp32_test]
    fn test_hop_max_exceeded_is_dropped() {
        let (processor, route_table, _) = processor(1, None);
        let node = NetworkNode { address: Address(9), metric: 255, role: Role::ROUTER, gateway_load: 255 };
        processor.on_hello(&hello(2, vec![node]), -70.0, 6.0, 0, Instant::now());
        assert!(route_table.find(Address(9)).is_none());
    }
}
