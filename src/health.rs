//! Per-neighbor liveness and fault detection (spec §4.6).
//!
//! FAULT side effects (route removal, then a Trickle reset) must happen
//! in that order. This module only owns the route removal half: it
//! returns the events that occurred on a tick so the caller — which also
//! owns the Trickle instance, inside HelloScheduler — can reset Trickle
//! after seeing a `FaultDetected` event.

use crate::address::Address;
use crate::config::HealthConfig;
use crate::events::RoutingEvent;
use crate::route_table::RouteTable;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Healthy,
    Warning,
    Fault,
}

struct NeighborHealth {
    last_heard: Instant,
    status: Status,
}

/// Tracks last-heard times and liveness status for every neighbor that
/// has ever sent a HELLO.
pub struct HealthMonitor {
    config: HealthConfig,
    neighbors: Mutex<HashMap<Address, NeighborHealth>>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            neighbors: Mutex::new(HashMap::new()),
        }
    }

    /// Called whenever a HELLO is heard from `neighbor`. Returns
    /// `Some(Recovered)` if the neighbor had previously crossed WARNING
    /// or FAULT.
    pub fn observe(&self, neighbor: Address, now: Instant) -> Option<RoutingEvent> {
        let mut table = self.neighbors.lock().unwrap();
        let health = table.entry(neighbor).or_insert(NeighborHealth {
            last_heard: now,
            status: Status::Healthy,
        });
        let was_unhealthy = health.status != Status::Healthy;
        health.last_heard = now;
        health.status = Status::Healthy;
        if was_unhealthy {
            Some(RoutingEvent::Recovered { neighbor })
        } else {
            None
        }
    }

    /// Evaluate every tracked neighbor's silence against the WARNING and
    /// FAULT thresholds. On FAULT, removes the neighbor's route and every
    /// route via it from `route_table`, emitting `FaultDetected` followed
    /// by one `RouteRemoved` per entry torn down.
    pub fn tick(&self, now: Instant, route_table: &RouteTable) -> Vec<RoutingEvent> {
        let mut events = Vec::new();
        let mut table = self.neighbors.lock().unwrap();
        for (&neighbor, health) in table.iter_mut() {
            let silence = now.saturating_duration_since(health.last_heard);
            if silence >= self.config.fault_silence && health.status != Status::Fault {
                health.status = Status::Fault;
                events.push(RoutingEvent::FaultDetected { neighbor });
                for destination in route_table.remove_neighbor_and_dependents(neighbor) {
                    events.push(RoutingEvent::RouteRemoved { destination });
                }
            } else if silence >= self.config.warning_silence && health.status == Status::Healthy {
                health.status = Status::Warning;
            }
        }
        events
    }

    /// Drop a neighbor's tracked health state entirely, e.g. after table
    /// eviction removes its route through a path other than FAULT.
    pub fn remove(&self, neighbor: Address) {
        self.neighbors.lock().unwrap().remove(&neighbor);
    }

    pub fn len(&self) -> usize {
        self.neighbors.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Role;
    use crate::config::Limits;
    use crate::route_table::RouteEntry;
    use loramesh_macros::esp32_test;
    use std::time::Duration;

    fn entry(dest: u16, via: u16) -> RouteEntry {
        RouteEntry {
            destination: Address(dest),
            via: Address(via),
            metric: 1,
            role: Role::ROUTER,
            gateway_load: 255,
            timeout: Instant::now() + Duration::from_secs(600),
            received_snr: None,
        }
    }

    #[esp32_test]
    fn test_observe_first_time_returns_none() {
        let monitor = HealthMonitor::new(HealthConfig::default());
        assert_eq!(monitor.observe(Address(1), Instant::now()), None);
    }

    #[esp32_test]
    fn test_no_events_before_warning_threshold() {
        let monitor = HealthMonitor::new(HealthConfig::default());
        let table = RouteTable::new(Address(0), Limits::default());
        let now = Instant::now();
        monitor.observe(Address(1), now);
        let events = monitor.tick(now + Duration::from_secs(10), &table);
        assert!(events.is_empty());
    }

    #[esp32_test]
    fn test_fault_removes_neighbor_and_dependent_routes() {
        let monitor = HealthMonitor::new(HealthConfig::default());
        let table = RouteTable::new(Address(0), Limits::default());
        table.install(entry(2, 2));
        table.install(entry(3, 2));
        let now = Instant::now();
        monitor.observe(Address(2), now);
        let events = monitor.tick(now + Duration::from_secs(361), &table);
        assert!(events.contains(&RoutingEvent::FaultDetected { neighbor: Address(2) }));
        assert!(events.contains(&RoutingEvent::RouteRemoved { destination: Address(2) }));
        assert!(events.contains(&RoutingEvent::RouteRemoved { destination: Address(3) }));
        assert_eq!(table.size(), 0);
    }

    #[esp32_test]
    fn test_fault_fires_only_once() {
        let monitor = HealthMonitor::new(HealthConfig::default());
        let table = RouteTable::new(Address(0), Limits::default());
        table.install(entry(2, 2));
        let now = Instant::now();
        monitor.observe(Address(2), now);
        monitor.tick(now + Duration::from_secs(361), &table);
        let second = monitor.tick(now + Duration::from_secs(400), &table);
        assert!(second.is_empty());
    }

    #[esp32_test]
    fn test_recovered_after_fault() {
        let monitor = HealthMonitor::new(HealthConfig::default());
        let table = RouteTable::new(Address(0), Limits::default());
        let now = Instant::now();
        monitor.observe(Address(2), now);
        monitor.tick(now + Duration::from_secs(361), &table);
        let recovered = monitor.observe(Address(2), now + Duration::from_secs(400));
        assert_eq!(recovered, Some(RoutingEvent::Recovered { neighbor: Address(2) }));
    }

    #[esp32_test]
    fn test_remove_drops_tracking() {
        let monitor = HealthMonitor::new(HealthConfig::default());
        monitor.observe(Address(1), Instant::now());
        assert_eq!(monitor.len(), 1);
        monitor.remove(Address(1));
        assert_eq!(monitor.len(), 0);
    }
}
