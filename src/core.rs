//! Wires every component into one value type a binary can own and tick.
//!
//! Replaces the teacher's static-singleton transport with an ordinary
//! struct: nothing here is global, so multiple `RoutingCore`s can exist
//! in one process (useful for host-side multi-node simulation and tests).

use crate::address::{Address, Role};
use crate::config::RoutingConfig;
use crate::cost::{CostFunction, WeightedCost};
use crate::error::SendOutcome;
use crate::events::{EventSink, LogEventSink, RoutingEvent};
use crate::forwarder::{ForwardOutcome, Forwarder};
use crate::health::HealthMonitor;
use crate::hello_scheduler::{GatewayLoadProvider, HelloScheduler};
use crate::link_metrics::LinkMetrics;
use crate::radio_io::RadioIo;
use crate::route_processor::RouteProcessor;
use crate::route_table::RouteTable;
use crate::stats::Stats;
use crate::trickle::Trickle;
use crate::wire::{DataPacket, RoutePacket};
use std::sync::Arc;
use std::time::Instant;

/// Everything needed to run one mesh node's routing stack.
pub struct RoutingCore {
    local_address: Address,
    route_table: Arc<RouteTable>,
    link_metrics: Arc<LinkMetrics>,
    route_processor: RouteProcessor,
    hello_scheduler: HelloScheduler,
    health: HealthMonitor,
    forwarder: Forwarder,
    radio: Arc<dyn RadioIo>,
    stats: Arc<Stats>,
    events: Arc<dyn EventSink>,
}

impl RoutingCore {
    pub fn new(
        local_address: Address,
        local_role: Role,
        config: RoutingConfig,
        radio: Arc<dyn RadioIo>,
        gateway_load: GatewayLoadProvider,
    ) -> Result<Self, crate::error::ConfigError> {
        Self::with_event_sink(
            local_address,
            local_role,
            config,
            radio,
            gateway_load,
            Arc::new(LogEventSink),
        )
    }

    pub fn with_event_sink(
        local_address: Address,
        local_role: Role,
        config: RoutingConfig,
        radio: Arc<dyn RadioIo>,
        gateway_load: GatewayLoadProvider,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, crate::error::ConfigError> {
        config.validate()?;

        let route_table = Arc::new(RouteTable::new(local_address, config.limits));
        let link_metrics = Arc::new(LinkMetrics::new(config.limits.ack_window));
        let stats = Arc::new(Stats::new());

        // `cost_weights: None` must reach RouteProcessor as `cost: None` so
        // it takes the plain "replace iff strictly fewer hops" branch
        // (spec §4.2) instead of applying cost hysteresis to raw hop
        // counts, which would stop HOPCOUNT mode from minimizing hops.
        let cost: Option<Arc<dyn CostFunction>> = config
            .cost_weights
            .map(|weights| Arc::new(WeightedCost::new(weights)) as Arc<dyn CostFunction>);

        let route_processor = RouteProcessor::new(
            local_address,
            config.limits.hop_max,
            route_table.clone(),
            link_metrics.clone(),
            cost,
            stats.clone(),
        );

        let trickle = Trickle::new(config.trickle, Instant::now(), Box::new(rand::random::<f64>));
        let hello_scheduler = HelloScheduler::new(
            local_address,
            local_role,
            config.safety_interval,
            trickle,
            route_table.clone(),
            radio.clone(),
            stats.clone(),
            gateway_load,
        );

        let health = HealthMonitor::new(config.health);

        let forwarder = Forwarder::new(
            local_address,
            route_table.clone(),
            radio.clone(),
            stats.clone(),
            crate::duplicate_cache::DuplicateCacheConfig {
                max_entries: config.limits.duplicate_cache_size,
                ttl: config.limits.duplicate_cache_ttl,
            },
            config.limits.default_ttl,
            config.flood,
        );

        Ok(Self {
            local_address,
            route_table,
            link_metrics,
            route_processor,
            hello_scheduler,
            health,
            forwarder,
            radio,
            stats,
            events,
        })
    }

    /// Poll the radio once, routing whatever it delivers. Intended to be
    /// called from a tight loop or a dedicated receive task.
    pub fn poll_radio(&self, now: Instant) {
        while let Some(frame) = self.radio.poll_rx() {
            self.handle_frame(frame, now);
        }
    }

    fn handle_frame(&self, frame: crate::radio_io::ReceivedFrame, now: Instant) {
        use crate::radio_io::FrameKind;
        match frame.kind {
            FrameKind::Control => match RoutePacket::from_bytes(&frame.payload) {
                Ok(packet) => self.handle_hello(packet, frame.rssi, frame.snr, frame.link_seq, now),
                Err(_) => self.stats.record_drop(crate::error::DropReason::Malformed),
            },
            FrameKind::Data => match DataPacket::from_bytes(&frame.payload) {
                Ok(packet) => {
                    self.handle_data(packet, now);
                }
                Err(_) => self.stats.record_drop(crate::error::DropReason::Malformed),
            },
        }
    }

    fn handle_hello(&self, packet: RoutePacket, rssi: f32, snr: f32, seq: u16, now: Instant) {
        let sender = packet.sender_address;
        let size_before = self.route_table.size();

        let events = self.route_processor.on_hello(&packet, rssi, snr, seq, now);

        self.hello_scheduler.consistency_handle().heard_consistent();
        if let Some(event) = self.health.observe(sender, now) {
            if matches!(event, RoutingEvent::Recovered { .. }) {
                self.stats.record_recovery();
            }
            self.events.emit(event);
        }

        let topology_changed = self.route_table.size() != size_before
            || events
                .iter()
                .any(|e| matches!(e, RoutingEvent::RouteReplaced { .. }));
        if topology_changed {
            self.hello_scheduler.reset_trickle(now);
        }

        for event in events {
            self.events.emit(event);
        }
    }

    fn handle_data(&self, packet: DataPacket, now: Instant) -> Option<Vec<u8>> {
        match self.forwarder.handle_inbound(packet, now) {
            ForwardOutcome::DeliveredLocal(payload) => Some(payload),
            _ => None,
        }
    }

    /// Send an application payload to `dst`.
    pub fn send(&self, dst: Address, kind: u8, payload: Vec<u8>) -> SendOutcome {
        self.forwarder.send(dst, kind, payload)
    }

    /// Drive Trickle/HelloScheduler. Call at >= 1 Hz.
    pub fn tick_hello(&self, now: Instant) {
        if let Some(event) = self.hello_scheduler.tick(now) {
            self.events.emit(event);
        }
    }

    /// Drive HealthMonitor. Call at >= 1 Hz.
    pub fn tick_health(&self, now: Instant) {
        let events = self.health.tick(now, &self.route_table);
        let faulted = events.iter().any(|e| matches!(e, RoutingEvent::FaultDetected { .. }));
        for event in &events {
            match event {
                RoutingEvent::RouteRemoved { destination } => self.link_metrics.remove(*destination),
                RoutingEvent::FaultDetected { .. } => self.stats.record_fault(),
                _ => {}
            }
        }
        if faulted {
            self.hello_scheduler.reset_trickle(now);
        }
        for event in events {
            self.events.emit(event);
        }
    }

    /// Sweep expired route entries. Call periodically (not necessarily at
    /// 1 Hz — route TTLs are minutes, not seconds).
    pub fn tick_expiry(&self, now: Instant) {
        for destination in self.route_table.sweep_expired(now) {
            self.link_metrics.remove(destination);
            self.health.remove(destination);
            self.events.emit(RoutingEvent::RouteRemoved { destination });
        }
    }

    pub fn local_address(&self) -> Address {
        self.local_address
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    pub fn route_table(&self) -> &RouteTable {
        &self.route_table
    }
}
