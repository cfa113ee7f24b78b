//! Structured routing events.
//!
//! Replaces the free-form `ESP_LOGI`-style logging of the source firmware
//! with a typed sink: callers that want human-readable output format these
//! with `log::info!`/`log::debug!`; callers that want to react to specific
//! transitions (tests, the stats server, a future UI) match on the enum
//! instead of scraping strings.

use crate::address::Address;
use crate::stats::StatsSnapshot;

/// One routing-relevant occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingEvent {
    /// A destination was seen for the first time and a route installed.
    RouteInstalled { destination: Address, via: Address, metric: u8 },
    /// An existing route's via/metric changed.
    RouteReplaced {
        destination: Address,
        old_via: Address,
        old_metric: u8,
        new_via: Address,
        new_metric: u8,
    },
    /// A route entry was removed (timeout, fault, or eviction).
    RouteRemoved { destination: Address },
    /// A neighbor crossed the FAULT threshold.
    FaultDetected { neighbor: Address },
    /// A previously faulted/warned neighbor was heard from again.
    Recovered { neighbor: Address },
    /// Trickle fired and HelloScheduler sent a HELLO.
    TrickleTx { interval_secs: u64 },
    /// The safety floor forced a HELLO that Trickle would have suppressed.
    SafetyTx,
    /// Periodic stats snapshot, emitted by whatever drives the tick loop.
    Stats(StatsSnapshot),
}

/// Something that consumes [`RoutingEvent`]s.
///
/// The default, zero-dependency sink is `log::info!`/`log::debug!`; tests
/// use a `Vec`-backed sink (see `core.rs` tests) to assert on ordering.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RoutingEvent);
}

/// Sink that formats every event through the `log` facade.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: RoutingEvent) {
        match event {
            RoutingEvent::RouteInstalled { destination, via, metric } => {
                log::info!("route installed: {destination} via {via} metric {metric}");
            }
            RoutingEvent::RouteReplaced {
                destination,
                old_via,
                old_metric,
                new_via,
                new_metric,
            } => {
                log::info!(
                    "route replaced: {destination} via {old_via}({old_metric}) -> {new_via}({new_metric})"
                );
            }
            RoutingEvent::RouteRemoved { destination } => {
                log::info!("route removed: {destination}");
            }
            RoutingEvent::FaultDetected { neighbor } => {
                log::warn!("neighbor fault: {neighbor}");
            }
            RoutingEvent::Recovered { neighbor } => {
                log::info!("neighbor recovered: {neighbor}");
            }
            RoutingEvent::TrickleTx { interval_secs } => {
                log::debug!("trickle tx, interval {interval_secs}s");
            }
            RoutingEvent::SafetyTx => {
                log::warn!("safety hello forced");
            }
            RoutingEvent::Stats(snapshot) => {
                log::debug!("stats: {:?}", snapshot);
            }
        }
    }
}
