//! Routing node configuration.
//!
//! Every config type here is `Copy`, has a sensible `Default`, and exposes
//! `validate()` so `RoutingCore::new` can reject out-of-range deployments
//! at construction time instead of behaving strangely at runtime.

use crate::cost::CostWeights;
use crate::error::ConfigError;
use std::time::Duration;

/// RFC 6206 Trickle timer parameters (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrickleConfig {
    pub i_min: Duration,
    pub i_max: Duration,
    pub k: u32,
}

impl Default for TrickleConfig {
    fn default() -> Self {
        Self {
            i_min: Duration::from_secs(60),
            i_max: Duration::from_secs(600),
            k: 1,
        }
    }
}

impl TrickleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.i_min.is_zero() {
            return Err(ConfigError::InvalidConfig("i_min must be greater than 0"));
        }
        if self.i_max < self.i_min {
            return Err(ConfigError::InvalidConfig("i_max must be >= i_min"));
        }
        if self.k == 0 {
            return Err(ConfigError::InvalidConfig("k must be at least 1"));
        }
        Ok(())
    }
}

/// HealthMonitor silence thresholds (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthConfig {
    pub warning_silence: Duration,
    pub fault_silence: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            warning_silence: Duration::from_secs(180),
            fault_silence: Duration::from_secs(360),
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.warning_silence.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "warning_silence must be greater than 0",
            ));
        }
        if self.fault_silence <= self.warning_silence {
            return Err(ConfigError::InvalidConfig(
                "fault_silence must exceed warning_silence",
            ));
        }
        Ok(())
    }
}

/// Table sizing and per-packet limits (spec §3, §4.2, §4.7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// RTMAXSIZE: maximum route table entries (typically 10..16).
    pub max_routes: usize,
    /// HOP_MAX: ceiling on a route's hop count (typically 8..15).
    pub hop_max: u8,
    /// Starting TTL stamped on locally-originated DATA frames (3..5).
    pub default_ttl: u8,
    /// LinkMetrics ack window width (8..16).
    pub ack_window: usize,
    /// P1 duplicate-cache capacity, entries.
    pub duplicate_cache_size: usize,
    /// P1 duplicate-cache entry lifetime.
    pub duplicate_cache_ttl: Duration,
    /// How long a route entry survives without a refreshing HELLO before
    /// the timeout sweep considers it for removal.
    pub route_ttl: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_routes: 16,
            hop_max: 15,
            default_ttl: 4,
            ack_window: 8,
            duplicate_cache_size: 64,
            duplicate_cache_ttl: Duration::from_secs(300),
            route_ttl: Duration::from_secs(600),
        }
    }
}

impl Limits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_routes == 0 {
            return Err(ConfigError::InvalidConfig("max_routes must be greater than 0"));
        }
        if !(1..=15).contains(&self.hop_max) {
            return Err(ConfigError::InvalidConfig("hop_max must be in 1..=15"));
        }
        if self.default_ttl == 0 {
            return Err(ConfigError::InvalidConfig("default_ttl must be greater than 0"));
        }
        if !(crate::link_metrics::MIN_WINDOW..=crate::link_metrics::MAX_WINDOW)
            .contains(&self.ack_window)
        {
            return Err(ConfigError::InvalidConfig("ack_window must be in 8..=16"));
        }
        if self.duplicate_cache_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "duplicate_cache_size must be greater than 0",
            ));
        }
        if self.route_ttl.is_zero() {
            return Err(ConfigError::InvalidConfig("route_ttl must be greater than 0"));
        }
        Ok(())
    }
}

/// Top-level routing configuration, composing the pieces above plus the
/// HelloScheduler's independent safety floor and the three-way mode
/// selector of spec §6: `flood` picks P1, and — when `flood` is false —
/// `cost_weights: None` degrades route selection to plain hop-count
/// distance-vector (P2) while `Some(weights)` enables the full
/// multi-metric P3 cost function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingConfig {
    pub trickle: TrickleConfig,
    pub health: HealthConfig,
    pub limits: Limits,
    pub cost_weights: Option<CostWeights>,
    /// P1 controlled-flooding mode: the `Forwarder` dedups and floods
    /// every packet, not just broadcasts, via its duplicate cache instead
    /// of following routed next hops (spec §4.7).
    pub flood: bool,
    /// HelloScheduler's maximum-silence floor (spec §4.5), independent of
    /// Trickle's own suppression logic.
    pub safety_interval: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            trickle: TrickleConfig::default(),
            health: HealthConfig::default(),
            limits: Limits::default(),
            cost_weights: Some(CostWeights::default()),
            flood: false,
            safety_interval: Duration::from_secs(180),
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trickle.validate()?;
        self.health.validate()?;
        self.limits.validate()?;
        if let Some(weights) = self.cost_weights {
            weights.validate()?;
        }
        if self.safety_interval.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "safety_interval must be greater than 0",
            ));
        }
        Ok(())
    }
}
