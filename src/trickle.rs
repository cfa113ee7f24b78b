//! RFC 6206-style Trickle timer (spec §4.5).
//!
//! `tick(now)` is pure given its inputs and current state — no internal
//! clock reads — mirroring the on-demand `refill()` style the duty-cycle
//! limiter uses for its token bucket. The one piece of external
//! randomness (the transmit-point draw) is injected as a closure so tests
//! can pin it.
//!
//! `consistencyCount` is the one field touched from outside the owning
//! task (the receive-decoding context calls `heard_consistent()`), so it
//! alone is an atomic; everything else here is only ever touched from the
//! HelloScheduler context and needs no synchronization (spec §5).

use crate::config::TrickleConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cheap, lock-free handle to a Trickle's consistency counter.
///
/// Cloning this (instead of sharing the whole `Trickle`, which also holds
/// state only the owning HelloScheduler task may touch) is how the
/// receive-decoding context reports a heard HELLO without contending with
/// anything `tick()` is doing.
#[derive(Clone)]
pub struct ConsistencyHandle(Arc<AtomicU32>);

impl ConsistencyHandle {
    pub fn heard_consistent(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// Suppression cap: a transmit point may be suppressed at most this many
/// times in a row before Trickle gives up waiting for more consistency.
pub const SUPPRESS_CAP: u32 = 4;

/// Result of one `tick()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrickleDecision {
    pub should_tx: bool,
    /// How long the caller may sleep before the next meaningful tick.
    pub sleep: Duration,
}

/// Trickle timer state.
pub struct Trickle {
    config: TrickleConfig,
    i: Duration,
    interval_start: Instant,
    transmit_point: Instant,
    /// Whether this interval's transmit point has already been evaluated.
    fired: bool,
    consistency_count: Arc<AtomicU32>,
    suppress_count: u32,
    last_tx_time: Option<Instant>,
    rng: Box<dyn FnMut() -> f64 + Send>,
}

impl Trickle {
    /// `rng` must produce values uniformly distributed in `[0.0, 1.0)`.
    pub fn new(config: TrickleConfig, now: Instant, mut rng: Box<dyn FnMut() -> f64 + Send>) -> Self {
        let i = config.i_min;
        let transmit_point = now + Self::sample_offset(i, &mut rng);
        Self {
            config,
            i,
            interval_start: now,
            transmit_point,
            fired: false,
            consistency_count: Arc::new(AtomicU32::new(0)),
            suppress_count: 0,
            last_tx_time: None,
            rng,
        }
    }

    fn sample_offset(i: Duration, rng: &mut (dyn FnMut() -> f64 + Send)) -> Duration {
        let half = i / 2;
        let fraction = rng().clamp(0.0, 1.0);
        half + Duration::from_secs_f64(half.as_secs_f64() * fraction)
    }

    /// Called from the receive-decoding context whenever a HELLO arrives.
    /// Lock-free: a single atomic increment.
    pub fn heard_consistent(&self) {
        self.consistency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// A lock-free handle the receive-decoding context can hold onto and
    /// call from outside whatever owns this `Trickle`.
    pub fn consistency_handle(&self) -> ConsistencyHandle {
        ConsistencyHandle(self.consistency_count.clone())
    }

    /// Advance the timer to `now`, returning whether to transmit and how
    /// long the caller may sleep.
    pub fn tick(&mut self, now: Instant) -> TrickleDecision {
        let mut should_tx = false;

        if !self.fired && now >= self.transmit_point {
            let consistency = self.consistency_count.load(Ordering::Relaxed);
            if consistency >= self.config.k && self.suppress_count < SUPPRESS_CAP {
                self.suppress_count += 1;
            } else {
                should_tx = true;
                self.suppress_count = 0;
                self.last_tx_time = Some(now);
            }
            self.fired = true;
        }

        let interval_end = self.interval_start + self.i;
        if now >= interval_end {
            self.i = (self.i * 2).min(self.config.i_max);
            self.interval_start = now;
            self.consistency_count.store(0, Ordering::Relaxed);
            self.fired = false;
            self.transmit_point = now + Self::sample_offset(self.i, &mut self.rng);
        }

        let next_wake = if self.fired {
            self.interval_start + self.i
        } else {
            self.transmit_point
        };
        TrickleDecision {
            should_tx,
            sleep: next_wake.saturating_duration_since(now),
        }
    }

    /// Called on topology change (route table size or via-change) and on
    /// fault detection. Restarts at `I_min` with a fresh transmit point.
    pub fn reset(&mut self, now: Instant) {
        self.i = self.config.i_min;
        self.interval_start = now;
        self.consistency_count.store(0, Ordering::Relaxed);
        self.suppress_count = 0;
        self.fired = false;
        self.transmit_point = now + Self::sample_offset(self.i, &mut self.rng);
    }

    pub fn current_interval(&self) -> Duration {
        self.i
    }

    pub fn last_tx_time(&self) -> Option<Instant> {
        self.last_tx_time
    }

    /// Called by HelloScheduler when the safety floor forces a transmission
    /// Trickle itself would have suppressed. Clears the suppression streak
    /// without touching `I` or `consistencyCount` (spec §4.5).
    pub fn note_forced_tx(&mut self, now: Instant) {
        self.suppress_count = 0;
        self.last_tx_time = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loramesh_macros::esp32_test;

    fn fixed_rng(value: f64) -> Box<dyn FnMut() -> f64 + Send> {
        Box::new(move || value)
    }

    fn test_config() -> TrickleConfig {
        TrickleConfig {
            i_min: Duration::from_secs(60),
            i_max: Duration::from_secs(600),
            k: 1,
        }
    }

    #[esp32_test]
    fn test_starts_at_i_min_with_transmit_point_in_second_half() {
        let now = Instant::now();
        let trickle = Trickle::new(test_config(), now, fixed_rng(0.0));
        assert_eq!(trickle.current_interval(), Duration::from_secs(60));
        assert!(trickle.transmit_point >= now + Duration::from_secs(30));
        assert!(trickle.transmit_point <= now + Duration::from_secs(60));
    }

    #[esp32_test]
    fn test_before_transmit_point_reports_no_tx_and_sleep() {
        let now = Instant::now();
        let mut trickle = Trickle::new(test_config(), now, fixed_rng(1.0)); // transmit_point = now + 60s
        let decision = trickle.tick(now + Duration::from_secs(10));
        assert!(!decision.should_tx);
        assert!(decision.sleep > Duration::ZERO);
    }

    #[esp32_test]
    fn test_transmits_when_no_consistency_heard() {
        let now = Instant::now();
        let mut trickle = Trickle::new(test_config(), now, fixed_rng(0.0)); // transmit_point = now + 30s
        let decision = trickle.tick(now + Duration::from_secs(30));
        assert!(decision.should_tx);
    }

    #[esp32_test]
    fn test_suppresses_when_consistency_met() {
        let now = Instant::now();
        let mut trickle = Trickle::new(test_config(), now, fixed_rng(0.0));
        trickle.heard_consistent();
        let decision = trickle.tick(now + Duration::from_secs(30));
        assert!(!decision.should_tx);
    }

    #[esp32_test]
    fn test_suppression_capped_then_forces_tx() {
        let now = Instant::now();
        let mut trickle = Trickle::new(test_config(), now, fixed_rng(1.0));
        for _ in 0..SUPPRESS_CAP {
            trickle.heard_consistent();
        }
        // Drive the same transmit point repeatedly is impossible since
        // `fired` latches after the first evaluation; instead verify the
        // cap field directly via repeated reset+evaluate cycles.
        let mut forced = false;
        for i in 0..(SUPPRESS_CAP + 2) {
            trickle.reset(now + Duration::from_secs(i as u64));
            trickle.heard_consistent();
            let decision = trickle.tick(now + Duration::from_secs(i as u64) + Duration::from_secs(60));
            if decision.should_tx {
                forced = true;
                break;
            }
        }
        assert!(forced, "expected suppression cap to eventually force a transmit");
    }

    #[esp32_test]
    fn test_interval_doubles_and_saturates_at_i_max() {
        let now = Instant::now();
        let mut trickle = Trickle::new(test_config(), now, fixed_rng(0.0));
        let mut t = now;
        for _ in 0..20 {
            t += Duration::from_secs(600);
            trickle.tick(t);
        }
        assert_eq!(trickle.current_interval(), Duration::from_secs(600));
    }

    #[esp32_test]
    fn test_reset_returns_to_i_min() {
        let now = Instant::now();
        let mut trickle = Trickle::new(test_config(), now, fixed_rng(0.0));
        trickle.tick(now + Duration::from_secs(600));
        assert!(trickle.current_interval() > Duration::from_secs(60));
        trickle.reset(now + Duration::from_secs(700));
        assert_eq!(trickle.current_interval(), Duration::from_secs(60));
    }

    #[esp32_test]
    fn test_fires_at_most_once_per_interval() {
        let now = Instant::now();
        let mut trickle = Trickle::new(test_config(), now, fixed_rng(0.0));
        let tx_point = now + Duration::from_secs(30);
        let first = trickle.tick(tx_point);
        let second = trickle.tick(tx_point + Duration::from_secs(1));
        assert!(first.should_tx);
        assert!(!second.should_tx);
    }
}
