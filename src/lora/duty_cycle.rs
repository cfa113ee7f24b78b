//! Duty cycle limiter using token bucket algorithm.
//!
//! Tracks airtime budget in microseconds. Budget refills continuously
//! over the window duration, allowing bursty transmissions while
//! maintaining average duty cycle compliance.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use loramesh::lora::DutyCycleLimiter;
//!
//! // 1% duty cycle over 1 hour (EU 868 MHz band)
//! let mut limiter = DutyCycleLimiter::new(1.0, Duration::from_secs(3600));
//!
//! // Try to transmit (airtime in microseconds)
//! let airtime_us = 100_000; // 100ms transmission
//! if limiter.try_consume(airtime_us) {
//!     println!("Transmission allowed");
//! } else {
//!     println!("Duty cycle exceeded, packet dropped");
//! }
//! ```

use std::time::{Duration, Instant};

/// Duty cycle limiter using token bucket algorithm.
///
/// This limiter ensures LoRa transmissions comply with regulatory duty cycle
/// limits (e.g., 1% in EU 868 MHz band, 10% in US 915 MHz band).
///
/// The token bucket algorithm allows bursty traffic while maintaining the
/// average duty cycle over the configured time window.
pub struct DutyCycleLimiter {
    /// Maximum budget in microseconds (total allowed airtime per window)
    budget_us: u64,
    /// Remaining budget in microseconds
    remaining_us: u64,
    /// Last time we refilled the budget
    last_refill: Instant,
    /// Window duration for duty cycle calculation
    window: Duration,
}

impl DutyCycleLimiter {
    /// Create a new duty cycle limiter.
    ///
    /// # Arguments
    ///
    /// * `duty_cycle_percent` - Duty cycle limit as percentage (e.g., 1.0 for 1%)
    /// * `window` - Time window for duty cycle calculation (e.g., 1 hour)
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use loramesh::DutyCycleLimiter;
    ///
    /// // EU regulations: 1% duty cycle over 1 hour
    /// let eu_limiter = DutyCycleLimiter::new(1.0, Duration::from_secs(3600));
    ///
    /// // US regulations: typically 10% or more relaxed
    /// let us_limiter = DutyCycleLimiter::new(10.0, Duration::from_secs(3600));
    /// ```
    pub fn new(duty_cycle_percent: f32, window: Duration) -> Self {
        let budget_us = (window.as_micros() as f64 * duty_cycle_percent as f64 / 100.0) as u64;
        Self {
            budget_us,
            remaining_us: budget_us,
            last_refill: Instant::now(),
            window,
        }
    }

    /// Attempt to consume airtime budget.
    ///
    /// Returns `true` if transmission is allowed (budget was consumed),
    /// `false` if duty cycle would be exceeded (budget unchanged).
    ///
    /// # Arguments
    ///
    /// * `airtime_us` - Required airtime in microseconds
    pub fn try_consume(&mut self, airtime_us: u64) -> bool {
        self.refill();
        if self.remaining_us >= airtime_us {
            self.remaining_us -= airtime_us;
            true
        } else {
            false
        }
    }

    /// Get remaining budget in microseconds.
    pub fn remaining(&mut self) -> u64 {
        self.refill();
        self.remaining_us
    }

    /// Get remaining budget as percentage of total.
    pub fn remaining_percent(&mut self) -> f32 {
        self.refill();
        if self.budget_us == 0 {
            return 0.0;
        }
        (self.remaining_us as f64 / self.budget_us as f64 * 100.0) as f32
    }

    /// Get the maximum budget in microseconds.
    pub fn budget(&self) -> u64 {
        self.budget_us
    }

    /// Refill budget based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);

        // Calculate refill: budget_us * (elapsed / window)
        // Use u128 to avoid overflow in intermediate calculation
        let window_us = self.window.as_micros();
        if window_us == 0 {
            return;
        }

        let refill_amount = (self.budget_us as u128 * elapsed.as_micros() / window_us) as u64;

        if refill_amount > 0 {
            self.remaining_us = (self.remaining_us + refill_amount).min(self.budget_us);
            self.last_refill = now;
        }
    }
}
