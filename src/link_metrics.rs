//! Per-neighbor smoothed RSSI/SNR and sequence-gap ETX (spec §4.3).
//!
//! ETX is derived from gaps in the neighbor's HELLO sequence numbers —
//! no acks, no extra airtime. A fixed-size circular window of recent
//! success/failure samples gives the estimator a bounded memory.

use crate::address::Address;
use std::collections::HashMap;
use std::sync::Mutex;

/// EWMA smoothing factor, alpha = 1/8.
const EWMA_ALPHA: f32 = 0.125;

/// Ack window size bounds (spec: 8..16).
pub const MIN_WINDOW: usize = 8;
pub const MAX_WINDOW: usize = 16;

/// A fixed-capacity circular buffer of success/failure samples.
#[derive(Debug, Clone)]
struct AckWindow {
    slots: Vec<bool>,
    next: usize,
    filled: usize,
}

impl AckWindow {
    fn new(capacity: usize, initial: bool) -> Self {
        Self {
            slots: vec![initial; capacity],
            next: 0,
            filled: capacity,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn push(&mut self, success: bool) {
        self.slots[self.next] = success;
        self.next = (self.next + 1) % self.slots.len();
        if self.filled < self.slots.len() {
            self.filled += 1;
        }
    }

    fn push_n(&mut self, success: bool, count: usize) {
        for _ in 0..count.min(self.slots.len()) {
            self.push(success);
        }
    }

    fn successes(&self) -> usize {
        self.slots.iter().filter(|s| **s).count()
    }

    fn reset(&mut self, initial: bool) {
        self.slots.iter_mut().for_each(|s| *s = initial);
        self.next = 0;
        self.filled = self.slots.len();
    }
}

/// Tracked state for one neighbor.
#[derive(Debug, Clone)]
struct NeighborState {
    smoothed_rssi: f32,
    smoothed_snr: f32,
    last_seq: u16,
    ack_window: AckWindow,
}

/// Per-neighbor link quality tracker.
///
/// Entries are created on first observation of a neighbor and destroyed
/// explicitly via [`LinkMetrics::remove`] when the neighbor's route is
/// torn down (fault, timeout, or eviction).
pub struct LinkMetrics {
    window_size: usize,
    neighbors: Mutex<HashMap<Address, NeighborState>>,
}

/// A point-in-time copy of one neighbor's link quality, safe to read
/// without holding the internal lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkSnapshot {
    pub rssi: f32,
    pub snr: f32,
    pub etx: f32,
}

impl LinkMetrics {
    /// `window_size` is clamped into `[MIN_WINDOW, MAX_WINDOW]`.
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.clamp(MIN_WINDOW, MAX_WINDOW),
            neighbors: Mutex::new(HashMap::new()),
        }
    }

    /// Feed one observed frame from `neighbor` into its tracker,
    /// creating the tracker on first sight.
    pub fn update(&self, neighbor: Address, rssi: f32, snr: f32, seq: u16) {
        let mut table = self.neighbors.lock().unwrap();
        match table.get_mut(&neighbor) {
            None => {
                table.insert(
                    neighbor,
                    NeighborState {
                        smoothed_rssi: rssi,
                        smoothed_snr: snr,
                        last_seq: seq,
                        ack_window: AckWindow::new(self.window_size, true),
                    },
                );
            }
            Some(state) => {
                state.smoothed_rssi += EWMA_ALPHA * (rssi - state.smoothed_rssi);
                state.smoothed_snr += EWMA_ALPHA * (snr - state.smoothed_snr);

                let expected = state.last_seq.wrapping_add(1);
                if seq == state.last_seq {
                    // duplicate, ignore for ETX purposes
                } else if seq == expected {
                    state.ack_window.push(true);
                    state.last_seq = seq;
                } else if seq > expected {
                    let gap = (seq - expected) as usize;
                    state.ack_window.push_n(false, gap);
                    state.ack_window.push(true);
                    state.last_seq = seq;
                } else {
                    // seq < expected: source reset (reboot or sequence wrap)
                    state.ack_window.reset(true);
                    state.last_seq = seq;
                }
            }
        }
    }

    /// Current ETX estimate for `neighbor`, or `None` if never observed.
    pub fn etx(&self, neighbor: Address) -> Option<f32> {
        let table = self.neighbors.lock().unwrap();
        table.get(&neighbor).map(Self::etx_of)
    }

    fn etx_of(state: &NeighborState) -> f32 {
        let successes = state.ack_window.successes().max(1) as f32;
        let w = state.ack_window.capacity() as f32;
        (w / successes).clamp(1.0, w)
    }

    /// Smoothed RSSI/SNR and current ETX, or `None` if never observed.
    pub fn snapshot(&self, neighbor: Address) -> Option<LinkSnapshot> {
        let table = self.neighbors.lock().unwrap();
        table.get(&neighbor).map(|state| LinkSnapshot {
            rssi: state.smoothed_rssi,
            snr: state.smoothed_snr,
            etx: Self::etx_of(state),
        })
    }

    /// Drop a neighbor's tracker entirely, e.g. on route removal.
    pub fn remove(&self, neighbor: Address) {
        self.neighbors.lock().unwrap().remove(&neighbor);
    }

    /// Number of tracked neighbors.
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
    use loramesh_macros::esp32_test;

    #[esp32_test]
    fn test_first_observation_has_etx_one() {
        let metrics = LinkMetrics::new(8);
        metrics.update(Address(1), -80.0, 5.0, 100);
        assert_eq!(metrics.etx(Address(1)), Some(1.0));
    }

    #[esp32_test]
    fn test_consecutive_sequence_keeps_etx_low() {
        let metrics = LinkMetrics::new(8);
        for seq in 0..10u16 {
            metrics.update(Address(1), -80.0, 5.0, seq);
        }
        assert_eq!(metrics.etx(Address(1)), Some(1.0));
    }

    #[esp32_test]
    fn test_duplicate_sequence_ignored() {
        let metrics = LinkMetrics::new(8);
        metrics.update(Address(1), -80.0, 5.0, 5);
        metrics.update(Address(1), -80.0, 5.0, 6);
        metrics.update(Address(1), -80.0, 5.0, 6);
        assert_eq!(metrics.etx(Address(1)), Some(1.0));
    }

    #[esp32_test]
    fn test_gap_increases_etx() {
        let metrics = LinkMetrics::new(8);
        metrics.update(Address(1), -80.0, 5.0, 0);
        // skip sequences 1..7: 6 lost frames out of an 8-wide window
        metrics.update(Address(1), -80.0, 5.0, 7);
        let etx = metrics.etx(Address(1)).unwrap();
        assert!(etx > 1.0, "expected etx above 1.0 after a gap, got {etx}");
    }

    #[esp32_test]
    fn test_etx_clamped_to_window_size() {
        let metrics = LinkMetrics::new(8);
        metrics.update(Address(1), -80.0, 5.0, 0);
        // a huge gap should saturate failures, not overflow past W
        metrics.update(Address(1), -80.0, 5.0, 200);
        let etx = metrics.etx(Address(1)).unwrap();
        assert!(etx <= 8.0);
    }

    #[esp32_test]
    fn test_sequence_regression_treated_as_reset() {
        let metrics = LinkMetrics::new(8);
        metrics.update(Address(1), -80.0, 5.0, 50);
        metrics.update(Address(1), -80.0, 5.0, 5); // reboot, seq restarts low
        assert_eq!(metrics.etx(Address(1)), Some(1.0));
    }

    #[esp32_test]
    fn test_rssi_snr_smoothed_towards_new_samples() {
        let metrics = LinkMetrics::new(8);
        metrics.update(Address(1), -100.0, -5.0, 0);
        metrics.update(Address(1), -60.0, 10.0, 1);
        let snap = metrics.snapshot(Address(1)).unwrap();
        assert!(snap.rssi > -100.0 && snap.rssi < -60.0);
        assert!(snap.snr > -5.0 && snap.snr < 10.0);
    }

    #[esp32_test]
    fn test_unknown_neighbor_returns_none() {
        let metrics = LinkMetrics::new(8);
        assert_eq!(metrics.etx(Address(99)), None);
        assert_eq!(metrics.snapshot(Address(99)), None);
    }

    #[esp32_test]
    fn test_remove_drops_tracker() {
        let metrics = LinkMetrics::new(8);
        metrics.update(Address(1), -80.0, 5.0, 0);
        assert_eq!(metrics.len(), 1);
        metrics.remove(Address(1));
        assert_eq!(metrics.len(), 0);
        assert_eq!(metrics.etx(Address(1)), None);
    }

    #[esp32_test]
    fn test_window_size_clamped() {
        let metrics = LinkMetrics::new(2);
        metrics.update(Address(1), -80.0, 5.0, 0);
        metrics.update(Address(1), -80.0, 5.0, 200);
        let etx = metrics.etx(Address(1)).unwrap();
        assert!(etx <= MIN_WINDOW as f32);
    }
}
