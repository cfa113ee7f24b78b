//! Multi-metric route cost function (spec §4.4).
//!
//! `RouteTable::best_by_role` and `RouteProcessor` both need "which of
//! these candidates is better", expressed as a single pluggable trait so
//! that disabling it (via [`HopCountCost`]) degenerates the whole engine
//! to plain hop-count distance-vector routing (P2).

use crate::error::ConfigError;
use crate::link_metrics::LinkSnapshot;

/// RSSI range mapped to `[0, 1]` by [`norm_rssi`].
const RSSI_MIN_DBM: f32 = -140.0;
const RSSI_MAX_DBM: f32 = -50.0;

/// SNR range mapped to `[0, 1]` by [`norm_snr`].
const SNR_MIN_DB: f32 = -20.0;
const SNR_MAX_DB: f32 = 10.0;

/// Below this RSSI, or below `WEAK_SNR_DB`, a link takes the weak-link penalty.
const WEAK_RSSI_DBM: f32 = -125.0;
const WEAK_SNR_DB: f32 = -12.0;
const WEAK_LINK_PENALTY: f32 = 1.5;

const GATEWAY_BIAS_CLAMP: f32 = 2.0;
const GATEWAY_BIAS_EPSILON: f32 = 1.0;

fn norm_rssi(rssi: f32) -> f32 {
    ((rssi - RSSI_MIN_DBM) / (RSSI_MAX_DBM - RSSI_MIN_DBM)).clamp(0.0, 1.0)
}

fn norm_snr(snr: f32) -> f32 {
    ((snr - SNR_MIN_DB) / (SNR_MAX_DB - SNR_MIN_DB)).clamp(0.0, 1.0)
}

/// Everything a [`CostFunction`] needs to price one candidate route.
#[derive(Debug, Clone, Copy)]
pub struct CostInputs {
    /// Hop count to the destination via this candidate.
    pub hops: u8,
    /// Link quality to the next hop, if tracked (absent before first HELLO).
    pub link: Option<LinkSnapshot>,
    /// The destination's advertised gateway load, if it is a gateway and
    /// the load is known (wire value 255 decodes to `None` upstream).
    pub destination_gateway_load: Option<u8>,
    /// Mean advertised load across all known gateways with known load.
    pub avg_gateway_load: Option<f32>,
}

/// A pluggable, deterministic route cost. Lower is better.
///
/// Must be pure with respect to its inputs: no randomness, no wall-clock
/// reads, so that two calls with identical `CostInputs` always agree.
pub trait CostFunction: Send + Sync {
    fn cost(&self, inputs: &CostInputs) -> f32;
}

/// Degenerate P2 behavior: cost is just hop count. Installing this (or no
/// cost function at all) reduces route selection to plain distance-vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct HopCountCost;

impl CostFunction for HopCountCost {
    fn cost(&self, inputs: &CostInputs) -> f32 {
        inputs.hops as f32
    }
}

/// Tunable weights for [`WeightedCost`]. `Copy` so it can be embedded in
/// config structs and passed around cheaply, matching the rest of the
/// config types in `config.rs`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostWeights {
    pub w_hops: f32,
    pub w_rssi: f32,
    pub w_snr: f32,
    pub w_etx: f32,
    pub w_gateway_bias: f32,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            w_hops: 1.0,
            w_rssi: 0.3,
            w_snr: 0.2,
            w_etx: 0.4,
            w_gateway_bias: 1.0,
        }
    }
}

impl CostWeights {
    /// All weights must be finite and non-negative; the fixed weak-link
    /// penalty must exceed `w_hops`, so that a 2-hop good path always
    /// outscores a 1-hop marginal one (spec §4.4).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            self.w_hops,
            self.w_rssi,
            self.w_snr,
            self.w_etx,
            self.w_gateway_bias,
        ];
        if fields.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::InvalidConfig(
                "cost weights must be finite and non-negative",
            ));
        }
        if self.w_hops >= WEAK_LINK_PENALTY {
            return Err(ConfigError::InvalidConfig(
                "w_hops must be less than the weak-link penalty (1.5)",
            ));
        }
        Ok(())
    }
}

/// The full weighted multi-metric cost function (P3).
#[derive(Debug, Clone, Copy)]
pub struct WeightedCost {
    pub weights: CostWeights,
}

impl WeightedCost {
    pub fn new(weights: CostWeights) -> Self {
        Self { weights }
    }
}

impl CostFunction for WeightedCost {
    fn cost(&self, inputs: &CostInputs) -> f32 {
        let w = &self.weights;

        let (rssi_term, snr_term, etx_term, weak_penalty) = match inputs.link {
            Some(link) => {
                let rssi_term = w.w_rssi * (1.0 - norm_rssi(link.rssi));
                let snr_term = w.w_snr * (1.0 - norm_snr(link.snr));
                let etx_term = w.w_etx * (link.etx - 1.0);
                let weak_penalty = if link.rssi < WEAK_RSSI_DBM || link.snr < WEAK_SNR_DB {
                    WEAK_LINK_PENALTY
                } else {
                    0.0
                };
                (rssi_term, snr_term, etx_term, weak_penalty)
            }
            // No link sample yet: treat as neutral (no bonus, no penalty)
            // rather than inventing a value — this only happens for the
            // implicit 1-hop sender entry on its very first HELLO.
            None => (0.0, 0.0, 0.0, 0.0),
        };

        let gateway_term = w.w_gateway_bias * gateway_bias(inputs);

        w.w_hops * inputs.hops as f32 + rssi_term + snr_term + etx_term + gateway_term + weak_penalty
    }
}

fn gateway_bias(inputs: &CostInputs) -> f32 {
    match (inputs.destination_gateway_load, inputs.avg_gateway_load) {
        (Some(load), Some(avg)) => {
            let bias = (load as f32 - avg) / avg.max(GATEWAY_BIAS_EPSILON);
            bias.clamp(-GATEWAY_BIAS_CLAMP, GATEWAY_BIAS_CLAMP)
        }
        _ => 0.0,
    }
}

/// Compare two candidate costs the way route admission/replacement rules
/// need: NaN (which a well-formed `CostFunction` should never produce,
/// but a misbehaving custom one might) sorts as worse than any finite
/// value rather than panicking or silently preferring it.
pub fn is_better(candidate: f32, incumbent: f32) -> std::cmp::Ordering {
    match (candidate.is_finite(), incumbent.is_finite()) {
        (true, true) => candidate.partial_cmp(&incumbent).unwrap(),
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        (false, false) => std::cmp::Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loramesh_macros::esp32_test;

    fn good_link() -> LinkSnapshot {
        LinkSnapshot { rssi: -60.0, snr: 8.0, etx: 1.0 }
    }

    fn marginal_link() -> LinkSnapshot {
        LinkSnapshot { rssi: -130.0, snr: -15.0, etx: 3.0 }
    }

    #[esp32_test]
    fn test_hop_count_cost_is_just_hops() {
        let cost = HopCountCost;
        let inputs = CostInputs { hops: 3, link: None, destination_gateway_load: None, avg_gateway_load: None };
        assert_eq!(cost.cost(&inputs), 3.0);
    }

    #[esp32_test]
    fn test_two_hop_good_path_beats_one_hop_marginal_path() {
        let cost = WeightedCost::new(CostWeights::default());
        let one_hop_marginal = CostInputs {
            hops: 1,
            link: Some(marginal_link()),
            destination_gateway_load: None,
            avg_gateway_load: None,
        };
        let two_hop_good = CostInputs {
            hops: 2,
            link: Some(good_link()),
            destination_gateway_load: None,
            avg_gateway_load: None,
        };
        assert!(cost.cost(&two_hop_good) < cost.cost(&one_hop_marginal));
    }

    #[esp32_test]
    fn test_weak_link_penalty_applied() {
        let cost = WeightedCost::new(CostWeights::default());
        let weak = CostInputs { hops: 1, link: Some(marginal_link()), destination_gateway_load: None, avg_gateway_load: None };
        let strong = CostInputs { hops: 1, link: Some(good_link()), destination_gateway_load: None, avg_gateway_load: None };
        assert!(cost.cost(&weak) > cost.cost(&strong) + WEAK_LINK_PENALTY - 0.01);
    }

    #[esp32_test]
    fn test_overloaded_gateway_costs_more_than_underloaded() {
        let cost = WeightedCost::new(CostWeights::default());
        let overloaded = CostInputs {
            hops: 2,
            link: Some(good_link()),
            destination_gateway_load: Some(200),
            avg_gateway_load: Some(50.0),
        };
        let underloaded = CostInputs {
            hops: 2,
            link: Some(good_link()),
            destination_gateway_load: Some(10),
            avg_gateway_load: Some(50.0),
        };
        assert!(cost.cost(&overloaded) > cost.cost(&underloaded));
    }

    #[esp32_test]
    fn test_unknown_gateway_load_is_neutral() {
        let cost = WeightedCost::new(CostWeights::default());
        let known_average = CostInputs { hops: 2, link: Some(good_link()), destination_gateway_load: None, avg_gateway_load: Some(50.0) };
        let no_gateway = CostInputs { hops: 2, link: Some(good_link()), destination_gateway_load: None, avg_gateway_load: None };
        assert_eq!(cost.cost(&known_average), cost.cost(&no_gateway));
    }

    #[esp32_test]
    fn test_gateway_bias_clamped() {
        let cost = WeightedCost::new(CostWeights::default());
        let extreme = CostInputs {
            hops: 1,
            link: Some(good_link()),
            destination_gateway_load: Some(254),
            avg_gateway_load: Some(1.0),
        };
        let baseline = CostInputs { hops: 1, link: Some(good_link()), destination_gateway_load: None, avg_gateway_load: None };
        let diff = cost.cost(&extreme) - cost.cost(&baseline);
        assert!(diff <= GATEWAY_BIAS_CLAMP * CostWeights::default().w_gateway_bias + 0.01);
    }

    #[esp32_test]
    fn test_default_weights_pass_validation() {
        assert!(CostWeights::default().validate().is_ok());
    }

    #[esp32_test]
    fn test_negative_weight_rejected() {
        let mut weights = CostWeights::default();
        weights.w_etx = -0.1;
        assert!(weights.validate().is_err());
    }

    #[esp32_test]
    fn test_hops_weight_must_be_less_than_weak_penalty() {
        let mut weights = CostWeights::default();
        weights.w_hops = 2.0; // not < 1.5
        assert!(weights.validate().is_err());
    }

    #[esp32_test]
    fn test_is_better_orders_nan_as_worst() {
        assert_eq!(is_better(1.0, f32::NAN), std::cmp::Ordering::Less);
        assert_eq!(is_better(f32::NAN, 1.0), std::cmp::Ordering::Greater);
        assert_eq!(is_better(1.0, 2.0), std::cmp::Ordering::Less);
    }

    #[esp32_test]
    fn test_cost_is_deterministic() {
        let cost = WeightedCost::new(CostWeights::default());
        let inputs = CostInputs { hops: 2, link: Some(good_link()), destination_gateway_load: Some(40), avg_gateway_load: Some(60.0) };
        assert_eq!(cost.cost(&inputs), cost.cost(&inputs));
    }
}
