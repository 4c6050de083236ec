//! Probabilistic partial fills.
//!
//! Off unless configured. With probability `probability`, an eligible fill
//! executes only a random fraction in `min_fill_ratio..=1` of its quantity.
//! The generator is derived from the run's seed through [`RngHierarchy`] so
//! reruns with the same seed produce the same fills.

use crate::rng::RngHierarchy;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

const STREAM: &str = "partial-fill";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialFillConfig {
    pub probability: f64,
    pub min_fill_ratio: f64,
    pub seed: u64,
}

impl PartialFillConfig {
    pub fn new(probability: f64, min_fill_ratio: f64, seed: u64) -> Self {
        Self {
            probability,
            min_fill_ratio,
            seed,
        }
    }

    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.probability)
            && self.min_fill_ratio > 0.0
            && self.min_fill_ratio <= 1.0
    }
}

/// Seeded sampler owned by one simulator run.
#[derive(Debug, Clone)]
pub struct PartialFiller {
    config: PartialFillConfig,
    rng: StdRng,
}

impl PartialFiller {
    pub fn new(config: PartialFillConfig) -> Self {
        let rng = RngHierarchy::new(config.seed).rng_for(STREAM, 0);
        Self { config, rng }
    }

    /// Fraction of the eligible quantity to fill on this attempt.
    pub fn fill_ratio(&mut self) -> f64 {
        if self.config.probability <= 0.0 || !self.rng.gen_bool(self.config.probability.min(1.0)) {
            return 1.0;
        }
        let lo = self.config.min_fill_ratio.clamp(f64::MIN_POSITIVE, 1.0);
        if lo >= 1.0 {
            1.0
        } else {
            self.rng.gen_range(lo..=1.0)
        }
    }
}
