//! Match win probability from an effective strength difference.
//!
//! Model: `P(team1_win) = 1 / (1 + exp(-k * diff))`
//!   - `diff` is team1 strength minus team2 strength after adjustments
//!   - `k` (the scaling factor) sets how quickly a rating gap turns into
//!     certainty; 4.0 makes a 0.1 gap worth roughly 60/40
//!
//! The result is clamped so no prediction is ever stated as a lock, and the
//! pair always sums to one.

use crate::config::ProbabilityConfig;

#[derive(Debug, Clone)]
pub struct ProbabilityResolver {
    scaling_factor: f64,
    min_probability: f64,
    max_probability: f64,
}

impl ProbabilityResolver {
    pub fn new(config: &ProbabilityConfig) -> Self {
        Self {
            scaling_factor: config.scaling_factor,
            min_probability: config.min_probability,
            max_probability: config.max_probability,
        }
    }

    /// Unclamped logistic value.
    pub fn raw_probability(&self, diff: f64) -> f64 {
        1.0 / (1.0 + (-self.scaling_factor * diff).exp())
    }

    /// `(team1, team2)` probabilities. An infinite gap clamps like any other
    /// large gap; only NaN is a coin flip.
    pub fn resolve(&self, diff: f64) -> (f64, f64) {
        let raw = self.raw_probability(diff);
        // NaN diff, or 0 * inf with a zero scaling factor
        if raw.is_nan() {
            return (0.5, 0.5);
        }
        let p1 = raw.clamp(self.min_probability, self.max_probability);
        (p1, 1.0 - p1)
    }
}
