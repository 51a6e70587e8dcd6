//! Player impact rating from raw per-player statistics.
//!
//! Four dimensions, each the mean of whichever sub-metrics are present:
//!   - fragging:    kills/round vs baseline, headshot % vs baseline
//!   - consistency: round contribution vs baseline, maps played vs baseline
//!   - impact:      the upstream overall rating, used directly
//!   - survival:    1 - deaths/round relative to baseline, floored
//!
//! Ratios are capped per metric. The final rating is the weighted mean over
//! dimensions that had at least one contributor, clamped to the configured
//! rating bounds. No usable data at all yields the default rating.

use crate::config::RatingConfig;
use crate::feed::types::PlayerStats;

/// Sub-metrics a single player can contribute.
pub const MAX_DATA_POINTS_PER_PLAYER: u32 = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DimensionScore {
    pub score: f64,
    pub contributors: u32,
}

impl DimensionScore {
    fn from_parts(parts: &[Option<f64>]) -> Self {
        let present: Vec<f64> = parts.iter().flatten().copied().collect();
        if present.is_empty() {
            return Self::default();
        }
        Self {
            score: present.iter().sum::<f64>() / present.len() as f64,
            contributors: present.len() as u32,
        }
    }

    pub fn is_used(&self) -> bool {
        self.contributors > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerImpactScore {
    pub fragging: DimensionScore,
    pub consistency: DimensionScore,
    pub impact: DimensionScore,
    pub survival: DimensionScore,
    pub data_points_used: u32,
}

#[derive(Debug, Clone)]
pub struct PlayerRatingModel {
    config: RatingConfig,
}

/// Non-finite values count as missing.
fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl PlayerRatingModel {
    pub fn new(config: RatingConfig) -> Self {
        Self { config }
    }

    pub fn default_rating(&self) -> f64 {
        self.config.default_rating
    }

    pub fn impact_score(&self, stats: &PlayerStats) -> PlayerImpactScore {
        let c = &self.config;
        let capped = |value: Option<f64>, base: f64, cap: f64| {
            usable(value).map(|v| (v / base).min(cap))
        };

        let fragging = DimensionScore::from_parts(&[
            capped(stats.kills_per_round, c.base_kpr, c.max_kpr_mult),
            capped(stats.headshot_percent, c.base_hs, c.max_hs_mult),
        ]);
        let consistency = DimensionScore::from_parts(&[
            capped(stats.round_contribution, c.base_rc, c.max_rc_mult),
            capped(stats.maps_played, c.base_maps, c.max_maps_mult),
        ]);
        let impact = DimensionScore::from_parts(&[usable(stats.rating)]);
        let survival = DimensionScore::from_parts(&[usable(stats.deaths_per_round)
            .map(|dpr| (1.0 - dpr / c.base_dpr).max(c.min_dpr_mult))]);

        PlayerImpactScore {
            data_points_used: fragging.contributors
                + consistency.contributors
                + impact.contributors
                + survival.contributors,
            fragging,
            consistency,
            impact,
            survival,
        }
    }

    /// Rating in `[min_rating, max_rating]`.
    pub fn compute_rating(&self, stats: Option<&PlayerStats>) -> f64 {
        match stats {
            Some(stats) => self.rating_from_impact(&self.impact_score(stats)),
            None => self.config.default_rating,
        }
    }

    pub fn rating_from_impact(&self, impact: &PlayerImpactScore) -> f64 {
        let w = &self.config.weights;
        let dimensions = [
            (impact.fragging, w.fragging),
            (impact.consistency, w.consistency),
            (impact.impact, w.impact),
            (impact.survival, w.survival),
        ];

        let total_weight: f64 = dimensions
            .iter()
            .filter(|(d, _)| d.is_used())
            .map(|(_, weight)| weight)
            .sum();
        if !(total_weight > 0.0) {
            return self.config.default_rating;
        }

        // Normalize weights first so a single used dimension passes through
        // unchanged.
        let weighted: f64 = dimensions
            .iter()
            .filter(|(d, _)| d.is_used())
            .map(|(d, weight)| d.score * (weight / total_weight))
            .sum();

        if !weighted.is_finite() {
            return self.config.default_rating;
        }
        weighted.clamp(self.config.min_rating, self.config.max_rating)
    }
}
