//! Confidence scoring from data-quality counters.
//!
//! Two independent outputs:
//!   - `quality_level`: tier of the weighted category quality
//!   - `level`: 1.0 times one penalty per unmet requirement times the base
//!     factor, capped for low-quality data and clamped to [0, 1]

use super::strength::TeamStrengthSummary;
use crate::config::ConfidenceConfig;
use crate::feed::types::HeadToHeadRecord;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfidenceMetrics {
    pub total_players: u32,
    pub players_with_stats: u32,
    pub data_points_used: u32,
    pub max_data_points: u32,
    pub h2h_matches: u32,
    pub recent_h2h_matches: u32,
    pub map_specific_matches: u32,
    pub map_name_provided: bool,
    pub has_valid_ranks: bool,
}

impl ConfidenceMetrics {
    pub fn record_team(&mut self, team: &TeamStrengthSummary) {
        self.total_players += team.players_analyzed;
        self.players_with_stats += team.players_with_stats();
        self.data_points_used += team.data_points_used;
        self.max_data_points += team.max_data_points();
    }

    pub fn record_h2h(&mut self, h2h: &HeadToHeadRecord) {
        let h2h = h2h.normalized();
        self.h2h_matches = h2h.total_matches;
        self.recent_h2h_matches = h2h.recent_matches;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityLevel::Low => write!(f, "low"),
            QualityLevel::Medium => write!(f, "medium"),
            QualityLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceFactor {
    InsufficientPlayerStats,
    InsufficientH2h,
    InsufficientRecentH2h,
    InsufficientMapData,
    MissingRanks,
}

impl ConfidenceFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceFactor::InsufficientPlayerStats => "insufficient_player_stats",
            ConfidenceFactor::InsufficientH2h => "insufficient_h2h",
            ConfidenceFactor::InsufficientRecentH2h => "insufficient_recent_h2h",
            ConfidenceFactor::InsufficientMapData => "insufficient_map_data",
            ConfidenceFactor::MissingRanks => "missing_ranks",
        }
    }
}

impl fmt::Display for ConfidenceFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceResult {
    pub level: f64,
    pub quality_level: QualityLevel,
    pub weighted_quality: f64,
    pub factors: Vec<ConfidenceFactor>,
}

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    config: ConfidenceConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, m: &ConfidenceMetrics) -> ConfidenceResult {
        let c = &self.config;
        let weighted_quality = self.weighted_quality(m);
        let quality_level = if weighted_quality >= c.thresholds.high {
            QualityLevel::High
        } else if weighted_quality < c.thresholds.low {
            QualityLevel::Low
        } else {
            QualityLevel::Medium
        };

        let mut factors: Vec<ConfidenceFactor> = Vec::new();
        let mut level = 1.0;
        let mut penalize = |factor: ConfidenceFactor, penalty: f64| {
            if !factors.contains(&factor) {
                factors.push(factor);
                level *= penalty;
            }
        };

        if ratio(m.players_with_stats, m.total_players) < c.min_player_coverage {
            penalize(
                ConfidenceFactor::InsufficientPlayerStats,
                c.penalties.insufficient_player_stats,
            );
        }
        if m.h2h_matches < c.min_h2h_matches {
            penalize(ConfidenceFactor::InsufficientH2h, c.penalties.insufficient_h2h);
        }
        if m.recent_h2h_matches < c.min_recent_h2h_matches {
            penalize(
                ConfidenceFactor::InsufficientRecentH2h,
                c.penalties.insufficient_recent_h2h,
            );
        }
        if m.map_name_provided && m.map_specific_matches < c.min_map_matches {
            penalize(
                ConfidenceFactor::InsufficientMapData,
                c.penalties.insufficient_map_data,
            );
        }
        if !m.has_valid_ranks {
            penalize(ConfidenceFactor::MissingRanks, c.penalties.missing_ranks);
        }

        level *= c.base_confidence_factor;
        if quality_level == QualityLevel::Low {
            level = level.min(c.low_confidence_cap);
        }
        let level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };

        ConfidenceResult {
            level,
            quality_level,
            weighted_quality,
            factors,
        }
    }

    /// Weighted mean of per-category quality. The map category only counts
    /// when a map was requested.
    pub fn weighted_quality(&self, m: &ConfidenceMetrics) -> f64 {
        let c = &self.config;
        let w = &c.weights;

        let player_quality = 0.5 * ratio(m.players_with_stats, m.total_players)
            + 0.5 * ratio(m.data_points_used, m.max_data_points);

        let mut h2h_quality = 0.0;
        if m.h2h_matches >= c.min_h2h_matches {
            h2h_quality += 0.6;
        }
        if m.recent_h2h_matches >= c.min_recent_h2h_matches {
            h2h_quality += 0.4;
        }

        let rank_quality = if m.has_valid_ranks { 1.0 } else { 0.0 };

        let mut categories = vec![
            (player_quality, w.player_stats),
            (h2h_quality, w.h2h),
            (rank_quality, w.rank),
        ];
        if m.map_name_provided {
            let map_quality = if m.map_specific_matches >= c.min_map_matches {
                1.0
            } else {
                0.0
            };
            categories.push((map_quality, w.map_stats));
        }

        let total_weight: f64 = categories.iter().map(|(_, weight)| weight).sum();
        if !(total_weight > 0.0) {
            return 0.0;
        }
        categories.iter().map(|(q, weight)| q * weight).sum::<f64>() / total_weight
    }
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
