//! Folds rank, head-to-head and map context into the raw strength difference.
//!
//! Stages run in a fixed order (rank, H2H, map) and each one records exactly
//! one entry in the adjustment log, whether it applied a nudge or not.

use super::strength::TeamStrengthSummary;
use crate::config::AdjustmentConfig;
use crate::feed::types::HeadToHeadRecord;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStage {
    Rank,
    HeadToHead,
    Map,
}

impl fmt::Display for AdjustmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustmentStage::Rank => write!(f, "rank"),
            AdjustmentStage::HeadToHead => write!(f, "h2h"),
            AdjustmentStage::Map => write!(f, "map"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    Rank {
        team1_rank: u32,
        team2_rank: u32,
        nudge: f64,
    },
    HeadToHead {
        team1_wins: u32,
        team2_wins: u32,
        total_matches: u32,
        win_rate_diff: f64,
        nudge: f64,
    },
    Skipped {
        stage: AdjustmentStage,
        reason: String,
    },
}

impl Adjustment {
    pub fn nudge(&self) -> f64 {
        match self {
            Adjustment::Rank { nudge, .. } | Adjustment::HeadToHead { nudge, .. } => *nudge,
            Adjustment::Skipped { .. } => 0.0,
        }
    }

    fn skipped(stage: AdjustmentStage, reason: impl Into<String>) -> Self {
        Adjustment::Skipped {
            stage,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adjustment::Rank {
                team1_rank,
                team2_rank,
                nudge,
            } => write!(f, "rank: #{} vs #{} -> {:+.4}", team1_rank, team2_rank, nudge),
            Adjustment::HeadToHead {
                team1_wins,
                team2_wins,
                total_matches,
                win_rate_diff,
                nudge,
            } => write!(
                f,
                "h2h: {}-{} of {} (win rate diff {:+.3}) -> {:+.4}",
                team1_wins, team2_wins, total_matches, win_rate_diff, nudge
            ),
            Adjustment::Skipped { stage, reason } => write!(f, "{}: skipped: {}", stage, reason),
        }
    }
}

/// World ranks for the two sides. Only ranks of 1 or more are usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ranks {
    pub team1: Option<u32>,
    pub team2: Option<u32>,
}

impl Ranks {
    pub fn both_valid(&self) -> Option<(u32, u32)> {
        match (self.team1, self.team2) {
            (Some(r1), Some(r2)) if r1 >= 1 && r2 >= 1 => Some((r1, r2)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveDifference {
    pub raw_difference: f64,
    pub effective_difference: f64,
    pub adjustments: Vec<Adjustment>,
}

#[derive(Debug, Clone)]
pub struct AdjustmentPipeline {
    config: AdjustmentConfig,
}

impl AdjustmentPipeline {
    pub fn new(config: AdjustmentConfig) -> Self {
        Self { config }
    }

    pub fn compute_effective_difference(
        &self,
        team1: &TeamStrengthSummary,
        team2: &TeamStrengthSummary,
        ranks: Ranks,
        h2h: &HeadToHeadRecord,
        map: Option<&str>,
    ) -> EffectiveDifference {
        let raw_difference = team1.average_rating - team2.average_rating;

        let adjustments = vec![
            self.rank_adjustment(raw_difference, ranks),
            self.h2h_adjustment(h2h),
            map_adjustment(map),
        ];
        let effective_difference =
            raw_difference + adjustments.iter().map(Adjustment::nudge).sum::<f64>();

        EffectiveDifference {
            raw_difference,
            effective_difference,
            adjustments,
        }
    }

    /// Rank breaks near-ties only; a clear strength gap is left alone.
    fn rank_adjustment(&self, raw_difference: f64, ranks: Ranks) -> Adjustment {
        let threshold = self.config.equality_threshold;
        if !(raw_difference.abs() < threshold) {
            return Adjustment::skipped(
                AdjustmentStage::Rank,
                format!(
                    "strength difference {:.3} not within equality threshold {:.3}",
                    raw_difference, threshold
                ),
            );
        }
        let Some((r1, r2)) = ranks.both_valid() else {
            return Adjustment::skipped(AdjustmentStage::Rank, "rank unavailable");
        };

        let cap = self.config.max_rank_nudge;
        // lower rank is stronger, so a positive gap favours team1
        let nudge = ((r2 as f64 - r1 as f64) * self.config.rank_scale).clamp(-cap, cap);
        Adjustment::Rank {
            team1_rank: r1,
            team2_rank: r2,
            nudge,
        }
    }

    fn h2h_adjustment(&self, h2h: &HeadToHeadRecord) -> Adjustment {
        let h2h = h2h.normalized();
        if h2h.total_matches < self.config.h2h_min_matches {
            return Adjustment::skipped(
                AdjustmentStage::HeadToHead,
                format!(
                    "{} matches, need {}",
                    h2h.total_matches, self.config.h2h_min_matches
                ),
            );
        }

        let total = h2h.total_matches as f64;
        let win_rate_diff = h2h.team1_wins as f64 / total - h2h.team2_wins as f64 / total;
        let cap = self.config.max_h2h_effect;
        let nudge = (win_rate_diff * self.config.h2h_scale).clamp(-cap, cap);
        Adjustment::HeadToHead {
            team1_wins: h2h.team1_wins,
            team2_wins: h2h.team2_wins,
            total_matches: h2h.total_matches,
            win_rate_diff,
            nudge,
        }
    }
}

/// Extension point. Always neutral.
fn map_adjustment(map: Option<&str>) -> Adjustment {
    match map {
        Some(_) => Adjustment::skipped(AdjustmentStage::Map, "not implemented"),
        None => Adjustment::skipped(AdjustmentStage::Map, "no map requested"),
    }
}
