pub mod adjustment;
pub mod confidence;
pub mod rating;
pub mod strength;
pub mod win_prob;

pub use adjustment::{Adjustment, AdjustmentPipeline, EffectiveDifference, Ranks};
pub use confidence::{ConfidenceMetrics, ConfidenceResult, ConfidenceScorer, QualityLevel};
pub use rating::PlayerRatingModel;
pub use strength::{TeamStrengthAggregator, TeamStrengthSummary};
pub use win_prob::ProbabilityResolver;
