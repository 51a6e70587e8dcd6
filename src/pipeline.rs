use crate::config::Config;
use crate::engine::adjustment::{Adjustment, AdjustmentPipeline, Ranks};
use crate::engine::confidence::{ConfidenceMetrics, ConfidenceResult, ConfidenceScorer};
use crate::engine::rating::PlayerRatingModel;
use crate::engine::strength::{TeamStrengthAggregator, TeamStrengthSummary};
use crate::engine::win_prob::ProbabilityResolver;
use crate::feed::types::{HeadToHeadRecord, Roster};
use crate::gateway::FetchGateway;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Everything one prediction produced, in a form that can be logged,
/// exported or graded later.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    pub team1: String,
    pub team2: String,
    pub map: Option<String>,
    pub team1_probability: f64,
    pub team2_probability: f64,
    pub confidence: ConfidenceResult,
    pub adjustments: Vec<Adjustment>,
    pub raw_difference: f64,
    pub effective_difference: f64,
    pub team1_strength: TeamStrengthSummary,
    pub team2_strength: TeamStrengthSummary,
    pub predicted_at: DateTime<Utc>,
}

impl PredictionOutcome {
    /// The side given the higher probability. `None` for a dead-even call.
    pub fn favourite(&self) -> Option<&str> {
        if self.team1_probability > self.team2_probability {
            Some(&self.team1)
        } else if self.team2_probability > self.team1_probability {
            Some(&self.team2)
        } else {
            None
        }
    }

    pub fn favourite_probability(&self) -> f64 {
        self.team1_probability.max(self.team2_probability)
    }
}

/// Runs the full scoring pipeline for a match: concurrent team strengths,
/// adjustments, confidence, probability.
pub struct MatchPredictor {
    gateway: Arc<FetchGateway>,
    strength: TeamStrengthAggregator,
    adjustments: AdjustmentPipeline,
    confidence: ConfidenceScorer,
    resolver: ProbabilityResolver,
    request_timeout: Duration,
}

impl MatchPredictor {
    pub fn new(gateway: Arc<FetchGateway>, config: &Config) -> Self {
        Self {
            strength: TeamStrengthAggregator::new(
                gateway.clone(),
                PlayerRatingModel::new(config.rating.clone()),
            ),
            adjustments: AdjustmentPipeline::new(config.adjustment.clone()),
            confidence: ConfidenceScorer::new(config.confidence.clone()),
            resolver: ProbabilityResolver::new(&config.probability),
            request_timeout: config.gateway.request_timeout(),
            gateway,
        }
    }

    /// Predict a match between two known rosters. Never fails: missing data
    /// lowers confidence instead.
    pub async fn predict(&self, team1: &Roster, team2: &Roster, map: Option<&str>) -> PredictionOutcome {
        let (strength1, strength2, h2h) = tokio::join!(
            self.strength.compute_strength(&team1.name, &team1.players),
            self.strength.compute_strength(&team2.name, &team2.players),
            self.fetch_h2h(team1, team2),
        );

        let ranks = Ranks {
            team1: team1.rank,
            team2: team2.rank,
        };
        let diff = self
            .adjustments
            .compute_effective_difference(&strength1, &strength2, ranks, &h2h, map);

        let mut metrics = ConfidenceMetrics {
            map_name_provided: map.is_some(),
            has_valid_ranks: ranks.both_valid().is_some(),
            ..Default::default()
        };
        metrics.record_team(&strength1);
        metrics.record_team(&strength2);
        metrics.record_h2h(&h2h);
        let confidence = self.confidence.score(&metrics);

        let (p1, p2) = self.resolver.resolve(diff.effective_difference);

        tracing::info!(
            team1 = %team1.name,
            team2 = %team2.name,
            p1,
            confidence = confidence.level,
            quality = %confidence.quality_level,
            "prediction complete"
        );
        for adjustment in &diff.adjustments {
            tracing::debug!(team1 = %team1.name, team2 = %team2.name, "{}", adjustment);
        }

        PredictionOutcome {
            match_id: None,
            team1: team1.name.clone(),
            team2: team2.name.clone(),
            map: map.map(str::to_string),
            team1_probability: p1,
            team2_probability: p2,
            confidence,
            adjustments: diff.adjustments,
            raw_difference: diff.raw_difference,
            effective_difference: diff.effective_difference,
            team1_strength: strength1,
            team2_strength: strength2,
            predicted_at: Utc::now(),
        }
    }

    /// Look both rosters up by team name, then predict.
    pub async fn predict_by_name(&self, team1: &str, team2: &str, map: Option<&str>) -> PredictionOutcome {
        let (roster1, roster2) = tokio::join!(self.fetch_roster(team1), self.fetch_roster(team2));
        self.predict(&roster1, &roster2, map).await
    }

    /// Predict every match on today's card. Only a failure to fetch the card
    /// itself is an error.
    pub async fn run_daily(&self) -> Result<Vec<PredictionOutcome>> {
        let matches = tokio::time::timeout(self.request_timeout, self.gateway.source().get_daily_matches())
            .await
            .context("daily match list timed out")?
            .context("daily match list fetch failed")?;

        tracing::info!(count = matches.len(), "predicting daily matches");
        let mut outcomes = Vec::with_capacity(matches.len());
        for m in matches {
            let mut outcome = self
                .predict_by_name(&m.team1_name, &m.team2_name, m.map.as_deref())
                .await;
            outcome.match_id = Some(m.id);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Whether the favourite won. `None` while the result is unknown, when
    /// the lookup fails, or when the prediction had no favourite.
    pub async fn grade(&self, match_id: &str, outcome: &PredictionOutcome) -> Option<bool> {
        let favourite = outcome.favourite()?;
        let result = match tokio::time::timeout(
            self.request_timeout,
            self.gateway.source().get_match_result(match_id),
        )
        .await
        {
            Ok(Ok(Some(result))) => result,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                tracing::warn!(match_id, error = %e, "match result fetch failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(match_id, "match result fetch timed out");
                return None;
            }
        };
        Some(result.winner_name.eq_ignore_ascii_case(favourite))
    }

    async fn fetch_roster(&self, team_name: &str) -> Roster {
        match tokio::time::timeout(self.request_timeout, self.gateway.source().get_roster(team_name)).await {
            Ok(Ok(Some(roster))) => roster,
            Ok(Ok(None)) => {
                tracing::warn!(team = team_name, "no roster upstream, using empty roster");
                Roster::unknown(team_name)
            }
            Ok(Err(e)) => {
                tracing::warn!(team = team_name, error = %e, "roster fetch failed, using empty roster");
                Roster::unknown(team_name)
            }
            Err(_) => {
                tracing::warn!(team = team_name, "roster fetch timed out, using empty roster");
                Roster::unknown(team_name)
            }
        }
    }

    /// Head-to-head for the two rosters; an empty record on any failure.
    async fn fetch_h2h(&self, team1: &Roster, team2: &Roster) -> HeadToHeadRecord {
        if team1.id.is_empty() || team2.id.is_empty() {
            return HeadToHeadRecord::default();
        }
        match tokio::time::timeout(
            self.request_timeout,
            self.gateway.source().get_head_to_head(&team1.id, &team2.id),
        )
        .await
        {
            Ok(Ok(record)) => record.normalized(),
            Ok(Err(e)) => {
                tracing::warn!(team1 = %team1.name, team2 = %team2.name, error = %e, "h2h fetch failed");
                HeadToHeadRecord::default()
            }
            Err(_) => {
                tracing::warn!(team1 = %team1.name, team2 = %team2.name, "h2h fetch timed out");
                HeadToHeadRecord::default()
            }
        }
    }
}
