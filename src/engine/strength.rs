use super::rating::{PlayerRatingModel, MAX_DATA_POINTS_PER_PLAYER};
use crate::feed::types::PlayerRef;
use crate::gateway::{FetchGateway, PlayerLookup};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Team strength plus the data-quality counters confidence scoring needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStrengthSummary {
    /// Mean player rating, defaulted players included.
    pub average_rating: f64,
    pub players_analyzed: u32,
    pub players_missing_stats: u32,
    pub data_points_used: u32,
}

impl TeamStrengthSummary {
    pub fn players_with_stats(&self) -> u32 {
        self.players_analyzed - self.players_missing_stats
    }

    pub fn max_data_points(&self) -> u32 {
        self.players_analyzed * MAX_DATA_POINTS_PER_PLAYER
    }
}

pub struct TeamStrengthAggregator {
    gateway: Arc<FetchGateway>,
    model: PlayerRatingModel,
}

impl TeamStrengthAggregator {
    pub fn new(gateway: Arc<FetchGateway>, model: PlayerRatingModel) -> Self {
        Self { gateway, model }
    }

    /// Fetch every player concurrently (the gateway serializes upstream
    /// access) and fold the ratings into one summary.
    pub async fn compute_strength(&self, team_name: &str, roster: &[PlayerRef]) -> TeamStrengthSummary {
        if roster.is_empty() {
            debug!("{}: empty roster, using default strength", team_name);
            return TeamStrengthSummary {
                average_rating: self.model.default_rating(),
                players_analyzed: 0,
                players_missing_stats: 0,
                data_points_used: 0,
            };
        }

        let lookups = join_all(
            roster
                .iter()
                .map(|player| self.gateway.lookup(&player.id, &player.name)),
        )
        .await;

        let mut total = 0.0;
        let mut missing = 0;
        let mut data_points = 0;
        for (player, lookup) in roster.iter().zip(lookups) {
            match lookup {
                PlayerLookup::Found(stats) => {
                    let impact = self.model.impact_score(&stats);
                    let rating = self.model.rating_from_impact(&impact);
                    debug!(
                        "{}: {} rated {:.3} from {} data points",
                        team_name, player.name, rating, impact.data_points_used
                    );
                    total += rating;
                    data_points += impact.data_points_used;
                }
                PlayerLookup::Absent(reason) => {
                    debug!("{}: {} has no stats ({:?})", team_name, player.name, reason);
                    total += self.model.default_rating();
                    missing += 1;
                }
            }
        }

        let analyzed = roster.len() as u32;
        TeamStrengthSummary {
            average_rating: total / analyzed as f64,
            players_analyzed: analyzed,
            players_missing_stats: missing,
            data_points_used: data_points,
        }
    }
}
