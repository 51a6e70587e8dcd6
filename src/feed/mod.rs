pub mod http_source;
pub mod types;

use crate::error::SourceError;
use async_trait::async_trait;
use types::{DailyMatch, HeadToHeadRecord, MatchResult, PlayerStats, Roster};

/// Upstream statistics provider.
///
/// Ordinary "not found" conditions come back as `Ok(None)` / empty values.
/// Only malformed calls and connectivity problems are errors; the gateway
/// decides which of those are worth retrying.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn get_roster(&self, team_name: &str) -> Result<Option<Roster>, SourceError>;
    async fn get_player_stats(&self, player_id: &str) -> Result<Option<PlayerStats>, SourceError>;
    async fn get_head_to_head(
        &self,
        team1_id: &str,
        team2_id: &str,
    ) -> Result<HeadToHeadRecord, SourceError>;
    async fn get_daily_matches(&self) -> Result<Vec<DailyMatch>, SourceError>;
    async fn get_match_result(&self, match_id: &str) -> Result<Option<MatchResult>, SourceError>;
}
