// Scripted in-memory stats source shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use match_forecast::config::{CacheConfig, Config, GatewayConfig};
use match_forecast::error::SourceError;
use match_forecast::feed::types::{
    DailyMatch, HeadToHeadRecord, MatchResult, PlayerRef, PlayerStats, Roster,
};
use match_forecast::feed::StatsSource;
use match_forecast::gateway::FetchGateway;
use match_forecast::pipeline::MatchPredictor;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type PlayerReply = Result<Option<PlayerStats>, SourceError>;

#[derive(Default)]
pub struct ScriptedSource {
    rosters: HashMap<String, Result<Roster, SourceError>>,
    stats: HashMap<String, PlayerStats>,
    scripts: Mutex<HashMap<String, VecDeque<PlayerReply>>>,
    h2h: HashMap<(String, String), Result<HeadToHeadRecord, SourceError>>,
    daily: Vec<DailyMatch>,
    results: HashMap<String, MatchResult>,
    player_latency: Duration,
    player_calls: Mutex<Vec<(String, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roster(mut self, roster: Roster) -> Self {
        self.rosters.insert(roster.name.clone(), Ok(roster));
        self
    }

    pub fn failing_roster(mut self, team_name: &str, error: SourceError) -> Self {
        self.rosters.insert(team_name.to_string(), Err(error));
        self
    }

    pub fn stats(mut self, player_id: &str, stats: PlayerStats) -> Self {
        self.stats.insert(player_id.to_string(), stats);
        self
    }

    /// Replies served in order before falling back to the fixed stats table.
    pub fn script(self, player_id: &str, replies: Vec<PlayerReply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(player_id.to_string(), replies.into());
        self
    }

    pub fn h2h(mut self, team1_id: &str, team2_id: &str, record: HeadToHeadRecord) -> Self {
        self.h2h
            .insert((team1_id.to_string(), team2_id.to_string()), Ok(record));
        self
    }

    pub fn failing_h2h(mut self, team1_id: &str, team2_id: &str, error: SourceError) -> Self {
        self.h2h
            .insert((team1_id.to_string(), team2_id.to_string()), Err(error));
        self
    }

    pub fn daily(mut self, matches: Vec<DailyMatch>) -> Self {
        self.daily = matches;
        self
    }

    pub fn result(mut self, match_id: &str, result: MatchResult) -> Self {
        self.results.insert(match_id.to_string(), result);
        self
    }

    pub fn player_latency(mut self, latency: Duration) -> Self {
        self.player_latency = latency;
        self
    }

    pub fn player_calls(&self) -> Vec<(String, Instant)> {
        self.player_calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, player_id: &str) -> usize {
        self.player_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == player_id)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatsSource for ScriptedSource {
    async fn get_roster(&self, team_name: &str) -> Result<Option<Roster>, SourceError> {
        match self.rosters.get(team_name) {
            Some(Ok(roster)) => Ok(Some(roster.clone())),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(None),
        }
    }

    async fn get_player_stats(&self, player_id: &str) -> PlayerReply {
        self.player_calls
            .lock()
            .unwrap()
            .push((player_id.to_string(), Instant::now()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.player_latency.is_zero() {
            tokio::time::sleep(self.player_latency).await;
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(player_id)
            .and_then(|replies| replies.pop_front());
        let reply = match scripted {
            Some(reply) => reply,
            None => Ok(self.stats.get(player_id).cloned()),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }

    async fn get_head_to_head(
        &self,
        team1_id: &str,
        team2_id: &str,
    ) -> Result<HeadToHeadRecord, SourceError> {
        match self.h2h.get(&(team1_id.to_string(), team2_id.to_string())) {
            Some(Ok(record)) => Ok(*record),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(HeadToHeadRecord::default()),
        }
    }

    async fn get_daily_matches(&self) -> Result<Vec<DailyMatch>, SourceError> {
        Ok(self.daily.clone())
    }

    async fn get_match_result(&self, match_id: &str) -> Result<Option<MatchResult>, SourceError> {
        Ok(self.results.get(match_id).cloned())
    }
}

pub fn roster(id: &str, name: &str, rank: Option<u32>, player_ids: &[&str]) -> Roster {
    Roster {
        id: id.to_string(),
        name: name.to_string(),
        rank,
        players: player_ids
            .iter()
            .map(|pid| PlayerRef {
                id: pid.to_string(),
                name: format!("player-{}", pid),
            })
            .collect(),
    }
}

pub fn memory_cache() -> CacheConfig {
    CacheConfig {
        path: None,
        ..CacheConfig::default()
    }
}

pub fn gateway(source: Arc<ScriptedSource>, config: &GatewayConfig) -> Arc<FetchGateway> {
    Arc::new(FetchGateway::new(source, config, &memory_cache()))
}

pub fn predictor(source: Arc<ScriptedSource>) -> (MatchPredictor, Arc<FetchGateway>) {
    let config = Config::default();
    let gw = gateway(source, &config.gateway);
    (MatchPredictor::new(gw.clone(), &config), gw)
}
