//! Rate-limited, cached, retrying access to per-player statistics.
//!
//! Every per-player fetch in the crate goes through one `FetchGateway`:
//!   1. fresh cache entry (hit or known miss) -> returned, no upstream call
//!   2. otherwise take a limiter permit and re-check the cache
//!   3. each attempt waits the inter-call delay, then calls upstream under a
//!      timeout; transient failures back off linearly and retry
//!   4. whatever happens is cached (stats or a known miss)
//!
//! Failures never escape: callers get a `PlayerLookup` and the scoring
//! pipeline falls back to default ratings for anything absent.

pub mod cache;
pub mod persist;
pub mod retry;

use crate::config::{CacheConfig, GatewayConfig};
use crate::error::SourceError;
use crate::feed::types::PlayerStats;
use crate::feed::StatsSource;
use cache::{now_ms, StatsCache};
use persist::{lock, CacheWriter, SharedCache};
use retry::{RetryOutcome, RetryPolicy};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Result of a player lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerLookup {
    Found(PlayerStats),
    Absent(Absence),
}

/// Why a lookup produced no stats.
#[derive(Debug, Clone, PartialEq)]
pub enum Absence {
    /// A fresh known-miss entry was served from cache.
    CachedMiss,
    NotFound,
    Permanent { error: SourceError, attempts: u32 },
    Exhausted { error: SourceError, attempts: u32 },
    /// Upstream answered but the payload had no usable rating.
    InvalidData(String),
}

impl PlayerLookup {
    pub fn into_stats(self) -> Option<PlayerStats> {
        match self {
            PlayerLookup::Found(stats) => Some(stats),
            PlayerLookup::Absent(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PlayerLookup::Found(_))
    }
}

pub struct FetchGateway {
    source: Arc<dyn StatsSource>,
    cache: SharedCache,
    limiter: Semaphore,
    policy: RetryPolicy,
    inter_call_delay: Duration,
    request_timeout: Duration,
    cache_path: Option<PathBuf>,
    writer: Option<CacheWriter>,
    upstream_calls: AtomicU64,
}

impl FetchGateway {
    /// Build a gateway, loading the cache file if one is configured.
    /// With a cache path this spawns the writer task, so it must run inside
    /// a tokio runtime.
    pub fn new(source: Arc<dyn StatsSource>, gateway: &GatewayConfig, cache: &CacheConfig) -> Self {
        let stats_cache = match cache.path {
            Some(ref path) => StatsCache::load(path, cache.ttl(), now_ms()),
            None => StatsCache::new(cache.ttl()),
        };
        let shared: SharedCache = Arc::new(Mutex::new(stats_cache));
        let writer = cache
            .path
            .clone()
            .map(|path| CacheWriter::spawn(shared.clone(), path, cache.debounce()));

        Self {
            source,
            cache: shared,
            limiter: Semaphore::new(gateway.max_concurrent.max(1)),
            policy: RetryPolicy::from_config(gateway),
            inter_call_delay: gateway.inter_call_delay(),
            request_timeout: gateway.request_timeout(),
            cache_path: cache.path.clone(),
            writer,
            upstream_calls: AtomicU64::new(0),
        }
    }

    /// The wrapped source, for the non-player endpoints (rosters, H2H,
    /// results) that bypass the player cache.
    pub fn source(&self) -> &Arc<dyn StatsSource> {
        &self.source
    }

    pub async fn get_player_stats(&self, player_id: &str, display_name: &str) -> Option<PlayerStats> {
        self.lookup(player_id, display_name).await.into_stats()
    }

    pub async fn lookup(&self, player_id: &str, display_name: &str) -> PlayerLookup {
        if let Some(hit) = self.cached(player_id) {
            debug!("cache hit for {} ({})", display_name, player_id);
            return hit;
        }

        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return PlayerLookup::Absent(Absence::Permanent {
                    error: SourceError::new("fetch limiter closed"),
                    attempts: 0,
                })
            }
        };

        // Another task may have fetched this player while we queued.
        if let Some(hit) = self.cached(player_id) {
            debug!("cache filled while queued for {} ({})", display_name, player_id);
            return hit;
        }

        let label = format!("player stats fetch for {} ({})", display_name, player_id);
        let outcome = self
            .policy
            .run(&label, move |attempt| async move {
                tokio::time::sleep(self.inter_call_delay).await;
                self.upstream_calls.fetch_add(1, Ordering::Relaxed);
                debug!("fetching stats for {} (attempt {})", player_id, attempt);
                match tokio::time::timeout(self.request_timeout, self.source.get_player_stats(player_id))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::timeout()),
                }
            })
            .await;

        let lookup = match outcome {
            RetryOutcome::Success {
                value: Some(stats), ..
            } if stats.has_valid_rating() => PlayerLookup::Found(stats),
            RetryOutcome::Success {
                value: Some(stats), ..
            } => {
                warn!(
                    "discarding stats for {} ({}): rating {:?} is not usable",
                    display_name, player_id, stats.rating
                );
                PlayerLookup::Absent(Absence::InvalidData(format!(
                    "rating {:?} is not a finite number",
                    stats.rating
                )))
            }
            RetryOutcome::Success { value: None, .. } => {
                debug!("no stats upstream for {} ({})", display_name, player_id);
                PlayerLookup::Absent(Absence::NotFound)
            }
            RetryOutcome::Permanent { error, attempts } => {
                warn!(
                    "{} failed permanently after {} attempt(s): {}",
                    label, attempts, error
                );
                PlayerLookup::Absent(Absence::Permanent { error, attempts })
            }
            RetryOutcome::Exhausted { error, attempts } => {
                warn!("{} gave up after {} attempts: {}", label, attempts, error);
                PlayerLookup::Absent(Absence::Exhausted { error, attempts })
            }
        };

        let stored = match lookup {
            PlayerLookup::Found(ref stats) => Some(stats.clone()),
            PlayerLookup::Absent(_) => None,
        };
        self.store(player_id, stored);
        lookup
    }

    fn cached(&self, player_id: &str) -> Option<PlayerLookup> {
        let cache = lock(&self.cache);
        cache
            .get_fresh(player_id, now_ms())
            .map(|entry| match entry.stats {
                Some(ref stats) => PlayerLookup::Found(stats.clone()),
                None => PlayerLookup::Absent(Absence::CachedMiss),
            })
    }

    fn store(&self, player_id: &str, stats: Option<PlayerStats>) {
        lock(&self.cache).insert(player_id, stats, now_ms());
        if let Some(ref writer) = self.writer {
            writer.mark_dirty();
        }
    }

    /// Upstream player-stat calls made so far, retries included.
    pub fn upstream_calls(&self) -> u64 {
        self.upstream_calls.load(Ordering::Relaxed)
    }

    pub fn cached_players(&self) -> usize {
        lock(&self.cache).len()
    }

    /// Flush pending cache writes and wait for them to land.
    pub async fn shutdown(&self) {
        if let Some(ref writer) = self.writer {
            writer.flush().await;
        }
    }

    /// Synchronous write of any unsaved entries.
    pub fn flush_now(&self) {
        if let Some(ref path) = self.cache_path {
            persist::persist(&self.cache, path);
        }
    }
}

impl Drop for FetchGateway {
    fn drop(&mut self) {
        self.flush_now();
    }
}
