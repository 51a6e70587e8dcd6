use crate::feed::types::PlayerStats;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// One cached lookup. `stats: None` is a known miss and is served like a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub stats: Option<PlayerStats>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// In-memory player stats table with TTL freshness and a dirty flag for the
/// background writer.
#[derive(Debug)]
pub struct StatsCache {
    entries: HashMap<String, CacheEntry>,
    ttl_ms: i64,
    dirty: bool,
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl StatsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            dirty: false,
        }
    }

    /// Read the cache file, dropping anything already expired. A missing or
    /// unreadable file yields an empty cache.
    pub fn load(path: &Path, ttl: Duration, now_ms: i64) -> Self {
        let mut cache = Self::new(ttl);
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return cache,
        };
        let pairs: Vec<(String, CacheEntry)> = match serde_json::from_str(&raw) {
            Ok(pairs) => pairs,
            Err(e) => {
                tracing::warn!("ignoring corrupt stats cache {}: {}", path.display(), e);
                return cache;
            }
        };
        cache.entries = pairs.into_iter().collect();
        let pruned = cache.prune(now_ms);
        // pruning alone does not warrant a rewrite
        cache.dirty = false;
        tracing::debug!(
            "loaded {} cached players from {} ({} expired)",
            cache.entries.len(),
            path.display(),
            pruned
        );
        cache
    }

    pub fn get_fresh(&self, player_id: &str, now_ms: i64) -> Option<&CacheEntry> {
        self.entries
            .get(player_id)
            .filter(|entry| self.is_fresh(entry, now_ms))
    }

    fn is_fresh(&self, entry: &CacheEntry, now_ms: i64) -> bool {
        now_ms.saturating_sub(entry.timestamp) < self.ttl_ms
    }

    pub fn insert(&mut self, player_id: &str, stats: Option<PlayerStats>, now_ms: i64) {
        self.entries.insert(
            player_id.to_string(),
            CacheEntry {
                stats,
                timestamp: now_ms,
            },
        );
        self.dirty = true;
    }

    /// Remove expired entries. Returns how many were dropped.
    pub fn prune(&mut self, now_ms: i64) -> usize {
        let before = self.entries.len();
        let ttl_ms = self.ttl_ms;
        self.entries
            .retain(|_, entry| now_ms.saturating_sub(entry.timestamp) < ttl_ms);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            self.dirty = true;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Serialize for persistence and clear the dirty flag. Returns `None`
    /// when nothing changed since the last snapshot. Expired entries are
    /// pruned first so they never reach disk.
    pub fn take_snapshot(&mut self, now_ms: i64) -> Result<Option<String>> {
        if !self.dirty {
            return Ok(None);
        }
        self.prune(now_ms);
        let mut pairs: Vec<(&String, &CacheEntry)> = self.entries.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        let json = serde_json::to_string(&pairs).context("serialize stats cache")?;
        self.dirty = false;
        Ok(Some(json))
    }
}

/// Write via a temp file and rename so readers never see a torn file.
pub fn write_atomic(path: &Path, json: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).context("create stats cache dir")?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).context("write stats cache")?;
    fs::rename(&tmp, path).context("swap stats cache")?;
    Ok(())
}
