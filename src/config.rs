use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_FILE: &str = ".env";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub gateway: GatewayConfig,
    pub cache: CacheConfig,
    pub rating: RatingConfig,
    pub adjustment: AdjustmentConfig,
    pub confidence: ConfidenceConfig,
    pub probability: ProbabilityConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Throttling and retry settings for per-player stat fetches.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    /// Upstream calls allowed in flight at once. 1 = fully serialized.
    pub max_concurrent: usize,
    pub inter_call_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub transient_codes: Vec<String>,
    pub transient_statuses: Vec<u16>,
    /// Lowercase substrings; an error message containing any is transient.
    pub transient_patterns: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            inter_call_delay_ms: 1_000,
            request_timeout_ms: 10_000,
            max_attempts: 3,
            retry_base_delay_ms: 2_000,
            transient_codes: [
                "ETIMEDOUT",
                "ECONNRESET",
                "ECONNREFUSED",
                "EPIPE",
                "ENETUNREACH",
                "EAI_AGAIN",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            transient_statuses: vec![408, 429, 500, 502, 503, 504],
            transient_patterns: [
                "timeout",
                "timed out",
                "rate limit",
                "too many requests",
                "socket hang up",
                "network",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl GatewayConfig {
    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.inter_call_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache file location. `None` keeps the cache in memory only.
    pub path: Option<PathBuf>,
    pub ttl_hours: u64,
    pub debounce_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("player_stats_cache.json")),
            ttl_hours: 24,
            debounce_ms: 2_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RatingConfig {
    pub default_rating: f64,
    pub min_rating: f64,
    pub max_rating: f64,
    pub base_kpr: f64,
    pub max_kpr_mult: f64,
    pub base_hs: f64,
    pub max_hs_mult: f64,
    pub base_rc: f64,
    pub max_rc_mult: f64,
    pub base_maps: f64,
    pub max_maps_mult: f64,
    pub base_dpr: f64,
    pub min_dpr_mult: f64,
    pub weights: DimensionWeights,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            default_rating: 0.9,
            min_rating: 0.5,
            max_rating: 2.0,
            base_kpr: 0.7,
            max_kpr_mult: 1.8,
            base_hs: 45.0,
            max_hs_mult: 1.6,
            base_rc: 70.0,
            max_rc_mult: 1.4,
            base_maps: 50.0,
            max_maps_mult: 1.5,
            base_dpr: 1.0,
            min_dpr_mult: 0.1,
            weights: DimensionWeights::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DimensionWeights {
    pub fragging: f64,
    pub consistency: f64,
    pub impact: f64,
    pub survival: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            fragging: 0.30,
            consistency: 0.20,
            impact: 0.35,
            survival: 0.15,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdjustmentConfig {
    /// Rank only breaks ties: applied when |strength diff| is below this.
    pub equality_threshold: f64,
    pub rank_scale: f64,
    pub max_rank_nudge: f64,
    pub h2h_min_matches: u32,
    pub h2h_scale: f64,
    pub max_h2h_effect: f64,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            equality_threshold: 0.05,
            rank_scale: 0.002,
            max_rank_nudge: 0.05,
            h2h_min_matches: 3,
            h2h_scale: 0.1,
            max_h2h_effect: 0.05,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub weights: QualityWeights,
    pub thresholds: QualityThresholds,
    pub penalties: PenaltyFactors,
    pub min_player_coverage: f64,
    pub min_h2h_matches: u32,
    pub min_recent_h2h_matches: u32,
    pub min_map_matches: u32,
    pub base_confidence_factor: f64,
    pub low_confidence_cap: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            thresholds: QualityThresholds::default(),
            penalties: PenaltyFactors::default(),
            min_player_coverage: 0.6,
            min_h2h_matches: 3,
            min_recent_h2h_matches: 2,
            min_map_matches: 5,
            base_confidence_factor: 0.95,
            low_confidence_cap: 0.4,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QualityWeights {
    pub player_stats: f64,
    pub h2h: f64,
    pub map_stats: f64,
    pub rank: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            player_stats: 0.40,
            h2h: 0.25,
            map_stats: 0.15,
            rank: 0.20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QualityThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            low: 0.3,
            medium: 0.5,
            high: 0.8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PenaltyFactors {
    pub insufficient_player_stats: f64,
    pub insufficient_h2h: f64,
    pub insufficient_recent_h2h: f64,
    pub insufficient_map_data: f64,
    pub missing_ranks: f64,
}

impl Default for PenaltyFactors {
    fn default() -> Self {
        Self {
            insufficient_player_stats: 0.7,
            insufficient_h2h: 0.85,
            insufficient_recent_h2h: 0.9,
            insufficient_map_data: 0.9,
            missing_ranks: 0.85,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProbabilityConfig {
    pub scaling_factor: f64,
    pub min_probability: f64,
    pub max_probability: f64,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        Self {
            scaling_factor: 4.0,
            min_probability: 0.05,
            max_probability: 0.95,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honour. Called by `load`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.gateway.max_concurrent == 0 {
            return invalid("gateway.max_concurrent must be at least 1");
        }
        if self.gateway.max_attempts == 0 {
            return invalid("gateway.max_attempts must be at least 1");
        }
        if self.cache.ttl_hours == 0 {
            return invalid("cache.ttl_hours must be at least 1");
        }

        let r = &self.rating;
        if !(r.min_rating < r.max_rating) {
            return invalid("rating.min_rating must be below rating.max_rating");
        }
        if r.default_rating < r.min_rating || r.default_rating > r.max_rating {
            return invalid("rating.default_rating must lie within [min_rating, max_rating]");
        }
        let bases = [r.base_kpr, r.base_hs, r.base_rc, r.base_maps, r.base_dpr];
        if bases.iter().any(|b| !(*b > 0.0)) {
            return invalid("rating base values must be positive");
        }
        let w = &r.weights;
        if [w.fragging, w.consistency, w.impact, w.survival]
            .iter()
            .any(|x| !(*x >= 0.0))
        {
            return invalid("rating.weights must be non-negative");
        }

        let c = &self.confidence;
        let qw = &c.weights;
        if [qw.player_stats, qw.h2h, qw.map_stats, qw.rank]
            .iter()
            .any(|x| !(*x >= 0.0))
        {
            return invalid("confidence.weights must be non-negative");
        }
        let t = &c.thresholds;
        if !(t.low <= t.medium && t.medium <= t.high) {
            return invalid("confidence.thresholds must satisfy low <= medium <= high");
        }
        if !(0.0..=1.0).contains(&c.low_confidence_cap) {
            return invalid("confidence.low_confidence_cap must lie within [0, 1]");
        }

        let p = &self.probability;
        if !(0.0 <= p.min_probability && p.min_probability < p.max_probability && p.max_probability <= 1.0) {
            return invalid("probability bounds must satisfy 0 <= min < max <= 1");
        }

        let a = &self.adjustment;
        if a.max_rank_nudge < 0.0 || a.max_h2h_effect < 0.0 {
            return invalid("adjustment caps must be non-negative");
        }

        Ok(())
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        // Strip BOM if present (common on Windows-created files)
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        for line in content.lines() {
            let line = line.trim().trim_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    /// Optional API key for the stats source. Anonymous access when unset.
    pub fn stats_api_key() -> Option<String> {
        match std::env::var("STATS_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Some(sanitize_key(&key)),
            _ => None,
        }
    }
}

/// Strip carriage returns, BOM, and other invisible chars from a key value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}
