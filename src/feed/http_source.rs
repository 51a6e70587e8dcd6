use super::types::*;
use super::StatsSource;
use crate::config::SourceConfig;
use crate::error::SourceError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-api-key";

/// JSON stats API client.
///
/// Endpoints (relative to `base_url`):
///   - `/teams/{name}`             roster
///   - `/players/{id}/stats`       player stats
///   - `/h2h/{team1}/{team2}`      head-to-head record
///   - `/matches/today`            daily match list
///   - `/matches/{id}/result`      match result
pub struct HttpStatsSource {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

/// Map a reqwest transport error to a source error with an errno-style code so
/// the retry policy can classify it.
///
/// Only timeouts and refused or dropped connections get a code. Anything else
/// stays uncoded and falls through to status and message matching.
fn transport_error(e: reqwest::Error) -> SourceError {
    let code = if e.is_timeout() {
        Some("ETIMEDOUT")
    } else if e.is_connect() {
        Some("ECONNREFUSED")
    } else {
        io_error_code(&e)
    };
    SourceError {
        code: code.map(str::to_string),
        status: e.status().map(|s| s.as_u16()),
        message: format!("{:#}", e),
    }
}

/// Find an io error in the source chain and name its errno.
fn io_error_code(e: &(dyn StdError + 'static)) -> Option<&'static str> {
    let mut current = Some(e);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return match io_err.kind() {
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::UnexpectedEof => Some("ECONNRESET"),
                io::ErrorKind::BrokenPipe => Some("EPIPE"),
                io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
                io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
                _ => None,
            };
        }
        current = err.source();
    }
    None
}

impl HttpStatsSource {
    pub fn new(config: &SourceConfig, api_key: Option<String>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("invalid stats base_url {:?}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("stats base_url {:?} cannot carry a path", config.base_url);
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(4)
            .build()
            .context("failed to build stats HTTP client")?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Append path segments to the base URL. Each segment is percent-encoded,
    /// so a `/` inside a team name stays inside its segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot fail: `new` rejects cannot-be-a-base URLs
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET a JSON resource. 404 is "not found", not an error.
    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>, SourceError> {
        let url = self.url(segments);
        let mut req = self.client.get(url.clone());
        if let Some(ref key) = self.api_key {
            req = req.header(API_KEY_HEADER, key.as_str());
        }

        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::with_status(
                status.as_u16(),
                format!("GET {} failed ({}): {}", url.path(), status, body),
            ));
        }

        let body = resp.text().await.map_err(transport_error)?;
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(None);
        }
        serde_json::from_str(&body).map(Some).map_err(|e| {
            SourceError::with_code(
                "EPARSE",
                format!("failed to parse {} response: {}", url.path(), e),
            )
        })
    }
}

#[async_trait]
impl StatsSource for HttpStatsSource {
    async fn get_roster(&self, team_name: &str) -> Result<Option<Roster>, SourceError> {
        self.get_json(&["teams", team_name]).await
    }

    async fn get_player_stats(&self, player_id: &str) -> Result<Option<PlayerStats>, SourceError> {
        self.get_json(&["players", player_id, "stats"]).await
    }

    async fn get_head_to_head(
        &self,
        team1_id: &str,
        team2_id: &str,
    ) -> Result<HeadToHeadRecord, SourceError> {
        Ok(self
            .get_json(&["h2h", team1_id, team2_id])
            .await?
            .unwrap_or_default())
    }

    async fn get_daily_matches(&self) -> Result<Vec<DailyMatch>, SourceError> {
        Ok(self
            .get_json(&["matches", "today"])
            .await?
            .unwrap_or_default())
    }

    async fn get_match_result(&self, match_id: &str) -> Result<Option<MatchResult>, SourceError> {
        self.get_json(&["matches", match_id, "result"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::gateway::retry::RetryPolicy;

    fn source(base_url: &str) -> HttpStatsSource {
        let config = SourceConfig {
            base_url: base_url.to_string(),
            request_timeout_ms: 1000,
        };
        HttpStatsSource::new(&config, None).unwrap()
    }

    #[test]
    fn test_segments_are_percent_encoded() {
        let source = source("http://stats.local/api");
        assert_eq!(
            source.url(&["teams", "Natus Vincere"]).as_str(),
            "http://stats.local/api/teams/Natus%20Vincere"
        );
        assert_eq!(
            source.url(&["teams", "AC/DC"]).as_str(),
            "http://stats.local/api/teams/AC%2FDC"
        );
        assert_eq!(
            source.url(&["teams", "100%?#"]).as_str(),
            "http://stats.local/api/teams/100%25%3F%23"
        );
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        assert_eq!(
            source("http://stats.local/api/").url(&["matches", "today"]).as_str(),
            "http://stats.local/api/matches/today"
        );
        assert_eq!(
            source("http://stats.local").url(&["matches", "today"]).as_str(),
            "http://stats.local/matches/today"
        );
    }

    #[test]
    fn test_bad_base_url_is_rejected() {
        for bad in ["not a url", "mailto:stats@local"] {
            let config = SourceConfig {
                base_url: bad.to_string(),
                request_timeout_ms: 1000,
            };
            assert!(HttpStatsSource::new(&config, None).is_err(), "{bad}");
        }
    }

    #[derive(Debug)]
    struct Wrapped(io::Error);

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "request failed")
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_only_dropped_connections_are_reset() {
        let reset = Wrapped(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(io_error_code(&reset), Some("ECONNRESET"));
        let pipe = io::Error::from(io::ErrorKind::BrokenPipe);
        assert_eq!(io_error_code(&pipe), Some("EPIPE"));

        let denied = Wrapped(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(io_error_code(&denied), None);
        let plain = std::fmt::Error;
        assert_eq!(io_error_code(&plain), None);
    }

    #[tokio::test]
    async fn test_builder_error_is_permanent() {
        let err = source("http://stats.local")
            .client
            .get("http://")
            .send()
            .await
            .unwrap_err();
        let mapped = transport_error(err);
        assert_eq!(mapped.code, None);
        assert!(!RetryPolicy::from_config(&GatewayConfig::default()).is_transient(&mapped));
    }
}
