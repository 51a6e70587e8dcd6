//! Normalized upstream types (provider-agnostic). Every numeric player field
//! is independently optional; upstream sends numbers, numeric strings, or
//! nothing at all.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    #[serde(default, deserialize_with = "lenient_number")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub kills_per_round: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub headshot_percent: Option<f64>,
    /// Share of rounds with a kill, assist, survival or trade (percent).
    #[serde(default, deserialize_with = "lenient_number")]
    pub round_contribution: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub maps_played: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub deaths_per_round: Option<f64>,
}

impl PlayerStats {
    /// Stats carrying only an overall rating.
    pub fn rating_only(rating: f64) -> Self {
        Self {
            rating: Some(rating),
            ..Default::default()
        }
    }

    pub fn has_valid_rating(&self) -> bool {
        self.rating.is_some_and(f64::is_finite)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRef {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    /// World ranking; lower is stronger.
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub players: Vec<PlayerRef>,
}

impl Roster {
    /// Placeholder used when the source has no roster for a team.
    pub fn unknown(name: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            rank: None,
            players: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadToHeadRecord {
    pub team1_wins: u32,
    pub team2_wins: u32,
    pub total_matches: u32,
    /// Matches inside the source's "recent" window.
    pub recent_matches: u32,
}

impl HeadToHeadRecord {
    /// Draws and unfinished matches count toward the total but not toward
    /// either side's wins, so wins can never exceed the total. Upstream
    /// records that break this get their total raised to the win sum.
    pub fn normalized(self) -> Self {
        let wins = self.team1_wins.saturating_add(self.team2_wins);
        Self {
            total_matches: self.total_matches.max(wins),
            recent_matches: self.recent_matches.min(self.total_matches.max(wins)),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMatch {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub team1_name: String,
    pub team2_name: String,
    #[serde(default)]
    pub map: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    #[serde(deserialize_with = "string_or_number")]
    pub winner_id: String,
    pub winner_name: String,
    #[serde(default)]
    pub scores: Vec<u32>,
}

/// Accepts a JSON number or a numeric string. Anything else that is present
/// but not numeric becomes NaN so downstream validation can reject it;
/// `null` and missing fields become `None`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Number(n)) => Some(n.as_f64().unwrap_or(f64::NAN)),
        Some(serde_json::Value::String(s)) => {
            let s = s.trim().trim_end_matches('%');
            Some(s.parse::<f64>().unwrap_or(f64::NAN))
        }
        Some(_) => Some(f64::NAN),
    })
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}
