// Diagnostic utilities for building the prediction report

use crate::pipeline::PredictionOutcome;

/// One report line per prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub match_id: String,
    pub matchup: String,
    pub map: String,
    pub favourite: String,
    pub team1_pct: String,
    pub team2_pct: String,
    pub confidence: String,
    pub quality: String,
    pub coverage: String,
    pub factors: String,
}

/// Format a probability as a whole percentage ("57%").
fn pct(p: f64) -> String {
    format!("{:.0}%", p * 100.0)
}

/// Build display rows, highest-confidence predictions first.
pub fn build_prediction_rows(outcomes: &[PredictionOutcome]) -> Vec<PredictionRow> {
    let mut sorted: Vec<&PredictionOutcome> = outcomes.iter().collect();
    sorted.sort_by(|a, b| b.confidence.level.total_cmp(&a.confidence.level));

    sorted
        .into_iter()
        .map(|o| {
            let with_stats =
                o.team1_strength.players_with_stats() + o.team2_strength.players_with_stats();
            let analyzed = o.team1_strength.players_analyzed + o.team2_strength.players_analyzed;
            let factors = if o.confidence.factors.is_empty() {
                "-".to_string()
            } else {
                o.confidence
                    .factors
                    .iter()
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };

            PredictionRow {
                match_id: o.match_id.clone().unwrap_or_else(|| "-".to_string()),
                matchup: format!("{} vs {}", o.team1, o.team2),
                map: o.map.clone().unwrap_or_else(|| "any".to_string()),
                favourite: o.favourite().unwrap_or("even").to_string(),
                team1_pct: pct(o.team1_probability),
                team2_pct: pct(o.team2_probability),
                confidence: format!("{:.2}", o.confidence.level),
                quality: o.confidence.quality_level.to_string(),
                coverage: format!("{}/{}", with_stats, analyzed),
                factors,
            }
        })
        .collect()
}

/// Render rows as a fixed-width text table.
pub fn render_table(rows: &[PredictionRow]) -> String {
    let mut out = format!(
        "{:<10} {:<36} {:<10} {:<18} {:>5} {:>5} {:>5} {:<7} {:>6}  {}\n",
        "MATCH", "MATCHUP", "MAP", "FAVOURITE", "P1", "P2", "CONF", "QUALITY", "STATS", "FACTORS"
    );
    for r in rows {
        out.push_str(&format!(
            "{:<10} {:<36} {:<10} {:<18} {:>5} {:>5} {:>5} {:<7} {:>6}  {}\n",
            r.match_id,
            r.matchup,
            r.map,
            r.favourite,
            r.team1_pct,
            r.team2_pct,
            r.confidence,
            r.quality,
            r.coverage,
            r.factors
        ));
    }
    out
}
