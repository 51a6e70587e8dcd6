// End-to-end prediction scenarios against a scripted stats source

mod common;

use assert_float_eq::*;
use common::{predictor, roster, ScriptedSource};
use match_forecast::engine::adjustment::{Adjustment, AdjustmentStage};
use match_forecast::engine::confidence::{ConfidenceFactor, QualityLevel};
use match_forecast::error::SourceError;
use match_forecast::feed::types::{DailyMatch, HeadToHeadRecord, MatchResult, PlayerStats};
use std::sync::Arc;

const TEAM1: [&str; 5] = ["a1", "a2", "a3", "a4", "a5"];
const TEAM2: [&str; 5] = ["b1", "b2", "b3", "b4", "b5"];

fn logistic(diff: f64) -> f64 {
    1.0 / (1.0 + (-4.0 * diff).exp())
}

fn with_stats(mut source: ScriptedSource, ids: &[&str], stats: PlayerStats) -> ScriptedSource {
    for id in ids {
        source = source.stats(id, stats.clone());
    }
    source
}

#[tokio::test(start_paused = true)]
async fn test_rating_and_maps_only_team_strength() {
    let stats = PlayerStats {
        rating: Some(1.15),
        maps_played: Some(50.0),
        ..Default::default()
    };
    let source = with_stats(ScriptedSource::new(), &TEAM1, stats);
    let (predictor, _gw) = predictor(Arc::new(source));

    let outcome = predictor
        .predict(
            &roster("t1", "Alpha", None, &TEAM1),
            &roster("t2", "Bravo", None, &TEAM2),
            None,
        )
        .await;

    let per_player = (1.0 * 0.20 + 1.15 * 0.35) / 0.55;
    assert_float_absolute_eq!(per_player, outcome.team1_strength.average_rating, 1e-12);
    assert_eq!(outcome.team1_strength.players_analyzed, 5);
    assert_eq!(outcome.team1_strength.players_missing_stats, 0);
    assert_eq!(outcome.team1_strength.data_points_used, 10);

    assert_eq!(outcome.team2_strength.average_rating, 0.9);
    assert_eq!(outcome.team2_strength.players_missing_stats, 5);
    assert_float_absolute_eq!(per_player - 0.9, outcome.raw_difference, 1e-12);
    assert!(outcome.team1_probability > 0.5);
}

#[tokio::test(start_paused = true)]
async fn test_no_stats_equal_teams_rank_breaks_tie() {
    let (predictor, gw) = predictor(Arc::new(ScriptedSource::new()));

    let outcome = predictor
        .predict(
            &roster("t1", "Alpha", Some(1), &TEAM1),
            &roster("t2", "Bravo", Some(2), &TEAM2),
            None,
        )
        .await;

    assert_eq!(outcome.raw_difference, 0.0);
    assert_eq!(
        outcome.adjustments[0],
        Adjustment::Rank {
            team1_rank: 1,
            team2_rank: 2,
            nudge: 0.002
        }
    );
    assert!(matches!(
        outcome.adjustments[1],
        Adjustment::Skipped {
            stage: AdjustmentStage::HeadToHead,
            ..
        }
    ));
    assert_float_absolute_eq!(logistic(0.002), outcome.team1_probability, 1e-12);
    assert_eq!(outcome.team1_probability + outcome.team2_probability, 1.0);
    assert_eq!(outcome.favourite(), Some("Alpha"));

    assert_eq!(outcome.confidence.quality_level, QualityLevel::Low);
    assert!(outcome.confidence.level <= 0.4);
    assert_eq!(
        outcome.confidence.factors,
        vec![
            ConfidenceFactor::InsufficientPlayerStats,
            ConfidenceFactor::InsufficientH2h,
            ConfidenceFactor::InsufficientRecentH2h,
        ]
    );
    assert_eq!(gw.upstream_calls(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_h2h_record_favours_team1() {
    let source = with_stats(ScriptedSource::new(), &TEAM1, PlayerStats::rating_only(1.0));
    let source = with_stats(source, &TEAM2, PlayerStats::rating_only(1.0)).h2h(
        "t1",
        "t2",
        HeadToHeadRecord {
            team1_wins: 5,
            team2_wins: 3,
            total_matches: 8,
            recent_matches: 3,
        },
    );
    let (predictor, _gw) = predictor(Arc::new(source));

    let outcome = predictor
        .predict(
            &roster("t1", "Alpha", None, &TEAM1),
            &roster("t2", "Bravo", None, &TEAM2),
            None,
        )
        .await;

    match outcome.adjustments[1] {
        Adjustment::HeadToHead {
            win_rate_diff,
            nudge,
            total_matches,
            ..
        } => {
            assert_float_absolute_eq!(0.25, win_rate_diff, 1e-12);
            assert_float_absolute_eq!(0.025, nudge, 1e-12);
            assert_eq!(total_matches, 8);
        }
        ref other => panic!("expected h2h adjustment, got {other:?}"),
    }
    assert_float_absolute_eq!(0.025, outcome.effective_difference, 1e-12);
    assert!(outcome.team1_probability > 0.5);
    assert!(!outcome
        .confidence
        .factors
        .contains(&ConfidenceFactor::InsufficientH2h));
}

#[tokio::test(start_paused = true)]
async fn test_h2h_failure_degrades_to_empty_record() {
    let source = ScriptedSource::new().failing_h2h("t1", "t2", SourceError::with_status(500, "boom"));
    let (predictor, _gw) = predictor(Arc::new(source));

    let outcome = predictor
        .predict(
            &roster("t1", "Alpha", Some(3), &["x1"]),
            &roster("t2", "Bravo", Some(9), &["y1"]),
            None,
        )
        .await;

    assert!(matches!(
        outcome.adjustments[1],
        Adjustment::Skipped {
            stage: AdjustmentStage::HeadToHead,
            ..
        }
    ));
    assert!(outcome
        .confidence
        .factors
        .contains(&ConfidenceFactor::InsufficientH2h));
}

#[tokio::test(start_paused = true)]
async fn test_map_request_is_neutral_but_lowers_confidence() {
    let source = with_stats(ScriptedSource::new(), &TEAM1, PlayerStats::rating_only(1.1));
    let source = Arc::new(with_stats(source, &TEAM2, PlayerStats::rating_only(1.0)));
    let (predictor, _gw) = predictor(source);
    let team1 = roster("t1", "Alpha", Some(4), &TEAM1);
    let team2 = roster("t2", "Bravo", Some(7), &TEAM2);

    let without = predictor.predict(&team1, &team2, None).await;
    let with_map = predictor.predict(&team1, &team2, Some("Inferno")).await;

    assert_eq!(with_map.map.as_deref(), Some("Inferno"));
    assert_eq!(
        with_map.adjustments[2].to_string(),
        "map: skipped: not implemented"
    );
    assert_eq!(with_map.effective_difference, without.effective_difference);
    assert_eq!(with_map.team1_probability, without.team1_probability);
    assert!(with_map
        .confidence
        .factors
        .contains(&ConfidenceFactor::InsufficientMapData));
    assert!(with_map.confidence.level < without.confidence.level);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_teams_predict_even() {
    let (predictor, gw) = predictor(Arc::new(ScriptedSource::new()));

    let outcome = predictor.predict_by_name("Nobody", "Nowhere", None).await;

    assert_eq!(outcome.team1_probability, 0.5);
    assert_eq!(outcome.team2_probability, 0.5);
    assert_eq!(outcome.favourite(), None);
    assert_eq!(outcome.team1_strength.players_analyzed, 0);
    assert_eq!(outcome.team1_strength.average_rating, 0.9);
    assert_eq!(outcome.confidence.quality_level, QualityLevel::Low);
    assert!(outcome.confidence.level <= 0.4);
    assert!(outcome
        .confidence
        .factors
        .contains(&ConfidenceFactor::MissingRanks));
    assert_eq!(gw.upstream_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_mixed_roster_counts() {
    let source = ScriptedSource::new()
        .stats("m1", PlayerStats::rating_only(1.4))
        .stats(
            "m2",
            PlayerStats {
                rating: Some(f64::NAN),
                ..Default::default()
            },
        )
        .script("m3", vec![Err(SourceError::with_code("EPARSE", "bad json"))]);
    let (predictor, _gw) = predictor(Arc::new(source));

    let outcome = predictor
        .predict(
            &roster("t1", "Alpha", None, &["m1", "m2", "m3", "m4"]),
            &roster("t2", "Bravo", None, &[]),
            None,
        )
        .await;

    let s = &outcome.team1_strength;
    assert_eq!(s.players_analyzed, 4);
    assert_eq!(s.players_missing_stats, 3);
    assert!(s.players_missing_stats <= s.players_analyzed);
    assert_float_absolute_eq!((1.4 + 0.9 * 3.0) / 4.0, s.average_rating, 1e-12);
}

#[tokio::test(start_paused = true)]
async fn test_daily_batch_and_grading() {
    let source = with_stats(ScriptedSource::new(), &TEAM1, PlayerStats::rating_only(1.3));
    let source = with_stats(source, &TEAM2, PlayerStats::rating_only(0.8))
        .roster(roster("t1", "Alpha", Some(5), &TEAM1))
        .roster(roster("t2", "Bravo", Some(40), &TEAM2))
        .failing_roster("Charlie", SourceError::with_status(503, "unavailable"))
        .daily(vec![
            DailyMatch {
                id: "m-100".to_string(),
                team1_name: "Alpha".to_string(),
                team2_name: "Bravo".to_string(),
                map: None,
            },
            DailyMatch {
                id: "m-101".to_string(),
                team1_name: "Charlie".to_string(),
                team2_name: "Delta".to_string(),
                map: Some("Nuke".to_string()),
            },
        ])
        .result(
            "m-100",
            MatchResult {
                winner_id: "t1".to_string(),
                winner_name: "Alpha".to_string(),
                scores: vec![16, 9],
            },
        );
    let (predictor, _gw) = predictor(Arc::new(source));

    let outcomes = predictor.run_daily().await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].match_id.as_deref(), Some("m-100"));
    assert_eq!(outcomes[0].favourite(), Some("Alpha"));
    assert_eq!(outcomes[1].match_id.as_deref(), Some("m-101"));
    assert_eq!(outcomes[1].team1_probability, 0.5);

    assert_eq!(predictor.grade("m-100", &outcomes[0]).await, Some(true));
    assert_eq!(predictor.grade("m-101", &outcomes[1]).await, None);
    assert_eq!(predictor.grade("m-999", &outcomes[0]).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_outcome_serializes() {
    let (predictor, _gw) = predictor(Arc::new(ScriptedSource::new()));
    let outcome = predictor
        .predict(
            &roster("t1", "Alpha", Some(1), &[]),
            &roster("t2", "Bravo", Some(2), &[]),
            None,
        )
        .await;

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["team1"], "Alpha");
    assert_eq!(json["confidence"]["quality_level"], "low");
    assert_eq!(json["adjustments"][0]["kind"], "rank");
    assert_eq!(json["adjustments"][1]["stage"], "head_to_head");
    assert!(json["predicted_at"].is_string());
    assert!(json.get("match_id").is_none());
}
