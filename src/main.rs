use anyhow::{Context, Result};
use match_forecast::config::Config;
use match_forecast::diagnostic::{build_prediction_rows, render_table};
use match_forecast::feed::http_source::HttpStatsSource;
use match_forecast::gateway::FetchGateway;
use match_forecast::pipeline::{MatchPredictor, PredictionOutcome};
use match_forecast::shutdown::ShutdownSignal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct Args {
    config_path: PathBuf,
    json: bool,
    map: Option<String>,
    /// `Some((team1, team2))` for a single ad-hoc match instead of the daily card.
    matchup: Option<(String, String)>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config_path: PathBuf::from("config.toml"),
        json: false,
        map: None,
        matchup: None,
    };
    let mut teams = Vec::new();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--json" => args.json = true,
            "--config" => {
                args.config_path = it.next().map(PathBuf::from).context("--config needs a path")?;
            }
            "--map" => args.map = Some(it.next().context("--map needs a map name")?),
            other => teams.push(other.to_string()),
        }
    }
    match teams.len() {
        0 => {}
        2 => {
            let team2 = teams.pop().unwrap_or_default();
            let team1 = teams.pop().unwrap_or_default();
            args.matchup = Some((team1, team2));
        }
        _ => anyhow::bail!("usage: match-forecast [--config PATH] [--json] [--map MAP] [TEAM1 TEAM2]"),
    }
    Ok(args)
}

fn print_report(outcomes: &[PredictionOutcome], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcomes)?);
        return Ok(());
    }
    println!();
    if outcomes.is_empty() {
        println!("  No matches to predict.");
    } else {
        print!("{}", render_table(&build_prediction_rows(outcomes)));
    }
    println!();
    Ok(())
}

async fn run(predictor: &MatchPredictor, args: &Args) -> Result<Vec<PredictionOutcome>> {
    match args.matchup {
        Some((ref team1, ref team2)) => Ok(vec![
            predictor
                .predict_by_name(team1, team2, args.map.as_deref())
                .await,
        ]),
        None => predictor.run_daily().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_file = std::fs::File::create("match-forecast.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("match_forecast=info")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    let args = parse_args()?;

    // Load saved keys from .env (real env vars take precedence)
    Config::load_env_file();
    let config = Config::load(&args.config_path)
        .with_context(|| format!("loading {}", args.config_path.display()))?;

    if !args.json {
        println!();
        println!("  Match Forecast v0.1.0");
        println!("  =====================");
        println!("  Stats source: {}", config.source.base_url);
    }

    let source = Arc::new(HttpStatsSource::new(&config.source, Config::stats_api_key())?);
    let gateway = Arc::new(FetchGateway::new(source, &config.gateway, &config.cache));
    if !args.json {
        println!("  Cached players: {}", gateway.cached_players());
    }
    let predictor = MatchPredictor::new(gateway.clone(), &config);

    let mut shutdown = ShutdownSignal::install().context("installing signal handlers")?;
    let result = tokio::select! {
        r = run(&predictor, &args) => Some(r),
        signal = shutdown.recv() => {
            tracing::warn!(signal, "interrupted, flushing cache");
            None
        }
    };

    // Flush on every exit path before reporting.
    gateway.shutdown().await;
    tracing::info!(
        upstream_calls = gateway.upstream_calls(),
        cached_players = gateway.cached_players(),
        "run finished"
    );

    match result {
        Some(Ok(outcomes)) => print_report(&outcomes, args.json),
        Some(Err(e)) => Err(e),
        None => {
            eprintln!("  Interrupted, cache flushed.");
            Ok(())
        }
    }
}
