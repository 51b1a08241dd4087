use anyhow::anyhow;
use clap::{Parser, Subcommand};
use forecastbot::api::{
    BinanceClient, CoinCapClient, CryptoCompareClient, FallbackMarketData, MarketData,
};
use forecastbot::config::{parse_symbols, AppConfig};
use forecastbot::evaluation::OutcomeEvaluator;
use forecastbot::forecast::ForecastEmitter;
use forecastbot::persistence::JsonlStore;
use forecastbot::training::{ArtifactStore, HorizonResult, Trainer};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "forecastbot", about = "Short-horizon crypto direction forecasts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Emit one forecast per symbol and horizon for the current slot
    Predict {
        /// Only this horizon (minutes)
        #[arg(long)]
        horizon: Option<u32>,
        /// Comma-separated symbols, e.g. BTCUSDT,ETHUSDT
        #[arg(long)]
        symbols: Option<String>,
        /// Seed for the tie-break RNG
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Resolve pending forecasts whose horizon has passed
    Evaluate {
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Fit scorer parameters on historical candles
    Train {
        /// Days of 1m history to train on
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        symbols: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut config = AppConfig::load().map_err(|e| anyhow!("failed to load configuration: {}", e))?;

    match cli.command {
        Command::Predict {
            horizon,
            symbols,
            seed,
        } => {
            if let Some(h) = horizon {
                if h == 0 {
                    return Err(anyhow!("--horizon must be a positive number of minutes"));
                }
                config.horizons = vec![h];
            }
            apply_symbols(&mut config, symbols);
            if seed.is_some() {
                config.seed = seed;
            }
            predict(&config).await
        }
        Command::Evaluate { symbols } => {
            apply_symbols(&mut config, symbols);
            evaluate(&config).await
        }
        Command::Train { days, symbols } => {
            if let Some(d) = days {
                config.train_days = d;
            }
            apply_symbols(&mut config, symbols);
            train(&config).await
        }
    }
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("forecastbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn apply_symbols(config: &mut AppConfig, raw: Option<String>) {
    if let Some(raw) = raw {
        let symbols = parse_symbols(&raw);
        if !symbols.is_empty() {
            config.symbols = symbols;
        }
    }
}

fn binance(config: &AppConfig) -> anyhow::Result<BinanceClient> {
    BinanceClient::new(
        config.binance_base_url.clone(),
        config.http_timeout(),
        config.max_retries,
    )
    .map_err(|e| anyhow!("failed to build Binance client: {}", e))
}

fn cryptocompare(config: &AppConfig) -> anyhow::Result<CryptoCompareClient> {
    CryptoCompareClient::new(
        config.cryptocompare_base_url.clone(),
        config.http_timeout(),
        config.max_retries,
    )
    .map_err(|e| anyhow!("failed to build CryptoCompare client: {}", e))
}

fn coincap(config: &AppConfig) -> anyhow::Result<CoinCapClient> {
    CoinCapClient::new(
        config.coincap_base_url.clone(),
        config.http_timeout(),
        config.max_retries,
    )
    .map_err(|e| anyhow!("failed to build CoinCap client: {}", e))
}

/// Binance first for history, then CryptoCompare, then CoinCap
fn history_sources(config: &AppConfig) -> anyhow::Result<FallbackMarketData> {
    let sources: Vec<Box<dyn MarketData>> = vec![
        Box::new(binance(config)?),
        Box::new(cryptocompare(config)?),
        Box::new(coincap(config)?),
    ];
    Ok(FallbackMarketData::new(sources))
}

async fn predict(config: &AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        "🚀 Predicting {} symbols × {:?}m",
        config.symbols.len(),
        config.horizons
    );

    let market = history_sources(config)?;
    let store = JsonlStore::new(&config.data_dir);
    let mut emitter = ForecastEmitter::new(market, store, config.emitter_settings());
    if let Some(seed) = config.seed {
        emitter = emitter.with_seed(seed);
    }

    let report = emitter.run(&config.symbols, &config.horizons).await;

    tracing::info!(
        "✅ Predict done: {} written ({} No-Trade), {} same-slot skips, {} failures",
        report.written.len(),
        report.no_trade_count(),
        report.suppressed,
        report.failures.len()
    );
    for failure in &report.failures {
        tracing::warn!("  ✗ {} {}m: {}", failure.symbol, failure.horizon, failure.error);
    }

    Ok(())
}

async fn evaluate(config: &AppConfig) -> anyhow::Result<()> {
    tracing::info!("🔍 Evaluating pending forecasts for {} symbols", config.symbols.len());

    // CryptoCompare first for the realised price
    let sources: Vec<Box<dyn MarketData>> = vec![
        Box::new(cryptocompare(config)?),
        Box::new(binance(config)?),
        Box::new(coincap(config)?),
    ];
    let market = FallbackMarketData::new(sources);
    let store = JsonlStore::new(&config.data_dir);
    let evaluator = OutcomeEvaluator::new(market, store, config.evaluator_settings());

    let report = evaluator.run(&config.symbols, &config.horizons).await;

    let correct: usize = report.streams.iter().map(|s| s.correct).sum();
    let pending: usize = report
        .streams
        .iter()
        .map(|s| s.too_young + s.deferred + s.skipped)
        .sum();
    tracing::info!(
        "✅ Evaluate done: {} resolved ({} correct), {} still pending, {} failures",
        report.resolved(),
        correct,
        pending,
        report.failures.len()
    );
    if !report.any_changed() {
        tracing::info!("  No changes");
    }

    Ok(())
}

async fn train(config: &AppConfig) -> anyhow::Result<()> {
    let market = history_sources(config)?;
    let artifacts = ArtifactStore::new(&config.data_dir);
    let trainer = Trainer::new(market, artifacts, config.trainer_settings());

    let report = trainer.run(&config.symbols, &config.horizons).await;

    for (symbol, result) in &report.results {
        match result {
            HorizonResult::Saved {
                horizon,
                n_samples,
                accuracy,
                ..
            } => tracing::info!(
                "  ✓ {} {}m: {} samples, train accuracy {:.1}%",
                symbol,
                horizon,
                n_samples,
                accuracy * 100.0
            ),
            HorizonResult::Skipped { horizon, n_samples } => {
                tracing::info!("  - {} {}m: skipped ({} samples)", symbol, horizon, n_samples)
            }
        }
    }
    tracing::info!(
        "✅ Train done: {} models saved, {} skipped, {} failures",
        report.saved(),
        report.skipped(),
        report.failures.len()
    );

    Ok(())
}
