//! Greeks Engine Binary
//!
//! Replays a JSON-lines event stream through the Greeks pipeline.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin greeks-engine -- config.yaml < events.jsonl
//! ```
//!
//! Each input line is one event tagged by `type`:
//!
//! ```json
//! {"type":"underlying","symbol":"NSE@RELIANCE@OPT","price":"2510","timestamp":"2025-11-25T06:00:00Z"}
//! {"type":"index_volatility","value":18.5,"source":"index","timestamp":"2025-11-25T06:00:00Z"}
//! {"type":"tick","instrument":"NSE@RELIANCE@OPT@25DEC25@CE@2500","price":"85.5","timestamp":"2025-11-25T06:00:00Z"}
//! ```
//!
//! Envelopes are written to stdout, one per line. Logs go to stderr.
//!
//! # Environment Variables
//!
//! - `GREEKS_CONFIG`: config path when none is given on the command line
//! - `RUST_LOG`: log filter (overrides `observability.logging.level`)

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use greeks_engine::config::{Config, DEFAULT_CONFIG_PATH, load_config};
use greeks_engine::models::{TickSnapshot, UnderlyingQuote, VolatilityQuote};
use greeks_engine::observability::{init_metrics, init_tracing};
use greeks_engine::orchestrator::GreeksOrchestrator;
use greeks_engine::store::{
    InMemoryQuoteStore, index_volatility_key, set_json, underlying_history_key, underlying_key,
};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One replayed input event.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Event {
    Underlying(UnderlyingQuote),
    IndexVolatility(VolatilityQuote),
    Tick(TickSnapshot),
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    let path = config_path();
    let config = read_config(&path)?;
    init_tracing(&config.observability.logging).context("failed to initialize logging")?;

    tracing::info!(
        config = %path,
        environment = %config.environment.mode,
        model = %config.pricing.model,
        "Starting Greeks engine replay"
    );

    if config.observability.metrics.enabled {
        let metrics = config.observability.metrics.to_metrics_config()?;
        init_metrics(&metrics).context("failed to start metrics exporter")?;
    }

    let store = Arc::new(InMemoryQuoteStore::new());
    let orchestrator = GreeksOrchestrator::new(&config, store.clone())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut processed = 0_u64;
    let mut failed = 0_u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: Event = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed event");
                continue;
            }
        };

        match event {
            Event::Underlying(quote) => {
                ingest_underlying(&orchestrator, &store, &config, quote).await?;
            }
            Event::IndexVolatility(quote) => {
                let key = index_volatility_key(&config.volatility.index_symbol);
                set_json(store.as_ref(), &key, &quote, None).await?;
            }
            Event::Tick(tick) => {
                processed += 1;
                match orchestrator.compute_greeks(&tick).await {
                    Ok(envelope) => println!("{}", serde_json::to_string(&envelope)?),
                    Err(e) => {
                        // Already logged and counted by the orchestrator
                        failed += 1;
                        tracing::debug!(
                            code = e.code(),
                            instrument = %tick.instrument,
                            "Tick skipped"
                        );
                    }
                }
            }
        }
    }

    let stats = orchestrator.engine_stats();
    let breaker = orchestrator.breaker_snapshot();
    tracing::info!(
        ticks = processed,
        failed,
        batches = stats.batches,
        avg_latency_us = stats.avg_latency().as_micros(),
        breaker_state = %breaker.state,
        breaker_rejections = breaker.total_rejections,
        "Replay finished"
    );
    Ok(())
}

/// Feed an underlying quote to the recency cache and the store.
async fn ingest_underlying(
    orchestrator: &GreeksOrchestrator,
    store: &InMemoryQuoteStore,
    config: &Config,
    quote: UnderlyingQuote,
) -> Result<()> {
    if !orchestrator.observe_underlying(quote.clone()) {
        tracing::debug!(symbol = %quote.symbol, "Ignoring out-of-order underlying quote");
        return Ok(());
    }
    set_json(store, &underlying_key(&quote.symbol), &quote, None).await?;
    store
        .push_front(
            &underlying_history_key(&quote.symbol),
            serde_json::to_string(&quote)?,
            config.resolver.last_known_good_depth,
        )
        .await;
    Ok(())
}

/// Config path from argv, else `GREEKS_CONFIG`, else the default.
fn config_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GREEKS_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

/// Load the config file, or defaults when it does not exist.
fn read_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        load_config(Some(path)).with_context(|| format!("failed to load config from {path}"))
    } else {
        Ok(Config::default())
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}
