//! Command-line composition root for the HFT orchestrator.
//!
//! Wires a `HftConfig` into a running `Orchestrator`, matching the split the
//! teacher's `tools/perf` binary uses: hard-typed library errors inside the
//! crates, loose `anyhow` glue here at the edge.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hft_bus::EventQueue;
use hft_common::{Clock, HftConfig, Symbol, Venue};
use hft_engine::feed::FeedHandler;
use hft_engine::{
    ArbitrageEngine, DecisionEngine, ExchangeGateway, MarketMakingEngine, MetricsCollector,
    OrderManagementSystem, Orchestrator, PositionTracker, RiskGate, RiskLimits, SmartRouter,
};
use hft_engine::orchestrator::SharedState;
use hft_orderbook::OrderBookManager;
use rand::{SeedableRng, rngs::StdRng};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hft-cli", about = "HFT orchestrator composition root")]
struct Cli {
    #[arg(long, default_value = "info")]
    log: String,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Start the orchestrator and run for a fixed duration (or forever with --forever)
    Run {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        #[arg(long)]
        forever: bool,
        #[arg(long, default_value = "ACME,GLOBEX,UMBRELLA")]
        symbols: String,
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Drive a fixed tick count through the pipeline and report latency percentiles
    Bench {
        #[arg(long, default_value_t = 100_000)]
        ticks: u64,
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Run a short simulation and apply a one-shot price shock mid-run
    Shock {
        symbol: String,
        pct: f64,
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli.log.clone()))
        .with_target(false)
        .compact()
        .init();

    let config = match &cli.config {
        Some(path) => HftConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => HftConfig::default(),
    };

    match cli.cmd {
        Cmd::Run { seconds, forever, symbols, seed } => {
            let symbol_list: Vec<Symbol> = symbols.split(',').map(Symbol::from).collect();
            let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
            runtime.block_on(cmd_run(config, symbol_list, seed, seconds, forever))
        }
        Cmd::Bench { ticks, seed } => cmd_bench(config, ticks, seed),
        Cmd::Shock { symbol, pct, seconds } => {
            let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
            runtime.block_on(cmd_shock(config, Symbol::from(symbol.as_str()), pct, seconds))
        }
    }
}

fn build_state(config: &HftConfig, symbols: Vec<Symbol>, seed: u64) -> SharedState<StdRng> {
    let venues: Vec<Venue> = config.execution.venues.iter().map(|v| Venue::from(v.as_str())).collect();
    let books = OrderBookManager::new(config.orderbook.replica_count);
    for symbol in &symbols {
        books.register_symbol(symbol);
    }
    let clock = Arc::new(Clock::new());
    SharedState {
        event_queue: EventQueue::new(4096),
        books,
        pipeline: AsyncMutex::new(DecisionEngine::new(
            StdRng::seed_from_u64(seed),
            config.pipeline.arbitrage_threshold_bps,
        )),
        arbitrage: AsyncMutex::new(ArbitrageEngine::new(
            config.strategy.arb_staleness_threshold_us,
            config.strategy.arb_min_profit_bps,
            hft_common::Qty::new(config.strategy.arb_max_notional),
        )),
        market_maker: MarketMakingEngine::new(
            config.strategy.default_spread_bps,
            config.strategy.quote_size_shares as f64,
            config.strategy.max_position_shares as f64,
            config.strategy.inventory_skew_factor,
        ),
        router: SmartRouter::new(
            venues,
            hft_common::Qty::new(config.execution.max_slice_size as f64),
            clock.clone(),
        ),
        risk: RiskGate::new(
            RiskLimits {
                max_order_value: config.risk.max_order_value,
                max_daily_loss: config.risk.max_daily_loss,
                max_orders_per_second: config.risk.max_orders_per_second,
                max_notional_per_second: config.risk.max_notional_per_second,
                fat_finger_threshold_pct: config.risk.fat_finger_threshold_pct,
                position_limit_per_symbol: config.risk.position_limit_per_symbol,
            },
            clock.clone(),
        ),
        oms: OrderManagementSystem::new(config.monitoring.max_latency_samples as usize, clock.clone()),
        gateway: ExchangeGateway::new(),
        positions: PositionTracker::new(clock.clone()),
        metrics: AsyncMutex::new(MetricsCollector::new(
            config.monitoring.alert_99th_percentile_us,
            clock.clone(),
        )),
        symbols,
        quote_refresh_ms: config.strategy.quote_refresh_interval_ms as u64,
        metrics_publish_interval_ms: config.monitoring.metrics_publish_interval_ms as u64,
        pipeline_cycles: std::sync::atomic::AtomicU64::new(0),
        signals_processed: std::sync::atomic::AtomicU64::new(0),
        orders_executed: std::sync::atomic::AtomicU64::new(0),
        clock,
        exec_rng: AsyncMutex::new(StdRng::seed_from_u64(seed.wrapping_add(100))),
    }
}

async fn cmd_run(
    config: HftConfig,
    symbols: Vec<Symbol>,
    seed: u64,
    seconds: u64,
    forever: bool,
) -> Result<()> {
    let venues: Vec<Venue> = config.execution.venues.iter().map(|v| Venue::from(v.as_str())).collect();
    let initial: Vec<(Symbol, f64)> = symbols.iter().map(|s| (s.clone(), 100.0)).collect();
    let state = build_state(&config, symbols, seed);

    let mut orchestrator = Orchestrator::new(state);
    orchestrator.start();

    let mut feed = FeedHandler::new(StdRng::seed_from_u64(seed.wrapping_add(1)), venues, &initial);
    let feed_state = orchestrator.state_handle();
    let feed_task = tokio::task::spawn(async move {
        loop {
            for event in feed.next_batch() {
                feed_state.event_queue.publish(event);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });

    if forever {
        tracing::info!("orchestrator running; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
    } else {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
    }

    feed_task.abort();
    orchestrator.stop().await;

    let snapshot = hft_engine::dashboard::DashboardSnapshot::build(orchestrator.state());
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn cmd_bench(config: HftConfig, ticks: u64, seed: u64) -> Result<()> {
    let symbol = Symbol::from("ACME");
    let mut pipeline = DecisionEngine::new(StdRng::seed_from_u64(seed), config.pipeline.arbitrage_threshold_bps);
    let mut feed = FeedHandler::new(
        StdRng::seed_from_u64(seed.wrapping_add(7)),
        vec![Venue::from("NASDAQ")],
        &[(symbol, 100.0)],
    );

    let mut histogram = hdrhistogram::Histogram::<u64>::new_with_bounds(1, 60_000_000_000, 3)?;
    let mut produced = 0u64;
    while produced < ticks {
        for event in feed.next_batch() {
            if produced >= ticks {
                break;
            }
            let start = hft_common::Ts::now();
            let _ = pipeline.process_tick(&event);
            histogram.record(start.elapsed_ns(hft_common::Ts::now()))?;
            produced += 1;
        }
    }

    println!("ticks: {produced}");
    println!("p50_ns: {}", histogram.value_at_percentile(50.0));
    println!("p95_ns: {}", histogram.value_at_percentile(95.0));
    println!("p99_ns: {}", histogram.value_at_percentile(99.0));
    println!("max_ns: {}", histogram.max());
    Ok(())
}

async fn cmd_shock(config: HftConfig, symbol: Symbol, pct: f64, seconds: u64) -> Result<()> {
    let venues: Vec<Venue> = config.execution.venues.iter().map(|v| Venue::from(v.as_str())).collect();
    let state = build_state(&config, vec![symbol.clone()], 1);
    let mut orchestrator = Orchestrator::new(state);
    orchestrator.start();

    let mut feed = FeedHandler::new(StdRng::seed_from_u64(2), venues, &[(symbol.clone(), 100.0)]);
    let feed_state = orchestrator.state_handle();
    let half = Duration::from_secs(seconds / 2);
    let remainder = Duration::from_secs(seconds.saturating_sub(seconds / 2));

    let deadline = tokio::time::Instant::now() + half;
    while tokio::time::Instant::now() < deadline {
        for event in feed.next_batch() {
            feed_state.event_queue.publish(event);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    tracing::info!(%symbol, pct, "applying price shock");
    feed.inject_price_shock(&symbol, pct);

    let deadline = tokio::time::Instant::now() + remainder;
    while tokio::time::Instant::now() < deadline {
        for event in feed.next_batch() {
            feed_state.event_queue.publish(event);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    orchestrator.stop().await;
    Ok(())
}
