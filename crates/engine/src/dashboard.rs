//! Aggregates every component's stats into one serializable snapshot for
//! a dashboard consumer. Nothing in this module mutates state.

use crate::arbitrage::ArbSignalRecord;
use crate::gateway::VenueStats;
use crate::metrics::LatencySummary;
use crate::oms::{FillRecord, OmsStats};
use crate::orchestrator::SharedState;
use crate::position::SymbolPosition;
use crate::risk::RiskMetrics;
use crate::router::RouterStats;
use hft_common::{Px, Symbol, Venue};
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::Ordering;

#[derive(Debug, Clone, Serialize)]
pub struct MmTableRow {
    pub symbol: Symbol,
    pub buy_price: Px,
    pub sell_price: Px,
    pub spread: f64,
    pub spread_bps: f64,
    pub trades_executed: u64,
    pub volume: f64,
    pub profit: f64,
    pub net_position: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub status: &'static str,
    pub uptime_seconds: f64,
    pub events_per_second: f64,
    pub orders_per_second: f64,
    pub fills_per_second: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageSection {
    pub ticks_evaluated: u64,
    pub opportunities_detected: u64,
    pub total_theoretical_profit: f64,
    pub recent_signals: Vec<ArbSignalRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskSection {
    pub checks_run: u64,
    pub checks_passed: u64,
    pub pass_rate_pct: f64,
    pub avg_check_latency_ns: f64,
    pub circuit_breaker_active: bool,
    pub daily_pnl: f64,
    pub rejection_reasons: Vec<(&'static str, u64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSection {
    pub oms: OmsStats,
    pub router: RouterStats,
    pub venue_stats: Vec<(Venue, VenueStats)>,
    pub recent_fills: Vec<FillRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyBreakdown {
    pub stage: &'static str,
    pub summary: Option<LatencySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub system_health: SystemHealth,
    pub symbols: Vec<Symbol>,
    pub pipeline_cycles: u64,
    pub signals_processed: u64,
    pub orders_executed: u64,
    pub tick_to_trade: Option<LatencySummary>,
    pub stage_latencies: Vec<LatencyBreakdown>,
    pub queue_depth: usize,
    pub queue_overflow_count: u64,
    pub mm_table: Vec<MmTableRow>,
    pub mm_total_pnl: f64,
    pub arbitrage: ArbitrageSection,
    pub risk: RiskSection,
    pub positions: Vec<(Symbol, SymbolPosition)>,
    pub total_pnl: f64,
    pub execution: ExecutionSection,
}

impl DashboardSnapshot {
    #[must_use]
    pub fn build<R: Rng + Send>(state: &SharedState<R>) -> Self {
        let mut mm_table: Vec<MmTableRow> = state
            .symbols
            .iter()
            .filter_map(|symbol| {
                let book = state.books.get_book(symbol)?;
                let position = state.market_maker.get_position(symbol).unwrap_or_default();
                let bid = book.best_bid.unwrap_or(Px::ZERO);
                let ask = book.best_ask.unwrap_or(Px::ZERO);
                Some(MmTableRow {
                    symbol: symbol.clone(),
                    buy_price: bid,
                    sell_price: ask,
                    spread: ask.as_f64() - bid.as_f64(),
                    spread_bps: book.spread_bps,
                    trades_executed: position.trades_count,
                    volume: position.total_volume,
                    profit: position.total_pnl(),
                    net_position: position.net_qty,
                })
            })
            .collect();
        mm_table.sort_by(|a, b| b.profit.total_cmp(&a.profit));
        let mm_total_pnl = state.market_maker.stats().total_pnl;

        let risk_metrics: RiskMetrics = state.risk.metrics();
        let queue_stats = state.event_queue.stats();
        let arb_stats = state.arbitrage.try_lock().map(|a| a.stats()).unwrap_or_default();
        let arb_recent =
            state.arbitrage.try_lock().map(|a| a.recent_signals(5)).unwrap_or_default();

        let metrics_snapshot = state.metrics.try_lock();
        let (uptime_seconds, events_per_second, orders_per_second, fills_per_second, tick_to_trade, stage_latencies) =
            if let Ok(m) = metrics_snapshot {
                let stages = crate::metrics::STAGE_NAMES
                    .iter()
                    .filter(|s| **s != "tick_to_trade")
                    .map(|stage| LatencyBreakdown { stage, summary: m.summary(stage) })
                    .collect();
                (
                    m.uptime_seconds(),
                    m.events_per_second(),
                    m.orders_per_second(),
                    m.fills_per_second(),
                    m.summary("tick_to_trade"),
                    stages,
                )
            } else {
                (0.0, 0.0, 0.0, 0.0, None, Vec::new())
            };

        Self {
            system_health: SystemHealth {
                status: if state.risk.is_breaker_active() { "HALTED" } else { "ACTIVE" },
                uptime_seconds,
                events_per_second,
                orders_per_second,
                fills_per_second,
            },
            symbols: state.symbols.clone(),
            pipeline_cycles: state.pipeline_cycles.load(Ordering::Relaxed),
            signals_processed: state.signals_processed.load(Ordering::Relaxed),
            orders_executed: state.orders_executed.load(Ordering::Relaxed),
            tick_to_trade,
            stage_latencies,
            queue_depth: queue_stats.depth,
            queue_overflow_count: queue_stats.overflow_count,
            mm_table,
            mm_total_pnl,
            arbitrage: ArbitrageSection {
                ticks_evaluated: arb_stats.ticks_evaluated,
                opportunities_detected: arb_stats.opportunities_detected,
                total_theoretical_profit: arb_stats.total_theoretical_profit,
                recent_signals: arb_recent,
            },
            risk: RiskSection {
                checks_run: risk_metrics.checks_run,
                checks_passed: risk_metrics.checks_passed,
                pass_rate_pct: if risk_metrics.checks_run == 0 {
                    0.0
                } else {
                    risk_metrics.checks_passed as f64 / risk_metrics.checks_run as f64 * 100.0
                },
                avg_check_latency_ns: risk_metrics.avg_check_latency_ns,
                circuit_breaker_active: state.risk.is_breaker_active(),
                daily_pnl: state.risk.daily_pnl(),
                rejection_reasons: state.risk.rejection_reasons(),
            },
            positions: state.positions.get_all_positions(),
            total_pnl: state.positions.total_pnl(),
            execution: ExecutionSection {
                oms: state.oms.stats(),
                router: state.router.stats(),
                venue_stats: state.gateway.venue_stats(),
                recent_fills: state.oms.recent_fills(20),
            },
        }
    }
}
