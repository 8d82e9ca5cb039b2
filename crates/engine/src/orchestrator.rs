//! Master conductor of the tick-to-trade pipeline: owns every component and
//! drives three cooperative loops (pipeline, market-making, monitoring) as
//! independent tokio tasks.

use crate::arbitrage::ArbitrageEngine;
use crate::dashboard::DashboardSnapshot;
use crate::gateway::ExchangeGateway;
use crate::market_maker::MarketMakingEngine;
use crate::metrics::MetricsCollector;
use crate::oms::OrderManagementSystem;
use crate::order::OrderStatus;
use crate::pipeline::DecisionEngine;
use crate::position::PositionTracker;
use crate::risk::RiskGate;
use crate::router::SmartRouter;
use crate::signal::StrategySignal;
use hft_bus::EventQueue;
use hft_bus::event_types::MarketDataEvent;
use hft_common::{Clock, Symbol};
use hft_orderbook::OrderBookManager;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

/// Everything the pipeline, market-making, and monitoring loops read and
/// write concurrently. Grouped so `Orchestrator::new` can hand out one
/// `Arc` and each loop closes over it independently.
pub struct SharedState<R: Rng + Send> {
    pub event_queue: EventQueue<MarketDataEvent>,
    pub books: OrderBookManager,
    pub pipeline: AsyncMutex<DecisionEngine<R>>,
    pub arbitrage: AsyncMutex<ArbitrageEngine>,
    pub market_maker: MarketMakingEngine,
    pub router: SmartRouter,
    pub risk: RiskGate,
    pub oms: OrderManagementSystem,
    pub gateway: ExchangeGateway,
    pub positions: PositionTracker,
    pub metrics: AsyncMutex<MetricsCollector>,
    pub symbols: Vec<Symbol>,
    pub quote_refresh_ms: u64,
    pub metrics_publish_interval_ms: u64,
    pub pipeline_cycles: AtomicU64,
    pub signals_processed: AtomicU64,
    pub orders_executed: AtomicU64,
    pub clock: Arc<Clock>,
    /// Seeded once at startup and shared by every `execute_signal` call so a
    /// `--seed` run is reproducible end-to-end, not just through the
    /// decision pipeline.
    pub exec_rng: AsyncMutex<StdRng>,
}

/// Owns the shared state plus the cancellation handle. `start`/`stop` are
/// idempotent: calling `start` twice without an intervening `stop` is a
/// no-op, and `stop` on an already-stopped orchestrator is a no-op.
pub struct Orchestrator<R: Rng + Send + 'static> {
    state: Arc<SharedState<R>>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl<R: Rng + Send + 'static> Orchestrator<R> {
    #[must_use]
    pub fn new(state: SharedState<R>) -> Self {
        Self {
            state: Arc::new(state),
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(symbols = self.state.symbols.len(), "starting HFT orchestrator");

        let pipeline_state = self.state.clone();
        let pipeline_token = self.cancel.clone();
        self.handles
            .push(tokio::task::spawn(pipeline_loop(pipeline_state, pipeline_token)));

        let mm_state = self.state.clone();
        let mm_token = self.cancel.clone();
        self.handles.push(tokio::task::spawn(market_making_loop(mm_state, mm_token)));

        let monitor_state = self.state.clone();
        let monitor_token = self.cancel.clone();
        self.handles.push(tokio::task::spawn(monitoring_loop(monitor_state, monitor_token)));

        tracing::info!("all pipeline components running");
    }

    pub async fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        tracing::info!(
            cycles = self.state.pipeline_cycles.load(Ordering::Relaxed),
            orders = self.state.orders_executed.load(Ordering::Relaxed),
            "orchestrator stopped"
        );
    }

    #[must_use]
    pub fn state(&self) -> &SharedState<R> {
        &self.state
    }

    /// Clones the shared-state handle so an external producer (e.g. a feed
    /// handler driven by the CLI) can publish onto `event_queue` while the
    /// orchestrator's own loops run concurrently.
    #[must_use]
    pub fn state_handle(&self) -> Arc<SharedState<R>> {
        self.state.clone()
    }
}

async fn pipeline_loop<R: Rng + Send>(state: Arc<SharedState<R>>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = async {
                let events = state.event_queue.consume_batch(16);
                if events.is_empty() {
                    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                    return;
                }

                for event in &events {
                    let tick_start = state.clock.now().ts;
                    state.books.apply_event(event);

                    let mut signals: Vec<StrategySignal> = Vec::new();
                    {
                        let mut pipeline = state.pipeline.lock().await;
                        let (pipeline_signal, total_ns) = pipeline.process_tick(event);
                        state.metrics.lock().await.record_latency("fpga_pipeline", total_ns);
                        if let Some(sig) = pipeline_signal {
                            signals.push(sig);
                        }
                    }
                    if let Some(sig) = state.arbitrage.lock().await.evaluate(event) {
                        signals.push(sig);
                    }

                    for signal in &signals {
                        execute_signal(&state, signal).await;
                    }

                    if !signals.is_empty() {
                        state.metrics.lock().await.record_latency(
                            "tick_to_trade",
                            tick_start.elapsed_ns(state.clock.now().ts),
                        );
                    }
                    state.metrics.lock().await.record_event("tick");
                }

                state.pipeline_cycles.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
            } => {}
        }
    }
}

async fn market_making_loop<R: Rng + Send>(state: Arc<SharedState<R>>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = async {
                for symbol in &state.symbols {
                    let Some(book) = state.books.get_book(symbol) else { continue };
                    if book.mid_price.is_none() {
                        continue;
                    }
                    let signals = state.market_maker.generate_quotes(symbol, &book);
                    for signal in &signals {
                        execute_signal(&state, signal).await;
                    }
                }
                tokio::time::sleep(tokio::time::Duration::from_millis(state.quote_refresh_ms)).await;
            } => {}
        }
    }
}

async fn monitoring_loop<R: Rng + Send>(state: Arc<SharedState<R>>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = async {
                state.metrics.lock().await.check_alerts();
                tokio::time::sleep(tokio::time::Duration::from_millis(
                    state.metrics_publish_interval_ms,
                ))
                .await;
            } => {}
        }
    }
}

/// `signal -> router -> risk gate -> gateway -> fills -> OMS + position
/// tracker + market maker feedback + router venue-score feedback`.
async fn execute_signal<R: Rng + Send>(state: &Arc<SharedState<R>>, signal: &StrategySignal) {
    state.signals_processed.fetch_add(1, Ordering::Relaxed);

    let route_start = state.clock.now().ts;
    let orders = state.router.route_signal(signal);
    state
        .metrics
        .lock()
        .await
        .record_latency("order_routing", route_start.elapsed_ns(state.clock.now().ts));

    for order in orders {
        let order_id = order.order_id.clone();
        state.oms.insert(order.clone());

        let verdict = state.risk.check_order(&order);
        state
            .metrics
            .lock()
            .await
            .record_latency("risk_check", state.risk.metrics().avg_check_latency_ns as u64);

        if !verdict.is_approved() {
            state.oms.update_status(&order_id, OrderStatus::Rejected);
            continue;
        }

        let exchange_start = state.clock.now().ts;
        let acked = {
            let mut rng = state.exec_rng.lock().await;
            state.gateway.submit_order(order, &mut *rng).await
        };
        state.oms.update_status(&acked.order_id, acked.status);

        if acked.status == OrderStatus::Acked {
            let fills = {
                let mut rng = state.exec_rng.lock().await;
                state.gateway.get_fills(&acked, &mut *rng)
            };
            for fill in &fills {
                let pnl_before = state
                    .positions
                    .get_position(&fill.symbol)
                    .map_or(0.0, |p| p.realized_pnl + p.unrealized_pnl);

                state.oms.apply_fill(fill);
                state.positions.apply_fill(fill);
                state.market_maker.on_fill(fill);

                let pnl_after = state
                    .positions
                    .get_position(&fill.symbol)
                    .map_or(0.0, |p| p.realized_pnl + p.unrealized_pnl);
                state.risk.update_daily_pnl(pnl_after - pnl_before);

                state.metrics.lock().await.record_event("fill");
                state.orders_executed.fetch_add(1, Ordering::Relaxed);
            }
            state.router.update_venue_score(&acked.venue, true);
        } else {
            state.router.update_venue_score(&acked.venue, false);
        }

        state
            .metrics
            .lock()
            .await
            .record_latency("exchange_round_trip", exchange_start.elapsed_ns(state.clock.now().ts));
        state.metrics.lock().await.record_event("order");
    }
}

pub fn build_dashboard<R: Rng + Send>(state: &SharedState<R>) -> DashboardSnapshot {
    DashboardSnapshot::build(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ExchangeGateway;
    use crate::risk::RiskLimits;
    use rand::rngs::StdRng;

    fn new_state() -> SharedState<StdRng> {
        let venues = vec![
            hft_common::Venue::from("NASDAQ"),
            hft_common::Venue::from("NYSE"),
            hft_common::Venue::from("BATS"),
            hft_common::Venue::from("IEX"),
            hft_common::Venue::from("ARCA"),
        ];
        let symbols = vec![Symbol::from("ACME")];
        let books = OrderBookManager::new(2);
        for s in &symbols {
            books.register_symbol(s);
        }
        let clock = Arc::new(Clock::new());
        SharedState {
            event_queue: EventQueue::new(1024),
            books,
            pipeline: AsyncMutex::new(DecisionEngine::new(StdRng::seed_from_u64(1), 0.5)),
            arbitrage: AsyncMutex::new(ArbitrageEngine::new(500, 0.3, hft_common::Qty::new(1000.0))),
            market_maker: MarketMakingEngine::new(2.0, 100.0, 10_000.0, 0.5),
            router: SmartRouter::new(venues, hft_common::Qty::new(500.0), clock.clone()),
            risk: RiskGate::new(
                RiskLimits {
                    max_order_value: 1_000_000.0,
                    max_daily_loss: 100_000.0,
                    max_orders_per_second: 1000,
                    max_notional_per_second: 10_000_000.0,
                    fat_finger_threshold_pct: 5.0,
                    position_limit_per_symbol: 1_000_000,
                },
                clock.clone(),
            ),
            oms: OrderManagementSystem::new(10_000, clock.clone()),
            gateway: ExchangeGateway::new(),
            positions: PositionTracker::new(clock.clone()),
            metrics: AsyncMutex::new(MetricsCollector::new(100, clock.clone())),
            symbols,
            quote_refresh_ms: 50,
            metrics_publish_interval_ms: 250,
            pipeline_cycles: AtomicU64::new(0),
            signals_processed: AtomicU64::new(0),
            orders_executed: AtomicU64::new(0),
            clock,
            exec_rng: AsyncMutex::new(StdRng::seed_from_u64(2)),
        }
    }

    #[tokio::test]
    async fn start_stop_is_idempotent() {
        let mut orch = Orchestrator::new(new_state());
        orch.start();
        orch.start();
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        orch.stop().await;
        orch.stop().await;
    }

    #[tokio::test]
    async fn dashboard_builds_without_panicking() {
        let state = new_state();
        let snap = build_dashboard(&state);
        assert_eq!(snap.symbols.len(), 1);
    }
}
