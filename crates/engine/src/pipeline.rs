//! Pipelined decision engine: an 8-stage CPU pipeline (modeled on an FPGA
//! datapath) that accumulates measured, jittered stage latencies without
//! ever sleeping the wall clock, and that emits at most one signal per
//! tick — arbitrage detection winning over quote suggestion when both
//! would fire.

use crate::signal::{SignalMetadata, SignalType, StrategySignal};
use hft_bus::event_types::MarketDataEvent;
use hft_common::{Px, Qty, Side, Symbol, Venue};
use rand::Rng;
use std::collections::HashMap;

const STAGE_NAMES: [&str; 8] = [
    "RX_PARSE", "TIMESTAMP", "BOOK_UPDATE", "SIGNAL_EVAL", "ARB_DETECT", "MM_QUOTE",
    "RISK_CHECK", "TX_GENERATE",
];
const STAGE_NOMINAL_NS: [u64; 8] = [4, 2, 6, 8, 5, 4, 3, 3];

#[derive(Debug, Clone, Copy, Default)]
pub struct StageStats {
    pub invocations: u64,
    pub total_latency_ns: u64,
}

#[derive(Debug, Clone, Copy)]
struct ShadowQuote {
    bid: Px,
    ask: Px,
}

/// Pipelined decision engine with its own per-(symbol, venue) shadow quote
/// table, independent of the canonical order book.
pub struct DecisionEngine<R: Rng> {
    rng: R,
    arbitrage_threshold_bps: f64,
    shadow: HashMap<Symbol, HashMap<Venue, ShadowQuote>>,
    stage_stats: [StageStats; 8],
}

impl<R: Rng> DecisionEngine<R> {
    #[must_use]
    pub fn new(rng: R, arbitrage_threshold_bps: f64) -> Self {
        Self {
            rng,
            arbitrage_threshold_bps,
            shadow: HashMap::new(),
            stage_stats: [StageStats::default(); 8],
        }
    }

    /// Runs the full 8-stage pipeline for one tick, returning the single
    /// highest-priority signal (if any) and the total accumulated latency.
    pub fn process_tick(&mut self, event: &MarketDataEvent) -> (Option<StrategySignal>, u64) {
        let mut total_ns = 0u64;

        // RX_PARSE, TIMESTAMP, BOOK_UPDATE are pure accounting stages here;
        // the canonical book is updated by the order book manager.
        for stage in 0..3 {
            total_ns += self.run_stage(stage);
        }

        total_ns += self.run_stage(3); // SIGNAL_EVAL
        self.update_shadow(event);

        total_ns += self.run_stage(4); // ARB_DETECT
        let arb = self.detect_arb(&event.symbol);

        total_ns += self.run_stage(5); // MM_QUOTE
        let quote = if arb.is_none() {
            self.suggest_quote(event)
        } else {
            None
        };

        total_ns += self.run_stage(6); // RISK_CHECK (observability only; the real gate runs downstream)
        total_ns += self.run_stage(7); // TX_GENERATE

        (arb.or(quote), total_ns)
    }

    fn run_stage(&mut self, idx: usize) -> u64 {
        let nominal = STAGE_NOMINAL_NS[idx];
        let jitter = self.rng.gen_range(0..=(nominal / 10).max(1));
        let latency = nominal + jitter;
        self.stage_stats[idx].invocations += 1;
        self.stage_stats[idx].total_latency_ns += latency;
        latency
    }

    fn update_shadow(&mut self, event: &MarketDataEvent) {
        self.shadow
            .entry(event.symbol.clone())
            .or_default()
            .insert(event.venue.clone(), ShadowQuote { bid: event.bid, ask: event.ask });
    }

    fn detect_arb(&self, symbol: &Symbol) -> Option<StrategySignal> {
        let venues = self.shadow.get(symbol)?;
        if venues.len() < 2 {
            return None;
        }
        let (max_bid_venue, max_bid) = venues
            .iter()
            .max_by_key(|(_, q)| q.bid.as_i64())
            .map(|(v, q)| (v.clone(), q.bid))?;
        let (min_ask_venue, min_ask) = venues
            .iter()
            .min_by_key(|(_, q)| q.ask.as_i64())
            .map(|(v, q)| (v.clone(), q.ask))?;

        if max_bid_venue == min_ask_venue || max_bid.as_i64() <= min_ask.as_i64() {
            return None;
        }
        let mid = (max_bid.as_f64() + min_ask.as_f64()) / 2.0;
        let spread_bps = (max_bid.as_f64() - min_ask.as_f64()) / mid * 10_000.0;
        if spread_bps < self.arbitrage_threshold_bps {
            return None;
        }

        Some(StrategySignal {
            strategy_id: "FPGA-PIPELINE",
            symbol: symbol.clone(),
            side: Side::Buy,
            target_price: min_ask,
            target_qty: Qty::new(100.0),
            urgency: 0.9,
            signal_type: SignalType::LatencyArbitrage,
            metadata: SignalMetadata::Arbitrage {
                buy_venue: min_ask_venue,
                sell_venue: max_bid_venue,
                sell_price: max_bid,
                spread_bps,
                estimated_profit: (max_bid.as_f64() - min_ask.as_f64()) * 100.0,
                latency_advantage_us: 0.0,
            },
        })
    }

    fn suggest_quote(&mut self, event: &MarketDataEvent) -> Option<StrategySignal> {
        let spread_bps = event.spread_bps();
        let fire_probability = (spread_bps / 10_000.0).min(0.2);
        if !self.rng.gen_bool(fire_probability.max(0.0)) {
            return None;
        }
        let mid = event.mid()?;
        let inside = Px::from_i64(mid.as_i64() - (mid.as_i64() / 10_000));
        Some(StrategySignal {
            strategy_id: "FPGA-PIPELINE",
            symbol: event.symbol.clone(),
            side: Side::Buy,
            target_price: inside,
            target_qty: Qty::new(100.0),
            urgency: 0.2,
            signal_type: SignalType::QuoteSuggestion,
            metadata: SignalMetadata::None,
        })
    }

    #[must_use]
    pub fn stage_stats(&self) -> [(&'static str, StageStats); 8] {
        let mut out = [("", StageStats::default()); 8];
        for (i, name) in STAGE_NAMES.iter().enumerate() {
            out[i] = (*name, self.stage_stats[i]);
        }
        out
    }
}
