//! Latency-arbitrage engine: a per-symbol, per-venue quote matrix with
//! staleness tracking, firing a signal when two distinct, non-stale venues
//! cross.

use crate::signal::{SignalMetadata, SignalType, StrategySignal};
use hft_bus::event_types::MarketDataEvent;
use hft_common::{Px, Qty, Side, Symbol, Ts, Venue};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct VenueQuote {
    bid: Px,
    ask: Px,
    bid_size: Qty,
    ask_size: Qty,
    timestamp_ns: Ts,
    stale: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArbSignalRecord {
    pub symbol: Symbol,
    pub buy_venue: Venue,
    pub sell_venue: Venue,
    pub spread_bps: f64,
    pub estimated_profit: f64,
    pub latency_advantage_us: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ArbStats {
    pub ticks_evaluated: u64,
    pub opportunities_detected: u64,
    pub total_theoretical_profit: f64,
}

pub struct ArbitrageEngine {
    staleness_threshold_ns: u64,
    min_profit_bps: f64,
    hard_qty_cap: Qty,
    quotes: HashMap<Symbol, HashMap<Venue, VenueQuote>>,
    recent_signals: Vec<ArbSignalRecord>,
    stats: ArbStats,
}

impl ArbitrageEngine {
    #[must_use]
    pub fn new(staleness_threshold_us: u64, min_profit_bps: f64, hard_qty_cap: Qty) -> Self {
        Self {
            staleness_threshold_ns: staleness_threshold_us * 1_000,
            min_profit_bps,
            hard_qty_cap,
            quotes: HashMap::new(),
            recent_signals: Vec::new(),
            stats: ArbStats::default(),
        }
    }

    pub fn evaluate(&mut self, event: &MarketDataEvent) -> Option<StrategySignal> {
        self.stats.ticks_evaluated += 1;

        self.quotes.entry(event.symbol.clone()).or_default().insert(
            event.venue.clone(),
            VenueQuote {
                bid: event.bid,
                ask: event.ask,
                bid_size: event.bid_size,
                ask_size: event.ask_size,
                timestamp_ns: event.receive_ns,
                stale: false,
            },
        );

        self.mark_stale(&event.symbol, event.receive_ns);
        self.scan_for_arb(&event.symbol)
    }

    fn mark_stale(&mut self, symbol: &Symbol, current_ns: Ts) {
        if let Some(venues) = self.quotes.get_mut(symbol) {
            for quote in venues.values_mut() {
                quote.stale = current_ns.elapsed_ns(quote.timestamp_ns) > self.staleness_threshold_ns;
            }
        }
    }

    fn scan_for_arb(&mut self, symbol: &Symbol) -> Option<StrategySignal> {
        let venues = self.quotes.get(symbol)?;
        let fresh: Vec<(&Venue, &VenueQuote)> =
            venues.iter().filter(|(_, q)| !q.stale).collect();
        if fresh.len() < 2 {
            return None;
        }

        let (best_bid_venue, best_bid) = fresh
            .iter()
            .max_by_key(|(_, q)| q.bid.as_i64())
            .map(|(v, q)| ((*v).clone(), **q))?;
        let (best_ask_venue, best_ask) = fresh
            .iter()
            .min_by_key(|(_, q)| q.ask.as_i64())
            .map(|(v, q)| ((*v).clone(), **q))?;

        if best_bid_venue == best_ask_venue || best_bid.bid.as_i64() <= best_ask.ask.as_i64() {
            return None;
        }

        let mid = (best_bid.bid.as_f64() + best_ask.ask.as_f64()) / 2.0;
        let spread_bps = (best_bid.bid.as_f64() - best_ask.ask.as_f64()) / mid * 10_000.0;
        if spread_bps < self.min_profit_bps {
            return None;
        }

        let qty = best_bid.bid_size.min(best_ask.ask_size).min(self.hard_qty_cap);
        let profit = (best_bid.bid.as_f64() - best_ask.ask.as_f64()) * qty.as_f64();
        let latency_advantage_us =
            best_bid.timestamp_ns.elapsed_ns(best_ask.timestamp_ns) as f64 / 1_000.0;

        self.stats.opportunities_detected += 1;
        self.stats.total_theoretical_profit += profit;

        let record = ArbSignalRecord {
            symbol: symbol.clone(),
            buy_venue: best_ask_venue.clone(),
            sell_venue: best_bid_venue.clone(),
            spread_bps,
            estimated_profit: profit,
            latency_advantage_us,
        };
        self.recent_signals.push(record);
        if self.recent_signals.len() > 500 {
            self.recent_signals = self.recent_signals.split_off(self.recent_signals.len() - 250);
        }

        Some(StrategySignal {
            strategy_id: "ARB-CORE",
            symbol: symbol.clone(),
            side: Side::Buy,
            target_price: best_ask.ask,
            target_qty: qty,
            urgency: 0.95,
            signal_type: SignalType::LatencyArbitrage,
            metadata: SignalMetadata::Arbitrage {
                buy_venue: best_ask_venue,
                sell_venue: best_bid_venue,
                sell_price: best_bid.bid,
                spread_bps,
                estimated_profit: profit,
                latency_advantage_us,
            },
        })
    }

    #[must_use]
    pub fn stats(&self) -> ArbStats {
        self.stats
    }

    #[must_use]
    pub fn recent_signals(&self, n: usize) -> Vec<ArbSignalRecord> {
        self.recent_signals.iter().rev().take(n).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hft_bus::event_types::EventKind;

    fn event(venue: &str, bid: f64, ask: f64, ns: u64) -> MarketDataEvent {
        MarketDataEvent {
            kind: EventKind::L1,
            symbol: Symbol::from("ACME"),
            venue: Venue::from(venue),
            receive_ns: Ts::from_nanos(ns),
            exchange_ns: Ts::from_nanos(ns),
            sequence: 1,
            bid: Px::new(bid),
            bid_size: Qty::new(500.0),
            ask: Px::new(ask),
            ask_size: Qty::new(500.0),
            trade_price: None,
            trade_size: None,
        }
    }

    #[test]
    fn scenario_2_latency_arbitrage() {
        let mut engine = ArbitrageEngine::new(500, 0.3, Qty::new(1000.0));
        assert!(engine.evaluate(&event("V1", 100.05, 100.06, 1_000_000)).is_none());
        let sig = engine
            .evaluate(&event("V2", 99.99, 100.02, 1_050_000))
            .expect("scenario 2 must fire a buy signal");
        assert_eq!(sig.target_price.as_f64(), 100.02);
        if let SignalMetadata::Arbitrage { sell_price, latency_advantage_us, .. } = sig.metadata {
            assert_eq!(sell_price.as_f64(), 100.05);
            assert!((latency_advantage_us - 50.0).abs() < 1e-6);
        } else {
            panic!("expected arbitrage metadata");
        }
    }

    #[test]
    fn stale_quotes_are_excluded_from_scan() {
        let mut engine = ArbitrageEngine::new(1, 0.3, Qty::new(1000.0));
        let _ = engine.evaluate(&event("V1", 100.05, 100.06, 1_000));
        // V2 arrives far enough later that V1's quote is now stale (threshold = 1us = 1000ns).
        let sig = engine.evaluate(&event("V2", 99.99, 100.02, 1_000_000));
        assert!(sig.is_none(), "V1's quote should be marked stale and excluded");
    }

    #[test]
    fn recent_signal_log_is_bounded() {
        let mut engine = ArbitrageEngine::new(500, 0.01, Qty::new(1000.0));
        for i in 0..600u64 {
            let _ = engine.evaluate(&event("V1", 100.0 + i as f64, 99.0, i * 1000));
            let _ = engine.evaluate(&event("V2", 50.0, 49.0 + i as f64, i * 1000 + 10));
        }
        assert!(engine.recent_signals.len() <= 500);
    }
}
