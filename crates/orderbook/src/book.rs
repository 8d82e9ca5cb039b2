//! Single-symbol order book: bid/ask price ladders, VWAP, imbalance.

use hft_bus::event_types::{EventKind, MarketDataEvent};
use hft_common::{Px, Qty, Symbol, Ts};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PriceLevel {
    pub price: Px,
    pub total_qty: Qty,
    pub order_count: u32,
    pub last_update_ns: Ts,
}

/// Top-N depth entry as exposed in snapshots.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DepthLevel {
    pub price: Px,
    pub qty: Qty,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderBookSnapshot {
    pub symbol: Symbol,
    pub best_bid: Option<Px>,
    pub best_ask: Option<Px>,
    pub mid_price: Option<Px>,
    pub spread: f64,
    pub spread_bps: f64,
    pub vwap: Option<f64>,
    pub last_trade: Px,
    pub last_trade_size: Qty,
    pub total_volume: Qty,
    pub bid_depth: Vec<DepthLevel>,
    pub ask_depth: Vec<DepthLevel>,
    pub imbalance: f64,
    pub update_count: u64,
    pub bid_levels: usize,
    pub ask_levels: usize,
    /// Fold over the book's aggregate fields; lets a caller detect
    /// divergence between replicas without comparing full ladders.
    pub checksum: u64,
}

/// Single-symbol order book, one copy per replica.
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: Symbol,
    bids: BTreeMap<i64, PriceLevel>,
    asks: BTreeMap<i64, PriceLevel>,
    update_count: u64,
    last_trade_price: Px,
    last_trade_size: Qty,
    total_volume: Qty,
    vwap_numerator: f64,
    last_update_ns: Ts,
}

impl OrderBook {
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            update_count: 0,
            last_trade_price: Px::ZERO,
            last_trade_size: Qty::ZERO,
            total_volume: Qty::ZERO,
            vwap_numerator: 0.0,
            last_update_ns: Ts::from_nanos(0),
        }
    }

    pub fn apply_event(&mut self, event: &MarketDataEvent) {
        match event.kind {
            EventKind::L1 | EventKind::L2 => self.apply_l1(event),
            EventKind::Trade => {
                self.apply_trade(event);
                self.apply_l1(event);
            }
        }
    }

    fn apply_l1(&mut self, event: &MarketDataEvent) {
        if event.bid.is_positive() {
            self.upsert_level(true, event.bid, event.bid_size, event.receive_ns);
        }
        if event.ask.is_positive() {
            self.upsert_level(false, event.ask, event.ask_size, event.receive_ns);
        }
        self.update_count += 1;
        self.last_update_ns = event.receive_ns;
    }

    fn apply_trade(&mut self, event: &MarketDataEvent) {
        let (Some(price), Some(size)) = (event.trade_price, event.trade_size) else {
            return;
        };
        if !price.is_positive() {
            return;
        }
        self.last_trade_price = price;
        self.last_trade_size = size;
        self.total_volume = self.total_volume + size;
        self.vwap_numerator += price.as_f64() * size.as_f64();
        self.update_count += 1;
        self.last_update_ns = event.receive_ns;
    }

    fn upsert_level(&mut self, is_bid: bool, price: Px, size: Qty, now: Ts) {
        let side = if is_bid { &mut self.bids } else { &mut self.asks };
        let key = price.as_i64();
        if size.is_zero() {
            side.remove(&key);
            return;
        }
        side.entry(key)
            .and_modify(|level| {
                level.total_qty = size;
                level.last_update_ns = now;
            })
            .or_insert(PriceLevel {
                price,
                total_qty: size,
                order_count: 1,
                last_update_ns: now,
            });
    }

    #[must_use]
    pub fn best_bid(&self) -> Option<Px> {
        self.bids.values().next_back().map(|l| l.price)
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<Px> {
        self.asks.values().next().map(|l| l.price)
    }

    #[must_use]
    pub fn mid_price(&self) -> Option<Px> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some(Px::from_i64((b.as_i64() + a.as_i64()) / 2)),
            (Some(b), None) => Some(b),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }

    #[must_use]
    pub fn spread(&self) -> f64 {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => a.as_f64() - b.as_f64(),
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn spread_bps(&self) -> f64 {
        match self.mid_price() {
            Some(mid) if mid.as_f64() > 0.0 => self.spread() / mid.as_f64() * 10_000.0,
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn vwap(&self) -> Option<f64> {
        if self.total_volume.as_f64() > 0.0 {
            Some(self.vwap_numerator / self.total_volume.as_f64())
        } else if self.last_trade_price.is_positive() {
            Some(self.last_trade_price.as_f64())
        } else {
            None
        }
    }

    #[must_use]
    pub fn bid_depth(&self, levels: usize) -> Vec<DepthLevel> {
        self.bids
            .values()
            .rev()
            .take(levels)
            .map(|l| DepthLevel { price: l.price, qty: l.total_qty })
            .collect()
    }

    #[must_use]
    pub fn ask_depth(&self, levels: usize) -> Vec<DepthLevel> {
        self.asks
            .values()
            .take(levels)
            .map(|l| DepthLevel { price: l.price, qty: l.total_qty })
            .collect()
    }

    #[must_use]
    pub fn imbalance(&self) -> f64 {
        let bid_qty: f64 = self.bids.values().map(|l| l.total_qty.as_f64()).sum();
        let ask_qty: f64 = self.asks.values().map(|l| l.total_qty.as_f64()).sum();
        let total = bid_qty + ask_qty;
        if total == 0.0 {
            0.0
        } else {
            (bid_qty - ask_qty) / total
        }
    }

    fn checksum(&self) -> u64 {
        // FNV-1a fold over the aggregate fields a caller would use to
        // detect replica divergence, without hashing the full ladders.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        let mut fold = |value: i64| {
            hash ^= value as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
        };
        fold(self.best_bid().map_or(0, |p| p.as_i64()));
        fold(self.best_ask().map_or(0, |p| p.as_i64()));
        fold(self.bids.values().map(|l| l.total_qty.as_i64()).sum());
        fold(self.asks.values().map(|l| l.total_qty.as_i64()).sum());
        fold(self.update_count as i64);
        hash
    }

    #[must_use]
    pub fn snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot {
            symbol: self.symbol.clone(),
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            mid_price: self.mid_price(),
            spread: self.spread(),
            spread_bps: self.spread_bps(),
            vwap: self.vwap(),
            last_trade: self.last_trade_price,
            last_trade_size: self.last_trade_size,
            total_volume: self.total_volume,
            bid_depth: self.bid_depth(5),
            ask_depth: self.ask_depth(5),
            imbalance: self.imbalance(),
            update_count: self.update_count,
            bid_levels: self.bids.len(),
            ask_levels: self.asks.len(),
            checksum: self.checksum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hft_common::Venue;

    fn l1(symbol: &str, venue: &str, bid: f64, bid_sz: f64, ask: f64, ask_sz: f64) -> MarketDataEvent {
        MarketDataEvent {
            kind: EventKind::L1,
            symbol: Symbol::from(symbol),
            venue: Venue::from(venue),
            receive_ns: Ts::from_nanos(1),
            exchange_ns: Ts::from_nanos(1),
            sequence: 1,
            bid: Px::new(bid),
            bid_size: Qty::new(bid_sz),
            ask: Px::new(ask),
            ask_size: Qty::new(ask_sz),
            trade_price: None,
            trade_size: None,
        }
    }

    #[test]
    fn best_bid_is_max_best_ask_is_min() {
        let mut book = OrderBook::new(Symbol::from("ACME"));
        book.apply_event(&l1("ACME", "NASDAQ", 99.98, 100.0, 100.02, 100.0));
        book.apply_event(&l1("ACME", "NASDAQ", 99.99, 50.0, 100.01, 50.0));
        assert_eq!(book.best_bid().unwrap().as_f64(), 99.99);
        assert_eq!(book.best_ask().unwrap().as_f64(), 100.01);
    }

    #[test]
    fn zero_size_removes_level() {
        let mut book = OrderBook::new(Symbol::from("ACME"));
        book.apply_event(&l1("ACME", "NASDAQ", 99.99, 100.0, 100.01, 100.0));
        assert_eq!(book.bid_depth(5).len(), 1);
        book.apply_event(&l1("ACME", "NASDAQ", 99.99, 0.0, 100.01, 100.0));
        assert_eq!(book.bid_depth(5).len(), 0);
    }

    #[test]
    fn imbalance_ranges_from_minus_one_to_one() {
        let mut book = OrderBook::new(Symbol::from("ACME"));
        book.apply_event(&l1("ACME", "NASDAQ", 99.99, 300.0, 100.01, 100.0));
        assert!((book.imbalance() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn checksum_changes_when_book_changes() {
        let mut book = OrderBook::new(Symbol::from("ACME"));
        book.apply_event(&l1("ACME", "NASDAQ", 99.99, 100.0, 100.01, 100.0));
        let a = book.snapshot().checksum;
        book.apply_event(&l1("ACME", "NASDAQ", 99.98, 100.0, 100.02, 100.0));
        let b = book.snapshot().checksum;
        assert_ne!(a, b);
    }
}
