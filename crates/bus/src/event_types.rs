//! Typed market-data events that flow from the feed handler into the queue.

use hft_common::{Px, Qty, Symbol, Ts, Venue};
use serde::{Deserialize, Serialize};

/// What kind of tick a `MarketDataEvent` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    L1,
    L2,
    Trade,
}

/// Immutable record of a venue quote or trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataEvent {
    pub kind: EventKind,
    pub symbol: Symbol,
    pub venue: Venue,
    pub receive_ns: Ts,
    pub exchange_ns: Ts,
    pub sequence: u64,
    pub bid: Px,
    pub bid_size: Qty,
    pub ask: Px,
    pub ask_size: Qty,
    pub trade_price: Option<Px>,
    pub trade_size: Option<Qty>,
}

impl MarketDataEvent {
    #[must_use]
    pub fn mid(&self) -> Option<Px> {
        if self.bid.is_positive() && self.ask.is_positive() {
            Some(Px::from_i64((self.bid.as_i64() + self.ask.as_i64()) / 2))
        } else if self.bid.is_positive() {
            Some(self.bid)
        } else if self.ask.is_positive() {
            Some(self.ask)
        } else {
            None
        }
    }

    #[must_use]
    pub fn spread_bps(&self) -> f64 {
        match self.mid() {
            Some(mid) if mid.as_f64() > 0.0 => {
                (self.ask.as_f64() - self.bid.as_f64()) / mid.as_f64() * 10_000.0
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(bid: f64, ask: f64) -> MarketDataEvent {
        MarketDataEvent {
            kind: EventKind::L1,
            symbol: Symbol::from("ACME"),
            venue: Venue::from("NASDAQ"),
            receive_ns: Ts::from_nanos(1),
            exchange_ns: Ts::from_nanos(1),
            sequence: 1,
            bid: Px::new(bid),
            bid_size: Qty::new(100.0),
            ask: Px::new(ask),
            ask_size: Qty::new(100.0),
            trade_price: None,
            trade_size: None,
        }
    }

    #[test]
    fn mid_and_spread_bps() {
        let ev = event(99.99, 100.01);
        assert!((ev.mid().unwrap().as_f64() - 100.0).abs() < 1e-9);
        assert!((ev.spread_bps() - 2.0).abs() < 1e-6);
    }
}
