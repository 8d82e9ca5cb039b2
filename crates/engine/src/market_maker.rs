//! Two-sided market-making strategy engine: continuous quote refresh with
//! inventory-aware skewing and volatility-adjusted spreads.

use crate::order::Fill;
use crate::signal::{SignalMetadata, SignalType, StrategySignal};
use dashmap::DashMap;
use hft_common::{Px, Qty, Side, Symbol};
use hft_orderbook::OrderBookSnapshot;

#[derive(Debug, Clone, Copy, Default)]
pub struct MmPosition {
    pub net_qty: f64,
    pub long_qty: f64,
    pub short_qty: f64,
    cost_basis: f64,
    pub avg_entry_price: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub trades_count: u64,
    pub total_volume: f64,
}

impl MmPosition {
    fn apply_fill(&mut self, side: Side, price: f64, qty: f64) {
        self.trades_count += 1;
        self.total_volume += qty;

        match side {
            Side::Buy => {
                if self.net_qty >= 0.0 {
                    self.cost_basis += price * qty;
                    self.long_qty += qty;
                } else {
                    let closed = qty.min(self.net_qty.abs());
                    let denom = (self.long_qty + self.net_qty.abs()).max(1.0);
                    let avg = self.cost_basis / denom;
                    self.realized_pnl += (avg - price) * closed;
                    self.short_qty -= closed;
                }
                self.net_qty += qty;
            }
            Side::Sell => {
                if self.net_qty <= 0.0 {
                    self.cost_basis += price * qty;
                    self.short_qty += qty;
                } else {
                    let closed = qty.min(self.net_qty);
                    let avg = if self.long_qty > 0.0 {
                        self.cost_basis / self.long_qty.max(1.0)
                    } else {
                        price
                    };
                    self.realized_pnl += (price - avg) * closed;
                    self.long_qty -= closed;
                }
                self.net_qty -= qty;
            }
        }

        if self.net_qty != 0.0 {
            self.avg_entry_price = (self.cost_basis / self.net_qty.abs().max(1.0)).abs();
        }
    }

    fn update_unrealized(&mut self, current_price: f64) {
        self.unrealized_pnl = if self.net_qty > 0.0 {
            (current_price - self.avg_entry_price) * self.net_qty
        } else if self.net_qty < 0.0 {
            (self.avg_entry_price - current_price) * self.net_qty.abs()
        } else {
            0.0
        };
    }

    #[must_use]
    pub fn total_pnl(&self) -> f64 {
        self.realized_pnl + self.unrealized_pnl
    }
}

#[derive(Debug, Clone, Default)]
pub struct MmStats {
    pub signals_generated: u64,
    pub quotes_refreshed: u64,
    pub total_pnl: f64,
    pub total_trades: u64,
    pub total_volume: f64,
    pub spread_earned: f64,
}

pub struct MarketMakingEngine {
    default_spread_bps: f64,
    quote_size_shares: f64,
    max_position_shares: f64,
    inventory_skew_factor: f64,
    positions: DashMap<Symbol, MmPosition>,
    signals_generated: std::sync::atomic::AtomicU64,
    quotes_refreshed: std::sync::atomic::AtomicU64,
    spread_earned: parking_lot::Mutex<f64>,
}

impl MarketMakingEngine {
    #[must_use]
    pub fn new(
        default_spread_bps: f64,
        quote_size_shares: f64,
        max_position_shares: f64,
        inventory_skew_factor: f64,
    ) -> Self {
        Self {
            default_spread_bps,
            quote_size_shares,
            max_position_shares,
            inventory_skew_factor,
            positions: DashMap::new(),
            signals_generated: std::sync::atomic::AtomicU64::new(0),
            quotes_refreshed: std::sync::atomic::AtomicU64::new(0),
            spread_earned: parking_lot::Mutex::new(0.0),
        }
    }

    /// Produces exactly two signals (BUY bid, SELL ask) for `symbol`, or
    /// none if the book has no valid mid.
    pub fn generate_quotes(&self, symbol: &Symbol, book: &OrderBookSnapshot) -> Vec<StrategySignal> {
        use std::sync::atomic::Ordering;

        let Some(mid_px) = book.mid_price else {
            return Vec::new();
        };
        let mid = mid_px.as_f64();
        if mid <= 0.0 {
            return Vec::new();
        }

        let mut position = self.positions.entry(symbol.clone()).or_default();

        let base_spread_pct = self.default_spread_bps / 10_000.0;
        let vol_adjustment = (book.spread_bps / 100.0).min(0.002);
        let spread_pct = base_spread_pct + vol_adjustment;

        let inventory_skew = if position.net_qty != 0.0 {
            (position.net_qty / self.max_position_shares) * self.inventory_skew_factor * spread_pct
        } else {
            0.0
        };

        let half_spread = mid * spread_pct / 2.0;
        let mut bid_price = mid - half_spread + inventory_skew * mid;
        let mut ask_price = mid + half_spread + inventory_skew * mid;
        if ask_price <= bid_price {
            ask_price = bid_price + 0.01;
        }
        bid_price = (bid_price * 100.0).round() / 100.0;
        ask_price = (ask_price * 100.0).round() / 100.0;

        // Only the side that would further increase exposure is halved.
        let mut bid_qty = self.quote_size_shares;
        let mut ask_qty = self.quote_size_shares;
        if position.net_qty.abs() > self.max_position_shares * 0.8 {
            if position.net_qty > 0.0 {
                bid_qty /= 2.0;
            } else {
                ask_qty /= 2.0;
            }
        }

        let spread_bps = (ask_price - bid_price) / mid * 10_000.0;

        let bid_signal = StrategySignal {
            strategy_id: "MM-CORE",
            symbol: symbol.clone(),
            side: Side::Buy,
            target_price: Px::new(bid_price),
            target_qty: Qty::new(bid_qty),
            urgency: 0.5,
            signal_type: SignalType::MarketMakeQuote,
            metadata: SignalMetadata::MarketMake { quote_mid: mid_px, inventory_skew },
        };
        let ask_signal = StrategySignal {
            strategy_id: "MM-CORE",
            symbol: symbol.clone(),
            side: Side::Sell,
            target_price: Px::new(ask_price),
            target_qty: Qty::new(ask_qty),
            urgency: 0.5,
            signal_type: SignalType::MarketMakeQuote,
            metadata: SignalMetadata::MarketMake { quote_mid: mid_px, inventory_skew },
        };

        let _ = spread_bps;
        drop(position);
        self.signals_generated.fetch_add(2, Ordering::Relaxed);
        self.quotes_refreshed.fetch_add(1, Ordering::Relaxed);
        vec![bid_signal, ask_signal]
    }

    pub fn on_fill(&self, fill: &Fill) {
        let mut position = self.positions.entry(fill.symbol.clone()).or_default();
        position.apply_fill(fill.side, fill.fill_price.as_f64(), fill.fill_qty.as_f64());
        if fill.liquidity == hft_common::Liquidity::Maker && fill.fee < 0.0 {
            *self.spread_earned.lock() += fill.fee.abs();
        }
    }

    pub fn update_mark_price(&self, symbol: &Symbol, price: Px) {
        if let Some(mut position) = self.positions.get_mut(symbol) {
            position.update_unrealized(price.as_f64());
        }
    }

    #[must_use]
    pub fn get_position(&self, symbol: &Symbol) -> Option<MmPosition> {
        self.positions.get(symbol).map(|p| *p)
    }

    #[must_use]
    pub fn stats(&self) -> MmStats {
        use std::sync::atomic::Ordering;
        let mut total_pnl = 0.0;
        let mut total_trades = 0;
        let mut total_volume = 0.0;
        for entry in &self.positions {
            total_pnl += entry.total_pnl();
            total_trades += entry.trades_count;
            total_volume += entry.total_volume;
        }
        MmStats {
            signals_generated: self.signals_generated.load(Ordering::Relaxed),
            quotes_refreshed: self.quotes_refreshed.load(Ordering::Relaxed),
            total_pnl,
            total_trades,
            total_volume,
            spread_earned: *self.spread_earned.lock(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hft_bus::event_types::{EventKind, MarketDataEvent};
    use hft_common::{Ts, Venue};
    use hft_orderbook::OrderBookManager;

    fn book_with_mid(bid: f64, ask: f64) -> OrderBookSnapshot {
        let mgr = OrderBookManager::new(1);
        mgr.apply_event(&MarketDataEvent {
            kind: EventKind::L1,
            symbol: Symbol::from("ACME"),
            venue: Venue::from("NASDAQ"),
            receive_ns: Ts::now(),
            exchange_ns: Ts::now(),
            sequence: 1,
            bid: Px::new(bid),
            bid_size: Qty::new(500.0),
            ask: Px::new(ask),
            ask_size: Qty::new(500.0),
            trade_price: None,
            trade_size: None,
        });
        mgr.get_book(&Symbol::from("ACME")).unwrap()
    }

    #[test]
    fn generates_two_signals_straddling_mid() {
        let mm = MarketMakingEngine::new(2.0, 100.0, 10_000.0, 0.5);
        let book = book_with_mid(99.99, 100.01);
        let signals = mm.generate_quotes(&Symbol::from("ACME"), &book);
        assert_eq!(signals.len(), 2);
        assert!(signals[0].target_price.as_f64() < signals[1].target_price.as_f64());
    }

    #[test]
    fn empty_book_yields_no_signals() {
        let mm = MarketMakingEngine::new(2.0, 100.0, 10_000.0, 0.5);
        let mgr = OrderBookManager::new(1);
        mgr.register_symbol(&Symbol::from("ACME"));
        let book = mgr.get_book(&Symbol::from("ACME")).unwrap();
        assert!(mm.generate_quotes(&Symbol::from("ACME"), &book).is_empty());
    }

    #[test]
    fn long_inventory_halves_only_the_buy_side() {
        let mm = MarketMakingEngine::new(2.0, 100.0, 1000.0, 0.5);
        mm.on_fill(&Fill {
            order_id: "ORD-1".to_string(),
            symbol: Symbol::from("ACME"),
            side: Side::Buy,
            fill_price: Px::new(100.0),
            fill_qty: Qty::new(900.0),
            venue: Venue::from("NASDAQ"),
            liquidity: hft_common::Liquidity::Maker,
            fee: -0.5,
            is_final: true,
            remaining_qty: Qty::ZERO,
        });
        let book = book_with_mid(99.99, 100.01);
        let signals = mm.generate_quotes(&Symbol::from("ACME"), &book);
        let bid = &signals[0];
        let ask = &signals[1];
        assert!(bid.target_qty.as_f64() < ask.target_qty.as_f64());
    }
}
