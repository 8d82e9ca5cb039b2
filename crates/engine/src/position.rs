//! Real-time position tracker: realized/unrealized P&L with independent
//! long/short decomposition.

use crate::order::Fill;
use dashmap::DashMap;
use hft_common::{Clock, Px, Qty, Side, Symbol};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SymbolPosition {
    pub net_qty: f64,
    pub long_qty: f64,
    pub short_qty: f64,
    pub avg_long_price: f64,
    pub avg_short_price: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_buys: u64,
    pub total_sells: u64,
    pub last_fill_ns: u64,
    mark_price: f64,
}

impl Default for SymbolPosition {
    fn default() -> Self {
        Self {
            net_qty: 0.0,
            long_qty: 0.0,
            short_qty: 0.0,
            avg_long_price: 0.0,
            avg_short_price: 0.0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            total_buys: 0,
            total_sells: 0,
            last_fill_ns: 0,
            mark_price: 0.0,
        }
    }
}

impl SymbolPosition {
    fn recompute_unrealized(&mut self) {
        if self.mark_price <= 0.0 {
            return;
        }
        self.unrealized_pnl = if self.long_qty > 0.0 {
            (self.mark_price - self.avg_long_price) * self.long_qty
        } else if self.short_qty > 0.0 {
            (self.avg_short_price - self.mark_price) * self.short_qty
        } else {
            0.0
        };
    }
}

/// Per-symbol positions, keyed concurrently. Written only from the pipeline
/// loop's signal execution path; the dashboard reads snapshots without
/// locking writers.
pub struct PositionTracker {
    positions: DashMap<Symbol, SymbolPosition>,
    clock: Arc<Clock>,
}

impl PositionTracker {
    #[must_use]
    pub fn new(clock: Arc<Clock>) -> Self {
        Self { positions: DashMap::new(), clock }
    }

    /// Splits the fill into a close against the opposite side and an
    /// open/extend of the fill's own side. Quantity is updated before the
    /// average price is recomputed, using the new quantity as divisor and
    /// `(new_qty - opened_qty)` as the prior weight — resolves the
    /// avg-price update-ordering question explicitly.
    pub fn apply_fill(&self, fill: &Fill) {
        let mut pos = self.positions.entry(fill.symbol.clone()).or_default();
        let fill_qty = fill.fill_qty.as_f64();
        let fill_price = fill.fill_price.as_f64();

        match fill.side {
            Side::Buy => {
                pos.total_buys += 1;
                pos.net_qty += fill_qty;
                if pos.short_qty > 0.0 {
                    let closed = fill_qty.min(pos.short_qty);
                    pos.realized_pnl += (pos.avg_short_price - fill_price) * closed;
                    pos.short_qty -= closed;
                    if pos.short_qty <= 0.0 {
                        pos.short_qty = 0.0;
                        pos.avg_short_price = 0.0;
                    }
                    let opened = fill_qty - closed;
                    if opened > 0.0 {
                        Self::extend(&mut pos.long_qty, &mut pos.avg_long_price, opened, fill_price);
                    }
                } else {
                    Self::extend(&mut pos.long_qty, &mut pos.avg_long_price, fill_qty, fill_price);
                }
            }
            Side::Sell => {
                pos.total_sells += 1;
                pos.net_qty -= fill_qty;
                if pos.long_qty > 0.0 {
                    let closed = fill_qty.min(pos.long_qty);
                    pos.realized_pnl += (fill_price - pos.avg_long_price) * closed;
                    pos.long_qty -= closed;
                    if pos.long_qty <= 0.0 {
                        pos.long_qty = 0.0;
                        pos.avg_long_price = 0.0;
                    }
                    let opened = fill_qty - closed;
                    if opened > 0.0 {
                        Self::extend(&mut pos.short_qty, &mut pos.avg_short_price, opened, fill_price);
                    }
                } else {
                    Self::extend(&mut pos.short_qty, &mut pos.avg_short_price, fill_qty, fill_price);
                }
            }
        }

        pos.last_fill_ns = self.clock.now().ts.as_nanos();
        pos.mark_price = fill_price;
        pos.recompute_unrealized();
    }

    /// quantity first, average price second, using the new quantity as the
    /// divisor and the prior quantity as `(new - opened)`.
    fn extend(qty: &mut f64, avg_price: &mut f64, opened: f64, fill_price: f64) {
        let prior_qty = *qty;
        *qty += opened;
        let total_cost = *avg_price * prior_qty + fill_price * opened;
        *avg_price = total_cost / *qty;
    }

    pub fn update_mark_price(&self, symbol: &Symbol, px: Px) {
        if let Some(mut pos) = self.positions.get_mut(symbol) {
            pos.mark_price = px.as_f64();
            pos.recompute_unrealized();
        }
    }

    #[must_use]
    pub fn get_position(&self, symbol: &Symbol) -> Option<SymbolPosition> {
        self.positions.get(symbol).map(|p| *p)
    }

    #[must_use]
    pub fn get_all_positions(&self) -> Vec<(Symbol, SymbolPosition)> {
        self.positions.iter().map(|e| (e.key().clone(), *e.value())).collect()
    }

    #[must_use]
    pub fn total_pnl(&self) -> f64 {
        self.positions.iter().map(|p| p.realized_pnl + p.unrealized_pnl).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hft_common::{Liquidity, Venue};

    fn fill(side: Side, price: f64, qty: f64) -> Fill {
        Fill {
            order_id: "ORD-TEST".to_string(),
            symbol: Symbol::from("ACME"),
            side,
            fill_price: Px::new(price),
            fill_qty: Qty::new(qty),
            venue: Venue::from("NASDAQ"),
            liquidity: Liquidity::Maker,
            fee: -0.30,
            is_final: true,
            remaining_qty: Qty::ZERO,
        }
    }

    #[test]
    fn net_qty_equals_buys_minus_sells() {
        let tracker = PositionTracker::new(Arc::new(Clock::new()));
        tracker.apply_fill(&fill(Side::Buy, 100.0, 100.0));
        tracker.apply_fill(&fill(Side::Sell, 101.0, 40.0));
        let pos = tracker.get_position(&Symbol::from("ACME")).unwrap();
        assert!((pos.net_qty - 60.0).abs() < 1e-9);
    }

    #[test]
    fn long_and_short_never_simultaneously_positive() {
        let tracker = PositionTracker::new(Arc::new(Clock::new()));
        tracker.apply_fill(&fill(Side::Buy, 100.0, 50.0));
        tracker.apply_fill(&fill(Side::Sell, 101.0, 80.0));
        let pos = tracker.get_position(&Symbol::from("ACME")).unwrap();
        assert!(pos.long_qty == 0.0 || pos.short_qty == 0.0);
        assert!((pos.long_qty * pos.short_qty).abs() < 1e-9);
    }

    #[test]
    fn closing_a_long_realizes_pnl() {
        let tracker = PositionTracker::new(Arc::new(Clock::new()));
        tracker.apply_fill(&fill(Side::Buy, 100.0, 100.0));
        tracker.apply_fill(&fill(Side::Sell, 101.0, 100.0));
        let pos = tracker.get_position(&Symbol::from("ACME")).unwrap();
        assert!((pos.realized_pnl - 100.0).abs() < 1e-6);
        assert_eq!(pos.net_qty, 0.0);
    }

    #[test]
    fn reverse_fill_round_trip_is_pnl_neutral() {
        let tracker = PositionTracker::new(Arc::new(Clock::new()));
        tracker.apply_fill(&fill(Side::Buy, 100.0, 100.0));
        let before = tracker.get_position(&Symbol::from("ACME")).unwrap();
        tracker.apply_fill(&fill(Side::Sell, 100.0, 100.0));
        let after = tracker.get_position(&Symbol::from("ACME")).unwrap();
        assert!((after.realized_pnl - before.realized_pnl).abs() < 1e-6);
        assert_eq!(after.net_qty, 0.0);
    }

    #[test]
    fn avg_long_price_is_volume_weighted() {
        let tracker = PositionTracker::new(Arc::new(Clock::new()));
        tracker.apply_fill(&fill(Side::Buy, 100.0, 100.0));
        tracker.apply_fill(&fill(Side::Buy, 110.0, 100.0));
        let pos = tracker.get_position(&Symbol::from("ACME")).unwrap();
        assert!((pos.avg_long_price - 105.0).abs() < 1e-6);
    }
}
