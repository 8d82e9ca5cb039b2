//! Order management system: full order lifecycle, fill application, and a
//! bounded audit trail.
//!
//! Every order passes through
//! `PENDING -> SENT -> ACKED -> [PARTIALLY_FILLED ->] FILLED | CANCELLED | REJECTED`.

use crate::order::{Fill, Order, OrderStatus};
use dashmap::DashMap;
use hft_common::{Clock, Px, Qty, Symbol};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Serialize)]
pub struct FillRecord {
    pub order_id: String,
    pub symbol: Symbol,
    pub fill_price: Px,
    pub fill_qty: Qty,
    pub fee: f64,
    pub timestamp_ns: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OmsStats {
    pub total_orders: u64,
    pub total_fills: u64,
    pub total_value_traded: f64,
    pub total_fees: f64,
    pub active_orders: usize,
    pub fill_rate_pct: f64,
}

/// Central order book of record. Orders are inserted on creation and mutated
/// in place as fills arrive; the history log is an independent, size-capped
/// audit trail.
pub struct OrderManagementSystem {
    orders: DashMap<String, Order>,
    fills_by_order: DashMap<String, Vec<Fill>>,
    history: parking_lot::Mutex<VecDeque<FillRecord>>,
    max_history: usize,
    total_orders: AtomicU64,
    total_fills: AtomicU64,
    total_value_traded: parking_lot::Mutex<f64>,
    total_fees: parking_lot::Mutex<f64>,
    clock: Arc<Clock>,
}

impl OrderManagementSystem {
    #[must_use]
    pub fn new(max_history: usize, clock: Arc<Clock>) -> Self {
        Self {
            orders: DashMap::new(),
            fills_by_order: DashMap::new(),
            history: parking_lot::Mutex::new(VecDeque::new()),
            max_history,
            total_orders: AtomicU64::new(0),
            total_fills: AtomicU64::new(0),
            total_value_traded: parking_lot::Mutex::new(0.0),
            total_fees: parking_lot::Mutex::new(0.0),
            clock,
        }
    }

    pub fn insert(&self, order: Order) {
        self.total_orders.fetch_add(1, Ordering::Relaxed);
        self.orders.insert(order.order_id.clone(), order);
    }

    pub fn update_status(&self, order_id: &str, new_status: OrderStatus) {
        if let Some(mut order) = self.orders.get_mut(order_id) {
            order.status = new_status;
        }
    }

    /// Appends the fill, recomputes the volume-weighted average fill price
    /// from every fill recorded against this order, clamps filled quantity
    /// to the order's original quantity (the resolved over-fill policy), and
    /// transitions status to `FILLED` or `PARTIALLY_FILLED`.
    pub fn apply_fill(&self, fill: &Fill) {
        let Some(mut order) = self.orders.get_mut(&fill.order_id) else {
            return;
        };

        self.fills_by_order
            .entry(fill.order_id.clone())
            .or_default()
            .push(fill.clone());

        let new_filled = order.filled_qty + fill.fill_qty;
        order.filled_qty = new_filled.min(order.quantity);
        order.remaining_qty = order.quantity.saturating_sub(order.filled_qty);
        order.avg_fill_price = self.calc_avg_price(&fill.order_id);

        order.status = if fill.is_final || order.remaining_qty.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        drop(order);

        self.total_fills.fetch_add(1, Ordering::Relaxed);
        *self.total_value_traded.lock() += fill.fill_price.as_f64() * fill.fill_qty.as_f64();
        *self.total_fees.lock() += fill.fee;

        let mut history = self.history.lock();
        history.push_back(FillRecord {
            order_id: fill.order_id.clone(),
            symbol: fill.symbol.clone(),
            fill_price: fill.fill_price,
            fill_qty: fill.fill_qty,
            fee: fill.fee,
            timestamp_ns: self.clock.now().ts.as_nanos(),
        });
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    fn calc_avg_price(&self, order_id: &str) -> Px {
        let Some(fills) = self.fills_by_order.get(order_id) else {
            return Px::ZERO;
        };
        let total_qty: f64 = fills.iter().map(|f| f.fill_qty.as_f64()).sum();
        if total_qty <= 0.0 {
            return Px::ZERO;
        }
        let total_value: f64 =
            fills.iter().map(|f| f.fill_price.as_f64() * f.fill_qty.as_f64()).sum();
        Px::new(total_value / total_qty)
    }

    #[must_use]
    pub fn get_order(&self, order_id: &str) -> Option<Order> {
        self.orders.get(order_id).map(|o| o.clone())
    }

    #[must_use]
    pub fn active_orders(&self, symbol: Option<&Symbol>) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|e| {
                matches!(
                    e.status,
                    OrderStatus::Pending
                        | OrderStatus::Sent
                        | OrderStatus::Acked
                        | OrderStatus::PartiallyFilled
                )
            })
            .filter(|e| symbol.is_none_or(|s| &e.symbol == s))
            .map(|e| e.value().clone())
            .collect()
    }

    #[must_use]
    pub fn recent_fills(&self, limit: usize) -> Vec<FillRecord> {
        let history = self.history.lock();
        history.iter().rev().take(limit).cloned().collect()
    }

    #[must_use]
    pub fn stats(&self) -> OmsStats {
        let total_orders = self.total_orders.load(Ordering::Relaxed);
        let total_fills = self.total_fills.load(Ordering::Relaxed);
        OmsStats {
            total_orders,
            total_fills,
            total_value_traded: *self.total_value_traded.lock(),
            total_fees: *self.total_fees.lock(),
            active_orders: self.active_orders(None).len(),
            fill_rate_pct: total_fills as f64 / total_orders.max(1) as f64 * 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hft_common::{Liquidity, OrderType, Side, Venue};

    fn new_order(qty: f64) -> Order {
        Order {
            order_id: Order::new_id(),
            client_order_id: "CL-1".to_string(),
            parent_order_id: None,
            symbol: Symbol::from("ACME"),
            side: Side::Buy,
            order_type: OrderType::Limit,
            price: Px::new(100.0),
            quantity: Qty::new(qty),
            venue: Venue::from("NASDAQ"),
            strategy_id: "TEST",
            status: OrderStatus::Pending,
            filled_qty: Qty::ZERO,
            remaining_qty: Qty::new(qty),
            avg_fill_price: Px::ZERO,
            created_ns: hft_common::Ts::now(),
        }
    }

    fn fill_for(order_id: &str, qty: f64, price: f64, is_final: bool) -> Fill {
        Fill {
            order_id: order_id.to_string(),
            symbol: Symbol::from("ACME"),
            side: Side::Buy,
            fill_price: Px::new(price),
            fill_qty: Qty::new(qty),
            venue: Venue::from("NASDAQ"),
            liquidity: Liquidity::Taker,
            fee: 0.05,
            is_final,
            remaining_qty: Qty::ZERO,
        }
    }

    #[test]
    fn partial_then_full_fill_transitions_status() {
        let oms = OrderManagementSystem::new(100, Arc::new(Clock::new()));
        let order = new_order(100.0);
        let id = order.order_id.clone();
        oms.insert(order);

        oms.apply_fill(&fill_for(&id, 40.0, 100.0, false));
        assert_eq!(oms.get_order(&id).unwrap().status, OrderStatus::PartiallyFilled);

        oms.apply_fill(&fill_for(&id, 60.0, 101.0, true));
        let final_order = oms.get_order(&id).unwrap();
        assert_eq!(final_order.status, OrderStatus::Filled);
        assert_eq!(final_order.remaining_qty, Qty::ZERO);
    }

    #[test]
    fn avg_fill_price_is_volume_weighted() {
        let oms = OrderManagementSystem::new(100, Arc::new(Clock::new()));
        let order = new_order(100.0);
        let id = order.order_id.clone();
        oms.insert(order);

        oms.apply_fill(&fill_for(&id, 50.0, 100.0, false));
        oms.apply_fill(&fill_for(&id, 50.0, 102.0, true));
        let filled = oms.get_order(&id).unwrap();
        assert!((filled.avg_fill_price.as_f64() - 101.0).abs() < 1e-6);
    }

    #[test]
    fn over_fill_clamps_instead_of_rejecting() {
        let oms = OrderManagementSystem::new(100, Arc::new(Clock::new()));
        let order = new_order(100.0);
        let id = order.order_id.clone();
        oms.insert(order);

        oms.apply_fill(&fill_for(&id, 150.0, 100.0, true));
        let filled = oms.get_order(&id).unwrap();
        assert_eq!(filled.filled_qty, Qty::new(100.0));
        assert_eq!(filled.remaining_qty, Qty::ZERO);
    }

    #[test]
    fn history_is_bounded_by_max_history() {
        let oms = OrderManagementSystem::new(3, Arc::new(Clock::new()));
        let order = new_order(1000.0);
        let id = order.order_id.clone();
        oms.insert(order);
        for _ in 0..10 {
            oms.apply_fill(&fill_for(&id, 1.0, 100.0, false));
        }
        assert_eq!(oms.recent_fills(100).len(), 3);
    }

    #[test]
    fn active_orders_filters_by_symbol() {
        let oms = OrderManagementSystem::new(100, Arc::new(Clock::new()));
        let a = new_order(10.0);
        let mut b = new_order(10.0);
        b.symbol = Symbol::from("OTHER");
        let b_id = b.order_id.clone();
        oms.insert(a);
        oms.insert(b);
        assert_eq!(oms.active_orders(Some(&Symbol::from("OTHER"))).len(), 1);
        assert_eq!(oms.get_order(&b_id).unwrap().symbol, Symbol::from("OTHER"));
    }
}
