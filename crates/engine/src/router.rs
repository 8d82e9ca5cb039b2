//! Smart order router: picks the best venue for a signal, slices large
//! orders, and adapts venue reputation from fill feedback.

use crate::gateway::VENUE_CONFIGS;
use crate::order::{Order, OrderStatus};
use crate::signal::{SignalType, StrategySignal};
use dashmap::DashMap;
use hft_common::{Clock, Qty, Venue};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterStats {
    pub routes_evaluated: u64,
    pub orders_routed: u64,
    pub splits_created: u64,
}

/// Adaptive per-venue routing state: reputation and a moving fill-rate
/// estimate, both updated only through `update_venue_score`.
pub struct SmartRouter {
    venues: Vec<Venue>,
    max_slice_size: Qty,
    venue_scores: DashMap<Venue, f64>,
    venue_fill_rates: DashMap<Venue, f64>,
    routes_evaluated: std::sync::atomic::AtomicU64,
    orders_routed: std::sync::atomic::AtomicU64,
    splits_created: std::sync::atomic::AtomicU64,
    clock: Arc<Clock>,
}

impl SmartRouter {
    #[must_use]
    pub fn new(venues: Vec<Venue>, max_slice_size: Qty, clock: Arc<Clock>) -> Self {
        let venue_scores = DashMap::new();
        let venue_fill_rates = DashMap::new();
        for v in &venues {
            venue_scores.insert(v.clone(), 1.0);
            venue_fill_rates.insert(v.clone(), 0.85);
        }
        Self {
            venues,
            max_slice_size,
            venue_scores,
            venue_fill_rates,
            routes_evaluated: std::sync::atomic::AtomicU64::new(0),
            orders_routed: std::sync::atomic::AtomicU64::new(0),
            splits_created: std::sync::atomic::AtomicU64::new(0),
            clock,
        }
    }

    /// Converts a strategy signal into one or more orders, slicing when the
    /// target quantity exceeds `max_slice_size`.
    pub fn route_signal(&self, signal: &StrategySignal) -> Vec<Order> {
        use std::sync::atomic::Ordering;
        self.routes_evaluated.fetch_add(1, Ordering::Relaxed);

        if signal.target_qty <= self.max_slice_size {
            let venue = self.select_best_venue(signal);
            self.orders_routed.fetch_add(1, Ordering::Relaxed);
            vec![self.make_order(signal, venue, signal.target_qty, None)]
        } else {
            self.split_order(signal)
        }
    }

    /// Single scoring formula shared by `select_best_venue` (pick one) and
    /// `venue_weights` (normalize across all): latency weighted by urgency,
    /// fee/rebate, recent fill rate, and adaptive reputation.
    fn venue_score(&self, signal: &StrategySignal, venue: &Venue) -> Option<f64> {
        let vc = VENUE_CONFIGS.iter().find(|v| v.name == venue.as_str())?;
        let latency_score = 1.0 / (f64::from(vc.latency_us) / 100.0);
        let fee_score = if matches!(signal.signal_type, SignalType::MarketMakeQuote) {
            vc.maker_rebate_per_share.abs() * 1000.0
        } else {
            1.0 / (vc.taker_fee_per_share * 1000.0 + 0.1)
        };
        let fill_score = *self.venue_fill_rates.get(venue).as_deref().unwrap_or(&0.5);
        let reputation = *self.venue_scores.get(venue).as_deref().unwrap_or(&0.5);

        Some(
            latency_score * (0.3 + 0.2 * signal.urgency)
                + fee_score * 0.3
                + fill_score * 0.2
                + reputation * 0.2,
        )
    }

    fn select_best_venue(&self, signal: &StrategySignal) -> Venue {
        let mut best: Option<(Venue, f64)> = None;
        for venue in &self.venues {
            let Some(total) = self.venue_score(signal, venue) else {
                continue;
            };
            if best.as_ref().is_none_or(|(_, s)| total > *s) {
                best = Some((venue.clone(), total));
            }
        }
        best.map(|(v, _)| v).unwrap_or_else(|| self.venues[0].clone())
    }

    /// Normalized `venue_score` across all venues, sorted descending so the
    /// highest-scored venue is first.
    fn venue_weights(&self, signal: &StrategySignal) -> Vec<(Venue, f64)> {
        let raw: Vec<(Venue, f64)> = self
            .venues
            .iter()
            .filter_map(|venue| self.venue_score(signal, venue).map(|s| (venue.clone(), s)))
            .collect();
        let total: f64 = raw.iter().map(|(_, s)| s).sum::<f64>().max(1e-9);
        let mut weighted: Vec<(Venue, f64)> =
            raw.into_iter().map(|(v, s)| (v, s / total)).collect();
        weighted.sort_by(|a, b| b.1.total_cmp(&a.1));
        weighted
    }

    fn split_order(&self, signal: &StrategySignal) -> Vec<Order> {
        use std::sync::atomic::Ordering;
        let parent_id = Order::new_id();
        let mut remaining = signal.target_qty;
        let mut orders = Vec::new();

        for (venue, weight) in self.venue_weights(signal) {
            if remaining.is_zero() {
                break;
            }
            let raw_slice = Qty::new((signal.target_qty.as_f64() * weight).max(1.0));
            let slice_qty = raw_slice.min(remaining).min(self.max_slice_size);
            orders.push(self.make_order(signal, venue, slice_qty, Some(parent_id.clone())));
            remaining = remaining.saturating_sub(slice_qty);
            self.splits_created.fetch_add(1, Ordering::Relaxed);
        }

        if !remaining.is_zero() {
            // `venue_weights` sorts descending, so the first slice pushed
            // belongs to the highest-scored venue; the residual goes there.
            if let Some(highest) = orders.first_mut() {
                highest.quantity = highest.quantity + remaining;
                highest.remaining_qty = highest.remaining_qty + remaining;
            }
        }

        self.orders_routed.fetch_add(orders.len() as u64, Ordering::Relaxed);
        orders
    }

    fn make_order(
        &self,
        signal: &StrategySignal,
        venue: Venue,
        qty: Qty,
        parent_order_id: Option<String>,
    ) -> Order {
        Order {
            order_id: Order::new_id(),
            client_order_id: format!("CL-{}", &Order::new_id()[4..12]),
            parent_order_id,
            symbol: signal.symbol.clone(),
            side: signal.side,
            order_type: hft_common::OrderType::Limit,
            price: signal.target_price,
            quantity: qty,
            venue,
            strategy_id: signal.strategy_id,
            status: OrderStatus::Pending,
            filled_qty: Qty::ZERO,
            remaining_qty: qty,
            avg_fill_price: hft_common::Px::ZERO,
            created_ns: self.clock.now().ts,
        }
    }

    /// On success, reputation grows toward a 2.0 cap and fill rate toward
    /// 1.0; on failure both decay toward floors of 0.1.
    pub fn update_venue_score(&self, venue: &Venue, fill_success: bool) {
        let mut score = self.venue_scores.entry(venue.clone()).or_insert(1.0);
        let mut fill_rate = self.venue_fill_rates.entry(venue.clone()).or_insert(0.85);
        if fill_success {
            *score = (*score * 1.01).min(2.0);
            *fill_rate = (*fill_rate * 1.005).min(1.0);
        } else {
            *score = (*score * 0.95).max(0.1);
            *fill_rate = (*fill_rate * 0.98).max(0.1);
        }
    }

    #[must_use]
    pub fn stats(&self) -> RouterStats {
        use std::sync::atomic::Ordering;
        RouterStats {
            routes_evaluated: self.routes_evaluated.load(Ordering::Relaxed),
            orders_routed: self.orders_routed.load(Ordering::Relaxed),
            splits_created: self.splits_created.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalMetadata;
    use hft_common::{Px, Side, Symbol};

    fn signal(target_qty: f64, urgency: f64) -> StrategySignal {
        StrategySignal {
            strategy_id: "TEST",
            symbol: Symbol::from("ACME"),
            side: Side::Buy,
            target_price: Px::new(100.0),
            target_qty: Qty::new(target_qty),
            urgency,
            signal_type: SignalType::LatencyArbitrage,
            metadata: SignalMetadata::None,
        }
    }

    fn router() -> SmartRouter {
        SmartRouter::new(
            vec![
                Venue::from("NASDAQ"),
                Venue::from("NYSE"),
                Venue::from("BATS"),
                Venue::from("IEX"),
                Venue::from("ARCA"),
            ],
            Qty::new(500.0),
            Arc::new(Clock::new()),
        )
    }

    #[test]
    fn small_order_routes_to_single_venue() {
        let r = router();
        let orders = r.route_signal(&signal(100.0, 0.5));
        assert_eq!(orders.len(), 1);
        assert!(orders[0].parent_order_id.is_none());
    }

    #[test]
    fn large_order_splits_with_shared_parent() {
        let r = router();
        let orders = r.route_signal(&signal(2000.0, 0.5));
        assert!(orders.len() > 1);
        let parent = orders[0].parent_order_id.clone();
        assert!(orders.iter().all(|o| o.parent_order_id == parent));
        let total: i64 = orders.iter().map(|o| o.quantity.as_i64()).sum();
        assert_eq!(total, Qty::new(2000.0).as_i64());
    }

    #[test]
    fn venue_score_moves_toward_caps_and_floors() {
        let r = router();
        let venue = Venue::from("NASDAQ");
        for _ in 0..200 {
            r.update_venue_score(&venue, true);
        }
        assert!(*r.venue_scores.get(&venue).unwrap() <= 2.0);
        for _ in 0..200 {
            r.update_venue_score(&venue, false);
        }
        assert!(*r.venue_scores.get(&venue).unwrap() >= 0.1);
    }
}
