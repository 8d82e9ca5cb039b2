//! Exchange gateway: a per-venue simulated matching engine providing
//! submit/fill/cancel semantics with venue-specific latency and fee models.

use crate::order::{Fill, Order, OrderStatus};
use dashmap::DashMap;
use hft_common::{Liquidity, OrderType, Px, Qty, Venue};
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Duration;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VenueConfig {
    pub name: &'static str,
    pub latency_us: u32,
    pub maker_rebate_per_share: f64,
    pub taker_fee_per_share: f64,
    pub max_order_rate: u32,
}

/// Five venues modeled by default, grounded on the reference system's
/// `VENUE_CONFIGS` table.
pub const VENUE_CONFIGS: [VenueConfig; 5] = [
    VenueConfig { name: "NASDAQ", latency_us: 45, maker_rebate_per_share: -0.0032, taker_fee_per_share: 0.0030, max_order_rate: 15_000 },
    VenueConfig { name: "NYSE", latency_us: 52, maker_rebate_per_share: -0.0025, taker_fee_per_share: 0.0030, max_order_rate: 10_000 },
    VenueConfig { name: "BATS", latency_us: 38, maker_rebate_per_share: -0.0030, taker_fee_per_share: 0.0028, max_order_rate: 20_000 },
    VenueConfig { name: "IEX", latency_us: 350, maker_rebate_per_share: -0.0009, taker_fee_per_share: 0.0009, max_order_rate: 5_000 },
    VenueConfig { name: "ARCA", latency_us: 48, maker_rebate_per_share: -0.0028, taker_fee_per_share: 0.0030, max_order_rate: 12_000 },
];

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct VenueStats {
    pub orders_sent: u64,
    pub orders_acked: u64,
    pub orders_rejected: u64,
    pub orders_filled: u64,
    pub partial_fills: u64,
    pub total_fill_qty: f64,
    pub total_notional: f64,
    pub total_fees: f64,
    latency_sum_us: f64,
}

impl VenueStats {
    fn record_latency(&mut self, latency_us: f64) {
        self.latency_sum_us += latency_us;
    }

    #[must_use]
    pub fn avg_latency_us(&self) -> f64 {
        let total = self.orders_acked + self.orders_rejected;
        if total == 0 {
            0.0
        } else {
            self.latency_sum_us / total as f64
        }
    }
}

/// One venue's simulated matching engine.
pub struct ExchangeSimulator {
    config: VenueConfig,
    stats: parking_lot::Mutex<VenueStats>,
}

impl ExchangeSimulator {
    #[must_use]
    pub fn new(config: VenueConfig) -> Self {
        Self { config, stats: parking_lot::Mutex::new(VenueStats::default()) }
    }

    /// Suspends for the venue's wire latency plus jitter, then acks or
    /// rejects with ~2% probability.
    pub async fn submit_order(&self, mut order: Order, rng: &mut impl Rng) -> Order {
        self.stats.lock().orders_sent += 1;

        let jitter: i32 = rng.gen_range(-5..=15);
        let latency_us = (i64::from(self.config.latency_us) + i64::from(jitter)).max(1) as u64;
        tokio::time::sleep(Duration::from_micros(latency_us)).await;

        let mut stats = self.stats.lock();
        if rng.gen_bool(0.02) {
            order.status = OrderStatus::Rejected;
            stats.orders_rejected += 1;
            stats.record_latency(latency_us as f64);
            return order;
        }

        order.status = OrderStatus::Acked;
        order.remaining_qty = order.quantity;
        stats.orders_acked += 1;
        stats.record_latency(latency_us as f64);
        order
    }

    /// Produces one or more fills whose cumulative quantity equals the
    /// order's quantity, modeling slippage and per-share fees.
    pub fn simulate_fills(&self, order: &Order, rng: &mut impl Rng) -> Vec<Fill> {
        if order.status != OrderStatus::Acked {
            return Vec::new();
        }

        let mut fills = Vec::new();
        let mut remaining = order.quantity;
        let is_maker = order.order_type.is_maker_style();

        while !remaining.is_zero() {
            let fill_ratio = if order.order_type == OrderType::Ioc {
                rng.gen_range(0.3..=1.0)
            } else {
                rng.gen_range(0.5..=1.0)
            };

            let raw_fill = Qty::new((remaining.as_f64() * fill_ratio).max(1.0));
            let fill_qty = raw_fill.min(remaining);

            let slippage: f64 = rng.gen_range(-0.005..=0.005);
            let fill_price = Px::new((order.price.as_f64() * (1.0 + slippage) * 100.0).round() / 100.0);

            let fee = if is_maker {
                self.config.maker_rebate_per_share * fill_qty.as_f64()
            } else {
                self.config.taker_fee_per_share * fill_qty.as_f64()
            };

            remaining = remaining.saturating_sub(fill_qty);
            let is_final = remaining.is_zero();

            let mut stats = self.stats.lock();
            stats.total_fill_qty += fill_qty.as_f64();
            stats.total_notional += fill_price.as_f64() * fill_qty.as_f64();
            stats.total_fees += fee;
            if is_final {
                stats.orders_filled += 1;
            } else {
                stats.partial_fills += 1;
            }
            drop(stats);

            fills.push(Fill {
                order_id: order.order_id.clone(),
                symbol: order.symbol.clone(),
                side: order.side,
                fill_price,
                fill_qty,
                venue: order.venue.clone(),
                liquidity: if is_maker { Liquidity::Maker } else { Liquidity::Taker },
                fee: (fee * 10_000.0).round() / 10_000.0,
                is_final,
                remaining_qty: remaining,
            });

            if !remaining.is_zero() && order.order_type == OrderType::Ioc && rng.gen_bool(0.3) {
                break;
            }
        }
        fills
    }

    #[must_use]
    pub fn stats(&self) -> VenueStats {
        *self.stats.lock()
    }
}

/// Unified gateway fronting every configured venue's simulator.
pub struct ExchangeGateway {
    simulators: DashMap<Venue, ExchangeSimulator>,
    requests: AtomicU64,
}

impl Default for ExchangeGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeGateway {
    #[must_use]
    pub fn new() -> Self {
        let simulators = DashMap::new();
        for vc in VENUE_CONFIGS {
            simulators.insert(Venue::from(vc.name), ExchangeSimulator::new(vc));
        }
        Self { simulators, requests: AtomicU64::new(0) }
    }

    pub async fn submit_order(&self, order: Order, rng: &mut impl Rng) -> Order {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let Some(sim) = self.simulators.get(&order.venue) else {
            let mut rejected = order;
            rejected.status = OrderStatus::Rejected;
            return rejected;
        };
        // The venue table is populated once at construction and never
        // mutated afterward, so holding this read guard across the await
        // below never contends with a writer.
        sim.submit_order(order, rng).await
    }

    #[must_use]
    pub fn get_fills(&self, order: &Order, rng: &mut impl Rng) -> Vec<Fill> {
        self.simulators.get(&order.venue).map(|s| s.simulate_fills(order, rng)).unwrap_or_default()
    }

    #[must_use]
    pub fn venue_stats(&self) -> Vec<(Venue, VenueStats)> {
        self.simulators.iter().map(|e| (e.key().clone(), e.stats())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hft_common::{Side, Symbol, Ts};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn order() -> Order {
        Order {
            order_id: Order::new_id(),
            client_order_id: "CL-1".to_string(),
            parent_order_id: None,
            symbol: Symbol::from("ACME"),
            side: Side::Buy,
            order_type: OrderType::Limit,
            price: Px::new(100.0),
            quantity: Qty::new(100.0),
            venue: Venue::from("NASDAQ"),
            strategy_id: "TEST",
            status: OrderStatus::Pending,
            filled_qty: Qty::ZERO,
            remaining_qty: Qty::new(100.0),
            avg_fill_price: Px::ZERO,
            created_ns: Ts::now(),
        }
    }

    #[tokio::test]
    async fn submit_order_acks_or_rejects() {
        let gw = ExchangeGateway::new();
        let mut rng = StdRng::seed_from_u64(1);
        let acked = gw.submit_order(order(), &mut rng).await;
        assert!(matches!(acked.status, OrderStatus::Acked | OrderStatus::Rejected));
    }

    #[test]
    fn fills_sum_to_order_quantity() {
        let gw = ExchangeGateway::new();
        let mut rng = StdRng::seed_from_u64(2);
        let mut ord = order();
        ord.status = OrderStatus::Acked;
        ord.remaining_qty = ord.quantity;
        let fills = gw.get_fills(&ord, &mut rng);
        let total: i64 = fills.iter().map(|f| f.fill_qty.as_i64()).sum();
        assert_eq!(total, ord.quantity.as_i64());
        assert!(fills.last().map(|f| f.is_final).unwrap_or(false));
    }

    #[test]
    fn unknown_venue_yields_no_fills() {
        let gw = ExchangeGateway::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut ord = order();
        ord.venue = Venue::from("NOWHERE");
        assert!(gw.get_fills(&ord, &mut rng).is_empty());
    }
}
