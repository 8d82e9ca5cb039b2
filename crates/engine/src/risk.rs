//! Pre-trade risk gate: seven ordered checks, a circuit breaker latch, and
//! per-second rate/notional limiting. Must not suspend.

use crate::order::Order;
use dashmap::DashMap;
use hft_common::{Clock, Px, Qty, Symbol, Ts};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

#[derive(Debug, Clone)]
pub struct RiskLimits {
    pub max_order_value: f64,
    pub max_daily_loss: f64,
    pub max_orders_per_second: u32,
    pub max_notional_per_second: f64,
    pub fat_finger_threshold_pct: f64,
    pub position_limit_per_symbol: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    CircuitBreakerActive,
    FatFinger,
    PositionLimit,
    OrderRateLimit,
    NotionalLimit,
    DailyLoss,
    Duplicate,
}

impl RejectReason {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            RejectReason::CircuitBreakerActive => "CIRCUIT_BREAKER_ACTIVE",
            RejectReason::FatFinger => "FAT_FINGER",
            RejectReason::PositionLimit => "POSITION_LIMIT",
            RejectReason::OrderRateLimit => "ORDER_RATE_LIMIT",
            RejectReason::NotionalLimit => "NOTIONAL_LIMIT",
            RejectReason::DailyLoss => "DAILY_LOSS",
            RejectReason::Duplicate => "DUPLICATE_ORDER",
        }
    }
}

#[derive(Debug, Clone)]
pub enum RiskVerdict {
    Approved,
    Rejected { reasons: Vec<RejectReason>, reason_string: String },
}

impl RiskVerdict {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, RiskVerdict::Approved)
    }

    fn rejected(reasons: Vec<RejectReason>) -> Self {
        let reason_string = reasons
            .iter()
            .map(|r| r.code())
            .collect::<Vec<_>>()
            .join("; ");
        RiskVerdict::Rejected { reasons, reason_string }
    }
}

#[derive(Default)]
struct SymbolRiskState {
    last_seen_price: Mutex<Option<f64>>,
    current_position: AtomicI64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RiskMetrics {
    pub checks_run: u64,
    pub checks_passed: u64,
    pub avg_check_latency_ns: f64,
}

/// Pre-trade risk gate. Every method is pure CPU: no suspension points.
pub struct RiskGate {
    limits: RiskLimits,
    clock: Arc<Clock>,
    breaker_active: AtomicBool,
    daily_pnl: Mutex<f64>,
    order_timestamps_ns: Mutex<VecDeque<u64>>,
    notional_window: Mutex<VecDeque<(u64, f64)>>,
    recent_order_ids: Mutex<VecDeque<String>>,
    symbol_state: DashMap<Symbol, SymbolRiskState>,
    checks_run: AtomicU64,
    checks_passed: AtomicU64,
    total_check_latency_ns: AtomicU64,
    rejection_counts: DashMap<&'static str, u64>,
}

impl RiskGate {
    #[must_use]
    pub fn new(limits: RiskLimits, clock: Arc<Clock>) -> Self {
        Self {
            limits,
            clock,
            breaker_active: AtomicBool::new(false),
            daily_pnl: Mutex::new(0.0),
            order_timestamps_ns: Mutex::new(VecDeque::new()),
            notional_window: Mutex::new(VecDeque::new()),
            recent_order_ids: Mutex::new(VecDeque::new()),
            symbol_state: DashMap::new(),
            checks_run: AtomicU64::new(0),
            checks_passed: AtomicU64::new(0),
            total_check_latency_ns: AtomicU64::new(0),
            rejection_counts: DashMap::new(),
        }
    }

    /// Runs all seven checks in order, accumulating every failure into one
    /// reason list rather than short-circuiting after the first. Only an
    /// `Approved` verdict commits state (reference price, rate/notional
    /// budget, recent-approved id) — a rejected order must not consume or
    /// perturb any of it.
    pub fn check_order(&self, order: &Order) -> RiskVerdict {
        let clock_start = self.clock.now().ts;
        self.checks_run.fetch_add(1, Ordering::Relaxed);

        if self.breaker_active.load(Ordering::Acquire) {
            self.record_latency(clock_start);
            self.count_rejection(RejectReason::CircuitBreakerActive.code());
            return RiskVerdict::rejected(vec![RejectReason::CircuitBreakerActive]);
        }

        let mut reasons = Vec::new();
        let now_ns = self.clock.now().ts.as_nanos();
        let state = self.symbol_state.entry(order.symbol.clone()).or_default();
        let price = order.price.as_f64();

        // 2. Fat finger
        let reference_price = *state.last_seen_price.lock();
        if let Some(reference) = reference_price {
            if reference > 0.0 {
                let pct = (price - reference).abs() / reference * 100.0;
                if pct > self.limits.fat_finger_threshold_pct {
                    reasons.push(RejectReason::FatFinger);
                }
            }
        }

        // 3. Position limit
        let signed_qty = order.quantity.as_i64() * order.side.sign();
        let projected = state.current_position.load(Ordering::Relaxed) + signed_qty;
        if projected.abs() > self.limits.position_limit_per_symbol {
            reasons.push(RejectReason::PositionLimit);
        }

        // 4. Rate limit
        let timestamps_len = {
            let mut timestamps = self.order_timestamps_ns.lock();
            while let Some(&front) = timestamps.front() {
                if now_ns.saturating_sub(front) > 1_000_000_000 {
                    timestamps.pop_front();
                } else {
                    break;
                }
            }
            timestamps.len() as u32
        };
        if timestamps_len >= self.limits.max_orders_per_second {
            reasons.push(RejectReason::OrderRateLimit);
        }

        // 5. Notional limit
        let notional = order.price.as_f64() * order.quantity.as_f64();
        let rolling_sum = {
            let mut window = self.notional_window.lock();
            while let Some(&(ts, _)) = window.front() {
                if now_ns.saturating_sub(ts) > 1_000_000_000 {
                    window.pop_front();
                } else {
                    break;
                }
            }
            window.iter().map(|(_, n)| n).sum::<f64>()
        };
        if notional > self.limits.max_order_value
            || rolling_sum + notional > self.limits.max_notional_per_second
        {
            reasons.push(RejectReason::NotionalLimit);
        }

        // 6. Daily loss
        {
            let pnl = *self.daily_pnl.lock();
            if pnl <= -self.limits.max_daily_loss {
                reasons.push(RejectReason::DailyLoss);
                self.breaker_active.store(true, Ordering::Release);
            }
        }

        // 7. Duplicate
        if self.recent_order_ids.lock().contains(&order.order_id) {
            reasons.push(RejectReason::Duplicate);
        }

        self.record_latency(clock_start);

        if reasons.is_empty() {
            self.checks_passed.fetch_add(1, Ordering::Relaxed);
            *state.last_seen_price.lock() = Some(price);
            state.current_position.store(projected, Ordering::Relaxed);
            drop(state);
            self.order_timestamps_ns.lock().push_back(now_ns);
            self.notional_window.lock().push_back((now_ns, notional));
            let mut recent = self.recent_order_ids.lock();
            recent.push_back(order.order_id.clone());
            if recent.len() > 10_000 {
                recent.pop_front();
            }
            RiskVerdict::Approved
        } else {
            drop(state);
            for reason in &reasons {
                self.count_rejection(reason.code());
            }
            RiskVerdict::rejected(reasons)
        }
    }

    fn record_latency(&self, start: Ts) {
        let elapsed = self.clock.now().ts.elapsed_ns(start);
        self.total_check_latency_ns.fetch_add(elapsed, Ordering::Relaxed);
    }

    fn count_rejection(&self, code: &'static str) {
        *self.rejection_counts.entry(code).or_insert(0) += 1;
    }

    /// The only mutator of the breaker-tripping variable.
    pub fn update_daily_pnl(&self, delta: f64) {
        let mut pnl = self.daily_pnl.lock();
        *pnl += delta;
        if *pnl <= -self.limits.max_daily_loss {
            self.breaker_active.store(true, Ordering::Release);
        }
    }

    pub fn reset_daily(&self) {
        *self.daily_pnl.lock() = 0.0;
        self.breaker_active.store(false, Ordering::Release);
        self.recent_order_ids.lock().clear();
    }

    #[must_use]
    pub fn is_breaker_active(&self) -> bool {
        self.breaker_active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn daily_pnl(&self) -> f64 {
        *self.daily_pnl.lock()
    }

    #[must_use]
    pub fn metrics(&self) -> RiskMetrics {
        let checks_run = self.checks_run.load(Ordering::Relaxed);
        let checks_passed = self.checks_passed.load(Ordering::Relaxed);
        let total_latency = self.total_check_latency_ns.load(Ordering::Relaxed);
        RiskMetrics {
            checks_run,
            checks_passed,
            avg_check_latency_ns: if checks_run == 0 {
                0.0
            } else {
                total_latency as f64 / checks_run as f64
            },
        }
    }

    #[must_use]
    pub fn rejection_reasons(&self) -> Vec<(&'static str, u64)> {
        self.rejection_counts.iter().map(|e| (*e.key(), *e.value())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hft_common::{OrderType, Side, Venue};

    fn limits() -> RiskLimits {
        RiskLimits {
            max_order_value: 1_000_000.0,
            max_daily_loss: 100.0,
            max_orders_per_second: 3,
            max_notional_per_second: 10_000_000.0,
            fat_finger_threshold_pct: 5.0,
            position_limit_per_symbol: 1_000_000,
        }
    }

    fn order(symbol: &str, price: f64, qty: f64) -> Order {
        Order {
            order_id: Order::new_id(),
            client_order_id: "client-1".to_string(),
            parent_order_id: None,
            symbol: Symbol::from(symbol),
            side: Side::Buy,
            order_type: OrderType::Limit,
            price: Px::new(price),
            quantity: Qty::new(qty),
            venue: Venue::from("NASDAQ"),
            strategy_id: "TEST",
            status: crate::order::OrderStatus::Pending,
            filled_qty: Qty::ZERO,
            remaining_qty: Qty::new(qty),
            avg_fill_price: Px::ZERO,
            created_ns: Ts::now(),
        }
    }

    #[test]
    fn scenario_3_circuit_breaker() {
        let gate = RiskGate::new(limits(), Arc::new(Clock::new()));
        gate.update_daily_pnl(-101.0);
        let verdict = gate.check_order(&order("X", 100.0, 10.0));
        match verdict {
            RiskVerdict::Rejected { reasons, .. } => {
                assert_eq!(reasons, vec![RejectReason::CircuitBreakerActive]);
            }
            RiskVerdict::Approved => panic!("breaker must reject"),
        }
        gate.reset_daily();
        assert!(gate.check_order(&order("X", 100.0, 10.0)).is_approved());
    }

    #[test]
    fn scenario_4_fat_finger() {
        let gate = RiskGate::new(limits(), Arc::new(Clock::new()));
        assert!(gate.check_order(&order("X", 100.0, 10.0)).is_approved());
        let verdict = gate.check_order(&order("X", 106.0, 10.0));
        match verdict {
            RiskVerdict::Rejected { reasons, .. } => {
                assert!(reasons.contains(&RejectReason::FatFinger));
            }
            RiskVerdict::Approved => panic!("106 vs 100 reference exceeds 5% fat-finger limit"),
        }
        assert!(gate.check_order(&order("X", 103.0, 10.0)).is_approved());
    }

    #[test]
    fn scenario_5_rate_limit() {
        let gate = RiskGate::new(limits(), Arc::new(Clock::new()));
        for _ in 0..3 {
            assert!(gate.check_order(&order("RATE", 50.0, 1.0)).is_approved());
        }
        assert!(!gate.check_order(&order("RATE", 50.0, 1.0)).is_approved());
    }

    #[test]
    fn duplicate_order_id_rejected() {
        let gate = RiskGate::new(limits(), Arc::new(Clock::new()));
        let ord = order("DUP", 50.0, 1.0);
        assert!(gate.check_order(&ord).is_approved());
        let replay = ord.clone();
        let verdict = gate.check_order(&replay);
        assert!(!verdict.is_approved());
    }
}
