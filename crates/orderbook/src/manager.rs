//! Replicated order books across all tracked symbols, with failover.

use crate::book::{OrderBook, OrderBookSnapshot};
use dashmap::DashMap;
use hft_bus::event_types::MarketDataEvent;
use hft_common::Symbol;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

struct ReplicaSet {
    replicas: Vec<Mutex<OrderBook>>,
    primary: AtomicUsize,
}

/// Aggregate stats surfaced to the dashboard.
#[derive(Debug, Clone)]
pub struct ManagerStats {
    pub symbols_tracked: usize,
    pub replica_count: usize,
    pub total_updates: u64,
}

/// Manages N replicas per symbol. `apply_event` writes all replicas in
/// lockstep; reads always hit the primary. Replicas exist to survive
/// corruption, not as read caches — `failover` is the only way the primary
/// index changes.
pub struct OrderBookManager {
    books: DashMap<Symbol, ReplicaSet>,
    replica_count: usize,
}

impl OrderBookManager {
    #[must_use]
    pub fn new(replica_count: usize) -> Self {
        Self {
            books: DashMap::new(),
            replica_count: replica_count.max(1),
        }
    }

    pub fn register_symbol(&self, symbol: &Symbol) {
        self.books.entry(symbol.clone()).or_insert_with(|| ReplicaSet {
            replicas: (0..self.replica_count)
                .map(|_| Mutex::new(OrderBook::new(symbol.clone())))
                .collect(),
            primary: AtomicUsize::new(0),
        });
    }

    pub fn apply_event(&self, event: &MarketDataEvent) {
        self.register_symbol(&event.symbol);
        if let Some(set) = self.books.get(&event.symbol) {
            for replica in &set.replicas {
                replica.lock().apply_event(event);
            }
        }
    }

    #[must_use]
    pub fn get_book(&self, symbol: &Symbol) -> Option<OrderBookSnapshot> {
        let set = self.books.get(symbol)?;
        let idx = set.primary.load(Ordering::Relaxed);
        Some(set.replicas[idx].lock().snapshot())
    }

    /// Advances the primary replica index, modulo replica count.
    pub fn failover(&self, symbol: &Symbol) {
        if let Some(set) = self.books.get(symbol) {
            if set.replicas.len() > 1 {
                let prev = set.primary.fetch_add(1, Ordering::Relaxed);
                let next = (prev + 1) % set.replicas.len();
                tracing::warn!(%symbol, from = prev, to = next, "order book failover");
            }
        }
    }

    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        self.books.iter().map(|e| e.key().clone()).collect()
    }

    #[must_use]
    pub fn get_all_snapshots(&self) -> Vec<OrderBookSnapshot> {
        self.symbols()
            .into_iter()
            .filter_map(|s| self.get_book(&s))
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        let total_updates = self.get_all_snapshots().iter().map(|s| s.update_count).sum();
        ManagerStats {
            symbols_tracked: self.books.len(),
            replica_count: self.replica_count,
            total_updates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hft_bus::event_types::EventKind;
    use hft_common::{Px, Qty, Ts, Venue};

    fn l1(bid: f64, ask: f64) -> MarketDataEvent {
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
    fn apply_event_updates_all_replicas() {
        let mgr = OrderBookManager::new(2);
        mgr.apply_event(&l1(99.99, 100.01));
        let snap = mgr.get_book(&Symbol::from("ACME")).unwrap();
        assert_eq!(snap.best_bid.unwrap().as_f64(), 99.99);
    }

    #[test]
    fn failover_advances_primary_modulo_replica_count() {
        let mgr = OrderBookManager::new(2);
        mgr.apply_event(&l1(99.99, 100.01));
        mgr.failover(&Symbol::from("ACME"));
        mgr.failover(&Symbol::from("ACME"));
        // two failovers on 2 replicas returns to replica 0; still readable.
        assert!(mgr.get_book(&Symbol::from("ACME")).is_some());
    }

    #[test]
    fn unregistered_symbol_returns_none() {
        let mgr = OrderBookManager::new(2);
        assert!(mgr.get_book(&Symbol::from("NOPE")).is_none());
    }
}
