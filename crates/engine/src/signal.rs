//! Ephemeral trading intent produced by the decision engine, the arbitrage
//! engine, and the market maker, consumed by the smart router.

use hft_common::{Px, Qty, Side, Symbol, Venue};

/// Closed metadata carried by a signal, shaped by the strategy that
/// produced it rather than a free-form attribute bag.
#[derive(Debug, Clone)]
pub enum SignalMetadata {
    None,
    Arbitrage {
        buy_venue: Venue,
        sell_venue: Venue,
        sell_price: Px,
        spread_bps: f64,
        estimated_profit: f64,
        latency_advantage_us: f64,
    },
    MarketMake {
        quote_mid: Px,
        inventory_skew: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    LatencyArbitrage,
    QuoteSuggestion,
    MarketMakeQuote,
}

#[derive(Debug, Clone)]
pub struct StrategySignal {
    pub strategy_id: &'static str,
    pub symbol: Symbol,
    pub side: Side,
    pub target_price: Px,
    pub target_qty: Qty,
    /// Urgency in [0, 1]; higher favors latency over fee in routing.
    pub urgency: f64,
    pub signal_type: SignalType,
    pub metadata: SignalMetadata,
}
