//! Tick-to-trade decision, strategy, risk, execution, and metrics engine.

pub mod arbitrage;
pub mod dashboard;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod market_maker;
pub mod metrics;
pub mod oms;
pub mod orchestrator;
pub mod order;
pub mod pipeline;
pub mod position;
pub mod risk;
pub mod router;
pub mod signal;

pub use arbitrage::ArbitrageEngine;
pub use dashboard::DashboardSnapshot;
pub use error::{EngineError, Result};
pub use feed::FeedHandler;
pub use gateway::ExchangeGateway;
pub use market_maker::MarketMakingEngine;
pub use metrics::MetricsCollector;
pub use oms::OrderManagementSystem;
pub use orchestrator::{Orchestrator, SharedState};
pub use order::{Fill, Order, OrderStatus};
pub use pipeline::DecisionEngine;
pub use position::PositionTracker;
pub use risk::{RiskGate, RiskLimits, RiskVerdict};
pub use router::SmartRouter;
pub use signal::StrategySignal;
