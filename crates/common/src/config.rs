//! Nested, typed configuration for the HFT core.
//!
//! Mirrors the external interface's configuration table section-for-section.
//! Every default matches the values the reference implementation shipped.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub kernel_bypass_enabled: bool,
    pub nic_rx_ring_size: u32,
    pub multicast_groups: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            kernel_bypass_enabled: true,
            nic_rx_ring_size: 4096,
            multicast_groups: vec!["239.1.1.1".to_string(), "239.1.1.2".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBookConfig {
    pub max_price_levels: u32,
    pub replica_count: usize,
    pub snapshot_interval_ms: f64,
    pub max_symbols: u32,
}

impl Default for OrderBookConfig {
    fn default() -> Self {
        Self {
            max_price_levels: 10_000,
            replica_count: 2,
            snapshot_interval_ms: 100.0,
            max_symbols: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub enabled: bool,
    pub clock_frequency_mhz: u32,
    pub pipeline_stages: u32,
    pub max_tick_to_trade_ns: u64,
    pub arbitrage_threshold_bps: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            clock_frequency_mhz: 250,
            pipeline_stages: 8,
            max_tick_to_trade_ns: 800,
            arbitrage_threshold_bps: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub market_making_enabled: bool,
    pub arbitrage_enabled: bool,
    pub default_spread_bps: f64,
    pub min_spread_bps: f64,
    pub max_spread_bps: f64,
    pub quote_size_shares: i64,
    pub max_position_shares: i64,
    pub inventory_skew_factor: f64,
    pub quote_refresh_interval_ms: f64,
    pub arb_min_profit_bps: f64,
    pub arb_max_notional: f64,
    pub arb_staleness_threshold_us: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            market_making_enabled: true,
            arbitrage_enabled: true,
            default_spread_bps: 2.0,
            min_spread_bps: 0.5,
            max_spread_bps: 10.0,
            quote_size_shares: 100,
            max_position_shares: 10_000,
            inventory_skew_factor: 0.3,
            quote_refresh_interval_ms: 50.0,
            arb_min_profit_bps: 0.3,
            arb_max_notional: 1_000_000.0,
            arb_staleness_threshold_us: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_order_value: f64,
    pub max_position_value: f64,
    pub max_daily_loss: f64,
    pub max_orders_per_second: u32,
    pub max_notional_per_second: f64,
    pub fat_finger_threshold_pct: f64,
    pub circuit_breaker_loss_pct: f64,
    pub position_limit_per_symbol: i64,
    pub correlation_exposure_limit: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_order_value: 500_000.0,
            max_position_value: 5_000_000.0,
            max_daily_loss: 100_000.0,
            max_orders_per_second: 5_000,
            max_notional_per_second: 10_000_000.0,
            fat_finger_threshold_pct: 5.0,
            circuit_breaker_loss_pct: 2.0,
            position_limit_per_symbol: 50_000,
            correlation_exposure_limit: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub venues: Vec<String>,
    pub default_order_type: String,
    pub max_slice_size: i64,
    pub smart_routing_enabled: bool,
    pub dark_pool_enabled: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            venues: vec![
                "NASDAQ".to_string(),
                "NYSE".to_string(),
                "BATS".to_string(),
                "IEX".to_string(),
                "ARCA".to_string(),
            ],
            default_order_type: "LIMIT".to_string(),
            max_slice_size: 500,
            smart_routing_enabled: true,
            dark_pool_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub metrics_publish_interval_ms: f64,
    pub alert_tick_to_trade_us: u64,
    pub alert_99th_percentile_us: u64,
    pub max_latency_samples: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_publish_interval_ms: 1000.0,
            alert_tick_to_trade_us: 100,
            alert_99th_percentile_us: 500,
            max_latency_samples: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HftConfig {
    pub network: NetworkConfig,
    pub orderbook: OrderBookConfig,
    pub pipeline: PipelineConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
    pub monitoring: MonitoringConfig,

    pub co_location: String,
    pub system_id: String,
    pub simulation_mode: bool,
    pub tick_rate_hz: u32,
}

impl Default for HftConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            orderbook: OrderBookConfig::default(),
            pipeline: PipelineConfig::default(),
            strategy: StrategyConfig::default(),
            risk: RiskConfig::default(),
            execution: ExecutionConfig::default(),
            monitoring: MonitoringConfig::default(),
            co_location: "NY5".to_string(),
            system_id: "HFT-CORE-001".to_string(),
            simulation_mode: true,
            tick_rate_hz: 10_000,
        }
    }
}

impl HftConfig {
    /// Loads a config from a TOML file, falling back to defaults for any
    /// section or field the file omits.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = HftConfig::default();
        assert_eq!(cfg.risk.max_daily_loss, 100_000.0);
        assert_eq!(cfg.strategy.default_spread_bps, 2.0);
        assert_eq!(cfg.execution.venues.len(), 5);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() -> Result<()> {
        let toml_str = "[risk]\nmax_daily_loss = 250.0\n";
        let cfg: HftConfig = toml::from_str(toml_str)?;
        assert_eq!(cfg.risk.max_daily_loss, 250.0);
        assert_eq!(cfg.risk.max_order_value, 500_000.0);
        Ok(())
    }
}
