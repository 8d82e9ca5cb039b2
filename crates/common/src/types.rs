//! Core types shared by every stage of the tick-to-trade pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Interned instrument identifier (e.g. "ACME").
///
/// Cheap to clone and hash: backed by `Arc<str>` rather than `u32` because
/// the pipeline's signals, dashboards, and venue matrices all key on the
/// human-readable ticker, not a registry index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(Arc<str>);

impl Symbol {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Interned venue identifier (e.g. "NASDAQ").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Venue(Arc<str>);

impl Venue {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Venue {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Fixed-point price: internally ticks of 1/10000 of a unit (4 decimal places).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Px(i64);

impl Px {
    pub const ZERO: Self = Self(0);
    const SCALE: f64 = 10_000.0;

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(value: f64) -> Self {
        Self((value * Self::SCALE).round() as i64)
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / Self::SCALE
    }

    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn from_i64(ticks: i64) -> Self {
        Self(ticks)
    }

    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Px {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.as_f64())
    }
}

impl std::ops::Add for Px {
    type Output = Px;
    fn add(self, rhs: Px) -> Px {
        Px(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Px {
    type Output = Px;
    fn sub(self, rhs: Px) -> Px {
        Px(self.0 - rhs.0)
    }
}

/// Fixed-point quantity: internally units of 1/10000 of a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Qty(i64);

impl Qty {
    pub const ZERO: Self = Self(0);
    const SCALE: f64 = 10_000.0;

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(value: f64) -> Self {
        Self((value * Self::SCALE).round() as i64)
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / Self::SCALE
    }

    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn from_i64(units: i64) -> Self {
        Self(units)
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn min(self, other: Qty) -> Qty {
        Qty(self.0.min(other.0))
    }

    #[must_use]
    pub fn saturating_sub(self, other: Qty) -> Qty {
        Qty((self.0 - other.0).max(0))
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.as_f64())
    }
}

impl std::ops::Add for Qty {
    type Output = Qty;
    fn add(self, rhs: Qty) -> Qty {
        Qty(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Qty {
    type Output = Qty;
    fn sub(self, rhs: Qty) -> Qty {
        Qty(self.0 - rhs.0)
    }
}

/// Nanosecond timestamp, monotonic within a single `Clock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ts(pub u64);

impl Ts {
    #[must_use]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn as_micros(&self) -> u64 {
        self.0 / 1_000
    }

    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Saturating distance between two timestamps, order-independent.
    #[must_use]
    pub fn elapsed_ns(&self, other: Ts) -> u64 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Buy or sell intent, shared by signals, orders, and fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[must_use]
    pub const fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    #[must_use]
    pub const fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type accepted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
    Ioc,
    Fok,
    PostOnly,
}

impl OrderType {
    /// LIMIT and POST_ONLY rest on the book and earn maker rebates.
    #[must_use]
    pub const fn is_maker_style(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::PostOnly)
    }
}

/// Liquidity role of a single fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Liquidity {
    Maker,
    Taker,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn px_round_trips_through_ticks() {
        let px = Px::new(1234.56);
        assert_eq!(px.as_i64(), 12_345_600);
        assert!((px.as_f64() - 1234.56).abs() < 1e-9);
    }

    #[test]
    fn qty_saturating_sub_never_negative() {
        let a = Qty::new(5.0);
        let b = Qty::new(12.0);
        assert_eq!(a.saturating_sub(b), Qty::ZERO);
    }

    #[test]
    fn ts_elapsed_is_symmetric() {
        let a = Ts::from_nanos(100);
        let b = Ts::from_nanos(150);
        assert_eq!(a.elapsed_ns(b), 50);
        assert_eq!(b.elapsed_ns(a), 50);
    }

    #[test]
    fn symbol_and_venue_display() {
        let sym = Symbol::from("ACME");
        let venue = Venue::from("NASDAQ");
        assert_eq!(sym.to_string(), "ACME");
        assert_eq!(venue.to_string(), "NASDAQ");
    }

    #[test]
    fn bincode_round_trip_for_px() -> Result<(), Box<dyn std::error::Error>> {
        let px = Px::new(99.99);
        let encoded = bincode::serialize(&px)?;
        let decoded: Px = bincode::deserialize(&encoded)?;
        assert_eq!(px, decoded);
        Ok(())
    }
}
