//! Order lifecycle types shared by the router, gateway, and OMS.

use hft_common::{Liquidity, OrderType, Px, Qty, Side, Symbol, Venue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Sent,
    Acked,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: String,
    pub client_order_id: String,
    pub parent_order_id: Option<String>,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Px,
    pub quantity: Qty,
    pub venue: Venue,
    pub strategy_id: &'static str,
    pub status: OrderStatus,
    pub filled_qty: Qty,
    pub remaining_qty: Qty,
    pub avg_fill_price: Px,
    pub created_ns: hft_common::Ts,
}

impl Order {
    /// `ORD-XXXXXXXXXXXX`: 12 uppercase hex characters from a UUIDv4,
    /// matching the reference implementation's order id format.
    #[must_use]
    pub fn new_id() -> String {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        format!("ORD-{}", raw[..12].to_uppercase())
    }
}

#[derive(Debug, Clone)]
pub struct Fill {
    pub order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub fill_price: Px,
    pub fill_qty: Qty,
    pub venue: Venue,
    pub liquidity: Liquidity,
    /// Signed, rounded to 4 decimal places; negative means rebate.
    pub fee: f64,
    pub is_final: bool,
    pub remaining_qty: Qty,
}
